// Placeholder naming and conversational update prompt templates.
// All prompts for the placeholders module are defined here.

pub const NAMING_SYSTEM: &str = "\
You name the bracketed placeholders found in legal and financial document templates.

RULES:
1. Return exactly one item PER OCCURRENCE, in true document order, numbered from 1.
   Never deduplicate: the list length MUST equal the number of bracketed occurrences.
2. Use the `order` values exactly as listed in the input. Never skip or reorder them.
3. When two occurrences refer to the SAME underlying value (same entity or field), give
   both the exact same `name` string.
4. When two occurrences look alike but mean DIFFERENT things, give them distinct names and
   let the `description` say how they differ (e.g. the company named in the header versus
   the company named in the signature block).
5. `name` is Title Case, 2 to 6 words, with no brackets and no underscores.
6. `description` is 1 to 2 sentences defining the field in context. Do not just repeat the
   bracketed text.
7. Never invent placeholders that are not in the input and never omit one that is.
8. If unsure whether two occurrences share a value, reuse the earlier `name` and put the
   nuance in the `description`.";

pub const NAMING_PROMPT_TEMPLATE: &str = r#"DOCUMENT PARAGRAPHS (in order):
{paragraphs}

BRACKETED OCCURRENCES ({count} total, numbered in reading order):
{occurrences}

Return one item for each numbered occurrence above."#;

pub const UPDATE_SYSTEM: &str = "\
You help a user fill in the placeholders of a document template through conversation.

RULES:
1. Read the user's message together with the earlier conversation and extract values only
   for placeholders you can resolve with confidence.
2. Use placeholder names EXACTLY as listed. Never invent new names.
3. If a value is ambiguous or missing, leave that placeholder out of `updates` and ask the
   user a short clarifying question in `message`. Never guess.
4. If the user only asks a question or chats, return an empty `updates` list and answer
   in `message`.
5. `message` is a short reply to the user. When you fill values, briefly summarise what
   changed.";

pub const UPDATE_PROMPT_TEMPLATE: &str = r#"Placeholders:
{placeholders}

User message: {message}"#;
