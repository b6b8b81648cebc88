// Shared prompt fragments.
// Each component that calls the model defines its own prompts alongside it.
// This file holds the fragments every structured call appends.

/// Appended to every system prompt: the answer must arrive through the forced tool.
pub const STRUCTURED_OUTPUT_INSTRUCTION: &str = "\
    Respond ONLY by calling the provided tool exactly once. \
    The tool input MUST match its JSON Schema exactly: no extra fields, no missing fields. \
    Do NOT write any text outside the tool call.";

/// Joins a component prompt with the shared structured-output rules.
pub fn with_structured_output(system: &str) -> String {
    format!("{}\n\n{}", system.trim_end(), STRUCTURED_OUTPUT_INSTRUCTION)
}
