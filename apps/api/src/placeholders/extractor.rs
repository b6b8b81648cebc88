//! Placeholder Extractor: keeps the paragraphs that contain a bracketed token.

use std::sync::LazyLock;

use regex::Regex;

/// `[` followed by one or more characters other than `[`/`]`, then `]`.
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\[\]]+\]").expect("placeholder pattern is valid"));

/// Returns the paragraphs containing at least one placeholder, in document order.
pub fn find_placeholder_paragraphs<S: AsRef<str>>(paragraphs: &[S]) -> Vec<String> {
    paragraphs
        .iter()
        .map(|p| p.as_ref())
        .filter(|p| PLACEHOLDER_RE.is_match(p))
        .map(str::to_string)
        .collect()
}

/// Total number of bracket occurrences across the given paragraphs.
pub fn count_occurrences<S: AsRef<str>>(paragraphs: &[S]) -> usize {
    paragraphs
        .iter()
        .map(|p| PLACEHOLDER_RE.find_iter(p.as_ref()).count())
        .sum()
}

/// The raw bracketed tokens in reading order, brackets included.
pub fn occurrences<S: AsRef<str>>(paragraphs: &[S]) -> Vec<String> {
    paragraphs
        .iter()
        .flat_map(|p| {
            PLACEHOLDER_RE
                .find_iter(p.as_ref())
                .map(|m| m.as_str().to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_only_bracketed_paragraphs_in_order() {
        let paras = vec![
            "THIS AGREEMENT is made as of [Date].",
            "Recitals",
            "Between [Company Name] and [Client Name].",
            "",
            "Signed: [Company Name]",
        ];
        let found = find_placeholder_paragraphs(&paras);
        assert_eq!(
            found,
            vec![
                "THIS AGREEMENT is made as of [Date].",
                "Between [Company Name] and [Client Name].",
                "Signed: [Company Name]",
            ]
        );
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        let paras: Vec<String> = vec![];
        assert!(find_placeholder_paragraphs(&paras).is_empty());
        assert_eq!(count_occurrences(&paras), 0);
    }

    #[test]
    fn test_empty_and_nested_brackets_do_not_match() {
        let paras = vec!["Empty [] brackets", "Unclosed [Name", "Stray ] bracket"];
        assert!(find_placeholder_paragraphs(&paras).is_empty());

        // Only the innermost bracket pair forms a token.
        let nested = vec!["Nested [[Inner]] value"];
        assert_eq!(occurrences(&nested), vec!["[Inner]"]);
    }

    #[test]
    fn test_counts_every_occurrence_including_duplicates() {
        let paras = vec![
            "Agreement between [Company Name] and [Client Name].",
            "Signed: [Company Name]",
        ];
        assert_eq!(count_occurrences(&paras), 3);
        assert_eq!(
            occurrences(&paras),
            vec!["[Company Name]", "[Client Name]", "[Company Name]"]
        );
    }

    #[test]
    fn test_underscore_style_tokens_are_matched() {
        let paras = vec!["Amount: $[_____________]"];
        assert_eq!(find_placeholder_paragraphs(&paras).len(), 1);
    }
}
