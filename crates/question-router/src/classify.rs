/// Curated phrases that mark a question as a metadata request ("what data
/// do I have") rather than a data request.
const METADATA_PHRASES: [&str; 14] = [
    "what tables",
    "which tables",
    "list tables",
    "show tables",
    "list the tables",
    "what datasets",
    "which datasets",
    "list datasets",
    "show datasets",
    "what data do i have",
    "what data is available",
    "what columns",
    "which columns",
    "describe table",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    Metadata,
    Data,
}

/// Lowercase and collapse internal whitespace, so phrase matching is
/// insensitive to formatting. Also the canonical form for cache keys.
pub fn normalize_question(question: &str) -> String {
    question
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Metadata-request vs. data-request.
///
/// Ambiguous questions default to the data path: mis-routing a data
/// question to metadata silently drops the user's real intent, which is
/// worse than the reverse.
pub fn classify(question: &str) -> QuestionKind {
    let normalized = normalize_question(question);

    if METADATA_PHRASES
        .iter()
        .any(|phrase| normalized.contains(phrase))
    {
        QuestionKind::Metadata
    } else {
        QuestionKind::Data
    }
}
