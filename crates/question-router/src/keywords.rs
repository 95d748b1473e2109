use crate::classify::normalize_question;

/// Best-effort extraction of authorized table names mentioned in the
/// question, ordered by first appearance. Used to put the most relevant
/// schema snippets first in the generation request; never used for
/// authorization decisions.
pub fn table_keywords(question: &str, authorized_tables: &[String]) -> Vec<String> {
    let normalized = normalize_question(question);

    let mut mentioned: Vec<(usize, String)> = authorized_tables
        .iter()
        .filter_map(|qualified| {
            let table = qualified.rsplit('.').next().unwrap_or(qualified);
            let position = normalized
                .find(&qualified.to_lowercase())
                .or_else(|| find_word(&normalized, &table.to_lowercase()))?;
            Some((position, qualified.clone()))
        })
        .collect();

    mentioned.sort_by_key(|(position, _)| *position);
    mentioned.into_iter().map(|(_, table)| table).collect()
}

fn find_word(text: &str, word: &str) -> Option<usize> {
    if word.is_empty() {
        return None;
    }

    let mut start = 0;
    while let Some(offset) = text[start..].find(word) {
        let begin = start + offset;
        let end = begin + word.len();
        let boundary_before = begin == 0
            || !text[..begin]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '_');
        let boundary_after = !text[end..]
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_');

        if boundary_before && boundary_after {
            return Some(begin);
        }
        start = end;
    }
    None
}
