use thiserror::Error;

/// Keywords that would mutate state. Any occurrence rejects the statement
/// before it reaches the analytical engine.
const MUTATING_KEYWORDS: [&str; 8] = [
    "insert", "update", "delete", "create", "drop", "alter", "truncate", "merge",
];

#[derive(Debug, Error)]
pub enum SyntaxError {
    #[error("Generated SQL was empty. Try rephrasing the question")]
    Empty,

    #[error("Generated SQL is not a SELECT statement. Try rephrasing the question as a read-only query")]
    MissingSelect,

    #[error("Generated SQL contains the forbidden keyword `{0}`. Only read-only queries are executed")]
    ForbiddenKeyword(String),
}

/// Rejects SQL candidates that are empty, comment-only, not a SELECT/WITH
/// statement, or that mention a mutating keyword anywhere.
///
/// Purely lexical and fail-closed: a mutating keyword inside a string
/// literal is still rejected. The analytical engine independently refuses
/// non-SELECT statements as defense in depth.
pub struct SyntaxGuard;

impl SyntaxGuard {
    pub fn check(sql: &str) -> Result<(), SyntaxError> {
        let stripped = strip_comments(sql);

        let mut words = stripped
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase);

        match words.next() {
            None => return Err(SyntaxError::Empty),
            Some(first) if first != "select" && first != "with" => {
                return Err(SyntaxError::MissingSelect);
            }
            Some(_) => {}
        }

        let words = stripped
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase);
        for word in words {
            if MUTATING_KEYWORDS.contains(&word.as_str()) {
                return Err(SyntaxError::ForbiddenKeyword(word));
            }
        }

        Ok(())
    }
}

fn strip_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '-' if sql[i..].starts_with("--") => {
                for (_, n) in chars.by_ref() {
                    if n == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if sql[i..].starts_with("/*") => {
                chars.next(); // consume '*'
                let mut prev = ' ';
                for (_, n) in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    out
}
