use regex::Regex;
use std::sync::OnceLock;

/// What pasted text turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextIntake {
    /// A single well-formed URL, adopted as the selected node's link.
    Link(String),
    /// One new child per blank-line separated paragraph.
    Chunks(Vec<String>),
}

static URL: OnceLock<Option<Regex>> = OnceLock::new();
static BLANK_LINE: OnceLock<Option<Regex>> = OnceLock::new();

fn url_pattern() -> Option<&'static Regex> {
    URL.get_or_init(|| Regex::new(r"(?i)^(https?|ftp)://[^\s/$.?#][^\s]*$").ok())
        .as_ref()
}

fn blank_line_pattern() -> Option<&'static Regex> {
    BLANK_LINE
        .get_or_init(|| Regex::new(r"\n[ \t]*\n").ok())
        .as_ref()
}

pub fn is_url(text: &str) -> bool {
    url_pattern().is_some_and(|re| re.is_match(text.trim()))
}

/// Splits on blank lines, trimming each paragraph and dropping empty ones.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    let chunks: Vec<&str> = match blank_line_pattern() {
        Some(re) => re.split(&normalized).collect(),
        None => vec![normalized.as_str()],
    };
    chunks
        .into_iter()
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_string)
        .collect()
}

/// `None` for text with nothing in it.
pub fn classify_text(text: &str) -> Option<TextIntake> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if is_url(trimmed) {
        return Some(TextIntake::Link(trimmed.to_string()));
    }
    Some(TextIntake::Chunks(split_paragraphs(text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_become_links() {
        assert_eq!(
            classify_text("  https://example.com/a?b=c \n"),
            Some(TextIntake::Link("https://example.com/a?b=c".to_string()))
        );
        assert!(is_url("FTP://files.example.org"));
        assert!(!is_url("example.com"));
        assert!(!is_url("https://exa mple.com"));
        assert!(!is_url("see https://example.com"));
    }

    #[test]
    fn test_paragraphs_split_on_blank_lines() {
        let text = "first line\nstill first\n\n  second  \r\n \r\nthird\n\n\n";
        assert_eq!(
            classify_text(text),
            Some(TextIntake::Chunks(vec![
                "first line\nstill first".to_string(),
                "second".to_string(),
                "third".to_string(),
            ]))
        );
    }

    #[test]
    fn test_blank_text_is_ignored() {
        assert_eq!(classify_text(" \n\t\n"), None);
    }
}
