//! Error types for template parsing

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// Why a template document could not be turned into a typed tree
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("malformed template JSON at line {line}, column {column}: {message}")]
    Malformed {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("template root must be a JSON object")]
    NotAnObject,

    #[error("missing required field `{field}` at {path}")]
    MissingField { field: String, path: String },

    #[error("unknown item type `{tag}` at {path}")]
    UnknownItemType { tag: String, path: String },

    #[error("invalid item at {path}: {message}")]
    InvalidItem { path: String, message: String },

    #[error("unsupported template version {0}")]
    UnsupportedVersion(i64),
}

impl ParseError {
    /// Map a `serde_json` failure on the whole document
    pub(crate) fn from_json(err: &serde_json::Error) -> Self {
        ParseError::Malformed {
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
        }
    }

    /// Best-effort byte span of the error inside `source`
    pub fn span(&self, source: &str) -> Span {
        match self {
            ParseError::Malformed { line, column, .. } => {
                let offset = line_column_offset(source, *line, *column);
                offset..(offset + 1).min(source.len()).max(offset)
            }
            _ => 0..0,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let span = self.span(source);
        let message = self.to_string();
        let mut buf = Vec::new();

        let written = Report::build(ReportKind::Error, filename, span.start)
            .with_message(&message)
            .with_label(
                Label::new((filename, span))
                    .with_message(message.clone())
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf);

        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => message,
        }
    }
}

/// Convert a 1-based line and column (as reported by serde_json) to a byte offset
fn line_column_offset(source: &str, line: usize, column: usize) -> usize {
    if line == 0 {
        return 0;
    }
    let mut offset = 0;
    for (index, text) in source.split_inclusive('\n').enumerate() {
        if index + 1 == line {
            let col = column.saturating_sub(1).min(text.len());
            return (offset + col).min(source.len());
        }
        offset += text.len();
    }
    source.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_column_offset() {
        let source = "{\n  \"a\": 1,\n  oops\n}";
        assert_eq!(line_column_offset(source, 1, 1), 0);
        assert_eq!(line_column_offset(source, 3, 3), 14);
        assert_eq!(line_column_offset(source, 99, 1), source.len());
    }

    #[test]
    fn test_format_contains_message() {
        let source = "{\"version\": 1,";
        let err = serde_json::from_str::<serde_json::Value>(source).unwrap_err();
        let parse_err = ParseError::from_json(&err);
        let report = parse_err.format(source, "broken.json");
        assert!(report.contains("malformed template JSON"));
    }

    #[test]
    fn test_display() {
        let err = ParseError::MissingField {
            field: "text".to_string(),
            path: "body.items[0]".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "missing required field `text` at body.items[0]"
        );
    }
}
