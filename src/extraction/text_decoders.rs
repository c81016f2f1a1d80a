//! Decoders for formats whose text is read straight from the bytes.
//!
//! None of these fail: malformed input degrades to whatever text can be
//! recovered, or to an empty string with a label saying so.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::models::FormatKind;

static SCRIPT_STYLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>|<style[^>]*>.*?</style>").expect("valid regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static RTF_CONTROL_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\[a-zA-Z]+-?\d*").expect("valid regex"));
static RTF_BRACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[{}]").expect("valid regex"));

/// Decoded text and the label describing how it was produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub method: String,
}

impl DecodedText {
    fn new(text: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            method: method.into(),
        }
    }
}

/// Decode `bytes` according to `kind`. `extension` only refines the label
/// (HTML versus XML).
pub fn decode(kind: FormatKind, extension: &str, bytes: &[u8]) -> DecodedText {
    let raw = String::from_utf8_lossy(bytes);

    let decoded = match kind {
        FormatKind::PlainText => DecodedText::new(raw, "Direct text reading"),
        FormatKind::Markdown => DecodedText::new(raw, "Markdown text reading"),
        FormatKind::MarkupText => {
            let label = if extension.eq_ignore_ascii_case("xml") {
                "XML text extraction"
            } else {
                "HTML text extraction"
            };
            DecodedText::new(strip_markup(&raw), label)
        }
        FormatKind::DelimitedTable => match delimited_to_text(bytes) {
            Ok(text) => DecodedText::new(text, "CSV text extraction"),
            Err(e) => {
                warn!("CSV decoding failed: {}", e);
                DecodedText::new("", "CSV text extraction (unreadable rows)")
            }
        },
        FormatKind::StructuredData => match reindent_json(&raw) {
            Some(pretty) => DecodedText::new(pretty, "JSON text extraction"),
            None => {
                debug!("Input is not valid JSON, returning raw text");
                DecodedText::new(raw, "JSON text extraction (raw, invalid JSON)")
            }
        },
        FormatKind::RichTextLegacy => DecodedText::new(strip_rtf(&raw), "Basic RTF text extraction"),
        other => {
            warn!("No text decoder for {}", other);
            DecodedText::new("", format!("No text decoder for {}", other.description()))
        }
    };

    debug!("{} produced {} characters", decoded.method, decoded.text.chars().count());
    decoded
}

/// Remove script and style blocks, then every remaining tag, then collapse
/// whitespace. Tags leave nothing behind, so inline markup inside a word
/// keeps the word whole.
pub fn strip_markup(markup: &str) -> String {
    let without_scripts = SCRIPT_STYLE_RE.replace_all(markup, "");
    let without_tags = TAG_RE.replace_all(&without_scripts, "");
    WHITESPACE_RE.replace_all(&without_tags, " ").trim().to_string()
}

/// Approximate RTF stripping. Escaped characters and embedded groups such
/// as font tables leave residue in the output.
pub fn strip_rtf(rtf: &str) -> String {
    let without_controls = RTF_CONTROL_WORD_RE.replace_all(rtf, "");
    let without_braces = RTF_BRACES_RE.replace_all(&without_controls, "");
    without_braces.replace('\\', "").trim().to_string()
}

/// Rows joined by newlines, fields by " | ". A blank line stays an empty row.
pub fn delimited_to_text(bytes: &[u8]) -> Result<String, csv::Error> {
    let mut rows = Vec::new();
    let mut record = csv::ByteRecord::new();

    for line in record_lines(bytes) {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(line);

        if line.is_empty() || !reader.read_byte_record(&mut record)? {
            rows.push(String::new());
            continue;
        }
        let fields: Vec<String> = record.iter().map(|f| String::from_utf8_lossy(f).into_owned()).collect();
        rows.push(fields.join(" | "));
    }

    Ok(rows.join("\n"))
}

/// Split on line breaks outside quoted fields. The csv reader skips empty
/// lines, so rows are cut here and parsed one at a time.
fn record_lines(bytes: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        match byte {
            b'"' => in_quotes = !in_quotes,
            b'\n' if !in_quotes => {
                lines.push(without_cr(&bytes[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < bytes.len() {
        lines.push(without_cr(&bytes[start..]));
    }
    lines
}

fn without_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Pretty-print with two-space indentation, or `None` when not valid JSON
pub fn reindent_json(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    serde_json::to_string_pretty(&value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_lossy() {
        let decoded = decode(FormatKind::PlainText, "txt", b"caf\xc3\xa9 \xff ok");
        assert_eq!(decoded.method, "Direct text reading");
        assert!(decoded.text.starts_with("café"));
        assert!(decoded.text.ends_with("ok"));
    }

    #[test]
    fn test_markup_drops_script_before_tags() {
        let html = "<html><head><SCRIPT type=\"text/javascript\">\nvar secret = 1;\n</SCRIPT><style>p { color: red }</style></head>\n<body><p>Hello</p>\n\n<p>world</p></body></html>";
        let decoded = decode(FormatKind::MarkupText, "html", html.as_bytes());
        assert_eq!(decoded.text, "Hello world");
        assert_eq!(decoded.method, "HTML text extraction");
    }

    #[test]
    fn test_xml_label() {
        let decoded = decode(
            FormatKind::MarkupText,
            "xml",
            b"<root>\n  <item>one</item>\n  <item>two</item>\n</root>",
        );
        assert_eq!(decoded.method, "XML text extraction");
        assert_eq!(decoded.text, "one two");
    }

    #[test]
    fn test_inline_tags_do_not_split_words() {
        let decoded = decode(
            FormatKind::MarkupText,
            "html",
            b"<p>H<sub>2</sub>O and <b>bold</b>ly</p>",
        );
        assert_eq!(decoded.text, "H2O and boldly");
        assert_eq!(strip_markup("<td>a</td><td>b</td>"), "ab");
    }

    #[test]
    fn test_csv_respects_quoting() {
        let csv = "name,comment\n\"Smith, J\",\"said \"\"hi\"\"\"\nshort\n";
        let decoded = decode(FormatKind::DelimitedTable, "csv", csv.as_bytes());
        assert_eq!(decoded.text, "name | comment\nSmith, J | said \"hi\"\nshort");
        assert_eq!(decoded.method, "CSV text extraction");
    }

    #[test]
    fn test_csv_blank_lines_are_kept() {
        assert_eq!(delimited_to_text(b"a,b\n\n1,2").unwrap(), "a | b\n\n1 | 2");
        assert_eq!(delimited_to_text(b"a,b\r\n\r\n1,2\r\n").unwrap(), "a | b\n\n1 | 2");
        assert_eq!(
            delimited_to_text(b"id,note\n1,\"two\n\nlines\"\n\n2,x\n").unwrap(),
            "id | note\n1 | two\n\nlines\n\n2 | x"
        );
    }

    #[test]
    fn test_json_reindented() {
        let decoded = decode(FormatKind::StructuredData, "json", br#"{"b":1,"a":[true]}"#);
        assert_eq!(decoded.text, "{\n  \"b\": 1,\n  \"a\": [\n    true\n  ]\n}");
    }

    #[test]
    fn test_invalid_json_falls_back_to_raw() {
        let decoded = decode(FormatKind::StructuredData, "json", b"{not json");
        assert_eq!(decoded.text, "{not json");
        assert!(decoded.method.starts_with("JSON text extraction"));
    }

    #[test]
    fn test_rtf_control_words_removed() {
        let rtf = r"{\rtf1\ansi\deff0 {\b Bold} text\par Second line}";
        let decoded = decode(FormatKind::RichTextLegacy, "rtf", rtf.as_bytes());
        assert_eq!(decoded.method, "Basic RTF text extraction");
        assert!(decoded.text.contains("Bold"));
        assert!(decoded.text.contains("Second line"));
        assert!(!decoded.text.contains('\\'));
        assert!(!decoded.text.contains('{'));
    }

    #[test]
    fn test_markdown_passthrough() {
        let decoded = decode(FormatKind::Markdown, "md", b"# Title\n\nBody");
        assert_eq!(decoded.text, "# Title\n\nBody");
        assert_eq!(decoded.method, "Markdown text reading");
    }
}
