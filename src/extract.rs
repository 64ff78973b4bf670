//! Plain-text extraction for uploaded files.
//!
//! Ingestion hands over raw bytes plus the file extension; this module
//! returns UTF-8 text ready for chunking, or an [`ExtractError`] that the
//! caller reports as invalid input.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0:?}")]
    UnsupportedType(String),
    #[error("file is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Extensions accepted by [`extract_text`], lowercase.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "html", "htm", "pdf"];

/// Extract text from `bytes` according to `extension` (case-insensitive).
pub fn extract_text(bytes: &[u8], extension: &str) -> Result<String, ExtractError> {
    match extension.to_ascii_lowercase().as_str() {
        "txt" | "md" | "markdown" => Ok(String::from_utf8(bytes.to_vec())?),
        "html" | "htm" => Ok(html_to_text(&String::from_utf8(bytes.to_vec())?)),
        "pdf" => extract_pdf(bytes),
        other => Err(ExtractError::UnsupportedType(other.to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Strip markup from an HTML document.
///
/// Block-level tags become paragraph breaks so the chunker still sees
/// structure; `<script>`/`<style>` bodies are dropped; common entities are
/// decoded.
fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('>') else {
            rest = "";
            break;
        };
        let tag = after[..end].trim().to_ascii_lowercase();
        rest = &after[end + 1..];

        let name: String = tag
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();

        if !tag.starts_with('/') && (name == "script" || name == "style") {
            let close = format!("</{}", name);
            match rest.to_ascii_lowercase().find(&close) {
                Some(pos) => {
                    rest = &rest[pos..];
                    if let Some(gt) = rest.find('>') {
                        rest = &rest[gt + 1..];
                    }
                }
                None => rest = "",
            }
            continue;
        }

        if is_block_tag(&name) {
            out.push_str("\n\n");
        } else if name == "br" {
            out.push('\n');
        }
    }
    out.push_str(rest);

    normalize_whitespace(&decode_entities(&out))
}

fn is_block_tag(name: &str) -> bool {
    matches!(
        name,
        "p" | "div" | "section" | "article" | "li" | "ul" | "ol" | "table" | "tr" | "blockquote"
            | "pre" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "title" | "header" | "footer"
    )
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Collapse runs of spaces within lines and runs of blank lines to one.
fn normalize_whitespace(s: &str) -> String {
    let paragraphs: Vec<String> = s
        .split("\n\n")
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
        .collect();
    paragraphs.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passthrough() {
        let text = extract_text(b"hello\n\nworld", "TXT").unwrap();
        assert_eq!(text, "hello\n\nworld");
    }

    #[test]
    fn test_invalid_utf8() {
        let err = extract_text(&[0xff, 0xfe, 0x00], "md").unwrap_err();
        assert!(matches!(err, ExtractError::Encoding(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = extract_text(b"x", "docx").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedType(ref e) if e == "docx"));
    }

    #[test]
    fn test_html_strips_tags_and_scripts() {
        let html = "<html><head><title>Lore</title><script>var x = '<p>';</script></head>\
                    <body><h1>Dragons</h1><p>They   hoard &amp; sleep.</p><p>Rarely<br>wake.</p></body></html>";
        let text = extract_text(html.as_bytes(), "html").unwrap();
        assert_eq!(text, "Lore\n\nDragons\n\nThey hoard & sleep.\n\nRarely wake.");
    }

    #[test]
    fn test_bad_pdf_is_error() {
        assert!(matches!(
            extract_text(b"not a pdf", "pdf"),
            Err(ExtractError::Pdf(_))
        ));
    }
}
