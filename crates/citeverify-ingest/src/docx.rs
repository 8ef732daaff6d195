//! Plain text from Office Open XML word-processing documents.
//!
//! A `.docx` is a ZIP container; the body lives in `word/document.xml`. Each
//! `<w:p>` paragraph becomes one line, made of its `<w:t>` runs. Tabs and
//! line breaks inside a paragraph are kept as `\t` and `\n`.

use std::io::Read;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::IngestError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract the paragraphs of a `.docx` file, joined with newlines.
pub fn extract_text_from_docx(path: &Path) -> Result<String, IngestError> {
    let file = std::fs::File::open(path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| IngestError::Docx(format!("not a DOCX container: {}", e)))?;

    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| IngestError::Docx(format!("missing {}: {}", DOCUMENT_PART, e)))?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)?;

    paragraphs_from_document_xml(&xml).map(|paragraphs| paragraphs.join("\n"))
}

/// Paragraph texts of a `word/document.xml` body, in document order.
pub fn paragraphs_from_document_xml(xml: &str) -> Result<Vec<String>, IngestError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_paragraph = false;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"w:p" => {
                    in_paragraph = true;
                    current.clear();
                }
                b"w:t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"w:tab" if in_paragraph => current.push('\t'),
                b"w:br" | b"w:cr" if in_paragraph => current.push('\n'),
                // An empty paragraph still occupies a line.
                b"w:p" => paragraphs.push(String::new()),
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_text {
                    let text = e
                        .unescape()
                        .map_err(|err| IngestError::Docx(err.to_string()))?;
                    current.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    in_paragraph = false;
                    paragraphs.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IngestError::Docx(format!(
                    "malformed document.xml at byte {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(paragraphs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_are_joined_within_a_paragraph() {
        let xml = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>
<w:p><w:r><w:t>References</w:t></w:r></w:p>
<w:p><w:r><w:t xml:space="preserve">1. Smith J. </w:t></w:r><w:r><w:t>A &amp; B.</w:t></w:r></w:p>
<w:p/>
<w:p><w:r><w:t>left</w:t><w:tab/><w:t>right</w:t><w:br/><w:t>next</w:t></w:r></w:p>
</w:body>
</w:document>"#;
        let paragraphs = paragraphs_from_document_xml(xml).unwrap();
        assert_eq!(
            paragraphs,
            vec![
                "References".to_string(),
                "1. Smith J. A & B.".to_string(),
                String::new(),
                "left\tright\nnext".to_string(),
            ]
        );
    }

    #[test]
    fn text_outside_runs_is_ignored() {
        let xml = "<w:document><w:body><w:p><w:pPr>styling</w:pPr><w:r><w:t>kept</w:t></w:r></w:p></w:body></w:document>";
        assert_eq!(paragraphs_from_document_xml(xml).unwrap(), vec!["kept"]);
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let err = paragraphs_from_document_xml("<w:p><w:t>oops</w:p>").unwrap_err();
        assert!(matches!(err, IngestError::Docx(_)));
    }
}
