use std::io::Write;
use std::path::Path;

use citeverify_ingest::{IngestError, extract_text};
use zip::write::SimpleFileOptions;

fn write_docx(path: &Path, document_xml: &str) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file("[Content_Types].xml", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"<Types/>").unwrap();
    zip.start_file("word/document.xml", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(document_xml.as_bytes()).unwrap();
    zip.finish().unwrap();
}

#[test]
fn reads_plain_text_lossily() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paper.txt");
    std::fs::write(&path, b"References\n1. Caf\xe9 study. Journal. 2020.\n").unwrap();

    let text = extract_text(&path).unwrap();
    assert!(text.starts_with("References\n"));
    assert!(text.contains("Caf\u{FFFD} study"));
}

#[test]
fn reads_markdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paper.md");
    std::fs::write(&path, "# Title\n\nReferences\n").unwrap();
    assert_eq!(extract_text(&path).unwrap(), "# Title\n\nReferences\n");
}

#[test]
fn reads_docx_paragraphs_as_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paper.docx");
    write_docx(
        &path,
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>References</w:t></w:r></w:p>
<w:p><w:r><w:t>1. Smith J. A great paper. Journal X. 2020.</w:t></w:r></w:p>
<w:p><w:r><w:t>2. Doe A. Another one. Journal Y. 2019.</w:t></w:r></w:p>
</w:body></w:document>"#,
    );

    let text = extract_text(&path).unwrap();
    assert_eq!(
        text,
        "References\n1. Smith J. A great paper. Journal X. 2020.\n2. Doe A. Another one. Journal Y. 2019."
    );
}

#[test]
fn docx_without_body_part_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.docx");
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file("other.xml", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"<x/>").unwrap();
    zip.finish().unwrap();

    assert!(matches!(extract_text(&path), Err(IngestError::Docx(_))));
}

#[test]
fn non_zip_docx_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fake.docx");
    std::fs::write(&path, "plain text pretending to be a docx").unwrap();
    assert!(matches!(extract_text(&path), Err(IngestError::Docx(_))));
}

#[test]
fn whitespace_only_manuscript_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blank.txt");
    std::fs::write(&path, "  \n\n\t ").unwrap();
    assert!(matches!(extract_text(&path), Err(IngestError::Empty(_))));
}

#[test]
fn unsupported_extension_is_rejected_before_reading() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paper.pdf");
    std::fs::write(&path, "%PDF-1.4").unwrap();
    assert!(matches!(
        extract_text(&path),
        Err(IngestError::Unsupported(ext)) if ext == "pdf"
    ));
}
