use std::process::Command;

fn citeverify() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_citeverify"));
    cmd.env("RUST_LOG", "off");
    cmd
}

#[test]
fn dry_run_lists_references_without_network() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paper.txt");
    std::fs::write(
        &path,
        "Introduction text.\n\nReferences\n\
         1. Smith J, Doe A. Deep learning for protein folding. Nature. 2021. doi:10.1038/s41586-021-03819-2\n\
         2. Lee K. Another study of cell biology methods. Science. 2019.\n",
    )
    .unwrap();

    let out = citeverify().arg(&path).arg("--dry-run").arg("--no-color").output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("Found 2 references"));
    assert!(stdout.contains("10.1038/s41586-021-03819-2"));
    assert!(!dir.path().join("paper_citation_report.json").exists());
}

#[test]
fn missing_manuscript_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = citeverify().arg(dir.path().join("nope.docx")).output().unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("cannot read manuscript"));
}

#[test]
fn unsupported_extension_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paper.pdf");
    std::fs::write(&path, "%PDF-1.4").unwrap();
    let out = citeverify().arg(&path).arg("--dry-run").output().unwrap();
    assert!(!out.status.success());
}
