//! Argument and validation paths of the binaries that need no network,
//! browser or marp.

use assert_cmd::Command;
use predicates::prelude::*;

fn bin(name: &str) -> Command {
    let mut cmd = Command::cargo_bin(name).expect("binary exists");
    cmd.env_remove("GEMINI_API_KEY")
        .env_remove("GOOGLE_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn every_binary_has_help() {
    for name in ["genimage", "batchimage", "html2img", "md2pdf", "marp2pdf"] {
        bin(name)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Usage"));
    }
}

#[test]
fn batchimage_lists_builtin_catalogue_without_key() {
    let dir = tempfile::tempdir().unwrap();
    bin("batchimage")
        .current_dir(dir.path())
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::str::contains("10 prompt(s)"))
        .stdout(predicate::str::contains("profile_banner"))
        .stdout(predicate::str::contains("iot_3"));
}

#[test]
fn batchimage_lists_custom_catalogue() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("prompts.json");
    std::fs::write(&cfg, r#"{"images":[{"name":"hero","prompt":"A hero image","category":"web"}]}"#).unwrap();
    bin("batchimage")
        .current_dir(dir.path())
        .args(["--list", "--config"])
        .arg(&cfg)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 prompt(s)"))
        .stdout(predicate::str::contains("hero"));
}

#[test]
fn batchimage_unknown_single_fails() {
    let dir = tempfile::tempdir().unwrap();
    bin("batchimage")
        .current_dir(dir.path())
        .args(["--single", "does_not_exist"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does_not_exist"));
}

#[test]
fn batchimage_without_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    bin("batchimage")
        .current_dir(dir.path())
        .args(["--single", "iot_1", "-q"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("GEMINI_API_KEY"));
}

#[test]
fn genimage_without_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    bin("genimage")
        .current_dir(dir.path())
        .args(["-p", "a red circle", "-o", "out.png"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("GEMINI_API_KEY"))
        .stderr(predicate::str::contains("Result: failed ("));
    assert!(!dir.path().join("out.png").exists());
}

#[test]
fn genimage_rejects_bad_aspect_ratio() {
    let dir = tempfile::tempdir().unwrap();
    bin("genimage")
        .current_dir(dir.path())
        .args(["-p", "x", "-a", "wide"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("aspect"));
}

#[test]
fn genimage_rejects_unknown_model() {
    bin("genimage")
        .args(["-p", "x", "-m", "dall-e-3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("dall-e-3"));
}

#[test]
fn md2pdf_missing_input_fails() {
    bin("md2pdf")
        .arg("/no/such/notes.md")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn html2img_missing_input_fails() {
    bin("html2img")
        .arg("/no/such/page.html")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn html2img_pdf_flags_conflict() {
    bin("html2img")
        .args(["page.html", "--no-pdf", "--pdf", "x.pdf"])
        .assert()
        .failure();
}

#[test]
fn marp2pdf_missing_input_fails() {
    bin("marp2pdf")
        .arg("/no/such/talk.md")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn marp2pdf_rejects_unknown_theme() {
    let dir = tempfile::tempdir().unwrap();
    let md = dir.path().join("talk.md");
    std::fs::write(&md, "# Hi\n").unwrap();
    bin("marp2pdf")
        .arg(&md)
        .args(["--theme", "beamer"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("beamer"));
}

#[test]
fn html2img_rejects_bad_dpi_before_launching_browser() {
    let dir = tempfile::tempdir().unwrap();
    let page = dir.path().join("page.html");
    std::fs::write(&page, "<html><body>hi</body></html>").unwrap();
    bin("html2img")
        .arg(&page)
        .args(["--dpi", "0", "--chrome", "/no/such/chrome", "-q"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("dpi must be positive"));
    assert!(!dir.path().join("page_fullpage.png").exists());
}

#[test]
fn marp2pdf_rejects_zero_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let md = dir.path().join("talk.md");
    std::fs::write(&md, "# Hi\n").unwrap();
    bin("marp2pdf")
        .arg(&md)
        .args(["--timeout", "0", "--marp", "/no/such/marp", "-q"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("timeout"));
}
