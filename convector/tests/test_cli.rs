// Allow deprecated APIs (assert_cmd::cargo_bin is deprecated but still works)
#![allow(deprecated)]

use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*; // Used for writing assertions
use rstest::rstest;
use std::fs;
use std::process::Command; // Run programs
use tempfile::tempdir;

const TRIANGLE_PS: &str = "0 0 moveto 100 0 lineto 0 100 lineto closepath fill\n";

fn convector() -> Command {
    let mut cmd = Command::cargo_bin("convector").unwrap();
    cmd.arg("--no-system-fonts");
    cmd
}

#[rstest]
#[case("svg", "<svg")]
#[case("ngc", "G21")]
#[case("mvg", "viewbox")]
#[case("pg", "C14,END")]
#[case("eps", "%!PS")]
fn test_convert_ps(#[case] extension: &str, #[case] expected: &str) -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("triangle.ps");
    let output = dir.path().join(format!("triangle.{}", extension));
    fs::write(&input, TRIANGLE_PS)?;

    convector().arg(&input).arg(&output).assert().success();

    let text = fs::read_to_string(&output)?;
    assert!(text.contains(expected), "{}", text);
    Ok(())
}

#[test]
fn test_binary_outputs() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("triangle.ps");
    fs::write(&input, TRIANGLE_PS)?;
    for (extension, magic) in [
        ("png", &b"\x89PNG"[..]),
        ("pdf", &b"%PDF-"[..]),
        ("dov", &b"\x23\x39\xFF\xAF"[..]),
    ] {
        let output = dir.path().join(format!("triangle.{}", extension));
        convector().arg(&input).arg(&output).assert().success();
        assert!(fs::read(&output)?.starts_with(magic), "{}", extension);
    }
    Ok(())
}

#[test]
fn test_unknown_extension() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("triangle.ps");
    fs::write(&input, TRIANGLE_PS)?;
    convector()
        .arg(&input)
        .arg(dir.path().join("triangle.docx"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown format").and(predicate::str::contains("ngc")));
    Ok(())
}

#[test]
fn test_unreadable_format() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("page.pdf");
    fs::write(&input, "%PDF-1.4")?;
    convector()
        .arg(&input)
        .arg(dir.path().join("page.svg"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("pdf input is not supported"));
    Ok(())
}

#[test]
fn test_malformed_input_leaves_no_output() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("broken.ngc");
    let output = dir.path().join("broken.svg");
    fs::write(&input, "G1 X[1+\n")?;
    convector()
        .arg(&input)
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed input"));
    assert!(!output.exists());
    Ok(())
}

#[test]
fn test_unsupported_operator() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("arc.gcode");
    fs::write(&input, "G0 X0 Y0\nG2 X10 Y0 I5 J0\n")?;
    convector()
        .arg(&input)
        .arg(dir.path().join("arc.svg"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported operator"));
    Ok(())
}

#[test]
fn test_missing_input_file() {
    convector()
        .arg("does-not-exist.svg")
        .arg("out.ngc")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read input file"));
}

#[test]
fn test_polargraph_width_flag() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("triangle.ps");
    let output = dir.path().join("triangle.pg");
    fs::write(&input, TRIANGLE_PS)?;
    convector()
        .arg("--polargraph-width")
        .arg("5000")
        .arg(&input)
        .arg(&output)
        .assert()
        .success();
    let text = fs::read_to_string(&output)?;
    assert!(text.contains(",5000,END"), "{}", text);
    Ok(())
}
