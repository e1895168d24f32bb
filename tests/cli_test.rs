use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run_command(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_revelation"))
        .args(args)
        .env_remove("REVELATION_MEDIA_VERSION")
        .env_remove("REVELATION_CCLI")
        .output()
        .expect("Failed to execute command")
}

fn write_markdown(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write markdown file");
    path.to_str().unwrap().to_string()
}

#[test]
fn test_preprocess_command_writes_stdout() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_markdown(
        temp_dir.path(),
        "talk.md",
        "---\ntitle: Talk\n---\n{{darkbg}}\n# Title\nPoint ++",
    );

    let output = run_command(&["preprocess", "-i", &input]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("<!-- .slide: data-darkbg -->"));
    assert!(stdout.contains(r#"Point <!-- .element: class="fragment" -->"#));
    assert!(!stdout.contains("title: Talk"));
}

#[test]
fn test_preprocess_command_writes_output_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_markdown(temp_dir.path(), "talk.md", "# One\n<b onclick=\"x()\">b</b>");
    let output_path = temp_dir.path().join("out").join("talk.processed.md");

    let output = run_command(&[
        "preprocess",
        "-i",
        &input,
        "-o",
        output_path.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let processed = fs::read_to_string(&output_path).expect("Failed to read output file");
    assert_eq!(processed, "# One\n<b>b</b>");
}

#[test]
fn test_preprocess_command_selects_alternative() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_markdown(
        temp_dir.path(),
        "talk.md",
        "---\nalternatives:\n  talk-de.md: Deutsch\n---\n# English",
    );
    write_markdown(temp_dir.path(), "talk-de.md", "# Deutsch");

    let output = run_command(&["preprocess", "-i", &input, "--alternative", "talk-de.md"]);
    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("# Deutsch"));

    let output = run_command(&["preprocess", "-i", &input, "--alternative", "../etc/passwd"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Blocked invalid markdown filename"));
}

#[test]
fn test_preprocess_command_missing_input() {
    let output = run_command(&["preprocess", "-i", "/nonexistent/revelation/talk.md"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}

#[test]
fn test_handout_command_embeds_css() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_markdown(
        temp_dir.path(),
        "talk.md",
        "---\ntitle: Handout\n---\n# First\n***\n# Second\nNote: remember",
    );
    let css_path = temp_dir.path().join("print.css");
    fs::write(&css_path, "body { font-family: serif; }").expect("Failed to write CSS file");
    let output_path = temp_dir.path().join("handout.html");

    let output = run_command(&[
        "handout",
        "-i",
        &input,
        "-o",
        output_path.to_str().unwrap(),
        "--css",
        css_path.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let html = fs::read_to_string(&output_path).expect("Failed to read output file");
    assert!(html.contains("body { font-family: serif; }"));
    assert!(html.contains("<h1>Second</h1>"));
    assert!(html.contains(r#"<div class="note"><p>remember</p>"#));
    assert!(html.contains("index.html?p=talk.md#2/1"));
}

#[test]
fn test_handout_command_links_css() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_markdown(temp_dir.path(), "talk.md", "# Only");
    let output_path = temp_dir.path().join("handout.html");

    let output = run_command(&[
        "handout",
        "-i",
        &input,
        "-o",
        output_path.to_str().unwrap(),
        "--css",
        "css/print.css",
        "--mode",
        "link",
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let html = fs::read_to_string(&output_path).expect("Failed to read output file");
    assert!(html.contains(r#"<link rel="stylesheet" href="css/print.css">"#));
}

#[test]
fn test_engine_config_command_prints_json() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_markdown(
        temp_dir.path(),
        "talk.md",
        "---\nconfig:\n  transition: fade\n---\n# Slide",
    );

    let output = run_command(&["engine-config", "-i", &input, "--query", "forceControls=1"]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(json["transition"], "fade");
    assert_eq!(json["controls"], true);
    assert_eq!(json["slideNumber"], "c/t");
}
