use std::path::Path;

use predicates::prelude::*;
use storylight::dom::Document;

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/bridge.html");
const URL: &str = "https://news.example/bridge";

fn stdout_lines(output: &std::process::Output) -> Vec<serde_json::Value> {
    String::from_utf8(output.stdout.clone())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Stacks the story's paragraphs 400px apart, skipping the advertisement.
fn write_layout(path: &Path) {
    let doc = Document::parse_html(&std::fs::read_to_string(FIXTURE).unwrap());
    let story = doc.element_by_id("story").unwrap();
    let paragraphs: Vec<_> = doc
        .elements_by_tag(story, "p")
        .into_iter()
        .filter(|p| doc.inner_text(*p) != "Advertisement")
        .collect();
    assert_eq!(paragraphs.len(), 3);

    let boxes: serde_json::Map<String, serde_json::Value> = paragraphs
        .iter()
        .enumerate()
        .map(|(index, node)| {
            (
                node.0.to_string(),
                serde_json::json!({"top": 10.0 + index as f64 * 400.0, "height": 400.0}),
            )
        })
        .collect();
    let layout = serde_json::json!({"viewport_height": 800.0, "boxes": boxes});
    std::fs::write(path, serde_json::to_vec(&layout).unwrap()).unwrap();
}

#[test]
fn first_visit_extracts_and_stores_then_lookup_hits() {
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("storylight");
    let output = cmd
        .env_remove("STORYLIGHT_BACKGROUND_URL")
        .args(["read", "--html", FIXTURE, "--url", URL, "--data-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .get_output()
        .clone();
    assert_eq!(
        stdout_lines(&output),
        vec![serde_json::json!({"paragraph_index": 0, "color": "#000000"})]
    );

    let key = storylight::sync::store::article_key(URL);
    assert!(dir.path().join("articles").join(format!("{key}.json")).exists());

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("storylight");
    cmd.args(["lookup", "--url", URL, "--data-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status": "hit""#))
        .stdout(predicate::str::contains("Residents raised concerns"));
}

#[test]
fn cached_visit_replays_scrolling_and_saves_colours() {
    let dir = tempfile::tempdir().unwrap();
    let layout = dir.path().join("layout.json");
    write_layout(&layout);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("storylight");
    cmd.args(["read", "--html", FIXTURE, "--url", URL, "--data-dir"])
        .arg(dir.path())
        .assert()
        .success();

    let marked = dir.path().join("marked.html");
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("storylight");
    let output = cmd
        .env("RUST_LOG", "info")
        .args(["read", "--html", FIXTURE, "--url", URL, "--color", "1=#ff0000"])
        .arg("--layout")
        .arg(&layout)
        .args(["--scroll", "0", "100", "300"])
        .arg("--data-dir")
        .arg(dir.path())
        .arg("--out-html")
        .arg(&marked)
        .assert()
        .success()
        .stderr(predicate::str::contains("reading session ready"))
        .get_output()
        .clone();
    assert_eq!(
        stdout_lines(&output),
        vec![
            serde_json::json!({"paragraph_index": 0, "color": "#000000"}),
            serde_json::json!({"paragraph_index": 1, "color": "#ff0000"}),
        ]
    );

    let html = std::fs::read_to_string(&marked).unwrap();
    assert!(html.contains(r#"id="storyLight-paragraph-id-2-color-input""#));
    assert!(html.contains("fill: #ff0000;"));

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("storylight");
    let output = cmd
        .args(["lookup", "--url", URL, "--data-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .get_output()
        .clone();
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        outcome["article"]["colors"],
        serde_json::json!(["#000000", "#ff0000", "#000000"])
    );
}

#[test]
fn read_needs_a_store() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("storylight");
    cmd.env_remove("STORYLIGHT_DATA_DIR")
        .env_remove("STORYLIGHT_BACKGROUND_URL")
        .args(["read", "--html", FIXTURE, "--url", URL])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no article store configured"));
}

#[test]
fn scrolling_needs_a_layout() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("storylight");
    cmd.args(["read", "--html", FIXTURE, "--url", URL, "--scroll", "10", "--data-dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--scroll needs a --layout snapshot"));
}
