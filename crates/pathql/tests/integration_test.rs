//! Integration tests for the `pathql-query` binary.
//!
//! These tests run the binary against fact bases written to temporary files.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::NamedTempFile;

// ============================================================================
// Helper Functions
// ============================================================================

const FACTS: &str = r#"{
    "entities": {
        "class": [
            {"id": 1, "name": "MyClass", "methodCount": 3},
            {"id": 2, "name": "Other", "methodCount": 0}
        ],
        "method": [
            {"id": 10, "name": "doSomething", "class_id": 1},
            {"id": 11, "name": "helper", "class_id": 2}
        ]
    },
    "relationships": [
        {"entity": "class", "attribute": "methods", "related": ["method"]}
    ]
}"#;

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn pathql_query(facts: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pathql-query"))
        .arg(facts)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run pathql-query")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn test_single_entity_query() {
    let facts = write_temp(FACTS);
    let output = pathql_query(
        facts.path(),
        &["FROM class AS c WHERE c.methodCount > 1 SELECT c"],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("MyClass"));
    assert!(!out.contains("Other"));
    assert!(out.trim_end().ends_with("1 row(s)"));
}

#[test]
fn test_query_split_over_arguments() {
    let facts = write_temp(FACTS);
    let output = pathql_query(
        facts.path(),
        &["FROM", "class", "AS", "c", "WHERE", "c.methodCount", "==", "0", "SELECT", "c"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Other"));
}

#[test]
fn test_related_query_json() {
    let facts = write_temp(FACTS);
    let output = pathql_query(
        facts.path(),
        &[
            "--format",
            "json",
            "FROM class AS c, method AS m WHERE c.name != m.name SELECT c, m",
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["row_count"], 2);
    assert_eq!(json["rows"][0]["c.id"], 1);
    assert_eq!(json["rows"][0]["m.class_id"], 1);
    assert_eq!(json["entities"], serde_json::json!(["class", "method"]));
    assert!(json.get("trace").is_none());
}

#[test]
fn test_query_file_and_output_file() {
    let facts = write_temp(FACTS);
    let query = write_temp(
        "predicate busy(class k) { k.methodCount > 1 }\n\
         FROM class AS c WHERE busy(c) SELECT c\n",
    );
    let out_dir = tempfile::tempdir().unwrap();
    let out_path = out_dir.path().join("result.txt");

    let output = pathql_query(
        facts.path(),
        &[
            "-F",
            query.path().to_str().unwrap(),
            "-o",
            out_path.to_str().unwrap(),
            "--trace",
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).is_empty());

    let written = std::fs::read_to_string(&out_path).unwrap();
    assert!(written.contains("MyClass"));
    assert!(written.contains("busy(c) [predicate_call]"));
}

#[test]
fn test_pagination() {
    let facts = write_temp(FACTS);
    let output = pathql_query(
        facts.path(),
        &["--size", "1", "--page", "2", "FROM class AS c SELECT c"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Other"));
    assert!(!out.contains("MyClass"));
    assert!(out.contains("1 of 2 row(s)"));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_syntax_error_exits_non_zero() {
    let facts = write_temp(FACTS);
    let output = pathql_query(facts.path(), &["FROM class AS c WHERE c.name == SELECT c"]);

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("P0003"), "stderr: {err}");
    assert!(err.contains("failed to build query"));
}

#[test]
fn test_missing_entity_data_fails() {
    let facts = write_temp(FACTS);
    let output = pathql_query(facts.path(), &["FROM field AS f WHERE f.name == \"x\" SELECT f"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("no data for entity `field`"));
}

#[test]
fn test_join_limit_flag() {
    let facts = write_temp(FACTS);
    let output = pathql_query(
        facts.path(),
        &[
            "--max-join-pairs",
            "3",
            "FROM class AS c, method AS m WHERE c.name != m.name SELECT c",
        ],
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("exceeds the limit of 3 row pairs"));
}

#[test]
fn test_missing_facts_file() {
    let output = pathql_query(Path::new("/nonexistent/facts.json"), &["FROM c AS c SELECT c"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("file not found"));
}

#[test]
fn test_invalid_facts_file() {
    let facts = write_temp("{\"entities\": 3}");
    let output = pathql_query(facts.path(), &["FROM class AS c SELECT c"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("invalid fact base"));
}
