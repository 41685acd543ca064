use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn symdex(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_symdex"))
        .args(args)
        .current_dir(dir)
        .env_remove("SYMDEX_CONFIG")
        .output()
        .expect("Failed to run symdex")
}

const ANALYSIS: &str = r#"{
    "relative_path": "app/main.py",
    "entities": [
        { "id": 1, "name": "app", "kind": "namespace" },
        { "id": 2, "name": "main", "kind": "method", "scope": 1 },
        { "id": 3, "name": "requests", "kind": "namespace",
          "defined_in": "/venv/site-packages/requests/__init__.py" }
    ],
    "occurrences": [
        { "entity": 3, "range": [0, 7, 15], "roles": ["import"] },
        { "entity": 2, "range": [2, 4, 8], "roles": ["definition"] }
    ]
}"#;

const SOURCE: &str = "import requests\n\ndef main():\n    pass\n";

const ENVIRONMENT: &str = r#"[
    { "name": "requests", "version": "2.31.0", "files": ["/venv/site-packages/requests/"] }
]"#;

/// A project with analyzer output and a cached environment.
fn project(temp_path: &Path) {
    fs::create_dir_all(temp_path.join("app")).unwrap();
    fs::write(temp_path.join("app/main.py"), SOURCE).unwrap();
    fs::create_dir_all(temp_path.join("analysis")).unwrap();
    fs::write(temp_path.join("analysis/main.json"), ANALYSIS).unwrap();
    fs::write(temp_path.join("environment.json"), ENVIRONMENT).unwrap();
}

fn index_args<'a>(extra: &[&'a str]) -> Vec<&'a str> {
    let mut args = vec![
        "index",
        "--analysis",
        "analysis",
        "--output",
        "out/index.scip",
        "--project-root",
        ".",
        "--project-name",
        "my-app",
        "--project-version",
        "1.0",
        "--environment",
        "environment.json",
        "--threads",
        "2",
    ];
    args.extend_from_slice(extra);
    args
}

#[test]
fn test_init_command() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    let output = symdex(temp_path, &["init"]);
    assert!(output.status.success());

    let config_path = temp_path.join(".symdex/settings.toml");
    assert!(config_path.exists());

    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("version = 1"));
    assert!(content.contains("[indexing]"));
    assert!(content.contains("[packages]"));

    // Refuses to overwrite without --force
    let again = symdex(temp_path, &["init"]);
    assert!(!again.status.success());

    let forced = symdex(temp_path, &["init", "--force"]);
    assert!(forced.status.success());
}

#[test]
fn test_config_command() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    let config_dir = temp_path.join(".symdex");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("settings.toml"),
        "version = 2\n[indexing]\nthreads = 99\n[packages]\nmanager = \"npm\"\n",
    )
    .unwrap();

    let output = symdex(temp_path, &["config"]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("version = 2"));
    assert!(stdout.contains("threads = 99"));
    assert!(stdout.contains("manager = \"npm\""));
}

#[test]
fn test_index_command_writes_index_and_snapshots() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();
    project(temp_path);

    let output = symdex(temp_path, &index_args(&["--snapshot-dir", "snapshots"]));
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let index = symdex::load_index(&temp_path.join("out/index.scip")).unwrap();
    assert_eq!(index.documents.len(), 1);
    assert_eq!(index.documents[0].relative_path, "app/main.py");
    assert_eq!(index.metadata.tool_info.name, "symdex");

    let snapshot = fs::read_to_string(temp_path.join("snapshots/app/main.py")).unwrap();
    assert_eq!(
        snapshot,
        "import requests\n\
         #      ^^^^^^^^ reference import scip-python pypi requests 2.31.0 requests/\n\
         \n\
         def main():\n\
         #   ^^^^ definition scip-python pypi my-app 1.0 app/main().\n\
         \x20   pass\n"
    );
}

#[test]
fn test_index_command_fails_on_broken_file() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();
    project(temp_path);
    fs::write(
        temp_path.join("analysis/zz_broken.json"),
        r#"{ "relative_path": "app/broken.py", "occurrences": [ { "entity": 9, "range": [0, 0, 1] } ] }"#,
    )
    .unwrap();

    // Continue: the index is still written, the exit code reports the failure
    let output = symdex(temp_path, &index_args(&[]));
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("app/broken.py"));

    let index = symdex::load_index(&temp_path.join("out/index.scip")).unwrap();
    assert_eq!(index.documents.len(), 1);

    // Abort: nothing is written
    fs::remove_dir_all(temp_path.join("out")).unwrap();
    let output = symdex(temp_path, &index_args(&["--abort-on-error"]));
    assert!(!output.status.success());
    assert!(!temp_path.join("out/index.scip").exists());
}

#[test]
fn test_index_command_survives_malformed_analysis() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();
    project(temp_path);
    fs::write(temp_path.join("analysis/bad.json"), "{ truncated").unwrap();

    let output = symdex(temp_path, &index_args(&[]));
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("bad.json"));

    let index = symdex::load_index(&temp_path.join("out/index.scip")).unwrap();
    assert_eq!(index.documents.len(), 1);
    assert_eq!(index.documents[0].relative_path, "app/main.py");
}

#[test]
fn test_index_command_requires_readable_environment() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();
    project(temp_path);
    fs::write(temp_path.join("environment.json"), "not json").unwrap();

    let output = symdex(temp_path, &index_args(&[]));
    assert!(!output.status.success());
    assert!(!temp_path.join("out/index.scip").exists());
}

#[test]
fn test_snapshot_command_checks_committed_suite() {
    let temp_dir = TempDir::new().unwrap();
    let suite = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/snapshots");

    let output = symdex(
        temp_dir.path(),
        &["snapshot", suite.to_str().unwrap(), "--check"],
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("0 mismatches"));

    let missing = symdex(
        temp_dir.path(),
        &["snapshot", suite.to_str().unwrap(), "--check", "--only", "no_such_case"],
    );
    assert!(missing.status.success());
}
