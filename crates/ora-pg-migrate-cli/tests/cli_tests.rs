//! CLI integration tests for ora-pg-migrate.
//!
//! These tests verify command-line argument parsing, help output,
//! exit codes, and the output of each subcommand against a small registry.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Get a command for the ora-pg-migrate binary.
fn cmd() -> Command {
    Command::cargo_bin("ora-pg-migrate").unwrap()
}

const REGISTRY: &str = r#"{
  "tables": [
    {
      "schema": "REMOTE",
      "name": "EMPLOYEES",
      "columns": [
        { "name": "ID", "data_type": "NUMBER", "nullable": false },
        { "name": "LAST_NAME", "data_type": "VARCHAR2", "length": 50 }
      ],
      "constraints": [
        { "name": "PK_EMP", "kind": "PRIMARY_KEY", "columns": ["ID"] },
        {
          "name": "FK_EMP_DEPT",
          "kind": "R",
          "columns": ["ID"],
          "referenced_schema": "REMOTE",
          "referenced_table": "DEPARTMENTS",
          "referenced_columns": ["ID"]
        }
      ]
    }
  ],
  "synonyms": [
    {
      "schema": "HR",
      "name": "EMPS",
      "referenced_schema": "REMOTE",
      "referenced_name": "EMPLOYEES",
      "referenced_type": "TABLE"
    },
    {
      "schema": "HR",
      "name": "GHOST",
      "referenced_schema": "REMOTE",
      "referenced_name": "MISSING",
      "referenced_type": "TABLE"
    }
  ],
  "indexes": [
    {
      "name": "UX_EMP_ID",
      "schema": "REMOTE",
      "table": "EMPLOYEES",
      "unique": true,
      "columns": [{ "name": "ID", "position": 1 }]
    },
    {
      "name": "IX_EMP_NAME",
      "schema": "REMOTE",
      "table": "EMPLOYEES",
      "columns": [{ "name": "LAST_NAME", "position": 1 }]
    },
    {
      "name": "BX_EMP_NAME",
      "schema": "REMOTE",
      "table": "EMPLOYEES",
      "index_type": "BITMAP",
      "columns": [{ "name": "LAST_NAME", "position": 1 }]
    }
  ]
}"#;

/// Write a registry snapshot and a config pointing at it.
fn make_workspace() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let registry = dir.path().join("registry.json");
    std::fs::write(&registry, REGISTRY).unwrap();
    let config = write_config(dir.path(), &registry, "");
    (dir, config)
}

fn write_config(dir: &Path, registry: &Path, extra: &str) -> PathBuf {
    let config = dir.join("config.yaml");
    let mut file = std::fs::File::create(&config).unwrap();
    writeln!(file, "input:").unwrap();
    writeln!(file, "  registry: {}", registry.display()).unwrap();
    write!(file, "{}", extra).unwrap();
    config
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("convert"))
        .stdout(predicate::str::contains("resolve-type"))
        .stdout(predicate::str::contains("resolve-table"))
        .stdout(predicate::str::contains("index-report"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn test_convert_subcommand_help() {
    cmd()
        .args(["convert", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--spec-only"))
        .stdout(predicate::str::contains("--keep-going"));
}

#[test]
fn test_resolve_type_subcommand_help() {
    cmd()
        .args(["resolve-type", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--schema"))
        .stdout(predicate::str::contains("--expr"))
        .stdout(predicate::str::contains("--from"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ora-pg-migrate"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_log_format_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"));
}

#[test]
fn test_verbosity_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_config_default_path() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_short_config_flag() {
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_3() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "validate"])
        .assert()
        .code(3);
}

#[test]
fn test_invalid_yaml_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_registry_field_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "output:").unwrap();
    writeln!(file, "  include_comments: false").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_registry_file_exits_with_code_3() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &dir.path().join("absent.json"), "");

    cmd()
        .args(["--config", config.to_str().unwrap(), "validate"])
        .assert()
        .code(3);
}

#[test]
fn test_invalid_synonym_depth_exits_with_code_2() {
    let dir = tempfile::tempdir().unwrap();
    let registry = dir.path().join("registry.json");
    std::fs::write(&registry, REGISTRY).unwrap();
    let config = write_config(
        dir.path(),
        &registry,
        "conversion:\n  max_synonym_depth: 0\n",
    );

    cmd()
        .args(["--config", config.to_str().unwrap(), "validate"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("max_synonym_depth"));
}

// =============================================================================
// Subcommand Output Tests
// =============================================================================

#[test]
fn test_validate_prints_counts() {
    let (_dir, config) = make_workspace();

    cmd()
        .args(["--config", config.to_str().unwrap(), "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration and registry are valid"))
        .stdout(predicate::str::contains("Tables: 1"))
        .stdout(predicate::str::contains("Synonyms: 2"));
}

#[test]
fn test_validate_json_output() {
    let (_dir, config) = make_workspace();

    cmd()
        .args(["--config", config.to_str().unwrap(), "--output-json", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"indexes\": 3"));
}

#[test]
fn test_convert_writes_script_to_stdout() {
    let (_dir, config) = make_workspace();

    cmd()
        .args(["--config", config.to_str().unwrap(), "convert"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-- Config hash: "))
        .stdout(predicate::str::contains("CREATE SCHEMA IF NOT EXISTS remote;"))
        .stdout(predicate::str::contains("CREATE TABLE remote.employees ("))
        .stdout(predicate::str::contains(
            "ALTER TABLE remote.employees ADD CONSTRAINT pk_emp PRIMARY KEY (id);",
        ))
        .stdout(predicate::str::contains("ux_emp_id").not())
        .stdout(predicate::str::contains("FK_EMP_DEPT").not());
}

#[test]
fn test_convert_writes_output_file() {
    let (dir, config) = make_workspace();
    let output = dir.path().join("out.sql");

    cmd()
        .args([
            "--config",
            config.to_str().unwrap(),
            "convert",
            "--output",
            output.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Conversion completed!"))
        .stdout(predicate::str::contains("Skipped: 1"));

    let sql = std::fs::read_to_string(&output).unwrap();
    assert!(sql.contains("CREATE INDEX ix_emp_name ON remote.employees (last_name)"));
    assert!(sql.contains("UNSUPPORTED INDEX: REMOTE.BX_EMP_NAME"));
}

#[test]
fn test_resolve_table_through_synonym() {
    let (_dir, config) = make_workspace();

    cmd()
        .args([
            "--config",
            config.to_str().unwrap(),
            "resolve-table",
            "--schema",
            "HR",
            "--name",
            "EMPS",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("REMOTE.EMPLOYEES"));
}

#[test]
fn test_resolve_table_dangling_synonym_exits_with_code_4() {
    let (_dir, config) = make_workspace();

    cmd()
        .args([
            "--config",
            config.to_str().unwrap(),
            "resolve-table",
            "--schema",
            "HR",
            "--name",
            "GHOST",
        ])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("non-existent object"));
}

#[test]
fn test_resolve_type_of_column() {
    let (_dir, config) = make_workspace();

    cmd()
        .args([
            "--config",
            config.to_str().unwrap(),
            "resolve-type",
            "--schema",
            "HR",
            "--expr",
            "e.last_name",
            "--from",
            "EMPS:e",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("VARCHAR2"));
}

#[test]
fn test_resolve_type_unknown_column_uses_default() {
    let (_dir, config) = make_workspace();

    cmd()
        .args([
            "--config",
            config.to_str().unwrap(),
            "resolve-type",
            "--schema",
            "HR",
            "--expr",
            "e.nope",
            "--from",
            "EMPS:e",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("varchar2"));
}

#[test]
fn test_index_report() {
    let (_dir, config) = make_workspace();

    cmd()
        .args(["--config", config.to_str().unwrap(), "index-report"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Index Conversion: 2 total, 1 supported (50.0%), 1 unsupported",
        ))
        .stdout(predicate::str::contains("Constraint Conflict: 1"));
}
