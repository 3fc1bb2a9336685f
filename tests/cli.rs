//! End-to-end tests against the built `routecomp` binary, covering the
//! CLI surface and the scenario seeds from spec.md §8.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("routecomp").unwrap()
}

fn write_rules(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

#[test]
fn successful_run_emits_both_artifacts() {
    let rules_dir = assert_fs::TempDir::new().unwrap();
    let out_dir = assert_fs::TempDir::new().unwrap();
    write_rules(
        rules_dir.path(),
        "a.yml",
        r#"
schema_version: 1
rules:
  - description: "api backend"
    domains: ["example.com"]
    matches: { all: [{ paths: { begins_with: ["/api"] } }] }
    actions:
      backend: { origin: "api-1.internal:8080" }
"#,
    );

    cmd()
        .arg("-r")
        .arg(rules_dir.path().join("*.yml"))
        .arg("-o")
        .arg(out_dir.path())
        .assert()
        .success();

    assert!(out_dir.path().join("cache_tier.vcl").exists());
    assert!(out_dir.path().join("lb_tier.cfg").exists());
    let lb = fs::read_to_string(out_dir.path().join("lb_tier.cfg")).unwrap();
    assert!(lb.contains("api-1.internal"));
}

#[test]
fn check_only_mode_does_not_emit() {
    let rules_dir = assert_fs::TempDir::new().unwrap();
    let out_dir = assert_fs::TempDir::new().unwrap();
    write_rules(
        rules_dir.path(),
        "a.yml",
        r#"
schema_version: 1
rules:
  - description: "plain"
    domains: ["example.com"]
    matches: { all: [{ paths: { exact: ["/a"] } }] }
"#,
    );

    cmd()
        .arg("-r")
        .arg(rules_dir.path().join("*.yml"))
        .arg("-c")
        .assert()
        .success()
        .stdout(predicate::str::contains("example.com"));

    assert!(!out_dir.path().join("cache_tier.vcl").exists());
}

#[test]
fn check_and_no_check_conflict() {
    let rules_dir = assert_fs::TempDir::new().unwrap();
    write_rules(
        rules_dir.path(),
        "a.yml",
        "schema_version: 1\nrules: []\n",
    );

    cmd()
        .arg("-r")
        .arg(rules_dir.path().join("*.yml"))
        .arg("-c")
        .arg("-C")
        .assert()
        .failure()
        .code(1);
}

#[test]
fn rule_id_collision_gets_suffix_end_to_end() {
    let rules_dir = assert_fs::TempDir::new().unwrap();
    let out_dir = assert_fs::TempDir::new().unwrap();
    write_rules(
        rules_dir.path(),
        "a.yml",
        r#"
schema_version: 1
rules:
  - description: "Foo Bar!"
    domains: ["a.example"]
    matches: { all: [{ paths: { exact: ["/one"] } }] }
    actions:
      backend: { origin: "origin.internal" }
  - description: "Foo Bar!"
    domains: ["a.example"]
    matches: { all: [{ paths: { exact: ["/two"] } }] }
    actions:
      backend: { origin: "origin.internal" }
"#,
    );

    cmd()
        .arg("-r")
        .arg(rules_dir.path().join("*.yml"))
        .arg("-o")
        .arg(out_dir.path())
        .assert()
        .success();

    let vcl = fs::read_to_string(out_dir.path().join("cache_tier.vcl")).unwrap();
    assert!(vcl.contains("foo_bar"));
    assert!(vcl.contains("foo_bar_2"));
}

#[test]
fn domain_split_rule_appears_in_both_domains_output() {
    let rules_dir = assert_fs::TempDir::new().unwrap();
    let out_dir = assert_fs::TempDir::new().unwrap();
    write_rules(
        rules_dir.path(),
        "a.yml",
        r#"
schema_version: 1
rules:
  - description: "shared rule"
    domains: ["a.example", "b.example"]
    matches: { all: [{ paths: { exact: ["/shared"] } }] }
    actions:
      backend: { origin: "origin.internal" }
"#,
    );

    cmd()
        .arg("-r")
        .arg(rules_dir.path().join("*.yml"))
        .arg("-o")
        .arg(out_dir.path())
        .assert()
        .success()
        .stdout(
            predicate::str::contains("a.example").and(predicate::str::contains("b.example")),
        );

    let vcl = fs::read_to_string(out_dir.path().join("cache_tier.vcl")).unwrap();
    assert_eq!(vcl.matches("shared_rule").count(), 2);
}

#[test]
fn path_collision_is_reported_and_aborts() {
    let rules_dir = assert_fs::TempDir::new().unwrap();
    let out_dir = assert_fs::TempDir::new().unwrap();
    write_rules(
        rules_dir.path(),
        "a.yml",
        r#"
schema_version: 1
rules:
  - description: "broad"
    domains: ["example.com"]
    matches: { all: [{ paths: { begins_with: ["/api"] } }] }
  - description: "narrow"
    domains: ["example.com"]
    matches: { all: [{ paths: { exact: ["/api/v1"] } }] }
"#,
    );

    cmd()
        .arg("-r")
        .arg(rules_dir.path().join("*.yml"))
        .arg("-o")
        .arg(out_dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("path collision"));

    assert!(!out_dir.path().join("cache_tier.vcl").exists());
}

#[test]
fn ignore_case_collision_is_detected() {
    let rules_dir = assert_fs::TempDir::new().unwrap();
    let out_dir = assert_fs::TempDir::new().unwrap();
    write_rules(
        rules_dir.path(),
        "a.yml",
        r#"
schema_version: 1
rules:
  - description: "mixed case"
    domains: ["example.com"]
    matches: { all: [{ paths: { exact: ["/Foo"], ignore_case: true } }] }
  - description: "lower case"
    domains: ["example.com"]
    matches: { all: [{ paths: { exact: ["/foo"] } }] }
"#,
    );

    cmd()
        .arg("-r")
        .arg(rules_dir.path().join("*.yml"))
        .arg("-o")
        .arg(out_dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("path collision"));
}

#[test]
fn same_path_on_different_domains_does_not_collide() {
    let rules_dir = assert_fs::TempDir::new().unwrap();
    let out_dir = assert_fs::TempDir::new().unwrap();
    write_rules(
        rules_dir.path(),
        "a.yml",
        r#"
schema_version: 1
rules:
  - description: "one"
    domains: ["a.example"]
    matches: { all: [{ paths: { exact: ["/a"] } }] }
  - description: "two"
    domains: ["b.example"]
    matches: { all: [{ paths: { exact: ["/a"] } }] }
"#,
    );

    cmd()
        .arg("-r")
        .arg(rules_dir.path().join("*.yml"))
        .arg("-o")
        .arg(out_dir.path())
        .assert()
        .success();
}

#[test]
fn duplicate_domain_default_is_fatal_and_names_both_rules() {
    let rules_dir = assert_fs::TempDir::new().unwrap();
    let out_dir = assert_fs::TempDir::new().unwrap();
    write_rules(
        rules_dir.path(),
        "a.yml",
        r#"
schema_version: 1
rules:
  - description: "first default"
    domains: ["example.com"]
    domain_default: true
    matches: {}
  - description: "second default"
    domains: ["example.com"]
    domain_default: true
    matches: {}
"#,
    );

    cmd()
        .arg("-r")
        .arg(rules_dir.path().join("*.yml"))
        .arg("-o")
        .arg(out_dir.path())
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("first default").and(predicate::str::contains("second default")),
        );
}

#[test]
fn no_check_skips_collision_detection() {
    let rules_dir = assert_fs::TempDir::new().unwrap();
    let out_dir = assert_fs::TempDir::new().unwrap();
    write_rules(
        rules_dir.path(),
        "a.yml",
        r#"
schema_version: 1
rules:
  - description: "broad"
    domains: ["example.com"]
    matches: { all: [{ paths: { begins_with: ["/api"] } }] }
  - description: "narrow"
    domains: ["example.com"]
    matches: { all: [{ paths: { exact: ["/api/v1"] } }] }
"#,
    );

    cmd()
        .arg("-r")
        .arg(rules_dir.path().join("*.yml"))
        .arg("-o")
        .arg(out_dir.path())
        .arg("-C")
        .assert()
        .success();

    assert!(out_dir.path().join("cache_tier.vcl").exists());
}

#[test]
fn no_check_still_rejects_domain_default_false() {
    let rules_dir = assert_fs::TempDir::new().unwrap();
    let out_dir = assert_fs::TempDir::new().unwrap();
    write_rules(
        rules_dir.path(),
        "a.yml",
        r#"
schema_version: 1
rules:
  - description: "bad"
    domains: ["example.com"]
    domain_default: false
    matches: {}
"#,
    );

    cmd()
        .arg("-r")
        .arg(rules_dir.path().join("*.yml"))
        .arg("-o")
        .arg(out_dir.path())
        .arg("-C")
        .assert()
        .failure();
}

#[test]
fn cache_path_persists_proven_non_colliding_entries_across_runs() {
    let rules_dir = assert_fs::TempDir::new().unwrap();
    let out_dir = assert_fs::TempDir::new().unwrap();
    let cache_path = out_dir.path().join("fsm.cache");
    write_rules(
        rules_dir.path(),
        "a.yml",
        r#"
schema_version: 1
rules:
  - description: "one"
    domains: ["example.com"]
    matches: { all: [{ paths: { exact: ["/a"] } }] }
  - description: "two"
    domains: ["example.com"]
    matches: { all: [{ paths: { exact: ["/b"] } }] }
"#,
    );

    for _ in 0..2 {
        cmd()
            .arg("-r")
            .arg(rules_dir.path().join("*.yml"))
            .arg("-o")
            .arg(out_dir.path())
            .arg("--cache-path")
            .arg(&cache_path)
            .assert()
            .success();
    }

    assert!(cache_path.exists());
    let contents = fs::read_to_string(&cache_path).unwrap();
    assert!(!contents.trim().is_empty());
}

#[test]
fn schema_violation_is_reported_as_a_schema_diagnostic() {
    let rules_dir = assert_fs::TempDir::new().unwrap();
    let out_dir = assert_fs::TempDir::new().unwrap();
    write_rules(
        rules_dir.path(),
        "a.yml",
        r#"
schema_version: 1
rules:
  - description: "bad clause"
    domains: ["example.com"]
    matches: { all: [{ paths: { begins_with: ["/ok"], unknown_key: true } }] }
"#,
    );

    cmd()
        .arg("-r")
        .arg(rules_dir.path().join("*.yml"))
        .arg("-o")
        .arg(out_dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("schema"));
}

#[test]
fn missing_rules_glob_is_a_fatal_input_error() {
    let rules_dir = assert_fs::TempDir::new().unwrap();
    let out_dir = assert_fs::TempDir::new().unwrap();

    cmd()
        .arg("-r")
        .arg(rules_dir.path().join("*.yml"))
        .arg("-o")
        .arg(out_dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no files matched"));
}
