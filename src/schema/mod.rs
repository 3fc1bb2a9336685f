//! JSON-Schema + custom format validation of rule and globals documents,
//! run against the raw YAML (as `serde_json::Value`) before shorthand
//! lowering. spec.md §4.3.

pub mod formats;

use std::path::Path;
use std::sync::OnceLock;

use jsonschema::Validator;
use serde_json::Value;

use crate::diagnostics::{Diagnostic, Diagnostics};

const RULES_SCHEMA_V1: &str = include_str!("schemas/rules-1.json");
const GLOBALS_SCHEMA_V1: &str = include_str!("schemas/globals-1.json");

fn build_validator(schema_src: &str) -> Validator {
    let schema: Value = serde_json::from_str(schema_src).expect("bundled schema is valid JSON");
    jsonschema::options()
        .with_draft(jsonschema::Draft::Draft4)
        .with_format("http-header-field-name", |s: &str| {
            formats::http_header_field_name(s)
        })
        .with_format("http-header-field-value", |s: &str| {
            formats::http_header_field_value(s)
        })
        .with_format("uri", |s: &str| formats::uri(s))
        .with_format("uri-path", |s: &str| formats::uri_path(s))
        .with_format("uri-query", |s: &str| formats::uri_query(s))
        .with_format("network", |s: &str| formats::network(s))
        .with_format("hostname_with_port", |s: &str| {
            formats::hostname_with_port(s)
        })
        .with_format("origin", |s: &str| formats::origin(s))
        .with_format("unix_user_or_group", |s: &str| {
            formats::unix_user_or_group(s)
        })
        .with_format("orm_regex", |s: &str| formats::orm_regex(s))
        .with_format("orm_regsub", |s: &str| formats::orm_regsub(s))
        .build(&schema)
        .expect("bundled schema compiles")
}

fn rules_validator() -> &'static Validator {
    static VALIDATOR: OnceLock<Validator> = OnceLock::new();
    VALIDATOR.get_or_init(|| build_validator(RULES_SCHEMA_V1))
}

fn globals_validator() -> &'static Validator {
    static VALIDATOR: OnceLock<Validator> = OnceLock::new();
    VALIDATOR.get_or_init(|| build_validator(GLOBALS_SCHEMA_V1))
}

/// Validate one already-parsed rules document against schema version 1.
/// All violations are reported, not just the first; callers should treat a
/// non-empty result as fatal but keep validating remaining files/documents
/// first so a run reports every schema fault in one pass.
pub fn validate_rule_document(source_file: &Path, doc: &Value) -> Diagnostics {
    validate(source_file, doc, rules_validator())
}

pub fn validate_globals_document(source_file: &Path, doc: &Value) -> Diagnostics {
    validate(source_file, doc, globals_validator())
}

fn validate(source_file: &Path, doc: &Value, validator: &Validator) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    let mut errors: Vec<_> = validator.iter_errors(doc).collect();
    if errors.is_empty() {
        return diagnostics;
    }
    errors.sort_by_key(|e| e.to_string());
    // The shortest instance path is usually the most specific complaint;
    // surface it first the way the Python validator's `best_match` did.
    errors.sort_by_key(|e| e.instance_path.to_string().len());
    for error in &errors {
        diagnostics.push(
            Diagnostic::schema(format!("{} (at {})", error, error.instance_path))
                .with_file(source_file.to_path_buf()),
        );
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_minimal_document_has_no_errors() {
        let doc = json!({
            "schema_version": 1,
            "rules": [
                {
                    "description": "allow root",
                    "domains": ["example.com"],
                    "matches": { "all": [{ "paths": { "exact": ["/"] } }] }
                }
            ]
        });
        let diags = validate_rule_document(Path::new("a.yml"), &doc);
        assert!(diags.is_empty(), "{diags}");
    }

    #[test]
    fn unknown_clause_key_is_rejected() {
        let doc = json!({
            "schema_version": 1,
            "rules": [
                {
                    "description": "bad",
                    "domains": ["example.com"],
                    "matches": { "all": [{ "paths": { "not_a_real_key": true } }] }
                }
            ]
        });
        let diags = validate_rule_document(Path::new("a.yml"), &doc);
        assert!(!diags.is_empty());
    }

    #[test]
    fn bad_network_format_is_rejected() {
        let doc = json!({
            "schema_version": 1,
            "internal_networks": ["10.0.0.0/40"]
        });
        let diags = validate_globals_document(Path::new("globals.yml"), &doc);
        assert!(!diags.is_empty());
    }
}
