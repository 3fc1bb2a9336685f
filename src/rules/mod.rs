//! Rule Parser: lifts YAML documents into rules + tests, normalizes match
//! shorthand, assigns rule identities, merges defaults. spec.md §4.2.

pub mod actions;
mod ids;
mod raw;
mod shorthand;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::diagnostics::{Diagnostic, Diagnostics, InputError};
use crate::ir::MatchTree;

pub use actions::Actions;
pub use raw::{RawBodyExpect, RawDocument, RawHeaderExpect};

/// One routing directive, fully lowered: canonical match tree, ordered
/// action configuration, and provenance for error reporting.
#[derive(Debug, Clone)]
pub struct Rule {
    pub rule_id: String,
    pub description: String,
    pub source_file: PathBuf,
    pub domains: Vec<String>,
    pub domain_default: bool,
    pub matches: MatchTree,
    pub actions: Actions,
}

/// A carried test; used only by the external test runner (spec.md §6).
#[derive(Debug, Clone)]
pub struct Test {
    pub name: String,
    pub request_url: String,
    pub expect_status: Option<u16>,
    pub expect_body: Vec<RawBodyExpect>,
    pub expect_headers: Vec<RawHeaderExpect>,
    pub source_file: PathBuf,
}

/// All rules and tests from a run, pivoted by domain. `rules` preserves
/// global merge order (file-list order, then document order, then declared
/// order); `by_domain` indexes into it preserving the same order per domain.
#[derive(Debug, Default)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
    pub by_domain: BTreeMap<String, Vec<usize>>,
    pub tests: Vec<Test>,
}

impl RuleSet {
    pub fn domain_rules(&self, domain: &str) -> impl Iterator<Item = &Rule> {
        self.by_domain
            .get(domain)
            .into_iter()
            .flatten()
            .map(move |&i| &self.rules[i])
    }
}

/// List rule files matching a glob pattern, sorted for deterministic
/// `rule_id` assignment.
pub fn list_rule_files(pattern: &str) -> Result<Vec<PathBuf>, InputError> {
    let mut paths = Vec::new();
    let entries = glob::glob(pattern).map_err(|source| InputError::BadGlob {
        pattern: pattern.to_string(),
        source,
    })?;
    for entry in entries {
        // A glob entry error (e.g. a permission-denied directory) is treated
        // like any other unreadable path would be further down the pipeline;
        // silently skipping it would make the rule set non-deterministic.
        if let Ok(path) = entry {
            if path.is_file() {
                paths.push(path);
            }
        }
    }
    paths.sort();
    if paths.is_empty() {
        return Err(InputError::EmptyGlob {
            pattern: pattern.to_string(),
        });
    }
    Ok(paths)
}

fn load_documents(path: &Path) -> Result<Vec<RawDocument>, InputError> {
    let content = std::fs::read_to_string(path).map_err(|source| InputError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut docs = Vec::new();
    for de in serde_norway::Deserializer::from_str(&content) {
        let doc = RawDocument::deserialize(de).map_err(|source| InputError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        docs.push(doc);
    }
    Ok(docs)
}

/// Merge all rule files (in file-list order) into one `RuleSet`, assigning
/// rule ids from a single global counter and applying the
/// `https_redirection` default (spec.md §4.2 rule 3, P3).
pub fn merge(
    paths: &[PathBuf],
    https_redirection_default: bool,
) -> Result<(RuleSet, Diagnostics), InputError> {
    let mut ids = ids::RuleIdAllocator::new();
    let mut rule_set = RuleSet::default();
    let mut diagnostics = Diagnostics::new();

    for path in paths {
        for doc in load_documents(path)? {
            if doc.schema_version != 1 {
                return Err(InputError::UnsupportedSchemaVersion {
                    path: path.clone(),
                    version: doc.schema_version,
                });
            }
            for raw_rule in doc.rules {
                let rule_id = ids.allocate(&raw_rule.description);
                let matches = shorthand::lower(&raw_rule.domains, &raw_rule.matches);
                let mut actions = raw_rule.actions;

                let mut domain_default = false;
                match raw_rule.domain_default {
                    Some(true) => domain_default = true,
                    Some(false) => {
                        diagnostics.push(
                            Diagnostic::constraint(
                                "domain_default: false is not allowed; omit the key instead",
                            )
                            .with_file(path.clone())
                            .with_rule_id(rule_id.clone()),
                        );
                    }
                    None => {}
                }

                if https_redirection_default && actions.redirect.is_none() {
                    actions.https_redirection.get_or_insert(true);
                }

                let index = rule_set.rules.len();
                for domain in &raw_rule.domains {
                    rule_set
                        .by_domain
                        .entry(domain.clone())
                        .or_default()
                        .push(index);
                }
                rule_set.rules.push(Rule {
                    rule_id,
                    description: raw_rule.description,
                    source_file: path.clone(),
                    domains: raw_rule.domains,
                    domain_default,
                    matches,
                    actions,
                });
            }
            for raw_test in doc.tests {
                rule_set.tests.push(Test {
                    name: raw_test.name,
                    request_url: raw_test.request.url,
                    expect_status: raw_test.expect.as_ref().and_then(|e| e.status),
                    expect_body: raw_test.expect.as_ref().map(|e| e.body.clone()).unwrap_or_default(),
                    expect_headers: raw_test
                        .expect
                        .as_ref()
                        .map(|e| e.headers.clone())
                        .unwrap_or_default(),
                    source_file: path.clone(),
                });
            }
        }
    }

    Ok((rule_set, diagnostics))
}
