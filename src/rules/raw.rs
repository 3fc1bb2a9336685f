//! Raw (pre-lowering) YAML shapes for rule documents. These deserialize
//! directly from the YAML surface described in spec.md §3/§4.2; the
//! shorthand lowering in `shorthand.rs` turns them into `ir::MatchTree`.

use serde::Deserialize;
use std::path::PathBuf;

use super::actions::Actions;

#[derive(Debug, Deserialize)]
pub struct RawDocument {
    #[serde(default = "default_schema_version")]
    pub schema_version: u64,
    #[serde(default)]
    pub rules: Vec<RawRule>,
    #[serde(default)]
    pub tests: Vec<RawTest>,
}

fn default_schema_version() -> u64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct RawRule {
    pub description: String,
    pub domains: Vec<String>,
    #[serde(default)]
    pub domain_default: Option<bool>,
    #[serde(default)]
    pub matches: RawMatches,
    #[serde(default)]
    pub actions: Actions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMatches {
    #[serde(default)]
    pub all: Vec<RawClause>,
    #[serde(default)]
    pub any: Vec<RawClause>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawClause {
    Paths { paths: RawPathsClause },
    Query { query: RawQueryClause },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawPathsClause {
    #[serde(default)]
    pub exact: Vec<String>,
    #[serde(default)]
    pub regex: Vec<String>,
    #[serde(default)]
    pub begins_with: Vec<String>,
    #[serde(default)]
    pub ends_with: Vec<String>,
    #[serde(default)]
    pub contains: Vec<String>,
    #[serde(default)]
    pub ignore_case: bool,
    #[serde(default)]
    pub not: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawQueryClause {
    pub parameter: String,
    #[serde(default)]
    pub exist: bool,
    #[serde(default)]
    pub exact: Vec<String>,
    #[serde(default)]
    pub regex: Vec<String>,
    #[serde(default)]
    pub begins_with: Vec<String>,
    #[serde(default)]
    pub ends_with: Vec<String>,
    #[serde(default)]
    pub contains: Vec<String>,
    #[serde(default)]
    pub ignore_case: bool,
    #[serde(default)]
    pub not: bool,
}

#[derive(Debug, Deserialize)]
pub struct RawTest {
    pub name: String,
    pub request: RawRequest,
    #[serde(default)]
    pub expect: Option<RawExpect>,
}

#[derive(Debug, Deserialize)]
pub struct RawRequest {
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawExpect {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub body: Vec<RawBodyExpect>,
    #[serde(default)]
    pub headers: Vec<RawHeaderExpect>,
}

#[derive(Debug, Deserialize)]
pub struct RawBodyExpect {
    pub regex: String,
}

#[derive(Debug, Deserialize)]
pub struct RawHeaderExpect {
    pub field: String,
    pub regex: String,
}

/// A rule document tagged with the file it came from, for provenance.
pub struct LoadedDocument {
    pub source_file: PathBuf,
    pub document: RawDocument,
}
