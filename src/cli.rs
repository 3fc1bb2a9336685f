//! CLI front end and single-threaded pipeline driver (spec.md §5, §6).
//!
//! `run` is the only place phases are sequenced: list rule files, load
//! globals, validate (schema + collision) unless `--no-check`, merge rules
//! into the IR, emit the two artifacts unless `--check`, then optionally
//! run carried tests against `--test-target`. Every phase reports through
//! `diagnostics::Diagnostics`; `Kind::Input` faults abort immediately, the
//! rest accumulate and are reported together before a non-zero exit.

use std::path::{Path, PathBuf};

use clap::Parser as ClapParser;
use serde::Deserialize;

use crate::collision::{self, FsmCache};
use crate::config::Globals;
use crate::diagnostics::{Diagnostics, InputError};
use crate::emit;
use crate::logging;
use crate::output;
use crate::rules;
use crate::schema;
use crate::testrun;

#[derive(ClapParser)]
#[command(
    name = "routecomp",
    version,
    about = "Compiles declarative YAML routing rules into cache-tier and load-balancer configuration"
)]
struct Args {
    /// Directory to write both artifact files into.
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Glob selecting rule YAML files.
    #[arg(
        short = 'r',
        long = "orm-rules-path",
        value_name = "GLOB",
        default_value = "namespaces/**/*.yml"
    )]
    orm_rules_path: String,

    /// Globals document (TLS certs, DNS, internal networks, defaults, ...).
    #[arg(short = 'G', long = "globals-path", value_name = "FILE")]
    globals_path: Option<PathBuf>,

    /// Persistent FSM cache file; omit to disable caching.
    #[arg(long = "cache-path", value_name = "FILE")]
    cache_path: Option<PathBuf>,

    /// Validate only, do not emit.
    #[arg(short = 'c', long = "check")]
    check: bool,

    /// Skip schema and collision validation.
    #[arg(short = 'C', long = "no-check")]
    no_check: bool,

    /// Run carried tests against this URL after emission.
    #[arg(short = 't', long = "test-target", value_name = "URL")]
    test_target: Option<String>,

    /// Skip TLS verification while running tests.
    #[arg(short = 'k', long = "test-target-insecure")]
    test_target_insecure: bool,
}

/// Entry point. Returns the process exit code (0 success, 1 failure).
pub fn run() -> i32 {
    yansi::whenever(yansi::Condition::TTY_AND_COLOR);
    logging::init();

    let args = Args::parse();

    // Handled here rather than via clap's `conflicts_with` so the exit code
    // matches spec.md §6's "conflicting flags" entry in the exit-code table
    // (1, not clap's own usage-error code of 2).
    if args.check && args.no_check {
        eprintln!("routecomp: --check and --no-check are mutually exclusive");
        return 1;
    }

    let rule_files = match tracing::info_span!("list_rule_files")
        .in_scope(|| rules::list_rule_files(&args.orm_rules_path))
    {
        Ok(files) => files,
        Err(e) => return fatal(&e),
    };

    let globals = match load_globals(args.globals_path.as_deref()) {
        Ok(g) => g,
        Err(e) => return fatal(&e),
    };

    let do_validate = !args.no_check;

    if do_validate {
        let schema_diags = match tracing::info_span!("schema_validate")
            .in_scope(|| validate_schema(&rule_files, args.globals_path.as_deref()))
        {
            Ok(diags) => diags,
            Err(e) => return fatal(&e),
        };
        if !schema_diags.is_empty() {
            output::print_diagnostics(&schema_diags);
            return 1;
        }
    }

    let (rule_set, mut diagnostics) = match tracing::info_span!("parse_rules")
        .in_scope(|| rules::merge(&rule_files, globals.defaults.https_redirection))
    {
        Ok(result) => result,
        Err(e) => return fatal(&e),
    };

    if do_validate {
        let mut cache = load_cache(args.cache_path.as_deref());
        let collision_diags = tracing::info_span!("collision_check")
            .in_scope(|| collision::check(&rule_set, &mut cache));
        diagnostics.extend(collision_diags);
        if let Some(path) = &args.cache_path {
            if let Err(e) = cache.save(path) {
                tracing::warn!(%e, path = %path.display(), "failed to persist FSM cache");
            }
        }
    }

    if !diagnostics.is_empty() {
        output::print_diagnostics(&diagnostics);
        return 1;
    }

    if args.check {
        println!("{}", output::rule_summary_table(&rule_set));
        return 0;
    }

    let Some(output_dir) = &args.output_dir else {
        eprintln!("routecomp: --output-dir is required unless --check is set");
        return 1;
    };

    match tracing::info_span!("emit")
        .in_scope(|| emit_artifacts(&rule_set, &globals, output_dir))
    {
        Ok(None) => {}
        Ok(Some(emitter_diags)) => {
            output::print_diagnostics(&emitter_diags);
            return 1;
        }
        Err(msg) => {
            eprintln!("routecomp: {msg}");
            return 1;
        }
    }

    println!("{}", output::rule_summary_table(&rule_set));

    if let Some(target) = &args.test_target {
        if let Err(failure) =
            tracing::info_span!("run_tests").in_scope(|| {
                testrun::run_all(&rule_set.tests, target, args.test_target_insecure)
            })
        {
            eprintln!("routecomp: {failure}");
            return 1;
        }
    }

    0
}

/// Renders both artifacts before writing either, so an emitter fault in the
/// lb-tier back-end never leaves a half-written output directory behind
/// (spec.md §5: "output files are written only after successful emission").
/// Returns `Ok(Some(diagnostics))` for `Kind::Emitter` faults (e.g. an
/// unknown origin scheme) discovered while rendering; `Err` covers template
/// and filesystem failures, which abort immediately like any other fault.
fn emit_artifacts(
    rule_set: &rules::RuleSet,
    globals: &Globals,
    output_dir: &Path,
) -> Result<Option<Diagnostics>, String> {
    let cache_tier_text = emit::render_cache_tier(rule_set, globals).map_err(|e| e.to_string())?;
    let lb_tier_text = match emit::render_lb_tier(rule_set, globals).map_err(|e| e.to_string())? {
        emit::EmitResult::Faults(diagnostics) => return Ok(Some(diagnostics)),
        emit::EmitResult::Ok(text) => text,
    };
    std::fs::create_dir_all(output_dir)
        .map_err(|e| format!("failed to create output dir {}: {e}", output_dir.display()))?;
    std::fs::write(output_dir.join("cache_tier.vcl"), cache_tier_text)
        .map_err(|e| format!("failed to write cache_tier.vcl: {e}"))?;
    std::fs::write(output_dir.join("lb_tier.cfg"), lb_tier_text)
        .map_err(|e| format!("failed to write lb_tier.cfg: {e}"))?;
    Ok(None)
}

fn fatal(error: &InputError) -> i32 {
    eprintln!("routecomp: {error}");
    1
}

fn load_globals(path: Option<&Path>) -> Result<Globals, InputError> {
    match path {
        None => Ok(Globals::default()),
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|source| InputError::Read {
                path: p.to_path_buf(),
                source,
            })?;
            let count = serde_norway::Deserializer::from_str(&content).count();
            if count != 1 {
                return Err(InputError::GlobalsDocumentCount {
                    path: p.to_path_buf(),
                    count,
                });
            }
            serde_norway::from_str(&content).map_err(|source| InputError::Yaml {
                path: p.to_path_buf(),
                source,
            })
        }
    }
}

fn load_cache(path: Option<&Path>) -> FsmCache {
    match path {
        Some(p) => FsmCache::load(p).unwrap_or_default(),
        None => FsmCache::default(),
    }
}

/// Validate every rule document (plus the globals document, if given)
/// against their JSON schemas. Schema faults accumulate across every file
/// (spec.md §4.3: "continues validating remaining files"); a read or YAML
/// parse fault is `Kind::Input` and aborts the run immediately instead.
fn validate_schema(
    rule_files: &[PathBuf],
    globals_path: Option<&Path>,
) -> Result<Diagnostics, InputError> {
    let mut diagnostics = Diagnostics::new();
    for path in rule_files {
        let content = std::fs::read_to_string(path).map_err(|source| InputError::Read {
            path: path.clone(),
            source,
        })?;
        for de in serde_norway::Deserializer::from_str(&content) {
            let value = serde_json::Value::deserialize(de).map_err(|source| InputError::Yaml {
                path: path.clone(),
                source,
            })?;
            diagnostics.extend(schema::validate_rule_document(path, &value));
        }
    }
    if let Some(globals_path) = globals_path {
        let content = std::fs::read_to_string(globals_path).map_err(|source| InputError::Read {
            path: globals_path.to_path_buf(),
            source,
        })?;
        let value =
            serde_norway::from_str::<serde_json::Value>(&content).map_err(|source| {
                InputError::Yaml {
                    path: globals_path.to_path_buf(),
                    source,
                }
            })?;
        diagnostics.extend(schema::validate_globals_document(globals_path, &value));
    }
    Ok(diagnostics)
}
