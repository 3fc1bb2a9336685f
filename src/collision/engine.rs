//! Path-collision detection: builds one automaton per non-`domain_default`
//! rule from its match tree's `path` conditions, then checks every pair of
//! rules sharing a domain for non-empty intersection. Combination within a
//! condition list uses a balanced divide-and-conquer tree so large `all`/
//! `any` lists combine in parallel rather than one FSM at a time (spec.md
//! §4.4), grounded on `get_match_path_fsm`'s worker-pool submission pattern
//! in the original validator — `rayon::join` stands in for the original's
//! process-pool futures.

use rayon::prelude::*;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::ir::{Function, MatchInput, MatchTree, Op, Source};
use crate::rules::{Rule, RuleSet};

use super::cache::FsmCache;
use super::fsm::{Fsm, FsmError};

fn pattern_for(function: Function, input: &MatchInput) -> Option<String> {
    let value = input.value.as_deref().unwrap_or("");
    match function {
        Function::Regex => Some(value.to_string()),
        Function::Exact => Some(regex::escape(value)),
        Function::BeginsWith => Some(format!("{}.*", regex::escape(value))),
        Function::EndsWith => Some(format!(".*{}", regex::escape(value))),
        Function::Contains => Some(format!(".*{}.*", regex::escape(value))),
        Function::Exist => None,
    }
}

fn combine(fsms: Vec<Fsm>, op: Op) -> Option<Fsm> {
    match fsms.len() {
        0 => None,
        1 => fsms.into_iter().next(),
        _ => {
            let mut fsms = fsms;
            let right = fsms.split_off(fsms.len() / 2);
            let left = fsms;
            let (l, r) = rayon::join(|| combine(left, op), || combine(right, op));
            match (l, r) {
                (Some(l), Some(r)) => Some(match op {
                    Op::All => Fsm::intersect(&l, &r),
                    Op::Any => Fsm::union(&l, &r),
                }),
                (Some(x), None) | (None, Some(x)) => Some(x),
                (None, None) => None,
            }
        }
    }
}

/// Build the automaton for the `path`-sourced portion of a match tree.
/// `domain`/`query`/`method` leaves contribute no constraint and are
/// skipped entirely, matching `handle_match`'s `if src != "path": return
/// None` in the original — domain partitioning and query matching are
/// handled elsewhere, not by the collision engine.
pub fn build_path_fsm(tree: &MatchTree) -> Result<Fsm, FsmError> {
    let mut on_match = |source: Source, function: Function, input: &MatchInput, negate: bool| {
        if source != Source::Path {
            return Ok(None);
        }
        let Some(pattern) = pattern_for(function, input) else {
            return Ok(None);
        };
        let fsm = Fsm::from_pattern(&pattern, input.ignore_case)?;
        Ok(Some(if negate { fsm.complement() } else { fsm }))
    };
    let mut on_list = |results: Vec<Result<Option<Fsm>, FsmError>>, op: Op, negate: bool| {
        let mut fsms = Vec::with_capacity(results.len());
        for result in results {
            if let Some(fsm) = result? {
                fsms.push(fsm);
            }
        }
        let combined = combine(fsms, op);
        Ok(combined.map(|f| if negate { f.complement() } else { f }))
    };
    match tree.fold(&mut on_match, &mut on_list)? {
        Some(fsm) => Ok(fsm),
        // No `path` condition anywhere in the tree: the rule matches every
        // path for its domain.
        None => Fsm::from_pattern(".*", false),
    }
}

/// Synthesize a single regex source string equivalent to the path-sourced
/// portion of `tree`, for entries the cache can round-trip through
/// `Fsm::from_pattern`. `ignore_case` is baked in per leaf via an inline
/// `(?i:...)` group rather than carried as a separate flag, since different
/// leaves in the same tree may disagree on it.
///
/// Returns `None` when no single pattern is equivalent to the tree — this
/// happens for an `all` combination of two or more path-sourced conditions,
/// since regex has no intersection operator. Such rules are simply never
/// cached; they are recomputed (cheaply, via `build_path_fsm`) every run.
fn path_pattern(tree: &MatchTree) -> Option<String> {
    let mut on_match = |source: Source, function: Function, input: &MatchInput, negate: bool| {
        if source != Source::Path {
            return Ok(None);
        }
        let Some(pattern) = pattern_for(function, input) else {
            return Ok(None);
        };
        if negate {
            return Err(());
        }
        Ok(Some(if input.ignore_case {
            format!("(?i:{pattern})")
        } else {
            pattern
        }))
    };
    let mut on_list = |results: Vec<Result<Option<String>, ()>>, op: Op, negate: bool| {
        if negate {
            return Err(());
        }
        let mut patterns = Vec::with_capacity(results.len());
        for result in results {
            if let Some(p) = result? {
                patterns.push(p);
            }
        }
        match (op, patterns.len()) {
            (_, 0) => Ok(None),
            (_, 1) => Ok(Some(patterns.into_iter().next().unwrap())),
            (Op::Any, _) => Ok(Some(format!("(?:{})", patterns.join("|")))),
            (Op::All, _) => Err(()),
        }
    };
    match tree.fold(&mut on_match, &mut on_list) {
        Ok(Some(pattern)) => Some(pattern),
        Ok(None) => Some(".*".to_string()),
        Err(()) => None,
    }
}

struct Entry<'a> {
    rule: &'a Rule,
    cache_key: String,
    fsm: Fsm,
}

/// Check every domain's non-`domain_default` rules against each other,
/// using and refreshing `cache`. Returns one `Constraint` diagnostic per
/// colliding pair plus one per domain with more than one `domain_default`
/// rule. `cache` is left containing only keys that were proven
/// non-colliding, so a later `save` never persists a false negative.
pub fn check(rule_set: &RuleSet, cache: &mut FsmCache) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    let mut used_keys = std::collections::HashSet::new();

    for (domain, indices) in &rule_set.by_domain {
        let mut domain_default_rule: Option<&Rule> = None;
        let mut candidates = Vec::new();
        for &idx in indices {
            let rule = &rule_set.rules[idx];
            if rule.domain_default {
                match domain_default_rule {
                    None => domain_default_rule = Some(rule),
                    Some(first) => {
                        diagnostics.push(
                            Diagnostic::constraint(format!(
                                "multiple domain_default rules for domain {domain}: \
                                 {} ({}) collides with {} ({})",
                                rule.source_file.display(),
                                rule.description,
                                first.source_file.display(),
                                first.description
                            ))
                            .with_rule_id(rule.rule_id.clone()),
                        );
                    }
                }
                continue;
            }
            candidates.push(rule);
        }

        let mut cached_entries: Vec<Entry> = Vec::new();
        let mut fresh: Vec<&Rule> = Vec::new();
        for rule in candidates {
            let key = format!("{domain}|{}", rule.matches.canonical_key());
            match cache.get(&key) {
                Some(Ok(fsm)) => cached_entries.push(Entry {
                    rule,
                    cache_key: key,
                    fsm,
                }),
                _ => fresh.push(rule),
            }
        }

        let fresh_entries: Vec<Entry> = fresh
            .into_par_iter()
            .filter_map(|rule| {
                let key = format!("{domain}|{}", rule.matches.canonical_key());
                match build_path_fsm(&rule.matches) {
                    Ok(fsm) => Some(Entry {
                        rule,
                        cache_key: key,
                        fsm,
                    }),
                    Err(err) => {
                        tracing::error!(rule_id = %rule.rule_id, %err, "failed to build path FSM");
                        None
                    }
                }
            })
            .collect();

        let mut colliding_keys = std::collections::HashSet::new();

        let new_pairs: Vec<(usize, usize)> = (0..fresh_entries.len())
            .flat_map(|i| ((i + 1)..fresh_entries.len()).map(move |j| (i, j)))
            .collect();
        let new_vs_new: Vec<bool> = new_pairs
            .par_iter()
            .map(|&(i, j)| !Fsm::intersect(&fresh_entries[i].fsm, &fresh_entries[j].fsm).is_empty())
            .collect();
        for (&(i, j), collides) in new_pairs.iter().zip(new_vs_new) {
            if collides {
                report_collision(&mut diagnostics, domain, fresh_entries[i].rule, fresh_entries[j].rule);
                colliding_keys.insert(fresh_entries[i].cache_key.clone());
                colliding_keys.insert(fresh_entries[j].cache_key.clone());
            }
        }

        let new_pairs_cached: Vec<(usize, usize)> = (0..fresh_entries.len())
            .flat_map(|i| (0..cached_entries.len()).map(move |j| (i, j)))
            .collect();
        let new_vs_cached: Vec<bool> = new_pairs_cached
            .par_iter()
            .map(|&(i, j)| !Fsm::intersect(&fresh_entries[i].fsm, &cached_entries[j].fsm).is_empty())
            .collect();
        for (&(i, j), collides) in new_pairs_cached.iter().zip(new_vs_cached) {
            if collides {
                report_collision(&mut diagnostics, domain, fresh_entries[i].rule, cached_entries[j].rule);
                colliding_keys.insert(fresh_entries[i].cache_key.clone());
                colliding_keys.insert(cached_entries[j].cache_key.clone());
            }
        }

        for entry in &fresh_entries {
            if colliding_keys.contains(&entry.cache_key) {
                continue;
            }
            if let Some(pattern) = path_pattern(&entry.rule.matches) {
                cache.insert(entry.cache_key.clone(), pattern, false);
            }
            used_keys.insert(entry.cache_key.clone());
        }
        for entry in &cached_entries {
            if !colliding_keys.contains(&entry.cache_key) {
                used_keys.insert(entry.cache_key.clone());
            }
        }
    }

    // Keep only entries proven non-colliding and actually exercised by this
    // run; anything else (collisions, or rules no longer present) is purged
    // per spec.md §4.4's cache-rewrite rules.
    cache.retain_keys(|key| used_keys.contains(key));

    diagnostics
}

fn report_collision(diagnostics: &mut Diagnostics, domain: &str, a: &Rule, b: &Rule) {
    diagnostics.push(
        Diagnostic::constraint(format!(
            "path collision for domain {domain}: {} ({}) collides with {} ({})",
            a.source_file.display(),
            a.description,
            b.source_file.display(),
            b.description
        ))
        .with_rule_id(a.rule_id.clone()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules;

    fn rule_set_from(yaml: &str) -> RuleSet {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.yml");
        std::fs::write(&path, yaml).unwrap();
        rules::merge(&[path], false).unwrap().0
    }

    #[test]
    fn overlapping_exact_paths_collide() {
        let rule_set = rule_set_from(
            r#"
schema_version: 1
rules:
  - description: "one"
    domains: ["example.com"]
    matches: { all: [{ paths: { exact: ["/a"] } }] }
  - description: "two"
    domains: ["example.com"]
    matches: { all: [{ paths: { begins_with: ["/"] } }] }
"#,
        );
        let mut cache = FsmCache::default();
        let diags = check(&rule_set, &mut cache);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn non_colliding_entries_are_cached_and_reused() {
        let rule_set = rule_set_from(
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
        let mut cache = FsmCache::default();
        assert!(check(&rule_set, &mut cache).is_empty());
        assert_eq!(cache.len(), 2);

        // A cached entry must round-trip back into an equivalent FSM.
        let key = format!(
            "example.com|{}",
            rule_set.rules[0].matches.canonical_key()
        );
        let fsm = cache.get(&key).expect("entry was cached").expect("cached pattern parses");
        assert!(!Fsm::intersect(&fsm, &Fsm::from_pattern("/a", false).unwrap()).is_empty());
        assert!(Fsm::intersect(&fsm, &Fsm::from_pattern("/b", false).unwrap()).is_empty());

        // Re-running with the warm cache still reports no collision.
        assert!(check(&rule_set, &mut cache).is_empty());
    }

    #[test]
    fn disjoint_paths_do_not_collide() {
        let rule_set = rule_set_from(
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
        let mut cache = FsmCache::default();
        let diags = check(&rule_set, &mut cache);
        assert!(diags.is_empty());
    }

    #[test]
    fn cross_domain_overlap_is_not_a_collision() {
        let rule_set = rule_set_from(
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
        let mut cache = FsmCache::default();
        let diags = check(&rule_set, &mut cache);
        assert!(diags.is_empty());
    }

    #[test]
    fn duplicate_domain_default_is_rejected() {
        let rule_set = rule_set_from(
            r#"
schema_version: 1
rules:
  - description: "one"
    domains: ["example.com"]
    domain_default: true
    matches: {}
  - description: "two"
    domains: ["example.com"]
    domain_default: true
    matches: {}
"#,
        );
        let mut cache = FsmCache::default();
        let diags = check(&rule_set, &mut cache);
        assert_eq!(diags.len(), 1);
    }
}
