//! Match-shorthand lowering: spec.md §4.2 steps 1–6. Turns the compact YAML
//! `matches`/`domains` shorthand into the canonical `ir::MatchTree`.

use crate::ir::{Function, MatchInput, MatchTree, Op, Source};

use super::raw::{RawClause, RawMatches, RawPathsClause, RawQueryClause};

/// Lower a `paths` clause (step 3): one leaf per listed value per function,
/// unioned with `or`; `ignore_case` propagates to every leaf; `not` wraps
/// the whole union.
fn lower_paths(clause: &RawPathsClause) -> MatchTree {
    let mut leaves = Vec::new();
    let functions: &[(Function, &Vec<String>)] = &[
        (Function::Exact, &clause.exact),
        (Function::Regex, &clause.regex),
        (Function::BeginsWith, &clause.begins_with),
        (Function::EndsWith, &clause.ends_with),
        (Function::Contains, &clause.contains),
    ];
    for (function, values) in functions {
        for value in values.iter() {
            let input = MatchInput::value(value).with_ignore_case(clause.ignore_case);
            leaves.push(MatchTree::leaf(Source::Path, *function, input));
        }
    }
    let union = MatchTree::list(Op::Any, leaves);
    if clause.not {
        MatchTree::not(union)
    } else {
        union
    }
}

/// Lower a `query` clause (step 4): same shape as `paths`, plus the
/// `parameter` field propagated into every leaf's input, plus the
/// parameter-only `exist` function.
fn lower_query(clause: &RawQueryClause) -> MatchTree {
    let mut leaves = Vec::new();
    if clause.exist {
        let input = MatchInput {
            value: None,
            parameter: Some(clause.parameter.clone()),
            ignore_case: clause.ignore_case,
        };
        leaves.push(MatchTree::leaf(Source::Query, Function::Exist, input));
    }
    let functions: &[(Function, &Vec<String>)] = &[
        (Function::Exact, &clause.exact),
        (Function::Regex, &clause.regex),
        (Function::BeginsWith, &clause.begins_with),
        (Function::EndsWith, &clause.ends_with),
        (Function::Contains, &clause.contains),
    ];
    for (function, values) in functions {
        for value in values.iter() {
            let input = MatchInput::value(value)
                .with_parameter(clause.parameter.clone())
                .with_ignore_case(clause.ignore_case);
            leaves.push(MatchTree::leaf(Source::Query, *function, input));
        }
    }
    let union = MatchTree::list(Op::Any, leaves);
    if clause.not {
        MatchTree::not(union)
    } else {
        union
    }
}

fn lower_clause(clause: &RawClause) -> MatchTree {
    match clause {
        RawClause::Paths { paths } => lower_paths(paths),
        RawClause::Query { query } => lower_query(query),
    }
}

/// Lower the top-level `matches` object (steps 2 + 5): `all`/`any` keys
/// combine their clauses with `and`/`or` respectively.
fn lower_matches(matches: &RawMatches) -> Vec<MatchTree> {
    let mut branches = Vec::new();
    if !matches.all.is_empty() {
        let children: Vec<_> = matches.all.iter().map(lower_clause).collect();
        branches.push(MatchTree::list(Op::All, children));
    }
    if !matches.any.is_empty() {
        let children: Vec<_> = matches.any.iter().map(lower_clause).collect();
        branches.push(MatchTree::list(Op::Any, children));
    }
    branches
}

fn lower_domains(domains: &[String]) -> MatchTree {
    let leaves = domains
        .iter()
        .map(|d| MatchTree::leaf(Source::Domain, Function::Exact, MatchInput::value(d)))
        .collect();
    MatchTree::list(Op::Any, leaves)
}

/// Step 1 + 6: wrap `domains` as an `or` of domain-exact leaves, combine
/// with the lowered `matches` tree as `and(domains_or, matches_tree)`, and
/// minify.
pub fn lower(domains: &[String], matches: &RawMatches) -> MatchTree {
    let domains_or = lower_domains(domains);
    let match_branches = lower_matches(matches);
    if match_branches.is_empty() {
        // A rule with no matches block at all matches every path for its domains.
        return domains_or.minify();
    }
    let mut top = vec![domains_or];
    top.extend(match_branches);
    MatchTree::list(Op::All, top).minify()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::raw::RawQueryClause;

    #[test]
    fn lower_paths_unions_values_across_functions() {
        let clause = RawPathsClause {
            exact: vec!["/a".into()],
            begins_with: vec!["/api".into()],
            ..Default::default()
        };
        let tree = lower_paths(&clause);
        match tree {
            MatchTree::List { op, children } => {
                assert_eq!(op, Op::Any);
                assert_eq!(children.len(), 2);
            }
            _ => panic!("expected or-list"),
        }
    }

    #[test]
    fn lower_paths_not_wraps_union() {
        let clause = RawPathsClause {
            exact: vec!["/a".into()],
            not: true,
            ..Default::default()
        };
        assert!(matches!(lower_paths(&clause), MatchTree::Not(_)));
    }

    #[test]
    fn lower_query_exist_ignores_value_lists() {
        let clause = RawQueryClause {
            parameter: "debug".into(),
            exist: true,
            ..Default::default()
        };
        let tree = lower_query(&clause);
        match tree {
            MatchTree::List { op, children } => {
                assert_eq!(op, Op::Any);
                assert_eq!(children.len(), 1);
                assert!(matches!(
                    children[0],
                    MatchTree::Match {
                        function: Function::Exist,
                        ..
                    }
                ));
            }
            _ => panic!("expected a single-child or-list (minified by caller, not here)"),
        }
    }

    #[test]
    fn lower_combines_domains_and_matches() {
        let domains = vec!["a.example".to_string(), "b.example".to_string()];
        let matches = RawMatches {
            all: vec![RawClause::Paths {
                paths: RawPathsClause {
                    exact: vec!["/x".into()],
                    ..Default::default()
                },
            }],
            any: vec![],
        };
        let tree = lower(&domains, &matches);
        match tree {
            MatchTree::List { op, children } => {
                assert_eq!(op, Op::All);
                assert_eq!(children.len(), 2);
            }
            _ => panic!("expected and(domains_or, matches_tree)"),
        }
    }
}
