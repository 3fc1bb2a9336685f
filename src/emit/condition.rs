//! Compiles a match tree into the regex/boolean-expression shape both
//! emitters condition their rule blocks on: one anchored regex per leaf,
//! combined with `&&`/`||`/`!` following the tree shape exactly (no FSM
//! involved — that machinery belongs to the collision engine only).
//! Grounded on `make_vcl_path_regex`, `make_vcl_query_regex`, and
//! `parse_match_tree` in the original Varnish renderer.

use crate::ir::{Function, MatchInput, MatchTree, Op, Source};

/// VCL-style regex escaping: `"` becomes `\x22` (Varnish string literals
/// can't otherwise carry a bare quote), and an escaped `/` is unescaped
/// back for readability since Varnish regex doesn't require it.
pub fn escape_regex_literal(value: &str) -> String {
    let escaped = regex::escape(value);
    escaped.replace("\\\"", "\\x22").replace('"', "\\x22")
}

fn regex_with_opts(regex: &str, ignore_case: bool) -> String {
    if ignore_case {
        format!("(?i){regex}")
    } else {
        regex.to_string()
    }
}

/// An anchored path-matching regex, `^...$`-wrapped so a bare `contains`
/// doesn't accidentally match a later `begins_with` rule too.
pub fn path_regex(function: Function, input: &MatchInput) -> String {
    let value = input.value.as_deref().unwrap_or("");
    let body = match function {
        Function::Regex => escape_regex_literal_passthrough(value),
        Function::Exact => format!("^{}$", escape_regex_literal(value)),
        Function::BeginsWith => format!("^{}.*$", escape_regex_literal(value)),
        Function::EndsWith => format!("^.*{}$", escape_regex_literal(value)),
        Function::Contains => format!("^.*{}.*$", escape_regex_literal(value)),
        Function::Exist => unreachable!("exist is query-only"),
    };
    regex_with_opts(&body, input.ignore_case)
}

/// `regex`-function patterns are already a user-authored regex, not a
/// literal to escape; only quote characters need VCL string escaping.
fn escape_regex_literal_passthrough(value: &str) -> String {
    value.replace('"', "\\x22")
}

const QUERY_BEGIN: &str = "(^|&)";
const QUERY_PARAM_END: &str = "(=|&|$)";
const QUERY_END: &str = "(&|$)";
const QUERY_WILDCARD: &str = "[^&]*";

pub fn query_regex(function: Function, input: &MatchInput) -> String {
    let parameter = escape_regex_literal(input.parameter.as_deref().unwrap_or(""));
    let body = if function == Function::Exist {
        format!("{QUERY_BEGIN}{parameter}{QUERY_PARAM_END}")
    } else {
        let value = input.value.as_deref().unwrap_or("");
        match function {
            Function::Regex => format!(
                "{QUERY_BEGIN}{parameter}={}{QUERY_END}",
                escape_regex_literal_passthrough(value)
            ),
            Function::Exact => {
                format!("{QUERY_BEGIN}{parameter}={}{QUERY_END}", escape_regex_literal(value))
            }
            Function::BeginsWith => format!(
                "{QUERY_BEGIN}{parameter}={}{QUERY_WILDCARD}{QUERY_END}",
                escape_regex_literal(value)
            ),
            Function::EndsWith => format!(
                "{QUERY_BEGIN}{parameter}={QUERY_WILDCARD}{}{QUERY_END}",
                escape_regex_literal(value)
            ),
            Function::Contains => format!(
                "{QUERY_BEGIN}{parameter}={QUERY_WILDCARD}{}{QUERY_WILDCARD}{QUERY_END}",
                escape_regex_literal(value)
            ),
            Function::Exist => unreachable!(),
        }
    };
    regex_with_opts(&body, input.ignore_case)
}

/// Build the boolean expression testing a match tree, in the teacher's
/// condition-emission order (`and`/`or` combine children left to right,
/// `not` prefixes `!`). `var_path`/`var_query` name the emitter's working
/// variables for path and query (VCL's `variable.get("path")`, HAProxy's
/// `path` ACL fetch, etc.) so both back-ends can reuse this function.
pub fn render_condition(tree: &MatchTree, var_path: &str, var_query: &str, var_domain: &str) -> String {
    render_node(tree, var_path, var_query, var_domain, false)
}

fn render_node(
    tree: &MatchTree,
    var_path: &str,
    var_query: &str,
    var_domain: &str,
    negate: bool,
) -> String {
    match tree {
        MatchTree::Not(inner) => render_node(inner, var_path, var_query, var_domain, !negate),
        MatchTree::List { op, children } => {
            let joiner = match op {
                Op::All => " && ",
                Op::Any => " || ",
            };
            let body = children
                .iter()
                .map(|c| render_node(c, var_path, var_query, var_domain, false))
                .collect::<Vec<_>>()
                .join(joiner);
            let wrapped = if children.len() == 1 {
                body
            } else {
                format!("({body})")
            };
            if negate {
                format!("!{wrapped}")
            } else {
                wrapped
            }
        }
        MatchTree::Match {
            source,
            function,
            input,
        } => {
            let prefix = if negate { "!" } else { "" };
            match source {
                Source::Path => format!("{prefix}{var_path} ~ \"{}\"", path_regex(*function, input)),
                Source::Query => format!("{prefix}{var_query} ~ \"{}\"", query_regex(*function, input)),
                Source::Domain => {
                    let value = input.value.as_deref().unwrap_or("");
                    format!("{prefix}{var_domain} == \"{value}\"")
                }
                Source::Method => {
                    let value = input.value.as_deref().unwrap_or("");
                    format!("{prefix}req.method == \"{value}\"")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::MatchInput;

    #[test]
    fn exact_path_is_anchored() {
        let input = MatchInput::value("/foo");
        assert_eq!(path_regex(Function::Exact, &input), "^/foo$");
    }

    #[test]
    fn begins_with_gets_trailing_wildcard() {
        let input = MatchInput::value("/api");
        assert_eq!(path_regex(Function::BeginsWith, &input), "^/api.*$");
    }

    #[test]
    fn ignore_case_prefixes_inline_flag() {
        let input = MatchInput::value("/Foo").with_ignore_case(true);
        assert_eq!(path_regex(Function::Exact, &input), "(?i)^/Foo$");
    }

    #[test]
    fn quotes_are_escaped_for_vcl_strings() {
        assert_eq!(escape_regex_literal("a\"b"), "a\\x22b");
    }

    #[test]
    fn and_list_renders_with_double_ampersand() {
        let tree = MatchTree::list(
            Op::All,
            vec![
                MatchTree::leaf(Source::Path, Function::Exact, MatchInput::value("/a")),
                MatchTree::leaf(Source::Path, Function::Exact, MatchInput::value("/b")),
            ],
        );
        let rendered = render_condition(&tree, "path", "query", "domain");
        assert!(rendered.contains("&&"));
    }

    #[test]
    fn not_prefixes_bang() {
        let tree = MatchTree::not(MatchTree::leaf(
            Source::Path,
            Function::Exact,
            MatchInput::value("/a"),
        ));
        let rendered = render_condition(&tree, "path", "query", "domain");
        assert!(rendered.starts_with('!'));
    }
}
