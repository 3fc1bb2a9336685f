//! Cache-tier (Varnish VCL) emission: one guarded block per rule, one
//! default block per domain. Grounded on `RenderVarnish`/`make_actions` in
//! the original — each action slot lowers to the same VCL idiom the
//! original used (`variable.set`/`regsub`/`return (synth(...))`), just
//! rendered directly rather than staged through per-action config dicts.

use crate::config::Globals;
use crate::emit::condition::{escape_regex_literal, render_condition};
use crate::emit::ordering::{is_set, ActionSlot, ACTION_ORDER};
use crate::rules::actions::{BackendAction, HeaderOp, PathModOp, RedirectType, TrailingSlash};
use crate::rules::{Actions, Rule, RuleSet};

fn vcl_string(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\x22"))
}

fn render_https_redirection(out: &mut Vec<String>) {
    out.push("    if (std.port(server.ip) != 443) {".to_string());
    out.push(
        "      return (synth(307, \"https://\" + req.http.host + req.url));".to_string(),
    );
    out.push("    }".to_string());
}

fn render_trailing_slash(out: &mut Vec<String>, mode: TrailingSlash) {
    const WITHOUT_TRAILING: &str = r"(?:/[^/?#]+)*";
    const POST_PATH: &str = r"[#?].*";
    let (regex, sub) = match mode {
        TrailingSlash::Add => (
            format!(r"^({WITHOUT_TRAILING}/(?:\.?[^/?#.]+))({POST_PATH})?$"),
            r"\1/\2".to_string(),
        ),
        TrailingSlash::Remove => (
            format!(r"^({WITHOUT_TRAILING})/({POST_PATH})?$"),
            r"\1\2".to_string(),
        ),
        TrailingSlash::DoNothing => return,
    };
    out.push(format!("    if (req.url ~ \"{regex}\") {{"));
    out.push(format!(
        "      return (synth(307, regsub(req.url, \"{regex}\", \"{sub}\")));"
    ));
    out.push("    }".to_string());
}

fn render_synthetic_response(out: &mut Vec<String>, body: &str) {
    out.push(format!("    synthetic({});", vcl_string(body)));
    out.push("    return (synth(750, \"\"));".to_string());
}

fn render_redirect(out: &mut Vec<String>, redirect: &crate::rules::actions::RedirectAction) {
    let code = redirect.kind.status_code();
    if let Some(url) = &redirect.url {
        out.push(format!(
            "    return (synth({code}, {}));",
            vcl_string(url)
        ));
        return;
    }
    match &redirect.scheme {
        Some(scheme) => out.push(format!(
            "    variable.set(\"scheme\", {});",
            vcl_string(scheme)
        )),
        None => {
            out.push("    if (std.port(server.ip) == 443) {".to_string());
            out.push("      variable.set(\"scheme\", \"https\");".to_string());
            out.push("    } else {".to_string());
            out.push("      variable.set(\"scheme\", \"http\");".to_string());
            out.push("    }".to_string());
        }
    }
    match &redirect.domain {
        Some(domain) => out.push(format!(
            "    variable.set(\"domain\", {});",
            vcl_string(domain)
        )),
        None => out.push("    variable.set(\"domain\", req.http.host);".to_string()),
    }
    render_path_mods(out, &redirect.path);
    out.push(format!(
        "    return (synth({code}, variable.get(\"scheme\") + \"://\" + variable.get(\"domain\") + variable.get(\"path\")));"
    ));
}

fn render_header_ops(out: &mut Vec<String>, ops: &[HeaderOp], southbound: bool) {
    let var = if southbound { "req" } else { "resp" };
    for op in ops {
        match op {
            HeaderOp::Remove { remove } => {
                out.push(format!("    unset {var}.http.{remove};"));
            }
            HeaderOp::Set { set } => {
                out.push(format!(
                    "    set {var}.http.{} = {};",
                    set.field,
                    vcl_string(&set.value)
                ));
            }
            HeaderOp::Add { add } => {
                out.push(format!("    if ({var}.http.{}) {{", add.field));
                out.push(format!(
                    "      set {var}.http.{} = {var}.http.{} + \",\";",
                    add.field, add.field
                ));
                out.push("    }".to_string());
                out.push(format!(
                    "    set {var}.http.{} = {var}.http.{} + {};",
                    add.field,
                    add.field,
                    vcl_string(&add.value)
                ));
            }
        }
    }
}

fn render_path_mods(out: &mut Vec<String>, ops: &[PathModOp]) {
    for op in ops {
        match op {
            PathModOp::Prefix { prefix } => {
                if let Some(remove) = &prefix.remove {
                    let regex = format!("^{}", escape_regex_literal(remove));
                    let regex = if prefix.ignore_case {
                        format!("(?i){regex}")
                    } else {
                        regex
                    };
                    out.push(format!(
                        "    variable.set(\"path\", regsub(variable.get(\"path\"), {}, \"\"));",
                        vcl_string(&regex)
                    ));
                }
                if let Some(add) = &prefix.add {
                    out.push(format!(
                        "    variable.set(\"path\", {} + variable.get(\"path\"));",
                        vcl_string(add)
                    ));
                }
            }
            PathModOp::Replace { replace } => {
                let (regex, default_sub) = if let Some(from_regex) = &replace.from_regex {
                    let body = from_regex.clone();
                    let body = if replace.ignore_case {
                        format!("(?i){body}")
                    } else {
                        body
                    };
                    (body, None)
                } else if let Some(from_exact) = &replace.from_exact {
                    let body = format!("^{}$", escape_regex_literal(from_exact));
                    let body = if replace.ignore_case {
                        format!("(?i){body}")
                    } else {
                        body
                    };
                    (body, None)
                } else {
                    continue;
                };
                let sub = replace
                    .to_regsub
                    .clone()
                    .or_else(|| replace.to.clone())
                    .or(default_sub)
                    .unwrap_or_default();
                out.push(format!(
                    "    variable.set(\"path\", regsub(variable.get(\"path\"), {}, {}));",
                    vcl_string(&regex),
                    vcl_string(&sub)
                ));
            }
        }
    }
}

/// Varnish only tags the request and hands it to HAProxy; the actual
/// backend/load-balancer logic lives in the lb-tier emitter.
fn render_backend(out: &mut Vec<String>, _backend: &BackendAction, rule_id: &str) {
    out.push(format!(
        "    set req.http.X-ORM-ID = {};",
        vcl_string(rule_id)
    ));
    out.push("    set req.backend_hint = round_robin_director.backend();".to_string());
    out.push("    call use_backend;".to_string());
}

/// Split a rule's rendered actions into the southbound (request-phase) and
/// northbound (response-phase) bins, the same split `make_actions` keeps
/// between `config_out["sb"]`/`config_out["nb"]` in the original — only
/// `header_northbound` touches `resp.*` and belongs in `vcl_deliver`.
fn render_action_slots(actions: &Actions, rule_id: &str) -> (Vec<String>, Vec<String>) {
    let mut sb = Vec::new();
    let mut nb = Vec::new();
    for slot in ACTION_ORDER {
        if !is_set(actions, slot) {
            continue;
        }
        match slot {
            ActionSlot::HttpsRedirection => render_https_redirection(&mut sb),
            ActionSlot::TrailingSlash => {
                render_trailing_slash(&mut sb, actions.trailing_slash.unwrap())
            }
            ActionSlot::SyntheticResponse => {
                render_synthetic_response(&mut sb, actions.synthetic_response.as_ref().unwrap())
            }
            ActionSlot::Redirect => render_redirect(&mut sb, actions.redirect.as_ref().unwrap()),
            ActionSlot::HeaderSouthbound => {
                render_header_ops(&mut sb, actions.header_southbound.as_ref().unwrap(), true)
            }
            ActionSlot::ReqPath => render_path_mods(&mut sb, actions.req_path.as_ref().unwrap()),
            ActionSlot::Backend => {
                render_backend(&mut sb, actions.backend.as_ref().unwrap(), rule_id)
            }
            ActionSlot::HeaderNorthbound => {
                render_header_ops(&mut nb, actions.header_northbound.as_ref().unwrap(), false)
            }
        }
    }
    (sb, nb)
}

/// Varnish variable name carrying whether `rule_id` matched, set in
/// `vcl_recv` and read back in `vcl_deliver`. Grounded on
/// `make_vcl_set_match_variable`/`make_vcl_match_variable_defined`.
fn match_tag(rule_id: &str) -> String {
    format!("match_{rule_id}")
}

pub struct DomainBlock {
    pub domain: String,
    pub rule_blocks: Vec<String>,
    pub default_block: Option<String>,
}

pub struct Rendered {
    pub domains: Vec<DomainBlock>,
    pub global_southbound: Vec<String>,
    pub global_northbound: Vec<String>,
    pub deliver_blocks: Vec<String>,
}

/// Render every domain's rule blocks plus globally-applied header actions,
/// in rule-declaration order within each domain. Response-phase (`nb`)
/// actions never land in a southbound block directly; they are collected
/// into `deliver_blocks`, one `if (variable.defined(match_<rule_id>))`
/// clause per rule, gated on the tag the matching southbound block sets
/// (`make_action_if_clause` in the original). A rule shared by more than one
/// domain (domain-split) still only contributes one deliver clause, keyed
/// by its rule index, so its northbound actions never fire twice.
pub fn render(rule_set: &RuleSet, globals: &Globals) -> Rendered {
    let mut global_southbound = Vec::new();
    render_header_ops(&mut global_southbound, &globals.global_actions.header_southbound, true);
    let mut global_northbound = Vec::new();
    render_header_ops(&mut global_northbound, &globals.global_actions.header_northbound, false);

    let mut deliver_blocks = Vec::new();
    let mut delivered: std::collections::HashSet<usize> = std::collections::HashSet::new();

    let mut blocks = Vec::new();
    for (domain, indices) in &rule_set.by_domain {
        let mut rule_blocks = Vec::new();
        let mut default_block = None;
        for &idx in indices {
            let rule: &Rule = &rule_set.rules[idx];
            let (sb_lines, nb_lines) = render_action_slots(&rule.actions, &rule.rule_id);
            let tag = match_tag(&rule.rule_id);

            if rule.domain_default {
                let mut block = vec![format!("  # default for {domain}")];
                if !nb_lines.is_empty() {
                    block.push(format!("    variable.set(\"{tag}\", 1);"));
                }
                block.extend(sb_lines);
                default_block = Some(block.join("\n"));
                if !nb_lines.is_empty() && delivered.insert(idx) {
                    deliver_blocks.push(deliver_clause(&tag, &nb_lines));
                }
                continue;
            }

            let condition = render_condition(&rule.matches, "variable.get(\"path\")", "variable.get(\"query\")", "req.http.host");
            let mut block = vec![format!("  if ({condition}) {{")];
            if !nb_lines.is_empty() {
                block.push(format!("    variable.set(\"{tag}\", 1);"));
            }
            block.extend(sb_lines);
            block.push("  }".to_string());
            rule_blocks.push(block.join("\n"));

            if !nb_lines.is_empty() && delivered.insert(idx) {
                deliver_blocks.push(deliver_clause(&tag, &nb_lines));
            }
        }
        blocks.push(DomainBlock {
            domain: domain.clone(),
            rule_blocks,
            default_block,
        });
    }
    Rendered {
        domains: blocks,
        global_southbound,
        global_northbound,
        deliver_blocks,
    }
}

fn deliver_clause(tag: &str, nb_lines: &[String]) -> String {
    let mut block = vec![format!("  if (variable.defined(\"{tag}\")) {{")];
    block.extend(nb_lines.iter().cloned());
    block.push("  }".to_string());
    block.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules;

    #[test]
    fn backend_action_orders_after_header_southbound() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.yml");
        std::fs::write(
            &path,
            r#"
schema_version: 1
rules:
  - description: "one"
    domains: ["example.com"]
    matches: { all: [{ paths: { exact: ["/a"] } }] }
    actions:
      backend:
        origin: "origin.example.com"
      header_southbound:
        - set: { field: "X-Test", value: "1" }
"#,
        )
        .unwrap();
        let (rule_set, _) = rules::merge(&[path], false).unwrap();
        let (lines, nb) = render_action_slots(&rule_set.rules[0].actions, &rule_set.rules[0].rule_id);
        assert!(nb.is_empty());
        let sb_pos = lines.iter().position(|l| l.contains("X-Test")).unwrap();
        let backend_pos = lines.iter().position(|l| l.contains("use_backend")).unwrap();
        assert!(sb_pos < backend_pos);
    }

    #[test]
    fn header_northbound_goes_to_the_nb_bin_not_sb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.yml");
        std::fs::write(
            &path,
            r#"
schema_version: 1
rules:
  - description: "one"
    domains: ["example.com"]
    matches: { all: [{ paths: { exact: ["/a"] } }] }
    actions:
      header_northbound:
        - set: { field: "X-Resp", value: "1" }
"#,
        )
        .unwrap();
        let (rule_set, _) = rules::merge(&[path], false).unwrap();
        let (sb, nb) = render_action_slots(&rule_set.rules[0].actions, &rule_set.rules[0].rule_id);
        assert!(sb.is_empty());
        assert_eq!(nb.len(), 1);
        assert!(nb[0].contains("resp.http.X-Resp"));
    }

    #[test]
    fn northbound_action_is_gated_on_a_match_tag_in_vcl_deliver() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.yml");
        std::fs::write(
            &path,
            r#"
schema_version: 1
rules:
  - description: "one"
    domains: ["example.com"]
    matches: { all: [{ paths: { exact: ["/a"] } }] }
    actions:
      header_northbound:
        - set: { field: "X-Resp", value: "1" }
"#,
        )
        .unwrap();
        let (rule_set, _) = rules::merge(&[path], false).unwrap();
        let globals = Globals::default();
        let rendered = render(&rule_set, &globals);
        assert_eq!(rendered.deliver_blocks.len(), 1);
        assert!(rendered.deliver_blocks[0].contains("variable.defined(\"match_one\")"));
        assert!(rendered.deliver_blocks[0].contains("resp.http.X-Resp"));
        let rule_block = &rendered.domains[0].rule_blocks[0];
        assert!(rule_block.contains("variable.set(\"match_one\", 1);"));
        assert!(!rule_block.contains("resp.http"));
    }

    #[test]
    fn domain_split_rule_contributes_one_deliver_clause() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.yml");
        std::fs::write(
            &path,
            r#"
schema_version: 1
rules:
  - description: "shared"
    domains: ["a.example", "b.example"]
    matches: { all: [{ paths: { exact: ["/a"] } }] }
    actions:
      header_northbound:
        - set: { field: "X-Resp", value: "1" }
"#,
        )
        .unwrap();
        let (rule_set, _) = rules::merge(&[path], false).unwrap();
        let globals = Globals::default();
        let rendered = render(&rule_set, &globals);
        assert_eq!(rendered.deliver_blocks.len(), 1);
    }

    #[test]
    fn global_header_actions_render_as_vcl_not_debug_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.yml");
        std::fs::write(&path, "schema_version: 1\nrules: []\n").unwrap();
        let (rule_set, _) = rules::merge(&[path], false).unwrap();
        let mut globals = Globals::default();
        globals.global_actions.header_southbound.push(HeaderOp::Set {
            set: crate::rules::actions::SetHeader {
                field: "X-Global".to_string(),
                value: "south".to_string(),
            },
        });
        let rendered = render(&rule_set, &globals);
        assert!(rendered
            .global_southbound
            .iter()
            .any(|l| l.contains("set req.http.X-Global")));
        assert!(!rendered.global_southbound.iter().any(|l| l.contains("HeaderOp")));
    }
}
