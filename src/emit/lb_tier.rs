//! Load-balancer-tier (HAProxy) emission: one ACL plus one backend section
//! per rule with a `backend` action, keyed by the same `rule_id` the
//! cache-tier emitter tags onto `X-ORM-ID`. Grounded on
//! `RenderHAProxy.make_backend_action`.

use crate::config::Globals;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::rules::actions::{BackendAction, OriginSpec};
use crate::rules::RuleSet;

/// `(scheme, host, port)`, defaulting to `https`/`443` the way
/// `extract_from_origin` does — an origin given as a bare hostname is
/// assumed to speak TLS unless `http://` is explicit.
fn extract_from_origin(origin: &str) -> (String, String, String) {
    let (scheme, hostport) = match origin.split_once("://") {
        Some((scheme, rest)) => (scheme.to_string(), rest.to_string()),
        None => ("https".to_string(), origin.to_string()),
    };
    match hostport.split_once(':') {
        Some((host, port)) => (scheme, host.to_string(), port.to_string()),
        None => {
            let port = if scheme == "http" { "80" } else { "443" };
            (scheme, hostport, port.to_string())
        }
    }
}

/// Same `[^a-z0-9]` → `_` collapsing as rule-id normalization, but case is
/// left untouched — HAProxy server names only need to avoid whitespace and
/// punctuation, not be lowercase.
fn normalize_server_name(origin: &str) -> String {
    let mut out = String::with_capacity(origin.len());
    let mut prev_underscore = false;
    for c in origin.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            prev_underscore = false;
        } else if !prev_underscore {
            out.push('_');
            prev_underscore = true;
        }
    }
    out.trim_matches('_').to_string()
}

pub struct BackendSection {
    pub rule_id: String,
    pub acl: String,
    pub backend_lines: Vec<String>,
}

fn render_backend(
    backend: &BackendAction,
    rule_id: &str,
    diagnostics: &mut Diagnostics,
) -> BackendSection {
    let origins: Vec<&OriginSpec> = backend.origins();
    let acl = format!("    use_backend {rule_id} if {{ hdr(X-ORM-ID) -m str {rule_id} }}");
    let mut backend_lines = vec![String::new(), format!("backend {rule_id}")];
    for origin in origins {
        let (scheme, host, port) = extract_from_origin(origin.server());
        let mut server = format!(
            "    server {} {host}:{port} resolvers dns resolve-prefer ipv4 check",
            normalize_server_name(origin.server())
        );
        match scheme.as_str() {
            "https" => server.push_str(" ssl verify none"),
            "http" => {}
            other => {
                diagnostics.push(
                    Diagnostic::emitter(format!(
                        "unknown origin scheme {other:?} for backend server {}",
                        origin.server()
                    ))
                    .with_rule_id(rule_id.to_string()),
                );
            }
        }
        if let Some(max_connections) = origin.max_connections() {
            server.push_str(&format!(" maxconn {max_connections}"));
        }
        if let Some(max_queued) = origin.max_queued_connections() {
            server.push_str(&format!(" maxqueue {max_queued}"));
        }
        backend_lines.push(server);
    }
    BackendSection {
        rule_id: rule_id.to_string(),
        acl,
        backend_lines,
    }
}

/// Render every rule's backend section. Unknown origin schemes are reported
/// as `Kind::Emitter` faults rather than silently downgraded to plain TCP
/// (spec.md §7's emitter-fault example); the caller aborts emission when the
/// returned `Diagnostics` is non-empty.
pub fn render(rule_set: &RuleSet, _globals: &Globals) -> (Vec<BackendSection>, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let sections = rule_set
        .rules
        .iter()
        .filter_map(|rule| {
            rule.actions
                .backend
                .as_ref()
                .map(|backend| render_backend(backend, &rule.rule_id, &mut diagnostics))
        })
        .collect();
    (sections, diagnostics)
}

pub fn render_custom_internal_healthcheck(globals: &Globals) -> Vec<String> {
    let Some(healthcheck) = &globals.custom_internal_healthcheck else {
        return Vec::new();
    };
    let mut lines = vec![format!(
        "    option httpchk {} {}",
        healthcheck.http.method, healthcheck.http.path
    )];
    if let Some(domain) = &healthcheck.http.domain {
        let last = lines.last_mut().unwrap();
        last.push_str(&format!(r" HTTP/1.1\nHost:\ {domain}"));
    }
    lines.push("    http-check expect ! rstatus ^5".to_string());
    lines
}
