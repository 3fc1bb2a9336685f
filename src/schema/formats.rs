//! Custom JSON-Schema format checkers for the values YAML rules and globals
//! carry as plain strings: header names, URIs, CIDR networks, hostnames,
//! and the two regex dialects involved (path-matching patterns checked for
//! syntax validity only, path-substitution replacement strings checked for
//! forbidden control characters). Ported from the formats the original
//! `jsonschema.FormatChecker` registered, one predicate per format name.

use std::sync::OnceLock;

use regex::Regex;

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("valid static regex"))
        }
    };
}

static_regex!(
    header_field_name_re,
    r"^[0-9a-zA-Z!#$%&'*+\-.^_`|~]+$"
);
static_regex!(header_field_value_re, "^[\\x20-\\x7E\t]*$");
static_regex!(
    network_re,
    r"^(0|[1-9][0-9]*)(\.(0|[1-9][0-9]*)){3}/(0|[1-9][0-9]*)$"
);
static_regex!(
    unix_user_or_group_re,
    r"^[a-z_]([a-z0-9_-]{0,31}|[a-z0-9_-]{0,30}\$)$"
);
static_regex!(
    hostname_re,
    r"^(([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9\-]*[a-zA-Z0-9])\.)*([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9\-]*[a-zA-Z0-9])$"
);
static_regex!(scheme_re, r"^(https?)://(.*)$");

pub fn http_header_field_name(instance: &str) -> bool {
    header_field_name_re().is_match(instance)
}

pub fn http_header_field_value(instance: &str) -> bool {
    header_field_value_re().is_match(instance)
}

pub fn uri(instance: &str) -> bool {
    url::Url::parse(instance).is_ok()
}

/// Embeds `instance` as a path segment in a throwaway URI and checks it
/// round-trips unmodified; catches characters a bare path component can't
/// legally contain without writing a path grammar by hand.
pub fn uri_path(instance: &str) -> bool {
    let candidate = format!("http://example.com/{instance}?param=value#fragment");
    match url::Url::parse(&candidate) {
        Ok(url) => {
            url.path() == format!("/{instance}")
                && url.query() == Some("param=value")
                && url.fragment() == Some("fragment")
        }
        Err(_) => false,
    }
}

pub fn uri_query(instance: &str) -> bool {
    let candidate = format!("http://example.com/path?{instance}#fragment");
    match url::Url::parse(&candidate) {
        Ok(url) => {
            url.path() == "/path"
                && url.query() == Some(instance)
                && url.fragment() == Some("fragment")
        }
        Err(_) => false,
    }
}

pub fn network(instance: &str) -> bool {
    if !network_re().is_match(instance) {
        return false;
    }
    match instance.parse::<ipnet::Ipv4Net>() {
        Ok(net) => net.prefix_len() > 0 && net.prefix_len() <= 32,
        Err(_) => false,
    }
}

fn is_valid_port(port: &str) -> bool {
    port.parse::<u32>()
        .map(|p| p > 0 && p <= 65535)
        .unwrap_or(false)
}

fn is_valid_hostname(host: &str) -> bool {
    !host.is_empty() && host.len() <= 255 && hostname_re().is_match(host)
}

pub fn hostname_with_port(instance: &str) -> bool {
    match instance.split_once(':') {
        Some((host, port)) => is_valid_hostname(host) && is_valid_port(port),
        None => is_valid_hostname(instance),
    }
}

pub fn origin(instance: &str) -> bool {
    let hostport = match scheme_re().captures(instance) {
        Some(caps) => caps.get(2).unwrap().as_str(),
        None => instance,
    };
    match hostport.split_once(':') {
        Some((host, port)) => is_valid_hostname(host) && is_valid_port(port),
        None => is_valid_hostname(hostport),
    }
}

pub fn unix_user_or_group(instance: &str) -> bool {
    unix_user_or_group_re().is_match(instance)
}

/// The path-matching regex dialect; only syntax is checked here, not
/// constructibility as a finite automaton (the collision engine's FSM
/// builder is the authority on that, and runs later over fewer, already
/// schema-valid patterns).
pub fn orm_regex(instance: &str) -> bool {
    regex_syntax::Parser::new().parse(instance).is_ok()
}

/// Replacement strings for `req_path` substitutions: any non-control
/// character is allowed, including non-ASCII.
pub fn orm_regsub(instance: &str) -> bool {
    instance
        .chars()
        .all(|c| matches!(c as u32, 0x20..=0x7E | 0xA0..=0x10FFFF))
}
