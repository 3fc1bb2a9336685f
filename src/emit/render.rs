//! Final document assembly via `minijinja`. All routing logic already lives
//! in `cache_tier`/`lb_tier`; these templates only stitch rendered blocks
//! and globals into the two output files, the same division of labour the
//! original renderers kept between Python logic and their `.j2` templates.

use minijinja::{context, Environment};

use crate::config::Globals;
use crate::diagnostics::Diagnostics;
use crate::rules::RuleSet;

use super::{cache_tier, lb_tier};

/// Either emission succeeded with rendered text, or the emitter reported one
/// or more `Kind::Emitter` faults (spec.md §7) and no file should be written.
pub enum EmitResult {
    Ok(String),
    Faults(Diagnostics),
}

const CACHE_TEMPLATE: &str = r#"vcl 4.1;

sub global_actions_southbound {
{% for line in global_southbound %}{{ line }}
{% endfor %}}

sub global_actions_northbound {
{% for line in global_northbound %}{{ line }}
{% endfor %}}

sub vcl_recv {
  call global_actions_southbound;
{% for domain in domains %}
# domain: {{ domain.domain }}
{% for block in domain.rule_blocks %}
{{ block }}
{% endfor %}
{% if domain.default_block %}
{{ domain.default_block }}
{% endif %}
{% endfor %}
}

sub vcl_deliver {
  call global_actions_northbound;
{% for block in deliver_blocks %}
{{ block }}
{% endfor %}
}
"#;

const LB_TEMPLATE: &str = r#"global
    user {{ haproxy_user }}
    group {{ haproxy_group }}

resolvers dns
{% for ns in nameservers %}
    nameserver ns{{ loop.index }} {{ ns }}
{% endfor %}

defaults
    mode http

frontend fe_main
    bind {{ haproxy_address }}:443{% if certs %} ssl{% endif %}{% for cert in certs %} crt {{ cert }}{% endfor %}
    acl from_cache_tier src {{ varnish_address }}
{% for network in internal_networks %}
    acl internal_network src {{ network }}
{% endfor %}
{% for acl in backend_acls %}
{{ acl }}
{% endfor %}

{% for backend in backends %}
{% for line in backend.backend_lines %}
{{ line }}
{% endfor %}
{% endfor %}

{% for line in healthcheck %}
{{ line }}
{% endfor %}
"#;

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.add_template("cache_tier.vcl.j2", CACHE_TEMPLATE)
        .expect("bundled cache-tier template compiles");
    env.add_template("lb_tier.cfg.j2", LB_TEMPLATE)
        .expect("bundled lb-tier template compiles");
    env
}

pub fn render_cache_tier(rule_set: &RuleSet, globals: &Globals) -> Result<String, minijinja::Error> {
    let rendered = cache_tier::render(rule_set, globals);
    let global_southbound = rendered.global_southbound;
    let global_northbound = rendered.global_northbound;
    let domains: Vec<_> = rendered
        .domains
        .into_iter()
        .map(|d| {
            context! {
                domain => d.domain,
                rule_blocks => d.rule_blocks,
                default_block => d.default_block,
            }
        })
        .collect();
    let deliver_blocks = rendered.deliver_blocks;
    let env = environment();
    let tmpl = env.get_template("cache_tier.vcl.j2")?;
    tmpl.render(context! {
        domains,
        global_southbound,
        global_northbound,
        deliver_blocks,
    })
}

pub fn render_lb_tier(rule_set: &RuleSet, globals: &Globals) -> Result<EmitResult, minijinja::Error> {
    let (sections, diagnostics) = lb_tier::render(rule_set, globals);
    if !diagnostics.is_empty() {
        return Ok(EmitResult::Faults(diagnostics));
    }
    let backend_acls: Vec<String> = sections.iter().map(|b| b.acl.clone()).collect();
    let backends: Vec<_> = sections
        .into_iter()
        .map(|b| context! { rule_id => b.rule_id, backend_lines => b.backend_lines })
        .collect();
    let healthcheck = lb_tier::render_custom_internal_healthcheck(globals);
    let env = environment();
    let tmpl = env.get_template("lb_tier.cfg.j2")?;
    let rendered = tmpl.render(context! {
        backend_acls,
        backends,
        healthcheck,
        haproxy_user => globals.haproxy.user.clone(),
        haproxy_group => globals.haproxy.group.clone(),
        haproxy_address => globals.haproxy.address.clone(),
        varnish_address => globals.varnish.address.clone(),
        certs => globals.crypto.certificates.clone(),
        internal_networks => globals.internal_networks.clone(),
        nameservers => globals.dns.nameservers_with_port(),
    })?;
    Ok(EmitResult::Ok(rendered))
}
