//! The `globals.yaml` document: cluster-wide settings consumed by both
//! emitters (crypto/certificates, DNS, internal networks, per-tier service
//! accounts, the shared healthcheck, global header actions, and the
//! `https_redirection` default). Grounded on the `globals_doc` access
//! pattern in both renderers.

use serde::Deserialize;

use crate::rules::actions::HeaderOp;

#[derive(Debug, Default, Deserialize)]
pub struct Globals {
    #[serde(default = "default_schema_version")]
    pub schema_version: u64,
    #[serde(default)]
    pub crypto: Crypto,
    #[serde(default)]
    pub dns: Dns,
    #[serde(default)]
    pub internal_networks: Vec<String>,
    #[serde(default)]
    pub varnish: Tier,
    #[serde(default)]
    pub haproxy: Tier,
    #[serde(default)]
    pub custom_internal_healthcheck: Option<HealthCheck>,
    #[serde(default)]
    pub global_actions: GlobalActions,
    #[serde(default)]
    pub defaults: Defaults,
}

fn default_schema_version() -> u64 {
    1
}

#[derive(Debug, Default, Deserialize)]
pub struct Crypto {
    #[serde(default)]
    pub certificates: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Dns {
    #[serde(default)]
    pub nameservers: Vec<String>,
}

impl Dns {
    /// Nameservers with the default port appended, as the HAProxy renderer
    /// does inline (`x if ":" in x else x + ":53"`).
    pub fn nameservers_with_port(&self) -> Vec<String> {
        self.nameservers
            .iter()
            .map(|ns| {
                if ns.contains(':') {
                    ns.clone()
                } else {
                    format!("{ns}:53")
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct Tier {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_account")]
    pub user: String,
    #[serde(default = "default_account")]
    pub group: String,
    #[serde(default = "default_account")]
    pub control_user: String,
    #[serde(default = "default_account")]
    pub control_group: String,
}

impl Default for Tier {
    fn default() -> Self {
        Self {
            address: default_address(),
            user: default_account(),
            group: default_account(),
            control_user: default_account(),
            control_group: default_account(),
        }
    }
}

fn default_address() -> String {
    "localhost".to_string()
}

fn default_account() -> String {
    "root".to_string()
}

#[derive(Debug, Deserialize)]
pub struct HealthCheck {
    pub http: HttpHealthCheck,
}

#[derive(Debug, Deserialize)]
pub struct HttpHealthCheck {
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub domain: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct GlobalActions {
    #[serde(default)]
    pub header_southbound: Vec<HeaderOp>,
    #[serde(default)]
    pub header_northbound: Vec<HeaderOp>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub https_redirection: bool,
}
