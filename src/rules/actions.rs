//! The action-configuration types attached to a rule, and to globals'
//! global-action bundles. Shapes mirror the YAML surface of each action
//! kind directly; the fixed emission order lives in `emit::ordering`, not
//! here — this module only models data, not sequencing.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OriginSpec {
    Simple(String),
    Detailed {
        server: String,
        #[serde(default)]
        max_connections: Option<u32>,
        #[serde(default)]
        max_queued_connections: Option<u32>,
    },
}

impl OriginSpec {
    pub fn server(&self) -> &str {
        match self {
            OriginSpec::Simple(s) => s,
            OriginSpec::Detailed { server, .. } => server,
        }
    }

    pub fn max_connections(&self) -> Option<u32> {
        match self {
            OriginSpec::Simple(_) => None,
            OriginSpec::Detailed {
                max_connections, ..
            } => *max_connections,
        }
    }

    pub fn max_queued_connections(&self) -> Option<u32> {
        match self {
            OriginSpec::Simple(_) => None,
            OriginSpec::Detailed {
                max_queued_connections,
                ..
            } => *max_queued_connections,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BackendAction {
    Origin { origin: OriginSpec },
    Servers { servers: Vec<OriginSpec> },
}

impl BackendAction {
    pub fn origins(&self) -> Vec<&OriginSpec> {
        match self {
            BackendAction::Origin { origin } => vec![origin],
            BackendAction::Servers { servers } => servers.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingSlash {
    Add,
    Remove,
    DoNothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectType {
    Temporary,
    Permanent,
    TemporaryAllowMethodChange,
    PermanentAllowMethodChange,
}

impl RedirectType {
    pub fn status_code(&self) -> u16 {
        match self {
            RedirectType::Temporary => 307,
            RedirectType::Permanent => 308,
            RedirectType::TemporaryAllowMethodChange => 302,
            RedirectType::PermanentAllowMethodChange => 301,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedirectAction {
    #[serde(rename = "type")]
    pub kind: RedirectType,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Vec<PathModOp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetHeader {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HeaderOp {
    Remove { remove: String },
    Set { set: SetHeader },
    Add { add: SetHeader },
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathReplace {
    #[serde(default)]
    pub from_regex: Option<String>,
    #[serde(default)]
    pub from_exact: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub to_regsub: Option<String>,
    #[serde(default)]
    pub ignore_case: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathPrefix {
    #[serde(default)]
    pub remove: Option<String>,
    #[serde(default)]
    pub add: Option<String>,
    #[serde(default)]
    pub ignore_case: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PathModOp {
    Replace { replace: PathReplace },
    Prefix { prefix: PathPrefix },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Actions {
    #[serde(default)]
    pub https_redirection: Option<bool>,
    #[serde(default)]
    pub trailing_slash: Option<TrailingSlash>,
    #[serde(default)]
    pub synthetic_response: Option<String>,
    #[serde(default)]
    pub redirect: Option<RedirectAction>,
    #[serde(default)]
    pub header_southbound: Option<Vec<HeaderOp>>,
    #[serde(default)]
    pub req_path: Option<Vec<PathModOp>>,
    #[serde(default)]
    pub backend: Option<BackendAction>,
    #[serde(default)]
    pub header_northbound: Option<Vec<HeaderOp>>,
}

impl Actions {
    pub fn is_empty(&self) -> bool {
        self.https_redirection.is_none()
            && self.trailing_slash.is_none()
            && self.synthetic_response.is_none()
            && self.redirect.is_none()
            && self.header_southbound.is_none()
            && self.req_path.is_none()
            && self.backend.is_none()
            && self.header_northbound.is_none()
    }
}
