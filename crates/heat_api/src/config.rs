//! Credentials and clouds.yaml profiles.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ApiError, ApiResult};

/// Keystone URL used when none is configured.
pub const DEFAULT_AUTH_URL: &str = "http://127.0.0.1:35357/v2.0/";

/// Service catalog interface to pick the orchestration endpoint from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointInterface {
    #[default]
    Public,
    Internal,
    Admin,
}

impl EndpointInterface {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointInterface::Public => "public",
            EndpointInterface::Internal => "internal",
            EndpointInterface::Admin => "admin",
        }
    }

    /// Key used by the Keystone v2.0 catalog (`publicURL`, ...).
    pub fn v2_key(&self) -> &'static str {
        match self {
            EndpointInterface::Public => "publicURL",
            EndpointInterface::Internal => "internalURL",
            EndpointInterface::Admin => "adminURL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().trim_end_matches("url") {
            "public" => Some(EndpointInterface::Public),
            "internal" => Some(EndpointInterface::Internal),
            "admin" => Some(EndpointInterface::Admin),
            _ => None,
        }
    }
}

/// Password credentials for a project-scoped token.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Project (v3) or tenant (v2.0) name
    pub project_name: String,
    pub auth_url: String,
    pub region_name: Option<String>,
    pub user_domain_name: String,
    pub project_domain_name: String,
    pub interface: EndpointInterface,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("project_name", &self.project_name)
            .field("auth_url", &self.auth_url)
            .field("region_name", &self.region_name)
            .field("interface", &self.interface)
            .finish()
    }
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        project_name: impl Into<String>,
        auth_url: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            project_name: project_name.into(),
            auth_url: auth_url.into(),
            region_name: None,
            user_domain_name: "Default".to_string(),
            project_domain_name: "Default".to_string(),
            interface: EndpointInterface::default(),
        }
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region_name = Some(region.into());
        self
    }

    pub fn interface(mut self, interface: EndpointInterface) -> Self {
        self.interface = interface;
        self
    }

    pub fn domains(mut self, user_domain: impl Into<String>, project_domain: impl Into<String>) -> Self {
        self.user_domain_name = user_domain.into();
        self.project_domain_name = project_domain.into();
        self
    }

    /// Check that every field needed for a token exchange is present.
    pub fn validate(&self) -> ApiResult<()> {
        let missing: Vec<&str> = [
            ("username", &self.username),
            ("password", &self.password),
            ("project_name", &self.project_name),
            ("auth_url", &self.auth_url),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Config(format!(
                "missing credential fields: {}",
                missing.join(", ")
            )))
        }
    }
}

#[derive(Debug, Deserialize)]
struct CloudsFile {
    #[serde(default)]
    clouds: HashMap<String, CloudEntry>,
}

#[derive(Debug, Deserialize)]
struct CloudEntry {
    auth: CloudAuth,
    #[serde(default)]
    region_name: Option<String>,
    #[serde(default)]
    interface: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CloudAuth {
    #[serde(default)]
    auth_url: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    project_name: Option<String>,
    #[serde(default)]
    tenant_name: Option<String>,
    #[serde(default)]
    user_domain_name: Option<String>,
    #[serde(default)]
    project_domain_name: Option<String>,
}

/// Locations searched for `clouds.yaml`, most specific first.
///
/// `OS_CLIENT_CONFIG_FILE` replaces the search when set.
pub fn clouds_search_paths() -> Vec<PathBuf> {
    if let Ok(path) = std::env::var("OS_CLIENT_CONFIG_FILE") {
        if !path.is_empty() {
            return vec![PathBuf::from(path)];
        }
    }

    let mut paths = vec![PathBuf::from("clouds.yaml")];
    if let Ok(home) = std::env::var("HOME") {
        paths.push(Path::new(&home).join(".config/openstack/clouds.yaml"));
    }
    paths.push(PathBuf::from("/etc/openstack/clouds.yaml"));
    paths
}

/// Load the named cloud from `path`, or from the first existing file in
/// [`clouds_search_paths`].
pub fn load_cloud(name: &str, path: Option<&Path>) -> ApiResult<Credentials> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => clouds_search_paths()
            .into_iter()
            .find(|p| p.exists())
            .ok_or_else(|| ApiError::Config("no clouds.yaml found".to_string()))?,
    };

    debug!("Loading cloud {} from {:?}", name, path);
    let content = std::fs::read_to_string(&path)?;
    parse_cloud(name, &content)
}

fn parse_cloud(name: &str, content: &str) -> ApiResult<Credentials> {
    let file: CloudsFile = serde_yaml::from_str(content)?;
    let entry = file
        .clouds
        .get(name)
        .ok_or_else(|| ApiError::Config(format!("cloud '{}' not defined in clouds.yaml", name)))?;

    let auth = &entry.auth;
    let mut credentials = Credentials::new(
        auth.username.clone().unwrap_or_default(),
        auth.password.clone().unwrap_or_default(),
        auth.project_name
            .clone()
            .or_else(|| auth.tenant_name.clone())
            .unwrap_or_default(),
        auth.auth_url.clone().unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
    );

    credentials.region_name = entry.region_name.clone();
    if let Some(domain) = &auth.user_domain_name {
        credentials.user_domain_name = domain.clone();
    }
    if let Some(domain) = &auth.project_domain_name {
        credentials.project_domain_name = domain.clone();
    }
    if let Some(interface) = entry.interface.as_deref() {
        credentials.interface = EndpointInterface::parse(interface).ok_or_else(|| {
            ApiError::Config(format!("unknown endpoint interface '{}'", interface))
        })?;
    }

    Ok(credentials)
}
