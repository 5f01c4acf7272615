//! Keystone session provider.
//!
//! Exchanges password credentials for a project-scoped token and resolves
//! the orchestration endpoint from the service catalog.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::{Credentials, EndpointInterface};
use crate::error::{ApiError, ApiResult};
use crate::heat::HeatClient;
use crate::wire::fault_message;

/// Catalog service type for Heat.
pub const ORCHESTRATION_SERVICE: &str = "orchestration";

/// Produces an authenticated orchestration client.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> ApiResult<HeatClient>;
}

/// Identity API flavour inferred from the auth URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdentityVersion {
    V2,
    V3,
}

impl IdentityVersion {
    fn detect(auth_url: &str) -> Self {
        let trimmed = auth_url.trim_end_matches('/');
        if trimmed.ends_with("/v2.0") {
            IdentityVersion::V2
        } else {
            IdentityVersion::V3
        }
    }
}

/// Keystone-backed [`SessionProvider`].
#[derive(Clone, Default)]
pub struct KeystoneSession {
    http: reqwest::Client,
}

impl KeystoneSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_http_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn token_v2(&self, credentials: &Credentials) -> ApiResult<(String, String)> {
        let url = format!("{}/tokens", credentials.auth_url.trim_end_matches('/'));
        let body = json!({
            "auth": {
                "tenantName": credentials.project_name,
                "passwordCredentials": {
                    "username": credentials.username,
                    "password": credentials.password,
                }
            }
        });

        let response = self.http.post(&url).json(&body).send().await?;
        let response = check_auth(response).await?;
        let access: V2Envelope = response.json().await?;

        let endpoint = select_endpoint_v2(
            &access.access.service_catalog,
            credentials.interface,
            credentials.region_name.as_deref(),
        )?;
        Ok((access.access.token.id, endpoint))
    }

    async fn token_v3(&self, credentials: &Credentials) -> ApiResult<(String, String)> {
        let base = credentials.auth_url.trim_end_matches('/');
        let base = if base.ends_with("/v3") {
            base.to_string()
        } else {
            format!("{}/v3", base)
        };
        let url = format!("{}/auth/tokens", base);

        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": credentials.username,
                            "domain": {"name": credentials.user_domain_name},
                            "password": credentials.password,
                        }
                    }
                },
                "scope": {
                    "project": {
                        "name": credentials.project_name,
                        "domain": {"name": credentials.project_domain_name},
                    }
                }
            }
        });

        let response = self.http.post(&url).json(&body).send().await?;
        let response = check_auth(response).await?;

        let token = response
            .headers()
            .get("X-Subject-Token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ApiError::Authentication("response carried no X-Subject-Token".into()))?;

        let envelope: V3Envelope = response.json().await?;
        let endpoint = select_endpoint_v3(
            &envelope.token.catalog,
            credentials.interface,
            credentials.region_name.as_deref(),
        )?;
        Ok((token, endpoint))
    }
}

#[async_trait]
impl SessionProvider for KeystoneSession {
    async fn authenticate(&self, credentials: &Credentials) -> ApiResult<HeatClient> {
        credentials.validate()?;

        let version = IdentityVersion::detect(&credentials.auth_url);
        info!(
            "Authenticating {} against {} ({:?})",
            credentials.username, credentials.auth_url, version
        );

        let (token, endpoint) = match version {
            IdentityVersion::V2 => self.token_v2(credentials).await?,
            IdentityVersion::V3 => self.token_v3(credentials).await?,
        };

        debug!("Orchestration endpoint: {}", endpoint);
        HeatClient::with_http_client(self.http.clone(), &endpoint, token)
    }
}

async fn check_auth(response: reqwest::Response) -> ApiResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = fault_message(&body);
    match status.as_u16() {
        400 | 401 | 403 | 404 => Err(ApiError::Authentication(message)),
        code => Err(ApiError::from_status(code, message)),
    }
}

#[derive(Debug, Deserialize)]
struct V2Envelope {
    access: V2Access,
}

#[derive(Debug, Deserialize)]
struct V2Access {
    token: V2Token,
    #[serde(default, rename = "serviceCatalog")]
    service_catalog: Vec<V2Service>,
}

#[derive(Debug, Deserialize)]
struct V2Token {
    id: String,
}

#[derive(Debug, Deserialize)]
struct V2Service {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct V3Envelope {
    token: V3Token,
}

#[derive(Debug, Deserialize)]
struct V3Token {
    #[serde(default)]
    catalog: Vec<V3Service>,
}

#[derive(Debug, Deserialize)]
struct V3Service {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<V3Endpoint>,
}

#[derive(Debug, Deserialize)]
struct V3Endpoint {
    interface: String,
    url: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    region_id: Option<String>,
}

fn select_endpoint_v2(
    catalog: &[V2Service],
    interface: EndpointInterface,
    region: Option<&str>,
) -> ApiResult<String> {
    catalog
        .iter()
        .filter(|service| service.service_type == ORCHESTRATION_SERVICE)
        .flat_map(|service| service.endpoints.iter())
        .filter(|endpoint| {
            region.map_or(true, |r| {
                endpoint.get("region").and_then(|v| v.as_str()) == Some(r)
            })
        })
        .find_map(|endpoint| endpoint.get(interface.v2_key()).and_then(|v| v.as_str()))
        .map(str::to_string)
        .ok_or_else(|| not_in_catalog(interface, region))
}

fn select_endpoint_v3(
    catalog: &[V3Service],
    interface: EndpointInterface,
    region: Option<&str>,
) -> ApiResult<String> {
    catalog
        .iter()
        .filter(|service| service.service_type == ORCHESTRATION_SERVICE)
        .flat_map(|service| service.endpoints.iter())
        .filter(|endpoint| endpoint.interface == interface.as_str())
        .find(|endpoint| {
            region.map_or(true, |r| {
                endpoint.region_id.as_deref() == Some(r) || endpoint.region.as_deref() == Some(r)
            })
        })
        .map(|endpoint| endpoint.url.clone())
        .ok_or_else(|| not_in_catalog(interface, region))
}

fn not_in_catalog(interface: EndpointInterface, region: Option<&str>) -> ApiError {
    ApiError::EndpointNotFound(format!(
        "no {} {} endpoint in the service catalog{}",
        interface.as_str(),
        ORCHESTRATION_SERVICE,
        region.map(|r| format!(" for region {}", r)).unwrap_or_default()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_detection() {
        assert_eq!(IdentityVersion::detect("http://127.0.0.1:35357/v2.0/"), IdentityVersion::V2);
        assert_eq!(IdentityVersion::detect("http://keystone:5000/v3"), IdentityVersion::V3);
        assert_eq!(IdentityVersion::detect("http://keystone:5000"), IdentityVersion::V3);
    }

    #[test]
    fn test_v2_catalog_selection() {
        let body = r#"{
            "access": {
                "token": {"id": "tok-v2"},
                "serviceCatalog": [
                    {"type": "compute", "endpoints": [{"region": "RegionOne", "publicURL": "http://nova"}]},
                    {"type": "orchestration", "endpoints": [
                        {"region": "RegionOne", "publicURL": "http://heat-one:8004/v1/t", "internalURL": "http://heat-int:8004/v1/t"},
                        {"region": "RegionTwo", "publicURL": "http://heat-two:8004/v1/t"}
                    ]}
                ]
            }
        }"#;
        let envelope: V2Envelope = serde_json::from_str(body).unwrap();
        let catalog = &envelope.access.service_catalog;

        assert_eq!(
            select_endpoint_v2(catalog, EndpointInterface::Public, None).unwrap(),
            "http://heat-one:8004/v1/t"
        );
        assert_eq!(
            select_endpoint_v2(catalog, EndpointInterface::Public, Some("RegionTwo")).unwrap(),
            "http://heat-two:8004/v1/t"
        );
        assert_eq!(
            select_endpoint_v2(catalog, EndpointInterface::Internal, None).unwrap(),
            "http://heat-int:8004/v1/t"
        );
    }

    #[test]
    fn test_v2_catalog_without_orchestration() {
        let body = r#"{"access": {"token": {"id": "t"}, "serviceCatalog": [
            {"type": "compute", "endpoints": [{"publicURL": "http://nova"}]}
        ]}}"#;
        let envelope: V2Envelope = serde_json::from_str(body).unwrap();
        let err = select_endpoint_v2(&envelope.access.service_catalog, EndpointInterface::Public, None)
            .unwrap_err();
        assert!(matches!(err, ApiError::EndpointNotFound(_)));
    }

    #[test]
    fn test_v3_catalog_selection() {
        let body = r#"{"token": {"catalog": [
            {"type": "orchestration", "endpoints": [
                {"interface": "admin", "url": "http://heat-admin", "region_id": "RegionOne"},
                {"interface": "public", "url": "http://heat-public", "region_id": "RegionOne", "region": "RegionOne"}
            ]}
        ]}}"#;
        let envelope: V3Envelope = serde_json::from_str(body).unwrap();
        let catalog = &envelope.token.catalog;

        assert_eq!(
            select_endpoint_v3(catalog, EndpointInterface::Public, Some("RegionOne")).unwrap(),
            "http://heat-public"
        );
        assert!(matches!(
            select_endpoint_v3(catalog, EndpointInterface::Internal, None),
            Err(ApiError::EndpointNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_incomplete_credentials() {
        let creds = Credentials::new("admin", "", "admin", "http://127.0.0.1:35357/v2.0/");
        let result = KeystoneSession::new().authenticate(&creds).await;
        assert!(matches!(result, Err(ApiError::Config(_))));
    }
}
