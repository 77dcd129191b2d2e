use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{Error, Result};
use crate::secrets::Credentials;
use crate::transport::decode_body;

pub const DEFAULT_IDENTITY_URL: &str = "https://identity.api.rackspacecloud.com/v2.0";
pub const DNS_SERVICE_TYPE: &str = "rax:dns";

/// An authenticated identity token and the DNS endpoint it unlocks.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub endpoint: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Access {
    token: Token,
    #[serde(default)]
    service_catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(rename = "publicURL")]
    pub public_url: String,
}

/// Pick the public URL of the DNS service out of a service catalog.
///
/// When `region` is given, endpoints that declare a different region are
/// skipped; endpoints without a region (Cloud DNS is global) always match.
pub fn locate_endpoint(catalog: &[CatalogEntry], region: Option<&str>) -> Result<String> {
    let entry = catalog
        .iter()
        .find(|entry| entry.service_type == DNS_SERVICE_TYPE)
        .ok_or_else(|| Error::Auth(format!("no {} service in catalog", DNS_SERVICE_TYPE)))?;

    entry
        .endpoints
        .iter()
        .find(|endpoint| match (region, endpoint.region.as_deref()) {
            (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual),
            _ => true,
        })
        .map(|endpoint| endpoint.public_url.trim_end_matches('/').to_string())
        .ok_or_else(|| Error::Auth(format!("no {} endpoint for region {:?}", DNS_SERVICE_TYPE, region)))
}

/// Exchange a username and API key for a token and the DNS endpoint.
pub async fn authenticate(
    client: &reqwest::Client,
    identity_url: &str,
    credentials: &Credentials,
    region: Option<&str>,
) -> Result<Session> {
    let url = format!("{}/tokens", identity_url.trim_end_matches('/'));
    let payload = json!({
        "auth": {
            "RAX-KSKEY:apiKeyCredentials": {
                "username": credentials.username,
                "apiKey": credentials.api_key,
            }
        }
    });

    debug!(url = %url, username = %credentials.username, "authenticating");

    let response = client
        .post(&url)
        .json(&payload)
        .send()
        .await
        .map_err(|source| Error::Network {
            url: url.clone(),
            source,
        })?;

    let status = response.status();
    let text = response.text().await.map_err(|source| Error::Network {
        url: url.clone(),
        source,
    })?;

    if !status.is_success() {
        return Err(Error::Auth(format!("identity service returned HTTP {}: {}", status, text)));
    }

    let body = decode_body(&url, &text)?;
    let token = TokenResponse::deserialize(&body).map_err(|e| Error::decode(&url, e))?;
    let endpoint = locate_endpoint(&token.access.service_catalog, region)?;

    debug!(endpoint = %endpoint, "authenticated");

    Ok(Session {
        token: token.access.token.id,
        endpoint,
    })
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn catalog() -> Vec<CatalogEntry> {
        serde_json::from_value(json!([
            {
                "name": "cloudServersOpenStack",
                "type": "compute",
                "endpoints": [{"region": "DFW", "publicURL": "https://dfw.servers.example/v2/123"}]
            },
            {
                "name": "cloudDNS",
                "type": "rax:dns",
                "endpoints": [{"publicURL": "https://dns.api.example.com/v1.0/123/"}]
            }
        ]))
        .unwrap()
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "jdoe".to_string(),
            api_key: "0123456789abcdef".to_string(),
        }
    }

    #[test]
    fn test_locate_dns_endpoint() {
        let endpoint = locate_endpoint(&catalog(), None).unwrap();
        assert_eq!(endpoint, "https://dns.api.example.com/v1.0/123");

        let regional = locate_endpoint(&catalog(), Some("ORD")).unwrap();
        assert_eq!(regional, endpoint);
    }

    #[test]
    fn test_locate_without_dns_service() {
        let catalog: Vec<CatalogEntry> = catalog()
            .into_iter()
            .filter(|entry| entry.service_type != DNS_SERVICE_TYPE)
            .collect();

        assert!(matches!(locate_endpoint(&catalog, None), Err(Error::Auth(_))));
    }

    #[test]
    fn test_locate_respects_declared_region() {
        let catalog: Vec<CatalogEntry> = serde_json::from_value(json!([{
            "type": "rax:dns",
            "endpoints": [
                {"region": "DFW", "publicURL": "https://dfw.dns.example"},
                {"region": "LON", "publicURL": "https://lon.dns.example"}
            ]
        }]))
        .unwrap();

        assert_eq!(locate_endpoint(&catalog, Some("lon")).unwrap(), "https://lon.dns.example");
        assert!(locate_endpoint(&catalog, Some("SYD")).is_err());
    }

    #[tokio::test]
    async fn test_authenticate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2.0/tokens"))
            .and(body_json(json!({
                "auth": {
                    "RAX-KSKEY:apiKeyCredentials": {
                        "username": "jdoe",
                        "apiKey": "0123456789abcdef"
                    }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access": {
                    "token": {"id": "token-1", "expires": "2030-01-01T00:00:00Z"},
                    "serviceCatalog": [{
                        "name": "cloudDNS",
                        "type": "rax:dns",
                        "endpoints": [{"publicURL": "https://dns.api.example.com/v1.0/123"}]
                    }]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let identity = format!("{}/v2.0", server.uri());
        let session = authenticate(&reqwest::Client::new(), &identity, &credentials(), None)
            .await
            .unwrap();

        assert_eq!(session.token, "token-1");
        assert_eq!(session.endpoint, "https://dns.api.example.com/v1.0/123");
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let err = authenticate(&reqwest::Client::new(), &server.uri(), &credentials(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth(m) if m.contains("401")));
    }
}
