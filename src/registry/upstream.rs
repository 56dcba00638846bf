use crate::config::AccountConfig;
use crate::error::{RegistryWatchError, Result};
use reqwest::Client;

/// HTTP client for one account's registry endpoint.
pub struct RegistryClient {
    client: Client,
    base_url: String,
    auth: Option<(String, String)>,
}

impl RegistryClient {
    pub fn new(account: &AccountConfig) -> Result<Self> {
        // Connection pooling matters here: one poll cycle issues a tags/list
        // plus a manifest HEAD per tag against the same host.
        let client = Client::builder()
            .danger_accept_invalid_certs(account.insecure)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .timeout(std::time::Duration::from_secs(account.timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(RegistryWatchError::Http)?;

        let auth = account
            .auth
            .as_ref()
            .map(|a| (a.username.clone(), a.password.clone()));

        Ok(Self {
            client,
            base_url: account.address.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a registry API path, attaching credentials and Accept header when
    /// configured.
    pub async fn get(&self, path: &str, accept: Option<&str>) -> Result<reqwest::Response> {
        let mut request = self.client.get(format!("{}{}", self.base_url, path));
        if let Some(accept) = accept {
            request = request.header("Accept", accept);
        }
        if let Some((user, pass)) = &self.auth {
            request = request.basic_auth(user, Some(pass));
        }
        request.send().await.map_err(RegistryWatchError::Http)
    }

    /// HEAD a registry API path. Used for digest resolution so manifest bodies
    /// are only transferred when the registry omits Docker-Content-Digest.
    pub async fn head(&self, path: &str, accept: Option<&str>) -> Result<reqwest::Response> {
        let mut request = self.client.head(format!("{}{}", self.base_url, path));
        if let Some(accept) = accept {
            request = request.header("Accept", accept);
        }
        if let Some((user, pass)) = &self.auth {
            request = request.basic_auth(user, Some(pass));
        }
        request.send().await.map_err(RegistryWatchError::Http)
    }
}
