//! Main client implementation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use url::Url;

use crate::api::{ConfigTreesApi, ResourceApi, ResourceKind};
use crate::error::{error_for_status, Error, Result};

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the organization GUID.
const ORGANIZATION_HEADER: &str = "organizationguid";

/// Header carrying the project GUID.
const PROJECT_HEADER: &str = "project";

/// RoboCloud API client.
///
/// Provides typed access to the platform's v2 endpoints.
///
/// # Example
///
/// ```no_run
/// use robocloud_client::RoboCloudClient;
///
/// # async fn example() -> robocloud_client::Result<()> {
/// let client = RoboCloudClient::builder()
///     .base_url("https://api.robocloud.io")
///     .auth_token("secret")
///     .organization("org-abc")
///     .project("project-xyz")
///     .build()?;
///
/// let deployments = client.deployments().list_all().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RoboCloudClient {
    /// Inner shared state.
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
pub(crate) struct ClientInner {
    /// HTTP client.
    pub(crate) http: reqwest::Client,
    /// Base URL for API requests.
    pub(crate) base_url: Url,
    /// Request timeout.
    pub(crate) timeout: Duration,
    /// Organization GUID sent with every request.
    pub(crate) organization: Option<String>,
    /// Project GUID sent with every request.
    pub(crate) project: Option<String>,
}

impl RoboCloudClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Organization GUID this client is scoped to, if any.
    pub fn organization(&self) -> Option<&str> {
        self.inner.organization.as_deref()
    }

    /// Project GUID this client is scoped to, if any.
    pub fn project(&self) -> Option<&str> {
        self.inner.project.as_deref()
    }

    /// Return a client that shares the connection pool but targets another project.
    pub fn with_project(&self, project: impl Into<String>) -> Self {
        let inner = &self.inner;
        Self {
            inner: Arc::new(ClientInner {
                http: inner.http.clone(),
                base_url: inner.base_url.clone(),
                timeout: inner.timeout,
                organization: inner.organization.clone(),
                project: Some(project.into()),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the projects API.
    pub fn projects(&self) -> ResourceApi {
        ResourceApi::new(self.clone(), ResourceKind::Project)
    }

    /// Access the deployments API.
    pub fn deployments(&self) -> ResourceApi {
        ResourceApi::new(self.clone(), ResourceKind::Deployment)
    }

    /// Access the packages API.
    pub fn packages(&self) -> ResourceApi {
        ResourceApi::new(self.clone(), ResourceKind::Package)
    }

    /// Access the disks API.
    pub fn disks(&self) -> ResourceApi {
        ResourceApi::new(self.clone(), ResourceKind::Disk)
    }

    /// Access the secrets API.
    pub fn secrets(&self) -> ResourceApi {
        ResourceApi::new(self.clone(), ResourceKind::Secret)
    }

    /// Access the networks API.
    pub fn networks(&self) -> ResourceApi {
        ResourceApi::new(self.clone(), ResourceKind::Network)
    }

    /// Access the users API.
    pub fn users(&self) -> ResourceApi {
        ResourceApi::new(self.clone(), ResourceKind::User)
    }

    /// Access the config trees API.
    pub fn config_trees(&self) -> ConfigTreesApi {
        ConfigTreesApi::new(self.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Build a URL for an API path.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        self.inner
            .base_url
            .join(&format!("v2/{}", path))
            .map_err(Error::from)
    }

    /// Attach the per-request scoping headers.
    fn scoped(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut request = request.timeout(self.inner.timeout);
        if let Some(org) = &self.inner.organization {
            request = request.header(HeaderName::from_static(ORGANIZATION_HEADER), org);
        }
        if let Some(project) = &self.inner.project {
            request = request.header(HeaderName::from_static(PROJECT_HEADER), project);
        }
        request
    }

    /// Make a GET request.
    pub(crate) async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        tracing::debug!(%url, "GET");
        let response = self.scoped(self.inner.http.get(url)).send().await?;
        self.handle_response(response).await
    }

    /// Make a GET request with query parameters.
    pub(crate) async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        tracing::debug!(%url, "GET");
        let response = self
            .scoped(self.inner.http.get(url).query(query))
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Make a POST request.
    pub(crate) async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        tracing::debug!(%url, "POST");
        let response = self
            .scoped(self.inner.http.post(url).json(body))
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Make a PUT request.
    pub(crate) async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        tracing::debug!(%url, "PUT");
        let response = self
            .scoped(self.inner.http.put(url).json(body))
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Make a DELETE request.
    pub(crate) async fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path)?;
        tracing::debug!(%url, "DELETE");
        let response = self.scoped(self.inner.http.delete(url)).send().await?;

        if !response.status().is_success() {
            return Err(self.extract_error(response).await);
        }

        Ok(())
    }

    /// Handle a response, extracting the body or error.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Extract an error from a failed response.
    async fn extract_error(&self, response: reqwest::Response) -> Error {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status, "request failed");
        error_for_status(status, &body)
    }
}

/// Builder for creating a RoboCloudClient.
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: Option<String>,
    auth_token: Option<String>,
    organization: Option<String>,
    project: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            auth_token: None,
            organization: None,
            project: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
        }
    }

    /// Set the base URL for the platform API.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the authentication token.
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the organization GUID.
    pub fn organization(mut self, guid: impl Into<String>) -> Self {
        self.organization = Some(guid.into());
        self
    }

    /// Set the project GUID.
    pub fn project(mut self, guid: impl Into<String>) -> Self {
        self.project = Some(guid.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<RoboCloudClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;

        // Parse and normalize base URL
        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| Error::Config("Invalid auth token".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        // Scoping headers must be valid header values even though they are attached per request
        for (name, value) in [
            (ORGANIZATION_HEADER, &self.organization),
            (PROJECT_HEADER, &self.project),
        ] {
            if let Some(value) = value {
                HeaderValue::from_str(value)
                    .map_err(|_| Error::Config(format!("Invalid {} header value", name)))?;
            }
        }

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("robocloud-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()?;

        Ok(RoboCloudClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                timeout: self.timeout,
                organization: self.organization,
                project: self.project,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Percent-encode a resource name as a single path segment.
///
/// `.` and `..` would be resolved away by URL joining, so they are rejected.
pub(crate) fn path_segment(name: &str) -> Result<String> {
    match name {
        "" | "." | ".." => Err(Error::Config(format!("invalid resource name: {:?}", name))),
        _ => Ok(urlencoding::encode(name).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_base_url() {
        let result = ClientBuilder::new().build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_with_base_url() {
        let client = ClientBuilder::new()
            .base_url("https://api.robocloud.io")
            .build()
            .unwrap();

        assert_eq!(client.base_url().as_str(), "https://api.robocloud.io/");
    }

    #[test]
    fn test_builder_normalizes_trailing_slash() {
        let client = ClientBuilder::new()
            .base_url("https://api.robocloud.io/")
            .build()
            .unwrap();

        assert_eq!(client.base_url().as_str(), "https://api.robocloud.io/");
    }

    #[test]
    fn test_builder_rejects_bad_header_values() {
        let result = ClientBuilder::new()
            .base_url("https://api.robocloud.io")
            .project("bad\nproject")
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_url_building() {
        let client = ClientBuilder::new()
            .base_url("https://api.robocloud.io")
            .build()
            .unwrap();

        let url = client.url("projects").unwrap();
        assert_eq!(url.as_str(), "https://api.robocloud.io/v2/projects");

        let url = client.url("/config-trees/site/keys").unwrap();
        assert_eq!(url.as_str(), "https://api.robocloud.io/v2/config-trees/site/keys");
    }

    #[test]
    fn test_with_project_keeps_organization() {
        let client = ClientBuilder::new()
            .base_url("https://api.robocloud.io")
            .organization("org-1")
            .project("p-1")
            .build()
            .unwrap();

        let other = client.with_project("p-2");
        assert_eq!(other.organization(), Some("org-1"));
        assert_eq!(other.project(), Some("p-2"));
        assert_eq!(client.project(), Some("p-1"));
    }

    #[test]
    fn test_path_segment_escapes_names() {
        assert_eq!(path_segment("nav-config").unwrap(), "nav-config");
        assert_eq!(path_segment("lab/a?b#c").unwrap(), "lab%2Fa%3Fb%23c");
        assert_eq!(path_segment("my tree").unwrap(), "my%20tree");
        for name in ["", ".", ".."] {
            assert!(matches!(path_segment(name), Err(Error::Config(_))));
        }
    }

    #[test]
    fn test_escaped_segment_stays_in_collection() {
        let client = ClientBuilder::new()
            .base_url("https://api.robocloud.io")
            .build()
            .unwrap();
        let path = format!("config-trees/{}/keys", path_segment("../secrets/x").unwrap());
        let url = client.url(&path).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.robocloud.io/v2/config-trees/..%2Fsecrets%2Fx/keys"
        );
    }
}
