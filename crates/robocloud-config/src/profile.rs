//! Client profile: which platform environment to talk to, and as whom.
//!
//! ```yaml
//! environment: prod
//! auth-token: eyJhbGciOi...
//! organization-id: org-bvrcmeqrsbkvuxmbhjphpbzb
//! project-id: project-qbnmvhpjcdaaqsrdtzvahjcb
//! timeout: 30
//! ```
//!
//! Environment variables override file values:
//! `ROBOCLOUD_AUTH_TOKEN`, `ROBOCLOUD_ORGANIZATION`, `ROBOCLOUD_PROJECT`,
//! `ROBOCLOUD_ENVIRONMENT`, `ROBOCLOUD_BASE_URL`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use robocloud_client::{ClientBuilder, RoboCloudClient};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default profile filename within the config directory.
const PROFILE_FILE: &str = "profile.yaml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "robocloud";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "ROBOCLOUD_CONFIG_DIR";

const AUTH_TOKEN_ENV: &str = "ROBOCLOUD_AUTH_TOKEN";
const ORGANIZATION_ENV: &str = "ROBOCLOUD_ORGANIZATION";
const PROJECT_ENV: &str = "ROBOCLOUD_PROJECT";
const ENVIRONMENT_ENV: &str = "ROBOCLOUD_ENVIRONMENT";
const BASE_URL_ENV: &str = "ROBOCLOUD_BASE_URL";

// ─────────────────────────────────────────────────────────────────────────────
// Environment
// ─────────────────────────────────────────────────────────────────────────────

/// A platform deployment environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Environment {
    #[default]
    Production,
    Staging,
    /// Any other named environment (`qa`, `dev-eu`, ...).
    Named(String),
}

impl Environment {
    /// API host for this environment.
    pub fn api_host(&self) -> String {
        match self {
            Environment::Production => "https://api.robocloud.io".to_string(),
            Environment::Staging => "https://api.staging.robocloud.io".to_string(),
            Environment::Named(name) => format!("https://api.{}.robocloud.io", name),
        }
    }
}

impl From<String> for Environment {
    fn from(name: String) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "prod" | "production" => Environment::Production,
            "staging" => Environment::Staging,
            other => Environment::Named(other.to_string()),
        }
    }
}

impl From<Environment> for String {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Production => "prod".to_string(),
            Environment::Staging => "staging".to_string(),
            Environment::Named(name) => name,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile
// ─────────────────────────────────────────────────────────────────────────────

/// Connection settings for the platform client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClientProfile {
    /// Platform environment; selects the API host.
    pub environment: Environment,

    /// Explicit API base URL, overriding the environment's host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Bearer token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Organization GUID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,

    /// Project GUID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Request timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl ClientProfile {
    /// Parse from a YAML string.
    pub fn from_yaml(yaml_str: &str) -> Result<Self> {
        serde_yaml::from_str(yaml_str).map_err(|e| ConfigError::ParseYaml(e.to_string()))
    }

    /// Serialize to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::ParseYaml(e.to_string()))
    }

    /// Apply overrides from the process environment.
    pub fn with_process_env(self) -> Self {
        self.with_env(|name| std::env::var(name).ok())
    }

    /// Apply overrides from a variable lookup. Empty values are ignored.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(token) = var(AUTH_TOKEN_ENV) {
            self.auth_token = Some(token);
        }
        if let Some(org) = var(ORGANIZATION_ENV) {
            self.organization_id = Some(org);
        }
        if let Some(project) = var(PROJECT_ENV) {
            self.project_id = Some(project);
        }
        if let Some(env) = var(ENVIRONMENT_ENV) {
            self.environment = Environment::from(env);
        }
        if let Some(url) = var(BASE_URL_ENV) {
            self.base_url = Some(url);
        }
        self
    }

    /// The API base URL this profile points at.
    pub fn api_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.environment.api_host())
    }

    /// A client builder preconfigured from this profile.
    pub fn client_builder(&self) -> ClientBuilder {
        let mut builder = RoboCloudClient::builder().base_url(self.api_url());
        if let Some(token) = &self.auth_token {
            builder = builder.auth_token(token);
        }
        if let Some(org) = &self.organization_id {
            builder = builder.organization(org);
        }
        if let Some(project) = &self.project_id {
            builder = builder.project(project);
        }
        if let Some(secs) = self.timeout {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder
    }

    /// Build a client from this profile.
    pub fn build_client(&self) -> Result<RoboCloudClient> {
        if self.auth_token.is_none() {
            tracing::warn!("client profile has no auth token; requests will be unauthenticated");
        }
        Ok(self.client_builder().build()?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading / Saving
// ─────────────────────────────────────────────────────────────────────────────

/// Get the config directory for robocloud.
///
/// Checks `ROBOCLOUD_CONFIG_DIR` first, then falls back to the platform default.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the path to the profile file.
pub fn profile_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(PROFILE_FILE))
}

/// Load the profile from the default location, then apply environment overrides.
///
/// A missing file yields the default profile.
pub fn load_profile() -> Result<ClientProfile> {
    Ok(load_profile_from(profile_path().as_deref())?.with_process_env())
}

/// Load a profile from a specific path (no environment overrides).
pub fn load_profile_from(path: Option<&Path>) -> Result<ClientProfile> {
    let Some(path) = path else {
        return Ok(ClientProfile::default());
    };

    if !path.exists() {
        return Ok(ClientProfile::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;

    ClientProfile::from_yaml(&contents)
}

/// Save a profile to a specific path.
///
/// Creates parent directories if they don't exist.
pub fn save_profile_to(profile: &ClientProfile, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = profile.to_yaml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_parse_profile() {
        let profile = ClientProfile::from_yaml(
            r#"
environment: staging
auth-token: tok
organization-id: org-1
project-id: project-1
timeout: 10
"#,
        )
        .unwrap();

        assert_eq!(profile.environment, Environment::Staging);
        assert_eq!(profile.auth_token.as_deref(), Some("tok"));
        assert_eq!(profile.timeout, Some(10));
        assert_eq!(profile.api_url(), "https://api.staging.robocloud.io");
    }

    #[test]
    fn test_environment_names() {
        assert_eq!(Environment::from("PROD".to_string()), Environment::Production);
        assert_eq!(
            Environment::from("qa".to_string()),
            Environment::Named("qa".to_string())
        );
        assert_eq!(
            Environment::Named("qa".to_string()).api_host(),
            "https://api.qa.robocloud.io"
        );
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("ROBOCLOUD_AUTH_TOKEN", "env-token"),
            ("ROBOCLOUD_PROJECT", "project-env"),
            ("ROBOCLOUD_BASE_URL", "http://localhost:9000"),
            ("ROBOCLOUD_ORGANIZATION", ""),
        ]);
        let profile = ClientProfile {
            auth_token: Some("file-token".to_string()),
            organization_id: Some("org-file".to_string()),
            ..Default::default()
        }
        .with_env(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(profile.auth_token.as_deref(), Some("env-token"));
        assert_eq!(profile.project_id.as_deref(), Some("project-env"));
        // empty value does not override
        assert_eq!(profile.organization_id.as_deref(), Some("org-file"));
        assert_eq!(profile.api_url(), "http://localhost:9000");
    }

    #[test]
    fn test_build_client_from_profile() {
        let profile = ClientProfile {
            base_url: Some("http://localhost:9000".to_string()),
            auth_token: Some("tok".to_string()),
            organization_id: Some("org-1".to_string()),
            project_id: Some("project-1".to_string()),
            ..Default::default()
        };
        let client = profile.build_client().unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:9000/");
        assert_eq!(client.organization(), Some("org-1"));
        assert_eq!(client.project(), Some("project-1"));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("profile.yaml");
        let profile = ClientProfile {
            environment: Environment::Named("qa".to_string()),
            project_id: Some("project-1".to_string()),
            ..Default::default()
        };

        save_profile_to(&profile, &path).unwrap();
        let loaded = load_profile_from(Some(&path)).unwrap();
        assert_eq!(loaded, profile);
    }

    #[test]
    fn test_load_missing_profile_is_default() {
        let dir = TempDir::new().unwrap();
        let loaded = load_profile_from(Some(&dir.path().join("nope.yaml"))).unwrap();
        assert_eq!(loaded, ClientProfile::default());
        assert_eq!(load_profile_from(None).unwrap(), ClientProfile::default());
    }

    #[test]
    fn test_invalid_profile_yaml() {
        let err = ClientProfile::from_yaml("timeout: [not a number]").unwrap_err();
        assert!(matches!(err, ConfigError::ParseYaml(_)));
    }
}
