//! Config tree retrieval from the platform or from a local file.
//!
//! Both sources normalize into a flat [`ConfigTree`] whose keys still carry
//! the configured prefix; stripping happens in the projector.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use robocloud_client::{ConfigTreeKeysQuery, RoboCloudClient};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::literal::parse_literal;
use crate::tree::{unwrap_metadata, ConfigTree};
use crate::{ConfigError, Result};

/// Content type requested from the key listing.
const CONTENT_TYPE_KV: &str = "kv";

/// Where a settings object's config tree comes from.
///
/// When `local_file` is set the remote fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeSourceConfig {
    /// Name of the remote config tree.
    #[serde(default)]
    pub tree_name: String,
    /// Leading key segment scoping the tree to one consumer.
    #[serde(default)]
    pub key_prefix: String,
    /// Read the tree from this JSON/YAML file instead of the platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_file: Option<PathBuf>,
    /// Pin a remote revision instead of reading the head.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<String>,
}

impl TreeSourceConfig {
    /// Remote source for a named tree.
    pub fn remote(tree_name: impl Into<String>) -> Self {
        Self {
            tree_name: tree_name.into(),
            ..Default::default()
        }
    }

    /// Local file source.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            local_file: Some(path.into()),
            ..Default::default()
        }
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Pin a revision.
    pub fn with_revision(mut self, revision_id: impl Into<String>) -> Self {
        self.revision_id = Some(revision_id.into());
        self
    }

    /// Which fetch mode this configuration selects.
    pub fn source(&self) -> TreeSource {
        match &self.local_file {
            Some(path) => TreeSource::Local { path: path.clone() },
            None => TreeSource::Remote(KeysRequest {
                tree_name: self.tree_name.clone(),
                revision_id: self.revision_id.clone(),
                key_prefix: self.key_prefix.clone(),
            }),
        }
    }
}

/// The active fetch mode.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeSource {
    /// Key listing from the platform.
    Remote(KeysRequest),
    /// JSON or YAML file on disk.
    Local { path: PathBuf },
}

/// Parameters of a remote key listing.
#[derive(Debug, Clone, PartialEq)]
pub struct KeysRequest {
    pub tree_name: String,
    pub revision_id: Option<String>,
    pub key_prefix: String,
}

impl KeysRequest {
    /// Query sent to the key listing endpoint.
    pub fn query(&self) -> ConfigTreeKeysQuery {
        ConfigTreeKeysQuery {
            include_data: Some(true),
            content_types: Some(CONTENT_TYPE_KV.to_string()),
            key_prefixes: Some(self.key_prefix.clone()),
            revision: self.revision_id.clone(),
        }
    }

    fn describe(&self) -> String {
        match &self.revision_id {
            Some(rev) => format!("{}@{}", self.tree_name, rev),
            None => self.tree_name.clone(),
        }
    }
}

/// Capability to list a config tree's keys.
///
/// Implemented by [`RoboCloudClient`]; tests and alternative transports can
/// provide their own.
#[async_trait]
pub trait TreeTransport: Send + Sync {
    /// Return the raw `{"keys": {...}}` envelope.
    async fn list_keys(&self, request: &KeysRequest) -> robocloud_client::Result<Value>;
}

#[async_trait]
impl TreeTransport for RoboCloudClient {
    async fn list_keys(&self, request: &KeysRequest) -> robocloud_client::Result<Value> {
        self.config_trees()
            .keys(&request.tree_name, &request.query())
            .await
    }
}

/// Produces a flat [`ConfigTree`] from the configured source.
#[derive(Clone)]
pub struct ConfigTreeFetcher {
    source: TreeSource,
    transport: Option<Arc<dyn TreeTransport>>,
}

impl std::fmt::Debug for ConfigTreeFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigTreeFetcher")
            .field("source", &self.source)
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

impl ConfigTreeFetcher {
    /// Fetcher for the given source configuration.
    pub fn new(config: &TreeSourceConfig) -> Self {
        Self {
            source: config.source(),
            transport: None,
        }
    }

    /// Use this transport for remote fetches.
    pub fn with_transport(mut self, transport: Arc<dyn TreeTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// The selected fetch mode.
    pub fn source(&self) -> &TreeSource {
        &self.source
    }

    /// Fetch the tree. Performs exactly one network call or one file read.
    pub async fn fetch(&self) -> Result<ConfigTree> {
        match &self.source {
            TreeSource::Local { path } => load_local(path),
            TreeSource::Remote(request) => {
                let transport = self.transport.as_ref().ok_or_else(|| {
                    ConfigError::Other(format!(
                        "config tree '{}' is remote but no client was configured",
                        request.tree_name
                    ))
                })?;
                fetch_remote(transport.as_ref(), request).await
            }
        }
    }
}

/// Fetch and decode a remote tree.
pub async fn fetch_remote(
    transport: &dyn TreeTransport,
    request: &KeysRequest,
) -> Result<ConfigTree> {
    tracing::debug!(
        tree = %request.tree_name,
        revision = ?request.revision_id,
        prefix = %request.key_prefix,
        "fetching config tree"
    );

    let body = transport.list_keys(request).await.map_err(|e| {
        if e.is_not_found() {
            ConfigError::SourceNotFound {
                source_name: request.describe(),
            }
        } else {
            ConfigError::Transport(e)
        }
    })?;

    let tree = decode_remote_keys(&request.tree_name, body)?;
    tracing::info!(tree = %request.tree_name, keys = tree.len(), "fetched config tree");
    Ok(tree)
}

/// Decode a key-listing envelope into a flat tree.
///
/// A missing `keys` field is an error; entries without `data` are skipped.
pub fn decode_remote_keys(tree_name: &str, body: Value) -> Result<ConfigTree> {
    let keys = match body {
        Value::Object(mut map) => map.remove("keys"),
        _ => None,
    };
    let keys = match keys {
        Some(Value::Object(keys)) => keys,
        _ => {
            return Err(ConfigError::MissingData {
                tree_name: tree_name.to_string(),
            });
        }
    };

    let mut tree = ConfigTree::new();
    for (key, entry) in keys {
        match entry.get("data") {
            None | Some(Value::Null) => {
                tracing::debug!(%key, "skipping config key without data");
            }
            Some(Value::String(data)) => {
                tree.insert(key, decode_value(data));
            }
            // Already structured; nothing to decode
            Some(other) => {
                tree.insert(key, other.clone());
            }
        }
    }
    Ok(tree)
}

/// Decode one remote value: base64, then UTF-8, then literal parse.
///
/// Every failure keeps the most decoded string available; decoding never fails.
pub fn decode_value(data: &str) -> Value {
    let bytes = match STANDARD.decode(data) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "value is not base64, keeping raw string");
            return Value::String(data.to_string());
        }
    };
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(_) => {
            tracing::debug!("decoded value is not UTF-8, keeping raw string");
            return Value::String(data.to_string());
        }
    };
    match parse_literal(&text) {
        Ok(value) => value,
        Err(_) => Value::String(text),
    }
}

/// Supported local file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
}

impl FileFormat {
    /// Pick the format from a path's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => Ok(FileFormat::Json),
            Some("yaml") | Some("yml") => Ok(FileFormat::Yaml),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }
}

/// Load a tree from a JSON or YAML file.
///
/// Metadata envelopes are unwrapped before the document is flattened.
pub fn load_local(path: &Path) -> Result<ConfigTree> {
    let format = FileFormat::from_path(path)?;
    let contents = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::SourceNotFound {
                source_name: path.display().to_string(),
            }
        } else {
            ConfigError::ReadFile {
                path: path.display().to_string(),
                source: e,
            }
        }
    })?;

    let document: Value = match format {
        FileFormat::Json => serde_json::from_str(&contents)?,
        FileFormat::Yaml => {
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseYaml(e.to_string()))?
        }
    };

    let tree = match unwrap_metadata(document) {
        Value::Object(map) => ConfigTree::flatten(&map),
        Value::Null => ConfigTree::new(),
        _ => {
            return Err(ConfigError::Other(format!(
                "config file '{}' must contain a mapping at the top level",
                path.display()
            )));
        }
    };
    tracing::info!(path = %path.display(), ?format, keys = tree.len(), "loaded local config tree");
    Ok(tree)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
