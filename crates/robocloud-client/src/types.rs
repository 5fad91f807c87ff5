//! Request and response types for the RoboCloud v2 API.
//!
//! Every v2 resource shares the same envelope: `apiVersion`, `kind`,
//! `metadata`, `spec` and (for server-managed objects) `status`. Resource
//! specific schemas are left as JSON values; callers deserialize `spec` into
//! their own types when they need to.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// API version stamped on resources created through this client.
pub const API_VERSION: &str = "apiextensions.robocloud.io/v1";

// ─────────────────────────────────────────────────────────────────────────────
// Resource envelope
// ─────────────────────────────────────────────────────────────────────────────

/// Object metadata common to all resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name, unique within its scope.
    pub name: String,
    /// Server-assigned GUID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    /// Owning project GUID (absent for organization-scoped resources).
    #[serde(default, rename = "projectGUID", skip_serializing_if = "Option::is_none")]
    pub project_guid: Option<String>,
    /// Owning organization GUID.
    #[serde(default, rename = "organizationGUID", skip_serializing_if = "Option::is_none")]
    pub organization_guid: Option<String>,
    /// Free-form labels.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    /// Creation time (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update time (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// A platform resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Schema version of the envelope.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Resource kind (`Project`, `Deployment`, ...).
    pub kind: String,
    /// Object metadata.
    pub metadata: ObjectMeta,
    /// Desired state.
    #[serde(default)]
    pub spec: serde_json::Value,
    /// Observed state, filled in by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<serde_json::Value>,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

impl Resource {
    /// Create a resource envelope ready to be submitted.
    pub fn new(kind: impl Into<String>, name: impl Into<String>, spec: serde_json::Value) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: kind.into(),
            metadata: ObjectMeta {
                name: name.into(),
                ..Default::default()
            },
            spec,
            status: None,
        }
    }

    /// Add a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    /// Deserialize the spec into a concrete type.
    pub fn spec_as<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.spec.clone())
    }
}

/// Pagination metadata for list responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListMeta {
    /// Cursor for the next page; absent or zero on the last page.
    #[serde(default, rename = "continue", skip_serializing_if = "Option::is_none")]
    pub continue_token: Option<i64>,
}

impl ListMeta {
    /// Cursor to request the following page with, if there is one.
    pub fn next_page(&self) -> Option<i64> {
        self.continue_token.filter(|token| *token > 0)
    }
}

/// Response for list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceList {
    /// Pagination metadata.
    #[serde(default)]
    pub metadata: ListMeta,
    /// Items on this page.
    #[serde(default)]
    pub items: Vec<Resource>,
}

/// Query parameters for list endpoints.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListQuery {
    /// Page cursor returned by the previous call.
    #[serde(rename = "continue", skip_serializing_if = "Option::is_none")]
    pub continue_token: Option<i64>,
    /// Maximum number of items per page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Label selector (`key=value,key2=value2`).
    #[serde(rename = "labelSelector", skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<String>,
    /// Filter by exact name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Config trees
// ─────────────────────────────────────────────────────────────────────────────

/// Summary of a config tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigTreeInfo {
    /// Object metadata.
    pub metadata: ObjectMeta,
    /// Latest committed revision, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<ConfigTreeRevision>,
}

/// A committed revision of a config tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigTreeRevision {
    /// Revision identifier.
    pub revision_id: String,
    /// Commit message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Commit time (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committed_at: Option<String>,
}

/// Response for listing config trees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigTreeList {
    /// Pagination metadata.
    #[serde(default)]
    pub metadata: ListMeta,
    /// Trees on this page.
    #[serde(default)]
    pub items: Vec<ConfigTreeInfo>,
}

/// Request to create a config tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConfigTreeRequest {
    /// Object metadata; only `name` and `labels` are honored.
    pub metadata: ObjectMeta,
}

/// Query parameters for the config tree key listing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigTreeKeysQuery {
    /// Include base64-encoded values in the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_data: Option<bool>,
    /// Restrict to a content type (`kv`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_types: Option<String>,
    /// Restrict to keys under this prefix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_prefixes: Option<String>,
    /// Read a specific revision instead of the head.
    #[serde(rename = "rev", skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}
