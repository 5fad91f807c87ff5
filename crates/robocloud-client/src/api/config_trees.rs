//! Config trees API.

use crate::client::{path_segment, RoboCloudClient};
use crate::error::Result;
use crate::types::{
    ConfigTreeInfo, ConfigTreeKeysQuery, ConfigTreeList, CreateConfigTreeRequest, ListQuery,
    ObjectMeta,
};

/// Config trees API client.
pub struct ConfigTreesApi {
    client: RoboCloudClient,
}

impl ConfigTreesApi {
    pub(crate) fn new(client: RoboCloudClient) -> Self {
        Self { client }
    }

    /// List config trees.
    pub async fn list(&self) -> Result<ConfigTreeList> {
        self.client.get("config-trees/").await
    }

    /// List config trees with query parameters.
    pub async fn list_with_query(&self, query: &ListQuery) -> Result<ConfigTreeList> {
        self.client.get_with_query("config-trees/", query).await
    }

    /// Get a config tree by name.
    pub async fn get(&self, name: &str) -> Result<ConfigTreeInfo> {
        let path = format!("config-trees/{}/", path_segment(name)?);
        self.client.get(&path).await
    }

    /// Create an empty config tree.
    pub async fn create(&self, name: impl Into<String>) -> Result<ConfigTreeInfo> {
        let request = CreateConfigTreeRequest {
            metadata: ObjectMeta {
                name: name.into(),
                ..Default::default()
            },
        };
        self.client.post("config-trees/", &request).await
    }

    /// Delete a config tree.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let path = format!("config-trees/{}/", path_segment(name)?);
        self.client.delete(&path).await
    }

    /// List the keys of a tree.
    ///
    /// The envelope is returned untouched (`{"keys": {"<key>": {"data": "<base64>"}}}`
    /// when `include_data` is set); interpreting it is up to the caller.
    pub async fn keys(
        &self,
        name: &str,
        query: &ConfigTreeKeysQuery,
    ) -> Result<serde_json::Value> {
        let path = format!("config-trees/{}/keys", path_segment(name)?);
        self.client.get_with_query(&path, query).await
    }
}
