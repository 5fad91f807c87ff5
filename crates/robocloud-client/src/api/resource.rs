//! Generic resource API shared by projects, deployments, packages and friends.

use crate::client::{path_segment, RoboCloudClient};
use crate::error::Result;
use crate::types::{ListQuery, Resource, ResourceList};

/// Resource collections exposed by the v2 API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Project,
    Deployment,
    Package,
    Disk,
    Secret,
    Network,
    User,
}

impl ResourceKind {
    /// Collection path segment.
    pub fn path(&self) -> &'static str {
        match self {
            ResourceKind::Project => "projects",
            ResourceKind::Deployment => "deployments",
            ResourceKind::Package => "packages",
            ResourceKind::Disk => "disks",
            ResourceKind::Secret => "secrets",
            ResourceKind::Network => "networks",
            ResourceKind::User => "users",
        }
    }

    /// The `kind` field carried by resources of this collection.
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceKind::Project => "Project",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::Package => "Package",
            ResourceKind::Disk => "Disk",
            ResourceKind::Secret => "Secret",
            ResourceKind::Network => "Network",
            ResourceKind::User => "User",
        }
    }
}

/// Resource API client.
pub struct ResourceApi {
    client: RoboCloudClient,
    kind: ResourceKind,
}

impl ResourceApi {
    pub(crate) fn new(client: RoboCloudClient, kind: ResourceKind) -> Self {
        Self { client, kind }
    }

    /// Which collection this API talks to.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn item_path(&self, name: &str) -> Result<String> {
        Ok(format!("{}/{}/", self.kind.path(), path_segment(name)?))
    }

    /// List the first page.
    pub async fn list(&self) -> Result<ResourceList> {
        self.client.get(&format!("{}/", self.kind.path())).await
    }

    /// List with query parameters.
    pub async fn list_with_query(&self, query: &ListQuery) -> Result<ResourceList> {
        self.client
            .get_with_query(&format!("{}/", self.kind.path()), query)
            .await
    }

    /// List every item, following the `continue` cursor until it runs out.
    pub async fn list_all(&self) -> Result<Vec<Resource>> {
        self.list_all_with_query(ListQuery::default()).await
    }

    /// Like [`list_all`](Self::list_all) but with filters applied to every page.
    pub async fn list_all_with_query(&self, mut query: ListQuery) -> Result<Vec<Resource>> {
        let mut items = Vec::new();
        loop {
            let page = self.list_with_query(&query).await?;
            items.extend(page.items);
            match page.metadata.next_page() {
                // A cursor that doesn't move would loop forever
                Some(next) if Some(next) != query.continue_token => {
                    query.continue_token = Some(next);
                }
                _ => break,
            }
        }
        tracing::debug!(kind = self.kind.kind(), count = items.len(), "listed resources");
        Ok(items)
    }

    /// Get a resource by name.
    pub async fn get(&self, name: &str) -> Result<Resource> {
        self.client.get(&self.item_path(name)?).await
    }

    /// Create a resource.
    pub async fn create(&self, resource: &Resource) -> Result<Resource> {
        self.client
            .post(&format!("{}/", self.kind.path()), resource)
            .await
    }

    /// Replace a resource.
    pub async fn update(&self, name: &str, resource: &Resource) -> Result<Resource> {
        self.client.put(&self.item_path(name)?, resource).await
    }

    /// Delete a resource.
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.client.delete(&self.item_path(name)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_and_kinds() {
        assert_eq!(ResourceKind::Deployment.path(), "deployments");
        assert_eq!(ResourceKind::Network.kind(), "Network");
    }
}
