//! HTTP client SDK for the RoboCloud robotics platform.
//!
//! This crate provides a typed client for the platform's v2 REST API.
//!
//! # Example
//!
//! ```no_run
//! use robocloud_client::{Resource, RoboCloudClient, Result};
//!
//! # async fn example() -> Result<()> {
//! let client = RoboCloudClient::builder()
//!     .base_url("https://api.robocloud.io")
//!     .auth_token("secret")
//!     .organization("org-abc")
//!     .project("project-xyz")
//!     .build()?;
//!
//! // Walk every page of deployments
//! for deployment in client.deployments().list_all().await? {
//!     println!("{}", deployment.metadata.name);
//! }
//!
//! // Create a secret
//! let secret = Resource::new(
//!     "Secret",
//!     "registry",
//!     serde_json::json!({"type": "docker", "docker": {"registry": "ghcr.io"}}),
//! );
//! client.secrets().create(&secret).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # API Coverage
//!
//! - **Projects**, **Deployments**, **Packages**, **Disks**, **Secrets**,
//!   **Networks**, **Users**: list (paged or exhaustive), get, create, update, delete
//! - **Config trees**: list, get, create, delete, and raw key listing

pub mod api;
pub mod client;
pub mod error;
pub mod types;

pub use api::{ConfigTreesApi, ResourceApi, ResourceKind};
pub use client::{ClientBuilder, RoboCloudClient};
pub use error::{Error, Result};
pub use types::*;
