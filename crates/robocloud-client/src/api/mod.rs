//! API endpoint implementations.

mod config_trees;
mod resource;

pub use config_trees::ConfigTreesApi;
pub use resource::{ResourceApi, ResourceKind};
