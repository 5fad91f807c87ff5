//! Shapes a fetched tree into the values a settings type consumes.
//!
//! Two stages: strip the key prefix, then unflatten and either pass the whole
//! tree through or pick the declared top-level fields.

use serde_json::{Map, Value};

use crate::tree::ConfigTree;
use crate::Result;

/// How tree values map onto a settings type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionMode {
    /// Only these top-level keys are taken from the tree.
    Strict(Vec<String>),
    /// The full tree is handed over; unknown keys become extra fields.
    PassThrough,
}

/// Output of a projection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    /// The prefix-stripped, unflattened tree.
    pub tree: Map<String, Value>,
    /// Values contributed to the settings object.
    pub values: Map<String, Value>,
}

/// Prefix stripping plus projection.
#[derive(Debug, Clone)]
pub struct ConfigTreeProjector {
    key_prefix: String,
    mode: ProjectionMode,
}

impl ConfigTreeProjector {
    pub fn new(key_prefix: impl Into<String>, mode: ProjectionMode) -> Self {
        Self {
            key_prefix: key_prefix.into(),
            mode,
        }
    }

    pub fn mode(&self) -> &ProjectionMode {
        &self.mode
    }

    /// Strip the prefix and unflatten.
    pub fn prepare(&self, tree: ConfigTree) -> Result<Map<String, Value>> {
        tree.strip_prefix(&self.key_prefix)?.unflatten()
    }

    /// Pick the values the settings type receives from an unflattened tree.
    ///
    /// In strict mode a present field takes the tree's whole value, nested or
    /// not; absent fields are left out so defaults apply.
    pub fn select(&self, nested: &Map<String, Value>) -> Map<String, Value> {
        match &self.mode {
            ProjectionMode::PassThrough => nested.clone(),
            ProjectionMode::Strict(fields) => fields
                .iter()
                .filter_map(|field| nested.get(field).map(|v| (field.clone(), v.clone())))
                .collect(),
        }
    }

    /// Run both stages.
    pub fn project(&self, tree: ConfigTree) -> Result<Projection> {
        let nested = self.prepare(tree)?;
        let values = self.select(&nested);
        tracing::debug!(
            prefix = %self.key_prefix,
            top_level = nested.len(),
            projected = values.len(),
            "projected config tree"
        );
        Ok(Projection {
            tree: nested,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigError;
    use serde_json::json;

    fn tree(value: Value) -> ConfigTree {
        match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => unreachable!(),
        }
    }

    fn strict(fields: &[&str]) -> ProjectionMode {
        ProjectionMode::Strict(fields.iter().map(|f| f.to_string()).collect())
    }

    #[test]
    fn test_remote_scenario_with_prefix() {
        let projector = ConfigTreeProjector::new("default", ProjectionMode::PassThrough);
        let projection = projector
            .project(tree(json!({"default/apis": "services", "default/common": "shared"})))
            .unwrap();
        assert_eq!(
            Value::Object(projection.tree),
            json!({"apis": "services", "common": "shared"})
        );
    }

    #[test]
    fn test_pass_through_returns_whole_tree() {
        let projector = ConfigTreeProjector::new("", ProjectionMode::PassThrough);
        let projection = projector
            .project(tree(json!({"a/b": 1, "c": [1, 2], "d": "x"})))
            .unwrap();
        assert_eq!(projection.values, projection.tree);
        assert_eq!(
            Value::Object(projection.values),
            json!({"a": {"b": 1}, "c": [1, 2], "d": "x"})
        );
    }

    #[test]
    fn test_strict_takes_declared_top_level_only() {
        let projector = ConfigTreeProjector::new("", strict(&["a", "b"]));
        let projection = projector
            .project(tree(json!({"a": 5, "z/deep": true})))
            .unwrap();
        assert_eq!(Value::Object(projection.values), json!({"a": 5}));
        // the full tree is kept for dotted lookups
        assert_eq!(projection.tree["z"], json!({"deep": true}));
    }

    #[test]
    fn test_strict_nested_value_wins_whole() {
        let projector = ConfigTreeProjector::new("svc", strict(&["db"]));
        let projection = projector
            .project(tree(json!({"svc/db/host": "h", "svc/db/port": 5432})))
            .unwrap();
        assert_eq!(
            Value::Object(projection.values),
            json!({"db": {"host": "h", "port": 5432}})
        );
    }

    #[test]
    fn test_strict_does_not_follow_dotted_names() {
        let projector = ConfigTreeProjector::new("", strict(&["db.host"]));
        let projection = projector.project(tree(json!({"db/host": "h"}))).unwrap();
        assert!(projection.values.is_empty());
    }

    #[test]
    fn test_prefix_mismatch_propagates() {
        let projector = ConfigTreeProjector::new("default", ProjectionMode::PassThrough);
        let err = projector
            .project(tree(json!({"default/a": 1, "x": 2})))
            .unwrap_err();
        assert!(matches!(err, ConfigError::KeyPrefixMismatch { .. }));
    }
}
