//! Layered settings: init args, environment, `.env`, config tree, defaults.
//!
//! Resolution order for each declared field (first non-null value wins):
//! 1. Values passed to the builder
//! 2. Process environment (`{env_prefix}{field}`)
//! 3. `.env` file entries (same naming)
//! 4. The projected config tree
//! 5. The field's default
//!
//! The config tree is fetched once, inside [`SettingsBuilder::build`], and the
//! resulting [`Settings`] value is immutable.

use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use robocloud_client::RoboCloudClient;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::fetcher::{ConfigTreeFetcher, TreeSourceConfig, TreeTransport};
use crate::projector::{ConfigTreeProjector, Projection, ProjectionMode};
use crate::tree::lookup_dotted;
use crate::{ConfigError, Result};

/// What happens to tree keys that are not declared fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraFields {
    /// Only declared fields are read from the tree.
    Ignore,
    /// The whole tree is handed to the settings type.
    Allow,
}

/// A type that can be populated by [`SettingsBuilder`].
///
/// Declared fields and their defaults are whatever `Self::default()`
/// serializes to, so the type must serialize to a JSON object. Types using
/// [`ExtraFields::Allow`] usually carry a `#[serde(flatten)]` map to receive
/// the undeclared keys.
pub trait SettingsSchema: Serialize + DeserializeOwned + Default {
    /// Extra-field policy.
    const EXTRA: ExtraFields = ExtraFields::Ignore;
}

/// Where a field's value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsSource {
    /// Passed to the builder.
    InitArgs,
    /// Process environment variable.
    Environment(String),
    /// Entry in a `.env` file.
    DotEnv(String),
    /// The config tree.
    ConfigTree,
    /// Declared default.
    Default,
}

impl std::fmt::Display for SettingsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsSource::InitArgs => write!(f, "init args"),
            SettingsSource::Environment(var) => write!(f, "env var {}", var),
            SettingsSource::DotEnv(var) => write!(f, "dotenv {}", var),
            SettingsSource::ConfigTree => write!(f, "config tree"),
            SettingsSource::Default => write!(f, "default"),
        }
    }
}

/// Resolved settings plus the tree they were built from.
#[derive(Debug, Clone)]
pub struct Settings<T> {
    value: T,
    tree: Map<String, Value>,
    sources: BTreeMap<String, SettingsSource>,
}

impl<T: SettingsSchema> Settings<T> {
    /// Start building settings of this type.
    pub fn builder() -> SettingsBuilder<T> {
        SettingsBuilder::new()
    }
}

impl<T> Settings<T> {
    /// Look a value up in the config tree by dotted path (`"a.b.c"`).
    ///
    /// Reads only the tree; values from other sources are not visible here.
    pub fn get(&self, dotted_key: &str) -> Option<&Value> {
        lookup_dotted(&self.tree, dotted_key)
    }

    /// The prefix-stripped, unflattened config tree.
    pub fn tree(&self) -> &Map<String, Value> {
        &self.tree
    }

    /// Which source supplied a field.
    pub fn source_of(&self, field: &str) -> Option<&SettingsSource> {
        self.sources.get(field)
    }

    /// Provenance of every resolved field.
    pub fn sources(&self) -> &BTreeMap<String, SettingsSource> {
        &self.sources
    }

    /// The typed settings value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Take the typed settings value.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for Settings<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// Collects sources and builds a [`Settings`] value in one step.
pub struct SettingsBuilder<T> {
    init: Map<String, Value>,
    env_prefix: String,
    case_sensitive: bool,
    env_file: Option<PathBuf>,
    env_vars: Option<Vec<(String, String)>>,
    tree: Option<TreeSourceConfig>,
    transport: Option<Arc<dyn TreeTransport>>,
    _schema: PhantomData<fn() -> T>,
}

impl<T: SettingsSchema> Default for SettingsBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SettingsSchema> SettingsBuilder<T> {
    pub fn new() -> Self {
        Self {
            init: Map::new(),
            env_prefix: String::new(),
            case_sensitive: false,
            env_file: None,
            env_vars: None,
            tree: None,
            transport: None,
            _schema: PhantomData,
        }
    }

    /// Set a field explicitly. Takes precedence over every other source.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.init.insert(field.into(), value.into());
        self
    }

    /// Set several fields explicitly.
    pub fn init_args(mut self, args: Map<String, Value>) -> Self {
        self.init.extend(args);
        self
    }

    /// Prefix for environment and `.env` variable names.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Match variable names exactly instead of ignoring ASCII case.
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Read a `.env` file. A missing file is skipped.
    pub fn env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// Use these variables instead of the process environment.
    pub fn env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Overlay a config tree.
    pub fn config_tree(mut self, source: TreeSourceConfig) -> Self {
        self.tree = Some(source);
        self
    }

    /// Platform client used for remote trees.
    pub fn client(self, client: RoboCloudClient) -> Self {
        self.transport(Arc::new(client))
    }

    /// Custom transport used for remote trees.
    pub fn transport(mut self, transport: Arc<dyn TreeTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Fetch the tree (if configured) and resolve every field.
    ///
    /// Any fetch or validation failure aborts construction.
    pub async fn build(self) -> Result<Settings<T>> {
        let defaults = declared_defaults::<T>()?;
        let mode = match T::EXTRA {
            ExtraFields::Ignore => ProjectionMode::Strict(defaults.keys().cloned().collect()),
            ExtraFields::Allow => ProjectionMode::PassThrough,
        };

        let projection = match &self.tree {
            Some(source) => {
                let mut fetcher = ConfigTreeFetcher::new(source);
                if let Some(transport) = &self.transport {
                    fetcher = fetcher.with_transport(Arc::clone(transport));
                }
                let tree = fetcher.fetch().await?;
                ConfigTreeProjector::new(source.key_prefix.clone(), mode.clone()).project(tree)?
            }
            None => Projection::default(),
        };

        let env = VarTable::new(
            self.env_vars.clone().unwrap_or_else(process_env),
            self.case_sensitive,
        );
        let dotenv = match &self.env_file {
            Some(path) => VarTable::new(read_dotenv(path)?, self.case_sensitive),
            None => VarTable::empty(),
        };

        let mut merged = Map::new();
        let mut sources = BTreeMap::new();

        for (field, default) in &defaults {
            let var = format!("{}{}", self.env_prefix, field);
            let (value, source) = if let Some(v) = non_null(self.init.get(field)) {
                (v.clone(), SettingsSource::InitArgs)
            } else if let Some(raw) = env.get(&var) {
                (coerce(raw, default), SettingsSource::Environment(var))
            } else if let Some(raw) = dotenv.get(&var) {
                (coerce(raw, default), SettingsSource::DotEnv(var))
            } else if let Some(v) = non_null(projection.values.get(field)) {
                (v.clone(), SettingsSource::ConfigTree)
            } else {
                (default.clone(), SettingsSource::Default)
            };
            merged.insert(field.clone(), value);
            sources.insert(field.clone(), source);
        }

        if mode == ProjectionMode::PassThrough {
            for (key, value) in &projection.values {
                if !defaults.contains_key(key) {
                    merged.insert(key.clone(), value.clone());
                    sources.insert(key.clone(), SettingsSource::ConfigTree);
                }
            }
            for (key, value) in &self.init {
                if !defaults.contains_key(key) && !value.is_null() {
                    merged.insert(key.clone(), value.clone());
                    sources.insert(key.clone(), SettingsSource::InitArgs);
                }
            }
        }

        for (field, source) in &sources {
            tracing::debug!(%field, %source, "resolved setting");
        }

        let value: T = serde_json::from_value(Value::Object(merged))
            .map_err(|e| ConfigError::Settings(e.to_string()))?;

        Ok(Settings {
            value,
            tree: projection.tree,
            sources,
        })
    }

    /// [`build`](Self::build) for synchronous callers.
    ///
    /// Runs the fetch on a private current-thread runtime. Must not be called
    /// from inside an async runtime.
    pub fn build_blocking(self) -> Result<Settings<T>> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(ConfigError::Runtime(
                "build_blocking called inside an async runtime; use build().await".to_string(),
            ));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ConfigError::Runtime(e.to_string()))?;
        runtime.block_on(self.build())
    }
}

/// Declared fields and their defaults.
fn declared_defaults<T: SettingsSchema>() -> Result<Map<String, Value>> {
    match serde_json::to_value(T::default()) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ConfigError::Settings(
            "settings type must serialize to an object".to_string(),
        )),
        Err(e) => Err(ConfigError::Settings(e.to_string())),
    }
}

/// Process environment, skipping variables that are not valid UTF-8.
fn process_env() -> Vec<(String, String)> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Turn a variable's text into a value shaped like the field's default.
///
/// String fields keep the text; anything else is parsed as JSON first.
fn coerce(raw: &str, default: &Value) -> Value {
    match default {
        Value::String(_) => Value::String(raw.to_string()),
        _ => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

fn read_dotenv(path: &Path) -> Result<Vec<(String, String)>> {
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "no dotenv file");
        return Ok(Vec::new());
    }
    let dotenv_error = |e: dotenvy::Error| ConfigError::DotEnv {
        path: path.display().to_string(),
        message: e.to_string(),
    };
    dotenvy::from_path_iter(path)
        .map_err(dotenv_error)?
        .map(|item| item.map_err(dotenv_error))
        .collect()
}

/// Variable lookup with optional ASCII case folding. Empty values count as unset.
struct VarTable {
    vars: HashMap<String, String>,
    case_sensitive: bool,
}

impl VarTable {
    fn new(vars: Vec<(String, String)>, case_sensitive: bool) -> Self {
        let vars = vars
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (Self::fold(&k, case_sensitive), v))
            .collect();
        Self {
            vars,
            case_sensitive,
        }
    }

    fn empty() -> Self {
        Self {
            vars: HashMap::new(),
            case_sensitive: true,
        }
    }

    fn fold(name: &str, case_sensitive: bool) -> String {
        if case_sensitive {
            name.to_string()
        } else {
            name.to_ascii_uppercase()
        }
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(&Self::fold(name, self.case_sensitive))
            .map(String::as_str)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::Deserialize;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    use crate::fetcher::KeysRequest;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Database {
        host: String,
        port: u16,
    }

    impl Default for Database {
        fn default() -> Self {
            Self {
                host: "localhost".to_string(),
                port: 5432,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct AppSettings {
        name: String,
        replicas: u32,
        tags: Vec<String>,
        database: Database,
    }

    impl Default for AppSettings {
        fn default() -> Self {
            Self {
                name: "app".to_string(),
                replicas: 1,
                tags: Vec::new(),
                database: Database::default(),
            }
        }
    }

    impl SettingsSchema for AppSettings {}

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct OpenSettings {
        name: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    }

    impl SettingsSchema for OpenSettings {
        const EXTRA: ExtraFields = ExtraFields::Allow;
    }

    struct StaticTransport(Value);

    #[async_trait]
    impl TreeTransport for StaticTransport {
        async fn list_keys(&self, _request: &KeysRequest) -> robocloud_client::Result<Value> {
            Ok(self.0.clone())
        }
    }

    fn write_tree(dir: &TempDir, contents: Value) -> PathBuf {
        let path = dir.path().join("tree.json");
        fs::write(&path, contents.to_string()).unwrap();
        path
    }

    fn no_env() -> Vec<(String, String)> {
        Vec::new()
    }

    #[tokio::test]
    async fn test_defaults_only() {
        let settings = Settings::<AppSettings>::builder()
            .env_vars(no_env())
            .build()
            .await
            .unwrap();
        assert_eq!(*settings.value(), AppSettings::default());
        assert_eq!(settings.source_of("replicas"), Some(&SettingsSource::Default));
        assert!(settings.tree().is_empty());
    }

    #[tokio::test]
    async fn test_absent_fields_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_tree(&dir, json!({"replicas": 5}));
        let settings = Settings::<AppSettings>::builder()
            .env_vars(no_env())
            .config_tree(TreeSourceConfig::local(path))
            .build()
            .await
            .unwrap();

        assert_eq!(settings.replicas, 5);
        assert_eq!(settings.name, "app");
        assert_eq!(settings.source_of("replicas"), Some(&SettingsSource::ConfigTree));
        assert_eq!(settings.source_of("name"), Some(&SettingsSource::Default));
    }

    #[tokio::test]
    async fn test_precedence_order() {
        let dir = TempDir::new().unwrap();
        let tree = write_tree(&dir, json!({"name": "from-tree"}));
        let dotenv = dir.path().join(".env");
        fs::write(&dotenv, "APP_NAME=from-dotenv\n").unwrap();

        let base = || {
            Settings::<AppSettings>::builder()
                .env_prefix("APP_")
                .env_file(&dotenv)
                .config_tree(TreeSourceConfig::local(&tree))
        };

        let s = base()
            .env_vars([("APP_NAME", "from-env")])
            .set("name", "from-init")
            .build()
            .await
            .unwrap();
        assert_eq!(s.name, "from-init");
        assert_eq!(s.source_of("name"), Some(&SettingsSource::InitArgs));

        let s = base()
            .env_vars([("APP_NAME", "from-env")])
            .build()
            .await
            .unwrap();
        assert_eq!(s.name, "from-env");
        assert_eq!(
            s.source_of("name"),
            Some(&SettingsSource::Environment("APP_name".to_string()))
        );

        let s = base().env_vars(no_env()).build().await.unwrap();
        assert_eq!(s.name, "from-dotenv");

        fs::remove_file(&dotenv).unwrap();
        let s = base().env_vars(no_env()).build().await.unwrap();
        assert_eq!(s.name, "from-tree");
    }

    #[tokio::test]
    async fn test_null_values_fall_through() {
        let dir = TempDir::new().unwrap();
        let path = write_tree(&dir, json!({"name": null, "replicas": 2}));
        let settings = Settings::<AppSettings>::builder()
            .env_vars(no_env())
            .set("replicas", Value::Null)
            .config_tree(TreeSourceConfig::local(path))
            .build()
            .await
            .unwrap();
        assert_eq!(settings.name, "app");
        assert_eq!(settings.replicas, 2);
    }

    #[tokio::test]
    async fn test_env_values_are_coerced() {
        let settings = Settings::<AppSettings>::builder()
            .env_vars([
                ("replicas", "3"),
                ("TAGS", r#"["edge", "gpu"]"#),
                ("Database", r#"{"host": "db.lab", "port": 6000}"#),
                ("NAME", "42"),
            ])
            .build()
            .await
            .unwrap();
        assert_eq!(settings.replicas, 3);
        assert_eq!(settings.tags, vec!["edge", "gpu"]);
        assert_eq!(settings.database.host, "db.lab");
        assert_eq!(settings.name, "42");
    }

    #[tokio::test]
    async fn test_case_sensitive_env() {
        let settings = Settings::<AppSettings>::builder()
            .case_sensitive(true)
            .env_vars([("NAME", "upper"), ("replicas", "4")])
            .build()
            .await
            .unwrap();
        assert_eq!(settings.name, "app");
        assert_eq!(settings.replicas, 4);
    }

    #[tokio::test]
    async fn test_empty_env_value_is_unset() {
        let settings = Settings::<AppSettings>::builder()
            .env_vars([("NAME", "")])
            .build()
            .await
            .unwrap();
        assert_eq!(settings.name, "app");
    }

    #[tokio::test]
    async fn test_nested_tree_value_replaces_default_whole() {
        let dir = TempDir::new().unwrap();
        let path = write_tree(&dir, json!({"svc": {"database": {"host": "db.prod"}}}));
        let settings = Settings::<AppSettings>::builder()
            .env_vars(no_env())
            .config_tree(TreeSourceConfig::local(path).with_key_prefix("svc"))
            .build()
            .await
            .unwrap();
        assert_eq!(settings.database.host, "db.prod");
        // port comes from Database's own serde default, not a merge with the settings default
        assert_eq!(settings.database.port, 5432);
        assert_eq!(settings.get("database.host"), Some(&json!("db.prod")));
    }

    #[tokio::test]
    async fn test_pass_through_absorbs_extra_keys() {
        let body = json!({
            "keys": {
                "default/apis": {"data": STANDARD.encode("services")},
                "default/common": {"data": STANDARD.encode("'shared'")},
                "default/name": {"data": STANDARD.encode("'robot'")}
            }
        });
        let settings = Settings::<OpenSettings>::builder()
            .env_vars(no_env())
            .config_tree(TreeSourceConfig::remote("site").with_key_prefix("default"))
            .transport(Arc::new(StaticTransport(body)))
            .set("debug", true)
            .build()
            .await
            .unwrap();

        assert_eq!(settings.name, "robot");
        assert_eq!(settings.extra["apis"], json!("services"));
        assert_eq!(settings.extra["common"], json!("shared"));
        assert_eq!(settings.extra["debug"], json!(true));
        assert_eq!(
            Value::Object(settings.tree().clone()),
            json!({"apis": "services", "common": "shared", "name": "robot"})
        );
    }

    #[tokio::test]
    async fn test_strict_ignores_extra_keys() {
        let dir = TempDir::new().unwrap();
        let path = write_tree(&dir, json!({"unknown": 1, "name": "n"}));
        let settings = Settings::<AppSettings>::builder()
            .env_vars(no_env())
            .config_tree(TreeSourceConfig::local(path))
            .build()
            .await
            .unwrap();
        assert_eq!(settings.name, "n");
        assert!(settings.source_of("unknown").is_none());
        // still reachable through the tree
        assert_eq!(settings.get("unknown"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_get_reads_tree_not_overlay() {
        let dir = TempDir::new().unwrap();
        let path = write_tree(&dir, json!({"a": {"b": {"c": 42}}, "name": "tree"}));
        let settings = Settings::<AppSettings>::builder()
            .env_vars(no_env())
            .set("name", "init")
            .config_tree(TreeSourceConfig::local(path))
            .build()
            .await
            .unwrap();
        assert_eq!(settings.get("a.b.c"), Some(&json!(42)));
        assert_eq!(settings.get("a.x.c"), None);
        assert_eq!(settings.get("name"), Some(&json!("tree")));
        assert_eq!(settings.name, "init");
    }

    #[tokio::test]
    async fn test_missing_keys_aborts_construction() {
        let result = Settings::<AppSettings>::builder()
            .env_vars(no_env())
            .config_tree(TreeSourceConfig::remote("site"))
            .transport(Arc::new(StaticTransport(json!({"items": []}))))
            .build()
            .await;
        assert!(matches!(result, Err(ConfigError::MissingData { .. })));
    }

    #[tokio::test]
    async fn test_type_mismatch_is_settings_error() {
        let result = Settings::<AppSettings>::builder()
            .env_vars([("REPLICAS", "many")])
            .build()
            .await;
        assert!(matches!(result, Err(ConfigError::Settings(_))));
    }

    #[tokio::test]
    async fn test_build_blocking_inside_runtime_fails() {
        let result = Settings::<AppSettings>::builder()
            .env_vars(no_env())
            .build_blocking();
        assert!(matches!(result, Err(ConfigError::Runtime(_))));
    }

    #[test]
    fn test_build_blocking_local_tree() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tree.yaml");
        fs::write(&path, "tags:\n  value: [a, b]\n  metadata: {rev: 3}\n").unwrap();

        let settings = Settings::<AppSettings>::builder()
            .env_vars(no_env())
            .config_tree(TreeSourceConfig::local(path))
            .build_blocking()
            .unwrap();
        assert_eq!(settings.tags, vec!["a", "b"]);
    }

    #[test]
    fn test_dotenv_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "NOT A VALID LINE\n").unwrap();
        let result = Settings::<AppSettings>::builder()
            .env_vars(no_env())
            .env_file(&path)
            .build_blocking();
        assert!(matches!(result, Err(ConfigError::DotEnv { .. })));
    }
}
