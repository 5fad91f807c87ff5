//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while fetching a config tree or resolving settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The local file, remote tree, or remote revision does not exist.
    #[error("config source '{source_name}' not found")]
    SourceNotFound { source_name: String },

    /// Local file extension is not one of `.json`, `.yaml`, `.yml`.
    #[error("unsupported config file format '{path}' (expected .json, .yaml or .yml)")]
    UnsupportedFormat { path: String },

    /// Remote response has no `keys` envelope.
    #[error("response for config tree '{tree_name}' has no 'keys' field")]
    MissingData { tree_name: String },

    /// A key does not start with the configured prefix and separator.
    #[error("key '{key}' does not start with prefix '{prefix}/'")]
    KeyPrefixMismatch { key: String, prefix: String },

    /// Two keys collide when unflattened (`a` and `a/b`).
    #[error("key '{key}' collides with another key in the tree")]
    KeyCollision { key: String },

    /// A key is empty or contains an empty path segment.
    #[error("invalid config key '{key}'")]
    InvalidKey { key: String },

    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to write a config file.
    #[error("failed to write config file '{path}': {source}")]
    WriteFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse JSON.
    #[error("failed to parse JSON config: {0}")]
    ParseJson(#[from] serde_json::Error),

    /// Failed to parse YAML.
    #[error("failed to parse YAML config: {0}")]
    ParseYaml(String),

    /// Failed to read a `.env` file.
    #[error("failed to read dotenv file '{path}': {message}")]
    DotEnv { path: String, message: String },

    /// The overlaid values do not fit the settings type.
    #[error("invalid settings: {0}")]
    Settings(String),

    /// Transport failure from the platform client, passed through unchanged.
    #[error(transparent)]
    Transport(#[from] robocloud_client::Error),

    /// Blocking construction could not get a runtime.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}
