//! Config trees and layered settings for RoboCloud clients.
//!
//! Provides:
//! - Config tree retrieval from the platform (base64 + literal-decoded keys)
//!   or from a local JSON/YAML file with `value`/`metadata` envelopes
//! - Prefix stripping, unflattening and projection onto a settings type
//! - Layered settings resolution (init args → env → `.env` → config tree → defaults)
//! - Client profiles (environment, token, organization, project)
//!
//! ```no_run
//! use robocloud_config::{Settings, SettingsSchema, TreeSourceConfig};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! #[serde(default)]
//! struct NavSettings {
//!     map_name: String,
//!     max_speed: f64,
//! }
//!
//! impl SettingsSchema for NavSettings {}
//!
//! # async fn example() -> robocloud_config::Result<()> {
//! let client = robocloud_config::load_profile()?.build_client()?;
//! let settings = Settings::<NavSettings>::builder()
//!     .env_prefix("NAV_")
//!     .env_file(".env")
//!     .config_tree(TreeSourceConfig::remote("warehouse").with_key_prefix("nav"))
//!     .client(client)
//!     .build()
//!     .await?;
//!
//! println!("{} at {} m/s", settings.map_name, settings.max_speed);
//! println!("{:?}", settings.get("limits.turn_rate"));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fetcher;
pub mod literal;
pub mod profile;
pub mod projector;
pub mod settings;
pub mod tree;

pub use error::{ConfigError, Result};
pub use fetcher::{
    decode_remote_keys, decode_value, fetch_remote, load_local, ConfigTreeFetcher, FileFormat,
    KeysRequest, TreeSource, TreeSourceConfig, TreeTransport,
};
pub use literal::{parse_literal, LiteralError};
pub use profile::{
    config_dir, load_profile, load_profile_from, profile_path, save_profile_to, ClientProfile,
    Environment,
};
pub use projector::{ConfigTreeProjector, Projection, ProjectionMode};
pub use settings::{ExtraFields, Settings, SettingsBuilder, SettingsSchema, SettingsSource};
pub use tree::{lookup_dotted, unwrap_metadata, ConfigTree};
