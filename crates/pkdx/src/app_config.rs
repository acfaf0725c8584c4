//! 🔧 App Configuration: the sacred TOML-to-struct pipeline, now with pokemon.
//!
//! 📡 "Config not found: We looked everywhere. In the tall grass. Behind the PC.
//! In Bill's storage system. Nothing." (every trainer at 3am) 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.

use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
// 🚀 tracing::info: because println! in production is a cry for help.
use tracing::info;

/// 📦 The AppConfig: where the dex lives and how hard the pipeline is allowed to push.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 📂 The backing store. One CSV, one header, many pokemon.
    pub store: StoreConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// 📂 Where the CSV lives.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(alias = "path")]
    pub file_name: PathBuf,
}

/// 🎛️ Pipeline knobs. Every one of them has a default, so `[runtime]` is optional.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// 📬 Capacity of the distribution channel between the source and the workers.
    #[serde(default = "default_queue_capacity", alias = "channel_size")]
    pub queue_capacity: usize,
    /// 📥 Upper bound on the result channel. Requests bigger than this still work, the
    /// workers just wait for the sink instead of the buffer holding everything at once.
    #[serde(default = "default_result_buffer_cap")]
    pub result_buffer_cap: usize,
    /// 📊 Draw an indicatif bar while the file source scans. Off by default, tests hate bars.
    #[serde(default)]
    pub show_progress: bool,
}

// 📬 10 slots. Enough to keep workers fed, small enough that an early exit doesn't strand much.
fn default_queue_capacity() -> usize {
    10
}

// 📥 bounded channels allocate every slot eagerly. 1024 pokemon is plenty of slack.
fn default_result_buffer_cap() -> usize {
    1024
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            result_buffer_cap: default_result_buffer_cap(),
            show_progress: false,
        }
    }
}

impl AppConfig {
    /// 🧪 Build a config in code. Handy for tests and for callers who don't do TOML.
    pub fn for_store(file_name: impl Into<PathBuf>) -> Self {
        Self {
            store: StoreConfig {
                file_name: file_name.into(),
            },
            runtime: RuntimeConfig::default(),
        }
    }
}

/// 🚀 Load the config from env vars (PKDX_*) and an optional TOML file.
///
/// 📐 DESIGN NOTE:
///   - `None` → env vars only. `PKDX_STORE__FILE_NAME=...` style nesting works.
///   - `Some(path)` → env vars + TOML file, merged. TOML wins on conflicts.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("PKDX_").split("__"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (PKDX_*). \
             Check that [store] has a file_name. The dex can't open a CSV it was never told about.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (PKDX_*). \
                 No file was provided, so PKDX_STORE__FILE_NAME had better be set."
            .to_string(),
    };

    config.extract().context(context_msg)
}
