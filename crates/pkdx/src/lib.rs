//! 📚 pkdx: a pokedex on a CSV, and a pipeline that filters it in parallel.
//!
//! 🧠 Knowledge graph:
//! - `supervisors`: the quota-driven filter pipeline (source → workers → sink).
//! - `dex`: the in-memory store with the append-only write path.
//! - `backends`: where raw records come from (a file, or memory in tests).
//! - `codec` + `common`: CSV lines in, `Pokemon` out, and back again.
//! - `app_config`: figment-loaded settings. `errors`: the `DexError` taxonomy.

pub mod app_config;
pub mod backends;
pub mod codec;
pub mod common;
pub mod dex;
pub mod errors;
mod progress;
pub mod supervisors;

use anyhow::{Context, Result};

pub use app_config::{AppConfig, load_config};
pub use common::{Category, FilterRequest, Pokemon, PokemonDraft};
pub use dex::Dex;
pub use errors::{DexError, DexResult};
pub use supervisors::{FilterReport, Supervisor};

/// 🚀 One filter run against the configured store, with the per-worker report.
pub async fn run(app_config: AppConfig, request: FilterRequest) -> Result<FilterReport> {
    Supervisor::new(app_config)
        .filter_with_report(request)
        .await
        .context("💀 the filter pipeline did not finish")
}
