mod queries;

pub use queries::{q, schema};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Application configuration loaded from TOML config files.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub suggest: SuggestSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_address")]
    pub address: String,
}

fn default_address() -> String {
    "0.0.0.0:9000".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    #[serde(default = "default_max_conns")]
    pub max_conns: u32,
}

fn default_max_conns() -> u32 {
    10
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            max_conns: default_max_conns(),
        }
    }
}

/// Raw suggest settings from config. Clamped into a SuggestConfig at
/// startup; out-of-range values are corrected, never rejected.
#[derive(Debug, Clone, Deserialize)]
pub struct SuggestSettings {
    #[serde(default = "default_min_prefix_length")]
    pub min_prefix_length: usize,

    #[serde(default = "default_max_unique_candidates")]
    pub max_unique_candidates: usize,

    #[serde(default = "default_suggestion_limit")]
    pub default_suggestion_limit: usize,

    /// Build every known field index at startup instead of on first use.
    #[serde(default)]
    pub preload: bool,
}

fn default_min_prefix_length() -> usize {
    2
}

fn default_max_unique_candidates() -> usize {
    600
}

fn default_suggestion_limit() -> usize {
    8
}

impl Default for SuggestSettings {
    fn default() -> Self {
        Self {
            min_prefix_length: default_min_prefix_length(),
            max_unique_candidates: default_max_unique_candidates(),
            default_suggestion_limit: default_suggestion_limit(),
            preload: false,
        }
    }
}

/// Corpus-wide counters served by the stats API.
#[derive(Debug, Clone, Default, Serialize, FromRow)]
pub struct CorpusStats {
    pub num_values: i64,
    pub num_fields: i64,
}
