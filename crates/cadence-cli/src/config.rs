use cadence_core::models::SchedulerConfig;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timezone::detect_system_timezone;

/// CLI settings, read from `cadence.toml` and `CADENCE_*` environment variables.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// SQLite database file
    pub database_path: String,
    /// User the commands act for when `--user` is not given
    pub user_id: Option<Uuid>,
    /// Zone given to a user's preferences the first time they are saved
    pub default_timezone: String,
    /// How many days a task may be pushed past its day when scheduling
    pub lookahead_days: u32,
    /// `tracing` filter directive, e.g. `warn` or `cadence_core=debug`
    pub log: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "cadence.db".to_string(),
            user_id: None,
            default_timezone: detect_system_timezone(),
            lookahead_days: SchedulerConfig::default().max_lookahead_days,
            log: "warn".to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("cadence.toml"))
            .merge(Env::prefixed("CADENCE_"))
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id.unwrap_or_else(Uuid::nil)
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            max_lookahead_days: self.lookahead_days,
        }
    }
}
