//! Environment configuration.
//!
//! | Variable                       | Effect                                         |
//! |--------------------------------|------------------------------------------------|
//! | `BINGOHALL_BIND`               | listen address (default `0.0.0.0:8080`)        |
//! | `PORT`                         | shorthand for `0.0.0.0:<PORT>`                 |
//! | `BOT_TOKEN`, `TELEGRAM_BOT_TOKEN` | enables Telegram init-data auth             |
//! | `BINGOHALL_DATA_DIR`           | persist to JSON files instead of memory        |
//! | `BINGOHALL_DRAW_INTERVAL_MS`   | time between draws                             |
//! | `BINGOHALL_SHUFFLE_DELAY_MS`   | shuffling phase length                         |
//! | `BINGOHALL_RESTART_DELAY_MS`   | pause between a finished round and the next    |

use std::net::{AddrParseError, SocketAddr};
use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;

use bingohall::prelude::EngineConfig;

const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is not a valid address: {source}")]
    InvalidAddr {
        var: &'static str,
        value: String,
        source: AddrParseError,
    },

    #[error("{var}={value:?} is not a valid number: {source}")]
    InvalidNumber {
        var: &'static str,
        value: String,
        source: ParseIntError,
    },
}

/// Everything the binary reads from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// `None` falls back to the development authenticator.
    pub bot_token: Option<String>,
    /// `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    pub engine: EngineConfig,
}

impl ServerConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let bind = match (get("BINGOHALL_BIND"), get("PORT")) {
            (Some(addr), _) => parse_addr("BINGOHALL_BIND", &addr)?,
            (None, Some(port)) => {
                let port: u16 = port.trim().parse().map_err(|source| ConfigError::InvalidNumber {
                    var: "PORT",
                    value: port.clone(),
                    source,
                })?;
                SocketAddr::from(([0, 0, 0, 0], port))
            }
            (None, None) => parse_addr("BINGOHALL_BIND", DEFAULT_BIND)?,
        };

        let mut engine = EngineConfig::default();
        if let Some(interval) = millis(&get, "BINGOHALL_DRAW_INTERVAL_MS")? {
            engine = engine.with_draw_interval(interval);
        }
        if let Some(delay) = millis(&get, "BINGOHALL_SHUFFLE_DELAY_MS")? {
            engine = engine.with_shuffle_delay(delay);
        }
        if let Some(delay) = millis(&get, "BINGOHALL_RESTART_DELAY_MS")? {
            engine = engine.with_restart_delay(delay);
        }

        Ok(Self {
            bind,
            bot_token: get("BOT_TOKEN").or_else(|| get("TELEGRAM_BOT_TOKEN")),
            data_dir: get("BINGOHALL_DATA_DIR").map(PathBuf::from),
            engine,
        })
    }
}

fn parse_addr(var: &'static str, value: &str) -> Result<SocketAddr, ConfigError> {
    value.trim().parse().map_err(|source| ConfigError::InvalidAddr {
        var,
        value: value.to_string(),
        source,
    })
}

fn millis(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = get(var) else {
        return Ok(None);
    };
    let ms: u64 = value
        .trim()
        .parse()
        .map_err(|source| ConfigError::InvalidNumber {
            var,
            value: value.clone(),
            source,
        })?;
    Ok(Some(Duration::from_millis(ms)))
}
