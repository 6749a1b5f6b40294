//! Server configuration, with environment overrides.

use std::str::FromStr;
use std::time::Duration;

use scrawl_room::RoomConfig;
use serde::{Deserialize, Serialize};

use crate::ScrawlError;

/// Port used when neither `SCRAWL_BIND` nor `PORT` is set.
pub const DEFAULT_PORT: u16 = 3001;

/// Everything needed to start a server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// Settings applied to every room.
    pub room: RoomConfig,

    /// Close connections that send nothing for this long. `None` disables
    /// the check.
    pub idle_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            room: RoomConfig::default(),
            idle_timeout: Some(Duration::from_secs(300)),
        }
    }
}

impl ServerConfig {
    /// Builds a config from the defaults and the process environment.
    ///
    /// | Variable | Effect |
    /// |---|---|
    /// | `SCRAWL_BIND` | full bind address, e.g. `127.0.0.1:9000` |
    /// | `PORT` | port on `0.0.0.0` (ignored when `SCRAWL_BIND` is set) |
    /// | `SCRAWL_MAX_ROUNDS` | rounds per game |
    /// | `SCRAWL_SELECT_SECS` | word selection time |
    /// | `SCRAWL_DRAW_SECS` | drawing time |
    /// | `SCRAWL_MAX_PLAYERS` | players per room |
    /// | `SCRAWL_IDLE_TIMEOUT_SECS` | idle connection timeout, `0` disables |
    pub fn from_env() -> Result<Self, ScrawlError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through
    /// `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ScrawlError> {
        let mut config = Self::default();

        if let Some(bind) = lookup("SCRAWL_BIND").filter(|b| !b.trim().is_empty()) {
            config.bind_addr = bind.trim().to_string();
        } else if let Some(port) = parse::<u16>(&lookup, "PORT")? {
            config.bind_addr = format!("0.0.0.0:{port}");
        }

        if let Some(rounds) = parse::<u32>(&lookup, "SCRAWL_MAX_ROUNDS")? {
            config.room.max_rounds = positive("SCRAWL_MAX_ROUNDS", rounds)?;
        }
        if let Some(secs) = parse::<u64>(&lookup, "SCRAWL_SELECT_SECS")? {
            config.room.selection_time = Duration::from_secs(positive("SCRAWL_SELECT_SECS", secs)?);
        }
        if let Some(secs) = parse::<u64>(&lookup, "SCRAWL_DRAW_SECS")? {
            config.room.drawing_time = Duration::from_secs(positive("SCRAWL_DRAW_SECS", secs)?);
        }
        if let Some(max) = parse::<usize>(&lookup, "SCRAWL_MAX_PLAYERS")? {
            if max < config.room.min_players {
                return Err(ScrawlError::Config(format!(
                    "SCRAWL_MAX_PLAYERS must be at least {}",
                    config.room.min_players
                )));
            }
            config.room.max_players = max;
        }
        if let Some(secs) = parse::<u64>(&lookup, "SCRAWL_IDLE_TIMEOUT_SECS")? {
            config.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ScrawlError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ScrawlError::Config(format!("{key}: invalid value {raw:?}"))),
    }
}

fn positive<T: PartialEq + Default>(key: &str, value: T) -> Result<T, ScrawlError> {
    if value == T::default() {
        Err(ScrawlError::Config(format!("{key} must be greater than 0")))
    } else {
        Ok(value)
    }
}
