use crate::domain::DayCount;
use crate::engine::{CalculationPolicy, NarrowBase};
use std::collections::HashMap;
use std::net::IpAddr;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind_addr: IpAddr,
    pub narrow_base: NarrowBase,
    pub day_count: DayCount,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::from([127, 0, 0, 1]),
            narrow_base: NarrowBase::default(),
            day_count: DayCount::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let bind_addr = env_map
            .get("BIND_ADDR")
            .map(|s| s.as_str())
            .unwrap_or("127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "BIND_ADDR".to_string(),
                    "must be an IPv4 or IPv6 address".to_string(),
                )
            })?;

        let narrow_base = match env_map
            .get("NARROW_BASE")
            .map(|s| s.as_str())
            .unwrap_or("common_and_preferred")
        {
            "common_and_preferred" => NarrowBase::CommonAndPreferred,
            "preferred_only" => NarrowBase::PreferredOnly,
            other => {
                return Err(ConfigError::InvalidValue(
                    "NARROW_BASE".to_string(),
                    format!(
                        "must be common_and_preferred or preferred_only, got {}",
                        other
                    ),
                ))
            }
        };

        let day_count = match env_map
            .get("DAY_COUNT")
            .map(|s| s.as_str())
            .unwrap_or("actual_365")
        {
            "actual_365" => DayCount::Actual365,
            "actual_365_25" => DayCount::Actual36525,
            other => {
                return Err(ConfigError::InvalidValue(
                    "DAY_COUNT".to_string(),
                    format!("must be actual_365 or actual_365_25, got {}", other),
                ))
            }
        };

        Ok(Config {
            port,
            bind_addr,
            narrow_base,
            day_count,
        })
    }

    /// Conventions handed to every engine.
    pub fn policy(&self) -> CalculationPolicy {
        CalculationPolicy {
            narrow_base: self.narrow_base,
            day_count: self.day_count,
        }
    }
}
