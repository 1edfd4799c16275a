//! Server process configuration (generator settings live in
//! [`fleetgen_core::GeneratorConfig`]).

use fleetgen_core::ConfigError;

pub const ENV_PORT: &str = "PORT";
pub const ENV_ENFORCE_ROLES: &str = "GENERATOR_ENFORCE_ROLES";
pub const ENV_BUS_CAPACITY: &str = "GENERATOR_BUS_CAPACITY";

/// Default `RUST_LOG` filter when none is set.
pub const DEFAULT_LOG_FILTER: &str = "fleetgen_server=info,fleetgen_core=info,tower_http=debug";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Reject callers lacking the required role. Off for local development.
    pub enforce_roles: bool,
    /// Per-topic capacity of the in-memory bus.
    pub bus_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            enforce_roles: false,
            bus_capacity: 1024,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup(ENV_PORT) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Parse {
                key: ENV_PORT,
                value: raw,
                expected: "port number",
            })?,
            None => defaults.port,
        };

        let enforce_roles = match lookup(ENV_ENFORCE_ROLES) {
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::Parse {
                key: ENV_ENFORCE_ROLES,
                value: raw,
                expected: "boolean",
            })?,
            None => defaults.enforce_roles,
        };

        let bus_capacity = match lookup(ENV_BUS_CAPACITY) {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| ConfigError::Parse {
                key: ENV_BUS_CAPACITY,
                value: raw,
                expected: "integer",
            })?,
            None => defaults.bus_capacity,
        };
        if bus_capacity == 0 {
            return Err(ConfigError::Zero {
                key: ENV_BUS_CAPACITY,
            });
        }

        Ok(Self {
            port,
            enforce_roles,
            bus_capacity,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
