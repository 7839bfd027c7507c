use std::path::PathBuf;
use std::time::Duration;

use crate::engine::EngineOptions;
use crate::topology::{TopologyError, TopologySpec};

/// Process configuration, read once from `PARKD_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub metrics_port: Option<u16>,
    pub topology_path: Option<PathBuf>,
    pub cross_zone: bool,
    pub shutdown_grace: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source. Unparseable values fall back to defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let port = get("PARKD_PORT")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(8080);
        let bind = get("PARKD_BIND").unwrap_or_else(|| "0.0.0.0".into());
        let metrics_port = get("PARKD_METRICS_PORT").and_then(|s| s.trim().parse().ok());
        let topology_path = get("PARKD_TOPOLOGY")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let cross_zone = get("PARKD_CROSS_ZONE").is_some_and(|v| parse_flag(&v));
        let grace_secs: u64 = get("PARKD_SHUTDOWN_GRACE_SECS")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(10);

        Self {
            bind,
            port,
            metrics_port,
            topology_path,
            cross_zone,
            shutdown_grace: Duration::from_secs(grace_secs),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            cross_zone: self.cross_zone,
        }
    }

    /// The configured topology file, or the built-in demo city.
    pub fn load_topology(&self) -> Result<TopologySpec, TopologyError> {
        match &self.topology_path {
            Some(path) => TopologySpec::load(path),
            None => Ok(TopologySpec::demo_city()),
        }
    }
}

fn parse_flag(v: &str) -> bool {
    !matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "off" | "no"
    )
}
