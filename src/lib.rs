pub mod backend;
pub mod balancing;
pub mod bootstrap;
pub mod metadata;
pub mod pollset;
pub mod server;
pub mod worker;
use crate::balancing::BalancingAlgorithm;
use crate::metadata::DEFAULT_METADATA_PATH;
use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use serde::{Deserialize, Serialize};
use serde_yaml;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub backlog: i32,
    pub metadata_path: String,
    pub max_connections: usize,
    pub balancing_algorithm: BalancingAlgorithm,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            port: 1800,
            backlog: 100,
            metadata_path: DEFAULT_METADATA_PATH.to_string(),
            max_connections: 1000,
            balancing_algorithm: BalancingAlgorithm::LeastLoad,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Config, Box<dyn std::error::Error>> {
        let f = std::fs::File::open(path)?;
        let config: Config = serde_yaml::from_reader(f)?;
        return Ok(config);
    }

    /// Listen address of the balancer, always INADDR_ANY on the configured port.
    pub fn listen_on(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!(
                "{} {:<5} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

static LOGGER: Logger = Logger;

/// Install the process-wide logger. Debug builds log down to `Debug`,
/// release builds stop at `Info`.
pub fn init_logging() -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    Ok(())
}
