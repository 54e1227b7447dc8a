use log::{error, info};
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tcpbal::balancing::get_balancer;
use tcpbal::{bootstrap, metadata, server, Config};

const CONF_PATH: &str = "config.yaml";

fn main() {
    tcpbal::init_logging().expect("Can't enable logging");
    let config = Config::from_file(CONF_PATH).unwrap_or_else(|_| Config::default());
    let metas = match metadata::load_or_prompt(&config.metadata_path) {
        Ok(metas) => metas,
        Err(e) => {
            error!("can't read server metadata: {}", e);
            process::exit(1);
        }
    };
    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in &[signal_hook::SIGINT, signal_hook::SIGTERM] {
        signal_hook::flag::register(*signal, Arc::clone(&shutdown))
            .expect("Can't register shutdown signal");
    }
    let roster = bootstrap::init_servers(metas, config.max_connections, &shutdown);
    if roster.is_empty() {
        error!("All server connection attempts failed.");
        process::exit(1);
    }
    let listener = match server::bind(&config) {
        Ok(listener) => listener,
        Err(e) => {
            error!("can't listen on {}: {}", config.listen_on(), e);
            process::exit(1);
        }
    };
    info!("Listening on {}", config.listen_on());
    let balancer = get_balancer(&config.balancing_algorithm);
    server::run(listener, Arc::new(roster), balancer, shutdown);
}
