//! Scaffolding shared by every agent binary: common CLI flags, logging
//! initialization, the exit-with-logged-error helper, the stop-flag loop
//! driver, and interval parsing for the scan agent.

pub mod cli;
pub mod interval;
pub mod lifecycle;
pub mod logging;
pub mod or_bail;

pub use cli::CommonArgs;
pub use interval::{parse_interval, IntervalError};
pub use lifecycle::{install_signal_handler, set_parent_death_signal, StopFlag};
pub use logging::{init_logging, LogArgs, LogFormat, LogLevel};
pub use or_bail::OrBail;

/// Resolves the NATS server endpoint list: CLI-supplied `--nats_server`
/// flags take precedence over the config file's `messaging_service.config.servers`.
pub fn resolve_endpoints(
    cli_servers: &[String],
    config_servers: &[polimor_config::ServerEndpoint],
) -> Vec<String> {
    if !cli_servers.is_empty() {
        return cli_servers.to_vec();
    }
    config_servers
        .iter()
        .map(polimor_config::ServerEndpoint::as_endpoint_string)
        .collect()
}

/// Exit code conventions: 0 success, 1 configuration error, any other
/// non-zero is terminal.
pub const EXIT_CONFIG_ERROR: i32 = 1;
