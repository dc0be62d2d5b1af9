use tracing_subscriber::EnvFilter;

use vmsweep_core::config::LoggingConfig;
use vmsweep_core::error::{SweepError, SweepResult};

/// Install the global subscriber.
///
/// `RUST_LOG` is honoured; on top of it a `vmsweep=<level>` directive covers
/// every crate of the workspace. Verbose runs log at debug. Output goes to
/// stderr so stdout only carries progress lines.
pub fn init_logging(config: &LoggingConfig, verbose: bool) -> SweepResult<()> {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let directive = format!("vmsweep={}", level).parse().map_err(|e| {
        SweepError::configuration("logging.level", format!("Invalid log directive: {}", e))
    })?;
    let filter = EnvFilter::from_default_env().add_directive(directive);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };

    installed.map_err(|e| SweepError::internal(format!("Failed to initialise logging: {}", e)))
}
