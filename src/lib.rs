pub mod collaborators; // Disease catalog + report store boundaries
pub mod config;
pub mod core_state; // Scan-page state driven by the host
pub mod model_service; // Exclusive access to the screening model
pub mod pipeline;

pub use core_state::{CoreState, ReportRequest, ScanError, ScanOutcome};

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `RUST_LOG` wins over the built-in filter.
///
/// Hosts that already installed a subscriber keep theirs; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));

    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok() {
        tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    }
}
