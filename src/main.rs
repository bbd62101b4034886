use std::net::SocketAddr;
use std::process::ExitCode;

use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ip_allowlist::config::LogFormat;
use ip_allowlist::{
    Allowlist, AppResult, AppState, Config, TrustedProxies, build_router, metrics, utils,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Config is loaded first so LOG_FORMAT applies; errors are reported once logging is up
    let config = Config::from_env();
    init_tracing(config.as_ref().map_or(LogFormat::default(), |c| c.log_format));

    info!(
        "Starting IP allowlist service v{}",
        env!("CARGO_PKG_VERSION")
    );

    match run(config).await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Initialize logging.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Run the application, returning an exit code on error.
async fn run(config: AppResult<Config>) -> Result<(), exitcode::ExitCode> {
    let config = config.map_err(|e| {
        error!("Configuration error: {e}");
        exitcode::CONFIG
    })?;
    info!(
        host = %config.host,
        port = %config.port,
        log_format = %config.log_format,
        "Configuration loaded"
    );

    // Compile the allowlist; any bad entry stops startup
    let allowlist = Allowlist::compile(&config.allowed_ips).map_err(|e| {
        error!(entry = ?e.offending_entry(), "Invalid allowlist: {e}");
        exitcode::CONFIG
    })?;

    let trusted_proxies = TrustedProxies::parse(config.trusted_proxies.as_deref()).map_err(|e| {
        error!(entry = ?e.offending_entry(), "Invalid trusted proxies: {e}");
        exitcode::CONFIG
    })?;
    if trusted_proxies.is_enabled() {
        info!("Forwarding headers trusted only from configured proxies");
    } else {
        warn!(
            "TRUSTED_PROXIES not set: X-Forwarded-For and X-Real-IP are trusted from any peer. \
             Ensure the edge proxy overwrites these headers."
        );
    }

    // Metrics (optional)
    if let Some(addr) = config.metrics_addr() {
        metrics::try_init_metrics(addr);
    }
    metrics::set_allowlist_ranges(allowlist.len());

    let entries = allowlist.len();
    let state = AppState::new(allowlist, trusted_proxies);
    let app = build_router(state.clone());

    // Start server
    let server_addr = config.server_addr();
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|e| {
            error!("Failed to bind to {server_addr}: {e}");
            exitcode::UNAVAILABLE
        })?;
    let addr = listener.local_addr().map_err(|e| {
        error!("Failed to read listener address: {e}");
        exitcode::OSERR
    })?;

    info!("Starting IP allowlist service on http://{addr}");
    info!("Allowlist contains {entries} entries");
    info!("  ANY  /health  - Health check");
    info!("  ANY  /*       - Forward-auth decision");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(utils::shutdown_signal())
    .await
    .map_err(|e| {
        error!("Server error: {e}");
        exitcode::SOFTWARE
    })?;

    info!(uptime_secs = state.uptime_seconds(), "Server shutdown complete");
    Ok(())
}
