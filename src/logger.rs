use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter, e.g. `devguard=debug`.
pub const LOG_ENV: &str = "DEVGUARD_LOG";

/// Picks the filter: `--verbose` wins, then the environment, then the config.
fn directive(verbose: bool, env: Option<String>, configured: &str) -> String {
    if verbose {
        return "debug".to_string();
    }
    match env {
        Some(value) if !value.trim().is_empty() => value,
        _ => configured.to_string(),
    }
}

/// Installs the global subscriber. Logs go to stderr so reports on stdout stay clean.
pub fn init(verbose: bool, configured: &str) {
    let directive = directive(verbose, std::env::var(LOG_ENV).ok(), configured);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
