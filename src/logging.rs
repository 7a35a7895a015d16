use tracing_subscriber::EnvFilter;

/// Loads `.env` and installs the stderr subscriber.
///
/// `.env` is read first so a `RUST_LOG` kept there reaches the filter.
pub fn init_cli_logger(verbose: bool) {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(filter_from_env("RUST_LOG", verbose))
        .with_writer(std::io::stderr)
        .init();
}

/// Filter from `var` when set, else `granite_shell=warn` (`debug` when verbose).
pub fn filter_from_env(var: &str, verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(var).unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "granite_shell=debug"
        } else {
            "granite_shell=warn"
        })
    })
}
