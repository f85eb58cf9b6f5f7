use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,tax_ledger=debug";

/// Install the global subscriber; `RUST_LOG` overrides the default filter.
///
/// Safe to call more than once, later calls leave the first subscriber in place.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
