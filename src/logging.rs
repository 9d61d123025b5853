//! Tracing subscriber setup for the CLI and embedding applications.

use tracing_subscriber::EnvFilter;

use crate::config::Settings;

/// Install a stderr `fmt` subscriber.
///
/// `RUST_LOG` wins over `settings.logging.level`; `debug = true` forces the
/// `debug` level for this crate. Calling this twice is harmless: the second
/// install is ignored.
pub fn init(settings: &Settings) {
    let default_directive = if settings.debug {
        format!("{},lexvec=debug", settings.logging.level)
    } else {
        settings.logging.level.clone()
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
