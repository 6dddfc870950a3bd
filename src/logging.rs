//! Tracing subscriber setup for the binary.
//!
//! `RUST_LOG` takes precedence over the defaults, e.g.
//! `RUST_LOG=extcarve::scanner=trace extcarve scan disk.img`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs a stderr subscriber; calling it twice is harmless.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("extcarve=debug")
        } else {
            EnvFilter::new("extcarve=info")
        }
    });

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(verbose)
            .with_file(false)
            .with_line_number(false)
            .compact(),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}
