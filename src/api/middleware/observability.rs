//! Observability setup shared by the server and the retention command.

use std::env;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` controls the level (default: info). Output goes to stderr without ANSI
/// colors; `LOG_FORMAT=json` switches to one JSON object per line.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);

    // try_init so a second call (tests, embedded use) is a no-op
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}
