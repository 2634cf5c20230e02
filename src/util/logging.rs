use std::error::Error;
use std::fmt::Write;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes tracing/logging based on environment variables.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false);

    subscriber.init();
}

/// Renders an error for the final log line.
///
/// The short form is the error's message. The verbose form, selected by the
/// `DEBUG` environment variable, lists every cause and the debug structure.
pub fn render_error(err: &(dyn Error + 'static), verbose: bool) -> String {
    let mut out = err.to_string();
    if !verbose {
        return out;
    }

    let mut cause = err.source();
    while let Some(inner) = cause {
        let _ = write!(out, "\n  caused by: {}", inner);
        cause = inner.source();
    }
    let _ = write!(out, "\n{:#?}", err);
    out
}

pub fn debug_enabled() -> bool {
    std::env::var_os("DEBUG").is_some_and(|v| !v.is_empty())
}
