//! Logger setup for the `sign-uefi` binary.
//!
//! Progress is reported through the `log` facade and rendered by
//! `env_logger` on stderr. `RUST_LOG`, when set, takes precedence over the
//! level chosen on the command line.

use log::LevelFilter;

/// Maps `-v`/`-q` to a level filter.
///
/// # Examples
///
/// ```
/// use log::LevelFilter;
/// use uefi_signer::logging::level_filter;
///
/// assert_eq!(level_filter(0, false), LevelFilter::Info);
/// assert_eq!(level_filter(0, true), LevelFilter::Warn);
/// assert_eq!(level_filter(2, false), LevelFilter::Trace);
/// ```
#[must_use]
pub fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Warn;
    }
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn builder(default: LevelFilter) -> env_logger::Builder {
    let env = env_logger::Env::default().default_filter_or(default.as_str());
    let mut builder = env_logger::Builder::from_env(env);
    builder.format_timestamp(None).format_target(false);
    builder
}

/// Installs the global logger. Later calls are ignored.
pub fn init(verbosity: u8, quiet: bool) {
    if builder(level_filter(verbosity, quiet)).try_init().is_err() {
        log::debug!("logger already initialised");
    }
}
