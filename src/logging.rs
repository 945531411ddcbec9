//! `tracing` subscriber setup shared by the binaries.
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Install the global subscriber.
///
/// The level comes from `RUST_LOG` when set, else `info` (`debug` with `debug`).
/// With `output` the log goes to that file without colors, otherwise to stderr.
pub fn init(output: Option<&Path>, debug: bool) -> Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let installed = match output {
        Some(path) => {
            let file = File::create(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    installed.map_err(|e| Error::Processing(format!("cannot install the logger: {}", e)))
}
