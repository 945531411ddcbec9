//! `download_commandLine.txt`: the command line of the last run, kept next to the
//! download report so later runs can tell when the options changed.
use std::fs;
use std::path::Path;

use tracing::warn;

use crate::error::Result;

/// Write `command` to `path`.
///
/// Returns the previous command when it differs from the new one. The file
/// always ends up holding `command`; the change is only logged as a warning
/// when `overwrite` is not set.
pub fn write_command_file(path: &Path, command: &str, overwrite: bool) -> Result<Option<String>> {
    let previous = match fs::read_to_string(path) {
        Ok(text) => Some(text.trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    match previous {
        Some(prev) if prev == command.trim() => Ok(None),
        Some(prev) => {
            if !overwrite {
                warn!("The command line differs from the previous download in this directory.");
                warn!("  previous: {}", prev);
                warn!("  current:  {}", command);
            }
            fs::write(path, format!("{}\n", command))?;
            Ok(Some(prev))
        }
        None => {
            fs::write(path, format!("{}\n", command))?;
            Ok(None)
        }
    }
}

/// Shell-style rendering of the process arguments
pub fn render_command_line<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .map(|a| {
            let a = a.as_ref();
            if a.is_empty() || a.contains(char::is_whitespace) {
                format!("\"{}\"", a)
            } else {
                a.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
