//! XNAT host and credential resolution.
//!
//! The host comes from `--host` or `XNAT_HOST`, the user from `-u` or `XNAT_USER`.
//! The password is looked up in `XNAT_PASS`, then in `~/.netrc`, and finally
//! prompted for on the terminal, without echo, when a user is known.
use std::env;
use std::fs;
use std::path::Path;

use inquire::{Password, PasswordDisplayMode};
use tracing::{debug, info};

use crate::error::{Error, Result};

pub const HOST_ENV: &str = "XNAT_HOST";
pub const USER_ENV: &str = "XNAT_USER";
pub const PASSWORD_ENV: &str = "XNAT_PASS";

#[derive(Clone, PartialEq, Eq)]
pub struct XnatCredentials {
    pub host: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for XnatCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XnatCredentials")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// One `machine` entry of a netrc file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetrcEntry {
    pub machine: String,
    pub login: Option<String>,
    pub password: Option<String>,
}

/// Parse the `machine`/`default` entries of a netrc file
pub fn parse_netrc(text: &str) -> Vec<NetrcEntry> {
    let mut entries = Vec::new();
    let mut current: Option<NetrcEntry> = None;
    let mut tokens = text.split_whitespace();
    while let Some(token) = tokens.next() {
        match token {
            "machine" | "default" => {
                if let Some(entry) = current.take() {
                    entries.push(entry);
                }
                let machine = if token == "default" {
                    String::new()
                } else {
                    tokens.next().unwrap_or_default().to_string()
                };
                current = Some(NetrcEntry {
                    machine,
                    ..Default::default()
                });
            }
            "login" => {
                if let Some(entry) = current.as_mut() {
                    entry.login = tokens.next().map(str::to_string);
                }
            }
            "password" => {
                if let Some(entry) = current.as_mut() {
                    entry.password = tokens.next().map(str::to_string);
                }
            }
            _ => {}
        }
    }
    if let Some(entry) = current {
        entries.push(entry);
    }
    entries
}

/// Host name of a URL: no scheme, port or path
pub fn machine_name(host: &str) -> &str {
    let host = host.split("://").nth(1).unwrap_or(host);
    let host = host.split('/').next().unwrap_or(host);
    host.split(':').next().unwrap_or(host)
}

/// Entry for `host`, falling back to the `default` entry
pub fn netrc_lookup(entries: &[NetrcEntry], host: &str) -> Option<NetrcEntry> {
    let machine = machine_name(host);
    entries
        .iter()
        .find(|e| e.machine == machine || e.machine == host)
        .or_else(|| entries.iter().find(|e| e.machine.is_empty()))
        .cloned()
}

fn read_netrc(path: &Path, host: &str) -> Option<NetrcEntry> {
    let text = fs::read_to_string(path).ok()?;
    netrc_lookup(&parse_netrc(&text), host)
}

fn password_prompt(message: &str) -> Password<'_> {
    Password::new(message)
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Hidden)
}

fn prompt_password(user: &str, host: &str) -> Result<String> {
    let message = format!("Password for {}@{}:", user, host);
    Ok(password_prompt(&message).prompt()?)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl XnatCredentials {
    /// Resolve host, user and password from the given values, the environment and `~/.netrc`
    pub fn resolve(host: Option<&str>, user: Option<&str>) -> Result<Self> {
        let host = non_empty(host.map(str::to_string))
            .or_else(|| non_empty(env::var(HOST_ENV).ok()))
            .ok_or_else(|| Error::MissingArgument {
                arg: format!("--host (or {})", HOST_ENV),
            })?;
        let host = host.trim_end_matches('/').to_string();
        let mut user =
            non_empty(user.map(str::to_string)).or_else(|| non_empty(env::var(USER_ENV).ok()));

        let mut password = non_empty(env::var(PASSWORD_ENV).ok());
        if password.is_none() {
            let netrc = dirs::home_dir().and_then(|home| read_netrc(&home.join(".netrc"), &host));
            if let Some(entry) = netrc {
                let matches_user = match (&user, &entry.login) {
                    (Some(u), Some(login)) => u == login,
                    _ => true,
                };
                if matches_user {
                    debug!("Using ~/.netrc credentials for {}", machine_name(&host));
                    if user.is_none() {
                        user = entry.login.clone();
                    }
                    password = entry.password.clone();
                }
            }
        }
        if password.is_none() {
            if let Some(u) = &user {
                password = Some(prompt_password(u, &host)?);
            }
        }
        if user.is_none() {
            info!("No XNAT user given, connecting anonymously to {}", host);
        }

        Ok(Self {
            host,
            user,
            password,
        })
    }
}
