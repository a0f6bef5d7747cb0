//! Credential lookup for repository and registry hosts.
//!
//! Fetchers never read credential files themselves; they receive a
//! [`CredentialLookup`] and ask it for the host they are about to contact.
//! The stock implementation is [`Netrc`], which reads `~/.netrc`.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Basic { username: String, password: String },
    Token(String),
}

pub trait CredentialLookup: Send + Sync {
    fn lookup(&self, host: &str) -> Option<Credential>;
}

impl<F> CredentialLookup for F
where
    F: Fn(&str) -> Option<Credential> + Send + Sync,
{
    fn lookup(&self, host: &str) -> Option<Credential> {
        self(host)
    }
}

/// Lookup that never finds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Anonymous;

impl CredentialLookup for Anonymous {
    fn lookup(&self, _host: &str) -> Option<Credential> {
        None
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Machine {
    pub login: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct Netrc {
    machines: HashMap<String, Machine>,
    default: Option<Machine>,
}

impl Netrc {
    /// Read `~/.netrc`. A missing file is an empty store.
    pub fn load_default() -> Result<Self> {
        let Some(home) = dirs::home_dir() else {
            tracing::debug!("no home directory, skipping .netrc");
            return Ok(Self::default());
        };
        Self::load(&home.join(".netrc"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no .netrc file found");
            return Ok(Self::default());
        }
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self::parse(&contents))
    }

    pub fn parse(contents: &str) -> Self {
        let mut netrc = Self::default();
        let mut tokens = contents.split_whitespace().peekable();
        // (host, entry) being filled; host None means the `default` entry
        let mut current: Option<(Option<String>, Machine)> = None;

        while let Some(token) = tokens.next() {
            match token {
                "machine" => {
                    netrc.finish(current.take());
                    if let Some(host) = tokens.next() {
                        current = Some((Some(host.to_string()), Machine::default()));
                    }
                }
                "default" => {
                    netrc.finish(current.take());
                    current = Some((None, Machine::default()));
                }
                "login" | "password" | "token" | "account" => {
                    let value = tokens.next().map(str::to_string);
                    if let Some((_, machine)) = current.as_mut() {
                        match token {
                            "login" => machine.login = value,
                            "password" => machine.password = value,
                            "token" => machine.token = value,
                            _ => {}
                        }
                    }
                }
                "macdef" => {
                    // macro bodies end at a blank line, which whitespace
                    // splitting has erased; resume at the next entry
                    netrc.finish(current.take());
                    while tokens
                        .next_if(|t| *t != "machine" && *t != "default")
                        .is_some()
                    {}
                }
                _ => {}
            }
        }
        netrc.finish(current);
        netrc
    }

    fn finish(&mut self, entry: Option<(Option<String>, Machine)>) {
        match entry {
            Some((Some(host), machine)) => {
                self.machines.entry(host).or_insert(machine);
            }
            Some((None, machine)) => self.default = Some(machine),
            None => {}
        }
    }

    pub fn machine(&self, host: &str) -> Option<&Machine> {
        self.machines.get(host).or(self.default.as_ref())
    }
}

impl CredentialLookup for Netrc {
    /// A `token` entry wins over `login`/`password`: registry hosts are
    /// written with placeholder login and password next to the real token.
    fn lookup(&self, host: &str) -> Option<Credential> {
        let machine = self.machine(host)?;
        match (&machine.token, &machine.password) {
            (Some(token), _) => Some(Credential::Token(token.clone())),
            (None, Some(password)) => Some(Credential::Basic {
                username: machine.login.clone().unwrap_or_default(),
                password: password.clone(),
            }),
            (None, None) => None,
        }
    }
}

/// Registry hosts want the raw token; a basic entry falls back to its
/// password.
pub fn registry_token(lookup: &dyn CredentialLookup, host: &str) -> Option<String> {
    match lookup.lookup(host)? {
        Credential::Token(token) => Some(token),
        Credential::Basic { password, .. } => Some(password),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NETRC: &str = "
machine github.com
  login octocat
  password hunter2

machine pbuf.cloud login unused password unused token secret-token

default login anon password anon
";

    #[test]
    fn test_parse_machines() {
        let netrc = Netrc::parse(NETRC);
        let github = netrc.machine("github.com").unwrap();
        assert_eq!(github.login.as_deref(), Some("octocat"));
        assert_eq!(github.password.as_deref(), Some("hunter2"));

        let registry = netrc.machine("pbuf.cloud").unwrap();
        assert_eq!(registry.token.as_deref(), Some("secret-token"));
    }

    #[test]
    fn test_lookup_basic() {
        let netrc = Netrc::parse(NETRC);
        assert_eq!(
            netrc.lookup("github.com"),
            Some(Credential::Basic {
                username: "octocat".to_string(),
                password: "hunter2".to_string(),
            })
        );
    }

    #[test]
    fn test_lookup_falls_back_to_default() {
        let netrc = Netrc::parse(NETRC);
        assert!(matches!(
            netrc.lookup("gitlab.com"),
            Some(Credential::Basic { username, .. }) if username == "anon"
        ));
        assert!(Netrc::parse("machine a login x password y").lookup("b").is_none());
    }

    #[test]
    fn test_token_only_machine() {
        let netrc = Netrc::parse("machine registry.local token abc");
        assert_eq!(
            netrc.lookup("registry.local"),
            Some(Credential::Token("abc".to_string()))
        );
    }

    #[test]
    fn test_registry_token_prefers_token_field() {
        let netrc = Netrc::parse(NETRC);
        assert_eq!(
            registry_token(&netrc, "pbuf.cloud").as_deref(),
            Some("secret-token")
        );
        assert_eq!(registry_token(&netrc, "github.com").as_deref(), Some("hunter2"));
        assert_eq!(registry_token(&Anonymous, "registry.local"), None);
    }

    #[test]
    fn test_macdef_is_skipped() {
        let netrc = Netrc::parse(
            "macdef init\ncd /tmp\nput file\n\nmachine example.com login me password pw\n",
        );
        assert_eq!(
            netrc.machine("example.com").and_then(|m| m.login.as_deref()),
            Some("me")
        );
    }

    #[test]
    fn test_closure_lookup() {
        let lookup = |host: &str| -> Option<Credential> {
            (host == "example.com").then(|| Credential::Token("t".to_string()))
        };
        assert!(lookup.lookup("example.com").is_some());
        assert!(lookup.lookup("other.com").is_none());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let netrc = Netrc::load(&dir.path().join(".netrc")).unwrap();
        assert!(netrc.lookup("github.com").is_none());
    }
}
