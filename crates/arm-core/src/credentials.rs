//! Token lookup for HTTP registries.
//!
//! Adapters ask for a token by host and path; where the token comes from
//! (environment, a config file, a keychain) is the resolver's concern.

use std::collections::HashMap;

/// Resolves an auth token for a request target.
pub trait CredentialResolver: Send + Sync {
    /// Token for `host` and URL `path`, if any.
    fn token(&self, host: &str, path: &str) -> Option<String>;
}

/// Never returns a token.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialResolver for NoCredentials {
    fn token(&self, _host: &str, _path: &str) -> Option<String> {
        None
    }
}

/// Fixed per-host tokens.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    tokens: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(mut self, host: impl Into<String>, token: impl Into<String>) -> Self {
        self.tokens.insert(host.into().to_lowercase(), token.into());
        self
    }
}

impl CredentialResolver for StaticCredentials {
    fn token(&self, host: &str, _path: &str) -> Option<String> {
        self.tokens.get(&host.to_lowercase()).cloned()
    }
}

/// Reads `ARM_TOKEN_<HOST>` (dots and dashes as underscores, uppercased),
/// falling back to `ARM_TOKEN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl EnvCredentials {
    fn host_var(host: &str) -> String {
        let suffix: String = host
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("ARM_TOKEN_{suffix}")
    }
}

impl CredentialResolver for EnvCredentials {
    fn token(&self, host: &str, _path: &str) -> Option<String> {
        std::env::var(Self::host_var(host))
            .or_else(|_| std::env::var("ARM_TOKEN"))
            .ok()
            .filter(|t| !t.is_empty())
    }
}
