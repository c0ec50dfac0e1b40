//! Connection configuration for an AbraFlexi server.
//!
//! Four parameters identify a backend: server URL, user, password and the
//! company (tenant) whose data is addressed. Each is independently optional
//! at the transport layer; authenticated writes need all four.

use std::env;

/// Connection parameters, usually loaded from `ABRAFLEXI_*` environment
/// variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Server URL, e.g. `https://demo.flexibee.eu:5434`.
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Company identifier (the `/c/{company}` path segment).
    pub company: Option<String>,
}

impl Config {
    /// Load connection parameters from the environment.
    ///
    /// `ABRAFLEXI_LOGIN` takes precedence over `ABRAFLEXI_USER` when both
    /// are set.
    pub fn from_env() -> Self {
        Self {
            url: env::var("ABRAFLEXI_URL").ok(),
            user: env::var("ABRAFLEXI_LOGIN")
                .ok()
                .or_else(|| env::var("ABRAFLEXI_USER").ok()),
            password: env::var("ABRAFLEXI_PASSWORD").ok(),
            company: env::var("ABRAFLEXI_COMPANY").ok(),
        }
    }

    /// Server URL without a trailing slash, if configured.
    pub fn server_base(&self) -> Option<String> {
        self.url
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
    }

    /// Base URL for evidence resources within the configured company
    /// (`{url}/c/{company}`). Requires both url and company.
    pub fn company_base(&self) -> Option<String> {
        let base = self.server_base()?;
        let company = self.company.as_deref()?;
        Some(format!("{}/c/{}", base, company))
    }

    /// True when all four parameters needed for authenticated writes are
    /// present and non-empty.
    pub fn is_complete(&self) -> bool {
        [&self.url, &self.user, &self.password, &self.company]
            .iter()
            .all(|p| p.as_deref().is_some_and(|v| !v.is_empty()))
    }
}
