//! Client configuration.

use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://reportsapi.zoho.com";

pub const ENV_BASE_URL: &str = "ZOHO_REPORTS_URL";
pub const ENV_USER: &str = "ZOHO_REPORTS_USER";
pub const ENV_AUTHTOKEN: &str = "ZOHO_REPORTS_AUTHTOKEN";
pub const ENV_DB: &str = "ZOHO_REPORTS_DB";

/// Settings for a `ReportsClient`.
///
/// `base_url` falls back to `DEFAULT_BASE_URL` when the client is built.
/// The remaining fields are required; `ReportsClient::new` rejects blanks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    pub account_user: String,
    pub auth_token: String,
    pub database_name: String,
}

impl ClientConfig {
    pub fn new(
        account_user: impl Into<String>,
        auth_token: impl Into<String>,
        database_name: impl Into<String>,
    ) -> Self {
        ClientConfig {
            base_url: None,
            account_user: account_user.into(),
            auth_token: auth_token.into(),
            database_name: database_name.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Read settings from `ZOHO_REPORTS_*` environment variables. Unset
    /// variables become empty strings and are reported when the client is
    /// constructed.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        ClientConfig {
            base_url: lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()),
            account_user: lookup(ENV_USER).unwrap_or_default(),
            auth_token: lookup(ENV_AUTHTOKEN).unwrap_or_default(),
            database_name: lookup(ENV_DB).unwrap_or_default(),
        }
    }

    pub(crate) fn resolved_base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn deserializes_without_base_url() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"account_user":"abc@zoho.com","auth_token":"t0k","database_name":"EmployeeDB"}"#,
        )
        .unwrap();
        assert_eq!(config.base_url, None);
        assert_eq!(config.resolved_base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.database_name, "EmployeeDB");
    }

    #[test]
    fn explicit_base_url_wins() {
        let config = ClientConfig::new("u", "t", "d").with_base_url("http://localhost:3000");
        assert_eq!(config.resolved_base_url(), "http://localhost:3000");
    }

    #[test]
    fn lookup_reads_every_variable() {
        let vars: HashMap<&str, &str> = [
            (ENV_BASE_URL, "http://127.0.0.1:9000"),
            (ENV_USER, "u"),
            (ENV_AUTHTOKEN, "t"),
            (ENV_DB, "d"),
        ]
        .into_iter()
        .collect();
        let config = ClientConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(
            config,
            ClientConfig::new("u", "t", "d").with_base_url("http://127.0.0.1:9000")
        );
    }

    #[test]
    fn lookup_leaves_missing_values_empty() {
        let config = ClientConfig::from_lookup(|_| None);
        assert_eq!(config, ClientConfig::default());
    }
}
