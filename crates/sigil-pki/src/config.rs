//! Issuance engine configuration.

use uuid::Uuid;

use crate::error::PkiError;

/// Configuration passed to the issuance services at construction.
#[derive(Debug, Clone)]
pub struct PkiConfig {
    /// Public base URL of the deployment, without trailing slash
    /// (e.g., `https://pki.example.com`).
    pub site_url: String,
    /// Path prefix of the PKI API (default: `/api/v1/pki`).
    pub api_prefix: String,
}

impl Default for PkiConfig {
    fn default() -> Self {
        Self {
            site_url: "http://localhost:8080".into(),
            api_prefix: "/api/v1/pki".into(),
        }
    }
}

impl PkiConfig {
    /// Build a config from `SIGIL_SITE_URL` and `SIGIL_PKI_API_PREFIX`,
    /// keeping defaults for unset variables.
    pub fn from_env() -> Result<Self, PkiError> {
        let defaults = Self::default();
        let site_url = std::env::var("SIGIL_SITE_URL").unwrap_or(defaults.site_url);
        let api_prefix = std::env::var("SIGIL_PKI_API_PREFIX").unwrap_or(defaults.api_prefix);

        if !(site_url.starts_with("http://") || site_url.starts_with("https://")) {
            return Err(PkiError::InvalidConfig(format!(
                "SIGIL_SITE_URL must be an http(s) URL, got '{site_url}'"
            )));
        }

        Ok(Self {
            site_url: site_url.trim_end_matches('/').to_string(),
            api_prefix,
        })
    }

    /// CRL distribution point embedded in issued certificates.
    pub fn crl_url(&self, crl_id: Uuid) -> String {
        format!("{}{}/crl/{crl_id}/der", self.site_url, self.api_prefix)
    }

    /// Authority information access (CA issuers) URL.
    pub fn ca_issuer_url(&self, ca_id: Uuid, ca_cert_id: Uuid) -> String {
        format!(
            "{}{}/ca/{ca_id}/certificates/{ca_cert_id}/der",
            self.site_url, self.api_prefix
        )
    }
}
