//! Issuance policy engine.
//!
//! Decides whether a parsed CSR is satisfiable under a subscriber's policy
//! and, if so, which values the signed certificate asserts. Usages are
//! policy-driven (the subscriber's allow-list is signed as-is) while SANs
//! are request-driven (exactly the requested subset is signed).
//!
//! The engine is pure: the caller supplies `now` and the CA window.

use chrono::{DateTime, Utc};
use sigil_core::models::certificate::{ExtendedKeyUsage, KeyUsage};
use sigil_core::models::subscriber::{SubjectAltName, Subscriber};
use uuid::Uuid;
use x509_cert::Certificate;
use x509_cert::ext::Extension;

use crate::config::PkiConfig;
use crate::csr::ParsedCsr;
use crate::error::PkiError;
use crate::extensions::{self, IssuerExtensions, SubjectExtensions};
use crate::ttl::parse_ttl;
use crate::usage;

/// Inputs to a single policy decision.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput<'a> {
    pub subscriber: &'a Subscriber,
    pub csr: &'a ParsedCsr,
    pub ca_not_before: DateTime<Utc>,
    pub ca_not_after: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

/// An accepted request: the exact window and extension values to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuancePlan {
    pub common_name: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub key_usages: Vec<KeyUsage>,
    pub extended_key_usages: Vec<ExtendedKeyUsage>,
    pub subject_alt_names: Vec<SubjectAltName>,
}

/// Identifiers of the issuing CA, used to build the CRL and AIA URLs.
#[derive(Debug, Clone, Copy)]
pub struct IssuingCa<'a> {
    pub certificate: &'a Certificate,
    pub ca_id: Uuid,
    pub ca_cert_id: Uuid,
    pub crl_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct IssuancePolicyEngine {
    config: PkiConfig,
}

impl IssuancePolicyEngine {
    pub fn new(config: PkiConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PkiConfig {
        &self.config
    }

    /// Run the checks in order: validity window, common name, key usage,
    /// extended key usage, subject alternative names. The first failure
    /// is returned.
    pub fn evaluate(&self, input: PolicyInput<'_>) -> Result<IssuancePlan, PkiError> {
        let subscriber = input.subscriber;
        let csr = input.csr;

        let ttl = parse_ttl(&subscriber.ttl)?;
        let not_before = truncate_to_seconds(input.now);
        let not_after = not_before
            .checked_add_signed(ttl)
            .ok_or_else(|| PkiError::InvalidTtl(subscriber.ttl.clone()))?;
        if not_before < input.ca_not_before || not_after > input.ca_not_after {
            return Err(PkiError::TtlExceedsCaWindow {
                not_before: not_before.to_rfc3339(),
                not_after: not_after.to_rfc3339(),
            });
        }

        let requested_cn = csr.common_name()?;
        if requested_cn != subscriber.common_name {
            return Err(PkiError::CommonNameMismatch {
                expected: subscriber.common_name.clone(),
                requested: requested_cn.to_string(),
            });
        }

        if let Some(usage) = csr
            .key_usages
            .iter()
            .find(|usage| !subscriber.key_usages.contains(*usage))
        {
            return Err(PkiError::KeyUsageNotAllowed {
                usage: usage.to_string(),
            });
        }

        for oid in &csr.extended_key_usages {
            let allowed = usage::extended_key_usage_from_oid(oid)
                .is_some_and(|eku| subscriber.extended_key_usages.contains(&eku));
            if !allowed {
                let usage = usage::extended_key_usage_from_oid(oid)
                    .map(|eku| eku.to_string())
                    .unwrap_or_else(|| oid.to_string());
                return Err(PkiError::ExtendedKeyUsageNotAllowed { usage });
            }
        }

        // Matched on value only: a requested DNS name is accepted when the
        // subscriber lists the same string under either type.
        if let Some(san) = csr.subject_alt_names.iter().find(|requested| {
            !subscriber
                .subject_alternative_names
                .iter()
                .any(|allowed| allowed.value == requested.value)
        }) {
            return Err(PkiError::SanNotAllowed {
                value: san.value.clone(),
            });
        }

        Ok(IssuancePlan {
            common_name: requested_cn.to_string(),
            not_before,
            not_after,
            key_usages: subscriber.key_usages.clone(),
            extended_key_usages: subscriber.extended_key_usages.clone(),
            subject_alt_names: csr.subject_alt_names.clone(),
        })
    }

    /// The extension set for an accepted plan.
    pub fn extensions(
        &self,
        plan: &IssuancePlan,
        csr: &ParsedCsr,
        issuing_ca: IssuingCa<'_>,
    ) -> Result<Vec<Extension>, PkiError> {
        let crl_url = self.config.crl_url(issuing_ca.crl_id);
        let ca_issuer_url = self
            .config
            .ca_issuer_url(issuing_ca.ca_id, issuing_ca.ca_cert_id);

        extensions::leaf_extensions(
            IssuerExtensions {
                certificate: issuing_ca.certificate,
                crl_url: &crl_url,
                ca_issuer_url: &ca_issuer_url,
            },
            SubjectExtensions {
                public_key: &csr.public_key,
                key_usages: &plan.key_usages,
                extended_key_usages: &plan.extended_key_usages,
                subject_alt_names: &plan.subject_alt_names,
            },
        )
    }
}

/// Certificates carry whole seconds; the stored window must match.
pub fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}
