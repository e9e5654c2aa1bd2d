//! Client certificate extraction and chain verification.
//!
//! The walk is greedy and order-sensitive: each candidate in bundle order
//! is tried as the issuer of the current certificate. A successful link
//! advances the walk; a failed link marks the result untrusted but the
//! scan continues. A bundle that lists a valid chain out of walk order is
//! therefore rejected even though a valid path exists.

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use tracing::debug;
use x509_cert::Certificate;

use crate::builder::from_x509_time;
use crate::error::PkiError;
use crate::verify::verify_issued_by;

const BEGIN_CERTIFICATE: &str = "-----BEGIN CERTIFICATE-----";
const END_CERTIFICATE: &str = "-----END CERTIFICATE-----";

/// Outcome of a chain walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainVerdict {
    pub trusted: bool,
    /// First failure encountered, if any.
    pub reason: Option<String>,
    /// Number of links that verified.
    pub links_verified: usize,
}

/// Parse every certificate in a PEM bundle, in order.
pub fn parse_pem_bundle(bundle: &str) -> Result<Vec<Certificate>, PkiError> {
    let certificates = Certificate::load_pem_chain(bundle.trim().as_bytes())
        .map_err(|e| PkiError::ChainParseError(e.to_string()))?;
    if certificates.is_empty() {
        return Err(PkiError::ChainParseError("bundle contains no certificates".into()));
    }
    Ok(certificates)
}

/// Recover the client certificate forwarded by the TLS terminator.
///
/// The header value is URL-encoded PEM; only the first certificate block
/// is used.
pub fn extract_client_certificate(raw: Option<&str>) -> Result<Certificate, PkiError> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(PkiError::MissingClientCertificate)?;

    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| PkiError::MissingClientCertificate)?;

    let start = decoded
        .find(BEGIN_CERTIFICATE)
        .ok_or(PkiError::MissingClientCertificate)?;
    let end = decoded[start..]
        .find(END_CERTIFICATE)
        .map(|offset| start + offset + END_CERTIFICATE.len())
        .ok_or(PkiError::MissingClientCertificate)?;

    let block = &decoded[start..end];
    let mut certificates = Certificate::load_pem_chain(block.as_bytes())
        .map_err(|_| PkiError::MissingClientCertificate)?;
    if certificates.is_empty() {
        return Err(PkiError::MissingClientCertificate);
    }
    Ok(certificates.swap_remove(0))
}

struct Walk<'a> {
    current: &'a Certificate,
    failure: Option<String>,
    links_verified: usize,
}

/// Walk `leaf` up through `candidates` and decide whether it is trusted
/// at `now`.
pub fn verify_chain(
    leaf: &Certificate,
    candidates: &[Certificate],
    now: DateTime<Utc>,
) -> ChainVerdict {
    let initial = Walk {
        current: leaf,
        failure: validity_failure(leaf, now),
        links_verified: 0,
    };

    let walk = candidates
        .iter()
        .enumerate()
        .fold(initial, |mut walk, (index, candidate)| {
            match check_link(walk.current, candidate, now) {
                Ok(()) => {
                    debug!(index, "chain link verified");
                    walk.current = candidate;
                    walk.links_verified += 1;
                }
                Err(reason) => {
                    debug!(index, %reason, "chain link failed");
                    walk.failure.get_or_insert(reason);
                }
            }
            walk
        });

    ChainVerdict {
        trusted: walk.failure.is_none(),
        reason: walk.failure,
        links_verified: walk.links_verified,
    }
}

fn check_link(cert: &Certificate, issuer: &Certificate, now: DateTime<Utc>) -> Result<(), String> {
    match verify_issued_by(cert, issuer) {
        Ok(true) => {}
        Ok(false) => {
            return Err(format!(
                "signature of '{}' does not verify against '{}'",
                cert.tbs_certificate.subject, issuer.tbs_certificate.subject
            ));
        }
        Err(e) => return Err(e.to_string()),
    }
    validity_failure(issuer, now).map_or(Ok(()), Err)
}

fn validity_failure(cert: &Certificate, now: DateTime<Utc>) -> Option<String> {
    let validity = &cert.tbs_certificate.validity;
    let window = from_x509_time(&validity.not_before)
        .and_then(|nb| from_x509_time(&validity.not_after).map(|na| (nb, na)));
    match window {
        Ok((not_before, not_after)) if not_before <= now && now <= not_after => None,
        Ok((not_before, not_after)) => Some(format!(
            "'{}' is not valid at {now} ({not_before} .. {not_after})",
            cert.tbs_certificate.subject
        )),
        Err(e) => Some(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    fn percent_encode(pem: &str) -> String {
        percent_encoding::utf8_percent_encode(pem, percent_encoding::NON_ALPHANUMERIC).to_string()
    }

    #[test]
    fn empty_bundle_is_a_parse_error() {
        assert!(matches!(
            parse_pem_bundle(""),
            Err(PkiError::ChainParseError(_))
        ));
        assert!(matches!(
            parse_pem_bundle("not a certificate"),
            Err(PkiError::ChainParseError(_))
        ));
    }

    #[test]
    fn client_certificate_is_url_decoded() {
        let root = test_support::ca_fixture("Chain Root");
        let client = test_support::issue_from(&root, "device-1", 50, false);

        let extracted = extract_client_certificate(Some(&percent_encode(&client.pem))).unwrap();
        assert_eq!(extracted, client.certificate);
    }

    #[test]
    fn missing_client_certificate() {
        assert!(matches!(
            extract_client_certificate(None),
            Err(PkiError::MissingClientCertificate)
        ));
        assert!(matches!(
            extract_client_certificate(Some("   ")),
            Err(PkiError::MissingClientCertificate)
        ));
        assert!(matches!(
            extract_client_certificate(Some("garbage")),
            Err(PkiError::MissingClientCertificate)
        ));
    }

    #[test]
    fn ordered_bundle_is_trusted() {
        let root = test_support::ca_fixture("Chain Root");
        let intermediate = test_support::issue_from(&root, "Chain Intermediate", 51, true);
        let client = test_support::issue_from(&intermediate, "device-1", 52, false);

        let bundle = parse_pem_bundle(&format!("{}{}", intermediate.pem, root.pem)).unwrap();
        let verdict = verify_chain(&client.certificate, &bundle, Utc::now());

        assert!(verdict.trusted, "{verdict:?}");
        assert_eq!(verdict.links_verified, 2);
        assert_eq!(verdict.reason, None);
    }

    #[test]
    fn reversed_bundle_is_untrusted() {
        let root = test_support::ca_fixture("Chain Root");
        let intermediate = test_support::issue_from(&root, "Chain Intermediate", 51, true);
        let client = test_support::issue_from(&intermediate, "device-1", 52, false);

        let bundle = parse_pem_bundle(&format!("{}{}", root.pem, intermediate.pem)).unwrap();
        let verdict = verify_chain(&client.certificate, &bundle, Utc::now());

        assert!(!verdict.trusted);
        // The intermediate link still verifies after the root link fails.
        assert_eq!(verdict.links_verified, 1);
        assert!(verdict.reason.is_some());
    }

    #[test]
    fn verification_is_idempotent() {
        let root = test_support::ca_fixture("Chain Root");
        let client = test_support::issue_from(&root, "device-1", 53, false);
        let bundle = parse_pem_bundle(&root.pem).unwrap();
        let now = Utc::now();

        let first = verify_chain(&client.certificate, &bundle, now);
        let second = verify_chain(&client.certificate, &bundle, now);
        assert_eq!(first, second);
        assert!(first.trusted);
    }

    #[test]
    fn unrelated_anchor_is_untrusted() {
        let root = test_support::ca_fixture("Chain Root");
        let other = test_support::ca_fixture_valid(
            "Other Root",
            60,
            Utc::now() - chrono::Duration::days(1),
            Utc::now() + chrono::Duration::days(10),
        );
        let client = test_support::issue_from(&root, "device-1", 54, false);

        let verdict = verify_chain(&client.certificate, &[other.certificate], Utc::now());
        assert!(!verdict.trusted);
        assert_eq!(verdict.links_verified, 0);
    }

    #[test]
    fn expired_leaf_is_untrusted() {
        let root = test_support::ca_fixture("Chain Root");
        let client = test_support::issue_from(&root, "device-1", 55, false);
        let later = Utc::now() + chrono::Duration::days(30);

        let verdict = verify_chain(&client.certificate, &[root.certificate], later);
        assert!(!verdict.trusted);
    }
}
