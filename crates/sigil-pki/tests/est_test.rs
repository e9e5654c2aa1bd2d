//! EST simple-enroll against in-memory SurrealDB.

mod common;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{Duration, Utc};
use common::{CsrOptions, KeyedCert, TestAuthorizer};
use sigil_core::models::certificate_authority::UpdateCertificateAuthority;
use sigil_core::repository::{CertificateRepository, Pagination};
use sigil_pki::error::ErrorKind;
use sigil_pki::{PkiError, SignCertificateInput, pkcs7};
use uuid::Uuid;

/// A client hierarchy unrelated to the issuing CA: root, intermediate and
/// a device leaf issued by the intermediate.
struct ClientPki {
    root: KeyedCert,
    intermediate: KeyedCert,
    leaf: KeyedCert,
}

fn client_pki() -> ClientPki {
    let now = Utc::now();
    let root = common::root(
        "Device Root",
        10,
        now - Duration::days(1),
        now + Duration::days(365),
    );
    let intermediate = common::intermediate(
        &root,
        "Device Intermediate",
        11,
        now - Duration::days(1),
        now + Duration::days(365),
    );
    let leaf = common::client_leaf(&intermediate, "device-01", 12);
    ClientPki {
        root,
        intermediate,
        leaf,
    }
}

#[tokio::test]
async fn enrolls_trusted_client() {
    let h = common::harness().await;
    let client = client_pki();
    let config = h
        .est_config(
            format!("{}{}", client.intermediate.pem, client.root.pem),
            true,
        )
        .await;
    let csr = common::csr_pem("CN=api.example.com", &CsrOptions::default());

    let response = h
        .est()
        .simple_enroll(
            config.id,
            &csr,
            Some(&common::percent_encode(&client.leaf.pem)),
        )
        .await
        .unwrap();

    let der = STANDARD.decode(response).unwrap();
    let certs = pkcs7::certificates_from_der(&der).unwrap();
    assert_eq!(certs.len(), 1);

    let issued = &certs[0];
    assert_eq!(
        issued.tbs_certificate.issuer,
        h.issuing.certificate.tbs_certificate.subject
    );
    let serial = common::serial_hex(issued);
    let stored = h
        .issuer
        .certificates()
        .get_by_serial(h.ca.id, &serial)
        .await
        .unwrap();
    assert_eq!(stored.subscriber_id, Some(h.subscriber.id));
}

#[tokio::test]
async fn accepts_base64_csr() {
    let h = common::harness().await;
    let client = client_pki();
    let config = h
        .est_config(
            format!("{}{}", client.intermediate.pem, client.root.pem),
            true,
        )
        .await;
    let csr = common::csr_base64("CN=api.example.com", &CsrOptions::default());

    let response = h
        .est()
        .simple_enroll(config.id, &csr, Some(&client.leaf.pem))
        .await
        .unwrap();

    let der = STANDARD.decode(response).unwrap();
    assert_eq!(pkcs7::certificates_from_der(&der).unwrap().len(), 1);
}

#[tokio::test]
async fn misordered_bundle_is_untrusted() {
    let h = common::harness().await;
    let client = client_pki();
    let config = h
        .est_config(
            format!("{}{}", client.root.pem, client.intermediate.pem),
            true,
        )
        .await;
    let csr = common::csr_pem("CN=api.example.com", &CsrOptions::default());

    let err = h
        .est()
        .simple_enroll(config.id, &csr, Some(&client.leaf.pem))
        .await
        .unwrap_err();

    assert!(matches!(err, PkiError::UntrustedClient(_)));
    assert_eq!(err.kind(), ErrorKind::Trust);
}

#[tokio::test]
async fn client_from_another_hierarchy_is_untrusted() {
    let h = common::harness().await;
    let client = client_pki();
    let config = h.est_config(h.root.pem.clone(), true).await;
    let csr = common::csr_pem("CN=api.example.com", &CsrOptions::default());

    let err = h
        .est()
        .simple_enroll(config.id, &csr, Some(&client.leaf.pem))
        .await
        .unwrap_err();
    assert!(matches!(err, PkiError::UntrustedClient(_)));
}

#[tokio::test]
async fn disabled_config_is_rejected() {
    let h = common::harness().await;
    let client = client_pki();
    let config = h.est_config(client.root.pem.clone(), false).await;
    let csr = common::csr_pem("CN=api.example.com", &CsrOptions::default());

    let err = h
        .est()
        .simple_enroll(config.id, &csr, Some(&client.leaf.pem))
        .await
        .unwrap_err();
    assert!(matches!(err, PkiError::EstDisabled));
}

#[tokio::test]
async fn missing_client_certificate_is_rejected() {
    let h = common::harness().await;
    let client = client_pki();
    let config = h.est_config(client.root.pem.clone(), true).await;
    let csr = common::csr_pem("CN=api.example.com", &CsrOptions::default());

    let err = h
        .est()
        .simple_enroll(config.id, &csr, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PkiError::MissingClientCertificate));

    let err = h
        .est()
        .simple_enroll(config.id, &csr, Some("no certificate here"))
        .await
        .unwrap_err();
    assert!(matches!(err, PkiError::MissingClientCertificate));
}

#[tokio::test]
async fn unknown_config_is_not_found() {
    let h = common::harness().await;
    let csr = common::csr_pem("CN=api.example.com", &CsrOptions::default());

    let err = h
        .est()
        .simple_enroll(Uuid::new_v4(), &csr, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn enrollment_ignores_direct_issuance_flag() {
    let h = common::harness().await;
    h.update_ca(UpdateCertificateAuthority {
        disable_direct_issuance: Some(true),
        ..Default::default()
    })
    .await;
    let client = client_pki();
    let config = h
        .est_config(
            format!("{}{}", client.intermediate.pem, client.root.pem),
            true,
        )
        .await;
    let csr = common::csr_pem("CN=api.example.com", &CsrOptions::default());

    let direct = h
        .subscribers(TestAuthorizer::default())
        .sign_certificate(
            &common::actor(),
            SignCertificateInput {
                project_id: h.project_id,
                subscriber_name: "api".into(),
                csr: csr.clone(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(direct, PkiError::DirectIssuanceDisabled));

    h.est()
        .simple_enroll(config.id, &csr, Some(&client.leaf.pem))
        .await
        .unwrap();

    let listed = h
        .issuer
        .certificates()
        .list_by_subscriber(h.subscriber.id, Pagination::default())
        .await
        .unwrap();
    assert_eq!(listed.total, 1);
}

#[tokio::test]
async fn policy_violation_surfaces_through_enrollment() {
    let h = common::harness().await;
    let client = client_pki();
    let config = h
        .est_config(
            format!("{}{}", client.intermediate.pem, client.root.pem),
            true,
        )
        .await;
    let csr = common::csr_pem(
        "CN=api.example.com",
        &CsrOptions {
            dns_names: vec!["evil.example.net"],
            ..Default::default()
        },
    );

    let err = h
        .est()
        .simple_enroll(config.id, &csr, Some(&client.leaf.pem))
        .await
        .unwrap_err();
    assert!(matches!(err, PkiError::SanNotAllowed { ref value } if value == "evil.example.net"));
}
