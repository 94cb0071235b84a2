mod common;

use common::generate_test_certificates;
use openssl::x509::X509;
use xmldsig::trust::sha1_fingerprint;
use xmldsig::{
    SignatureError, TrustAnchor, XmlSignatureSigner, XmlSignatureValidator, xml,
};

const DOC: &str = r#"<doc><assertion ID="a1"><attr>value</attr></assertion></doc>"#;

#[test]
fn fingerprint_allow_list_accepts_listed_certificate() {
    let certs = generate_test_certificates();
    let signer = XmlSignatureSigner::new(&certs.key_pem, &certs.cert_pem).unwrap();
    let mut doc = xml::parse(DOC).unwrap();
    signer.sign_node(&mut doc, "a1").unwrap();
    let signed = xml::serialize(&doc).unwrap();

    let certificate = X509::from_pem(&certs.cert_pem).unwrap();
    let anchor = TrustAnchor::fingerprints([sha1_fingerprint(&certificate).unwrap()]).unwrap();

    let validator = XmlSignatureValidator::new(&signed, "ID", anchor).unwrap();
    let result = validator.verify().unwrap();
    assert_eq!(result.reference_uri(), "#a1");
    assert!(result.x509_certificate().is_some());
}

#[test]
fn unlisted_fingerprint_is_a_trust_mismatch() {
    let certs = generate_test_certificates();
    let signer = XmlSignatureSigner::new(&certs.key_pem, &certs.cert_pem).unwrap();
    let mut doc = xml::parse(DOC).unwrap();
    signer.sign_node(&mut doc, "a1").unwrap();
    let signed = xml::serialize(&doc).unwrap();

    let other = generate_test_certificates();
    let other_certificate = X509::from_pem(&other.cert_pem).unwrap();
    let anchor =
        TrustAnchor::fingerprints([sha1_fingerprint(&other_certificate).unwrap()]).unwrap();

    let validator = XmlSignatureValidator::new(&signed, "ID", anchor).unwrap();
    assert!(matches!(
        validator.verify(),
        Err(SignatureError::TrustMismatch(_))
    ));
}

#[test]
fn fingerprint_mode_requires_an_embedded_certificate() {
    // A raw-RSA signature carries no X509Certificate for a fingerprint to
    // match against
    let certs = generate_test_certificates();
    let signer = XmlSignatureSigner::without_certificates(&certs.key_pem).unwrap();
    let mut doc = xml::parse(DOC).unwrap();
    signer.sign_node(&mut doc, "a1").unwrap();
    let signed = xml::serialize(&doc).unwrap();

    let anchor = TrustAnchor::fingerprints(["da39a3ee5e6b4b0d3255bfef95601890afd80709"]).unwrap();
    let validator = XmlSignatureValidator::new(&signed, "ID", anchor).unwrap();
    assert!(matches!(
        validator.verify(),
        Err(SignatureError::MalformedSignature(_))
    ));
}

#[test]
fn fingerprint_matching_is_case_insensitive() {
    let certs = generate_test_certificates();
    let signer = XmlSignatureSigner::new(&certs.key_pem, &certs.cert_pem).unwrap();
    let mut doc = xml::parse(DOC).unwrap();
    signer.sign_node(&mut doc, "a1").unwrap();
    let signed = xml::serialize(&doc).unwrap();

    let certificate = X509::from_pem(&certs.cert_pem).unwrap();
    let uppercase = sha1_fingerprint(&certificate).unwrap().to_uppercase();
    let anchor = TrustAnchor::fingerprints([uppercase]).unwrap();

    let validator = XmlSignatureValidator::new(&signed, "ID", anchor).unwrap();
    assert!(validator.verify().is_ok());
}
