use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509, X509Builder, X509Name, X509NameBuilder};

#[derive(Debug, Clone)]
pub struct TestCertificates {
    pub cert_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
}

/// Generate a self-signed RSA-2048 signing certificate for tests.
pub fn generate_test_certificates() -> TestCertificates {
    let rsa = Rsa::generate(2048).unwrap();
    let key_pair = PKey::from_rsa(rsa).unwrap();
    let cert = build_certificate(&key_pair);

    TestCertificates {
        cert_pem: cert.to_pem().unwrap(),
        key_pem: key_pair.private_key_to_pem_pkcs8().unwrap(),
    }
}

fn build_certificate(key_pair: &PKey<Private>) -> X509 {
    let mut cert_builder = X509Builder::new().unwrap();

    cert_builder.set_version(2).unwrap();
    cert_builder
        .set_serial_number(&generate_serial_number())
        .unwrap();

    let subject_name = create_x509_name(&[
        ("C", "CM"),
        ("O", "Test Organization"),
        ("CN", "Test Signing Certificate"),
    ]);
    cert_builder.set_subject_name(&subject_name).unwrap();
    cert_builder.set_issuer_name(&subject_name).unwrap();

    cert_builder.set_pubkey(key_pair).unwrap();

    // Validity period (1 year)
    let not_before = Asn1Time::days_from_now(0).unwrap();
    let not_after = Asn1Time::days_from_now(365).unwrap();
    cert_builder.set_not_before(&not_before).unwrap();
    cert_builder.set_not_after(&not_after).unwrap();

    cert_builder
        .append_extension(BasicConstraints::new().build().unwrap())
        .unwrap();
    cert_builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .build()
                .unwrap(),
        )
        .unwrap();

    cert_builder
        .sign(key_pair, MessageDigest::sha256())
        .unwrap();
    cert_builder.build()
}

fn generate_serial_number() -> Asn1Integer {
    let mut serial = BigNum::new().unwrap();
    serial.rand(128, MsbOption::MAYBE_ZERO, false).unwrap();
    serial.to_asn1_integer().unwrap()
}

fn create_x509_name(entries: &[(&str, &str)]) -> X509Name {
    let mut name_builder = X509NameBuilder::new().unwrap();
    for (key, value) in entries {
        name_builder.append_entry_by_text(key, value).unwrap();
    }
    name_builder.build()
}
