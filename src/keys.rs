//! Public key material resolution
//!
//! `KeyMaterial` normalizes the two key sources a `KeyInfo` block can carry,
//! an X.509 certificate or a raw RSA (modulus, exponent) pair, into a single
//! reusable public-key handle. Key material is never authoritative for the
//! signer's identity; that binding is the trust anchor's job.

use openssl::pkey::{PKey, Public};
use openssl::x509::X509;
use tracing::debug;

use crate::constants::{
    PEM_CERTIFICATE_TAG, PEM_TRUSTED_CERTIFICATE_TAG, PEM_X509_CERTIFICATE_TAG,
};
use crate::error::{SignatureError, SignatureResult};
use crate::utils::parse_and_validate_pem;

/// DER tag for an ASN.1 SEQUENCE
const DER_SEQUENCE: u8 = 0x30;
/// DER tag for an ASN.1 INTEGER
const DER_INTEGER: u8 = 0x02;
/// DER tag for an ASN.1 BIT STRING
const DER_BIT_STRING: u8 = 0x03;

/// AlgorithmIdentifier for rsaEncryption (OID 1.2.840.113549.1.1.1, NULL params)
const RSA_ALGORITHM_IDENTIFIER: [u8; 15] = [
    0x30, 0x0d, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01, 0x05, 0x00,
];

/// An immutable, reusable public-key handle with its certificate of origin
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    public_key: PKey<Public>,
    certificate: Option<X509>,
}

impl KeyMaterial {
    /// Import the public key of a DER-encoded X.509 certificate
    pub fn from_certificate_der(der: &[u8]) -> SignatureResult<Self> {
        let certificate = X509::from_der(der)?;
        let public_key = certificate.public_key()?;
        Ok(Self {
            public_key,
            certificate: Some(certificate),
        })
    }

    /// Import the public key of a PEM-encoded X.509 certificate
    pub fn from_certificate_pem(pem_data: &[u8]) -> SignatureResult<Self> {
        let pem = parse_and_validate_pem(
            pem_data,
            &[
                PEM_CERTIFICATE_TAG,
                PEM_X509_CERTIFICATE_TAG,
                PEM_TRUSTED_CERTIFICATE_TAG,
            ],
        )?;
        Self::from_certificate_der(pem.contents())
    }

    /// Wrap an already-parsed certificate
    pub fn from_certificate(certificate: X509) -> SignatureResult<Self> {
        let public_key = certificate.public_key()?;
        Ok(Self {
            public_key,
            certificate: Some(certificate),
        })
    }

    /// Reconstruct an RSA public key from raw big-endian (modulus, exponent)
    ///
    /// Builds the DER SubjectPublicKeyInfo structure and hands it to OpenSSL,
    /// so the resulting handle behaves exactly like a certificate-derived one.
    pub fn from_rsa_components(modulus: &[u8], exponent: &[u8]) -> SignatureResult<Self> {
        debug!(
            modulus_len = modulus.len(),
            exponent_len = exponent.len(),
            "reconstructing RSA public key from raw components"
        );
        let spki = rsa_public_key_spki(modulus, exponent)?;
        let public_key = PKey::public_key_from_der(&spki)?;
        Ok(Self {
            public_key,
            certificate: None,
        })
    }

    /// The normalized public-key handle
    pub fn public_key(&self) -> &PKey<Public> {
        &self.public_key
    }

    /// The originating certificate, when the key came from one
    pub fn certificate(&self) -> Option<&X509> {
        self.certificate.as_ref()
    }

    /// Consume, yielding the certificate if any
    pub fn into_certificate(self) -> Option<X509> {
        self.certificate
    }
}

/// Encode a DER length in short or long form
///
/// Lengths of 65536 and above would need a three-byte long form, which the
/// key reconstruction path has no legitimate use for, so they are rejected.
fn encode_der_length(len: usize) -> SignatureResult<Vec<u8>> {
    if len < 128 {
        Ok(vec![len as u8])
    } else if len < 256 {
        Ok(vec![0x81, len as u8])
    } else if len < 65536 {
        Ok(vec![0x82, (len >> 8) as u8, (len & 0xff) as u8])
    } else {
        Err(SignatureError::Encoding(format!(
            "DER length {len} exceeds representable range"
        )))
    }
}

/// Tag-length-value assembly for a single DER element
fn encode_der_tlv(tag: u8, content: &[u8]) -> SignatureResult<Vec<u8>> {
    let mut out = Vec::with_capacity(content.len() + 4);
    out.push(tag);
    out.extend(encode_der_length(content.len())?);
    out.extend_from_slice(content);
    Ok(out)
}

/// DER INTEGER from an unsigned big-endian byte string
fn encode_der_unsigned_integer(value: &[u8]) -> SignatureResult<Vec<u8>> {
    // Strip redundant leading zeros, then restore one if the value would
    // otherwise read as negative
    let mut stripped: &[u8] = value;
    while stripped.len() > 1 && stripped[0] == 0 {
        stripped = &stripped[1..];
    }

    let mut content = Vec::with_capacity(stripped.len() + 1);
    if stripped.is_empty() || stripped[0] & 0x80 != 0 {
        content.push(0x00);
    }
    content.extend_from_slice(stripped);
    encode_der_tlv(DER_INTEGER, &content)
}

/// DER SubjectPublicKeyInfo for an RSA public key:
/// SEQUENCE { AlgorithmIdentifier, BIT STRING { SEQUENCE { INTEGER n, INTEGER e } } }
pub(crate) fn rsa_public_key_spki(modulus: &[u8], exponent: &[u8]) -> SignatureResult<Vec<u8>> {
    let mut rsa_key = Vec::new();
    rsa_key.extend(encode_der_unsigned_integer(modulus)?);
    rsa_key.extend(encode_der_unsigned_integer(exponent)?);
    let rsa_key_sequence = encode_der_tlv(DER_SEQUENCE, &rsa_key)?;

    // BIT STRING content starts with the unused-bits count, always zero here
    let mut bit_string_content = Vec::with_capacity(rsa_key_sequence.len() + 1);
    bit_string_content.push(0x00);
    bit_string_content.extend(rsa_key_sequence);
    let bit_string = encode_der_tlv(DER_BIT_STRING, &bit_string_content)?;

    let mut spki = Vec::with_capacity(RSA_ALGORITHM_IDENTIFIER.len() + bit_string.len());
    spki.extend_from_slice(&RSA_ALGORITHM_IDENTIFIER);
    spki.extend(bit_string);
    encode_der_tlv(DER_SEQUENCE, &spki)
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::rsa::Rsa;

    #[test]
    fn test_der_length_short_form() {
        assert_eq!(encode_der_length(0).unwrap(), vec![0]);
        assert_eq!(encode_der_length(127).unwrap(), vec![127]);
    }

    #[test]
    fn test_der_length_one_byte_long_form() {
        assert_eq!(encode_der_length(128).unwrap(), vec![0x81, 128]);
        assert_eq!(encode_der_length(255).unwrap(), vec![0x81, 255]);
    }

    #[test]
    fn test_der_length_two_byte_long_form() {
        assert_eq!(encode_der_length(256).unwrap(), vec![0x82, 0x01, 0x00]);
        assert_eq!(encode_der_length(65535).unwrap(), vec![0x82, 0xff, 0xff]);
    }

    #[test]
    fn test_der_length_beyond_two_bytes_is_rejected() {
        assert!(matches!(
            encode_der_length(65536),
            Err(SignatureError::Encoding(_))
        ));
    }

    #[test]
    fn test_der_integer_msb_padding() {
        // High bit set requires a 0x00 pad so the value stays non-negative
        assert_eq!(
            encode_der_unsigned_integer(&[0x80]).unwrap(),
            vec![0x02, 0x02, 0x00, 0x80]
        );
        assert_eq!(
            encode_der_unsigned_integer(&[0x7f]).unwrap(),
            vec![0x02, 0x01, 0x7f]
        );
        // Redundant leading zeros collapse
        assert_eq!(
            encode_der_unsigned_integer(&[0x00, 0x00, 0x01]).unwrap(),
            vec![0x02, 0x01, 0x01]
        );
    }

    #[test]
    fn test_reconstructed_key_matches_original() {
        let rsa = Rsa::generate(2048).unwrap();
        let original = PKey::from_rsa(rsa.clone()).unwrap();

        let material =
            KeyMaterial::from_rsa_components(&rsa.n().to_vec(), &rsa.e().to_vec()).unwrap();

        assert!(material.public_key().public_eq(&original));
        assert!(material.certificate().is_none());
    }

    #[test]
    fn test_spki_crosses_length_boundaries() {
        // A 2048-bit modulus already needs the 0x82 two-byte outer length;
        // a tiny one stays in short form. Both must parse back through OpenSSL.
        let rsa = Rsa::generate(2048).unwrap();
        let spki = rsa_public_key_spki(&rsa.n().to_vec(), &rsa.e().to_vec()).unwrap();
        assert_eq!(spki[1], 0x82);
        assert!(PKey::public_key_from_der(&spki).is_ok());

        // Synthetic moduli exercising the representable-range ceiling
        assert!(rsa_public_key_spki(&vec![0x55; 200], &[0x01, 0x00, 0x01]).is_ok());
        assert!(matches!(
            rsa_public_key_spki(&vec![0x55; 70_000], &[0x01, 0x00, 0x01]),
            Err(SignatureError::Encoding(_))
        ));
    }
}
