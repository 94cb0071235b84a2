//! Data structures for XML signature processing
//!
//! The serde structs mirror the XML-DSig wire shape and are what the signer
//! serializes; building `SignedInfo` as a node and canonicalizing it keeps
//! attribute and namespace serialization out of the signed bytes.

use openssl::hash::MessageDigest;
use openssl::x509::X509;
use serde::Serialize;
use xmltree::Element;

use crate::constants::*;
use crate::error::{SignatureError, SignatureResult};

/// Generic XML element with an Algorithm attribute
#[derive(Debug, Clone, Serialize)]
pub struct AlgorithmElement {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,
}

// Type aliases for better readability
pub type CanonicalizationMethod = AlgorithmElement;
pub type SignatureMethod = AlgorithmElement;
pub type DigestMethod = AlgorithmElement;
pub type Transform = AlgorithmElement;

/// XML transforms container
#[derive(Debug, Clone, Serialize)]
pub struct Transforms {
    #[serde(rename = "Transform")]
    pub transforms: Vec<Transform>,
}

/// XML reference element
#[derive(Debug, Clone, Serialize)]
pub struct Reference {
    #[serde(rename = "@URI")]
    pub uri: String,
    #[serde(rename = "Transforms")]
    pub transforms: Transforms,
    #[serde(rename = "DigestMethod")]
    pub digest_method: DigestMethod,
    #[serde(rename = "DigestValue")]
    pub digest_value: String,
}

/// XML SignedInfo element with optional namespace declaration
///
/// The namespace is emitted when SignedInfo is serialized standalone for
/// canonicalization and omitted when nested under Signature, which already
/// declares it.
#[derive(Debug, Serialize)]
pub struct SignedInfo {
    #[serde(rename = "@xmlns", skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,
    #[serde(rename = "CanonicalizationMethod")]
    pub canonicalization_method: CanonicalizationMethod,
    #[serde(rename = "SignatureMethod")]
    pub signature_method: SignatureMethod,
    #[serde(rename = "Reference")]
    pub reference: Reference,
}

/// XML SignatureValue element
#[derive(Debug, Serialize)]
pub struct SignatureValue {
    #[serde(rename = "$text")]
    pub value: String,
}

/// XML X509Certificate element
#[derive(Debug, Serialize)]
pub struct X509Certificate {
    #[serde(rename = "$text")]
    pub certificate: String,
}

/// XML X509Data element carrying the certificate chain in signer order
#[derive(Debug, Serialize)]
pub struct X509Data {
    #[serde(rename = "X509Certificate")]
    pub certificates: Vec<X509Certificate>,
}

/// XML RSAKeyValue element (raw public key, base64 big-endian integers)
#[derive(Debug, Serialize)]
pub struct RsaKeyValue {
    #[serde(rename = "Modulus")]
    pub modulus: String,
    #[serde(rename = "Exponent")]
    pub exponent: String,
}

/// XML KeyValue element
#[derive(Debug, Serialize)]
pub struct KeyValue {
    #[serde(rename = "RSAKeyValue")]
    pub rsa_key_value: RsaKeyValue,
}

/// XML KeyInfo element: either an X.509 chain or a raw RSA public key
#[derive(Debug, Serialize)]
pub struct KeyInfo {
    #[serde(rename = "X509Data", skip_serializing_if = "Option::is_none")]
    pub x509_data: Option<X509Data>,
    #[serde(rename = "KeyValue", skip_serializing_if = "Option::is_none")]
    pub key_value: Option<KeyValue>,
}

/// Complete XML Signature element
#[derive(Debug, Serialize)]
pub struct Signature {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    #[serde(rename = "SignedInfo")]
    pub signed_info: SignedInfo,
    #[serde(rename = "SignatureValue")]
    pub signature_value: SignatureValue,
    #[serde(rename = "KeyInfo")]
    pub key_info: KeyInfo,
}

/// Supported signature/digest algorithm suites
///
/// The allow-list is enumerated explicitly; SHA-256 support is a deliberate
/// addition next to the SHA-1 suite, never inferred from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureSuite {
    RsaSha1,
    RsaSha256,
}

impl SignatureSuite {
    /// Signature algorithm URI
    pub fn signature_uri(&self) -> &'static str {
        match self {
            SignatureSuite::RsaSha1 => RSA_SHA1_ALGORITHM,
            SignatureSuite::RsaSha256 => RSA_SHA256_ALGORITHM,
        }
    }

    /// Digest algorithm URI
    pub fn digest_uri(&self) -> &'static str {
        match self {
            SignatureSuite::RsaSha1 => SHA1_DIGEST_ALGORITHM,
            SignatureSuite::RsaSha256 => SHA256_DIGEST_ALGORITHM,
        }
    }

    /// Canonicalization algorithm URI; both suites use exclusive C14N
    pub fn canonicalization_uri(&self) -> &'static str {
        EXCLUSIVE_C14N_ALGORITHM
    }

    /// Message digest backing the suite
    pub fn message_digest(&self) -> MessageDigest {
        match self {
            SignatureSuite::RsaSha1 => MessageDigest::sha1(),
            SignatureSuite::RsaSha256 => MessageDigest::sha256(),
        }
    }
}

/// Map a DigestMethod URI to a digest, rejecting anything off the allow-list
pub fn digest_for_method(uri: &str) -> SignatureResult<MessageDigest> {
    match uri {
        SHA1_DIGEST_ALGORITHM => Ok(MessageDigest::sha1()),
        SHA256_DIGEST_ALGORITHM => Ok(MessageDigest::sha256()),
        other => Err(SignatureError::UnsupportedAlgorithm(other.to_string())),
    }
}

/// Map a SignatureMethod URI to the digest it signs with
pub fn digest_for_signature_method(uri: &str) -> SignatureResult<MessageDigest> {
    match uri {
        RSA_SHA1_ALGORITHM => Ok(MessageDigest::sha1()),
        RSA_SHA256_ALGORITHM => Ok(MessageDigest::sha256()),
        other => Err(SignatureError::UnsupportedAlgorithm(other.to_string())),
    }
}

/// SignedInfo contents parsed once per validation, before any cryptography
#[derive(Debug, Clone)]
pub struct SignedInfoDescriptor {
    pub canonicalization_method: String,
    pub signature_method: String,
    pub digest_method: String,
    pub reference_uri: String,
    pub reference_transforms: Vec<String>,
    /// Declared DigestValue as embedded (base64); decoded only after the
    /// algorithm allow-list has been checked
    pub digest_value: String,
}

/// Outcome of a successful verification
#[derive(Debug)]
pub struct VerificationResult {
    reference_uri: String,
    certificate: Option<X509>,
    id_attribute: String,
}

impl VerificationResult {
    pub(crate) fn new(
        reference_uri: String,
        certificate: Option<X509>,
        id_attribute: String,
    ) -> Self {
        Self {
            reference_uri,
            certificate,
            id_attribute,
        }
    }

    /// URI of the Reference that was cryptographically covered
    pub fn reference_uri(&self) -> &str {
        &self.reference_uri
    }

    /// Certificate whose key verified the signature, when one was involved
    pub fn x509_certificate(&self) -> Option<&X509> {
        self.certificate.as_ref()
    }

    /// Whether `node` is the element this signature actually covers
    ///
    /// A `false` answer is an expected negative outcome ("signature valid,
    /// but this is not the signed node"), not a processing failure. Used to
    /// refuse signatures wrapped around a different element than the caller
    /// intends to consume.
    pub fn is_node_validated(&self, node: &Element) -> bool {
        let expected = self
            .reference_uri
            .strip_prefix('#')
            .unwrap_or(&self.reference_uri);
        if expected.is_empty() {
            return false;
        }
        node.attributes.get(&self.id_attribute).map(String::as_str) == Some(expected)
    }
}
