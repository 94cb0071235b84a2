//! Error taxonomy for the signature engine
//!
//! Every variant means "reject the document"; callers must not retry a failed
//! verification, since the input bytes will not become valid on a second pass.

use openssl::error::ErrorStack;
use thiserror::Error;

pub type SignatureResult<T> = Result<T, SignatureError>;

/// Error type for signing and validation operations
#[derive(Debug, Error)]
pub enum SignatureError {
    /// Invalid caller-supplied configuration (empty fingerprint allow-list,
    /// unusable private key, ...), detected before documents are inspected
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An algorithm URI is not on the explicit allow-list
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A required node of the Signature structure is absent or unusable
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// The document contains no Signature element
    #[error("no signature element found in document")]
    MissingSignature,

    /// Recomputed reference digest differs from the declared DigestValue
    #[error("digest value does not match signed content")]
    DigestMismatch,

    /// The embedded signer identity is not covered by the trust anchor
    #[error("signer identity rejected by trust anchor: {0}")]
    TrustMismatch(String),

    /// The asymmetric signature check over SignedInfo failed
    #[error("cryptographic signature verification failed")]
    CryptoVerification,

    /// A DER length exceeded the representable range during key reconstruction
    #[error("DER encoding error: {0}")]
    Encoding(String),

    /// The canonicalization primitive failed; never silently approximated
    #[error("canonicalization failed: {0}")]
    Canonicalization(String),

    /// XML (de)serialization failure while building or rewriting markup
    #[error("XML serialization failed: {0}")]
    Serialization(String),

    /// The document or a subtree is not well-formed XML
    #[error("malformed XML document: {0}")]
    Xml(#[from] xmltree::ParseError),

    /// Base64 content (DigestValue, SignatureValue, certificates) is invalid
    #[error("base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Internal OpenSSL error
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] ErrorStack),
}
