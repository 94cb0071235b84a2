//! Trust anchors for signature validation
//!
//! The anchor expresses what the caller already knows about the legitimate
//! signer, independently of whatever the document embeds. Validation modes,
//! strongest first: an exact certificate, a fingerprint allow-list, or no
//! identity binding at all ("validity-only").

use std::collections::HashSet;

use openssl::hash::MessageDigest;
use openssl::x509::X509;

use crate::error::{SignatureError, SignatureResult};
use crate::keys::KeyMaterial;

/// Caller-supplied expectation of the signer's identity
#[derive(Debug, Clone)]
pub enum TrustAnchor {
    /// Verify only with this certificate; embedded KeyInfo is ignored for
    /// trust purposes
    Certificate(X509),
    /// Accept an embedded certificate only if its SHA-1 fingerprint
    /// (lowercase hex over the DER encoding) is in this non-empty set
    Fingerprints(HashSet<String>),
    /// Accept whatever key the document embeds, with no identity binding.
    /// Weaker than the other modes: it proves the document is internally
    /// consistent, not who signed it.
    None,
}

impl TrustAnchor {
    /// Exact-certificate anchor from PEM data
    pub fn certificate_pem(pem_data: &[u8]) -> SignatureResult<Self> {
        let material = KeyMaterial::from_certificate_pem(pem_data)?;
        // from_certificate_pem always yields a certificate
        material
            .into_certificate()
            .map(TrustAnchor::Certificate)
            .ok_or_else(|| SignatureError::Configuration("PEM did not contain a certificate".into()))
    }

    /// Fingerprint-set anchor; an empty set can never match anything and is
    /// rejected as a configuration error rather than failing every document
    pub fn fingerprints<I, S>(fingerprints: I) -> SignatureResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: HashSet<String> = fingerprints
            .into_iter()
            .map(|f| f.as_ref().trim().to_ascii_lowercase())
            .collect();
        if set.is_empty() {
            return Err(SignatureError::Configuration(
                "fingerprint allow-list is empty".into(),
            ));
        }
        Ok(TrustAnchor::Fingerprints(set))
    }

    /// Validity-only anchor
    pub fn none() -> Self {
        TrustAnchor::None
    }

    /// Reject configurations that can never validate anything
    pub(crate) fn ensure_usable(&self) -> SignatureResult<()> {
        match self {
            TrustAnchor::Fingerprints(set) if set.is_empty() => Err(SignatureError::Configuration(
                "fingerprint allow-list is empty".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// SHA-1 fingerprint of a certificate's DER encoding, lowercase hex
pub fn sha1_fingerprint(certificate: &X509) -> SignatureResult<String> {
    let digest = certificate.digest(MessageDigest::sha1())?;
    Ok(hex::encode(digest))
}

/// Render a certificate subject as `CN="...",O="..."` for logs and errors
pub fn subject_name_string(certificate: &X509) -> String {
    certificate
        .subject_name()
        .entries()
        .map(|entry| {
            format!(
                "{}=\"{}\"",
                entry.object().nid().short_name().unwrap_or_default(),
                entry
                    .data()
                    .as_utf8()
                    .map(|d| d.to_string())
                    .unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}
