//! XML signature validator
//!
//! Extracts the single `<Signature>` of a document, recomputes the reference
//! digest through the declared transform pipeline and cryptographically
//! verifies `SignatureValue` over the canonical `SignedInfo`, under the trust
//! semantics selected by the caller's [`TrustAnchor`].
//!
//! Verification is single-shot with no retries: every failure means the
//! document is rejected, and digest equality and signature verification are
//! both mandatory and independent.

use tracing::{debug, warn};
use xmltree::Element;

use crate::constants::*;
use crate::error::{SignatureError, SignatureResult};
use crate::keys::KeyMaterial;
use crate::transforms::TransformRegistry;
use crate::trust::{TrustAnchor, sha1_fingerprint, subject_name_string};
use crate::types::{
    SignedInfoDescriptor, VerificationResult, digest_for_method, digest_for_signature_method,
};
use crate::utils::decode_base64;
use crate::xml;

/// Validates the XML signature of one document against a trust anchor
///
/// The document is held twice: parsed, for structural inspection, and as the
/// original text, which is what digests are recomputed from. Re-serializing
/// a parsed tree can lose lexical detail such as attribute prefixes, and a
/// digest over anything but the signer's bytes is worthless.
pub struct XmlSignatureValidator {
    text: String,
    document: Element,
    id_attribute: String,
    trust: TrustAnchor,
    registry: TransformRegistry,
}

impl XmlSignatureValidator {
    /// Create a validator for `document`
    ///
    /// `id_attribute` names the attribute that identifies signable elements
    /// (`ID` for SAML assertions). An unusable trust configuration is
    /// rejected here, before the document is even parsed.
    pub fn new(
        document: &str,
        id_attribute: impl Into<String>,
        trust: TrustAnchor,
    ) -> SignatureResult<Self> {
        trust.ensure_usable()?;
        let parsed = xml::parse(document)?;
        Ok(Self {
            text: document.to_string(),
            document: parsed,
            id_attribute: id_attribute.into(),
            trust,
            registry: TransformRegistry::standard(),
        })
    }

    /// Inject a custom transform registry
    pub fn with_registry(mut self, registry: TransformRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Verify the document's signature
    ///
    /// On success the result names the Reference URI that was actually
    /// covered and the certificate involved, if any; callers are expected to
    /// bind that URI back to the element they mean to consume (see
    /// [`VerificationResult::is_node_validated`]).
    pub fn verify(&self) -> SignatureResult<VerificationResult> {
        let signature = xml::find_signature(&self.document)?;

        let (descriptor, signature_value_b64) = parse_descriptor(signature)?;
        self.check_allow_list(&descriptor)?;

        // Reference digest first; nothing cryptographic runs on a document
        // whose covered bytes already disagree with the declaration
        let declared_digest = decode_base64(&descriptor.digest_value)?;
        self.verify_reference_digest(&descriptor, &declared_digest)?;

        let material = self.resolve_key_material(signature)?;

        let canonical_signed_info = self.canonical_signed_info(&descriptor)?;
        let signature_value = decode_base64(&signature_value_b64)?;

        let digest = digest_for_signature_method(&descriptor.signature_method)?;
        let mut verifier = openssl::sign::Verifier::new(digest, material.public_key())?;
        if !verifier.verify_oneshot(&signature_value, &canonical_signed_info)? {
            warn!(
                reference_uri = %descriptor.reference_uri,
                "signature value does not verify over canonical SignedInfo"
            );
            return Err(SignatureError::CryptoVerification);
        }
        drop(verifier);

        debug!(
            reference_uri = %descriptor.reference_uri,
            "signature verified"
        );
        Ok(VerificationResult::new(
            descriptor.reference_uri,
            material.into_certificate(),
            self.id_attribute.clone(),
        ))
    }

    /// Reject any algorithm URI off the allow-list before cryptography runs
    fn check_allow_list(&self, descriptor: &SignedInfoDescriptor) -> SignatureResult<()> {
        if descriptor.canonicalization_method != EXCLUSIVE_C14N_ALGORITHM {
            return Err(SignatureError::UnsupportedAlgorithm(
                descriptor.canonicalization_method.clone(),
            ));
        }
        digest_for_signature_method(&descriptor.signature_method)?;
        digest_for_method(&descriptor.digest_method)?;
        for transform in &descriptor.reference_transforms {
            if !self.registry.supports(transform) {
                return Err(SignatureError::UnsupportedAlgorithm(transform.clone()));
            }
        }
        Ok(())
    }

    /// Dereference the Reference URI, run the declared transforms in order
    /// and require the recomputed digest to equal the declared one
    fn verify_reference_digest(
        &self,
        descriptor: &SignedInfoDescriptor,
        declared_digest: &[u8],
    ) -> SignatureResult<()> {
        let input = self.dereference(&descriptor.reference_uri)?.into_bytes();
        let transformed = self
            .registry
            .apply(&descriptor.reference_transforms, input)?;

        let digest = openssl::hash::hash(
            digest_for_method(&descriptor.digest_method)?,
            &transformed,
        )?;

        if digest.len() != declared_digest.len()
            || !openssl::memcmp::eq(&digest, declared_digest)
        {
            warn!(
                reference_uri = %descriptor.reference_uri,
                "recomputed reference digest differs from declared DigestValue"
            );
            return Err(SignatureError::DigestMismatch);
        }
        Ok(())
    }

    /// Resolve the Reference URI to the covered markup, taken verbatim from
    /// the input document
    fn dereference(&self, uri: &str) -> SignatureResult<String> {
        if uri.is_empty() {
            return Ok(self.text.clone());
        }
        let id = uri.strip_prefix('#').ok_or_else(|| {
            SignatureError::MalformedSignature(format!("unsupported reference URI: {uri}"))
        })?;
        xml::extract_identified_element(&self.text, &self.id_attribute, id)?.ok_or_else(|| {
            SignatureError::MalformedSignature(format!(
                "no element with {}=\"{id}\" to dereference",
                self.id_attribute
            ))
        })
    }

    /// Resolve the verification key under the configured trust semantics
    fn resolve_key_material(&self, signature: &Element) -> SignatureResult<KeyMaterial> {
        match &self.trust {
            // Exact-certificate mode: the embedded KeyInfo carries no
            // authority, only the caller-supplied certificate does
            TrustAnchor::Certificate(certificate) => {
                KeyMaterial::from_certificate(certificate.clone())
            }
            TrustAnchor::Fingerprints(allowed) => {
                let material = embedded_certificate(signature)?.ok_or_else(|| {
                    SignatureError::MalformedSignature(
                        "fingerprint trust requires an embedded X509Certificate".into(),
                    )
                })?;
                // from_certificate_der always yields a certificate
                let certificate = material.certificate().ok_or_else(|| {
                    SignatureError::MalformedSignature("embedded certificate unavailable".into())
                })?;
                let fingerprint = sha1_fingerprint(certificate)?;
                if !allowed.contains(&fingerprint) {
                    warn!(
                        subject = %subject_name_string(certificate),
                        %fingerprint,
                        "embedded certificate fingerprint is not allow-listed"
                    );
                    return Err(SignatureError::TrustMismatch(format!(
                        "certificate fingerprint {fingerprint} is not allow-listed"
                    )));
                }
                Ok(material)
            }
            // Validity-only mode: no identity binding at all
            TrustAnchor::None => match embedded_certificate(signature)? {
                Some(material) => Ok(material),
                None => embedded_rsa_key(signature)?.ok_or_else(|| {
                    SignatureError::MalformedSignature(
                        "KeyInfo carries neither a certificate nor an RSA key".into(),
                    )
                }),
            },
        }
    }

    /// Canonicalize the SignedInfo markup per its declared method
    ///
    /// The markup is taken verbatim from the Signature element, with the
    /// namespace declarations its scope contributes made explicit; exclusive
    /// canonicalization drops whichever turn out unused.
    fn canonical_signed_info(&self, descriptor: &SignedInfoDescriptor) -> SignatureResult<Vec<u8>> {
        let signature = xml::extract_dsig_element(&self.text, SIGNATURE_ELEMENT)?
            .ok_or(SignatureError::MissingSignature)?;
        let signed_info =
            xml::extract_dsig_child(&signature, SIGNED_INFO_ELEMENT)?.ok_or_else(|| {
                SignatureError::MalformedSignature("SignedInfo element is missing".into())
            })?;

        self.registry
            .get(&descriptor.canonicalization_method)?
            .apply(signed_info.as_bytes())
    }
}

/// Parse the SignedInfo descriptor and the SignatureValue out of a
/// `Signature` element, failing on any missing required node
fn parse_descriptor(signature: &Element) -> SignatureResult<(SignedInfoDescriptor, String)> {
    let signed_info = required_child(signature, SIGNED_INFO_ELEMENT)?;

    let canonicalization_method =
        algorithm_attribute(required_child(signed_info, CANONICALIZATION_METHOD_ELEMENT)?)?;
    let signature_method =
        algorithm_attribute(required_child(signed_info, SIGNATURE_METHOD_ELEMENT)?)?;

    let reference = required_child(signed_info, REFERENCE_ELEMENT)?;
    let reference_uri = reference
        .attributes
        .get(URI_ATTRIBUTE)
        .cloned()
        .unwrap_or_default();

    let reference_transforms = match xml::dsig_child(reference, TRANSFORMS_ELEMENT) {
        Some(transforms) => transforms
            .children
            .iter()
            .filter_map(|node| node.as_element())
            .filter(|e| e.name == TRANSFORM_ELEMENT)
            .map(algorithm_attribute)
            .collect::<SignatureResult<Vec<_>>>()?,
        None => Vec::new(),
    };

    let digest_method = algorithm_attribute(required_child(reference, DIGEST_METHOD_ELEMENT)?)?;
    let digest_value = required_text(required_child(reference, DIGEST_VALUE_ELEMENT)?)?;
    let signature_value = required_text(required_child(signature, SIGNATURE_VALUE_ELEMENT)?)?;

    Ok((
        SignedInfoDescriptor {
            canonicalization_method,
            signature_method,
            digest_method,
            reference_uri,
            reference_transforms,
            digest_value,
        },
        signature_value,
    ))
}

fn required_child<'a>(parent: &'a Element, name: &str) -> SignatureResult<&'a Element> {
    xml::dsig_child(parent, name).ok_or_else(|| {
        SignatureError::MalformedSignature(format!("{name} element is missing"))
    })
}

fn required_text(element: &Element) -> SignatureResult<String> {
    xml::element_text(element).filter(|t| !t.is_empty()).ok_or_else(|| {
        SignatureError::MalformedSignature(format!("{} element is empty", element.name))
    })
}

fn algorithm_attribute(element: &Element) -> SignatureResult<String> {
    element
        .attributes
        .get(ALGORITHM_ATTRIBUTE)
        .cloned()
        .ok_or_else(|| {
            SignatureError::MalformedSignature(format!(
                "{} element has no Algorithm attribute",
                element.name
            ))
        })
}

/// First embedded `KeyInfo/X509Data/X509Certificate`, as key material
fn embedded_certificate(signature: &Element) -> SignatureResult<Option<KeyMaterial>> {
    let Some(key_info) = xml::dsig_child(signature, KEY_INFO_ELEMENT) else {
        return Ok(None);
    };
    let Some(x509_data) = xml::dsig_child(key_info, X509_DATA_ELEMENT) else {
        return Ok(None);
    };
    let Some(certificate) = xml::dsig_child(x509_data, X509_CERTIFICATE_ELEMENT) else {
        return Ok(None);
    };

    let der = decode_base64(&required_text(certificate)?)?;
    KeyMaterial::from_certificate_der(&der).map(Some)
}

/// Embedded `KeyInfo/KeyValue/RSAKeyValue`, reconstructed into key material
fn embedded_rsa_key(signature: &Element) -> SignatureResult<Option<KeyMaterial>> {
    let Some(key_info) = xml::dsig_child(signature, KEY_INFO_ELEMENT) else {
        return Ok(None);
    };
    let Some(key_value) = xml::dsig_child(key_info, KEY_VALUE_ELEMENT) else {
        return Ok(None);
    };
    let Some(rsa) = xml::dsig_child(key_value, RSA_KEY_VALUE_ELEMENT) else {
        return Ok(None);
    };

    let modulus = decode_base64(&required_text(required_child(rsa, MODULUS_ELEMENT)?)?)?;
    let exponent = decode_base64(&required_text(required_child(rsa, EXPONENT_ELEMENT)?)?)?;
    KeyMaterial::from_rsa_components(&modulus, &exponent).map(Some)
}
