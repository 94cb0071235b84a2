//! XML signature signer
//!
//! Produces a complete enveloped `<Signature>` element over a chosen subtree
//! and inserts it at a caller-chosen location. All key handling and
//! cryptography happen before the tree is touched, so a failed call never
//! leaves a half-built signature behind.

use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use tracing::debug;
use xmltree::{Element, XMLNode};

use crate::constants::{
    DEFAULT_ID_ATTRIBUTE, ENVELOPED_SIGNATURE_TRANSFORM, PEM_CERTIFICATE_TAG,
    PEM_PRIVATE_KEY_TAG, PEM_RSA_PRIVATE_KEY_TAG, XMLDSIG_NAMESPACE,
};
use crate::error::{SignatureError, SignatureResult};
use crate::transforms::TransformRegistry;
use crate::types::{
    AlgorithmElement, KeyInfo, KeyValue, Reference, RsaKeyValue, Signature, SignatureSuite,
    SignatureValue, SignedInfo, Transforms, X509Certificate, X509Data,
};
use crate::utils::{encode_base64, parse_and_validate_pem};
use crate::xml;

/// Signs XML subtrees with an RSA key and an optional certificate chain
pub struct XmlSignatureSigner {
    key: PKey<Private>,
    chain: Vec<X509>,
    suite: SignatureSuite,
    registry: TransformRegistry,
    id_attribute: String,
}

impl XmlSignatureSigner {
    /// Create a signer from a PEM private key and a PEM certificate chain
    ///
    /// The chain is embedded in `KeyInfo` in the order supplied here, leaf
    /// first by convention. An unusable key or empty chain is rejected now,
    /// before any document is touched.
    pub fn new(
        private_key_pem: impl AsRef<[u8]>,
        certificate_chain_pem: impl AsRef<[u8]>,
    ) -> SignatureResult<Self> {
        let chain = parse_certificate_chain(certificate_chain_pem.as_ref())?;
        if chain.is_empty() {
            return Err(SignatureError::Configuration(
                "certificate chain contains no certificates".into(),
            ));
        }
        Self::build(private_key_pem.as_ref(), chain)
    }

    /// Create a signer with no certificates; `KeyInfo` will carry the raw
    /// RSA public key as `KeyValue/RSAKeyValue` instead of an X.509 chain
    pub fn without_certificates(private_key_pem: impl AsRef<[u8]>) -> SignatureResult<Self> {
        Self::build(private_key_pem.as_ref(), Vec::new())
    }

    fn build(private_key_pem: &[u8], chain: Vec<X509>) -> SignatureResult<Self> {
        parse_and_validate_pem(
            private_key_pem,
            &[PEM_PRIVATE_KEY_TAG, PEM_RSA_PRIVATE_KEY_TAG],
        )?;
        let key = PKey::private_key_from_pem(private_key_pem).map_err(|e| {
            SignatureError::Configuration(format!("failed to load private key: {e}"))
        })?;
        // Both supported suites are RSA; refuse other key types up front
        key.rsa().map_err(|_| {
            SignatureError::Configuration("signing key is not an RSA key".into())
        })?;

        Ok(Self {
            key,
            chain,
            suite: SignatureSuite::RsaSha1,
            registry: TransformRegistry::standard(),
            id_attribute: DEFAULT_ID_ATTRIBUTE.to_string(),
        })
    }

    /// Select the signature/digest suite (default: RSA-SHA1, the reference
    /// behavior)
    pub fn with_suite(mut self, suite: SignatureSuite) -> Self {
        self.suite = suite;
        self
    }

    /// Name of the attribute identifying signable elements (default `ID`)
    pub fn with_id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.id_attribute = attribute.into();
        self
    }

    /// Inject a custom transform registry
    pub fn with_registry(mut self, registry: TransformRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Sign `subtree` and append the resulting `Signature` element to
    /// `insertion_parent`
    ///
    /// The Reference URI is `#<id>` when the subtree carries the configured
    /// identifying attribute, the whole-document URI `""` otherwise. For the
    /// declared enveloped-signature transform to hold at validation time, the
    /// insertion parent must lie within the signed subtree (or be the
    /// document root for whole-document references).
    pub fn sign(&self, subtree: &Element, insertion_parent: &mut Element) -> SignatureResult<()> {
        let signature = self.build_signature(subtree)?;
        insertion_parent.children.push(XMLNode::Element(signature));
        Ok(())
    }

    /// Sign the element carrying `id` and insert the signature inside it
    pub fn sign_node(&self, root: &mut Element, id: &str) -> SignatureResult<()> {
        let subtree = xml::find_by_id(root, &self.id_attribute, id)
            .cloned()
            .ok_or_else(|| {
                SignatureError::MalformedSignature(format!(
                    "no element with {}=\"{id}\" to sign",
                    self.id_attribute
                ))
            })?;
        let signature = self.build_signature(&subtree)?;

        // find_by_id succeeded above, so the mutable lookup cannot miss
        let target = xml::find_by_id_mut(root, &self.id_attribute, id).ok_or_else(|| {
            SignatureError::MalformedSignature(format!("signed element {id} disappeared"))
        })?;
        target.children.push(XMLNode::Element(signature));
        Ok(())
    }

    /// Sign a whole document and return it with the signature appended inside
    /// the root element
    pub fn sign_enveloped(&self, document: &str) -> SignatureResult<String> {
        let mut root = xml::parse(document)?;
        let signature = self.build_signature(&root)?;
        root.children.push(XMLNode::Element(signature));
        xml::serialize(&root)
    }

    /// Assemble the complete `Signature` element for `subtree` without
    /// mutating anything
    fn build_signature(&self, subtree: &Element) -> SignatureResult<Element> {
        let c14n = self.registry.get(self.suite.canonicalization_uri())?;

        // Digest the canonical form of the subtree as it exists now, i.e.
        // without the signature that is about to be inserted
        let serialized = xml::serialize(subtree)?;
        let canonical = c14n.apply(serialized.as_bytes())?;
        let digest = openssl::hash::hash(self.suite.message_digest(), &canonical)?;

        let reference_uri = subtree
            .attributes
            .get(&self.id_attribute)
            .map(|id| format!("#{id}"))
            .unwrap_or_default();

        let reference = Reference {
            uri: reference_uri.clone(),
            transforms: Transforms {
                transforms: vec![
                    AlgorithmElement {
                        algorithm: ENVELOPED_SIGNATURE_TRANSFORM.to_string(),
                    },
                    AlgorithmElement {
                        algorithm: self.suite.canonicalization_uri().to_string(),
                    },
                ],
            },
            digest_method: AlgorithmElement {
                algorithm: self.suite.digest_uri().to_string(),
            },
            digest_value: encode_base64(&digest),
        };

        // SignedInfo is canonicalized as a node; serializing it through the
        // same pipeline the validator uses keeps attribute and namespace
        // ordering out of the signed bytes
        let signed_info = SignedInfo {
            xmlns: Some(XMLDSIG_NAMESPACE.to_string()),
            canonicalization_method: AlgorithmElement {
                algorithm: self.suite.canonicalization_uri().to_string(),
            },
            signature_method: AlgorithmElement {
                algorithm: self.suite.signature_uri().to_string(),
            },
            reference: reference.clone(),
        };
        let signed_info_xml = quick_xml::se::to_string(&signed_info)
            .map_err(|e| SignatureError::Serialization(e.to_string()))?;
        let canonical_signed_info = c14n.apply(signed_info_xml.as_bytes())?;

        let mut signer = openssl::sign::Signer::new(self.suite.message_digest(), &self.key)?;
        let signature_bytes = signer.sign_oneshot_to_vec(&canonical_signed_info)?;

        debug!(
            reference_uri = %reference_uri,
            suite = ?self.suite,
            "built signature over canonical subtree"
        );

        let signature = Signature {
            xmlns: XMLDSIG_NAMESPACE.to_string(),
            signed_info: SignedInfo {
                // The Signature element itself declares the namespace
                xmlns: None,
                canonicalization_method: AlgorithmElement {
                    algorithm: self.suite.canonicalization_uri().to_string(),
                },
                signature_method: AlgorithmElement {
                    algorithm: self.suite.signature_uri().to_string(),
                },
                reference,
            },
            signature_value: SignatureValue {
                value: encode_base64(&signature_bytes),
            },
            key_info: self.key_info()?,
        };

        let signature_xml = quick_xml::se::to_string(&signature)
            .map_err(|e| SignatureError::Serialization(e.to_string()))?;
        xml::parse(&signature_xml)
    }

    /// KeyInfo block: the certificate chain when one was supplied, the raw
    /// RSA public key otherwise
    fn key_info(&self) -> SignatureResult<KeyInfo> {
        if self.chain.is_empty() {
            let rsa = self.key.rsa()?;
            return Ok(KeyInfo {
                x509_data: None,
                key_value: Some(KeyValue {
                    rsa_key_value: RsaKeyValue {
                        modulus: encode_base64(&rsa.n().to_vec()),
                        exponent: encode_base64(&rsa.e().to_vec()),
                    },
                }),
            });
        }

        let mut certificates = Vec::with_capacity(self.chain.len());
        for certificate in &self.chain {
            certificates.push(X509Certificate {
                certificate: encode_base64(&certificate.to_der()?),
            });
        }
        Ok(KeyInfo {
            x509_data: Some(X509Data { certificates }),
            key_value: None,
        })
    }
}

/// Parse every CERTIFICATE block of a PEM bundle, preserving order
fn parse_certificate_chain(pem_data: &[u8]) -> SignatureResult<Vec<X509>> {
    let blocks = pem::parse_many(pem_data)
        .map_err(|e| SignatureError::Configuration(format!("failed to parse PEM chain: {e}")))?;

    let mut chain = Vec::new();
    for block in blocks {
        if block.tag() == PEM_CERTIFICATE_TAG {
            chain.push(X509::from_der(block.contents())?);
        }
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::rsa::Rsa;

    fn test_key_pem() -> Vec<u8> {
        let rsa = Rsa::generate(2048).unwrap();
        PKey::from_rsa(rsa)
            .unwrap()
            .private_key_to_pem_pkcs8()
            .unwrap()
    }

    #[test]
    fn test_garbage_key_is_a_configuration_error() {
        let err = XmlSignatureSigner::without_certificates(b"not a key").err().unwrap();
        assert!(matches!(err, SignatureError::Configuration(_)));
    }

    #[test]
    fn test_empty_chain_is_a_configuration_error() {
        let err = XmlSignatureSigner::new(test_key_pem(), b"").err().unwrap();
        assert!(matches!(err, SignatureError::Configuration(_)));
    }

    #[test]
    fn test_signed_document_structure() {
        let signer = XmlSignatureSigner::without_certificates(test_key_pem()).unwrap();
        let signed = signer
            .sign_enveloped(r#"<doc><payload>content</payload></doc>"#)
            .unwrap();

        assert!(signed.contains(r#"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#">"#));
        assert!(signed.contains("<SignedInfo>"));
        assert!(signed.contains(r#"<Reference URI="">"#));
        assert!(signed.contains("http://www.w3.org/2000/09/xmldsig#enveloped-signature"));
        assert!(signed.contains("http://www.w3.org/2001/10/xml-exc-c14n#"));
        assert!(signed.contains("http://www.w3.org/2000/09/xmldsig#rsa-sha1"));
        assert!(signed.contains("<DigestValue>"));
        assert!(signed.contains("<SignatureValue>"));
        assert!(signed.contains("<RSAKeyValue>"));
        // Original payload is untouched
        assert!(signed.contains("<payload>content</payload>"));
    }

    #[test]
    fn test_sign_node_references_its_id() {
        let signer = XmlSignatureSigner::without_certificates(test_key_pem()).unwrap();
        let mut doc =
            xml::parse(r#"<doc><assertion ID="a1">v</assertion></doc>"#).unwrap();
        signer.sign_node(&mut doc, "a1").unwrap();

        let out = xml::serialize(&doc).unwrap();
        assert!(out.contains(r##"<Reference URI="#a1">"##));
        // Signature landed inside the signed element
        let assertion = xml::find_by_id(&doc, "ID", "a1").unwrap();
        assert_eq!(xml::count_signatures(assertion), 1);
    }

    #[test]
    fn test_sign_node_unknown_id_fails_without_mutation() {
        let signer = XmlSignatureSigner::without_certificates(test_key_pem()).unwrap();
        let original = r#"<doc><assertion ID="a1">v</assertion></doc>"#;
        let mut doc = xml::parse(original).unwrap();
        assert!(signer.sign_node(&mut doc, "missing").is_err());
        assert_eq!(xml::serialize(&doc).unwrap(), original);
    }

    #[test]
    fn test_sha256_suite_uris_in_output() {
        let signer = XmlSignatureSigner::without_certificates(test_key_pem())
            .unwrap()
            .with_suite(SignatureSuite::RsaSha256);
        let signed = signer.sign_enveloped("<doc/>").unwrap();
        assert!(signed.contains("http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"));
        assert!(signed.contains("http://www.w3.org/2001/04/xmlenc#sha256"));
    }
}
