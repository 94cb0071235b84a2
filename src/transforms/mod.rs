//! Transform pipeline for reference processing
//!
//! A `Transform` maps an algorithm URI to a stateless byte-to-byte function.
//! The registry is constructor-injected into signer and validator, so the set
//! of acceptable algorithms is explicit per instance instead of living in a
//! process-global table.

pub mod c14n;
pub mod enveloped;

use std::collections::HashMap;

use crate::error::{SignatureError, SignatureResult};

pub use c14n::ExclusiveC14nTransform;
pub use enveloped::EnvelopedSignatureTransform;

/// A referentially transparent pre-processing step over document bytes
pub trait Transform: Send + Sync {
    /// Algorithm URI this transform implements
    fn uri(&self) -> &'static str;

    /// Apply the transform, producing the input of the next pipeline stage
    fn apply(&self, input: &[u8]) -> SignatureResult<Vec<u8>>;
}

/// Allow-list of transform implementations, keyed by algorithm URI
pub struct TransformRegistry {
    transforms: HashMap<&'static str, Box<dyn Transform>>,
}

impl TransformRegistry {
    /// Registry with no transforms; everything is rejected until registered
    pub fn empty() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    /// Registry with the standard allow-list: enveloped-signature and
    /// exclusive C14N
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(EnvelopedSignatureTransform));
        registry.register(Box::new(ExclusiveC14nTransform::default()));
        registry
    }

    /// Register a transform under its own URI, replacing any previous entry
    pub fn register(&mut self, transform: Box<dyn Transform>) {
        self.transforms.insert(transform.uri(), transform);
    }

    /// Look up a transform; unknown URIs fail before any processing runs
    pub fn get(&self, uri: &str) -> SignatureResult<&dyn Transform> {
        self.transforms
            .get(uri)
            .map(AsRef::as_ref)
            .ok_or_else(|| SignatureError::UnsupportedAlgorithm(uri.to_string()))
    }

    /// Whether a URI is on the allow-list
    pub fn supports(&self, uri: &str) -> bool {
        self.transforms.contains_key(uri)
    }

    /// Fold the transforms over `input` in the order they were declared in
    /// the document, each stage feeding the next
    pub fn apply(&self, algorithms: &[String], input: Vec<u8>) -> SignatureResult<Vec<u8>> {
        algorithms
            .iter()
            .try_fold(input, |data, uri| self.get(uri)?.apply(&data))
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AppendTransform {
        uri: &'static str,
        suffix: u8,
    }

    impl Transform for AppendTransform {
        fn uri(&self) -> &'static str {
            self.uri
        }

        fn apply(&self, input: &[u8]) -> SignatureResult<Vec<u8>> {
            let mut out = input.to_vec();
            out.push(self.suffix);
            Ok(out)
        }
    }

    #[test]
    fn test_unknown_uri_is_rejected() {
        let registry = TransformRegistry::standard();
        let err = registry.get("urn:example:bogus").err().unwrap();
        assert!(matches!(err, SignatureError::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn test_standard_registry_allow_list() {
        let registry = TransformRegistry::standard();
        assert!(registry.supports("http://www.w3.org/2000/09/xmldsig#enveloped-signature"));
        assert!(registry.supports("http://www.w3.org/2001/10/xml-exc-c14n#"));
        assert!(!registry.supports("http://www.w3.org/TR/2001/REC-xml-c14n-20010315"));
    }

    #[test]
    fn test_pipeline_preserves_declared_order() {
        let mut registry = TransformRegistry::empty();
        registry.register(Box::new(AppendTransform {
            uri: "urn:test:a",
            suffix: b'a',
        }));
        registry.register(Box::new(AppendTransform {
            uri: "urn:test:b",
            suffix: b'b',
        }));

        let uris = vec!["urn:test:b".to_string(), "urn:test:a".to_string()];
        let out = registry.apply(&uris, b"x".to_vec()).unwrap();
        assert_eq!(out, b"xba");
    }

    #[test]
    fn test_pipeline_fails_on_unregistered_stage() {
        let registry = TransformRegistry::empty();
        let uris = vec!["urn:test:a".to_string()];
        assert!(registry.apply(&uris, Vec::new()).is_err());
    }
}
