//! Exclusive XML canonicalization
//!
//! Delegates to libxml2 through the `xml_c14n` bindings. Canonicalization is
//! the foundation every digest comparison stands on, so a failure here is a
//! hard error; there is no fallback to naive serialization.

use xml_c14n::{CanonicalizationMode, CanonicalizationOptions};

use crate::constants::EXCLUSIVE_C14N_ALGORITHM;
use crate::error::{SignatureError, SignatureResult};

use super::Transform;

/// Canonicalize a document with W3C Exclusive XML Canonicalization 1.0,
/// comments omitted
pub(crate) fn exclusive_c14n(xml: &str) -> SignatureResult<String> {
    let options = CanonicalizationOptions {
        mode: CanonicalizationMode::ExclusiveCanonical1_0,
        keep_comments: false,
        inclusive_ns_prefixes: Vec::new(),
    };
    xml_c14n::canonicalize_xml(xml, options)
        .map_err(|e| SignatureError::Canonicalization(e.to_string()))
}

/// Exclusive C14N as a pipeline transform
#[derive(Default)]
pub struct ExclusiveC14nTransform;

impl Transform for ExclusiveC14nTransform {
    fn uri(&self) -> &'static str {
        EXCLUSIVE_C14N_ALGORITHM
    }

    fn apply(&self, input: &[u8]) -> SignatureResult<Vec<u8>> {
        let text = std::str::from_utf8(input)
            .map_err(|e| SignatureError::Serialization(e.to_string()))?;
        Ok(exclusive_c14n(text)?.into_bytes())
    }
}
