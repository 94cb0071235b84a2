//! PEM and base64 helpers shared by key handling and validation

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{SignatureError, SignatureResult};

/// Parse PEM content and require one of the expected tags
pub fn parse_and_validate_pem(pem_data: &[u8], expected_tags: &[&str]) -> SignatureResult<pem::Pem> {
    let pem = pem::parse(pem_data)
        .map_err(|e| SignatureError::Configuration(format!("failed to parse PEM content: {e}")))?;

    if !expected_tags.contains(&pem.tag()) {
        return Err(SignatureError::Configuration(format!(
            "expected one of {:?} in PEM, found: {}",
            expected_tags,
            pem.tag()
        )));
    }

    Ok(pem)
}

/// Decode base64 that may be line-wrapped, as certificate and signature
/// values embedded in XML usually are
pub fn decode_base64(input: &str) -> SignatureResult<Vec<u8>> {
    let compact: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(STANDARD.decode(compact.as_bytes())?)
}

/// Standard base64 encoding for embedding binary values in XML
pub fn encode_base64(input: &[u8]) -> String {
    STANDARD.encode(input)
}
