//! Enveloped-signature transform
//!
//! A signature cannot cover its own bytes, so the `Signature` element is
//! excised from the document before the reference digest is computed. The
//! excision is a streaming rewrite of the input bytes; markup outside the
//! signature passes through verbatim, attribute prefixes included.

use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::{NsReader, Writer};
use tracing::debug;

use crate::constants::{ENVELOPED_SIGNATURE_TRANSFORM, SIGNATURE_ELEMENT, XMLDSIG_NAMESPACE};
use crate::error::{SignatureError, SignatureResult};

use super::Transform;

/// Removes the single enveloped `Signature` element before digesting
pub struct EnvelopedSignatureTransform;

fn is_signature(resolved: &ResolveResult, local_name: &[u8]) -> bool {
    matches!(resolved, ResolveResult::Bound(ns) if ns.0 == XMLDSIG_NAMESPACE.as_bytes())
        && local_name == SIGNATURE_ELEMENT.as_bytes()
}

impl Transform for EnvelopedSignatureTransform {
    fn uri(&self) -> &'static str {
        ENVELOPED_SIGNATURE_TRANSFORM
    }

    fn apply(&self, input: &[u8]) -> SignatureResult<Vec<u8>> {
        let mut reader = NsReader::from_reader(input);
        let mut writer = Writer::new(Vec::new());
        let mut depth = 0usize;
        let mut skip_until: Option<usize> = None;
        let mut removed = 0usize;

        loop {
            let (resolved, event) = reader
                .read_resolved_event()
                .map_err(|e| SignatureError::MalformedSignature(e.to_string()))?;
            let mut emit = skip_until.is_none();
            match &event {
                Event::Eof => break,
                Event::Start(start) => {
                    if is_signature(&resolved, start.local_name().as_ref()) {
                        if depth == 0 {
                            return Err(SignatureError::MalformedSignature(
                                "document root is itself the Signature element".into(),
                            ));
                        }
                        removed += 1;
                        if skip_until.is_none() {
                            skip_until = Some(depth);
                            emit = false;
                        }
                    }
                    depth += 1;
                }
                Event::End(_) => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        SignatureError::MalformedSignature("unbalanced end tag".into())
                    })?;
                    if skip_until == Some(depth) {
                        skip_until = None;
                        emit = false;
                    }
                }
                Event::Empty(start) => {
                    if is_signature(&resolved, start.local_name().as_ref()) {
                        if depth == 0 {
                            return Err(SignatureError::MalformedSignature(
                                "document root is itself the Signature element".into(),
                            ));
                        }
                        removed += 1;
                        emit = false;
                    }
                }
                _ => {}
            }
            if emit {
                writer
                    .write_event(event)
                    .map_err(|e| SignatureError::Serialization(e.to_string()))?;
            }
        }

        // Exactly one signature keeps the transform's scope unambiguous:
        // none means the reference does not actually envelop a signature,
        // several means it is unclear which one this transform belongs to.
        match removed {
            1 => {}
            n => {
                return Err(SignatureError::MalformedSignature(format!(
                    "enveloped-signature transform requires exactly one Signature element, found {n}"
                )));
            }
        }

        debug!("excised enveloped Signature element");
        Ok(writer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DS: &str = r#"xmlns:ds="http://www.w3.org/2000/09/xmldsig#""#;

    fn apply(input: &str) -> SignatureResult<String> {
        let out = EnvelopedSignatureTransform.apply(input.as_bytes())?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_removes_single_signature() {
        let input =
            format!(r#"<root {DS}><a>v</a><ds:Signature><ds:SignedInfo/></ds:Signature></root>"#);
        let out = apply(&input).unwrap();
        assert!(out.contains("<a>v</a>"));
        assert!(!out.contains("Signature"));
    }

    #[test]
    fn test_markup_outside_the_signature_is_untouched() {
        let input = format!(
            r#"<root {DS} xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><a xsi:type="xs:string">v</a><ds:Signature><ds:SignedInfo/></ds:Signature></root>"#
        );
        let out = apply(&input).unwrap();
        assert!(out.contains(r#"xsi:type="xs:string""#));
        assert!(out.contains(r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#));
    }

    #[test]
    fn test_zero_signatures_is_an_error() {
        assert!(matches!(
            apply("<root><a/></root>"),
            Err(SignatureError::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_multiple_signatures_are_ambiguous() {
        let input = format!(r#"<root {DS}><ds:Signature/><b><ds:Signature/></b></root>"#);
        assert!(matches!(
            apply(&input),
            Err(SignatureError::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_signature_as_root_is_rejected() {
        let input = format!(r#"<ds:Signature {DS}><ds:SignedInfo/></ds:Signature>"#);
        assert!(matches!(
            apply(&input),
            Err(SignatureError::MalformedSignature(_))
        ));
    }
}
