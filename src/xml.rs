//! DOM and markup helpers for signature processing
//!
//! Thin wrappers around `xmltree` for structural inspection (parsing,
//! deterministic serialization, namespace-aware lookup of signature nodes),
//! plus verbatim markup extraction for the canonicalization path. Extraction
//! works on the original document text so that attribute prefixes and other
//! lexical detail a DOM round trip would lose survive into the digest.

use std::collections::BTreeMap;

use quick_xml::NsReader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use xmltree::{Element, EmitterConfig, XMLNode};

use crate::constants::{SIGNATURE_ELEMENT, XMLDSIG_NAMESPACE};
use crate::error::{SignatureError, SignatureResult};

/// Parse a document into an element tree
pub fn parse(xml: &str) -> SignatureResult<Element> {
    Ok(Element::parse(xml.as_bytes())?)
}

/// Serialize an element without an XML declaration or added whitespace
///
/// The signer feeds this output into the canonicalization transform, so the
/// exact serialization shape does not leak into signed bytes.
pub fn serialize(element: &Element) -> SignatureResult<String> {
    let config = EmitterConfig::new()
        .perform_indent(false)
        .write_document_declaration(false);

    let mut output = Vec::new();
    element
        .write_with_config(&mut output, config)
        .map_err(|e| SignatureError::Serialization(e.to_string()))?;

    String::from_utf8(output).map_err(|e| SignatureError::Serialization(e.to_string()))
}

/// Whether an element is an XML-DSig `Signature` (namespace + local name)
pub fn is_signature(element: &Element) -> bool {
    element.name == SIGNATURE_ELEMENT
        && element.namespace.as_deref() == Some(XMLDSIG_NAMESPACE)
}

fn collect_signatures<'a>(element: &'a Element, found: &mut Vec<&'a Element>) {
    if is_signature(element) {
        found.push(element);
    }
    for child in &element.children {
        if let XMLNode::Element(e) = child {
            collect_signatures(e, found);
        }
    }
}

/// Locate the single `Signature` element anywhere in the document
///
/// Zero matches means the document is unsigned; more than one makes the
/// signature scope ambiguous and the document is rejected outright.
pub fn find_signature(root: &Element) -> SignatureResult<&Element> {
    let mut found = Vec::new();
    collect_signatures(root, &mut found);
    match found.len() {
        0 => Err(SignatureError::MissingSignature),
        1 => Ok(found[0]),
        n => Err(SignatureError::MalformedSignature(format!(
            "expected exactly one Signature element, found {n}"
        ))),
    }
}

/// Count `Signature` elements in a subtree, the root included
pub fn count_signatures(root: &Element) -> usize {
    let mut found = Vec::new();
    collect_signatures(root, &mut found);
    found.len()
}

/// Find the element carrying `id_attr="id"` anywhere in the document
pub fn find_by_id<'a>(root: &'a Element, id_attr: &str, id: &str) -> Option<&'a Element> {
    if root.attributes.get(id_attr).map(String::as_str) == Some(id) {
        return Some(root);
    }
    for child in &root.children {
        if let XMLNode::Element(e) = child {
            if let Some(found) = find_by_id(e, id_attr, id) {
                return Some(found);
            }
        }
    }
    None
}

/// Mutable variant of [`find_by_id`]
pub fn find_by_id_mut<'a>(
    root: &'a mut Element,
    id_attr: &str,
    id: &str,
) -> Option<&'a mut Element> {
    if root.attributes.get(id_attr).map(String::as_str) == Some(id) {
        return Some(root);
    }
    for child in &mut root.children {
        if let XMLNode::Element(e) = child {
            if let Some(found) = find_by_id_mut(e, id_attr, id) {
                return Some(found);
            }
        }
    }
    None
}

/// Namespace-aware child lookup within the XML-DSig namespace
pub fn dsig_child<'a>(parent: &'a Element, name: &str) -> Option<&'a Element> {
    parent.get_child((name, XMLDSIG_NAMESPACE))
}

/// Trimmed text content of an element
pub fn element_text(element: &Element) -> Option<String> {
    element.get_text().map(|t| t.trim().to_string())
}

/// Extract the markup of the element carrying `id_attr="id"`, verbatim
///
/// Detaching a subtree loses namespace declarations inherited from its
/// ancestors, so those are made explicit on the extracted start tag;
/// exclusive canonicalization later drops whichever are not utilized.
/// Declarations on the element itself win over inherited ones.
pub(crate) fn extract_identified_element(
    document: &str,
    id_attr: &str,
    id: &str,
) -> SignatureResult<Option<String>> {
    extract_matching(document, |_, _, start, _| has_attribute(start, id_attr, id))
}

/// Extract the first XML-DSig element named `local_name`, verbatim and with
/// inherited namespace declarations made explicit
pub(crate) fn extract_dsig_element(
    document: &str,
    local_name: &str,
) -> SignatureResult<Option<String>> {
    extract_matching(document, |ns, local, _, _| {
        Ok(ns == Some(XMLDSIG_NAMESPACE.as_bytes()) && local == local_name.as_bytes())
    })
}

/// Like [`extract_dsig_element`], but only matching direct children of the
/// document's root element
pub(crate) fn extract_dsig_child(
    document: &str,
    local_name: &str,
) -> SignatureResult<Option<String>> {
    extract_matching(document, |ns, local, _, depth| {
        Ok(depth == 1
            && ns == Some(XMLDSIG_NAMESPACE.as_bytes())
            && local == local_name.as_bytes())
    })
}

fn has_attribute(start: &BytesStart, name: &str, value: &str) -> SignatureResult<bool> {
    for attribute in start.attributes() {
        let attribute =
            attribute.map_err(|e| SignatureError::MalformedSignature(e.to_string()))?;
        if attribute.key.as_ref() == name.as_bytes() {
            let actual = attribute
                .unescape_value()
                .map_err(|e| SignatureError::MalformedSignature(e.to_string()))?;
            return Ok(actual == value);
        }
    }
    Ok(false)
}

/// Streaming search for the first element accepted by `matches`, returning
/// its original byte span with ancestor namespace declarations spliced in
fn extract_matching<F>(document: &str, matches: F) -> SignatureResult<Option<String>>
where
    F: Fn(Option<&[u8]>, &[u8], &BytesStart, usize) -> SignatureResult<bool>,
{
    let mut reader = NsReader::from_str(document);
    let mut scopes: Vec<Vec<(String, String)>> = Vec::new();

    loop {
        let tag_start = reader.buffer_position() as usize;
        let (resolved, event) = reader
            .read_resolved_event()
            .map_err(|e| SignatureError::MalformedSignature(e.to_string()))?;
        let namespace = match &resolved {
            ResolveResult::Bound(ns) => Some(ns.0),
            _ => None,
        };
        match event {
            Event::Eof => return Ok(None),
            Event::Start(start) => {
                if matches(namespace, start.local_name().as_ref(), &start, scopes.len())? {
                    let tag_end = reader.buffer_position() as usize;
                    let element_end = skip_to_matching_end(&mut reader)?;
                    return splice_inherited_namespaces(
                        document,
                        tag_start,
                        tag_end,
                        element_end,
                        &start,
                        &scopes,
                    )
                    .map(Some);
                }
                scopes.push(namespace_declarations(&start)?);
            }
            Event::End(_) => {
                scopes.pop();
            }
            Event::Empty(start) => {
                if matches(namespace, start.local_name().as_ref(), &start, scopes.len())? {
                    let tag_end = reader.buffer_position() as usize;
                    return splice_inherited_namespaces(
                        document, tag_start, tag_end, tag_end, &start, &scopes,
                    )
                    .map(Some);
                }
            }
            _ => {}
        }
    }
}

/// Consume events until the end tag matching an already-read start tag,
/// returning the byte position just past it
fn skip_to_matching_end(reader: &mut NsReader<&[u8]>) -> SignatureResult<usize> {
    let mut depth = 1usize;
    loop {
        let (_, event) = reader
            .read_resolved_event()
            .map_err(|e| SignatureError::MalformedSignature(e.to_string()))?;
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(reader.buffer_position() as usize);
                }
            }
            Event::Eof => {
                return Err(SignatureError::MalformedSignature(
                    "unterminated element".into(),
                ));
            }
            _ => {}
        }
    }
}

/// Namespace declarations carried on a start tag, as (prefix, uri) pairs with
/// the empty prefix standing for the default namespace
fn namespace_declarations(start: &BytesStart) -> SignatureResult<Vec<(String, String)>> {
    let mut declarations = Vec::new();
    for attribute in start.attributes() {
        let attribute =
            attribute.map_err(|e| SignatureError::MalformedSignature(e.to_string()))?;
        let key = attribute.key.as_ref();
        let prefix = if key == b"xmlns" {
            String::new()
        } else if let Some(rest) = key.strip_prefix(b"xmlns:") {
            String::from_utf8(rest.to_vec())
                .map_err(|e| SignatureError::MalformedSignature(e.to_string()))?
        } else {
            continue;
        };
        let uri = attribute
            .unescape_value()
            .map_err(|e| SignatureError::MalformedSignature(e.to_string()))?
            .into_owned();
        declarations.push((prefix, uri));
    }
    Ok(declarations)
}

/// Rebuild an extracted element, inserting ancestor namespace declarations
/// into its start tag while leaving every other byte untouched
fn splice_inherited_namespaces(
    document: &str,
    tag_start: usize,
    tag_end: usize,
    element_end: usize,
    start: &BytesStart,
    scopes: &[Vec<(String, String)>],
) -> SignatureResult<String> {
    let mut inherited: BTreeMap<&str, &str> = BTreeMap::new();
    for scope in scopes {
        for (prefix, uri) in scope {
            inherited.insert(prefix, uri);
        }
    }
    let own = namespace_declarations(start)?;
    for (prefix, _) in &own {
        inherited.remove(prefix.as_str());
    }
    inherited.retain(|_, uri| !uri.is_empty());

    let tag = &document[tag_start..tag_end];
    let rest = &document[tag_end..element_end];
    if inherited.is_empty() {
        return Ok(format!("{tag}{rest}"));
    }

    let mut declarations = String::new();
    for (prefix, uri) in &inherited {
        if prefix.is_empty() {
            declarations.push_str(&format!(r#" xmlns="{}""#, escape(*uri)));
        } else {
            declarations.push_str(&format!(r#" xmlns:{prefix}="{}""#, escape(*uri)));
        }
    }

    let insert_at = if tag.ends_with("/>") {
        tag.len() - 2
    } else {
        tag.len() - 1
    };
    Ok(format!(
        "{}{declarations}{}{rest}",
        &tag[..insert_at],
        &tag[insert_at..]
    ))
}
