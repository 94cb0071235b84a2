//! XML signature constants and algorithm URIs
//!
//! Central location for the namespace URIs, algorithm identifiers and element
//! names used throughout the signature engine, to avoid magic strings.

/// XML namespace URIs
pub const XMLDSIG_NAMESPACE: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Pre-processing transform URIs
pub const ENVELOPED_SIGNATURE_TRANSFORM: &str =
    "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
pub const EXCLUSIVE_C14N_ALGORITHM: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// Signature algorithm URIs
pub const RSA_SHA1_ALGORITHM: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
pub const RSA_SHA256_ALGORITHM: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

/// Digest algorithm URIs
pub const SHA1_DIGEST_ALGORITHM: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
pub const SHA256_DIGEST_ALGORITHM: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

/// XML element names
pub const SIGNATURE_ELEMENT: &str = "Signature";
pub const SIGNED_INFO_ELEMENT: &str = "SignedInfo";
pub const SIGNATURE_VALUE_ELEMENT: &str = "SignatureValue";
pub const CANONICALIZATION_METHOD_ELEMENT: &str = "CanonicalizationMethod";
pub const SIGNATURE_METHOD_ELEMENT: &str = "SignatureMethod";
pub const REFERENCE_ELEMENT: &str = "Reference";
pub const TRANSFORMS_ELEMENT: &str = "Transforms";
pub const TRANSFORM_ELEMENT: &str = "Transform";
pub const DIGEST_METHOD_ELEMENT: &str = "DigestMethod";
pub const DIGEST_VALUE_ELEMENT: &str = "DigestValue";
pub const KEY_INFO_ELEMENT: &str = "KeyInfo";
pub const X509_DATA_ELEMENT: &str = "X509Data";
pub const X509_CERTIFICATE_ELEMENT: &str = "X509Certificate";
pub const KEY_VALUE_ELEMENT: &str = "KeyValue";
pub const RSA_KEY_VALUE_ELEMENT: &str = "RSAKeyValue";
pub const MODULUS_ELEMENT: &str = "Modulus";
pub const EXPONENT_ELEMENT: &str = "Exponent";

/// XML attribute names
pub const ALGORITHM_ATTRIBUTE: &str = "Algorithm";
pub const URI_ATTRIBUTE: &str = "URI";

/// Identifying attribute used when none is configured explicitly
pub const DEFAULT_ID_ATTRIBUTE: &str = "ID";

/// PEM tags for certificates
pub const PEM_CERTIFICATE_TAG: &str = "CERTIFICATE";
pub const PEM_X509_CERTIFICATE_TAG: &str = "X509 CERTIFICATE";
pub const PEM_TRUSTED_CERTIFICATE_TAG: &str = "TRUSTED CERTIFICATE";

/// PEM tags for private keys
pub const PEM_PRIVATE_KEY_TAG: &str = "PRIVATE KEY";
pub const PEM_RSA_PRIVATE_KEY_TAG: &str = "RSA PRIVATE KEY";
