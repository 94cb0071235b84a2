//! XML digital signature engine for federated identity flows
//!
//! Signs and verifies XML-DSig `<Signature>` blocks over arbitrary subtrees,
//! the trust boundary every SAML/WS-Federation style exchange rests on:
//!
//! 1. Signing ([`XmlSignatureSigner`]): canonicalize a subtree, digest it,
//!    sign the canonical `SignedInfo` and insert a complete enveloped
//!    `Signature` with the certificate chain (or raw RSA key) in `KeyInfo`.
//! 2. Validation ([`XmlSignatureValidator`]): recompute the reference digest
//!    through the declared transform pipeline, bind the embedded key material
//!    to a caller-supplied [`TrustAnchor`] and verify `SignatureValue` over
//!    the canonical `SignedInfo`.
//!
//! All operations are synchronous, CPU-bound and free of shared mutable
//! state; instances are safe to use from concurrent request handlers.

pub mod constants;
pub mod error;
pub mod keys;
pub mod signer;
pub mod transforms;
pub mod trust;
pub mod types;
pub mod utils;
pub mod validator;
pub mod xml;

pub use error::{SignatureError, SignatureResult};
pub use keys::KeyMaterial;
pub use signer::XmlSignatureSigner;
pub use transforms::{Transform, TransformRegistry};
pub use trust::TrustAnchor;
pub use types::{SignatureSuite, SignedInfoDescriptor, VerificationResult};
pub use validator::XmlSignatureValidator;
