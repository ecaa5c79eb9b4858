//! XML Signature support for SAML.
//!
//! Enveloped XML-DSig signatures over SAML elements:
//!
//! - [`sign_element`] canonicalizes the element, digests it, builds
//!   `SignedInfo`, signs it through a [`Signer`] and inserts the
//!   `ds:Signature` right after `Issuer` (or as first child).
//! - [`verify_element`] / [`verify_in_document`] resolve the reference by ID,
//!   reject duplicated IDs, check the declared algorithms against the
//!   context blacklist and the verifier, compare the digest and only then
//!   check the signature value.
//!
//! Comments never take part in a canonical form, whatever method is
//! declared. No trust decision is made here: [`SignatureEnvelope::validating_certificates`]
//! hands embedded certificates to the caller.

mod signer;
mod validator;

pub use signer::*;
pub use validator::*;

use base64::Engine;
use saml_core::{Signer, Verifier};

use crate::context::SamlContext;
use crate::error::{SamlError, SamlResult};
use crate::types::{exactly_one, expect_element, required_attr, FromXml, ToXml, DS_NS, EC_NS};
use crate::xml::XmlElement;

pub(crate) fn ds(name: &str) -> XmlElement {
    XmlElement::new(DS_NS, "ds", name)
}

/// Decodes base64 element content, ignoring line breaks and indentation.
pub(crate) fn decode_base64_text(text: &str) -> SamlResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
}

pub(crate) fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// `ds:KeyInfo` content this library understands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyInfo {
    /// `ds:KeyName`.
    pub key_name: Option<String>,
    /// DER certificates from `ds:X509Data/ds:X509Certificate`.
    pub certificates: Vec<Vec<u8>>,
}

impl KeyInfo {
    /// Key info carrying one certificate.
    #[must_use]
    pub fn with_certificate(certificate_der: Vec<u8>) -> Self {
        Self {
            key_name: None,
            certificates: vec![certificate_der],
        }
    }

    /// Sets the key name.
    #[must_use]
    pub fn with_key_name(mut self, name: impl Into<String>) -> Self {
        self.key_name = Some(name.into());
        self
    }

    pub(crate) fn parse(element: &XmlElement) -> SamlResult<Self> {
        expect_element(element, DS_NS, "KeyInfo")?;
        let key_name = element.first_child(DS_NS, "KeyName").map(XmlElement::text);
        let mut certificates = Vec::new();
        for data in element.children_named(DS_NS, "X509Data") {
            for cert in data.children_named(DS_NS, "X509Certificate") {
                certificates.push(decode_base64_text(&cert.text())?);
            }
        }
        Ok(Self {
            key_name,
            certificates,
        })
    }
}

impl ToXml for KeyInfo {
    fn to_element(&self) -> XmlElement {
        let mut el = ds("KeyInfo");
        if let Some(name) = &self.key_name {
            el.push_element(ds("KeyName").with_text(name));
        }
        if !self.certificates.is_empty() {
            let mut data = ds("X509Data");
            for cert in &self.certificates {
                data.push_element(ds("X509Certificate").with_text(&encode_base64(cert)));
            }
            el.push_element(data);
        }
        el
    }
}

/// A certificate found in a signature's `KeyInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatingCertificate {
    /// The DER encoding.
    pub der: Vec<u8>,
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
}

/// A parsed `ds:Signature`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEnvelope {
    element: XmlElement,
    canonicalization_method: String,
    signature_method: String,
    reference_uri: String,
    transforms: Vec<String>,
    reference_prefixes: Vec<String>,
    signed_info_prefixes: Vec<String>,
    digest_method: String,
    digest_value: Vec<u8>,
    signature_value: Vec<u8>,
    key_info: Option<KeyInfo>,
}

impl SignatureEnvelope {
    /// The `ds:Signature` element as received.
    #[must_use]
    pub fn element(&self) -> &XmlElement {
        &self.element
    }

    /// `SignedInfo/CanonicalizationMethod/@Algorithm`.
    #[must_use]
    pub fn canonicalization_method(&self) -> &str {
        &self.canonicalization_method
    }

    /// `SignedInfo/SignatureMethod/@Algorithm`.
    #[must_use]
    pub fn signature_method(&self) -> &str {
        &self.signature_method
    }

    /// `Reference/@URI`.
    #[must_use]
    pub fn reference_uri(&self) -> &str {
        &self.reference_uri
    }

    /// `Reference/Transforms/Transform/@Algorithm` values.
    #[must_use]
    pub fn transforms(&self) -> &[String] {
        &self.transforms
    }

    /// `InclusiveNamespaces/@PrefixList` of the reference's C14N transform.
    #[must_use]
    pub fn reference_prefixes(&self) -> &[String] {
        &self.reference_prefixes
    }

    /// `InclusiveNamespaces/@PrefixList` of `CanonicalizationMethod`.
    #[must_use]
    pub fn signed_info_prefixes(&self) -> &[String] {
        &self.signed_info_prefixes
    }

    /// `Reference/DigestMethod/@Algorithm`.
    #[must_use]
    pub fn digest_method(&self) -> &str {
        &self.digest_method
    }

    /// Decoded `DigestValue`.
    #[must_use]
    pub fn digest_value(&self) -> &[u8] {
        &self.digest_value
    }

    /// Decoded `SignatureValue`.
    #[must_use]
    pub fn signature_value(&self) -> &[u8] {
        &self.signature_value
    }

    /// The `KeyInfo`, if present.
    #[must_use]
    pub fn key_info(&self) -> Option<&KeyInfo> {
        self.key_info.as_ref()
    }

    /// Certificates embedded in `KeyInfo`, parsed for inspection.
    ///
    /// Whether any of them is trusted is the caller's decision.
    pub fn validating_certificates(&self) -> SamlResult<Vec<ValidatingCertificate>> {
        let Some(key_info) = &self.key_info else {
            return Ok(Vec::new());
        };
        key_info
            .certificates
            .iter()
            .map(|der| {
                let (_, cert) = x509_parser::parse_x509_certificate(der)
                    .map_err(|e| SamlError::Crypto(format!("invalid X.509 certificate: {e}")))?;
                Ok(ValidatingCertificate {
                    der: der.clone(),
                    subject: cert.subject().to_string(),
                    issuer: cert.issuer().to_string(),
                })
            })
            .collect()
    }
}

impl ToXml for SignatureEnvelope {
    fn to_element(&self) -> XmlElement {
        self.element.clone()
    }
}

impl FromXml for SignatureEnvelope {
    fn from_xml(element: &XmlElement, _ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, DS_NS, "Signature")?;
        let signed_info = exactly_one(element, DS_NS, "SignedInfo")?;
        let canonicalization = exactly_one(signed_info, DS_NS, "CanonicalizationMethod")?;
        let canonicalization_method = required_attr(canonicalization, "Algorithm")?;
        let signed_info_prefixes = prefix_list(canonicalization);
        let signature_method =
            required_attr(exactly_one(signed_info, DS_NS, "SignatureMethod")?, "Algorithm")?;

        let reference = exactly_one(signed_info, DS_NS, "Reference")?;
        let reference_uri = reference.attr("URI").unwrap_or_default();
        let mut transforms = Vec::new();
        let mut reference_prefixes = Vec::new();
        if let Some(list) = reference.first_child(DS_NS, "Transforms") {
            for transform in list.children_named(DS_NS, "Transform") {
                transforms.push(required_attr(transform, "Algorithm")?.to_string());
                if transform.first_child(EC_NS, "InclusiveNamespaces").is_some() {
                    reference_prefixes = prefix_list(transform);
                }
            }
        }
        let digest_method =
            required_attr(exactly_one(reference, DS_NS, "DigestMethod")?, "Algorithm")?;
        let digest_value = decode_base64_text(&exactly_one(reference, DS_NS, "DigestValue")?.text())?;
        let signature_value =
            decode_base64_text(&exactly_one(element, DS_NS, "SignatureValue")?.text())?;
        let key_info = element
            .first_child(DS_NS, "KeyInfo")
            .map(KeyInfo::parse)
            .transpose()?;

        Ok(Self {
            element: element.clone(),
            canonicalization_method: canonicalization_method.to_string(),
            signature_method: signature_method.to_string(),
            reference_uri: reference_uri.to_string(),
            transforms,
            reference_prefixes,
            signed_info_prefixes,
            digest_method: digest_method.to_string(),
            digest_value,
            signature_value,
            key_info,
        })
    }
}

/// Prefixes listed by an `ec:InclusiveNamespaces` child of `method`.
fn prefix_list(method: &XmlElement) -> Vec<String> {
    method
        .first_child(EC_NS, "InclusiveNamespaces")
        .and_then(|el| el.attr("PrefixList"))
        .map(|list| list.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// A value that can carry an enveloped signature.
///
/// Signing never mutates: [`sign`](Signable::sign) returns a new value
/// parsed back from the signed element, which remembers that element so
/// later serialization and verification see exactly the signed content.
pub trait Signable: ToXml + FromXml {
    /// The signature, if the value is signed.
    fn signature(&self) -> Option<&SignatureEnvelope>;

    /// The element the signature covers, if the value is signed.
    fn signed_element(&self) -> Option<&XmlElement>;

    /// Returns a signed copy of this value.
    fn sign(
        &self,
        signer: &dyn Signer,
        options: &SigningOptions,
        ctx: &SamlContext,
    ) -> SamlResult<Self> {
        let signed = sign_element(self.to_element(), signer, options, ctx)?;
        Self::from_xml(&signed, ctx)
    }

    /// Verifies the enveloped signature.
    ///
    /// An unsigned value is an error, never a pass.
    fn verify(&self, verifier: &dyn Verifier, ctx: &SamlContext) -> SamlResult<()> {
        match self.signed_element() {
            Some(element) => verify_element(element, verifier, ctx),
            None => Err(SamlError::SignatureVerification("element is not signed".into())),
        }
    }

    /// Returns true if the value carries a signature.
    fn is_signed(&self) -> bool {
        self.signature().is_some()
    }
}

/// Clones `element` out of `document`, redeclaring the namespaces it
/// inherits so that the copy canonicalizes as it does in place.
pub(crate) fn detach(document: &XmlElement, element: &XmlElement) -> XmlElement {
    let mut copy = element.clone();
    for decl in document.inherited_namespaces(element).unwrap_or_default() {
        if !copy.namespaces.iter().any(|d| d.prefix == decl.prefix) {
            copy.namespaces.push(decl);
        }
    }
    copy
}

/// Reads the optional enveloped signature of a signable element.
///
/// Returns the parsed signature together with the element it covers.
pub(crate) fn parse_enveloped(
    element: &XmlElement,
    ctx: &SamlContext,
) -> SamlResult<Option<(SignatureEnvelope, XmlElement)>> {
    crate::types::at_most_one(element, DS_NS, "Signature")?
        .map(|sig| Ok((SignatureEnvelope::from_xml(sig, ctx)?, element.clone())))
        .transpose()
}
