//! XML Signature creation.

use saml_core::{CanonicalizationAlgorithm, SamlConfig, Signer};
use saml_core::algorithm::canonicalization_uris;

use crate::context::SamlContext;
use crate::error::{SamlError, SamlResult};
use crate::types::{ToXml, DS_NS, EC_NS, SAML_NS};
use crate::xml::{self, XmlElement, XmlNode};

use super::{ds, encode_base64, KeyInfo};

/// Options for enveloped signature creation.
///
/// The signature algorithm is the signer's own.
#[derive(Debug, Clone, Default)]
pub struct SigningOptions {
    /// Canonicalization for both the reference and `SignedInfo`.
    pub canonicalization: CanonicalizationAlgorithm,
    /// `KeyInfo` to embed, typically the signing certificate.
    pub key_info: Option<KeyInfo>,
    /// `InclusiveNamespaces PrefixList` for exclusive C14N.
    pub inclusive_prefixes: Vec<String>,
}

impl SigningOptions {
    /// Options embedding the given certificate.
    #[must_use]
    pub fn with_certificate(certificate_der: Vec<u8>) -> Self {
        Self {
            key_info: Some(KeyInfo::with_certificate(certificate_der)),
            ..Self::default()
        }
    }

    /// Options using the configured canonicalization.
    #[must_use]
    pub fn from_config(config: &SamlConfig) -> Self {
        Self {
            canonicalization: config.canonicalization,
            ..Self::default()
        }
    }

    /// Sets the canonicalization method.
    #[must_use]
    pub fn canonicalization(mut self, algorithm: CanonicalizationAlgorithm) -> Self {
        self.canonicalization = algorithm;
        self
    }

    /// Prefixes to render inclusively under exclusive C14N, such as `xs`
    /// when it only appears in `xsi:type` values.
    #[must_use]
    pub fn with_inclusive_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inclusive_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    fn prefixes(&self) -> &[String] {
        if self.canonicalization.is_exclusive() {
            self.inclusive_prefixes.as_slice()
        } else {
            &[]
        }
    }

    /// A C14N method element, with its prefix list when one applies.
    fn c14n_method(&self, name: &str) -> XmlElement {
        let mut method = ds(name).with_attr("Algorithm", self.canonicalization.uri());
        if !self.prefixes().is_empty() {
            let mut list = XmlElement::new(EC_NS, "ec", "InclusiveNamespaces")
                .with_attr("PrefixList", self.prefixes().join(" "));
            list.declare_namespace(Some("ec"), EC_NS);
            method.push_element(list);
        }
        method
    }
}

/// Signs `element` with an enveloped signature and returns the signed tree.
///
/// Any existing `ds:Signature` child is replaced. The element must carry
/// an `ID`.
pub fn sign_element(
    element: XmlElement,
    signer: &dyn Signer,
    options: &SigningOptions,
    ctx: &SamlContext,
) -> SamlResult<XmlElement> {
    let algorithm = signer.algorithm();
    let c14n = options.canonicalization;
    ctx.policy().ensure_allowed(algorithm.uri())?;
    ctx.policy().ensure_allowed(algorithm.digest().uri())?;
    ctx.policy().ensure_allowed(c14n.uri())?;

    let id = element
        .id()
        .ok_or_else(|| {
            SamlError::SignatureCreation(format!("{} has no ID", element.qualified_name()))
        })?
        .to_string();

    // Work on the tree exactly as a verifier will parse it.
    let mut element = xml::parse(&xml::to_string(&element))?;
    element
        .children
        .retain(|node| !matches!(node, XmlNode::Element(el) if el.is(DS_NS, "Signature")));

    let canonical = xml::canonicalize_with_prefixes(&element, c14n, &[], options.prefixes());
    let digest = signer
        .digest(algorithm.digest(), canonical.as_bytes())
        .map_err(|e| SamlError::SignatureCreation(e.to_string()))?;

    let signed_info = ds("SignedInfo")
        .with_child(options.c14n_method("CanonicalizationMethod"))
        .with_child(ds("SignatureMethod").with_attr("Algorithm", algorithm.uri()))
        .with_child(
            ds("Reference")
                .with_attr("URI", format!("#{id}"))
                .with_child(
                    ds("Transforms")
                        .with_child(
                            ds("Transform")
                                .with_attr("Algorithm", canonicalization_uris::ENVELOPED_SIGNATURE),
                        )
                        .with_child(options.c14n_method("Transform")),
                )
                .with_child(ds("DigestMethod").with_attr("Algorithm", algorithm.digest().uri()))
                .with_child(ds("DigestValue").with_text(&encode_base64(&digest))),
        );

    let mut signature = ds("Signature");
    signature.declare_namespace(Some("ds"), DS_NS);
    signature.push_element(signed_info);
    signature.push_element(ds("SignatureValue"));
    if let Some(key_info) = &options.key_info {
        key_info.append_to(&mut signature);
    }

    let position = element
        .children
        .iter()
        .position(|node| matches!(node, XmlNode::Element(el) if el.is(SAML_NS, "Issuer")))
        .map_or(0, |issuer| issuer + 1);
    element.children.insert(position, XmlNode::Element(signature));

    let signature_value = {
        let XmlNode::Element(signature) = &element.children[position] else {
            unreachable!("signature was just inserted");
        };
        let signed_info = signature
            .first_child(DS_NS, "SignedInfo")
            .ok_or_else(|| SamlError::SignatureCreation("SignedInfo missing".into()))?;
        let inherited = element
            .inherited_namespaces(signed_info)
            .unwrap_or_default();
        let canonical =
            xml::canonicalize_with_prefixes(signed_info, c14n, &inherited, options.prefixes());
        signer
            .sign(canonical.as_bytes())
            .map_err(|e| SamlError::SignatureCreation(e.to_string()))?
    };

    if let XmlNode::Element(signature) = &mut element.children[position] {
        for node in &mut signature.children {
            if let XmlNode::Element(child) = node {
                if child.is(DS_NS, "SignatureValue") {
                    child.push_text(&encode_base64(&signature_value));
                }
            }
        }
    }

    tracing::debug!(id = %id, algorithm = algorithm.uri(), "signed element");
    Ok(element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::test_keys;
    use crate::signature::verify_element;

    fn element_with_issuer() -> XmlElement {
        XmlElement::new(SAML_NS, "saml", "Assertion")
            .with_attr("ID", "_a1")
            .with_child(XmlElement::new(SAML_NS, "saml", "Issuer").with_text("https://idp"))
            .with_child(XmlElement::new(SAML_NS, "saml", "Subject"))
    }

    #[test]
    fn signature_goes_after_issuer() {
        let signed = sign_element(
            element_with_issuer(),
            &test_keys::idp_signer(),
            &SigningOptions::default(),
            &SamlContext::new(),
        )
        .unwrap();
        let names: Vec<_> = signed.child_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Issuer", "Signature", "Subject"]);
    }

    #[test]
    fn signature_is_first_without_issuer() {
        let element = XmlElement::new(SAML_NS, "saml", "Assertion")
            .with_attr("ID", "_a2")
            .with_child(XmlElement::new(SAML_NS, "saml", "Subject"));
        let signed = sign_element(
            element,
            &test_keys::idp_signer(),
            &SigningOptions::default(),
            &SamlContext::new(),
        )
        .unwrap();
        assert_eq!(signed.child_elements().next().map(|e| e.name.as_str()), Some("Signature"));
    }

    #[test]
    fn resigning_replaces_the_signature() {
        let ctx = SamlContext::new();
        let signer = test_keys::idp_signer();
        let once = sign_element(element_with_issuer(), &signer, &SigningOptions::default(), &ctx)
            .unwrap();
        let twice = sign_element(once, &signer, &SigningOptions::default(), &ctx).unwrap();
        assert_eq!(twice.children_named(DS_NS, "Signature").count(), 1);
        verify_element(&twice, &test_keys::idp_verifier(), &ctx).unwrap();
    }

    #[test]
    fn element_without_id_cannot_be_signed() {
        let result = sign_element(
            XmlElement::new(SAML_NS, "saml", "Assertion"),
            &test_keys::idp_signer(),
            &SigningOptions::default(),
            &SamlContext::new(),
        );
        assert!(matches!(result, Err(SamlError::SignatureCreation(_))));
    }

    #[test]
    fn inclusive_canonicalization_signs_and_verifies() {
        let ctx = SamlContext::new();
        let options = SigningOptions::default().canonicalization(CanonicalizationAlgorithm::C14n);
        let signed =
            sign_element(element_with_issuer(), &test_keys::idp_signer(), &options, &ctx).unwrap();
        verify_element(&signed, &test_keys::idp_verifier(), &ctx).unwrap();
    }
}
