//! XML Signature validation.

use saml_core::algorithm::canonicalization_uris;
use saml_core::{CanonicalizationAlgorithm, DigestAlgorithm, SignatureAlgorithm, Verifier};

use crate::context::SamlContext;
use crate::error::{SamlError, SamlResult};
use crate::types::{FromXml, DS_NS};
use crate::xml::{self, XmlElement, XmlNode};

use super::SignatureEnvelope;

fn failure(reason: impl Into<String>) -> SamlError {
    let reason = reason.into();
    tracing::debug!(%reason, "signature rejected");
    SamlError::SignatureVerification(reason)
}

/// Verifies the enveloped signature of a standalone element.
pub fn verify_element(
    signed: &XmlElement,
    verifier: &dyn Verifier,
    ctx: &SamlContext,
) -> SamlResult<()> {
    verify_in_document(signed, signed, verifier, ctx)
}

/// Verifies the enveloped signature of `signed`, an element inside `document`.
///
/// `document` must be the tree `signed` was borrowed from: it supplies the
/// namespaces in scope and is searched for duplicated IDs, so that a
/// signature cannot be made to vouch for a different element with the
/// same ID.
pub fn verify_in_document(
    document: &XmlElement,
    signed: &XmlElement,
    verifier: &dyn Verifier,
    ctx: &SamlContext,
) -> SamlResult<()> {
    let mut signatures = signed.children_named(DS_NS, "Signature");
    let signature_element = signatures
        .next()
        .ok_or_else(|| failure("element is not signed"))?;
    if signatures.next().is_some() {
        return Err(failure("more than one enveloped signature"));
    }
    let envelope = SignatureEnvelope::from_xml(signature_element, ctx)?;

    let id = signed
        .id()
        .ok_or_else(|| failure("signed element has no ID"))?;
    if envelope.reference_uri() != format!("#{id}") {
        return Err(failure(format!(
            "reference {:?} does not point at the signed element",
            envelope.reference_uri()
        )));
    }
    let occurrences = document.find_all_by_id(id).len();
    if occurrences != 1 {
        tracing::warn!(id, occurrences, "duplicated ID in signed document");
        return Err(failure(format!("ID {id} occurs {occurrences} times")));
    }

    let policy = ctx.policy();
    policy.ensure_allowed(envelope.signature_method())?;
    policy.ensure_allowed(envelope.digest_method())?;
    policy.ensure_allowed(envelope.canonicalization_method())?;

    let declared = SignatureAlgorithm::from_uri(envelope.signature_method())
        .ok_or_else(|| SamlError::UnsupportedAlgorithm(envelope.signature_method().to_string()))?;
    if declared != verifier.algorithm() {
        return Err(SamlError::AlgorithmMismatch {
            expected: verifier.algorithm().uri().to_string(),
            actual: declared.uri().to_string(),
        });
    }
    let digest_algorithm = DigestAlgorithm::from_uri(envelope.digest_method())
        .ok_or_else(|| SamlError::UnsupportedAlgorithm(envelope.digest_method().to_string()))?;
    let signed_info_c14n = CanonicalizationAlgorithm::from_uri(envelope.canonicalization_method())
        .ok_or_else(|| {
            SamlError::UnsupportedAlgorithm(envelope.canonicalization_method().to_string())
        })?;

    let mut reference_c14n = CanonicalizationAlgorithm::C14n;
    for transform in envelope.transforms() {
        if transform == canonicalization_uris::ENVELOPED_SIGNATURE {
            continue;
        }
        policy.ensure_allowed(transform)?;
        reference_c14n = CanonicalizationAlgorithm::from_uri(transform)
            .ok_or_else(|| SamlError::UnsupportedAlgorithm(transform.clone()))?;
    }

    // Reference: the signed element minus this signature.
    let mut stripped = signed.clone();
    stripped
        .children
        .retain(|node| !matches!(node, XmlNode::Element(el) if el == signature_element));
    let inherited = document.inherited_namespaces(signed).unwrap_or_default();
    let canonical = xml::canonicalize_with_prefixes(
        &stripped,
        reference_c14n,
        &inherited,
        envelope.reference_prefixes(),
    );
    let digest = verifier.digest(digest_algorithm, canonical.as_bytes())?;
    if digest != envelope.digest_value() {
        return Err(failure("reference validation failed"));
    }

    // SignedInfo, in the context of the received tree.
    let signed_info = signature_element
        .first_child(DS_NS, "SignedInfo")
        .ok_or_else(|| SamlError::missing_element("Signature", "SignedInfo"))?;
    let inherited = document
        .inherited_namespaces(signed_info)
        .unwrap_or_default();
    let canonical = xml::canonicalize_with_prefixes(
        signed_info,
        signed_info_c14n,
        &inherited,
        envelope.signed_info_prefixes(),
    );
    if !verifier.verify(canonical.as_bytes(), envelope.signature_value())? {
        return Err(failure("signature value does not match"));
    }

    tracing::debug!(id, algorithm = declared.uri(), "signature verified");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{sign_element, test_keys, SigningOptions};
    use crate::types::{SAMLP_NS, SAML_NS, XS_NS};
    use saml_core::AlgorithmPolicy;

    fn assertion(id: &str) -> XmlElement {
        XmlElement::new(SAML_NS, "saml", "Assertion")
            .with_attr("ID", id)
            .with_attr("Version", "2.0")
            .with_child(XmlElement::new(SAML_NS, "saml", "Issuer").with_text("https://idp"))
            .with_child(
                XmlElement::new(SAML_NS, "saml", "Subject").with_child(
                    XmlElement::new(SAML_NS, "saml", "NameID").with_text("alice@example.com"),
                ),
            )
    }

    fn signed_rsa(id: &str) -> XmlElement {
        sign_element(
            assertion(id),
            &test_keys::idp_signer(),
            &SigningOptions::default(),
            &SamlContext::new(),
        )
        .unwrap()
    }

    /// Serializes, lets `edit` tamper with the text and parses again.
    fn tampered(signed: &XmlElement, edit: impl FnOnce(String) -> String) -> XmlElement {
        xml::parse(&edit(xml::to_string(signed))).unwrap()
    }

    #[test]
    fn rsa_roundtrip_through_text() {
        let signed = signed_rsa("_a1");
        let reparsed = xml::parse(&xml::to_string(&signed)).unwrap();
        verify_element(&reparsed, &test_keys::idp_verifier(), &SamlContext::new()).unwrap();
    }

    #[test]
    fn ecdsa_roundtrip() {
        let ctx = SamlContext::new();
        let signed =
            sign_element(assertion("_e1"), &test_keys::ec_signer(), &SigningOptions::default(), &ctx)
                .unwrap();
        verify_element(&signed, &test_keys::ec_verifier(), &ctx).unwrap();
    }

    #[test]
    fn modified_content_fails_reference() {
        let signed = signed_rsa("_a1");
        let forged = tampered(&signed, |s| s.replace("alice@", "mallory@"));
        let err = verify_element(&forged, &test_keys::idp_verifier(), &SamlContext::new())
            .unwrap_err();
        assert!(matches!(err, SamlError::SignatureVerification(ref m) if m.contains("reference")));
    }

    #[test]
    fn modified_signature_value_fails() {
        let mut signed = signed_rsa("_a1");
        if let Some(XmlNode::Element(sig)) = signed
            .children
            .iter_mut()
            .find(|n| matches!(n, XmlNode::Element(e) if e.is(DS_NS, "Signature")))
        {
            for node in &mut sig.children {
                if let XmlNode::Element(value) = node {
                    if value.is(DS_NS, "SignatureValue") {
                        let text = value.text();
                        let flipped = if text.starts_with('A') { "B" } else { "A" };
                        value.children = vec![XmlNode::Text(format!("{flipped}{}", &text[1..]))];
                    }
                }
            }
        }
        assert!(matches!(
            verify_element(&signed, &test_keys::idp_verifier(), &SamlContext::new()),
            Err(SamlError::SignatureVerification(_))
        ));
    }

    #[test]
    fn wrong_key_fails() {
        let signed = signed_rsa("_a1");
        assert!(matches!(
            verify_element(&signed, &test_keys::sp_verifier(), &SamlContext::new()),
            Err(SamlError::SignatureVerification(_))
        ));
    }

    #[test]
    fn declared_algorithm_must_match_the_key() {
        let signed = signed_rsa("_a1");
        assert!(matches!(
            verify_element(&signed, &test_keys::ec_verifier(), &SamlContext::new()),
            Err(SamlError::AlgorithmMismatch { .. })
        ));
    }

    #[test]
    fn blacklisted_algorithm_is_rejected_before_crypto() {
        let signed = signed_rsa("_a1");
        let ctx = SamlContext::new().with_policy(AlgorithmPolicy::from_uris([
            saml_core::algorithm::signature_uris::RSA_SHA256,
        ]));
        assert!(matches!(
            verify_element(&signed, &test_keys::idp_verifier(), &ctx),
            Err(SamlError::BlacklistedAlgorithm(_))
        ));
    }

    #[test]
    fn default_policy_blocks_rsa_sha1() {
        let signed = signed_rsa("_a1");
        let downgraded = tampered(&signed, |s| {
            s.replace(
                saml_core::algorithm::signature_uris::RSA_SHA256,
                saml_core::algorithm::signature_uris::RSA_SHA1,
            )
        });
        assert!(matches!(
            verify_element(&downgraded, &test_keys::idp_verifier(), &SamlContext::new()),
            Err(SamlError::BlacklistedAlgorithm(_))
        ));
    }

    #[test]
    fn comment_inside_text_keeps_signature_valid() {
        let signed = signed_rsa("_a1");
        let commented = tampered(&signed, |s| s.replace("alice@", "alice<!-- x -->@"));
        verify_element(&commented, &test_keys::idp_verifier(), &SamlContext::new()).unwrap();

        let name_id = commented
            .first_child(SAML_NS, "Subject")
            .and_then(|s| s.first_child(SAML_NS, "NameID"))
            .unwrap();
        assert_eq!(name_id.text(), "alice@example.com");
    }

    #[test]
    fn prefix_list_binds_namespaces_used_only_in_values() {
        let ctx = SamlContext::new();
        let mut element = assertion("_a1");
        element.declare_namespace(Some("xs"), XS_NS);
        let options = SigningOptions::default().with_inclusive_prefixes(["xs"]);
        let signed = sign_element(element, &test_keys::idp_signer(), &options, &ctx).unwrap();

        let reparsed = xml::parse(&xml::to_string(&signed)).unwrap();
        verify_element(&reparsed, &test_keys::idp_verifier(), &ctx).unwrap();
        let envelope =
            SignatureEnvelope::from_xml(reparsed.first_child(DS_NS, "Signature").unwrap(), &ctx)
                .unwrap();
        assert_eq!(envelope.reference_prefixes(), ["xs"]);
        assert_eq!(envelope.signed_info_prefixes(), ["xs"]);

        // The listed binding is part of the digest
        let rebound = tampered(&signed, |s| s.replace(XS_NS, "urn:example:other"));
        assert!(matches!(
            verify_element(&rebound, &test_keys::idp_verifier(), &ctx),
            Err(SamlError::SignatureVerification(_))
        ));
    }

    #[test]
    fn duplicated_id_in_document_is_rejected() {
        let signed = signed_rsa("_a1");
        let evil = assertion("_a1");
        let response = XmlElement::new(SAMLP_NS, "samlp", "Response")
            .with_attr("ID", "_r1")
            .with_child(evil)
            .with_child(signed);
        let response = xml::parse(&xml::to_string(&response)).unwrap();
        let embedded = response.child_elements().nth(1).unwrap();

        assert!(matches!(
            verify_in_document(&response, embedded, &test_keys::idp_verifier(), &SamlContext::new()),
            Err(SamlError::SignatureVerification(_))
        ));
    }

    #[test]
    fn embedded_signature_verifies_in_document() {
        let signed = signed_rsa("_a1");
        let response = XmlElement::new(SAMLP_NS, "samlp", "Response")
            .with_attr("ID", "_r1")
            .with_child(XmlElement::new(SAML_NS, "saml", "Issuer").with_text("https://idp"))
            .with_child(signed);
        let response = xml::parse(&xml::to_string(&response)).unwrap();
        let embedded = response.first_child(SAML_NS, "Assertion").unwrap();
        verify_in_document(&response, embedded, &test_keys::idp_verifier(), &SamlContext::new())
            .unwrap();
    }

    #[test]
    fn unsigned_element_is_an_error() {
        assert!(matches!(
            verify_element(&assertion("_a1"), &test_keys::idp_verifier(), &SamlContext::new()),
            Err(SamlError::SignatureVerification(_))
        ));
    }

    #[test]
    fn reference_to_other_id_is_rejected() {
        let signed = signed_rsa("_a1");
        let moved = tampered(&signed, |s| s.replacen("ID=\"_a1\"", "ID=\"_a2\"", 1));
        assert!(matches!(
            verify_element(&moved, &test_keys::idp_verifier(), &SamlContext::new()),
            Err(SamlError::SignatureVerification(_))
        ));
    }
}
