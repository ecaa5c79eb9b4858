//! End-to-end object model scenarios.

use saml_core::{ContentEncryptionAlgorithm, KeyTransportAlgorithm};
use saml_crypto::AesGcmCipher;
use saml_protocol::bindings::RelayState;
use saml_protocol::xml::{self, XmlElement};
use saml_protocol::{
    epti, Assertion, Attribute, AttributeStatement, AttributeValue, AuthnContext, AuthnStatement,
    Conditions, EncryptedAssertion, FromXml, NameId, ProtocolViolation, SamlError,
    StructuralViolation, ToXml, SAML_NS,
};

use crate::common::TestEnv;

fn texts<'a>(parent: &'a XmlElement, name: &'a str) -> Vec<String> {
    parent.children_named(SAML_NS, name).map(XmlElement::text).collect()
}

#[test]
fn test_assertion_issuer_and_audience_order() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let assertion = Assertion::builder(NameId::new("testIssuer"), env.now)
        .conditions(Conditions::new().with_audience_restriction(["audience1", "audience2"]))
        .statement(AuthnStatement::new(
            env.now,
            AuthnContext::from_class_ref("someAuthnContext"),
        ))
        .build()?;

    let serialized = assertion.to_xml_string();
    let root = xml::parse(&serialized)?;
    assert_eq!(texts(&root, "Issuer"), vec!["testIssuer".to_string()]);

    let restriction = root
        .first_child(SAML_NS, "Conditions")
        .and_then(|c| c.first_child(SAML_NS, "AudienceRestriction"))
        .expect("audience restriction present");
    assert_eq!(texts(restriction, "Audience"), vec!["audience1", "audience2"]);

    let parsed = Assertion::from_xml_str(&serialized, &env.ctx)?;
    assert_eq!(parsed, assertion);
    assert_eq!(
        parsed.authn_statement().and_then(|s| s.authn_context.class_ref()),
        Some("someAuthnContext")
    );
    Ok(())
}

#[test]
fn test_authn_context_decl_and_decl_ref_conflict() {
    let decl = XmlElement::new(SAML_NS, "saml", "AuthnContextDecl");
    let result = AuthnContext::new(
        None,
        Some(decl),
        Some("urn:example:decl".to_string()),
        Vec::new(),
    );
    assert!(matches!(
        result,
        Err(SamlError::Structural(StructuralViolation::ConflictingAuthnContextDecl))
    ));
}

#[test]
fn test_relay_state_over_eighty_bytes() {
    assert!(matches!(
        RelayState::new("x".repeat(81)),
        Err(SamlError::Protocol(ProtocolViolation::RelayStateTooLong(81)))
    ));
}

#[test]
fn test_targeted_id_requires_name_id_values() {
    let result = Attribute::new(epti::URN_OID, vec![AttributeValue::from("plain")]);
    match result {
        Err(SamlError::Structural(StructuralViolation::NonIdentifierValue { attribute, index })) => {
            assert_eq!(attribute, epti::URN_OID);
            assert_eq!(index, 0);
        }
        other => panic!("expected NonIdentifierValue, got {other:?}"),
    }

    let valid = Attribute::new(
        epti::URN_OID,
        vec![AttributeValue::Identifier(
            NameId::persistent("a8f3c1").with_name_qualifier("https://idp.example.com").into(),
        )],
    );
    assert!(valid.is_ok());
}

#[test]
fn test_encrypted_assertion_decrypts_to_identical_xml() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let transport = KeyTransportAlgorithm::RsaOaepMgf1p;
    let assertion = env.assertion();
    let original = assertion.to_xml_string();

    let encrypted = EncryptedAssertion::encrypt_for(
        &assertion,
        ContentEncryptionAlgorithm::Aes256Gcm,
        &AesGcmCipher,
        &env.sp_wrapper(transport),
        &env.ctx,
    )?;
    let wire = encrypted.to_xml_string();
    assert!(!wire.contains("alice@example.com"));

    let received = EncryptedAssertion::from_xml_str(&wire, &env.ctx)?;
    let decrypted = received.decrypt(
        transport,
        &env.sp_unwrapper(transport),
        &AesGcmCipher,
        &env.ctx,
    )?;
    assert_eq!(decrypted.to_xml_string(), original);
    assert_eq!(decrypted, assertion);
    Ok(())
}

#[test]
fn test_attribute_statement_roundtrip_with_mixed_values() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let statement = AttributeStatement::new(vec![
        Attribute::strings("mail", ["alice@example.com", "a@example.org"])?,
        Attribute::new("age", vec![AttributeValue::Integer(42)])?,
    ])?;
    let assertion = Assertion::builder(NameId::entity("https://idp.example.com"), env.now)
        .statement(statement)
        .build()?;

    let parsed = Assertion::from_xml_str(&assertion.to_xml_string(), &env.ctx)?;
    let statement = parsed.attribute_statements().next().expect("attribute statement");
    assert_eq!(
        statement
            .attribute("mail")
            .map(|a| a.string_values().collect::<Vec<_>>()),
        Some(vec!["alice@example.com", "a@example.org"])
    );
    assert_eq!(
        statement.attribute("age").map(Attribute::values),
        Some(&[AttributeValue::Integer(42)][..])
    );
    Ok(())
}

#[test]
fn test_assertion_validation_window() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let assertion = env.assertion();
    assertion.validate_at(&env.ctx, Some(crate::common::SP_ENTITY))?;

    assert!(matches!(
        assertion.validate_at(&env.ctx, Some("https://other.example.com")),
        Err(SamlError::InvalidAudience(_))
    ));

    let later = saml_protocol::SamlContext::new().with_clock(saml_core::FixedClock::new(
        env.now + chrono::Duration::hours(1),
    ));
    assert!(matches!(
        assertion.validate_at(&later, None),
        Err(SamlError::AssertionExpired)
    ));
    Ok(())
}
