//! Web browser SSO: redirect request, POST response, signatures end to end.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use saml_core::{KeyTransportAlgorithm, Signer};
use saml_crypto::AesGcmCipher;
use saml_protocol::bindings::{HttpPostBinding, HttpRedirectBinding, RelayState, SamlMessageType};
use saml_protocol::{
    AssertionConsumerService, AuthnRequest, EncryptedAssertion, FromXml, Response, SamlBinding,
    SamlError, Signable, SigningOptions, ToXml,
};

use crate::common::{TestEnv, IDP_ENTITY, SP_ACS, SP_ENTITY};

const IDP_SSO: &str = "https://idp.example.com/sso";

fn form_value<'a>(html: &'a str, name: &str) -> &'a str {
    let marker = format!("name=\"{name}\" value=\"");
    let start = html.find(&marker).expect("form field present") + marker.len();
    let end = html[start..].find('"').expect("closing quote");
    &html[start..start + end]
}

#[test]
fn test_redirect_request_post_response() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let transport = KeyTransportAlgorithm::RsaOaepMgf1p;

    // Service provider
    let request = AuthnRequest::new(env.header(SP_ENTITY).with_destination(IDP_SSO)?)
        .with_acs_url(SP_ACS)?
        .with_binding(SamlBinding::HttpPost);
    let relay_state = RelayState::new("/app/home")?;
    let url = HttpRedirectBinding::encode_signed(
        &request.to_xml_string(),
        SamlMessageType::Request,
        IDP_SSO,
        Some(&relay_state),
        &env.sp_signer(),
        &env.ctx,
    )?;

    // Identity provider
    let received = HttpRedirectBinding::decode_url(&url)?;
    received.verify(&env.sp_verifier(), &env.ctx)?;
    let authn_request = received.message.parse(&env.ctx)?.into_authn_request()?;
    assert_eq!(authn_request, request);
    let Some(AssertionConsumerService::Url(acs)) = authn_request.assertion_consumer_service() else {
        panic!("request names no consumer URL");
    };

    let assertion = env
        .assertion()
        .sign(&env.idp_signer(), &SigningOptions::default(), &env.ctx)?;
    let encrypted = EncryptedAssertion::encrypt_for(
        &assertion,
        saml_core::ContentEncryptionAlgorithm::Aes256Gcm,
        &AesGcmCipher,
        &env.sp_wrapper(transport),
        &env.ctx,
    )?;
    let response = Response::success(env.header(IDP_ENTITY).with_destination(acs.as_str())?)
        .in_response_to(authn_request.header().id())
        .with_encrypted_assertion(encrypted)
        .sign(&env.idp_signer(), &SigningOptions::default(), &env.ctx)?;
    let html = HttpPostBinding::encode_response(
        &response.to_xml_string(),
        acs,
        received.message.relay_state.as_ref(),
    );

    // Service provider
    let decoded = HttpPostBinding::decode(
        None,
        Some(form_value(&html, "SAMLResponse")),
        Some(form_value(&html, "RelayState")),
    )?;
    assert_eq!(decoded.relay_state, Some(relay_state));
    let response = decoded.parse(&env.ctx)?.into_response()?;
    response.verify(&env.idp_verifier(), &env.ctx)?;
    assert!(response.is_success());
    assert_eq!(response.in_response_to_id(), Some(request.header().id()));

    let assertions =
        response.decrypt_assertions(transport, &env.sp_unwrapper(transport), &AesGcmCipher, &env.ctx)?;
    assert_eq!(assertions.len(), 1);
    assertions[0].verify(&env.idp_verifier(), &env.ctx)?;
    assertions[0].validate_at(&env.ctx, Some(SP_ENTITY))?;
    Ok(())
}

#[test]
fn test_tampered_content_fails_reference_check() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let response = Response::success(env.header(IDP_ENTITY))
        .with_assertion(env.assertion())
        .sign(&env.idp_signer(), &SigningOptions::default(), &env.ctx)?;
    let tampered = response
        .to_xml_string()
        .replace("alice@example.com", "mallory@example.com");

    let parsed = Response::from_xml_str(&tampered, &env.ctx)?;
    assert!(matches!(
        parsed.verify(&env.idp_verifier(), &env.ctx),
        Err(SamlError::SignatureVerification(_))
    ));
    Ok(())
}

#[test]
fn test_tampered_signature_value_fails() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let response = Response::success(env.header(IDP_ENTITY))
        .sign(&env.idp_signer(), &SigningOptions::default(), &env.ctx)?;
    let xml = response.to_xml_string();
    let marker = "SignatureValue>";
    let at = xml.find(marker).expect("signature value present") + marker.len();
    let flipped = if xml[at..].starts_with('A') { "B" } else { "A" };
    let tampered = format!("{}{}{}", &xml[..at], flipped, &xml[at + 1..]);

    let parsed = Response::from_xml_str(&tampered, &env.ctx)?;
    assert!(parsed.verify(&env.idp_verifier(), &env.ctx).is_err());
    Ok(())
}

#[test]
fn test_unrelated_key_fails() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let assertion = env
        .assertion()
        .sign(&env.idp_signer(), &SigningOptions::default(), &env.ctx)?;
    assert!(matches!(
        assertion.verify(&env.sp_verifier(), &env.ctx),
        Err(SamlError::SignatureVerification(_))
    ));
    Ok(())
}

#[test]
fn test_verifier_of_other_algorithm_is_mismatch() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let assertion = env
        .assertion()
        .sign(&env.idp_signer(), &SigningOptions::default(), &env.ctx)?;
    assert!(matches!(
        assertion.verify(&env.ec_verifier(), &env.ctx),
        Err(SamlError::AlgorithmMismatch { .. })
    ));
    Ok(())
}

#[test]
fn test_ecdsa_signed_assertion() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let assertion = env
        .assertion()
        .sign(&env.ec_signer(), &SigningOptions::default(), &env.ctx)?;
    let parsed = saml_protocol::Assertion::from_xml_str(&assertion.to_xml_string(), &env.ctx)?;
    parsed.verify(&env.ec_verifier(), &env.ctx)?;
    Ok(())
}

#[test]
fn test_unsigned_message_never_verifies() {
    let env = TestEnv::new();
    let response = Response::success(env.header(IDP_ENTITY));
    assert!(!response.is_signed());
    assert!(matches!(
        response.verify(&env.idp_verifier(), &env.ctx),
        Err(SamlError::SignatureVerification(_))
    ));
}

#[test]
fn test_signature_over_reordered_query_fails() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let request = AuthnRequest::new(env.header(SP_ENTITY));
    let url = HttpRedirectBinding::encode(
        &request.to_xml_string(),
        SamlMessageType::Request,
        IDP_SSO,
        Some(&RelayState::new("abc")?),
    )?;
    let (_, query) = url.split_once('?').expect("query present");
    let sig_alg = urlencoding::encode(env.sp_signer().algorithm().uri()).into_owned();

    // SigAlg ahead of the message parameter
    let signed = format!("SigAlg={sig_alg}&{query}");
    let signature = env.sp_signer().sign(signed.as_bytes())?;
    let query = format!(
        "{signed}&Signature={}",
        urlencoding::encode(&STANDARD.encode(signature))
    );

    let received = HttpRedirectBinding::decode_query(&query)?;
    assert!(matches!(
        received.verify(&env.sp_verifier(), &env.ctx),
        Err(SamlError::SignatureVerification(_))
    ));
    Ok(())
}

#[test]
fn test_redirect_parameters_in_any_arrival_order_verify() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let request = AuthnRequest::new(env.header(SP_ENTITY));
    let url = HttpRedirectBinding::encode_signed(
        &request.to_xml_string(),
        SamlMessageType::Request,
        IDP_SSO,
        Some(&RelayState::new("abc")?),
        &env.sp_signer(),
        &env.ctx,
    )?;
    let (_, query) = url.split_once('?').expect("query present");
    let mut pairs: Vec<&str> = query.split('&').collect();
    pairs.swap(0, 1);

    let received = HttpRedirectBinding::decode_query(&pairs.join("&"))?;
    received.verify(&env.sp_verifier(), &env.ctx)?;
    Ok(())
}
