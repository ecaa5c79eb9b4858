//! Artifact resolution over SOAP, ECP and single logout.

use saml_crypto::AwsLcDigester;
use saml_protocol::bindings::{
    EcpHeaders, EcpRequest, FaultCode, HttpArtifactBinding, HttpRedirectBinding, PaosRequest,
    RelayState, SoapEnvelope,
};
use saml_protocol::{
    status_codes, sub_status_codes, ArtifactResolve, ArtifactResponse, AuthnRequest, FromXml,
    IdpEntry, IdpList, LogoutReason, LogoutRequest, LogoutResponse, NameId, ProtocolMessage,
    ProtocolViolation, Response, SamlError, Signable, SigningOptions, Status, ToXml,
};

use crate::common::{TestEnv, IDP_ENTITY, SP_ACS, SP_ENTITY};

#[test]
fn test_artifact_resolution_over_soap() -> anyhow::Result<()> {
    let env = TestEnv::new();

    // Identity provider stores the response and sends the artifact
    let response = Response::success(env.header(IDP_ENTITY))
        .with_assertion(env.assertion())
        .sign(&env.idp_signer(), &SigningOptions::default(), &env.ctx)?;
    let artifact = HttpArtifactBinding::issue(IDP_ENTITY, 1, &AwsLcDigester)?;
    let url = HttpArtifactBinding::encode(SP_ACS, &artifact, Some(&RelayState::new("k1")?));

    // Service provider resolves it
    let (received, relay_state) =
        HttpArtifactBinding::decode(url.split_once('?').map_or("", |(_, q)| q))?;
    assert_eq!(relay_state.map(|r| r.as_str().to_string()), Some("k1".to_string()));
    assert!(received.is_from(IDP_ENTITY, &AwsLcDigester)?);
    let resolve = ArtifactResolve::new(env.header(SP_ENTITY), &received)
        .sign(&env.sp_signer(), &SigningOptions::default(), &env.ctx)?;
    let request_xml = SoapEnvelope::new(&resolve).to_xml_string();

    // Identity provider answers on the back channel
    let envelope = SoapEnvelope::from_xml_str(&request_xml, &env.ctx)?;
    let ProtocolMessage::ArtifactResolve(resolve) = envelope.message(&env.ctx)? else {
        panic!("expected ArtifactResolve");
    };
    resolve.verify(&env.sp_verifier(), &env.ctx)?;
    assert_eq!(resolve.decoded_artifact()?, artifact);
    let answer = ArtifactResponse::new(env.header(IDP_ENTITY), Status::success())
        .in_response_to(resolve.header().id())
        .with_message(&response)
        .sign(&env.idp_signer(), &SigningOptions::default(), &env.ctx)?;
    let answer_xml = SoapEnvelope::new(&answer).to_xml_string();

    // Service provider unwraps both layers
    let envelope = SoapEnvelope::from_xml_str(&answer_xml, &env.ctx)?;
    let ProtocolMessage::ArtifactResponse(answer) = envelope.message(&env.ctx)? else {
        panic!("expected ArtifactResponse");
    };
    answer.verify(&env.idp_verifier(), &env.ctx)?;
    let inner = answer
        .message(&env.ctx)?
        .expect("artifact response carries a message")
        .into_response()?;
    inner.verify(&env.idp_verifier(), &env.ctx)?;
    assert_eq!(inner.assertions().count(), 1);
    Ok(())
}

#[test]
fn test_soap_fault_from_error() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let error = SamlError::SignatureVerification("bad".into());
    let fault = SoapEnvelope::fault(FaultCode::for_error(&error), &error.to_string());
    let parsed = SoapEnvelope::from_xml_str(&fault.to_xml_string(), &env.ctx)?;
    assert!(matches!(
        parsed.message(&env.ctx),
        Err(SamlError::Protocol(ProtocolViolation::SoapFault { .. }))
    ));
    Ok(())
}

#[test]
fn test_ecp_request_envelope() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let request = AuthnRequest::new(env.header(SP_ENTITY)).with_acs_url(SP_ACS)?;
    let headers = EcpHeaders {
        paos: Some(PaosRequest {
            response_consumer_url: SP_ACS.to_string(),
            message_id: None,
        }),
        request: Some(EcpRequest {
            issuer: NameId::entity(SP_ENTITY),
            provider_name: None,
            is_passive: false,
            idp_list: Some(IdpList::new(vec![IdpEntry::new(IDP_ENTITY)])?),
        }),
        response: None,
        relay_state: Some(RelayState::new("ecp")?),
    };
    let xml = headers.apply(SoapEnvelope::new(&request)).to_xml_string();

    let envelope = SoapEnvelope::from_xml_str(&xml, &env.ctx)?;
    let received = envelope.ecp_headers(&env.ctx)?;
    assert_eq!(received, headers);
    assert_eq!(envelope.message(&env.ctx)?.into_authn_request()?, request);
    Ok(())
}

#[test]
fn test_logout_round_trip_over_redirect() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let request = LogoutRequest::new(
        env.header(SP_ENTITY),
        NameId::email("alice@example.com"),
    )
    .with_session_index("_session1")
    .with_reason(LogoutReason::User);
    let url = HttpRedirectBinding::encode_signed(
        &request.to_xml_string(),
        saml_protocol::bindings::SamlMessageType::Request,
        "https://idp.example.com/slo",
        None,
        &env.sp_signer(),
        &env.ctx,
    )?;

    let received = HttpRedirectBinding::decode_url(&url)?;
    received.verify(&env.sp_verifier(), &env.ctx)?;
    let ProtocolMessage::LogoutRequest(logout) = received.message.parse(&env.ctx)? else {
        panic!("expected LogoutRequest");
    };
    assert_eq!(logout.session_indexes(), ["_session1".to_string()]);
    assert!(!logout.is_expired(&env.ctx));

    let answer = LogoutResponse::partial_logout(env.header(IDP_ENTITY))
        .in_response_to(logout.header().id());
    let url = HttpRedirectBinding::encode_response(&answer.to_xml_string(), SP_ACS, None)?;
    let received = HttpRedirectBinding::decode_url(&url)?;
    let ProtocolMessage::LogoutResponse(parsed) = received.message.parse(&env.ctx)? else {
        panic!("expected LogoutResponse");
    };
    assert!(parsed.is_success());
    assert_eq!(parsed.status().code.value, status_codes::SUCCESS);
    assert_eq!(
        parsed.status().code.sub_codes.first().map(String::as_str),
        Some(sub_status_codes::PARTIAL_LOGOUT)
    );
    Ok(())
}
