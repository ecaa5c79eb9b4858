//! Artifact resolution messages and the type 0x0004 artifact.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use saml_core::{DigestAlgorithm, Digester};

use crate::context::SamlContext;
use crate::error::{ProtocolViolation, SamlError, SamlResult};
use crate::signature::detach;
use crate::xml::XmlElement;

use super::{
    exactly_one, is_header_child, non_empty, open_status_response, opt_string, parse_status,
    samlp, signable_message, text_element, FromXml, MessageHeader, ProtocolMessage, Status, ToXml,
    SAMLP_NS,
};

/// Type code of the only artifact format defined by SAML 2.0.
pub const ARTIFACT_TYPE_CODE: u16 = 0x0004;

const ARTIFACT_LEN: usize = 44;

/// A decoded type 0x0004 artifact.
///
/// Layout: type code (2) ‖ endpoint index (2) ‖ SHA-1 of the issuer's
/// entity ID (20) ‖ message handle (20).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamlArtifact {
    endpoint_index: u16,
    source_id: [u8; 20],
    message_handle: [u8; 20],
}

impl SamlArtifact {
    /// Builds an artifact for a message issued by `entity_id`.
    pub fn new(
        entity_id: &str,
        endpoint_index: u16,
        message_handle: [u8; 20],
        digester: &dyn Digester,
    ) -> SamlResult<Self> {
        let digest = digester.digest(DigestAlgorithm::Sha1, entity_id.as_bytes())?;
        let source_id = <[u8; 20]>::try_from(digest.as_slice())
            .map_err(|_| SamlError::Crypto("SHA-1 digest is not 20 bytes".into()))?;
        Ok(Self {
            endpoint_index,
            source_id,
            message_handle,
        })
    }

    /// Decodes the base64 form.
    pub fn parse(encoded: &str) -> SamlResult<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ProtocolViolation::InvalidArtifact(e.to_string()))?;
        if bytes.len() != ARTIFACT_LEN {
            return Err(ProtocolViolation::InvalidArtifact(format!(
                "{} bytes instead of {ARTIFACT_LEN}",
                bytes.len()
            ))
            .into());
        }
        let type_code = u16::from_be_bytes([bytes[0], bytes[1]]);
        if type_code != ARTIFACT_TYPE_CODE {
            return Err(
                ProtocolViolation::InvalidArtifact(format!("type code {type_code:#06x}")).into(),
            );
        }
        let mut source_id = [0u8; 20];
        source_id.copy_from_slice(&bytes[4..24]);
        let mut message_handle = [0u8; 20];
        message_handle.copy_from_slice(&bytes[24..44]);
        Ok(Self {
            endpoint_index: u16::from_be_bytes([bytes[2], bytes[3]]),
            source_id,
            message_handle,
        })
    }

    /// The base64 form.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut bytes = Vec::with_capacity(ARTIFACT_LEN);
        bytes.extend_from_slice(&ARTIFACT_TYPE_CODE.to_be_bytes());
        bytes.extend_from_slice(&self.endpoint_index.to_be_bytes());
        bytes.extend_from_slice(&self.source_id);
        bytes.extend_from_slice(&self.message_handle);
        STANDARD.encode(bytes)
    }

    /// Index of the issuer's artifact resolution endpoint.
    #[must_use]
    pub fn endpoint_index(&self) -> u16 {
        self.endpoint_index
    }

    /// SHA-1 of the issuer's entity ID.
    #[must_use]
    pub fn source_id(&self) -> &[u8; 20] {
        &self.source_id
    }

    /// The issuer's handle for the referenced message.
    #[must_use]
    pub fn message_handle(&self) -> &[u8; 20] {
        &self.message_handle
    }

    /// Returns true if `entity_id` issued this artifact.
    pub fn is_from(&self, entity_id: &str, digester: &dyn Digester) -> SamlResult<bool> {
        let digest = digester.digest(DigestAlgorithm::Sha1, entity_id.as_bytes())?;
        Ok(digest.as_slice() == self.source_id)
    }
}

/// `samlp:ArtifactResolve`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactResolve {
    header: MessageHeader,
    artifact: String,
}

signable_message!(ArtifactResolve);

impl ArtifactResolve {
    /// Creates a resolve request for `artifact`.
    #[must_use]
    pub fn new(header: MessageHeader, artifact: &SamlArtifact) -> Self {
        Self {
            header,
            artifact: artifact.encode(),
        }
    }

    /// The common message header.
    #[must_use]
    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    /// The artifact as carried.
    #[must_use]
    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    /// The decoded artifact.
    pub fn decoded_artifact(&self) -> SamlResult<SamlArtifact> {
        SamlArtifact::parse(&self.artifact)
    }
}

impl ToXml for ArtifactResolve {
    fn to_element(&self) -> XmlElement {
        if let Some(source) = self.header.source() {
            return source.clone();
        }
        let mut el = self.header.open("ArtifactResolve");
        el.push_element(text_element(samlp("Artifact"), &self.artifact));
        el
    }
}

impl FromXml for ArtifactResolve {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        let header = MessageHeader::parse(element, "ArtifactResolve", ctx)?;
        let artifact = exactly_one(element, SAMLP_NS, "Artifact")?.text();
        non_empty("Artifact", &artifact)?;
        Ok(Self { header, artifact })
    }
}

/// `samlp:ArtifactResponse`.
///
/// The carried message is kept as an element until the caller asks for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactResponse {
    header: MessageHeader,
    in_response_to: Option<String>,
    status: Status,
    message: Option<XmlElement>,
}

signable_message!(ArtifactResponse);

impl ArtifactResponse {
    /// Creates a response with the given status and no message.
    #[must_use]
    pub fn new(header: MessageHeader, status: Status) -> Self {
        Self {
            header,
            in_response_to: None,
            status,
            message: None,
        }
    }

    /// Sets the request ID this response is for.
    #[must_use]
    pub fn in_response_to(mut self, request_id: impl Into<String>) -> Self {
        self.in_response_to = Some(request_id.into());
        self.header.clear_signature();
        self
    }

    /// Embeds the resolved message.
    #[must_use]
    pub fn with_message(mut self, message: &impl ToXml) -> Self {
        self.message = Some(message.to_element());
        self.header.clear_signature();
        self
    }

    /// The common message header.
    #[must_use]
    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    /// `InResponseTo`.
    #[must_use]
    pub fn in_response_to_id(&self) -> Option<&str> {
        self.in_response_to.as_deref()
    }

    /// The status.
    #[must_use]
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// The embedded element, as carried.
    #[must_use]
    pub fn message_element(&self) -> Option<&XmlElement> {
        self.message.as_ref()
    }

    /// Parses the embedded protocol message.
    pub fn message(&self, ctx: &SamlContext) -> SamlResult<Option<ProtocolMessage>> {
        self.message
            .as_ref()
            .map(|el| ProtocolMessage::from_xml(el, ctx))
            .transpose()
    }
}

impl ToXml for ArtifactResponse {
    fn to_element(&self) -> XmlElement {
        if let Some(source) = self.header.source() {
            return source.clone();
        }
        let mut el = open_status_response(
            &self.header,
            "ArtifactResponse",
            self.in_response_to.as_deref(),
            &self.status,
        );
        if let Some(message) = &self.message {
            el.push_element(message.clone());
        }
        el
    }
}

impl FromXml for ArtifactResponse {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        let header = MessageHeader::parse(element, "ArtifactResponse", ctx)?;
        let status = parse_status(element, ctx)?;
        let mut rest = element
            .child_elements()
            .filter(|c| !is_header_child(c) && !c.is(SAMLP_NS, "Status"));
        let message = rest.next().map(|c| detach(element, c));
        if let Some(extra) = rest.next() {
            return Err(SamlError::too_many("ArtifactResponse", &extra.name, 1));
        }
        Ok(Self {
            header,
            in_response_to: opt_string(element, "InResponseTo"),
            status,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{test_keys, Signable, SigningOptions};
    use crate::types::{Assertion, NameId, Response};
    use chrono::{DateTime, TimeZone, Utc};
    use saml_crypto::AwsLcDigester;

    const IDP: &str = "https://idp.example.com";

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn header(id: &str) -> MessageHeader {
        MessageHeader::new(instant())
            .with_id(id)
            .unwrap()
            .with_issuer(NameId::new(IDP))
            .unwrap()
    }

    fn artifact() -> SamlArtifact {
        SamlArtifact::new(IDP, 1, [7u8; 20], &AwsLcDigester).unwrap()
    }

    #[test]
    fn artifact_layout() {
        let encoded = artifact().encode();
        let bytes = STANDARD.decode(&encoded).unwrap();
        assert_eq!(bytes.len(), 44);
        assert_eq!(&bytes[..2], &[0x00, 0x04]);
        assert_eq!(&bytes[2..4], &[0x00, 0x01]);
        assert_eq!(&bytes[24..], &[7u8; 20]);

        let parsed = SamlArtifact::parse(&encoded).unwrap();
        assert_eq!(parsed, artifact());
        assert!(parsed.is_from(IDP, &AwsLcDigester).unwrap());
        assert!(!parsed.is_from("https://other.example.com", &AwsLcDigester).unwrap());
    }

    #[test]
    fn wrong_length_and_type_are_rejected() {
        assert!(matches!(
            SamlArtifact::parse(&STANDARD.encode([0u8; 43])),
            Err(SamlError::Protocol(ProtocolViolation::InvalidArtifact(_)))
        ));
        let mut bytes = STANDARD.decode(artifact().encode()).unwrap();
        bytes[1] = 0x05;
        assert!(matches!(
            SamlArtifact::parse(&STANDARD.encode(bytes)),
            Err(SamlError::Protocol(ProtocolViolation::InvalidArtifact(_)))
        ));
    }

    #[test]
    fn resolve_roundtrip() {
        let resolve = ArtifactResolve::new(header("_resolve1"), &artifact());
        let parsed = ArtifactResolve::from_xml_str(&resolve.to_xml_string(), &SamlContext::new()).unwrap();
        assert_eq!(parsed, resolve);
        assert_eq!(parsed.decoded_artifact().unwrap(), artifact());
    }

    #[test]
    fn response_carries_a_signed_message() {
        let ctx = SamlContext::new();
        let inner = Response::success(header("_inner")).with_assertion(
            Assertion::builder(NameId::new(IDP), instant())
                .id("_a1")
                .build()
                .unwrap(),
        );
        let inner = inner
            .sign(&test_keys::idp_signer(), &SigningOptions::default(), &ctx)
            .unwrap();
        let response = ArtifactResponse::new(header("_outer"), Status::success())
            .in_response_to("_resolve1")
            .with_message(&inner);

        let parsed = ArtifactResponse::from_xml_str(&response.to_xml_string(), &ctx).unwrap();
        let message = parsed.message(&ctx).unwrap().unwrap().into_response().unwrap();
        assert_eq!(message.header().id(), "_inner");
        message.verify(&test_keys::idp_verifier(), &ctx).unwrap();
    }

    #[test]
    fn empty_response_has_no_message() {
        let response = ArtifactResponse::new(header("_outer"), Status::success());
        let parsed = ArtifactResponse::from_xml_str(&response.to_xml_string(), &SamlContext::new()).unwrap();
        assert!(parsed.message(&SamlContext::new()).unwrap().is_none());
    }
}
