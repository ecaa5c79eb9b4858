//! SOAP 1.1 binding and the ECP profile headers.
//!
//! The SOAP binding carries one SAML message in the envelope body, as used
//! by artifact resolution and attribute queries. The enhanced client
//! profile (ECP) adds PAOS and `ecp:` header blocks that carry the IdP
//! list, the relay state and the consumer URL outside the message.

use crate::context::SamlContext;
use crate::error::{ProtocolViolation, SamlError, SamlResult};
use crate::signature::detach;
use crate::types::{
    at_most_one, exactly_one, expect_element, opt_bool, opt_string, status_codes, FromXml,
    IdpList, NameId, ProtocolMessage, ToXml, ECP_NS, PAOS_NS, SAMLP_NS, SAML_NS, SOAP_ENV_NS,
};
use crate::xml::XmlElement;

use super::RelayState;

/// SOAP actor addressing the next hop.
pub const SOAP_ACTOR_NEXT: &str = "http://schemas.xmlsoap.org/soap/actor/next";

/// Media type of PAOS-capable requests.
pub const PAOS_MEDIA_TYPE: &str = "application/vnd.paos+xml";

fn soap(name: &str) -> XmlElement {
    XmlElement::new(SOAP_ENV_NS, "soap", name)
}

/// Marks a header block as mandatory for the next actor.
fn header_block(namespace: &str, prefix: &str, name: &str) -> XmlElement {
    let mut el = XmlElement::new(namespace, prefix, name);
    el.set_attr_ns(SOAP_ENV_NS, "soap", "mustUnderstand", "1");
    el.set_attr_ns(SOAP_ENV_NS, "soap", "actor", SOAP_ACTOR_NEXT);
    el
}

fn fault_field(fault: &XmlElement, name: &str) -> String {
    fault
        .child_elements()
        .find(|el| el.namespace.is_none() && el.name == name)
        .map(XmlElement::text)
        .unwrap_or_default()
}

/// SOAP 1.1 fault codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    /// The message was malformed or not acceptable.
    Client,
    /// The receiver failed to process a valid message.
    Server,
    /// A mandatory header was not understood.
    MustUnderstand,
    /// The envelope namespace is wrong.
    VersionMismatch,
}

impl FaultCode {
    fn local_name(self) -> &'static str {
        match self {
            Self::Client => "Client",
            Self::Server => "Server",
            Self::MustUnderstand => "MustUnderstand",
            Self::VersionMismatch => "VersionMismatch",
        }
    }

    /// The code a responder uses to report `error`.
    #[must_use]
    pub fn for_error(error: &SamlError) -> Self {
        if error.status_code() == status_codes::REQUESTER {
            Self::Client
        } else {
            Self::Server
        }
    }
}

/// A SOAP 1.1 envelope with exactly one body element.
#[derive(Debug, Clone, PartialEq)]
pub struct SoapEnvelope {
    headers: Vec<XmlElement>,
    body: XmlElement,
}

impl SoapEnvelope {
    /// Wraps a SAML message.
    #[must_use]
    pub fn new(message: &impl ToXml) -> Self {
        Self {
            headers: Vec::new(),
            body: message.to_element(),
        }
    }

    /// An envelope whose body is a `soap:Fault`.
    #[must_use]
    pub fn fault(code: FaultCode, message: &str) -> Self {
        let fault = soap("Fault")
            .with_child(
                XmlElement::unqualified("faultcode")
                    .with_text(&format!("soap:{}", code.local_name())),
            )
            .with_child(XmlElement::unqualified("faultstring").with_text(message));
        Self {
            headers: Vec::new(),
            body: fault,
        }
    }

    /// Appends a header block.
    #[must_use]
    pub fn with_header(mut self, header: &impl ToXml) -> Self {
        self.headers.push(header.to_element());
        self
    }

    /// Header blocks in order.
    #[must_use]
    pub fn headers(&self) -> &[XmlElement] {
        &self.headers
    }

    /// The body element.
    #[must_use]
    pub fn body(&self) -> &XmlElement {
        &self.body
    }

    /// Returns true if the body is a fault.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        self.body.is(SOAP_ENV_NS, "Fault")
    }

    /// Parses the carried SAML message; a fault body becomes an error.
    pub fn message(&self, ctx: &SamlContext) -> SamlResult<ProtocolMessage> {
        if self.is_fault() {
            let code = fault_field(&self.body, "faultcode");
            let message = fault_field(&self.body, "faultstring");
            tracing::debug!(code = %code, "SOAP fault received");
            return Err(ProtocolViolation::SoapFault { code, message }.into());
        }
        ProtocolMessage::from_xml(&self.body, ctx)
    }

    /// The ECP header blocks, if any.
    pub fn ecp_headers(&self, ctx: &SamlContext) -> SamlResult<EcpHeaders> {
        EcpHeaders::from_headers(&self.headers, ctx)
    }
}

impl ToXml for SoapEnvelope {
    fn to_element(&self) -> XmlElement {
        let mut envelope = soap("Envelope");
        if !self.headers.is_empty() {
            let mut header = soap("Header");
            for block in &self.headers {
                header.push_element(block.clone());
            }
            envelope.push_element(header);
        }
        envelope.push_element(soap("Body").with_child(self.body.clone()));
        envelope
    }
}

impl FromXml for SoapEnvelope {
    fn from_xml(element: &XmlElement, _ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, SOAP_ENV_NS, "Envelope")?;
        let headers: Vec<XmlElement> = at_most_one(element, SOAP_ENV_NS, "Header")?
            .map(|header| {
                header
                    .child_elements()
                    .map(|block| detach(element, block))
                    .collect()
            })
            .unwrap_or_default();
        let body = exactly_one(element, SOAP_ENV_NS, "Body")?;
        let mut children = body.child_elements();
        let first = children
            .next()
            .ok_or_else(|| SamlError::missing_element("Body", "message"))?;
        if children.next().is_some() {
            return Err(SamlError::too_many("Body", "message", 1));
        }
        Ok(Self {
            headers,
            body: detach(element, first),
        })
    }
}

/// `paos:Request`, the ECP client's invitation to answer by PAOS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaosRequest {
    /// Where the ECP client must deliver the IdP's response.
    pub response_consumer_url: String,
    /// Correlates the PAOS response.
    pub message_id: Option<String>,
}

impl ToXml for PaosRequest {
    fn to_element(&self) -> XmlElement {
        let mut el = header_block(PAOS_NS, "paos", "Request");
        el.set_attr("responseConsumerURL", self.response_consumer_url.as_str());
        el.set_attr("service", ECP_NS);
        el.set_opt_attr("messageID", self.message_id.as_deref());
        el
    }
}

impl FromXml for PaosRequest {
    fn from_xml(element: &XmlElement, _ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, PAOS_NS, "Request")?;
        let response_consumer_url = opt_string(element, "responseConsumerURL")
            .ok_or_else(|| SamlError::missing_attribute("Request", "responseConsumerURL"))?;
        Ok(Self {
            response_consumer_url,
            message_id: opt_string(element, "messageID"),
        })
    }
}

/// `ecp:Request`, the service provider's request details for the ECP client.
#[derive(Debug, Clone, PartialEq)]
pub struct EcpRequest {
    /// The requesting service provider.
    pub issuer: NameId,
    /// Human-readable name of the requester.
    pub provider_name: Option<String>,
    /// Whether the IdP must not interact with the user.
    pub is_passive: bool,
    /// Identity providers the requester trusts.
    pub idp_list: Option<IdpList>,
}

impl ToXml for EcpRequest {
    fn to_element(&self) -> XmlElement {
        let mut el = header_block(ECP_NS, "ecp", "Request");
        el.set_opt_attr("ProviderName", self.provider_name.as_deref());
        if self.is_passive {
            el.set_attr("IsPassive", "true");
        }
        el.push_element(self.issuer.element_named("Issuer"));
        if let Some(list) = &self.idp_list {
            list.append_to(&mut el);
        }
        el
    }
}

impl FromXml for EcpRequest {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, ECP_NS, "Request")?;
        Ok(Self {
            issuer: NameId::parse_named(exactly_one(element, SAML_NS, "Issuer")?, "Issuer")?,
            provider_name: opt_string(element, "ProviderName"),
            is_passive: opt_bool(element, "IsPassive")?.unwrap_or(false),
            idp_list: at_most_one(element, SAMLP_NS, "IDPList")?
                .map(|el| IdpList::from_xml(el, ctx))
                .transpose()?,
        })
    }
}

/// `ecp:Response`, the IdP's consumer URL for the ECP client to check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcpResponse {
    /// `AssertionConsumerServiceURL`.
    pub assertion_consumer_service_url: String,
}

impl ToXml for EcpResponse {
    fn to_element(&self) -> XmlElement {
        let mut el = header_block(ECP_NS, "ecp", "Response");
        el.set_attr(
            "AssertionConsumerServiceURL",
            self.assertion_consumer_service_url.as_str(),
        );
        el
    }
}

impl FromXml for EcpResponse {
    fn from_xml(element: &XmlElement, _ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, ECP_NS, "Response")?;
        let url = opt_string(element, "AssertionConsumerServiceURL").ok_or_else(|| {
            SamlError::missing_attribute("Response", "AssertionConsumerServiceURL")
        })?;
        Ok(Self {
            assertion_consumer_service_url: url,
        })
    }
}

/// `ecp:RelayState`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcpRelayState(pub RelayState);

impl ToXml for EcpRelayState {
    fn to_element(&self) -> XmlElement {
        header_block(ECP_NS, "ecp", "RelayState").with_text(self.0.as_str())
    }
}

impl FromXml for EcpRelayState {
    fn from_xml(element: &XmlElement, _ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, ECP_NS, "RelayState")?;
        RelayState::new(element.text()).map(Self)
    }
}

/// The ECP header blocks found in an envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EcpHeaders {
    /// `paos:Request`.
    pub paos: Option<PaosRequest>,
    /// `ecp:Request`.
    pub request: Option<EcpRequest>,
    /// `ecp:Response`.
    pub response: Option<EcpResponse>,
    /// `ecp:RelayState`.
    pub relay_state: Option<RelayState>,
}

impl EcpHeaders {
    /// Reads the ECP blocks, ignoring unrelated headers.
    pub fn from_headers(headers: &[XmlElement], ctx: &SamlContext) -> SamlResult<Self> {
        let mut found = Self::default();
        for block in headers {
            if block.is(PAOS_NS, "Request") {
                found.paos = Some(PaosRequest::from_xml(block, ctx)?);
            } else if block.is(ECP_NS, "Request") {
                found.request = Some(EcpRequest::from_xml(block, ctx)?);
            } else if block.is(ECP_NS, "Response") {
                found.response = Some(EcpResponse::from_xml(block, ctx)?);
            } else if block.is(ECP_NS, "RelayState") {
                found.relay_state = Some(EcpRelayState::from_xml(block, ctx)?.0);
            }
        }
        Ok(found)
    }

    /// Adds every present block to `envelope`.
    #[must_use]
    pub fn apply(&self, mut envelope: SoapEnvelope) -> SoapEnvelope {
        if let Some(paos) = &self.paos {
            envelope = envelope.with_header(paos);
        }
        if let Some(request) = &self.request {
            envelope = envelope.with_header(request);
        }
        if let Some(response) = &self.response {
            envelope = envelope.with_header(response);
        }
        if let Some(rs) = &self.relay_state {
            envelope = envelope.with_header(&EcpRelayState(rs.clone()));
        }
        envelope
    }
}
