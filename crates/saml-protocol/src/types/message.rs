//! Parts shared by all protocol messages, and the message union.

use chrono::{DateTime, Utc};

use crate::context::SamlContext;
use crate::error::{ProtocolViolation, SamlError, SamlResult};
use crate::signature::{parse_enveloped, SignatureEnvelope};
use crate::xml::XmlElement;

use super::{
    at_most_one, check_version, ensure_absolute_uri, exactly_one, format_instant, generate_id,
    non_empty, opt_string, required_attr, required_instant, samlp, ArtifactResolve, ArtifactResponse,
    AttributeQuery, AuthnRequest, FromXml, LogoutRequest, LogoutResponse, NameId, NameIdFormat,
    Response, Status, ToXml, SAMLP_NS, SAML_NS, SAML_VERSION,
};

/// Attributes and leading children every request and response carries.
///
/// A header read from a signed message remembers the signature; changing any
/// field drops it, since the signature no longer covers the content.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageHeader {
    id: String,
    issue_instant: DateTime<Utc>,
    destination: Option<String>,
    consent: Option<String>,
    issuer: Option<NameId>,
    extensions: Option<XmlElement>,
    signature: Option<SignatureEnvelope>,
    source: Option<XmlElement>,
}

impl MessageHeader {
    /// A header with a fresh ID issued at `issue_instant`.
    #[must_use]
    pub fn new(issue_instant: DateTime<Utc>) -> Self {
        Self {
            id: generate_id(),
            issue_instant,
            destination: None,
            consent: None,
            issuer: None,
            extensions: None,
            signature: None,
            source: None,
        }
    }

    /// A header issued now by the context clock.
    #[must_use]
    pub fn now(ctx: &SamlContext) -> Self {
        Self::new(ctx.now())
    }

    fn unsigned(mut self) -> Self {
        self.clear_signature();
        self
    }

    /// Forgets the signature after the enclosing message changed.
    pub(crate) fn clear_signature(&mut self) {
        self.signature = None;
        self.source = None;
    }

    /// Replaces the generated ID, which must not be empty.
    pub fn with_id(mut self, id: impl Into<String>) -> SamlResult<Self> {
        let id = id.into();
        non_empty("ID", &id)?;
        self.id = id;
        Ok(self.unsigned())
    }

    /// Sets `Destination`, which must be an absolute URI.
    pub fn with_destination(mut self, destination: impl Into<String>) -> SamlResult<Self> {
        let destination = destination.into();
        ensure_absolute_uri("Destination", &destination)?;
        self.destination = Some(destination);
        Ok(self.unsigned())
    }

    /// Sets `Consent`.
    #[must_use]
    pub fn with_consent(mut self, consent: impl Into<String>) -> Self {
        self.consent = Some(consent.into());
        self.unsigned()
    }

    /// Sets the issuer. An entity-format issuer must be an absolute URI.
    pub fn with_issuer(mut self, issuer: NameId) -> SamlResult<Self> {
        check_issuer(&issuer)?;
        self.issuer = Some(issuer);
        Ok(self.unsigned())
    }

    /// Sets `samlp:Extensions`.
    #[must_use]
    pub fn with_extensions(mut self, extensions: XmlElement) -> Self {
        self.extensions = Some(extensions);
        self.unsigned()
    }

    /// `ID`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `IssueInstant`.
    #[must_use]
    pub fn issue_instant(&self) -> DateTime<Utc> {
        self.issue_instant
    }

    /// `Destination`.
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    /// `Consent`.
    #[must_use]
    pub fn consent(&self) -> Option<&str> {
        self.consent.as_deref()
    }

    /// `Issuer`.
    #[must_use]
    pub fn issuer(&self) -> Option<&NameId> {
        self.issuer.as_ref()
    }

    /// `Extensions`.
    #[must_use]
    pub fn extensions(&self) -> Option<&XmlElement> {
        self.extensions.as_ref()
    }

    /// The enveloped signature, if the message was read signed.
    #[must_use]
    pub fn signature(&self) -> Option<&SignatureEnvelope> {
        self.signature.as_ref()
    }

    /// The element as received, if signed.
    #[must_use]
    pub fn source(&self) -> Option<&XmlElement> {
        self.source.as_ref()
    }

    /// Starts the message element with the header's attributes and children.
    pub(crate) fn open(&self, name: &str) -> XmlElement {
        let mut el = samlp(name)
            .with_attr("ID", self.id.as_str())
            .with_attr("Version", SAML_VERSION)
            .with_attr("IssueInstant", format_instant(&self.issue_instant));
        el.set_opt_attr("Destination", self.destination.as_deref());
        el.set_opt_attr("Consent", self.consent.as_deref());
        if let Some(issuer) = &self.issuer {
            el.push_element(issuer.element_named("Issuer"));
        }
        if let Some(extensions) = &self.extensions {
            el.push_element(extensions.clone());
        }
        el
    }

    /// Reads the header of a message element named `name`.
    pub(crate) fn parse(element: &XmlElement, name: &str, ctx: &SamlContext) -> SamlResult<Self> {
        super::expect_element(element, SAMLP_NS, name)?;
        check_version(element)?;
        let id = required_attr(element, "ID")?.to_string();
        non_empty("ID", &id)?;
        let issue_instant = required_instant(element, "IssueInstant")?;
        let destination = opt_string(element, "Destination");
        if let Some(destination) = &destination {
            ensure_absolute_uri("Destination", destination)?;
        }
        let issuer = at_most_one(element, SAML_NS, "Issuer")?
            .map(|el| NameId::parse_named(el, "Issuer"))
            .transpose()?;
        if let Some(issuer) = &issuer {
            check_issuer(issuer)?;
        }
        let extensions = at_most_one(element, SAMLP_NS, "Extensions")?.cloned();
        let (signature, source) = match parse_enveloped(element, ctx)? {
            Some((signature, source)) => (Some(signature), Some(source)),
            None => (None, None),
        };
        Ok(Self {
            id,
            issue_instant,
            destination,
            consent: opt_string(element, "Consent"),
            issuer,
            extensions,
            signature,
            source,
        })
    }
}

fn check_issuer(issuer: &NameId) -> SamlResult<()> {
    if issuer.format.as_deref() == Some(NameIdFormat::Entity.uri()) {
        ensure_absolute_uri("Issuer", &issuer.value)?;
    }
    Ok(())
}

/// Returns true for children the header owns.
pub(crate) fn is_header_child(element: &XmlElement) -> bool {
    element.is(SAML_NS, "Issuer")
        || element.is(SAMLP_NS, "Extensions")
        || element.is(super::DS_NS, "Signature")
}

/// The `StatusResponseType` part after the header.
pub(crate) fn open_status_response(
    header: &MessageHeader,
    name: &str,
    in_response_to: Option<&str>,
    status: &Status,
) -> XmlElement {
    let mut el = header.open(name);
    el.set_opt_attr("InResponseTo", in_response_to);
    status.append_to(&mut el);
    el
}

pub(crate) fn parse_status(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Status> {
    Status::from_xml(exactly_one(element, SAMLP_NS, "Status")?, ctx)
}

/// Implements [`Signable`](crate::signature::Signable) for a message with a
/// `header` field.
macro_rules! signable_message {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl crate::signature::Signable for $ty {
                fn signature(&self) -> Option<&crate::signature::SignatureEnvelope> {
                    self.header.signature()
                }

                fn signed_element(&self) -> Option<&crate::xml::XmlElement> {
                    self.header.source()
                }
            }
        )+
    };
}

pub(crate) use signable_message;

/// Any protocol message, dispatched on the root element.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolMessage {
    /// `samlp:AuthnRequest`.
    AuthnRequest(Box<AuthnRequest>),
    /// `samlp:Response`.
    Response(Box<Response>),
    /// `samlp:LogoutRequest`.
    LogoutRequest(LogoutRequest),
    /// `samlp:LogoutResponse`.
    LogoutResponse(LogoutResponse),
    /// `samlp:ArtifactResolve`.
    ArtifactResolve(ArtifactResolve),
    /// `samlp:ArtifactResponse`.
    ArtifactResponse(ArtifactResponse),
    /// `samlp:AttributeQuery`.
    AttributeQuery(AttributeQuery),
}

impl ProtocolMessage {
    /// Local name of the root element.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthnRequest(_) => "AuthnRequest",
            Self::Response(_) => "Response",
            Self::LogoutRequest(_) => "LogoutRequest",
            Self::LogoutResponse(_) => "LogoutResponse",
            Self::ArtifactResolve(_) => "ArtifactResolve",
            Self::ArtifactResponse(_) => "ArtifactResponse",
            Self::AttributeQuery(_) => "AttributeQuery",
        }
    }

    /// True for requests, false for status responses.
    #[must_use]
    pub fn is_request(&self) -> bool {
        !matches!(
            self,
            Self::Response(_) | Self::LogoutResponse(_) | Self::ArtifactResponse(_)
        )
    }

    /// The common header.
    #[must_use]
    pub fn header(&self) -> &MessageHeader {
        match self {
            Self::AuthnRequest(m) => m.header(),
            Self::Response(m) => m.header(),
            Self::LogoutRequest(m) => m.header(),
            Self::LogoutResponse(m) => m.header(),
            Self::ArtifactResolve(m) => m.header(),
            Self::ArtifactResponse(m) => m.header(),
            Self::AttributeQuery(m) => m.header(),
        }
    }

    /// The `Status` of a response.
    #[must_use]
    pub fn status(&self) -> Option<&Status> {
        match self {
            Self::Response(m) => Some(m.status()),
            Self::LogoutResponse(m) => Some(m.status()),
            Self::ArtifactResponse(m) => Some(m.status()),
            _ => None,
        }
    }

    /// Returns the response, or fails naming what arrived instead.
    pub fn into_response(self) -> SamlResult<Response> {
        match self {
            Self::Response(response) => Ok(*response),
            other => Err(other.unexpected("Response")),
        }
    }

    /// Returns the authentication request, or fails naming what arrived instead.
    pub fn into_authn_request(self) -> SamlResult<AuthnRequest> {
        match self {
            Self::AuthnRequest(request) => Ok(*request),
            other => Err(other.unexpected("AuthnRequest")),
        }
    }

    fn unexpected(&self, expected: &str) -> SamlError {
        ProtocolViolation::UnexpectedMessage {
            expected: expected.to_string(),
            found: self.name().to_string(),
        }
        .into()
    }
}

impl ToXml for ProtocolMessage {
    fn to_element(&self) -> XmlElement {
        match self {
            Self::AuthnRequest(m) => m.to_element(),
            Self::Response(m) => m.to_element(),
            Self::LogoutRequest(m) => m.to_element(),
            Self::LogoutResponse(m) => m.to_element(),
            Self::ArtifactResolve(m) => m.to_element(),
            Self::ArtifactResponse(m) => m.to_element(),
            Self::AttributeQuery(m) => m.to_element(),
        }
    }
}

impl FromXml for ProtocolMessage {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        if element.namespace.as_deref() != Some(SAMLP_NS) {
            return Err(unknown_message(element));
        }
        let message = match element.name.as_str() {
            "AuthnRequest" => Self::AuthnRequest(Box::new(AuthnRequest::from_xml(element, ctx)?)),
            "Response" => Self::Response(Box::new(Response::from_xml(element, ctx)?)),
            "LogoutRequest" => Self::LogoutRequest(LogoutRequest::from_xml(element, ctx)?),
            "LogoutResponse" => Self::LogoutResponse(LogoutResponse::from_xml(element, ctx)?),
            "ArtifactResolve" => Self::ArtifactResolve(ArtifactResolve::from_xml(element, ctx)?),
            "ArtifactResponse" => Self::ArtifactResponse(ArtifactResponse::from_xml(element, ctx)?),
            "AttributeQuery" => Self::AttributeQuery(AttributeQuery::from_xml(element, ctx)?),
            _ => return Err(unknown_message(element)),
        };
        tracing::debug!(message = message.name(), id = message.header().id(), "parsed message");
        Ok(message)
    }
}

fn unknown_message(element: &XmlElement) -> SamlError {
    ProtocolViolation::UnexpectedMessage {
        expected: "a SAML protocol message".to_string(),
        found: element.qualified_name(),
    }
    .into()
}

impl From<AuthnRequest> for ProtocolMessage {
    fn from(message: AuthnRequest) -> Self {
        Self::AuthnRequest(Box::new(message))
    }
}

impl From<Response> for ProtocolMessage {
    fn from(message: Response) -> Self {
        Self::Response(Box::new(message))
    }
}

impl From<LogoutRequest> for ProtocolMessage {
    fn from(message: LogoutRequest) -> Self {
        Self::LogoutRequest(message)
    }
}

impl From<LogoutResponse> for ProtocolMessage {
    fn from(message: LogoutResponse) -> Self {
        Self::LogoutResponse(message)
    }
}

impl From<ArtifactResolve> for ProtocolMessage {
    fn from(message: ArtifactResolve) -> Self {
        Self::ArtifactResolve(message)
    }
}

impl From<ArtifactResponse> for ProtocolMessage {
    fn from(message: ArtifactResponse) -> Self {
        Self::ArtifactResponse(message)
    }
}

impl From<AttributeQuery> for ProtocolMessage {
    fn from(message: AttributeQuery) -> Self {
        Self::AttributeQuery(message)
    }
}
