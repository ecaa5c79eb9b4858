//! SAML Logout types.
//!
//! Single Logout (SLO) request and response messages.

use chrono::{DateTime, Utc};

use crate::context::SamlContext;
use crate::error::{SamlResult, StructuralViolation};
use crate::xml::XmlElement;

use super::{
    format_instant, open_status_response, opt_instant, opt_string, parse_status, samlp,
    signable_message, sub_status_codes, text_element, FromXml, Identifier, LogoutReason,
    MessageHeader, Status, StatusCode, ToXml, SAMLP_NS,
};

/// `samlp:LogoutRequest`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogoutRequest {
    header: MessageHeader,
    identifier: Identifier,
    session_indexes: Vec<String>,
    reason: Option<String>,
    not_on_or_after: Option<DateTime<Utc>>,
}

signable_message!(LogoutRequest);

impl LogoutRequest {
    /// Creates a logout request for the principal named by `identifier`.
    #[must_use]
    pub fn new(header: MessageHeader, identifier: impl Into<Identifier>) -> Self {
        Self {
            header,
            identifier: identifier.into(),
            session_indexes: Vec::new(),
            reason: None,
            not_on_or_after: None,
        }
    }

    /// Adds a session index to terminate.
    #[must_use]
    pub fn with_session_index(mut self, index: impl Into<String>) -> Self {
        self.session_indexes.push(index.into());
        self.header.clear_signature();
        self
    }

    /// Sets the reason.
    #[must_use]
    pub fn with_reason(mut self, reason: LogoutReason) -> Self {
        self.reason = Some(reason.uri().to_string());
        self.header.clear_signature();
        self
    }

    /// Sets the expiry of the request.
    #[must_use]
    pub fn with_not_on_or_after(mut self, instant: DateTime<Utc>) -> Self {
        self.not_on_or_after = Some(instant);
        self.header.clear_signature();
        self
    }

    /// The common message header.
    #[must_use]
    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    /// The principal to log out.
    #[must_use]
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// Session indexes to terminate.
    #[must_use]
    pub fn session_indexes(&self) -> &[String] {
        &self.session_indexes
    }

    /// `Reason`.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// `NotOnOrAfter`.
    #[must_use]
    pub fn not_on_or_after(&self) -> Option<DateTime<Utc>> {
        self.not_on_or_after
    }

    /// Returns true if the request has expired at the context's time.
    #[must_use]
    pub fn is_expired(&self, ctx: &SamlContext) -> bool {
        self.not_on_or_after
            .is_some_and(|noa| ctx.now() - ctx.clock_skew() >= noa)
    }
}

impl ToXml for LogoutRequest {
    fn to_element(&self) -> XmlElement {
        if let Some(source) = self.header.source() {
            return source.clone();
        }
        let mut el = self.header.open("LogoutRequest");
        el.set_opt_attr("Reason", self.reason.as_deref());
        el.set_opt_attr(
            "NotOnOrAfter",
            self.not_on_or_after.as_ref().map(format_instant),
        );
        self.identifier.append_to(&mut el);
        for index in &self.session_indexes {
            el.push_element(text_element(samlp("SessionIndex"), index));
        }
        el
    }
}

impl FromXml for LogoutRequest {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        let header = MessageHeader::parse(element, "LogoutRequest", ctx)?;
        let identifier =
            Identifier::from_slot(element, ctx)?.ok_or(StructuralViolation::MissingIdentifier)?;
        Ok(Self {
            header,
            identifier,
            session_indexes: element
                .children_named(SAMLP_NS, "SessionIndex")
                .map(XmlElement::text)
                .collect(),
            reason: opt_string(element, "Reason"),
            not_on_or_after: opt_instant(element, "NotOnOrAfter")?,
        })
    }
}

/// `samlp:LogoutResponse`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogoutResponse {
    header: MessageHeader,
    in_response_to: Option<String>,
    status: Status,
}

signable_message!(LogoutResponse);

impl LogoutResponse {
    /// Creates a logout response with the given status.
    #[must_use]
    pub fn new(header: MessageHeader, status: Status) -> Self {
        Self {
            header,
            in_response_to: None,
            status,
        }
    }

    /// Creates a success logout response.
    #[must_use]
    pub fn success(header: MessageHeader) -> Self {
        Self::new(header, Status::success())
    }

    /// Creates a partial logout response.
    #[must_use]
    pub fn partial_logout(header: MessageHeader) -> Self {
        let status = Status::new(
            StatusCode::new(super::status_codes::SUCCESS)
                .with_sub_code(sub_status_codes::PARTIAL_LOGOUT),
        )
        .with_message("Some sessions could not be terminated");
        Self::new(header, status)
    }

    /// Sets the request ID this response is for.
    #[must_use]
    pub fn in_response_to(mut self, request_id: impl Into<String>) -> Self {
        self.in_response_to = Some(request_id.into());
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

    /// Returns true if this response indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl ToXml for LogoutResponse {
    fn to_element(&self) -> XmlElement {
        if let Some(source) = self.header.source() {
            return source.clone();
        }
        open_status_response(
            &self.header,
            "LogoutResponse",
            self.in_response_to.as_deref(),
            &self.status,
        )
    }
}

impl FromXml for LogoutResponse {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        let header = MessageHeader::parse(element, "LogoutResponse", ctx)?;
        Ok(Self {
            header,
            in_response_to: opt_string(element, "InResponseTo"),
            status: parse_status(element, ctx)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SamlError;
    use crate::types::NameId;
    use chrono::{Duration, TimeZone};
    use saml_core::FixedClock;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn header() -> MessageHeader {
        MessageHeader::new(instant())
            .with_issuer(NameId::new("https://sp.example.com"))
            .unwrap()
            .with_destination("https://idp.example.com/slo")
            .unwrap()
    }

    #[test]
    fn logout_request_roundtrip() {
        let request = LogoutRequest::new(header(), NameId::email("user@example.com"))
            .with_session_index("_session123")
            .with_session_index("_session456")
            .with_reason(LogoutReason::User)
            .with_not_on_or_after(instant() + Duration::minutes(5));

        let parsed = LogoutRequest::from_xml_str(&request.to_xml_string(), &SamlContext::new()).unwrap();
        assert_eq!(parsed, request);
        assert_eq!(parsed.session_indexes(), ["_session123", "_session456"]);
        assert_eq!(
            parsed.identifier().as_name_id().map(|n| n.value.as_str()),
            Some("user@example.com")
        );
    }

    #[test]
    fn expiry_uses_the_context_clock() {
        let request = LogoutRequest::new(header(), NameId::new("u"))
            .with_not_on_or_after(instant() + Duration::minutes(5));
        let before = SamlContext::new().with_clock(FixedClock::new(instant()));
        let after = SamlContext::new().with_clock(FixedClock::new(instant() + Duration::minutes(10)));
        assert!(!request.is_expired(&before));
        assert!(request.is_expired(&after));
    }

    #[test]
    fn logout_request_requires_an_identifier() {
        let el = header().open("LogoutRequest");
        assert!(matches!(
            LogoutRequest::from_xml(&el, &SamlContext::new()),
            Err(SamlError::Structural(StructuralViolation::MissingIdentifier))
        ));
    }

    #[test]
    fn logout_response_success() {
        let response = LogoutResponse::success(header()).in_response_to("_req123");
        let parsed = LogoutResponse::from_xml_str(&response.to_xml_string(), &SamlContext::new()).unwrap();
        assert!(parsed.is_success());
        assert_eq!(parsed.in_response_to_id(), Some("_req123"));
    }

    #[test]
    fn logout_response_partial() {
        let response = LogoutResponse::partial_logout(header());

        // Partial logout is still a top-level success
        assert!(response.is_success());
        assert_eq!(
            response.status().code.sub_codes,
            [sub_status_codes::PARTIAL_LOGOUT]
        );
    }
}
