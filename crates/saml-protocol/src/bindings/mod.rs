//! SAML bindings implementation.
//!
//! This module implements the SAML 2.0 bindings for message transport:
//!
//! - **HTTP-Redirect Binding** - Messages are deflated, base64-encoded, and URL-encoded
//! - **HTTP-POST Binding** - Messages are base64-encoded and sent in HTML forms
//! - **HTTP-Artifact Binding** - A 44-byte artifact stands in for the message
//! - **SOAP Binding** - Messages travel in a SOAP 1.1 envelope, with ECP headers
//!
//! # Usage
//!
//! ```rust,ignore
//! use saml_protocol::bindings::{HttpRedirectBinding, RelayState, SamlMessageType};
//!
//! let relay_state = RelayState::new("/app/home")?;
//! let url = HttpRedirectBinding::encode(&xml, SamlMessageType::Request, destination, Some(&relay_state))?;
//! let received = HttpRedirectBinding::decode_query(url.split_once('?').unwrap().1)?;
//! ```

mod artifact;
mod post;
mod redirect;
mod soap;

pub use artifact::*;
pub use post::*;
pub use redirect::*;
pub use soap::*;

use std::fmt;

use crate::context::SamlContext;
use crate::error::{ProtocolViolation, SamlError, SamlResult};
use crate::types::{FromXml, ProtocolMessage};

/// Longest RelayState a binding may carry, in bytes.
pub const RELAY_STATE_MAX_LEN: usize = 80;

/// Opaque caller state round-tripped through a binding.
///
/// At most 80 bytes and never blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelayState(String);

impl RelayState {
    /// Validates `value` as a RelayState.
    pub fn new(value: impl Into<String>) -> SamlResult<Self> {
        let value = value.into();
        if value.len() > RELAY_STATE_MAX_LEN {
            return Err(ProtocolViolation::RelayStateTooLong(value.len()).into());
        }
        if value.trim().is_empty() {
            return Err(ProtocolViolation::RelayStateBlank.into());
        }
        Ok(Self(value))
    }

    /// The raw value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelayState {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// SAML message type for binding operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamlMessageType {
    /// A request message.
    Request,
    /// A status response message.
    Response,
}

impl SamlMessageType {
    /// Returns the form parameter name for this message type.
    #[must_use]
    pub const fn form_param(&self) -> &'static str {
        match self {
            Self::Request => "SAMLRequest",
            Self::Response => "SAMLResponse",
        }
    }

    /// The parameter name that carries `message`.
    #[must_use]
    pub fn of(message: &ProtocolMessage) -> Self {
        if message.is_request() {
            Self::Request
        } else {
            Self::Response
        }
    }
}

/// Decoded SAML binding message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    /// The decoded XML message.
    pub xml: String,
    /// The message type (request or response).
    pub message_type: SamlMessageType,
    /// The RelayState if present.
    pub relay_state: Option<RelayState>,
}

impl DecodedMessage {
    /// Parses the carried message and checks it arrived under the right parameter.
    pub fn parse(&self, ctx: &SamlContext) -> SamlResult<ProtocolMessage> {
        let message = ProtocolMessage::from_xml_str(&self.xml, ctx)?;
        if SamlMessageType::of(&message) != self.message_type {
            return Err(ProtocolViolation::UnexpectedMessage {
                expected: self.message_type.form_param().to_string(),
                found: message.name().to_string(),
            }
            .into());
        }
        Ok(message)
    }
}

/// Picks the message parameter. Exactly one of the two must be present.
pub(crate) fn select_message<'a>(
    saml_request: Option<&'a str>,
    saml_response: Option<&'a str>,
) -> SamlResult<(&'a str, SamlMessageType)> {
    match (saml_request, saml_response) {
        (Some(request), None) => Ok((request, SamlMessageType::Request)),
        (None, Some(response)) => Ok((response, SamlMessageType::Response)),
        (Some(_), Some(_)) => Err(SamlError::Decoding(
            "both SAMLRequest and SAMLResponse present".to_string(),
        )),
        (None, None) => Err(SamlError::MissingMessageParameter(
            "SAMLRequest or SAMLResponse".to_string(),
        )),
    }
}

pub(crate) fn relay_state(value: Option<&str>) -> SamlResult<Option<RelayState>> {
    value.map(RelayState::new).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_state_limits() {
        assert!(RelayState::new("a".repeat(80)).is_ok());
        assert!(matches!(
            RelayState::new("a".repeat(81)),
            Err(SamlError::Protocol(ProtocolViolation::RelayStateTooLong(81)))
        ));
        assert!(matches!(
            RelayState::new("  \t"),
            Err(SamlError::Protocol(ProtocolViolation::RelayStateBlank))
        ));
        assert!(matches!(
            RelayState::new(""),
            Err(SamlError::Protocol(ProtocolViolation::RelayStateBlank))
        ));
    }

    #[test]
    fn relay_state_counts_bytes() {
        // 27 three-byte characters are 81 bytes
        assert!(RelayState::new("€".repeat(27)).is_err());
        assert!(RelayState::new("€".repeat(26)).is_ok());
    }

    #[test]
    fn missing_message_parameter() {
        assert!(matches!(
            select_message(None, None),
            Err(SamlError::MissingMessageParameter(_))
        ));
        assert_eq!(
            select_message(None, Some("b")).unwrap(),
            ("b", SamlMessageType::Response)
        );
    }

    #[test]
    fn request_and_response_together_are_rejected() {
        assert!(matches!(
            select_message(Some("a"), Some("b")),
            Err(SamlError::Decoding(_))
        ));
    }
}
