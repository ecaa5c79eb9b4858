//! SAML Response types.
//!
//! Response messages sent by an identity provider to a service provider.

use saml_core::{ContentCipher, KeyTransportAlgorithm, KeyUnwrapper};

use crate::context::SamlContext;
use crate::error::SamlResult;
use crate::signature::detach;
use crate::xml::XmlElement;

use super::{
    is_header_child, open_status_response, opt_string, parse_status, signable_message, Assertion,
    EncryptedAssertion, FromXml, MessageHeader, Status, ToXml, SAMLP_NS, SAML_NS,
};

/// An assertion carried by a response, in the clear or encrypted.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseAssertion {
    /// `saml:Assertion`.
    Plain(Box<Assertion>),
    /// `saml:EncryptedAssertion`.
    Encrypted(EncryptedAssertion),
}

impl ToXml for ResponseAssertion {
    fn to_element(&self) -> XmlElement {
        match self {
            Self::Plain(assertion) => assertion.to_element(),
            Self::Encrypted(encrypted) => encrypted.to_element(),
        }
    }
}

/// `samlp:Response`.
///
/// Assertions keep their document order whether encrypted or not.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    header: MessageHeader,
    in_response_to: Option<String>,
    status: Status,
    assertions: Vec<ResponseAssertion>,
}

signable_message!(Response);

impl Response {
    /// Creates a response with the given status.
    #[must_use]
    pub fn new(header: MessageHeader, status: Status) -> Self {
        Self {
            header,
            in_response_to: None,
            status,
            assertions: Vec::new(),
        }
    }

    /// Creates a success response.
    #[must_use]
    pub fn success(header: MessageHeader) -> Self {
        Self::new(header, Status::success())
    }

    /// Sets the request ID this response is for.
    #[must_use]
    pub fn in_response_to(mut self, request_id: impl Into<String>) -> Self {
        self.in_response_to = Some(request_id.into());
        self.header.clear_signature();
        self
    }

    /// Adds an assertion to this response.
    #[must_use]
    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(ResponseAssertion::Plain(Box::new(assertion)));
        self.header.clear_signature();
        self
    }

    /// Adds an encrypted assertion to this response.
    #[must_use]
    pub fn with_encrypted_assertion(mut self, assertion: EncryptedAssertion) -> Self {
        self.assertions.push(ResponseAssertion::Encrypted(assertion));
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

    /// Returns true if the status is success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// All carried assertions in document order.
    #[must_use]
    pub fn all_assertions(&self) -> &[ResponseAssertion] {
        &self.assertions
    }

    /// Assertions carried in the clear.
    pub fn assertions(&self) -> impl Iterator<Item = &Assertion> {
        self.assertions.iter().filter_map(|a| match a {
            ResponseAssertion::Plain(assertion) => Some(assertion.as_ref()),
            ResponseAssertion::Encrypted(_) => None,
        })
    }

    /// Encrypted assertions.
    pub fn encrypted_assertions(&self) -> impl Iterator<Item = &EncryptedAssertion> {
        self.assertions.iter().filter_map(|a| match a {
            ResponseAssertion::Encrypted(encrypted) => Some(encrypted),
            ResponseAssertion::Plain(_) => None,
        })
    }

    /// Every assertion in document order, decrypting the encrypted ones.
    pub fn decrypt_assertions(
        &self,
        key_transport: KeyTransportAlgorithm,
        unwrapper: &dyn KeyUnwrapper,
        cipher: &dyn ContentCipher,
        ctx: &SamlContext,
    ) -> SamlResult<Vec<Assertion>> {
        self.assertions
            .iter()
            .map(|a| match a {
                ResponseAssertion::Plain(assertion) => Ok(assertion.as_ref().clone()),
                ResponseAssertion::Encrypted(encrypted) => {
                    encrypted.decrypt(key_transport, unwrapper, cipher, ctx)
                }
            })
            .collect()
    }
}

impl ToXml for Response {
    fn to_element(&self) -> XmlElement {
        if let Some(source) = self.header.source() {
            return source.clone();
        }
        let mut el = open_status_response(
            &self.header,
            "Response",
            self.in_response_to.as_deref(),
            &self.status,
        );
        for assertion in &self.assertions {
            assertion.append_to(&mut el);
        }
        el
    }
}

impl FromXml for Response {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        let header = MessageHeader::parse(element, "Response", ctx)?;
        let status = parse_status(element, ctx)?;

        let mut assertions = Vec::new();
        for child in element.child_elements() {
            if child.is(SAML_NS, "Assertion") {
                let assertion = Assertion::from_xml(&detach(element, child), ctx)?;
                assertions.push(ResponseAssertion::Plain(Box::new(assertion)));
            } else if child.is(SAML_NS, "EncryptedAssertion") {
                assertions.push(ResponseAssertion::Encrypted(EncryptedAssertion::from_xml(
                    child, ctx,
                )?));
            } else if !is_header_child(child) && !child.is(SAMLP_NS, "Status") {
                return Err(crate::error::StructuralViolation::UnexpectedElement {
                    expected: "saml:Assertion or saml:EncryptedAssertion".to_string(),
                    found: child.qualified_name(),
                }
                .into());
            }
        }

        tracing::debug!(
            id = header.id(),
            assertions = assertions.len(),
            success = status.is_success(),
            "parsed response"
        );
        Ok(Self {
            header,
            in_response_to: opt_string(element, "InResponseTo"),
            status,
            assertions,
        })
    }
}
