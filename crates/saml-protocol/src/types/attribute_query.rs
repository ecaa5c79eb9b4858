//! `samlp:AttributeQuery`.

use crate::context::SamlContext;
use crate::error::SamlResult;
use crate::xml::XmlElement;

use super::{
    exactly_one, signable_message, Attribute, AttributeNameFormat, FromXml, MessageHeader,
    Subject, ToXml, SAML_NS,
};

/// A request for attributes of a subject.
///
/// An empty attribute list asks for every attribute the responder is
/// willing to release.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeQuery {
    header: MessageHeader,
    subject: Subject,
    attributes: Vec<Attribute>,
}

signable_message!(AttributeQuery);

impl AttributeQuery {
    /// Creates a query about `subject`.
    #[must_use]
    pub fn new(header: MessageHeader, subject: Subject) -> Self {
        Self {
            header,
            subject,
            attributes: Vec::new(),
        }
    }

    /// Adds a requested attribute; values narrow the request.
    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self.header.clear_signature();
        self
    }

    /// The common message header.
    #[must_use]
    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    /// The subject queried about.
    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Requested attributes.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// The name format shared by the requested attributes, unspecified when mixed.
    #[must_use]
    pub fn attribute_name_format(&self) -> &str {
        let mut formats = self.attributes.iter().map(Attribute::effective_name_format);
        match formats.next() {
            Some(first) if formats.all(|f| f == first) => first,
            _ => AttributeNameFormat::Unspecified.uri(),
        }
    }
}

impl ToXml for AttributeQuery {
    fn to_element(&self) -> XmlElement {
        if let Some(source) = self.header.source() {
            return source.clone();
        }
        let mut el = self.header.open("AttributeQuery");
        self.subject.append_to(&mut el);
        for attribute in &self.attributes {
            attribute.append_to(&mut el);
        }
        el
    }
}

impl FromXml for AttributeQuery {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        let header = MessageHeader::parse(element, "AttributeQuery", ctx)?;
        let subject = Subject::from_xml(exactly_one(element, SAML_NS, "Subject")?, ctx)?;
        let attributes = element
            .children_named(SAML_NS, "Attribute")
            .map(|el| Attribute::from_xml(el, ctx))
            .collect::<SamlResult<Vec<_>>>()?;
        Ok(Self {
            header,
            subject,
            attributes,
        })
    }
}
