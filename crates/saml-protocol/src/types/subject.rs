//! Subject and subject confirmation.

use chrono::{DateTime, Duration, Utc};

use crate::context::SamlContext;
use crate::error::{SamlError, SamlResult, StructuralViolation};
use crate::xml::{XmlAttribute, XmlElement, XmlNode};

use super::{
    at_most_one, expect_element, format_instant, non_empty, opt_instant, opt_string,
    required_attr, saml, ConfirmationMethod, FromXml, Identifier, ToXml, DS_NS, SAML_NS,
};

const KNOWN_DATA_ATTRIBUTES: [&str; 5] =
    ["NotBefore", "NotOnOrAfter", "Recipient", "InResponseTo", "Address"];

/// `SubjectConfirmationData`.
///
/// Besides the well-known attributes, arbitrary child content and foreign
/// attributes are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectConfirmationData {
    /// Earliest instant the subject may be confirmed.
    pub not_before: Option<DateTime<Utc>>,
    /// Instant at which the subject can no longer be confirmed.
    pub not_on_or_after: Option<DateTime<Utc>>,
    /// Endpoint the assertion may be delivered to.
    pub recipient: Option<String>,
    /// ID of the request this confirmation answers.
    pub in_response_to: Option<String>,
    /// Network address of the attesting entity.
    pub address: Option<String>,
    /// `ds:KeyInfo` children (holder-of-key).
    pub key_info: Vec<XmlElement>,
    /// Other child content, in document order.
    pub content: Vec<XmlNode>,
    /// Attributes outside the well-known set.
    pub foreign_attributes: Vec<XmlAttribute>,
}

impl SubjectConfirmationData {
    /// Creates bearer confirmation data for a recipient endpoint.
    #[must_use]
    pub fn bearer(recipient: impl Into<String>, not_on_or_after: DateTime<Utc>) -> Self {
        Self {
            recipient: Some(recipient.into()),
            not_on_or_after: Some(not_on_or_after),
            ..Self::default()
        }
    }

    /// Sets `InResponseTo`.
    #[must_use]
    pub fn with_in_response_to(mut self, request_id: impl Into<String>) -> Self {
        self.in_response_to = Some(request_id.into());
        self
    }

    /// Checks the confirmation window at `now`, widened by `skew`.
    pub fn check_validity(&self, now: DateTime<Utc>, skew: Duration) -> SamlResult<()> {
        if self.not_before.is_some_and(|nb| now + skew < nb) {
            return Err(SamlError::AssertionNotYetValid);
        }
        if self.not_on_or_after.is_some_and(|noa| now - skew >= noa) {
            return Err(SamlError::AssertionExpired);
        }
        Ok(())
    }
}

impl ToXml for SubjectConfirmationData {
    fn to_element(&self) -> XmlElement {
        let mut el = saml("SubjectConfirmationData");
        el.set_opt_attr("NotBefore", self.not_before.as_ref().map(format_instant));
        el.set_opt_attr(
            "NotOnOrAfter",
            self.not_on_or_after.as_ref().map(format_instant),
        );
        el.set_opt_attr("Recipient", self.recipient.as_deref());
        el.set_opt_attr("InResponseTo", self.in_response_to.as_deref());
        el.set_opt_attr("Address", self.address.as_deref());
        el.attributes.extend(self.foreign_attributes.iter().cloned());
        for key_info in &self.key_info {
            el.push_element(key_info.clone());
        }
        el.children.extend(self.content.iter().cloned());
        el
    }
}

impl FromXml for SubjectConfirmationData {
    fn from_xml(element: &XmlElement, _ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, SAML_NS, "SubjectConfirmationData")?;
        let foreign_attributes = element
            .attributes
            .iter()
            .filter(|a| a.namespace.is_some() || !KNOWN_DATA_ATTRIBUTES.contains(&a.name.as_str()))
            .cloned()
            .collect();
        let mut key_info = Vec::new();
        let mut content = Vec::new();
        for child in &element.children {
            match child {
                XmlNode::Element(el) if el.is(DS_NS, "KeyInfo") => key_info.push(el.clone()),
                XmlNode::Comment(_) => {}
                XmlNode::Text(text) if text.trim().is_empty() => {}
                other => content.push(other.clone()),
            }
        }
        Ok(Self {
            not_before: opt_instant(element, "NotBefore")?,
            not_on_or_after: opt_instant(element, "NotOnOrAfter")?,
            recipient: opt_string(element, "Recipient"),
            in_response_to: opt_string(element, "InResponseTo"),
            address: opt_string(element, "Address"),
            key_info,
            content,
            foreign_attributes,
        })
    }
}

/// `SubjectConfirmation`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectConfirmation {
    /// Confirmation method URI.
    pub method: String,
    /// Identifier of the confirming entity, if different from the subject.
    pub identifier: Option<Identifier>,
    /// Confirmation data.
    pub data: Option<SubjectConfirmationData>,
}

impl SubjectConfirmation {
    /// Creates a confirmation with the given method.
    #[must_use]
    pub fn new(method: ConfirmationMethod) -> Self {
        Self {
            method: method.uri().to_string(),
            identifier: None,
            data: None,
        }
    }

    /// Creates a bearer confirmation.
    #[must_use]
    pub fn bearer(data: SubjectConfirmationData) -> Self {
        Self::new(ConfirmationMethod::Bearer).with_data(data)
    }

    /// Sets the confirmation data.
    #[must_use]
    pub fn with_data(mut self, data: SubjectConfirmationData) -> Self {
        self.data = Some(data);
        self
    }

    /// Sets the confirming entity's identifier.
    #[must_use]
    pub fn with_identifier(mut self, identifier: impl Into<Identifier>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Returns the parsed method, if it is a well-known one.
    #[must_use]
    pub fn parsed_method(&self) -> Option<ConfirmationMethod> {
        ConfirmationMethod::from_uri(&self.method)
    }
}

impl ToXml for SubjectConfirmation {
    fn to_element(&self) -> XmlElement {
        let mut el = saml("SubjectConfirmation").with_attr("Method", self.method.as_str());
        if let Some(identifier) = &self.identifier {
            identifier.append_to(&mut el);
        }
        if let Some(data) = &self.data {
            data.append_to(&mut el);
        }
        el
    }
}

impl FromXml for SubjectConfirmation {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, SAML_NS, "SubjectConfirmation")?;
        let method = required_attr(element, "Method")?;
        non_empty("Method", method)?;
        let identifier = Identifier::from_slot(element, ctx)?;
        let data = at_most_one(element, SAML_NS, "SubjectConfirmationData")?
            .map(|el| SubjectConfirmationData::from_xml(el, ctx))
            .transpose()?;
        Ok(Self {
            method: method.to_string(),
            identifier,
            data,
        })
    }
}

/// `Subject`.
///
/// Holds at most one identifier. Without confirmations the identifier is
/// mandatory.
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    identifier: Option<Identifier>,
    confirmations: Vec<SubjectConfirmation>,
}

impl Subject {
    /// Creates a subject identified by `identifier`.
    #[must_use]
    pub fn new(identifier: impl Into<Identifier>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            confirmations: Vec::new(),
        }
    }

    /// Creates a subject from parts, enforcing the identifier rule.
    pub fn from_parts(
        identifier: Option<Identifier>,
        confirmations: Vec<SubjectConfirmation>,
    ) -> SamlResult<Self> {
        if identifier.is_none() && confirmations.is_empty() {
            return Err(StructuralViolation::MissingIdentifier.into());
        }
        Ok(Self {
            identifier,
            confirmations,
        })
    }

    /// Adds a confirmation.
    #[must_use]
    pub fn with_confirmation(mut self, confirmation: SubjectConfirmation) -> Self {
        self.confirmations.push(confirmation);
        self
    }

    /// The subject's identifier.
    #[must_use]
    pub fn identifier(&self) -> Option<&Identifier> {
        self.identifier.as_ref()
    }

    /// The plain name ID, if the identifier is one.
    #[must_use]
    pub fn name_id(&self) -> Option<&super::NameId> {
        self.identifier.as_ref().and_then(Identifier::as_name_id)
    }

    /// Confirmations in document order.
    #[must_use]
    pub fn confirmations(&self) -> &[SubjectConfirmation] {
        &self.confirmations
    }
}

impl ToXml for Subject {
    fn to_element(&self) -> XmlElement {
        let mut el = saml("Subject");
        if let Some(identifier) = &self.identifier {
            identifier.append_to(&mut el);
        }
        for confirmation in &self.confirmations {
            confirmation.append_to(&mut el);
        }
        el
    }
}

impl FromXml for Subject {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, SAML_NS, "Subject")?;
        let identifier = Identifier::from_slot(element, ctx)?;
        let mut confirmations = Vec::new();
        for child in element.child_elements() {
            if child.is(SAML_NS, "SubjectConfirmation") {
                confirmations.push(SubjectConfirmation::from_xml(child, ctx)?);
            } else if !Identifier::is_identifier_element(child) {
                return Err(StructuralViolation::UnexpectedElement {
                    expected: format!("{{{SAML_NS}}}SubjectConfirmation"),
                    found: child.qualified_name(),
                }
                .into());
            }
        }
        Self::from_parts(identifier, confirmations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NameId;
    use chrono::TimeZone;

    fn ctx() -> SamlContext {
        SamlContext::new()
    }

    #[test]
    fn subject_roundtrip_with_bearer_confirmation() {
        let not_on_or_after = Utc.with_ymd_and_hms(2024, 6, 1, 12, 5, 0).unwrap();
        let subject = Subject::new(NameId::transient("_t1")).with_confirmation(
            SubjectConfirmation::bearer(
                SubjectConfirmationData::bearer("https://sp.example.com/acs", not_on_or_after)
                    .with_in_response_to("_req1"),
            ),
        );

        let parsed = Subject::from_xml_str(&subject.to_xml_string(), &ctx()).unwrap();
        assert_eq!(parsed, subject);
        assert_eq!(parsed.name_id().map(|n| n.value.as_str()), Some("_t1"));
        assert_eq!(
            parsed.confirmations()[0].parsed_method(),
            Some(ConfirmationMethod::Bearer)
        );
    }

    #[test]
    fn subject_without_identifier_or_confirmation() {
        let xml = format!(r#"<saml:Subject xmlns:saml="{SAML_NS}"/>"#);
        assert!(matches!(
            Subject::from_xml_str(&xml, &ctx()),
            Err(SamlError::Structural(StructuralViolation::MissingIdentifier))
        ));
    }

    #[test]
    fn confirmation_alone_is_enough() {
        let subject =
            Subject::from_parts(None, vec![SubjectConfirmation::new(ConfirmationMethod::HolderOfKey)])
                .unwrap();
        let parsed = Subject::from_xml_str(&subject.to_xml_string(), &ctx()).unwrap();
        assert!(parsed.identifier().is_none());
        assert_eq!(parsed.confirmations().len(), 1);
    }

    #[test]
    fn confirmation_data_keeps_foreign_content() {
        let xml = format!(
            r#"<saml:SubjectConfirmationData xmlns:saml="{SAML_NS}" xmlns:ds="{DS_NS}" xmlns:x="urn:x" Recipient="https://sp/acs" x:hint="1"><ds:KeyInfo><ds:KeyName>k</ds:KeyName></ds:KeyInfo><x:Extra>v</x:Extra></saml:SubjectConfirmationData>"#
        );
        let data = SubjectConfirmationData::from_xml_str(&xml, &ctx()).unwrap();
        assert_eq!(data.recipient.as_deref(), Some("https://sp/acs"));
        assert_eq!(data.key_info.len(), 1);
        assert_eq!(data.content.len(), 1);
        assert_eq!(data.foreign_attributes.len(), 1);

        let reparsed = SubjectConfirmationData::from_xml_str(&data.to_xml_string(), &ctx()).unwrap();
        assert_eq!(reparsed, data);
    }

    #[test]
    fn confirmation_data_window() {
        let end = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let data = SubjectConfirmationData::bearer("https://sp/acs", end);
        assert!(data.check_validity(end - Duration::seconds(1), Duration::zero()).is_ok());
        assert!(matches!(
            data.check_validity(end, Duration::zero()),
            Err(SamlError::AssertionExpired)
        ));
    }
}
