//! SAML 2.0 object model.
//!
//! Every type converts to and from [`XmlElement`] through [`ToXml`] and
//! [`FromXml`]. Parsing validates before constructing, so a value obtained
//! from `from_xml` or from a validating constructor always satisfies its
//! invariants.

mod artifact;
mod assertion;
mod attribute;
mod attribute_query;
mod authn;
mod authn_request;
mod authz;
mod condition;
mod constants;
mod identifier;
mod logout;
mod message;
mod response;
mod status;
mod subject;

pub use artifact::*;
pub use assertion::*;
pub use attribute::*;
pub use attribute_query::*;
pub use authn::*;
pub use authn_request::*;
pub use authz::*;
pub use condition::*;
pub use constants::*;
pub use identifier::*;
pub use logout::*;
pub use message::*;
pub use response::*;
pub use status::*;
pub use subject::*;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::context::SamlContext;
use crate::error::{ProtocolViolation, SamlError, SamlResult, StructuralViolation};
use crate::xml::{self, XmlElement};

/// Projects a value onto XML.
pub trait ToXml {
    /// Builds the element for this value.
    fn to_element(&self) -> XmlElement;

    /// Appends this value's element to `parent`.
    fn append_to(&self, parent: &mut XmlElement) {
        parent.push_element(self.to_element());
    }

    /// Serializes this value as an XML string.
    fn to_xml_string(&self) -> String {
        xml::to_string(&self.to_element())
    }
}

/// Validating construction from XML.
pub trait FromXml: Sized {
    /// Parses and validates `element`.
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self>;

    /// Parses an XML string and then the value.
    fn from_xml_str(xml: &str, ctx: &SamlContext) -> SamlResult<Self> {
        Self::from_xml(&xml::parse(xml)?, ctx)
    }
}

/// Generates a fresh XML ID.
#[must_use]
pub fn generate_id() -> String {
    format!("_id{}", uuid::Uuid::new_v4().simple())
}

/// Formats an instant as `xs:dateTime` in UTC.
pub(crate) fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub(crate) fn saml(name: &str) -> XmlElement {
    XmlElement::new(SAML_NS, "saml", name)
}

pub(crate) fn samlp(name: &str) -> XmlElement {
    XmlElement::new(SAMLP_NS, "samlp", name)
}

pub(crate) fn text_element(element: XmlElement, text: &str) -> XmlElement {
    element.with_text(text)
}

/// Fails unless `element` is `{namespace}name`.
pub(crate) fn expect_element(element: &XmlElement, namespace: &str, name: &str) -> SamlResult<()> {
    if element.is(namespace, name) {
        Ok(())
    } else {
        Err(StructuralViolation::UnexpectedElement {
            expected: format!("{{{namespace}}}{name}"),
            found: element.qualified_name(),
        }
        .into())
    }
}

pub(crate) fn required_attr<'a>(element: &'a XmlElement, name: &str) -> SamlResult<&'a str> {
    element
        .attr(name)
        .ok_or_else(|| SamlError::missing_attribute(&element.name, name))
}

pub(crate) fn parse_instant(element: &XmlElement, name: &str, value: &str) -> SamlResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| SamlError::invalid_attribute(&element.name, name, value))
}

pub(crate) fn opt_instant(element: &XmlElement, name: &str) -> SamlResult<Option<DateTime<Utc>>> {
    element
        .attr(name)
        .map(|value| parse_instant(element, name, value))
        .transpose()
}

pub(crate) fn required_instant(element: &XmlElement, name: &str) -> SamlResult<DateTime<Utc>> {
    parse_instant(element, name, required_attr(element, name)?)
}

pub(crate) fn opt_bool(element: &XmlElement, name: &str) -> SamlResult<Option<bool>> {
    match element.attr(name) {
        None => Ok(None),
        Some("true" | "1") => Ok(Some(true)),
        Some("false" | "0") => Ok(Some(false)),
        Some(other) => Err(SamlError::invalid_attribute(&element.name, name, other)),
    }
}

pub(crate) fn opt_number<T: std::str::FromStr>(element: &XmlElement, name: &str) -> SamlResult<Option<T>> {
    element
        .attr(name)
        .map(|value| {
            value
                .parse()
                .map_err(|_| SamlError::invalid_attribute(&element.name, name, value))
        })
        .transpose()
}

pub(crate) fn opt_string(element: &XmlElement, name: &str) -> Option<String> {
    element.attr(name).map(str::to_string)
}

/// At most one `{namespace}name` child.
pub(crate) fn at_most_one<'a>(
    parent: &'a XmlElement,
    namespace: &str,
    name: &str,
) -> SamlResult<Option<&'a XmlElement>> {
    let mut matches = parent
        .child_elements()
        .filter(|el| el.is(namespace, name));
    let first = matches.next();
    if matches.next().is_some() {
        return Err(SamlError::too_many(&parent.name, name, 1));
    }
    Ok(first)
}

/// Exactly one `{namespace}name` child.
pub(crate) fn exactly_one<'a>(
    parent: &'a XmlElement,
    namespace: &str,
    name: &str,
) -> SamlResult<&'a XmlElement> {
    at_most_one(parent, namespace, name)?
        .ok_or_else(|| SamlError::missing_element(&parent.name, name))
}

/// Fails unless `Version` is exactly `2.0`.
pub(crate) fn check_version(element: &XmlElement) -> SamlResult<()> {
    let version = required_attr(element, "Version")?;
    if version != SAML_VERSION {
        return Err(StructuralViolation::VersionMismatch(version.to_string()).into());
    }
    Ok(())
}

/// Local part of the element's `xsi:type`, if any.
pub(crate) fn xsi_type(element: &XmlElement) -> Option<&str> {
    element
        .attr_ns(XSI_NS, "type")
        .map(|value| value.rsplit_once(':').map_or(value, |(_, local)| local))
}

/// Fails unless `value` parses as an absolute URI.
pub(crate) fn ensure_absolute_uri(field: &str, value: &str) -> SamlResult<()> {
    match url::Url::parse(value) {
        Ok(_) => Ok(()),
        Err(_) => Err(ProtocolViolation::NotAbsoluteUri {
            field: field.to_string(),
            value: value.to_string(),
        }
        .into()),
    }
}

pub(crate) fn non_empty(element: &str, value: &str) -> SamlResult<()> {
    if value.trim().is_empty() {
        return Err(StructuralViolation::EmptyValue {
            element: element.to_string(),
        }
        .into());
    }
    Ok(())
}
