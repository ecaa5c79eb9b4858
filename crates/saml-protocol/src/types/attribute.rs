//! Attributes and attribute statements.
//!
//! `eduPersonTargetedID` is special: all of its values must be identifiers.

use crate::context::SamlContext;
use crate::encryption::{Encryptable, Encrypted};
use crate::error::{SamlError, SamlResult, StructuralViolation};
use crate::xml::XmlElement;

use super::{
    epti, expect_element, opt_string, required_attr, saml, xsi_type, AttributeNameFormat,
    FromXml, Identifier, ToXml, SAML_NS, XSI_NS, XS_NS,
};

/// An encrypted attribute (`saml:EncryptedAttribute`).
pub type EncryptedAttribute = Encrypted<Attribute>;

/// A single `AttributeValue`.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// `xs:string` (or untyped text).
    String(String),
    /// `xs:integer`.
    Integer(i64),
    /// An identifier element, as required for eduPersonTargetedID.
    Identifier(Identifier),
    /// Anything else, kept as the whole `AttributeValue` element.
    Xml(XmlElement),
}

impl AttributeValue {
    /// Returns the string value, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    fn typed(xs_type: &str, text: &str) -> XmlElement {
        let mut el = saml("AttributeValue");
        el.declare_namespace(Some("xs"), XS_NS);
        el.declare_namespace(Some("xsi"), XSI_NS);
        el.set_attr_ns(XSI_NS, "xsi", "type", format!("xs:{xs_type}"));
        el.with_text(text)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl ToXml for AttributeValue {
    fn to_element(&self) -> XmlElement {
        match self {
            Self::String(s) => Self::typed("string", s),
            Self::Integer(i) => Self::typed("integer", &i.to_string()),
            Self::Identifier(identifier) => {
                saml("AttributeValue").with_child(identifier.to_element())
            }
            Self::Xml(el) => el.clone(),
        }
    }
}

impl FromXml for AttributeValue {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, SAML_NS, "AttributeValue")?;
        let mut children = element.child_elements();
        if let (Some(child), None) = (children.next(), children.next()) {
            if Identifier::is_identifier_element(child) {
                return Identifier::from_xml(child, ctx).map(Self::Identifier);
            }
        }
        if element.has_element_children() {
            return Ok(Self::Xml(element.clone()));
        }
        match xsi_type(element) {
            None | Some("string") => Ok(Self::String(element.text())),
            Some("integer") => {
                let text = element.text();
                text.trim().parse().map(Self::Integer).map_err(|_| {
                    StructuralViolation::InvalidValue {
                        element: "AttributeValue".into(),
                        value: text.clone(),
                    }
                    .into()
                })
            }
            Some(_) => Ok(Self::Xml(element.clone())),
        }
    }
}

/// Returns true for either name of eduPersonTargetedID.
fn is_targeted_id(name: &str) -> bool {
    name == epti::URN_OID || name == epti::NAME
}

/// `Attribute`.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    name: String,
    name_format: Option<String>,
    friendly_name: Option<String>,
    values: Vec<AttributeValue>,
}

impl Attribute {
    /// Creates an attribute, enforcing a non-empty name and the
    /// eduPersonTargetedID value rule.
    pub fn new(name: impl Into<String>, values: Vec<AttributeValue>) -> SamlResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SamlError::missing_attribute("Attribute", "Name"));
        }
        if is_targeted_id(&name) {
            if let Some(index) = values
                .iter()
                .position(|v| !matches!(v, AttributeValue::Identifier(_)))
            {
                return Err(StructuralViolation::NonIdentifierValue {
                    attribute: name,
                    index,
                }
                .into());
            }
        }
        Ok(Self {
            name,
            name_format: None,
            friendly_name: None,
            values,
        })
    }

    /// Creates a string-valued attribute.
    pub fn strings<I, S>(name: impl Into<String>, values: I) -> SamlResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            values
                .into_iter()
                .map(|v| AttributeValue::String(v.into()))
                .collect(),
        )
    }

    /// Sets the name format.
    #[must_use]
    pub fn with_name_format(mut self, format: AttributeNameFormat) -> Self {
        self.name_format = Some(format.uri().to_string());
        self
    }

    /// Sets the friendly name.
    #[must_use]
    pub fn with_friendly_name(mut self, friendly_name: impl Into<String>) -> Self {
        self.friendly_name = Some(friendly_name.into());
        self
    }

    /// `Name`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `NameFormat` as written.
    #[must_use]
    pub fn name_format(&self) -> Option<&str> {
        self.name_format.as_deref()
    }

    /// `NameFormat`, defaulting to unspecified.
    #[must_use]
    pub fn effective_name_format(&self) -> &str {
        self.name_format
            .as_deref()
            .unwrap_or(AttributeNameFormat::Unspecified.uri())
    }

    /// `FriendlyName`.
    #[must_use]
    pub fn friendly_name(&self) -> Option<&str> {
        self.friendly_name.as_deref()
    }

    /// Values in document order.
    #[must_use]
    pub fn values(&self) -> &[AttributeValue] {
        &self.values
    }

    /// String values, skipping other kinds.
    pub fn string_values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().filter_map(AttributeValue::as_str)
    }
}

impl ToXml for Attribute {
    fn to_element(&self) -> XmlElement {
        let mut el = saml("Attribute").with_attr("Name", self.name.as_str());
        el.set_opt_attr("NameFormat", self.name_format.as_deref());
        el.set_opt_attr("FriendlyName", self.friendly_name.as_deref());
        for value in &self.values {
            value.append_to(&mut el);
        }
        el
    }
}

impl FromXml for Attribute {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, SAML_NS, "Attribute")?;
        let name = required_attr(element, "Name")?;
        let values = element
            .children_named(SAML_NS, "AttributeValue")
            .map(|v| AttributeValue::from_xml(v, ctx))
            .collect::<SamlResult<Vec<_>>>()?;
        let mut attribute = Self::new(name, values)?;
        attribute.name_format = opt_string(element, "NameFormat");
        attribute.friendly_name = opt_string(element, "FriendlyName");
        Ok(attribute)
    }
}

impl Encryptable for Attribute {
    const WRAPPER: &'static str = "EncryptedAttribute";

    fn from_decrypted(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        if !element.is(SAML_NS, "Attribute") {
            return Err(SamlError::UnsupportedIdentifier(element.qualified_name()));
        }
        Self::from_xml(element, ctx)
    }
}

/// `AttributeStatement`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeStatement {
    attributes: Vec<Attribute>,
    encrypted_attributes: Vec<EncryptedAttribute>,
}

impl AttributeStatement {
    /// Creates a statement; at least one attribute is required.
    pub fn new(attributes: Vec<Attribute>) -> SamlResult<Self> {
        Self::from_parts(attributes, Vec::new())
    }

    /// Creates a statement from plain and encrypted attributes.
    pub fn from_parts(
        attributes: Vec<Attribute>,
        encrypted_attributes: Vec<EncryptedAttribute>,
    ) -> SamlResult<Self> {
        if attributes.is_empty() && encrypted_attributes.is_empty() {
            return Err(SamlError::missing_element("AttributeStatement", "Attribute"));
        }
        Ok(Self {
            attributes,
            encrypted_attributes,
        })
    }

    /// Plain attributes.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Encrypted attributes.
    #[must_use]
    pub fn encrypted_attributes(&self) -> &[EncryptedAttribute] {
        &self.encrypted_attributes
    }

    /// First plain attribute with the given name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// The statement-wide name format.
    ///
    /// Mixed formats collapse to unspecified rather than failing.
    #[must_use]
    pub fn name_format(&self) -> &str {
        let mut formats = self.attributes.iter().map(Attribute::effective_name_format);
        match formats.next() {
            Some(first) if formats.all(|f| f == first) => first,
            _ => AttributeNameFormat::Unspecified.uri(),
        }
    }
}

impl ToXml for AttributeStatement {
    fn to_element(&self) -> XmlElement {
        let mut el = saml("AttributeStatement");
        for attribute in &self.attributes {
            attribute.append_to(&mut el);
        }
        for encrypted in &self.encrypted_attributes {
            encrypted.append_to(&mut el);
        }
        el
    }
}

impl FromXml for AttributeStatement {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, SAML_NS, "AttributeStatement")?;
        let mut attributes = Vec::new();
        let mut encrypted_attributes = Vec::new();
        for child in element.child_elements() {
            if child.is(SAML_NS, "Attribute") {
                attributes.push(Attribute::from_xml(child, ctx)?);
            } else if child.is(SAML_NS, "EncryptedAttribute") {
                encrypted_attributes.push(EncryptedAttribute::from_xml(child, ctx)?);
            } else {
                return Err(StructuralViolation::UnexpectedElement {
                    expected: format!("{{{SAML_NS}}}Attribute"),
                    found: child.qualified_name(),
                }
                .into());
            }
        }
        Self::from_parts(attributes, encrypted_attributes)
    }
}
