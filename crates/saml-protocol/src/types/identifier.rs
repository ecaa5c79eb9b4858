//! Subject identifiers.
//!
//! An identifier slot holds exactly one of `NameID`, `BaseID` or
//! `EncryptedID`. `BaseID` is abstract in the schema; concrete kinds are
//! named by `xsi:type` and built by constructors registered in the
//! [`ExtensionRegistry`](crate::context::ExtensionRegistry).

use crate::context::SamlContext;
use crate::encryption::{Encryptable, Encrypted};
use crate::error::{SamlError, SamlResult, StructuralViolation};
use crate::xml::XmlElement;

use super::{
    expect_element, non_empty, opt_string, saml, xsi_type, FromXml, NameIdFormat, ToXml, SAML_NS,
    XSI_NS,
};

/// An encrypted identifier (`saml:EncryptedID`).
pub type EncryptedId = Encrypted<Identifier>;

/// SAML Name ID.
///
/// Represents the identifier of a subject, and doubles as the content model
/// of `Issuer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameId {
    /// The actual identifier value.
    pub value: String,

    /// The format of the name identifier.
    pub format: Option<String>,

    /// The security or administrative domain that qualifies the name.
    pub name_qualifier: Option<String>,

    /// The service provider's entity ID that qualifies the name.
    pub sp_name_qualifier: Option<String>,

    /// A name identifier established by the service provider.
    pub sp_provided_id: Option<String>,
}

impl NameId {
    /// Creates a new name ID with the given value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: None,
            name_qualifier: None,
            sp_name_qualifier: None,
            sp_provided_id: None,
        }
    }

    /// Creates a new email name ID.
    #[must_use]
    pub fn email(email: impl Into<String>) -> Self {
        Self::new(email).with_format(NameIdFormat::Email)
    }

    /// Creates a new persistent name ID.
    #[must_use]
    pub fn persistent(value: impl Into<String>) -> Self {
        Self::new(value).with_format(NameIdFormat::Persistent)
    }

    /// Creates a new transient name ID.
    #[must_use]
    pub fn transient(value: impl Into<String>) -> Self {
        Self::new(value).with_format(NameIdFormat::Transient)
    }

    /// Creates an entity name ID, the usual content of `Issuer`.
    #[must_use]
    pub fn entity(entity_id: impl Into<String>) -> Self {
        Self::new(entity_id).with_format(NameIdFormat::Entity)
    }

    /// Sets the format for this name ID.
    #[must_use]
    pub fn with_format(mut self, format: NameIdFormat) -> Self {
        self.format = Some(format.uri().to_string());
        self
    }

    /// Sets the name qualifier.
    #[must_use]
    pub fn with_name_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.name_qualifier = Some(qualifier.into());
        self
    }

    /// Sets the SP name qualifier.
    #[must_use]
    pub fn with_sp_name_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.sp_name_qualifier = Some(qualifier.into());
        self
    }

    /// Sets the SP-provided ID.
    #[must_use]
    pub fn with_sp_provided_id(mut self, id: impl Into<String>) -> Self {
        self.sp_provided_id = Some(id.into());
        self
    }

    /// Returns the parsed name ID format.
    #[must_use]
    pub fn parsed_format(&self) -> NameIdFormat {
        self.format
            .as_deref()
            .and_then(NameIdFormat::from_uri)
            .unwrap_or_default()
    }

    /// Builds the element under a different name (`Issuer`, `NameID`).
    pub(crate) fn element_named(&self, name: &str) -> XmlElement {
        let mut el = saml(name);
        el.set_opt_attr("NameQualifier", self.name_qualifier.as_deref());
        el.set_opt_attr("SPNameQualifier", self.sp_name_qualifier.as_deref());
        el.set_opt_attr("Format", self.format.as_deref());
        el.set_opt_attr("SPProvidedID", self.sp_provided_id.as_deref());
        el.push_text(&self.value);
        el
    }

    /// Parses a `NameIDType` element with the given local name.
    pub(crate) fn parse_named(element: &XmlElement, name: &str) -> SamlResult<Self> {
        expect_element(element, SAML_NS, name)?;
        // Comments split the text but never shorten it.
        let value = element.text();
        non_empty(name, &value)?;
        Ok(Self {
            value,
            format: opt_string(element, "Format"),
            name_qualifier: opt_string(element, "NameQualifier"),
            sp_name_qualifier: opt_string(element, "SPNameQualifier"),
            sp_provided_id: opt_string(element, "SPProvidedID"),
        })
    }
}

impl ToXml for NameId {
    fn to_element(&self) -> XmlElement {
        self.element_named("NameID")
    }
}

impl FromXml for NameId {
    fn from_xml(element: &XmlElement, _ctx: &SamlContext) -> SamlResult<Self> {
        Self::parse_named(element, "NameID")
    }
}

/// An extension identifier (`saml:BaseID` with an `xsi:type`).
///
/// Content and extra attributes are kept as written; only the qualifiers and
/// the type name are interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseId {
    element: XmlElement,
}

impl BaseId {
    /// Creates a `BaseID` of the given extension type.
    #[must_use]
    pub fn new(type_namespace: &str, type_prefix: &str, type_name: &str) -> Self {
        let mut element = saml("BaseID");
        element.declare_namespace(Some(type_prefix), type_namespace);
        element.set_attr_ns(XSI_NS, "xsi", "type", format!("{type_prefix}:{type_name}"));
        Self { element }
    }

    /// Wraps a parsed `BaseID` element without consulting the registry.
    ///
    /// This is the building block for registered constructors.
    pub fn from_element(element: &XmlElement) -> SamlResult<Self> {
        expect_element(element, SAML_NS, "BaseID")?;
        if xsi_type(element).is_none() {
            return Err(SamlError::missing_attribute("BaseID", "xsi:type"));
        }
        Ok(Self {
            element: element.clone(),
        })
    }

    /// Sets the name qualifier.
    #[must_use]
    pub fn with_name_qualifier(mut self, qualifier: &str) -> Self {
        self.element.set_attr("NameQualifier", qualifier);
        self
    }

    /// Sets the SP name qualifier.
    #[must_use]
    pub fn with_sp_name_qualifier(mut self, qualifier: &str) -> Self {
        self.element.set_attr("SPNameQualifier", qualifier);
        self
    }

    /// Appends extension content.
    #[must_use]
    pub fn with_content(mut self, child: XmlElement) -> Self {
        self.element.push_element(child);
        self
    }

    /// Local part of the `xsi:type`.
    #[must_use]
    pub fn type_name(&self) -> &str {
        xsi_type(&self.element).unwrap_or_default()
    }

    /// The name qualifier.
    #[must_use]
    pub fn name_qualifier(&self) -> Option<&str> {
        self.element.attr("NameQualifier")
    }

    /// The SP name qualifier.
    #[must_use]
    pub fn sp_name_qualifier(&self) -> Option<&str> {
        self.element.attr("SPNameQualifier")
    }

    /// The underlying element.
    #[must_use]
    pub fn element(&self) -> &XmlElement {
        &self.element
    }
}

impl ToXml for BaseId {
    fn to_element(&self) -> XmlElement {
        self.element.clone()
    }
}

impl FromXml for BaseId {
    /// Dispatches on `xsi:type` through the context registry.
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, SAML_NS, "BaseID")?;
        let type_name = xsi_type(element)
            .ok_or_else(|| SamlError::missing_attribute("BaseID", "xsi:type"))?;
        match ctx.registry().identifier(type_name) {
            Some(constructor) => constructor(element, ctx),
            None => {
                tracing::debug!(type_name, "no constructor registered for BaseID type");
                Err(SamlError::UnsupportedIdentifier(type_name.to_string()))
            }
        }
    }
}

/// The content of an identifier slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Identifier {
    /// `saml:NameID`.
    NameId(NameId),
    /// `saml:BaseID` extension.
    BaseId(BaseId),
    /// `saml:EncryptedID`.
    Encrypted(EncryptedId),
}

impl Identifier {
    /// Returns the name ID, if this is a plain one.
    #[must_use]
    pub fn as_name_id(&self) -> Option<&NameId> {
        match self {
            Self::NameId(name_id) => Some(name_id),
            _ => None,
        }
    }

    /// Returns true for an encrypted identifier.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Encrypted(_))
    }

    pub(crate) fn is_identifier_element(element: &XmlElement) -> bool {
        element.namespace.as_deref() == Some(SAML_NS)
            && matches!(element.name.as_str(), "NameID" | "BaseID" | "EncryptedID")
    }

    /// Reads the single optional identifier among `parent`'s children.
    pub(crate) fn from_slot(parent: &XmlElement, ctx: &SamlContext) -> SamlResult<Option<Self>> {
        let mut found = parent
            .child_elements()
            .filter(|el| Self::is_identifier_element(el));
        let Some(first) = found.next() else {
            return Ok(None);
        };
        if found.next().is_some() {
            return Err(StructuralViolation::MultipleIdentifiers(parent.name.clone()).into());
        }
        Self::from_xml(first, ctx).map(Some)
    }
}

impl From<NameId> for Identifier {
    fn from(name_id: NameId) -> Self {
        Self::NameId(name_id)
    }
}

impl From<BaseId> for Identifier {
    fn from(base_id: BaseId) -> Self {
        Self::BaseId(base_id)
    }
}

impl From<EncryptedId> for Identifier {
    fn from(encrypted: EncryptedId) -> Self {
        Self::Encrypted(encrypted)
    }
}

impl ToXml for Identifier {
    fn to_element(&self) -> XmlElement {
        match self {
            Self::NameId(name_id) => name_id.to_element(),
            Self::BaseId(base_id) => base_id.to_element(),
            Self::Encrypted(encrypted) => encrypted.to_element(),
        }
    }
}

impl FromXml for Identifier {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        if element.namespace.as_deref() != Some(SAML_NS) {
            return Err(SamlError::UnsupportedIdentifier(element.qualified_name()));
        }
        match element.name.as_str() {
            "NameID" => NameId::from_xml(element, ctx).map(Self::NameId),
            "BaseID" => BaseId::from_xml(element, ctx).map(Self::BaseId),
            "EncryptedID" => EncryptedId::from_xml(element, ctx).map(Self::Encrypted),
            _ => Err(SamlError::UnsupportedIdentifier(element.qualified_name())),
        }
    }
}

impl Encryptable for Identifier {
    const WRAPPER: &'static str = "EncryptedID";

    fn from_decrypted(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        // An EncryptedID may not decrypt to another EncryptedID.
        if element.is(SAML_NS, "EncryptedID") {
            return Err(SamlError::UnsupportedIdentifier(element.qualified_name()));
        }
        Self::from_xml(element, ctx)
    }
}
