//! Authentication statements.

use chrono::{DateTime, Utc};

use crate::context::SamlContext;
use crate::error::{SamlResult, StructuralViolation};
use crate::xml::XmlElement;

use super::{
    at_most_one, exactly_one, expect_element, format_instant, opt_instant, opt_string,
    required_instant, saml, AuthnContextClass, FromXml, ToXml, SAML_NS,
};

/// How and by whom the subject was authenticated.
///
/// At least one of class reference, declaration or declaration reference is
/// present, and declaration and declaration reference exclude each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthnContext {
    class_ref: Option<String>,
    decl: Option<XmlElement>,
    decl_ref: Option<String>,
    authorities: Vec<String>,
}

impl AuthnContext {
    /// Creates a context from its parts, enforcing the Decl/DeclRef rules.
    pub fn new(
        class_ref: Option<String>,
        decl: Option<XmlElement>,
        decl_ref: Option<String>,
        authorities: Vec<String>,
    ) -> SamlResult<Self> {
        if decl.is_some() && decl_ref.is_some() {
            return Err(StructuralViolation::ConflictingAuthnContextDecl.into());
        }
        if class_ref.is_none() && decl.is_none() && decl_ref.is_none() {
            return Err(StructuralViolation::EmptyAuthnContext.into());
        }
        Ok(Self {
            class_ref,
            decl,
            decl_ref,
            authorities,
        })
    }

    /// Context naming only a class reference.
    #[must_use]
    pub fn from_class_ref(class_ref: impl Into<String>) -> Self {
        Self {
            class_ref: Some(class_ref.into()),
            decl: None,
            decl_ref: None,
            authorities: Vec::new(),
        }
    }

    /// Context naming a well-known class.
    #[must_use]
    pub fn from_class(class: AuthnContextClass) -> Self {
        Self::from_class_ref(class.uri())
    }

    /// Adds an authenticating authority.
    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authorities.push(authority.into());
        self
    }

    /// `AuthnContextClassRef`.
    #[must_use]
    pub fn class_ref(&self) -> Option<&str> {
        self.class_ref.as_deref()
    }

    /// `AuthnContextDecl` content.
    #[must_use]
    pub fn decl(&self) -> Option<&XmlElement> {
        self.decl.as_ref()
    }

    /// `AuthnContextDeclRef`.
    #[must_use]
    pub fn decl_ref(&self) -> Option<&str> {
        self.decl_ref.as_deref()
    }

    /// `AuthenticatingAuthority` values.
    #[must_use]
    pub fn authorities(&self) -> &[String] {
        &self.authorities
    }
}

impl ToXml for AuthnContext {
    fn to_element(&self) -> XmlElement {
        let mut el = saml("AuthnContext");
        if let Some(class_ref) = &self.class_ref {
            el.push_element(saml("AuthnContextClassRef").with_text(class_ref));
        }
        if let Some(decl) = &self.decl {
            el.push_element(decl.clone());
        }
        if let Some(decl_ref) = &self.decl_ref {
            el.push_element(saml("AuthnContextDeclRef").with_text(decl_ref));
        }
        for authority in &self.authorities {
            el.push_element(saml("AuthenticatingAuthority").with_text(authority));
        }
        el
    }
}

impl FromXml for AuthnContext {
    fn from_xml(element: &XmlElement, _ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, SAML_NS, "AuthnContext")?;
        let class_ref = at_most_one(element, SAML_NS, "AuthnContextClassRef")?.map(XmlElement::text);
        let decl = at_most_one(element, SAML_NS, "AuthnContextDecl")?.cloned();
        let decl_ref = at_most_one(element, SAML_NS, "AuthnContextDeclRef")?.map(XmlElement::text);
        let authorities = element
            .children_named(SAML_NS, "AuthenticatingAuthority")
            .map(XmlElement::text)
            .collect();
        Self::new(class_ref, decl, decl_ref, authorities)
    }
}

/// `SubjectLocality`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectLocality {
    /// Network address of the authenticated system.
    pub address: Option<String>,
    /// DNS name of the authenticated system.
    pub dns_name: Option<String>,
}

/// `AuthnStatement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthnStatement {
    /// When authentication took place.
    pub authn_instant: DateTime<Utc>,
    /// Session index at the identity provider.
    pub session_index: Option<String>,
    /// When the session must be considered ended.
    pub session_not_on_or_after: Option<DateTime<Utc>>,
    /// Where authentication took place.
    pub subject_locality: Option<SubjectLocality>,
    /// How authentication took place.
    pub authn_context: AuthnContext,
}

impl AuthnStatement {
    /// Creates a statement.
    #[must_use]
    pub fn new(authn_instant: DateTime<Utc>, authn_context: AuthnContext) -> Self {
        Self {
            authn_instant,
            session_index: None,
            session_not_on_or_after: None,
            subject_locality: None,
            authn_context,
        }
    }

    /// Sets the session index.
    #[must_use]
    pub fn with_session_index(mut self, index: impl Into<String>) -> Self {
        self.session_index = Some(index.into());
        self
    }

    /// Sets the session expiry.
    #[must_use]
    pub fn with_session_not_on_or_after(mut self, instant: DateTime<Utc>) -> Self {
        self.session_not_on_or_after = Some(instant);
        self
    }

    /// Sets the subject locality.
    #[must_use]
    pub fn with_subject_locality(mut self, locality: SubjectLocality) -> Self {
        self.subject_locality = Some(locality);
        self
    }
}

impl ToXml for AuthnStatement {
    fn to_element(&self) -> XmlElement {
        let mut el = saml("AuthnStatement")
            .with_attr("AuthnInstant", format_instant(&self.authn_instant));
        el.set_opt_attr("SessionIndex", self.session_index.as_deref());
        el.set_opt_attr(
            "SessionNotOnOrAfter",
            self.session_not_on_or_after.as_ref().map(format_instant),
        );
        if let Some(locality) = &self.subject_locality {
            let mut loc = saml("SubjectLocality");
            loc.set_opt_attr("Address", locality.address.as_deref());
            loc.set_opt_attr("DNSName", locality.dns_name.as_deref());
            el.push_element(loc);
        }
        self.authn_context.append_to(&mut el);
        el
    }
}

impl FromXml for AuthnStatement {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, SAML_NS, "AuthnStatement")?;
        let authn_instant = required_instant(element, "AuthnInstant")?;
        let subject_locality = at_most_one(element, SAML_NS, "SubjectLocality")?.map(|loc| {
            SubjectLocality {
                address: opt_string(loc, "Address"),
                dns_name: opt_string(loc, "DNSName"),
            }
        });
        let authn_context =
            AuthnContext::from_xml(exactly_one(element, SAML_NS, "AuthnContext")?, ctx)?;
        Ok(Self {
            authn_instant,
            session_index: opt_string(element, "SessionIndex"),
            session_not_on_or_after: opt_instant(element, "SessionNotOnOrAfter")?,
            subject_locality,
            authn_context,
        })
    }
}
