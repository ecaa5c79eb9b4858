//! SAML AuthnRequest types.
//!
//! Authentication request message sent by a service provider to an identity provider.

use crate::context::SamlContext;
use crate::error::{SamlError, SamlResult, StructuralViolation};
use crate::xml::XmlElement;

use super::{
    at_most_one, ensure_absolute_uri, opt_bool, opt_number, opt_string, required_attr, samlp,
    signable_message, text_element, AuthnContextClass, Conditions, FromXml, MessageHeader,
    NameIdFormat, SamlBinding, Subject, ToXml, SAMLP_NS, SAML_NS,
};

/// `samlp:NameIDPolicy`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameIdPolicy {
    /// Requested identifier format.
    pub format: Option<NameIdFormat>,
    /// Requested `SPNameQualifier`.
    pub sp_name_qualifier: Option<String>,
    /// Whether the IdP may create a new identifier.
    pub allow_create: Option<bool>,
}

impl NameIdPolicy {
    /// A policy requesting `format`.
    #[must_use]
    pub fn new(format: NameIdFormat) -> Self {
        Self {
            format: Some(format),
            ..Self::default()
        }
    }

    /// Sets `AllowCreate`.
    #[must_use]
    pub const fn allow_create(mut self, allow: bool) -> Self {
        self.allow_create = Some(allow);
        self
    }

    /// Sets `SPNameQualifier`.
    #[must_use]
    pub fn with_sp_name_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.sp_name_qualifier = Some(qualifier.into());
        self
    }
}

impl ToXml for NameIdPolicy {
    fn to_element(&self) -> XmlElement {
        let mut el = samlp("NameIDPolicy");
        el.set_opt_attr("Format", self.format.map(|f| f.uri()));
        el.set_opt_attr("SPNameQualifier", self.sp_name_qualifier.as_deref());
        el.set_opt_attr("AllowCreate", self.allow_create.map(|b| b.to_string()));
        el
    }
}

impl FromXml for NameIdPolicy {
    fn from_xml(element: &XmlElement, _ctx: &SamlContext) -> SamlResult<Self> {
        super::expect_element(element, SAMLP_NS, "NameIDPolicy")?;
        let format = element
            .attr("Format")
            .map(|uri| {
                NameIdFormat::from_uri(uri)
                    .ok_or_else(|| SamlError::invalid_attribute("NameIDPolicy", "Format", uri))
            })
            .transpose()?;
        Ok(Self {
            format,
            sp_name_qualifier: opt_string(element, "SPNameQualifier"),
            allow_create: opt_bool(element, "AllowCreate")?,
        })
    }
}

/// Comparison method for a requested authentication context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthnContextComparison {
    /// Exact match required.
    #[default]
    Exact,
    /// Match must be at least as strong.
    Minimum,
    /// Match must be at most as strong.
    Maximum,
    /// Match must be stronger than every listed context.
    Better,
}

impl AuthnContextComparison {
    /// Returns the attribute value for this comparison.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Minimum => "minimum",
            Self::Maximum => "maximum",
            Self::Better => "better",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "exact" => Some(Self::Exact),
            "minimum" => Some(Self::Minimum),
            "maximum" => Some(Self::Maximum),
            "better" => Some(Self::Better),
            _ => None,
        }
    }
}

/// The references a requested authentication context lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthnContextRefs {
    /// `AuthnContextClassRef` values.
    Class(Vec<String>),
    /// `AuthnContextDeclRef` values.
    Decl(Vec<String>),
}

/// `samlp:RequestedAuthnContext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedAuthnContext {
    comparison: AuthnContextComparison,
    refs: AuthnContextRefs,
}

impl RequestedAuthnContext {
    /// Requests an exact match of a single class.
    #[must_use]
    pub fn exact(class: AuthnContextClass) -> Self {
        Self {
            comparison: AuthnContextComparison::Exact,
            refs: AuthnContextRefs::Class(vec![class.uri().to_string()]),
        }
    }

    /// Creates a context over `refs`; an empty list is rejected.
    pub fn new(comparison: AuthnContextComparison, refs: AuthnContextRefs) -> SamlResult<Self> {
        let empty = match &refs {
            AuthnContextRefs::Class(v) | AuthnContextRefs::Decl(v) => v.is_empty(),
        };
        if empty {
            return Err(SamlError::missing_element(
                "RequestedAuthnContext",
                "AuthnContextClassRef",
            ));
        }
        Ok(Self { comparison, refs })
    }

    /// Sets the comparison method.
    #[must_use]
    pub const fn with_comparison(mut self, comparison: AuthnContextComparison) -> Self {
        self.comparison = comparison;
        self
    }

    /// The comparison method.
    #[must_use]
    pub fn comparison(&self) -> AuthnContextComparison {
        self.comparison
    }

    /// The listed references.
    #[must_use]
    pub fn refs(&self) -> &AuthnContextRefs {
        &self.refs
    }
}

impl ToXml for RequestedAuthnContext {
    fn to_element(&self) -> XmlElement {
        let mut el = samlp("RequestedAuthnContext").with_attr("Comparison", self.comparison.as_str());
        let (name, values) = match &self.refs {
            AuthnContextRefs::Class(v) => ("AuthnContextClassRef", v),
            AuthnContextRefs::Decl(v) => ("AuthnContextDeclRef", v),
        };
        for value in values {
            el.push_element(text_element(super::saml(name), value));
        }
        el
    }
}

impl FromXml for RequestedAuthnContext {
    fn from_xml(element: &XmlElement, _ctx: &SamlContext) -> SamlResult<Self> {
        super::expect_element(element, SAMLP_NS, "RequestedAuthnContext")?;
        let comparison = match element.attr("Comparison") {
            None => AuthnContextComparison::Exact,
            Some(value) => AuthnContextComparison::parse(value).ok_or_else(|| {
                SamlError::invalid_attribute("RequestedAuthnContext", "Comparison", value)
            })?,
        };
        let class: Vec<String> = element
            .children_named(SAML_NS, "AuthnContextClassRef")
            .map(XmlElement::text)
            .collect();
        let decl: Vec<String> = element
            .children_named(SAML_NS, "AuthnContextDeclRef")
            .map(XmlElement::text)
            .collect();
        let refs = match (class.is_empty(), decl.is_empty()) {
            (false, true) => AuthnContextRefs::Class(class),
            (true, false) => AuthnContextRefs::Decl(decl),
            (false, false) => {
                return Err(StructuralViolation::UnexpectedElement {
                    expected: "AuthnContextClassRef".to_string(),
                    found: "AuthnContextDeclRef".to_string(),
                }
                .into())
            }
            (true, true) => {
                return Err(SamlError::missing_element(
                    "RequestedAuthnContext",
                    "AuthnContextClassRef",
                ))
            }
        };
        Ok(Self { comparison, refs })
    }
}

/// `samlp:IDPEntry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpEntry {
    /// `ProviderID`, never empty.
    pub provider_id: String,
    /// Display name.
    pub name: Option<String>,
    /// Single sign-on endpoint of the provider.
    pub loc: Option<String>,
}

impl IdpEntry {
    /// An entry for `provider_id`.
    #[must_use]
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            name: None,
            loc: None,
        }
    }
}

impl ToXml for IdpEntry {
    fn to_element(&self) -> XmlElement {
        let mut el = samlp("IDPEntry").with_attr("ProviderID", self.provider_id.as_str());
        el.set_opt_attr("Name", self.name.as_deref());
        el.set_opt_attr("Loc", self.loc.as_deref());
        el
    }
}

/// `samlp:IDPList`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpList {
    entries: Vec<IdpEntry>,
    get_complete: Option<String>,
}

impl IdpList {
    /// Creates a list; every entry needs a non-empty provider ID.
    pub fn new(entries: Vec<IdpEntry>) -> SamlResult<Self> {
        if entries.is_empty() {
            return Err(SamlError::missing_element("IDPList", "IDPEntry"));
        }
        if let Some(index) = entries.iter().position(|e| e.provider_id.trim().is_empty()) {
            return Err(StructuralViolation::MissingProviderId { index }.into());
        }
        Ok(Self {
            entries,
            get_complete: None,
        })
    }

    /// Sets `GetComplete`.
    #[must_use]
    pub fn with_get_complete(mut self, uri: impl Into<String>) -> Self {
        self.get_complete = Some(uri.into());
        self
    }

    /// The entries in order.
    #[must_use]
    pub fn entries(&self) -> &[IdpEntry] {
        &self.entries
    }

    /// `GetComplete`.
    #[must_use]
    pub fn get_complete(&self) -> Option<&str> {
        self.get_complete.as_deref()
    }
}

impl ToXml for IdpList {
    fn to_element(&self) -> XmlElement {
        let mut el = samlp("IDPList");
        for entry in &self.entries {
            entry.append_to(&mut el);
        }
        if let Some(uri) = &self.get_complete {
            el.push_element(text_element(samlp("GetComplete"), uri));
        }
        el
    }
}

impl FromXml for IdpList {
    fn from_xml(element: &XmlElement, _ctx: &SamlContext) -> SamlResult<Self> {
        super::expect_element(element, SAMLP_NS, "IDPList")?;
        let entries = element
            .children_named(SAMLP_NS, "IDPEntry")
            .enumerate()
            .map(|(index, entry)| match entry.attr("ProviderID") {
                Some(id) if !id.trim().is_empty() => Ok(IdpEntry {
                    provider_id: id.to_string(),
                    name: opt_string(entry, "Name"),
                    loc: opt_string(entry, "Loc"),
                }),
                _ => Err(StructuralViolation::MissingProviderId { index }.into()),
            })
            .collect::<SamlResult<Vec<_>>>()?;
        let list = Self::new(entries)?;
        Ok(match at_most_one(element, SAMLP_NS, "GetComplete")? {
            Some(get_complete) => list.with_get_complete(get_complete.text()),
            None => list,
        })
    }
}

/// `samlp:Scoping`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scoping {
    /// Proxying depth the requester allows.
    pub proxy_count: Option<u32>,
    /// Identity providers the requester trusts.
    pub idp_list: Option<IdpList>,
    /// Requesters on whose behalf the request is made.
    pub requester_ids: Vec<String>,
}

impl ToXml for Scoping {
    fn to_element(&self) -> XmlElement {
        let mut el = samlp("Scoping");
        el.set_opt_attr("ProxyCount", self.proxy_count.map(|c| c.to_string()));
        if let Some(list) = &self.idp_list {
            list.append_to(&mut el);
        }
        for id in &self.requester_ids {
            el.push_element(text_element(samlp("RequesterID"), id));
        }
        el
    }
}

impl FromXml for Scoping {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        super::expect_element(element, SAMLP_NS, "Scoping")?;
        Ok(Self {
            proxy_count: opt_number(element, "ProxyCount")?,
            idp_list: at_most_one(element, SAMLP_NS, "IDPList")?
                .map(|el| IdpList::from_xml(el, ctx))
                .transpose()?,
            requester_ids: element
                .children_named(SAMLP_NS, "RequesterID")
                .map(XmlElement::text)
                .collect(),
        })
    }
}

/// Where the identity provider should deliver its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssertionConsumerService {
    /// `AssertionConsumerServiceURL`.
    Url(String),
    /// `AssertionConsumerServiceIndex` into the requester's metadata.
    Index(u16),
}

/// `samlp:AuthnRequest`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthnRequest {
    header: MessageHeader,
    subject: Option<Subject>,
    name_id_policy: Option<NameIdPolicy>,
    conditions: Option<Conditions>,
    requested_authn_context: Option<RequestedAuthnContext>,
    scoping: Option<Scoping>,
    force_authn: bool,
    is_passive: bool,
    protocol_binding: Option<String>,
    assertion_consumer_service: Option<AssertionConsumerService>,
    attribute_consuming_service_index: Option<u16>,
    provider_name: Option<String>,
}

signable_message!(AuthnRequest);

impl AuthnRequest {
    /// Creates a request with the given header.
    #[must_use]
    pub fn new(header: MessageHeader) -> Self {
        Self {
            header,
            subject: None,
            name_id_policy: None,
            conditions: None,
            requested_authn_context: None,
            scoping: None,
            force_authn: false,
            is_passive: false,
            protocol_binding: None,
            assertion_consumer_service: None,
            attribute_consuming_service_index: None,
            provider_name: None,
        }
    }

    fn changed(mut self) -> Self {
        self.header.clear_signature();
        self
    }

    /// Sets the assertion consumer service URL, which must be absolute.
    pub fn with_acs_url(mut self, url: impl Into<String>) -> SamlResult<Self> {
        let url = url.into();
        ensure_absolute_uri("AssertionConsumerServiceURL", &url)?;
        self.assertion_consumer_service = Some(AssertionConsumerService::Url(url));
        Ok(self.changed())
    }

    /// Sets the assertion consumer service index.
    #[must_use]
    pub fn with_acs_index(mut self, index: u16) -> Self {
        self.assertion_consumer_service = Some(AssertionConsumerService::Index(index));
        self.changed()
    }

    /// Sets the protocol binding for the response.
    #[must_use]
    pub fn with_binding(mut self, binding: SamlBinding) -> Self {
        self.protocol_binding = Some(binding.uri().to_string());
        self.changed()
    }

    /// Sets the name ID policy.
    #[must_use]
    pub fn with_name_id_policy(mut self, policy: NameIdPolicy) -> Self {
        self.name_id_policy = Some(policy);
        self.changed()
    }

    /// Sets the requested authentication context.
    #[must_use]
    pub fn with_authn_context(mut self, context: RequestedAuthnContext) -> Self {
        self.requested_authn_context = Some(context);
        self.changed()
    }

    /// Sets the scoping.
    #[must_use]
    pub fn with_scoping(mut self, scoping: Scoping) -> Self {
        self.scoping = Some(scoping);
        self.changed()
    }

    /// Sets the requested subject.
    #[must_use]
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self.changed()
    }

    /// Sets the requested conditions.
    #[must_use]
    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self.changed()
    }

    /// Sets force authentication.
    #[must_use]
    pub fn force_authn(mut self, force: bool) -> Self {
        self.force_authn = force;
        self.changed()
    }

    /// Sets passive authentication.
    #[must_use]
    pub fn is_passive(mut self, passive: bool) -> Self {
        self.is_passive = passive;
        self.changed()
    }

    /// Sets the attribute consuming service index.
    #[must_use]
    pub fn with_attribute_consuming_service_index(mut self, index: u16) -> Self {
        self.attribute_consuming_service_index = Some(index);
        self.changed()
    }

    /// Sets the provider name.
    #[must_use]
    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self.changed()
    }

    /// The common message header.
    #[must_use]
    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    /// Requested subject.
    #[must_use]
    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    /// Name ID policy.
    #[must_use]
    pub fn name_id_policy(&self) -> Option<&NameIdPolicy> {
        self.name_id_policy.as_ref()
    }

    /// Requested conditions.
    #[must_use]
    pub fn conditions(&self) -> Option<&Conditions> {
        self.conditions.as_ref()
    }

    /// Requested authentication context.
    #[must_use]
    pub fn requested_authn_context(&self) -> Option<&RequestedAuthnContext> {
        self.requested_authn_context.as_ref()
    }

    /// Scoping.
    #[must_use]
    pub fn scoping(&self) -> Option<&Scoping> {
        self.scoping.as_ref()
    }

    /// `ForceAuthn`.
    #[must_use]
    pub fn is_force_authn(&self) -> bool {
        self.force_authn
    }

    /// `IsPassive`.
    #[must_use]
    pub fn is_passive_request(&self) -> bool {
        self.is_passive
    }

    /// `ProtocolBinding` as declared.
    #[must_use]
    pub fn protocol_binding(&self) -> Option<&str> {
        self.protocol_binding.as_deref()
    }

    /// Returns the parsed protocol binding.
    #[must_use]
    pub fn parsed_binding(&self) -> Option<SamlBinding> {
        self.protocol_binding.as_deref().and_then(SamlBinding::from_uri)
    }

    /// Where the response should go.
    #[must_use]
    pub fn assertion_consumer_service(&self) -> Option<&AssertionConsumerService> {
        self.assertion_consumer_service.as_ref()
    }

    /// `AttributeConsumingServiceIndex`.
    #[must_use]
    pub fn attribute_consuming_service_index(&self) -> Option<u16> {
        self.attribute_consuming_service_index
    }

    /// `ProviderName`.
    #[must_use]
    pub fn provider_name(&self) -> Option<&str> {
        self.provider_name.as_deref()
    }
}

impl ToXml for AuthnRequest {
    fn to_element(&self) -> XmlElement {
        if let Some(source) = self.header.source() {
            return source.clone();
        }
        let mut el = self.header.open("AuthnRequest");
        if self.force_authn {
            el.set_attr("ForceAuthn", "true");
        }
        if self.is_passive {
            el.set_attr("IsPassive", "true");
        }
        el.set_opt_attr("ProtocolBinding", self.protocol_binding.as_deref());
        match &self.assertion_consumer_service {
            Some(AssertionConsumerService::Url(url)) => {
                el.set_attr("AssertionConsumerServiceURL", url.as_str());
            }
            Some(AssertionConsumerService::Index(index)) => {
                el.set_attr("AssertionConsumerServiceIndex", index.to_string());
            }
            None => {}
        }
        el.set_opt_attr(
            "AttributeConsumingServiceIndex",
            self.attribute_consuming_service_index.map(|i| i.to_string()),
        );
        el.set_opt_attr("ProviderName", self.provider_name.as_deref());

        if let Some(subject) = &self.subject {
            subject.append_to(&mut el);
        }
        if let Some(policy) = &self.name_id_policy {
            policy.append_to(&mut el);
        }
        if let Some(conditions) = &self.conditions {
            conditions.append_to(&mut el);
        }
        if let Some(context) = &self.requested_authn_context {
            context.append_to(&mut el);
        }
        if let Some(scoping) = &self.scoping {
            scoping.append_to(&mut el);
        }
        el
    }
}

impl FromXml for AuthnRequest {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        let header = MessageHeader::parse(element, "AuthnRequest", ctx)?;

        let url = opt_string(element, "AssertionConsumerServiceURL");
        let index = opt_number::<u16>(element, "AssertionConsumerServiceIndex")?;
        let assertion_consumer_service = match (url, index) {
            (Some(url), None) => {
                ensure_absolute_uri("AssertionConsumerServiceURL", &url)?;
                Some(AssertionConsumerService::Url(url))
            }
            (None, Some(index)) => Some(AssertionConsumerService::Index(index)),
            (None, None) => None,
            (Some(_), Some(index)) => {
                return Err(SamlError::invalid_attribute(
                    "AuthnRequest",
                    "AssertionConsumerServiceIndex",
                    &index.to_string(),
                ))
            }
        };

        let protocol_binding = opt_string(element, "ProtocolBinding");
        if let Some(binding) = &protocol_binding {
            ensure_absolute_uri("ProtocolBinding", binding)?;
        }

        let subject = at_most_one(element, SAML_NS, "Subject")?
            .map(|el| Subject::from_xml(el, ctx))
            .transpose()?;
        let name_id_policy = at_most_one(element, SAMLP_NS, "NameIDPolicy")?
            .map(|el| NameIdPolicy::from_xml(el, ctx))
            .transpose()?;
        let conditions = at_most_one(element, SAML_NS, "Conditions")?
            .map(|el| Conditions::from_xml(el, ctx))
            .transpose()?;
        let requested_authn_context = at_most_one(element, SAMLP_NS, "RequestedAuthnContext")?
            .map(|el| RequestedAuthnContext::from_xml(el, ctx))
            .transpose()?;
        let scoping = at_most_one(element, SAMLP_NS, "Scoping")?
            .map(|el| Scoping::from_xml(el, ctx))
            .transpose()?;

        Ok(Self {
            header,
            subject,
            name_id_policy,
            conditions,
            requested_authn_context,
            scoping,
            force_authn: opt_bool(element, "ForceAuthn")?.unwrap_or(false),
            is_passive: opt_bool(element, "IsPassive")?.unwrap_or(false),
            protocol_binding,
            assertion_consumer_service,
            attribute_consuming_service_index: opt_number(
                element,
                "AttributeConsumingServiceIndex",
            )?,
            provider_name: opt_string(element, "ProviderName"),
        })
    }
}
