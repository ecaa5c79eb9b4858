//! Assertion conditions.
//!
//! Audience evaluation is conjunctive: when several `AudienceRestriction`
//! elements are present, a relying party is accepted only if every one of
//! them names it.

use chrono::{DateTime, Duration, Utc};

use crate::context::SamlContext;
use crate::error::{SamlError, SamlResult, StructuralViolation};
use crate::xml::XmlElement;

use super::{
    expect_element, format_instant, non_empty, opt_instant, opt_number, saml, xsi_type, FromXml,
    ToXml, SAML_NS, XSI_NS,
};

/// Restricts the assertion to the listed audiences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudienceRestriction {
    /// Accepted audience URIs, at least one.
    pub audiences: Vec<String>,
}

impl AudienceRestriction {
    /// Creates a restriction over the given audiences.
    pub fn new<I, S>(audiences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            audiences: audiences.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if `audience` is listed.
    #[must_use]
    pub fn allows(&self, audience: &str) -> bool {
        self.audiences.iter().any(|a| a == audience)
    }
}

/// Limits re-issuance of the assertion by proxies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyRestriction {
    /// Audiences a derived assertion may be issued to.
    pub audiences: Vec<String>,
    /// Maximum number of proxy hops.
    pub count: Option<u32>,
}

/// A registered extension condition (`saml:Condition` with `xsi:type`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomCondition {
    element: XmlElement,
}

impl CustomCondition {
    /// Creates a condition of the given extension type.
    #[must_use]
    pub fn new(type_namespace: &str, type_prefix: &str, type_name: &str) -> Self {
        let mut element = saml("Condition");
        element.declare_namespace(Some(type_prefix), type_namespace);
        element.set_attr_ns(XSI_NS, "xsi", "type", format!("{type_prefix}:{type_name}"));
        Self { element }
    }

    /// Wraps a parsed `Condition` element without consulting the registry.
    pub fn from_element(element: &XmlElement) -> SamlResult<Self> {
        expect_element(element, SAML_NS, "Condition")?;
        if xsi_type(element).is_none() {
            return Err(SamlError::missing_attribute("Condition", "xsi:type"));
        }
        Ok(Self {
            element: element.clone(),
        })
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

    /// The underlying element.
    #[must_use]
    pub fn element(&self) -> &XmlElement {
        &self.element
    }
}

/// A single condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `AudienceRestriction`.
    AudienceRestriction(AudienceRestriction),
    /// `OneTimeUse`.
    OneTimeUse,
    /// `ProxyRestriction`.
    ProxyRestriction(ProxyRestriction),
    /// Registered extension condition.
    Custom(CustomCondition),
}

fn audience_elements(parent: &mut XmlElement, audiences: &[String]) {
    for audience in audiences {
        parent.push_element(saml("Audience").with_text(audience));
    }
}

fn parse_audiences(element: &XmlElement) -> SamlResult<Vec<String>> {
    element
        .children_named(SAML_NS, "Audience")
        .map(|audience| {
            let value = audience.text();
            non_empty("Audience", &value)?;
            Ok(value)
        })
        .collect()
}

impl ToXml for Condition {
    fn to_element(&self) -> XmlElement {
        match self {
            Self::AudienceRestriction(restriction) => {
                let mut el = saml("AudienceRestriction");
                audience_elements(&mut el, &restriction.audiences);
                el
            }
            Self::OneTimeUse => saml("OneTimeUse"),
            Self::ProxyRestriction(restriction) => {
                let mut el = saml("ProxyRestriction");
                el.set_opt_attr("Count", restriction.count.map(|c| c.to_string()));
                audience_elements(&mut el, &restriction.audiences);
                el
            }
            Self::Custom(custom) => custom.element.clone(),
        }
    }
}

impl FromXml for Condition {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        if element.namespace.as_deref() != Some(SAML_NS) {
            return Err(StructuralViolation::UnknownCondition(element.qualified_name()).into());
        }
        match element.name.as_str() {
            "AudienceRestriction" => {
                let audiences = parse_audiences(element)?;
                if audiences.is_empty() {
                    return Err(SamlError::missing_element("AudienceRestriction", "Audience"));
                }
                Ok(Self::AudienceRestriction(AudienceRestriction { audiences }))
            }
            "OneTimeUse" => Ok(Self::OneTimeUse),
            "ProxyRestriction" => Ok(Self::ProxyRestriction(ProxyRestriction {
                audiences: parse_audiences(element)?,
                count: opt_number(element, "Count")?,
            })),
            "Condition" => {
                let type_name = xsi_type(element)
                    .ok_or_else(|| SamlError::missing_attribute("Condition", "xsi:type"))?;
                match ctx.registry().condition(type_name) {
                    Some(constructor) => constructor(element, ctx).map(Self::Custom),
                    None => Err(StructuralViolation::UnknownCondition(type_name.to_string()).into()),
                }
            }
            _ => Err(StructuralViolation::UnknownCondition(element.qualified_name()).into()),
        }
    }
}

/// The `Conditions` aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions {
    /// Earliest instant at which the assertion is valid.
    pub not_before: Option<DateTime<Utc>>,
    /// Instant at which the assertion expires.
    pub not_on_or_after: Option<DateTime<Utc>>,
    conditions: Vec<Condition>,
}

impl Conditions {
    /// Creates empty conditions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates conditions valid in `[not_before, not_on_or_after)`.
    #[must_use]
    pub fn with_validity(not_before: DateTime<Utc>, not_on_or_after: DateTime<Utc>) -> Self {
        Self {
            not_before: Some(not_before),
            not_on_or_after: Some(not_on_or_after),
            conditions: Vec::new(),
        }
    }

    /// Adds an audience restriction.
    #[must_use]
    pub fn with_audience_restriction<I, S>(mut self, audiences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conditions
            .push(Condition::AudienceRestriction(AudienceRestriction::new(audiences)));
        self
    }

    /// Adds a condition.
    ///
    /// Fails if the condition would be a second `OneTimeUse` or
    /// `ProxyRestriction`, or is an audience restriction with no audience.
    pub fn with_condition(mut self, condition: Condition) -> SamlResult<Self> {
        self.push(condition)?;
        Ok(self)
    }

    fn push(&mut self, condition: Condition) -> SamlResult<()> {
        match &condition {
            Condition::OneTimeUse if self.one_time_use() => {
                return Err(SamlError::too_many("Conditions", "OneTimeUse", 1));
            }
            Condition::ProxyRestriction(_) if self.proxy_restriction().is_some() => {
                return Err(SamlError::too_many("Conditions", "ProxyRestriction", 1));
            }
            Condition::AudienceRestriction(r) if r.audiences.is_empty() => {
                return Err(SamlError::missing_element("AudienceRestriction", "Audience"));
            }
            _ => {}
        }
        self.conditions.push(condition);
        Ok(())
    }

    /// All conditions in document order.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// The audience restrictions in document order.
    pub fn audience_restrictions(&self) -> impl Iterator<Item = &AudienceRestriction> {
        self.conditions.iter().filter_map(|c| match c {
            Condition::AudienceRestriction(r) => Some(r),
            _ => None,
        })
    }

    /// Returns true if `OneTimeUse` is present.
    #[must_use]
    pub fn one_time_use(&self) -> bool {
        self.conditions.iter().any(|c| matches!(c, Condition::OneTimeUse))
    }

    /// The proxy restriction, if any.
    #[must_use]
    pub fn proxy_restriction(&self) -> Option<&ProxyRestriction> {
        self.conditions.iter().find_map(|c| match c {
            Condition::ProxyRestriction(r) => Some(r),
            _ => None,
        })
    }

    /// Returns true if `audience` is accepted by every audience restriction.
    #[must_use]
    pub fn is_audience_acceptable(&self, audience: &str) -> bool {
        self.audience_restrictions().all(|r| r.allows(audience))
    }

    /// Checks the validity window at `now`, widened by `skew` on both ends.
    pub fn check_validity(&self, now: DateTime<Utc>, skew: Duration) -> SamlResult<()> {
        if let Some(not_before) = self.not_before {
            if now + skew < not_before {
                return Err(SamlError::AssertionNotYetValid);
            }
        }
        if let Some(not_on_or_after) = self.not_on_or_after {
            if now - skew >= not_on_or_after {
                return Err(SamlError::AssertionExpired);
            }
        }
        Ok(())
    }
}

impl ToXml for Conditions {
    fn to_element(&self) -> XmlElement {
        let mut el = saml("Conditions");
        el.set_opt_attr("NotBefore", self.not_before.as_ref().map(format_instant));
        el.set_opt_attr(
            "NotOnOrAfter",
            self.not_on_or_after.as_ref().map(format_instant),
        );
        for condition in &self.conditions {
            condition.append_to(&mut el);
        }
        el
    }
}

impl FromXml for Conditions {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, SAML_NS, "Conditions")?;
        let mut conditions = Self {
            not_before: opt_instant(element, "NotBefore")?,
            not_on_or_after: opt_instant(element, "NotOnOrAfter")?,
            conditions: Vec::new(),
        };
        for child in element.child_elements() {
            conditions.push(Condition::from_xml(child, ctx)?)?;
        }
        Ok(conditions)
    }
}
