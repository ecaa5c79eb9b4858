//! Authorization decision statements and the statement union.

use crate::context::SamlContext;
use crate::error::{SamlError, SamlResult, StructuralViolation};
use crate::xml::XmlElement;

use super::{
    at_most_one, expect_element, opt_string, required_attr, saml, xsi_type, AttributeStatement,
    AuthnStatement, FromXml, ToXml, SAML_NS, XSI_NS,
};

/// `Decision` attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Access is permitted.
    Permit,
    /// Access is denied.
    Deny,
    /// No decision could be made.
    Indeterminate,
}

impl Decision {
    /// The attribute value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Permit => "Permit",
            Self::Deny => "Deny",
            Self::Indeterminate => "Indeterminate",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "Permit" => Some(Self::Permit),
            "Deny" => Some(Self::Deny),
            "Indeterminate" => Some(Self::Indeterminate),
            _ => None,
        }
    }
}

/// An `Action` within an authorization decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Action namespace URI.
    pub namespace: Option<String>,
    /// Action name.
    pub value: String,
}

/// `AuthzDecisionStatement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzDecisionStatement {
    resource: String,
    decision: Decision,
    actions: Vec<Action>,
    evidence: Option<XmlElement>,
}

impl AuthzDecisionStatement {
    /// Creates a statement; at least one action is required.
    pub fn new(
        resource: impl Into<String>,
        decision: Decision,
        actions: Vec<Action>,
    ) -> SamlResult<Self> {
        if actions.is_empty() {
            return Err(SamlError::missing_element("AuthzDecisionStatement", "Action"));
        }
        Ok(Self {
            resource: resource.into(),
            decision,
            actions,
            evidence: None,
        })
    }

    /// Attaches `Evidence`, kept opaque.
    #[must_use]
    pub fn with_evidence(mut self, evidence: XmlElement) -> Self {
        self.evidence = Some(evidence);
        self
    }

    /// The resource URI.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The decision.
    #[must_use]
    pub fn decision(&self) -> Decision {
        self.decision
    }

    /// The actions.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// The evidence.
    #[must_use]
    pub fn evidence(&self) -> Option<&XmlElement> {
        self.evidence.as_ref()
    }
}

impl ToXml for AuthzDecisionStatement {
    fn to_element(&self) -> XmlElement {
        let mut el = saml("AuthzDecisionStatement")
            .with_attr("Resource", self.resource.as_str())
            .with_attr("Decision", self.decision.as_str());
        for action in &self.actions {
            let mut a = saml("Action");
            a.set_opt_attr("Namespace", action.namespace.as_deref());
            el.push_element(a.with_text(&action.value));
        }
        if let Some(evidence) = &self.evidence {
            el.push_element(evidence.clone());
        }
        el
    }
}

impl FromXml for AuthzDecisionStatement {
    fn from_xml(element: &XmlElement, _ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, SAML_NS, "AuthzDecisionStatement")?;
        let resource = required_attr(element, "Resource")?;
        let decision_value = required_attr(element, "Decision")?;
        let decision = Decision::parse(decision_value).ok_or_else(|| {
            SamlError::invalid_attribute("AuthzDecisionStatement", "Decision", decision_value)
        })?;
        let actions = element
            .children_named(SAML_NS, "Action")
            .map(|a| Action {
                namespace: opt_string(a, "Namespace"),
                value: a.text(),
            })
            .collect();
        let mut statement = Self::new(resource, decision, actions)?;
        statement.evidence = at_most_one(element, SAML_NS, "Evidence")?.cloned();
        Ok(statement)
    }
}

/// A registered extension statement (`saml:Statement` with `xsi:type`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomStatement {
    element: XmlElement,
}

impl CustomStatement {
    /// Creates a statement of the given extension type.
    #[must_use]
    pub fn new(type_namespace: &str, type_prefix: &str, type_name: &str) -> Self {
        let mut element = saml("Statement");
        element.declare_namespace(Some(type_prefix), type_namespace);
        element.set_attr_ns(XSI_NS, "xsi", "type", format!("{type_prefix}:{type_name}"));
        Self { element }
    }

    /// Wraps a parsed `Statement` element without consulting the registry.
    pub fn from_element(element: &XmlElement) -> SamlResult<Self> {
        expect_element(element, SAML_NS, "Statement")?;
        if xsi_type(element).is_none() {
            return Err(SamlError::missing_attribute("Statement", "xsi:type"));
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

/// Any statement an assertion may carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `AuthnStatement`.
    Authn(AuthnStatement),
    /// `AttributeStatement`.
    Attribute(AttributeStatement),
    /// `AuthzDecisionStatement`.
    AuthzDecision(AuthzDecisionStatement),
    /// Registered extension statement.
    Custom(CustomStatement),
}

impl Statement {
    /// Returns true if `element` is a statement element.
    pub(crate) fn is_statement_element(element: &XmlElement) -> bool {
        element.namespace.as_deref() == Some(SAML_NS)
            && matches!(
                element.name.as_str(),
                "AuthnStatement" | "AttributeStatement" | "AuthzDecisionStatement" | "Statement"
            )
    }
}

impl From<AuthnStatement> for Statement {
    fn from(statement: AuthnStatement) -> Self {
        Self::Authn(statement)
    }
}

impl From<AttributeStatement> for Statement {
    fn from(statement: AttributeStatement) -> Self {
        Self::Attribute(statement)
    }
}

impl From<AuthzDecisionStatement> for Statement {
    fn from(statement: AuthzDecisionStatement) -> Self {
        Self::AuthzDecision(statement)
    }
}

impl ToXml for Statement {
    fn to_element(&self) -> XmlElement {
        match self {
            Self::Authn(s) => s.to_element(),
            Self::Attribute(s) => s.to_element(),
            Self::AuthzDecision(s) => s.to_element(),
            Self::Custom(s) => s.element.clone(),
        }
    }
}

impl FromXml for Statement {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        if !Self::is_statement_element(element) {
            return Err(StructuralViolation::UnknownStatement(element.qualified_name()).into());
        }
        match element.name.as_str() {
            "AuthnStatement" => AuthnStatement::from_xml(element, ctx).map(Self::Authn),
            "AttributeStatement" => AttributeStatement::from_xml(element, ctx).map(Self::Attribute),
            "AuthzDecisionStatement" => {
                AuthzDecisionStatement::from_xml(element, ctx).map(Self::AuthzDecision)
            }
            _ => {
                let type_name = xsi_type(element)
                    .ok_or_else(|| SamlError::missing_attribute("Statement", "xsi:type"))?;
                match ctx.registry().statement(type_name) {
                    Some(constructor) => constructor(element, ctx).map(Self::Custom),
                    None => Err(StructuralViolation::UnknownStatement(type_name.to_string()).into()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authz_roundtrip() {
        let statement = AuthzDecisionStatement::new(
            "https://sp.example.com/resource",
            Decision::Permit,
            vec![Action {
                namespace: Some("urn:oasis:names:tc:SAML:1.0:action:rwedc".into()),
                value: "Read".into(),
            }],
        )
        .unwrap()
        .with_evidence(saml("Evidence"));

        let parsed = Statement::from_xml_str(
            &Statement::from(statement.clone()).to_xml_string(),
            &SamlContext::new(),
        )
        .unwrap();
        assert_eq!(parsed, Statement::AuthzDecision(statement));
    }

    #[test]
    fn authz_requires_action() {
        assert!(AuthzDecisionStatement::new("r", Decision::Deny, Vec::new()).is_err());
    }

    #[test]
    fn invalid_decision_value() {
        let xml = format!(
            r#"<saml:AuthzDecisionStatement xmlns:saml="{SAML_NS}" Resource="r" Decision="Maybe"><saml:Action>Read</saml:Action></saml:AuthzDecisionStatement>"#
        );
        assert!(matches!(
            AuthzDecisionStatement::from_xml_str(&xml, &SamlContext::new()),
            Err(SamlError::Structural(StructuralViolation::InvalidAttribute { .. }))
        ));
    }

    #[test]
    fn custom_statement_through_registry() {
        let ctx = SamlContext::new();
        ctx.registry()
            .register_statement("Consent", |el, _| CustomStatement::from_element(el));
        let custom = CustomStatement::new("urn:example:consent", "c", "Consent");
        let xml = Statement::Custom(custom.clone()).to_xml_string();

        assert_eq!(
            Statement::from_xml_str(&xml, &ctx).unwrap(),
            Statement::Custom(custom)
        );
        assert!(matches!(
            Statement::from_xml_str(&xml, &SamlContext::new()),
            Err(SamlError::Structural(StructuralViolation::UnknownStatement(_)))
        ));
    }
}
