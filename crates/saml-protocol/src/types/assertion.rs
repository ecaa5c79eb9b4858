//! The assertion aggregate.

use chrono::{DateTime, Utc};

use crate::context::SamlContext;
use crate::encryption::{Encryptable, Encrypted};
use crate::error::{SamlError, SamlResult};
use crate::signature::{parse_enveloped, Signable, SignatureEnvelope};
use crate::xml::XmlElement;

use super::{
    at_most_one, check_version, exactly_one, expect_element, format_instant, generate_id,
    non_empty, required_attr, required_instant, saml, AttributeStatement, AuthnStatement, Conditions,
    FromXml, NameId, Statement, Subject, ToXml, DS_NS, SAML_NS, SAML_VERSION,
};

/// An encrypted assertion (`saml:EncryptedAssertion`).
pub type EncryptedAssertion = Encrypted<Assertion>;

/// `saml:Assertion`.
///
/// Carries at most one `AuthnStatement`. An assertion read from XML with a
/// signature keeps the element it was read from, and serializes back to
/// exactly that element.
#[derive(Debug, Clone, PartialEq)]
pub struct Assertion {
    id: String,
    issue_instant: DateTime<Utc>,
    issuer: NameId,
    subject: Option<Subject>,
    conditions: Option<Conditions>,
    advice: Option<XmlElement>,
    statements: Vec<Statement>,
    signature: Option<SignatureEnvelope>,
    source: Option<XmlElement>,
}

impl Assertion {
    /// Starts building an assertion.
    #[must_use]
    pub fn builder(issuer: NameId, issue_instant: DateTime<Utc>) -> AssertionBuilder {
        AssertionBuilder {
            id: generate_id(),
            issue_instant,
            issuer,
            subject: None,
            conditions: None,
            advice: None,
            statements: Vec::new(),
        }
    }

    /// `ID`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `IssueInstant`.
    #[must_use]
    pub fn issue_instant(&self) -> DateTime<Utc> {
        self.issue_instant
    }

    /// `Issuer`.
    #[must_use]
    pub fn issuer(&self) -> &NameId {
        &self.issuer
    }

    /// `Subject`.
    #[must_use]
    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    /// `Conditions`.
    #[must_use]
    pub fn conditions(&self) -> Option<&Conditions> {
        self.conditions.as_ref()
    }

    /// `Advice`, kept opaque.
    #[must_use]
    pub fn advice(&self) -> Option<&XmlElement> {
        self.advice.as_ref()
    }

    /// All statements in document order.
    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// The authentication statement, if any.
    #[must_use]
    pub fn authn_statement(&self) -> Option<&AuthnStatement> {
        self.statements.iter().find_map(|s| match s {
            Statement::Authn(statement) => Some(statement),
            _ => None,
        })
    }

    /// Attribute statements in document order.
    pub fn attribute_statements(&self) -> impl Iterator<Item = &AttributeStatement> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Attribute(statement) => Some(statement),
            _ => None,
        })
    }

    /// Checks the validity window and, when given, the audience at the
    /// context's current time.
    ///
    /// The assertion's `Conditions` and every subject confirmation window
    /// are evaluated with the context's clock skew.
    pub fn validate_at(&self, ctx: &SamlContext, audience: Option<&str>) -> SamlResult<()> {
        let now = ctx.now();
        let skew = ctx.clock_skew();
        if let Some(conditions) = &self.conditions {
            conditions.check_validity(now, skew)?;
            if let Some(audience) = audience {
                if !conditions.is_audience_acceptable(audience) {
                    tracing::debug!(id = %self.id, audience, "audience not accepted");
                    return Err(SamlError::InvalidAudience(audience.to_string()));
                }
            }
        }
        if let Some(subject) = &self.subject {
            for confirmation in subject.confirmations() {
                if let Some(data) = &confirmation.data {
                    data.check_validity(now, skew)?;
                }
            }
        }
        Ok(())
    }
}

fn count_authn(statements: &[Statement]) -> usize {
    statements
        .iter()
        .filter(|s| matches!(s, Statement::Authn(_)))
        .count()
}

/// Builder for [`Assertion`].
#[derive(Debug, Clone)]
pub struct AssertionBuilder {
    id: String,
    issue_instant: DateTime<Utc>,
    issuer: NameId,
    subject: Option<Subject>,
    conditions: Option<Conditions>,
    advice: Option<XmlElement>,
    statements: Vec<Statement>,
}

impl AssertionBuilder {
    /// Replaces the generated ID.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Sets the conditions.
    #[must_use]
    pub fn conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Sets the advice.
    #[must_use]
    pub fn advice(mut self, advice: XmlElement) -> Self {
        self.advice = Some(advice);
        self
    }

    /// Appends a statement.
    #[must_use]
    pub fn statement(mut self, statement: impl Into<Statement>) -> Self {
        self.statements.push(statement.into());
        self
    }

    /// Validates and builds the assertion.
    pub fn build(self) -> SamlResult<Assertion> {
        non_empty("ID", &self.id)?;
        if count_authn(&self.statements) > 1 {
            return Err(SamlError::too_many("Assertion", "AuthnStatement", 1));
        }
        Ok(Assertion {
            id: self.id,
            issue_instant: self.issue_instant,
            issuer: self.issuer,
            subject: self.subject,
            conditions: self.conditions,
            advice: self.advice,
            statements: self.statements,
            signature: None,
            source: None,
        })
    }
}

impl ToXml for Assertion {
    fn to_element(&self) -> XmlElement {
        if let Some(source) = &self.source {
            return source.clone();
        }
        let mut el = saml("Assertion")
            .with_attr("ID", self.id.as_str())
            .with_attr("Version", SAML_VERSION)
            .with_attr("IssueInstant", format_instant(&self.issue_instant));
        el.push_element(self.issuer.element_named("Issuer"));
        if let Some(subject) = &self.subject {
            subject.append_to(&mut el);
        }
        if let Some(conditions) = &self.conditions {
            conditions.append_to(&mut el);
        }
        if let Some(advice) = &self.advice {
            el.push_element(advice.clone());
        }
        for statement in &self.statements {
            statement.append_to(&mut el);
        }
        el
    }
}

impl FromXml for Assertion {
    fn from_xml(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, SAML_NS, "Assertion")?;
        check_version(element)?;
        let id = required_attr(element, "ID")?.to_string();
        non_empty("ID", &id)?;
        let issue_instant = required_instant(element, "IssueInstant")?;
        let issuer = NameId::parse_named(exactly_one(element, SAML_NS, "Issuer")?, "Issuer")?;
        let subject = at_most_one(element, SAML_NS, "Subject")?
            .map(|el| Subject::from_xml(el, ctx))
            .transpose()?;
        let conditions = at_most_one(element, SAML_NS, "Conditions")?
            .map(|el| Conditions::from_xml(el, ctx))
            .transpose()?;
        let advice = at_most_one(element, SAML_NS, "Advice")?.cloned();

        let mut statements = Vec::new();
        for child in element.child_elements() {
            let structural = child.is(DS_NS, "Signature")
                || (child.namespace.as_deref() == Some(SAML_NS)
                    && matches!(
                        child.name.as_str(),
                        "Issuer" | "Subject" | "Conditions" | "Advice"
                    ));
            if !structural {
                statements.push(Statement::from_xml(child, ctx)?);
            }
        }
        if count_authn(&statements) > 1 {
            return Err(SamlError::too_many("Assertion", "AuthnStatement", 1));
        }

        let (signature, source) = match parse_enveloped(element, ctx)? {
            Some((signature, source)) => (Some(signature), Some(source)),
            None => (None, None),
        };
        Ok(Self {
            id,
            issue_instant,
            issuer,
            subject,
            conditions,
            advice,
            statements,
            signature,
            source,
        })
    }
}

impl Signable for Assertion {
    fn signature(&self) -> Option<&SignatureEnvelope> {
        self.signature.as_ref()
    }

    fn signed_element(&self) -> Option<&XmlElement> {
        self.source.as_ref()
    }
}

impl Encryptable for Assertion {
    const WRAPPER: &'static str = "EncryptedAssertion";

    fn from_decrypted(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self> {
        if !element.is(SAML_NS, "Assertion") {
            return Err(SamlError::UnsupportedIdentifier(element.qualified_name()));
        }
        Self::from_xml(element, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StructuralViolation;
    use crate::signature::{test_keys, SigningOptions};
    use crate::types::{
        Attribute, AuthnContext, SubjectConfirmation, SubjectConfirmationData,
    };
    use crate::xml;
    use chrono::{Duration, TimeZone};
    use saml_core::FixedClock;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn sample() -> Assertion {
        Assertion::builder(NameId::new("testIssuer"), instant())
            .id("_assertion1")
            .subject(
                Subject::new(NameId::email("alice@example.com")).with_confirmation(
                    SubjectConfirmation::bearer(SubjectConfirmationData::bearer(
                        "https://sp.example.com/acs",
                        instant() + Duration::minutes(5),
                    )),
                ),
            )
            .conditions(
                Conditions::with_validity(instant(), instant() + Duration::minutes(5))
                    .with_audience_restriction(["audience1", "audience2"]),
            )
            .statement(AuthnStatement::new(
                instant(),
                AuthnContext::from_class_ref("someAuthnContext"),
            ))
            .statement(
                AttributeStatement::new(vec![
                    Attribute::strings("mail", ["alice@example.com"]).unwrap()
                ])
                .unwrap(),
            )
            .build()
            .unwrap()
    }

    fn ctx_at(at: DateTime<Utc>) -> SamlContext {
        SamlContext::new().with_clock(FixedClock::new(at))
    }

    #[test]
    fn serialized_issuer_and_audiences() {
        let el = sample().to_element();
        let issuers: Vec<_> = el.children_named(SAML_NS, "Issuer").collect();
        assert_eq!(issuers.len(), 1);
        assert_eq!(issuers[0].text(), "testIssuer");

        let audiences: Vec<String> = el
            .first_child(SAML_NS, "Conditions")
            .and_then(|c| c.first_child(SAML_NS, "AudienceRestriction"))
            .map(|r| r.children_named(SAML_NS, "Audience").map(XmlElement::text).collect())
            .unwrap();
        assert_eq!(audiences, ["audience1", "audience2"]);
    }

    #[test]
    fn roundtrip() {
        let assertion = sample();
        let parsed = Assertion::from_xml_str(&assertion.to_xml_string(), &SamlContext::new()).unwrap();
        assert_eq!(parsed, assertion);
        assert_eq!(
            parsed.authn_statement().and_then(|s| s.authn_context.class_ref()),
            Some("someAuthnContext")
        );
    }

    #[test]
    fn second_authn_statement_is_rejected() {
        let result = Assertion::builder(NameId::new("i"), instant())
            .statement(AuthnStatement::new(instant(), AuthnContext::from_class_ref("a")))
            .statement(AuthnStatement::new(instant(), AuthnContext::from_class_ref("b")))
            .build();
        assert!(matches!(
            result,
            Err(SamlError::Structural(StructuralViolation::TooMany { .. }))
        ));
    }

    #[test]
    fn missing_issuer_and_duplicate_subject() {
        let ctx = SamlContext::new();
        let base = sample().to_element();

        let mut no_issuer = base.clone();
        no_issuer
            .children
            .retain(|n| !matches!(n, xml::XmlNode::Element(e) if e.name == "Issuer"));
        assert!(matches!(
            Assertion::from_xml(&no_issuer, &ctx),
            Err(SamlError::Structural(StructuralViolation::MissingElement { .. }))
        ));

        let mut two_subjects = base.clone();
        let subject = base.first_child(SAML_NS, "Subject").unwrap().clone();
        two_subjects.push_element(subject);
        assert!(matches!(
            Assertion::from_xml(&two_subjects, &ctx),
            Err(SamlError::Structural(StructuralViolation::TooMany { .. }))
        ));
    }

    #[test]
    fn empty_id_is_rejected() {
        let el = sample().to_element().with_attr("ID", "");
        assert!(matches!(
            Assertion::from_xml(&el, &SamlContext::new()),
            Err(SamlError::Structural(StructuralViolation::EmptyValue { .. }))
        ));
        assert!(matches!(
            Assertion::builder(NameId::new("i"), instant()).id("").build(),
            Err(SamlError::Structural(StructuralViolation::EmptyValue { .. }))
        ));
    }

    #[test]
    fn unknown_child_is_unknown_statement() {
        let el = sample()
            .to_element()
            .with_child(XmlElement::new(SAML_NS, "saml", "Bogus"));
        assert!(matches!(
            Assertion::from_xml(&el, &SamlContext::new()),
            Err(SamlError::Structural(StructuralViolation::UnknownStatement(_)))
        ));
    }

    #[test]
    fn validity_window_and_audience() {
        let assertion = sample();
        let inside = ctx_at(instant() + Duration::minutes(1));
        assertion.validate_at(&inside, Some("audience1")).unwrap();
        assert!(matches!(
            assertion.validate_at(&inside, Some("other")),
            Err(SamlError::InvalidAudience(_))
        ));
        assert!(matches!(
            assertion.validate_at(&ctx_at(instant() + Duration::minutes(10)), None),
            Err(SamlError::AssertionExpired)
        ));
        assert!(matches!(
            assertion.validate_at(&ctx_at(instant() - Duration::minutes(10)), None),
            Err(SamlError::AssertionNotYetValid)
        ));
    }

    #[test]
    fn signed_assertion_keeps_its_signed_form() {
        let ctx = SamlContext::new();
        let signed = sample()
            .sign(&test_keys::idp_signer(), &SigningOptions::default(), &ctx)
            .unwrap();
        assert!(signed.is_signed());
        signed.verify(&test_keys::idp_verifier(), &ctx).unwrap();

        let reparsed = Assertion::from_xml_str(&signed.to_xml_string(), &ctx).unwrap();
        reparsed.verify(&test_keys::idp_verifier(), &ctx).unwrap();
        assert_eq!(reparsed.issuer().value, "testIssuer");
    }

    #[test]
    fn unsigned_assertion_does_not_verify() {
        assert!(matches!(
            sample().verify(&test_keys::idp_verifier(), &SamlContext::new()),
            Err(SamlError::SignatureVerification(_))
        ));
    }
}
