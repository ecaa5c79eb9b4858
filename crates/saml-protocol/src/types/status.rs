//! The `samlp:Status` hierarchy.

use crate::context::SamlContext;
use crate::error::{SamlError, SamlResult};
use crate::xml::XmlElement;

use super::{
    at_most_one, exactly_one, expect_element, non_empty, required_attr, samlp, status_codes,
    FromXml, ToXml, SAMLP_NS,
};

/// A status code with its nested second-level codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCode {
    /// The top-level code URI.
    pub value: String,
    /// Nested codes, outermost first.
    pub sub_codes: Vec<String>,
}

impl StatusCode {
    /// A code with no nested codes.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            sub_codes: Vec::new(),
        }
    }

    /// Appends a nested code.
    #[must_use]
    pub fn with_sub_code(mut self, code: impl Into<String>) -> Self {
        self.sub_codes.push(code.into());
        self
    }

    fn parse(element: &XmlElement) -> SamlResult<Self> {
        let value = required_attr(element, "Value")?;
        non_empty("StatusCode", value)?;
        let mut sub_codes = Vec::new();
        let mut current = at_most_one(element, SAMLP_NS, "StatusCode")?;
        while let Some(nested) = current {
            let value = required_attr(nested, "Value")?;
            non_empty("StatusCode", value)?;
            sub_codes.push(value.to_string());
            current = at_most_one(nested, SAMLP_NS, "StatusCode")?;
        }
        Ok(Self {
            value: value.to_string(),
            sub_codes,
        })
    }
}

impl ToXml for StatusCode {
    fn to_element(&self) -> XmlElement {
        let mut nested: Option<XmlElement> = None;
        for code in self.sub_codes.iter().rev() {
            let mut el = samlp("StatusCode").with_attr("Value", code.as_str());
            if let Some(inner) = nested.take() {
                el.push_element(inner);
            }
            nested = Some(el);
        }
        let mut el = samlp("StatusCode").with_attr("Value", self.value.as_str());
        if let Some(inner) = nested {
            el.push_element(inner);
        }
        el
    }
}

/// `samlp:Status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// The status code.
    pub code: StatusCode,
    /// `StatusMessage`.
    pub message: Option<String>,
    /// `StatusDetail`, kept opaque.
    pub detail: Option<XmlElement>,
}

impl Status {
    /// A `Success` status.
    #[must_use]
    pub fn success() -> Self {
        Self::new(StatusCode::new(status_codes::SUCCESS))
    }

    /// A status with the given code.
    #[must_use]
    pub fn new(code: StatusCode) -> Self {
        Self {
            code,
            message: None,
            detail: None,
        }
    }

    /// The status a responder returns for `error`.
    #[must_use]
    pub fn from_error(error: &SamlError) -> Self {
        let mut code = StatusCode::new(error.status_code());
        if let Some(sub) = error.sub_status_code() {
            code = code.with_sub_code(sub);
        }
        Self::new(code).with_message(error.to_string())
    }

    /// Sets the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the detail.
    #[must_use]
    pub fn with_detail(mut self, detail: XmlElement) -> Self {
        self.detail = Some(detail);
        self
    }

    /// True iff the top-level code is `Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code.value == status_codes::SUCCESS
    }
}

impl ToXml for Status {
    fn to_element(&self) -> XmlElement {
        let mut el = samlp("Status");
        self.code.append_to(&mut el);
        if let Some(message) = &self.message {
            el.push_element(samlp("StatusMessage").with_text(message));
        }
        if let Some(detail) = &self.detail {
            el.push_element(detail.clone());
        }
        el
    }
}

impl FromXml for Status {
    fn from_xml(element: &XmlElement, _ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, SAMLP_NS, "Status")?;
        Ok(Self {
            code: StatusCode::parse(exactly_one(element, SAMLP_NS, "StatusCode")?)?,
            message: at_most_one(element, SAMLP_NS, "StatusMessage")?.map(XmlElement::text),
            detail: at_most_one(element, SAMLP_NS, "StatusDetail")?.cloned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::sub_status_codes;

    #[test]
    fn nested_codes_roundtrip() {
        let status = Status::new(
            StatusCode::new(status_codes::RESPONDER)
                .with_sub_code(sub_status_codes::AUTHN_FAILED)
                .with_sub_code("urn:example:detail"),
        )
        .with_message("bad password");

        let parsed = Status::from_xml_str(&status.to_xml_string(), &SamlContext::new()).unwrap();
        assert_eq!(parsed, status);
        assert!(!parsed.is_success());
    }

    #[test]
    fn success_is_top_level_only() {
        assert!(Status::success().is_success());
        let nested_success = Status::new(
            StatusCode::new(status_codes::REQUESTER).with_sub_code(status_codes::SUCCESS),
        );
        assert!(!nested_success.is_success());
    }

    #[test]
    fn status_from_error() {
        let status = Status::from_error(&SamlError::UnsupportedEncoding("gzip".into()));
        assert_eq!(status.code.value, status_codes::REQUESTER);
        assert_eq!(status.code.sub_codes, [sub_status_codes::REQUEST_UNSUPPORTED]);
    }

    #[test]
    fn missing_status_code() {
        let xml = format!(r#"<samlp:Status xmlns:samlp="{SAMLP_NS}"/>"#);
        assert!(matches!(
            Status::from_xml_str(&xml, &SamlContext::new()),
            Err(SamlError::Structural(_))
        ));
    }
}
