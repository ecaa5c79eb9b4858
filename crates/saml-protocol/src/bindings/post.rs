//! HTTP-POST Binding implementation.
//!
//! Implements the SAML 2.0 HTTP-POST binding for sending SAML messages
//! via HTML form POST. Messages are base64 encoded without compression.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{SamlError, SamlResult};

use super::{relay_state, select_message, DecodedMessage, RelayState, SamlMessageType};

/// HTTP-POST binding encoder/decoder.
pub struct HttpPostBinding;

impl HttpPostBinding {
    /// Encodes a SAML request for HTTP-POST binding.
    ///
    /// Returns an HTML form that will auto-submit to the destination.
    #[must_use]
    pub fn encode_request(xml: &str, destination: &str, relay_state: Option<&RelayState>) -> String {
        Self::encode(xml, SamlMessageType::Request, destination, relay_state)
    }

    /// Encodes a SAML response for HTTP-POST binding.
    ///
    /// Returns an HTML form that will auto-submit to the destination.
    #[must_use]
    pub fn encode_response(xml: &str, destination: &str, relay_state: Option<&RelayState>) -> String {
        Self::encode(xml, SamlMessageType::Response, destination, relay_state)
    }

    /// Encodes a SAML message as an auto-submitting HTML form.
    #[must_use]
    pub fn encode(
        xml: &str,
        message_type: SamlMessageType,
        destination: &str,
        relay_state: Option<&RelayState>,
    ) -> String {
        let encoded = STANDARD.encode(xml);
        let param_name = message_type.form_param();

        let relay_state_input = relay_state
            .map(|rs| {
                format!(
                    r#"<input type="hidden" name="RelayState" value="{}"/>"#,
                    html_escape(rs.as_str())
                )
            })
            .unwrap_or_default();

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>SAML POST Binding</title>
</head>
<body onload="document.forms[0].submit()">
    <noscript>
        <p>JavaScript is disabled. Click the button below to continue.</p>
    </noscript>
    <form method="post" action="{}">
        <input type="hidden" name="{}" value="{}"/>
        {}
        <noscript>
            <input type="submit" value="Continue"/>
        </noscript>
    </form>
</body>
</html>"#,
            html_escape(destination),
            param_name,
            encoded,
            relay_state_input
        )
    }

    /// Decodes a SAML message from HTTP-POST form data.
    ///
    /// # Arguments
    ///
    /// * `saml_request` - The SAMLRequest parameter value (if present)
    /// * `saml_response` - The SAMLResponse parameter value (if present)
    /// * `relay_state` - The RelayState parameter value (if present)
    pub fn decode(
        saml_request: Option<&str>,
        saml_response: Option<&str>,
        relay_state_value: Option<&str>,
    ) -> SamlResult<DecodedMessage> {
        let (encoded, message_type) = select_message(saml_request, saml_response)?;

        // Line breaks are legal inside the form value
        let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let decoded = STANDARD
            .decode(compact)
            .map_err(|e| SamlError::Decoding(format!("base64: {e}")))?;
        let xml = String::from_utf8(decoded)
            .map_err(|e| SamlError::Decoding(format!("invalid UTF-8 in message: {e}")))?;

        Ok(DecodedMessage {
            xml,
            message_type,
            relay_state: relay_state(relay_state_value)?,
        })
    }

    /// Decodes an `application/x-www-form-urlencoded` request body.
    pub fn decode_form(body: &str) -> SamlResult<DecodedMessage> {
        let mut saml_request = None;
        let mut saml_response = None;
        let mut relay_state_value = None;
        for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
            match key.as_ref() {
                "SAMLRequest" => saml_request = Some(value.into_owned()),
                "SAMLResponse" => saml_response = Some(value.into_owned()),
                "RelayState" => relay_state_value = Some(value.into_owned()),
                _ => {}
            }
        }
        Self::decode(
            saml_request.as_deref(),
            saml_response.as_deref(),
            relay_state_value.as_deref(),
        )
    }
}

/// Escapes HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract<'a>(html: &'a str, name: &str) -> &'a str {
        let marker = format!("name=\"{name}\" value=\"");
        let start = html.find(&marker).unwrap() + marker.len();
        let end = html[start..].find('"').unwrap();
        &html[start..start + end]
    }

    #[test]
    fn encode_and_decode_request() {
        let xml = r#"<samlp:AuthnRequest>test</samlp:AuthnRequest>"#;
        let rs = RelayState::new("state123").unwrap();
        let html = HttpPostBinding::encode_request(xml, "https://idp.example.com", Some(&rs));

        assert!(html.contains("https://idp.example.com"));
        assert_eq!(extract(&html, "RelayState"), "state123");

        let decoded =
            HttpPostBinding::decode(Some(extract(&html, "SAMLRequest")), None, Some("state123"))
                .unwrap();
        assert_eq!(decoded.xml, xml);
        assert_eq!(decoded.message_type, SamlMessageType::Request);
        assert_eq!(decoded.relay_state, Some(rs));
    }

    #[test]
    fn decode_form_body() {
        let xml = r#"<samlp:Response>test</samlp:Response>"#;
        let body = format!(
            "SAMLResponse={}&RelayState=%2Fapp%2Fhome",
            urlencoding::encode(&STANDARD.encode(xml))
        );
        let decoded = HttpPostBinding::decode_form(&body).unwrap();
        assert_eq!(decoded.xml, xml);
        assert_eq!(decoded.message_type, SamlMessageType::Response);
        assert_eq!(decoded.relay_state.unwrap().as_str(), "/app/home");
    }

    #[test]
    fn decode_missing_message() {
        assert!(matches!(
            HttpPostBinding::decode(None, None, None),
            Err(SamlError::MissingMessageParameter(_))
        ));
    }

    #[test]
    fn overlong_relay_state_is_rejected() {
        let encoded = STANDARD.encode("<x/>");
        assert!(HttpPostBinding::decode(Some(&encoded), None, Some(&"r".repeat(81))).is_err());
    }

    #[test]
    fn html_escape_special_chars() {
        let escaped = html_escape(r#"<script>alert("xss")</script>"#);
        assert!(!escaped.contains('<'));
        assert!(!escaped.contains('>'));
        assert!(!escaped.contains('"'));
    }
}
