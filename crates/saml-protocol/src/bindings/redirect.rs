//! HTTP-Redirect Binding implementation.
//!
//! Implements the SAML 2.0 HTTP-Redirect binding for sending SAML messages
//! via URL query parameters with DEFLATE compression.
//!
//! The query signature covers the exact url-encoded bytes of
//! `SAMLRequest|SAMLResponse`, `RelayState` and `SigAlg`, in that order.
//! Verification rebuilds that sequence from the raw values as received and
//! never re-encodes.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use saml_core::{SignatureAlgorithm, Signer, Verifier};

use crate::context::SamlContext;
use crate::error::{SamlError, SamlResult};

use super::{relay_state, select_message, DecodedMessage, RelayState, SamlMessageType};

/// The only `SAMLEncoding` this binding supports.
pub const DEFLATE_ENCODING: &str = "urn:oasis:names:tc:SAML:2.0:bindings:URL-Encoding:DEFLATE";

/// Upper bound on an inflated message.
const MAX_INFLATED_LEN: u64 = 1 << 20;

/// HTTP-Redirect binding encoder/decoder.
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Encodes a SAML request for HTTP-Redirect binding.
    ///
    /// Returns a URL with the encoded message in query parameters.
    pub fn encode_request(
        xml: &str,
        destination: &str,
        relay_state: Option<&RelayState>,
    ) -> SamlResult<String> {
        Self::encode(xml, SamlMessageType::Request, destination, relay_state)
    }

    /// Encodes a SAML response for HTTP-Redirect binding.
    ///
    /// Returns a URL with the encoded message in query parameters.
    pub fn encode_response(
        xml: &str,
        destination: &str,
        relay_state: Option<&RelayState>,
    ) -> SamlResult<String> {
        Self::encode(xml, SamlMessageType::Response, destination, relay_state)
    }

    /// Encodes a SAML message for HTTP-Redirect binding.
    pub fn encode(
        xml: &str,
        message_type: SamlMessageType,
        destination: &str,
        relay_state: Option<&RelayState>,
    ) -> SamlResult<String> {
        let query = unsigned_query(xml, message_type, relay_state)?;
        Ok(append_query(destination, &query))
    }

    /// Encodes a SAML message and signs the query string.
    ///
    /// The signature is over the query string parameters, not embedded in the XML.
    pub fn encode_signed(
        xml: &str,
        message_type: SamlMessageType,
        destination: &str,
        relay_state: Option<&RelayState>,
        signer: &dyn Signer,
        ctx: &SamlContext,
    ) -> SamlResult<String> {
        let algorithm = signer.algorithm();
        ctx.policy().ensure_allowed(algorithm.uri())?;

        let mut query = unsigned_query(xml, message_type, relay_state)?;
        query.push_str("&SigAlg=");
        query.push_str(&urlencoding::encode(algorithm.uri()));
        let signature = signer.sign(query.as_bytes())?;
        query.push_str("&Signature=");
        query.push_str(&urlencoding::encode(&STANDARD.encode(signature)));

        tracing::debug!(
            parameter = message_type.form_param(),
            algorithm = algorithm.uri(),
            "signed redirect query"
        );
        Ok(append_query(destination, &query))
    }

    /// Decodes a SAML message from a raw (still url-encoded) query string.
    pub fn decode_query(raw_query: &str) -> SamlResult<RedirectMessage> {
        let params = RawQuery::parse(raw_query)?;

        if let Some(encoding) = params.value("SAMLEncoding")? {
            if encoding != DEFLATE_ENCODING {
                return Err(SamlError::UnsupportedEncoding(encoding));
            }
        }

        let saml_request = params.value("SAMLRequest")?;
        let saml_response = params.value("SAMLResponse")?;
        let (encoded, message_type) =
            select_message(saml_request.as_deref(), saml_response.as_deref())?;

        let compressed = STANDARD
            .decode(encoded.trim())
            .map_err(|e| SamlError::Decoding(format!("base64: {e}")))?;
        let xml_bytes = deflate_decompress(&compressed)?;
        let xml = String::from_utf8(xml_bytes)
            .map_err(|e| SamlError::Decoding(format!("invalid UTF-8 in message: {e}")))?;

        let signed_content = params.signed_content(message_type.form_param());

        Ok(RedirectMessage {
            message: DecodedMessage {
                xml,
                message_type,
                relay_state: relay_state(params.value("RelayState")?.as_deref())?,
            },
            sig_alg: params.value("SigAlg")?,
            signature: params.value("Signature")?,
            signed_content,
        })
    }

    /// Decodes a message from a full URL.
    pub fn decode_url(url: &str) -> SamlResult<RedirectMessage> {
        let parsed = url::Url::parse(url).map_err(|e| SamlError::Decoding(format!("URL: {e}")))?;
        Self::decode_query(parsed.query().unwrap_or_default())
    }
}

/// A message received over HTTP-Redirect, with its query signature.
#[derive(Debug, Clone)]
pub struct RedirectMessage {
    /// The decoded message.
    pub message: DecodedMessage,
    sig_alg: Option<String>,
    signature: Option<String>,
    signed_content: String,
}

impl RedirectMessage {
    /// Returns true if the query carried a signature.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// The declared `SigAlg`.
    #[must_use]
    pub fn sig_alg(&self) -> Option<&str> {
        self.sig_alg.as_deref()
    }

    /// Verifies the query signature over the raw values in signing order.
    ///
    /// An unsigned query is a verification failure.
    pub fn verify(&self, verifier: &dyn Verifier, ctx: &SamlContext) -> SamlResult<()> {
        let (Some(sig_alg), Some(signature)) = (&self.sig_alg, &self.signature) else {
            return Err(SamlError::SignatureVerification(
                "query carries no SigAlg and Signature pair".into(),
            ));
        };
        ctx.policy().ensure_allowed(sig_alg)?;
        let declared = SignatureAlgorithm::from_uri(sig_alg)
            .ok_or_else(|| SamlError::UnsupportedAlgorithm(sig_alg.clone()))?;
        if declared != verifier.algorithm() {
            return Err(SamlError::AlgorithmMismatch {
                expected: verifier.algorithm().uri().to_string(),
                actual: declared.uri().to_string(),
            });
        }
        let signature = STANDARD
            .decode(signature.trim())
            .map_err(|_| SamlError::SignatureVerification("malformed Signature".into()))?;
        if verifier.verify(self.signed_content.as_bytes(), &signature)? {
            Ok(())
        } else {
            tracing::debug!(algorithm = sig_alg.as_str(), "redirect signature mismatch");
            Err(SamlError::SignatureVerification(
                "query signature does not match".into(),
            ))
        }
    }
}

/// Query parameters in arrival order with their raw values.
struct RawQuery {
    pairs: Vec<(String, String)>,
}

impl RawQuery {
    fn parse(raw: &str) -> SamlResult<Self> {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        let mut pairs: Vec<(String, String)> = Vec::new();
        for part in raw.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            if pairs.iter().any(|(k, _)| k == key) {
                return Err(SamlError::Decoding(format!("duplicate parameter {key}")));
            }
            pairs.push((key.to_string(), value.to_string()));
        }
        Ok(Self { pairs })
    }

    fn raw(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, raw)| raw.as_str())
    }

    /// The signed octets, rebuilt as `param=..[&RelayState=..]&SigAlg=..`
    /// from the raw values regardless of arrival order.
    fn signed_content(&self, message_param: &str) -> String {
        [message_param, "RelayState", "SigAlg"]
            .into_iter()
            .filter_map(|key| self.raw(key).map(|raw| format!("{key}={raw}")))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn value(&self, key: &str) -> SamlResult<Option<String>> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, raw)| {
                urlencoding::decode(raw)
                    .map(|v| v.into_owned())
                    .map_err(|e| SamlError::Decoding(format!("{key}: {e}")))
            })
            .transpose()
    }
}

fn unsigned_query(
    xml: &str,
    message_type: SamlMessageType,
    relay_state: Option<&RelayState>,
) -> SamlResult<String> {
    let compressed = deflate_compress(xml.as_bytes())?;
    let encoded = STANDARD.encode(compressed);
    let mut query = format!(
        "{}={}",
        message_type.form_param(),
        urlencoding::encode(&encoded)
    );
    if let Some(rs) = relay_state {
        query.push_str("&RelayState=");
        query.push_str(&urlencoding::encode(rs.as_str()));
    }
    Ok(query)
}

fn append_query(destination: &str, query: &str) -> String {
    let separator = if destination.contains('?') { '&' } else { '?' };
    format!("{destination}{separator}{query}")
}

/// Compresses data using DEFLATE (raw, no zlib header).
fn deflate_compress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompresses DEFLATE data.
fn deflate_decompress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data).take(MAX_INFLATED_LEN + 1);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| SamlError::Decoding(format!("inflate: {e}")))?;
    if decompressed.len() as u64 > MAX_INFLATED_LEN {
        return Err(SamlError::Decoding("inflated message too large".into()));
    }
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::test_keys;
    use saml_core::AlgorithmPolicy;

    const XML: &str = r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol">test content here</samlp:AuthnRequest>"#;

    fn query_of(url: &str) -> &str {
        url.split_once('?').map(|(_, q)| q).unwrap()
    }

    fn signed_url() -> String {
        let rs = RelayState::new("state 123/ä").unwrap();
        HttpRedirectBinding::encode_signed(
            XML,
            SamlMessageType::Request,
            "https://idp.example.com/sso",
            Some(&rs),
            &test_keys::idp_signer(),
            &SamlContext::new(),
        )
        .unwrap()
    }

    #[test]
    fn encode_and_decode_request() {
        let rs = RelayState::new("state123").unwrap();
        let url = HttpRedirectBinding::encode_request(XML, "https://idp.example.com/sso", Some(&rs))
            .unwrap();

        assert!(url.starts_with("https://idp.example.com/sso?SAMLRequest="));
        assert!(url.contains("&RelayState=state123"));

        let decoded = HttpRedirectBinding::decode_url(&url).unwrap();
        assert_eq!(decoded.message.xml, XML);
        assert_eq!(decoded.message.message_type, SamlMessageType::Request);
        assert_eq!(decoded.message.relay_state, Some(rs));
        assert!(!decoded.is_signed());
    }

    #[test]
    fn url_with_existing_query() {
        let url = HttpRedirectBinding::encode_response(
            "<Test/>",
            "https://sp.example.com/slo?existing=param",
            None,
        )
        .unwrap();
        assert!(url.contains("?existing=param&SAMLResponse="));
    }

    #[test]
    fn signed_query_verifies() {
        let url = signed_url();
        let received = HttpRedirectBinding::decode_query(query_of(&url)).unwrap();
        assert!(received.is_signed());
        assert_eq!(received.sig_alg(), Some(SignatureAlgorithm::RsaSha256.uri()));
        received
            .verify(&test_keys::idp_verifier(), &SamlContext::new())
            .unwrap();
    }

    #[test]
    fn reencoded_relay_state_fails_verification() {
        let url = signed_url();
        let tampered = url.replace("state%20123", "state+123");
        assert_ne!(tampered, url);
        let received = HttpRedirectBinding::decode_url(&tampered).unwrap();
        assert!(matches!(
            received.verify(&test_keys::idp_verifier(), &SamlContext::new()),
            Err(SamlError::SignatureVerification(_))
        ));
    }

    #[test]
    fn signature_over_other_parameter_order_fails() {
        let url = HttpRedirectBinding::encode_request(XML, "https://idp.example.com/sso", None)
            .unwrap();
        let sig_alg = urlencoding::encode(SignatureAlgorithm::RsaSha256.uri()).into_owned();
        let signed = format!("SigAlg={sig_alg}&{}", query_of(&url));
        let signature = test_keys::idp_signer().sign(signed.as_bytes()).unwrap();
        let query = format!(
            "{signed}&Signature={}",
            urlencoding::encode(&STANDARD.encode(signature))
        );

        let received = HttpRedirectBinding::decode_query(&query).unwrap();
        assert!(matches!(
            received.verify(&test_keys::idp_verifier(), &SamlContext::new()),
            Err(SamlError::SignatureVerification(_))
        ));
    }

    #[test]
    fn arrival_order_does_not_change_signed_bytes() {
        let url = signed_url();
        let mut pairs: Vec<&str> = query_of(&url).split('&').collect();
        pairs.reverse();
        let received = HttpRedirectBinding::decode_query(&pairs.join("&")).unwrap();
        received
            .verify(&test_keys::idp_verifier(), &SamlContext::new())
            .unwrap();
    }

    #[test]
    fn unsigned_query_does_not_verify() {
        let url = HttpRedirectBinding::encode_request(XML, "https://idp.example.com/sso", None)
            .unwrap();
        let received = HttpRedirectBinding::decode_url(&url).unwrap();
        assert!(matches!(
            received.verify(&test_keys::idp_verifier(), &SamlContext::new()),
            Err(SamlError::SignatureVerification(_))
        ));
    }

    #[test]
    fn wrong_key_and_algorithm() {
        let received = HttpRedirectBinding::decode_url(&signed_url()).unwrap();
        assert!(matches!(
            received.verify(&test_keys::sp_verifier(), &SamlContext::new()),
            Err(SamlError::SignatureVerification(_))
        ));
        assert!(matches!(
            received.verify(&test_keys::ec_verifier(), &SamlContext::new()),
            Err(SamlError::AlgorithmMismatch { .. })
        ));
    }

    #[test]
    fn blacklisted_sig_alg_is_refused() {
        let received = HttpRedirectBinding::decode_url(&signed_url()).unwrap();
        let ctx = SamlContext::new()
            .with_policy(AlgorithmPolicy::from_uris([SignatureAlgorithm::RsaSha256.uri()]));
        assert!(matches!(
            received.verify(&test_keys::idp_verifier(), &ctx),
            Err(SamlError::BlacklistedAlgorithm(_))
        ));
    }

    #[test]
    fn unsupported_encoding() {
        let url = HttpRedirectBinding::encode_request(XML, "https://idp.example.com/sso", None)
            .unwrap();
        let query = format!("{}&SAMLEncoding=urn%3Aexample%3Agzip", query_of(&url));
        assert!(matches!(
            HttpRedirectBinding::decode_query(&query),
            Err(SamlError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn garbage_payload_is_a_decoding_error() {
        let query = format!("SAMLRequest={}", urlencoding::encode(&STANDARD.encode(b"not deflate")));
        assert!(matches!(
            HttpRedirectBinding::decode_query(&query),
            Err(SamlError::Decoding(_))
        ));
    }

    #[test]
    fn missing_message_parameter() {
        assert!(matches!(
            HttpRedirectBinding::decode_query("RelayState=abc"),
            Err(SamlError::MissingMessageParameter(_))
        ));
    }

    #[test]
    fn deflate_roundtrip() {
        let original = b"Test data for compression";
        let compressed = deflate_compress(original).unwrap();
        assert_eq!(deflate_decompress(&compressed).unwrap(), original);
    }
}
