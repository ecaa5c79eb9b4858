//! HTTP-Artifact Binding implementation.
//!
//! The message itself travels over a back channel; the front channel
//! carries only a `SAMLart` parameter and an optional RelayState.

use rand::Rng;
use saml_core::Digester;

use crate::error::{SamlError, SamlResult};
use crate::types::SamlArtifact;

use super::{relay_state, RelayState};

/// HTTP-Artifact binding encoder/decoder.
pub struct HttpArtifactBinding;

impl HttpArtifactBinding {
    /// Issues a fresh artifact for a message from `entity_id`.
    ///
    /// The message handle is 20 random bytes.
    pub fn issue(
        entity_id: &str,
        endpoint_index: u16,
        digester: &dyn Digester,
    ) -> SamlResult<SamlArtifact> {
        let mut handle = [0u8; 20];
        rand::rng().fill(&mut handle);
        SamlArtifact::new(entity_id, endpoint_index, handle, digester)
    }

    /// Builds the redirect URL carrying `artifact`.
    #[must_use]
    pub fn encode(
        destination: &str,
        artifact: &SamlArtifact,
        relay_state: Option<&RelayState>,
    ) -> String {
        let separator = if destination.contains('?') { '&' } else { '?' };
        let mut url = format!(
            "{destination}{separator}SAMLart={}",
            urlencoding::encode(&artifact.encode())
        );
        if let Some(rs) = relay_state {
            url.push_str("&RelayState=");
            url.push_str(&urlencoding::encode(rs.as_str()));
        }
        url
    }

    /// Reads the artifact and RelayState from a query string or form body.
    ///
    /// A missing `SAMLart` is fatal.
    pub fn decode(query: &str) -> SamlResult<(SamlArtifact, Option<RelayState>)> {
        let mut artifact = None;
        let mut relay_state_value = None;
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                "SAMLart" => artifact = Some(value.into_owned()),
                "RelayState" => relay_state_value = Some(value.into_owned()),
                _ => {}
            }
        }
        let artifact = artifact.ok_or_else(|| SamlError::MissingMessageParameter("SAMLart".into()))?;
        Ok((
            SamlArtifact::parse(&artifact)?,
            relay_state(relay_state_value.as_deref())?,
        ))
    }
}
