//! SAML error types.
//!
//! Every failure is a tagged variant; callers and tests match on the variant,
//! never on the message text.

use saml_core::{AlgorithmError, ConfigError, CryptoError};
use thiserror::Error;

use crate::types::{status_codes, sub_status_codes};

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// A schema-level invariant of the object model was violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralViolation {
    /// A required child element is absent.
    #[error("<{parent}> is missing required <{element}>")]
    MissingElement {
        /// Parent element local name.
        parent: String,
        /// Missing child local name.
        element: String,
    },

    /// A required attribute is absent.
    #[error("<{element}> is missing required attribute {attribute}")]
    MissingAttribute {
        /// Element local name.
        element: String,
        /// Attribute name.
        attribute: String,
    },

    /// An attribute value could not be interpreted.
    #[error("<{element}> has invalid {attribute}: {value:?}")]
    InvalidAttribute {
        /// Element local name.
        element: String,
        /// Attribute name.
        attribute: String,
        /// Offending value.
        value: String,
    },

    /// Element text could not be interpreted.
    #[error("<{element}> has invalid content: {value:?}")]
    InvalidValue {
        /// Element local name.
        element: String,
        /// Offending value.
        value: String,
    },

    /// A required value is empty.
    #[error("<{element}> must not be empty")]
    EmptyValue {
        /// Element or attribute name.
        element: String,
    },

    /// A child occurs more often than the schema allows.
    #[error("<{parent}> allows at most {max} <{element}>")]
    TooMany {
        /// Parent element local name.
        parent: String,
        /// Repeated child local name.
        element: String,
        /// Allowed maximum.
        max: usize,
    },

    /// An element was found where a different one is required.
    #[error("expected {expected}, found {found}")]
    UnexpectedElement {
        /// Expected `{namespace}name`.
        expected: String,
        /// Actual `{namespace}name`.
        found: String,
    },

    /// The `Version` attribute is not `2.0`.
    #[error("unsupported SAML version {0:?}")]
    VersionMismatch(String),

    /// A condition kind that is neither built in nor registered.
    #[error("unknown condition {0}")]
    UnknownCondition(String),

    /// A statement kind that is neither built in nor registered.
    #[error("unknown statement {0}")]
    UnknownStatement(String),

    /// More than one identifier in a single identifier slot.
    #[error("<{0}> carries more than one identifier")]
    MultipleIdentifiers(String),

    /// A Subject without confirmations must carry an identifier.
    #[error("<Subject> without SubjectConfirmation requires an identifier")]
    MissingIdentifier,

    /// `AuthnContextDecl` and `AuthnContextDeclRef` are mutually exclusive.
    #[error("<AuthnContext> may not carry both AuthnContextDecl and AuthnContextDeclRef")]
    ConflictingAuthnContextDecl,

    /// `AuthnContext` carries none of ClassRef, Decl or DeclRef.
    #[error("<AuthnContext> requires AuthnContextClassRef, AuthnContextDecl or AuthnContextDeclRef")]
    EmptyAuthnContext,

    /// An eduPersonTargetedID value that is not a NameID.
    #[error("attribute {attribute} value #{index} is not an identifier")]
    NonIdentifierValue {
        /// Attribute name.
        attribute: String,
        /// Zero-based position of the offending value.
        index: usize,
    },

    /// An `IDPEntry` without `ProviderID`.
    #[error("IDPEntry #{index} is missing ProviderID")]
    MissingProviderId {
        /// Zero-based position of the entry in the IDPList.
        index: usize,
    },
}

/// A protocol or binding rule was violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// RelayState longer than 80 bytes.
    #[error("RelayState is {0} bytes, at most 80 are allowed")]
    RelayStateTooLong(usize),

    /// RelayState that is empty or whitespace only.
    #[error("RelayState must not be blank")]
    RelayStateBlank,

    /// A field that must hold an absolute URI does not.
    #[error("{field} is not an absolute URI: {value:?}")]
    NotAbsoluteUri {
        /// Field name.
        field: String,
        /// Offending value.
        value: String,
    },

    /// A message of a different kind than expected.
    #[error("expected {expected}, received {found}")]
    UnexpectedMessage {
        /// Expected message element.
        expected: String,
        /// Received message element.
        found: String,
    },

    /// A malformed SAML artifact.
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    /// The SOAP peer answered with a Fault.
    #[error("SOAP fault {code}: {message}")]
    SoapFault {
        /// `faultcode`.
        code: String,
        /// `faultstring`.
        message: String,
    },
}

/// SAML protocol errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// Object model invariant violated.
    #[error("structural violation: {0}")]
    Structural(#[from] StructuralViolation),

    /// Protocol or binding rule violated.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// Signature or reference did not validate.
    #[error("signature verification failed: {0}")]
    SignatureVerification(String),

    /// The declared algorithm differs from the one supplied by the caller.
    #[error("algorithm mismatch: expected {expected}, got {actual}")]
    AlgorithmMismatch {
        /// Algorithm URI the caller's key supports.
        expected: String,
        /// Algorithm URI declared in the message.
        actual: String,
    },

    /// The algorithm is blacklisted by the context policy.
    #[error("algorithm is blacklisted: {0}")]
    BlacklistedAlgorithm(String),

    /// The algorithm URI is not supported.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Decryption failed. Carries no detail on purpose.
    #[error("decryption failed")]
    Decryption,

    /// Several key envelopes could decrypt the payload and none is referenced.
    #[error("{0} key envelopes match and none is referenced")]
    AmbiguousKeyEnvelope(usize),

    /// Decrypted or received content of an unregistered type.
    #[error("unsupported identifier or element type: {0}")]
    UnsupportedIdentifier(String),

    /// An HTTP-Redirect `SAMLEncoding` other than DEFLATE.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// A binding payload could not be decoded.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// A binding carried no SAML message parameter.
    #[error("missing message parameter: {0}")]
    MissingMessageParameter(String),

    /// XML parsing error.
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64Decode(String),

    /// Capability failure other than decryption.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// XML signature creation failed.
    #[error("signature creation failed: {0}")]
    SignatureCreation(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Assertion or confirmation past `NotOnOrAfter`.
    #[error("assertion expired")]
    AssertionExpired,

    /// Assertion or confirmation before `NotBefore`.
    #[error("assertion not yet valid")]
    AssertionNotYetValid,

    /// The relying party is not in the audience intersection.
    #[error("audience {0} is not accepted")]
    InvalidAudience(String),
}

impl SamlError {
    /// Returns the top-level SAML status code for this error.
    #[must_use]
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Structural(StructuralViolation::VersionMismatch(_)) => {
                status_codes::VERSION_MISMATCH
            }
            Self::Structural(_)
            | Self::Protocol(_)
            | Self::SignatureVerification(_)
            | Self::AlgorithmMismatch { .. }
            | Self::BlacklistedAlgorithm(_)
            | Self::UnsupportedAlgorithm(_)
            | Self::Decryption
            | Self::AmbiguousKeyEnvelope(_)
            | Self::UnsupportedIdentifier(_)
            | Self::UnsupportedEncoding(_)
            | Self::Decoding(_)
            | Self::MissingMessageParameter(_)
            | Self::XmlParse(_)
            | Self::Base64Decode(_)
            | Self::AssertionExpired
            | Self::AssertionNotYetValid
            | Self::InvalidAudience(_) => status_codes::REQUESTER,
            Self::Crypto(_) | Self::SignatureCreation(_) | Self::Config(_) => {
                status_codes::RESPONDER
            }
        }
    }

    /// Returns a second-level status code if one applies.
    #[must_use]
    pub fn sub_status_code(&self) -> Option<&'static str> {
        match self {
            Self::UnsupportedIdentifier(_)
            | Self::UnsupportedEncoding(_)
            | Self::UnsupportedAlgorithm(_)
            | Self::BlacklistedAlgorithm(_) => Some(sub_status_codes::REQUEST_UNSUPPORTED),
            Self::SignatureVerification(_) | Self::AlgorithmMismatch { .. } => {
                Some(sub_status_codes::REQUEST_DENIED)
            }
            Self::Structural(StructuralViolation::NonIdentifierValue { .. }) => {
                Some(sub_status_codes::INVALID_ATTR_NAME_OR_VALUE)
            }
            _ => None,
        }
    }

    pub(crate) fn missing_element(parent: &str, element: &str) -> Self {
        StructuralViolation::MissingElement {
            parent: parent.to_string(),
            element: element.to_string(),
        }
        .into()
    }

    pub(crate) fn missing_attribute(element: &str, attribute: &str) -> Self {
        StructuralViolation::MissingAttribute {
            element: element.to_string(),
            attribute: attribute.to_string(),
        }
        .into()
    }

    pub(crate) fn invalid_attribute(element: &str, attribute: &str, value: &str) -> Self {
        StructuralViolation::InvalidAttribute {
            element: element.to_string(),
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
        .into()
    }

    pub(crate) fn too_many(parent: &str, element: &str, max: usize) -> Self {
        StructuralViolation::TooMany {
            parent: parent.to_string(),
            element: element.to_string(),
            max,
        }
        .into()
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64Decode(err.to_string())
    }
}

impl From<std::io::Error> for SamlError {
    fn from(err: std::io::Error) -> Self {
        Self::Decoding(err.to_string())
    }
}

impl From<AlgorithmError> for SamlError {
    fn from(err: AlgorithmError) -> Self {
        match err {
            AlgorithmError::Blacklisted(uri) => Self::BlacklistedAlgorithm(uri),
            AlgorithmError::Unknown(uri) => Self::UnsupportedAlgorithm(uri),
        }
    }
}

impl From<CryptoError> for SamlError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Decryption => Self::Decryption,
            CryptoError::UnsupportedAlgorithm(alg) => Self::UnsupportedAlgorithm(alg),
            other => Self::Crypto(other.to_string()),
        }
    }
}

impl From<ConfigError> for SamlError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
