//! SAML 2.0 protocol library.
//!
//! This crate provides the SAML 2.0 object model and everything needed to put
//! it on the wire:
//!
//! - **Object model** - assertions, statements, conditions, subjects and the protocol messages
//! - **XML signature** - enveloped XML-DSig with exclusive and inclusive C14N
//! - **XML encryption** - encrypted identifiers, attributes and assertions
//! - **Bindings** - HTTP-Redirect, HTTP-POST, HTTP-Artifact and SOAP/ECP
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`xml`] - Owned XML tree, reader, writer and canonicalization
//! - [`types`] - Core SAML types and their XML mapping
//! - [`signature`] - XML signature signing and validation
//! - [`encryption`] - XML encryption envelopes
//! - [`bindings`] - Transport bindings
//! - [`context`] - Clock, algorithm policy and extension registry used by every step
//! - [`error`] - Error types for SAML operations
//!
//! Cryptography is injected through the capability traits of `saml-core`;
//! `saml-crypto` implements them on aws-lc-rs.
//!
//! # Example
//!
//! ```rust,ignore
//! use saml_protocol::bindings::{HttpRedirectBinding, SamlMessageType};
//! use saml_protocol::{AuthnRequest, MessageHeader, NameId, SamlContext, ToXml};
//!
//! let ctx = SamlContext::new();
//! let request = AuthnRequest::new(
//!     MessageHeader::now(&ctx).with_issuer(NameId::entity("https://sp.example.com"))?,
//! )
//! .with_acs_url("https://sp.example.com/acs")?;
//! let url = HttpRedirectBinding::encode_signed(
//!     &request.to_xml_string(),
//!     SamlMessageType::Request,
//!     "https://idp.example.com/sso",
//!     None,
//!     &signer,
//!     &ctx,
//! )?;
//! ```
//!
//! # SAML Specifications
//!
//! This implementation follows these specifications:
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [SAML 2.0 Profiles](https://docs.oasis-open.org/security/saml/v2.0/saml-profiles-2.0-os.pdf)
//! - [XML Signature](https://www.w3.org/TR/xmldsig-core1/)
//! - [XML Encryption](https://www.w3.org/TR/xmlenc-core1/)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
pub mod context;
pub mod encryption;
pub mod error;
pub mod signature;
pub mod types;
pub mod xml;

pub use context::{ContextGuard, ContextHolder, ExtensionRegistry, SamlContext};
pub use encryption::{Encryptable, Encrypted};
pub use error::{ProtocolViolation, SamlError, SamlResult, StructuralViolation};
pub use signature::{Signable, SigningOptions};
pub use types::*;
