//! SAML 2.0 namespaces, URIs and URI-valued enumerations.

/// SAML 2.0 assertion namespace.
pub const SAML_NS: &str = "urn:oasis:names:tc:SAML:2.0:assertion";
/// SAML 2.0 protocol namespace.
pub const SAMLP_NS: &str = "urn:oasis:names:tc:SAML:2.0:protocol";
/// XML Digital Signature namespace.
pub const DS_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
/// XML Encryption namespace.
pub const XENC_NS: &str = "http://www.w3.org/2001/04/xmlenc#";
/// XML Encryption 1.1 namespace.
pub const XENC11_NS: &str = "http://www.w3.org/2009/xmlenc11#";
/// Exclusive C14N namespace, home of `InclusiveNamespaces`.
pub const EC_NS: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
/// XML Schema instance namespace.
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
/// XML Schema namespace.
pub const XS_NS: &str = "http://www.w3.org/2001/XMLSchema";
/// SOAP 1.1 envelope namespace.
pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
/// Liberty PAOS namespace.
pub const PAOS_NS: &str = "urn:liberty:paos:2003-08";
/// SAML 2.0 ECP profile namespace.
pub const ECP_NS: &str = "urn:oasis:names:tc:SAML:2.0:profiles:SSO:ecp";

/// `Type` of an `EncryptedData` that replaces a whole element.
pub const XENC_ELEMENT_TYPE: &str = "http://www.w3.org/2001/04/xmlenc#Element";

/// The only SAML version this library speaks.
pub const SAML_VERSION: &str = "2.0";

/// eduPersonTargetedID attribute names.
pub mod epti {
    /// URI form of the attribute name.
    pub const URN_OID: &str = "urn:oid:1.3.6.1.4.1.5923.1.1.1.10";
    /// Basic (friendly) form of the attribute name.
    pub const NAME: &str = "eduPersonTargetedID";
}

/// Generates a closed URI enumeration with `uri()` and `from_uri()`.
macro_rules! uri_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $uri:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Returns the URI for this value.
            #[must_use]
            pub const fn uri(&self) -> &'static str {
                match self {
                    $( Self::$variant => $uri, )+
                }
            }

            /// Parses a value from its URI.
            #[must_use]
            pub fn from_uri(uri: &str) -> Option<Self> {
                match uri {
                    $( $uri => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }
    };
}

uri_enum! {
    /// SAML protocol bindings.
    SamlBinding {
        /// HTTP POST binding.
        HttpPost => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST",
        /// HTTP Redirect binding.
        HttpRedirect => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect",
        /// HTTP Artifact binding.
        HttpArtifact => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Artifact",
        /// SOAP binding.
        Soap => "urn:oasis:names:tc:SAML:2.0:bindings:SOAP",
        /// Reverse SOAP (PAOS) binding used by ECP.
        Paos => "urn:oasis:names:tc:SAML:2.0:bindings:PAOS",
    }
}

uri_enum! {
    /// NameID formats.
    NameIdFormat {
        /// Unspecified.
        Unspecified => "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified",
        /// Email address.
        Email => "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress",
        /// X.509 subject name.
        X509SubjectName => "urn:oasis:names:tc:SAML:1.1:nameid-format:X509SubjectName",
        /// Windows domain qualified name.
        WindowsDomainQualifiedName => "urn:oasis:names:tc:SAML:1.1:nameid-format:WindowsDomainQualifiedName",
        /// Kerberos principal name.
        Kerberos => "urn:oasis:names:tc:SAML:2.0:nameid-format:kerberos",
        /// Entity identifier.
        Entity => "urn:oasis:names:tc:SAML:2.0:nameid-format:entity",
        /// Persistent pseudonym.
        Persistent => "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent",
        /// Transient identifier.
        Transient => "urn:oasis:names:tc:SAML:2.0:nameid-format:transient",
        /// Request for an encrypted identifier.
        Encrypted => "urn:oasis:names:tc:SAML:2.0:nameid-format:encrypted",
    }
}

impl Default for NameIdFormat {
    fn default() -> Self {
        Self::Unspecified
    }
}

uri_enum! {
    /// Attribute `NameFormat` values.
    AttributeNameFormat {
        /// Unspecified (the default when absent).
        Unspecified => "urn:oasis:names:tc:SAML:2.0:attrname-format:unspecified",
        /// URI reference.
        Uri => "urn:oasis:names:tc:SAML:2.0:attrname-format:uri",
        /// Basic (simple string) name.
        Basic => "urn:oasis:names:tc:SAML:2.0:attrname-format:basic",
    }
}

impl Default for AttributeNameFormat {
    fn default() -> Self {
        Self::Unspecified
    }
}

uri_enum! {
    /// Authentication context classes.
    AuthnContextClass {
        /// Unspecified.
        Unspecified => "urn:oasis:names:tc:SAML:2.0:ac:classes:unspecified",
        /// Password.
        Password => "urn:oasis:names:tc:SAML:2.0:ac:classes:Password",
        /// Password over a protected transport.
        PasswordProtectedTransport => "urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport",
        /// X.509 certificate.
        X509 => "urn:oasis:names:tc:SAML:2.0:ac:classes:X509",
        /// TLS client certificate.
        TlsClient => "urn:oasis:names:tc:SAML:2.0:ac:classes:TLSClient",
        /// Kerberos.
        Kerberos => "urn:oasis:names:tc:SAML:2.0:ac:classes:Kerberos",
        /// Previous session.
        PreviousSession => "urn:oasis:names:tc:SAML:2.0:ac:classes:PreviousSession",
    }
}

uri_enum! {
    /// SubjectConfirmation methods.
    ConfirmationMethod {
        /// Bearer.
        Bearer => "urn:oasis:names:tc:SAML:2.0:cm:bearer",
        /// Holder of key.
        HolderOfKey => "urn:oasis:names:tc:SAML:2.0:cm:holder-of-key",
        /// Sender vouches.
        SenderVouches => "urn:oasis:names:tc:SAML:2.0:cm:sender-vouches",
    }
}

uri_enum! {
    /// `Consent` attribute values.
    Consent {
        /// Unspecified.
        Unspecified => "urn:oasis:names:tc:SAML:2.0:consent:unspecified",
        /// Obtained.
        Obtained => "urn:oasis:names:tc:SAML:2.0:consent:obtained",
        /// Obtained prior to the message.
        Prior => "urn:oasis:names:tc:SAML:2.0:consent:prior",
        /// Implicitly obtained.
        Implicit => "urn:oasis:names:tc:SAML:2.0:consent:current-implicit",
        /// Explicitly obtained.
        Explicit => "urn:oasis:names:tc:SAML:2.0:consent:current-explicit",
        /// Not obtained.
        Unavailable => "urn:oasis:names:tc:SAML:2.0:consent:unavailable",
        /// Not applicable.
        Inapplicable => "urn:oasis:names:tc:SAML:2.0:consent:inapplicable",
    }
}

uri_enum! {
    /// LogoutRequest `Reason` values.
    LogoutReason {
        /// The principal asked to log out.
        User => "urn:oasis:names:tc:SAML:2.0:logout:user",
        /// An administrator terminated the session.
        Admin => "urn:oasis:names:tc:SAML:2.0:logout:admin",
    }
}

/// Top-level status codes.
pub mod status_codes {
    /// Success.
    pub const SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";
    /// The request could not be performed due to an error on the requester's part.
    pub const REQUESTER: &str = "urn:oasis:names:tc:SAML:2.0:status:Requester";
    /// The request could not be performed due to an error on the responder's part.
    pub const RESPONDER: &str = "urn:oasis:names:tc:SAML:2.0:status:Responder";
    /// The SAML version of the request is not supported.
    pub const VERSION_MISMATCH: &str = "urn:oasis:names:tc:SAML:2.0:status:VersionMismatch";
}

/// Second-level status codes.
pub mod sub_status_codes {
    /// Authentication failed.
    pub const AUTHN_FAILED: &str = "urn:oasis:names:tc:SAML:2.0:status:AuthnFailed";
    /// Invalid attribute name or value.
    pub const INVALID_ATTR_NAME_OR_VALUE: &str =
        "urn:oasis:names:tc:SAML:2.0:status:InvalidAttrNameOrValue";
    /// NameIDPolicy cannot be satisfied.
    pub const INVALID_NAMEID_POLICY: &str =
        "urn:oasis:names:tc:SAML:2.0:status:InvalidNameIDPolicy";
    /// Requested authentication context cannot be satisfied.
    pub const NO_AUTHN_CONTEXT: &str = "urn:oasis:names:tc:SAML:2.0:status:NoAuthnContext";
    /// Passive authentication is not possible.
    pub const NO_PASSIVE: &str = "urn:oasis:names:tc:SAML:2.0:status:NoPassive";
    /// Only part of the logout succeeded.
    pub const PARTIAL_LOGOUT: &str = "urn:oasis:names:tc:SAML:2.0:status:PartialLogout";
    /// The request was denied.
    pub const REQUEST_DENIED: &str = "urn:oasis:names:tc:SAML:2.0:status:RequestDenied";
    /// The request is not supported.
    pub const REQUEST_UNSUPPORTED: &str =
        "urn:oasis:names:tc:SAML:2.0:status:RequestUnsupported";
    /// The principal is unknown.
    pub const UNKNOWN_PRINCIPAL: &str = "urn:oasis:names:tc:SAML:2.0:status:UnknownPrincipal";
    /// The binding is not supported.
    pub const UNSUPPORTED_BINDING: &str =
        "urn:oasis:names:tc:SAML:2.0:status:UnsupportedBinding";
}
