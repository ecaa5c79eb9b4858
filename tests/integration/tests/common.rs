//! Common test utilities and fixtures.

use chrono::{DateTime, Duration, TimeZone, Utc};
use saml_core::{FixedClock, KeyTransportAlgorithm, SignatureAlgorithm};
use saml_crypto::{CertificateVerifier, EcdsaSigner, RsaKeyUnwrapper, RsaKeyWrapper, RsaSigner};
use saml_protocol::{
    Assertion, AuthnContext, AuthnStatement, Conditions, MessageHeader, NameId, SamlContext,
    Subject, SubjectConfirmation, SubjectConfirmationData,
};

pub const IDP_ENTITY: &str = "https://idp.example.com";
pub const SP_ENTITY: &str = "https://sp.example.com";
pub const SP_ACS: &str = "https://sp.example.com/acs";

const IDP_KEY: &str = include_str!("../../../fixtures/idp-key.pem");
const IDP_CERT: &str = include_str!("../../../fixtures/idp-cert.pem");
const SP_KEY: &str = include_str!("../../../fixtures/sp-key.pem");
const SP_CERT: &str = include_str!("../../../fixtures/sp-cert.pem");
const EC_KEY: &str = include_str!("../../../fixtures/ec-key.pem");
const EC_CERT: &str = include_str!("../../../fixtures/ec-cert.pem");

/// Test environment: a context frozen at a known instant plus the fixture keys.
pub struct TestEnv {
    pub ctx: SamlContext,
    pub now: DateTime<Utc>,
}

impl TestEnv {
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("saml_protocol=debug,saml_crypto=debug")
            .with_test_writer()
            .try_init();

        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        Self {
            ctx: SamlContext::new().with_clock(FixedClock::new(now)),
            now,
        }
    }

    pub fn idp_signer(&self) -> RsaSigner {
        RsaSigner::from_pem(IDP_KEY, SignatureAlgorithm::RsaSha256).unwrap()
    }

    pub fn idp_verifier(&self) -> CertificateVerifier {
        CertificateVerifier::from_certificate_pem(IDP_CERT, SignatureAlgorithm::RsaSha256).unwrap()
    }

    pub fn sp_signer(&self) -> RsaSigner {
        RsaSigner::from_pem(SP_KEY, SignatureAlgorithm::RsaSha256).unwrap()
    }

    pub fn sp_verifier(&self) -> CertificateVerifier {
        CertificateVerifier::from_certificate_pem(SP_CERT, SignatureAlgorithm::RsaSha256).unwrap()
    }

    pub fn ec_signer(&self) -> EcdsaSigner {
        EcdsaSigner::from_pem(EC_KEY, SignatureAlgorithm::EcdsaSha256).unwrap()
    }

    pub fn ec_verifier(&self) -> CertificateVerifier {
        CertificateVerifier::from_certificate_pem(EC_CERT, SignatureAlgorithm::EcdsaSha256).unwrap()
    }

    pub fn sp_wrapper(&self, algorithm: KeyTransportAlgorithm) -> RsaKeyWrapper {
        RsaKeyWrapper::from_certificate_pem(SP_CERT, algorithm).unwrap()
    }

    pub fn sp_unwrapper(&self, algorithm: KeyTransportAlgorithm) -> RsaKeyUnwrapper {
        RsaKeyUnwrapper::from_pem(SP_KEY, algorithm).unwrap()
    }

    pub fn idp_wrapper(&self, algorithm: KeyTransportAlgorithm) -> RsaKeyWrapper {
        RsaKeyWrapper::from_certificate_pem(IDP_CERT, algorithm).unwrap()
    }

    pub fn idp_unwrapper(&self, algorithm: KeyTransportAlgorithm) -> RsaKeyUnwrapper {
        RsaKeyUnwrapper::from_pem(IDP_KEY, algorithm).unwrap()
    }

    /// A message header from `issuer` at the frozen instant.
    pub fn header(&self, issuer: &str) -> MessageHeader {
        MessageHeader::new(self.now)
            .with_issuer(NameId::entity(issuer))
            .unwrap()
    }

    /// A bearer assertion for `alice@example.com`, valid for five minutes.
    pub fn assertion(&self) -> Assertion {
        let expiry = self.now + Duration::minutes(5);
        Assertion::builder(NameId::entity(IDP_ENTITY), self.now)
            .subject(
                Subject::new(NameId::email("alice@example.com")).with_confirmation(
                    SubjectConfirmation::bearer(SubjectConfirmationData::bearer(SP_ACS, expiry)),
                ),
            )
            .conditions(
                Conditions::with_validity(self.now, expiry).with_audience_restriction([SP_ENTITY]),
            )
            .statement(
                AuthnStatement::new(self.now, AuthnContext::from_class_ref("urn:test:password"))
                    .with_session_index("_session1"),
            )
            .build()
            .unwrap()
    }
}
