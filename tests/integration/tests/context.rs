//! Configuration, algorithm policy and extension registry.

use std::sync::Arc;

use saml_core::algorithm::signature_uris;
use saml_core::{FixedClock, SamlConfig};
use saml_protocol::{
    Assertion, Condition, Conditions, ContextHolder, CustomCondition, ExtensionRegistry,
    FromXml, NameId, SamlContext, SamlError, Signable, SigningOptions, StructuralViolation, ToXml,
};

use crate::common::{TestEnv, IDP_ENTITY};

const EXT_NS: &str = "urn:example:conditions";

#[test]
fn test_context_from_toml_config() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let config = SamlConfig::from_toml_str(&format!(
        r#"
        clock_skew_seconds = 0
        signature_algorithm = "ecdsa-sha256"
        algorithm_blacklist = ["{}"]
        "#,
        signature_uris::RSA_SHA256
    ))?;
    let ctx = SamlContext::from_config(&config)?.with_clock(FixedClock::new(env.now));
    assert_eq!(ctx.clock_skew(), chrono::Duration::zero());

    // RSA-SHA256 is refused in both directions
    assert!(matches!(
        env.assertion()
            .sign(&env.idp_signer(), &SigningOptions::from_config(&config), &ctx),
        Err(SamlError::BlacklistedAlgorithm(_))
    ));
    let signed = env
        .assertion()
        .sign(&env.idp_signer(), &SigningOptions::default(), &env.ctx)?;
    assert!(matches!(
        signed.verify(&env.idp_verifier(), &ctx),
        Err(SamlError::BlacklistedAlgorithm(_))
    ));

    let ec_signed = env
        .assertion()
        .sign(&env.ec_signer(), &SigningOptions::from_config(&config), &ctx)?;
    ec_signed.verify(&env.ec_verifier(), &ctx)?;
    Ok(())
}

#[test]
fn test_registered_condition_parses_only_when_registered() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let custom = CustomCondition::new(EXT_NS, "ext", "DeviceBound");
    let assertion = Assertion::builder(NameId::entity(IDP_ENTITY), env.now)
        .conditions(Conditions::new().with_condition(Condition::Custom(custom))?)
        .build()?;
    let xml = assertion.to_xml_string();

    assert!(matches!(
        Assertion::from_xml_str(&xml, &env.ctx),
        Err(SamlError::Structural(StructuralViolation::UnknownCondition(name))) if name == "DeviceBound"
    ));

    let registry = Arc::new(ExtensionRegistry::new());
    registry.register_condition("DeviceBound", |el, _| CustomCondition::from_element(el));
    let holder = ContextHolder::new(env.ctx.clone());
    {
        let _guard = holder.scoped(env.ctx.clone().with_registry(Arc::clone(&registry)));
        let parsed = Assertion::from_xml_str(&xml, &holder.current())?;
        assert_eq!(parsed, assertion);
    }
    assert!(Assertion::from_xml_str(&xml, &holder.current()).is_err());
    Ok(())
}
