//! XML encryption across identifiers, attributes and assertions.

use saml_core::{AlgorithmPolicy, ContentEncryptionAlgorithm, KeyTransportAlgorithm, KeyWrapper};
use saml_crypto::AesGcmCipher;
use saml_protocol::{
    Attribute, EncryptedAssertion, EncryptedAttribute, EncryptedId, FromXml, Identifier, NameId,
    SamlError, ToXml,
};

use crate::common::TestEnv;

const TRANSPORTS: [KeyTransportAlgorithm; 2] = [
    KeyTransportAlgorithm::RsaOaepMgf1p,
    KeyTransportAlgorithm::RsaOaepSha256,
];

const CONTENT: [ContentEncryptionAlgorithm; 2] = [
    ContentEncryptionAlgorithm::Aes128Gcm,
    ContentEncryptionAlgorithm::Aes256Gcm,
];

#[test]
fn test_name_id_roundtrip_across_algorithms() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let identifier: Identifier = NameId::persistent("f3a1c9")
        .with_sp_name_qualifier(crate::common::SP_ENTITY)
        .into();

    for transport in TRANSPORTS {
        for content in CONTENT {
            let encrypted = EncryptedId::encrypt_for(
                &identifier,
                content,
                &AesGcmCipher,
                &env.sp_wrapper(transport),
                &env.ctx,
            )?;
            let received = EncryptedId::from_xml_str(&encrypted.to_xml_string(), &env.ctx)?;
            let decrypted =
                received.decrypt(transport, &env.sp_unwrapper(transport), &AesGcmCipher, &env.ctx)?;
            assert_eq!(decrypted, identifier, "{transport:?} / {content:?}");
        }
    }
    Ok(())
}

#[test]
fn test_attribute_roundtrip_across_algorithms() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let attribute = Attribute::strings("memberOf", ["staff", "admins"])?.with_friendly_name("groups");

    for transport in TRANSPORTS {
        for content in CONTENT {
            let encrypted = EncryptedAttribute::encrypt_for(
                &attribute,
                content,
                &AesGcmCipher,
                &env.sp_wrapper(transport),
                &env.ctx,
            )?;
            let received = EncryptedAttribute::from_xml_str(&encrypted.to_xml_string(), &env.ctx)?;
            let decrypted =
                received.decrypt(transport, &env.sp_unwrapper(transport), &AesGcmCipher, &env.ctx)?;
            assert_eq!(decrypted, attribute, "{transport:?} / {content:?}");
        }
    }
    Ok(())
}

#[test]
fn test_assertion_for_several_recipients() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let transport = KeyTransportAlgorithm::RsaOaepSha256;
    let assertion = env.assertion();
    let sp = env.sp_wrapper(transport);
    let idp = env.idp_wrapper(transport);
    let recipients: [&dyn KeyWrapper; 2] = [&sp, &idp];

    let encrypted = EncryptedAssertion::encrypt(
        &assertion,
        ContentEncryptionAlgorithm::Aes128Gcm,
        &AesGcmCipher,
        &recipients,
        &env.ctx,
    )?;
    let received = EncryptedAssertion::from_xml_str(&encrypted.to_xml_string(), &env.ctx)?;

    let by_sp = received.decrypt(transport, &env.sp_unwrapper(transport), &AesGcmCipher, &env.ctx)?;
    let by_idp = received.decrypt(transport, &env.idp_unwrapper(transport), &AesGcmCipher, &env.ctx)?;
    assert_eq!(by_sp, assertion);
    assert_eq!(by_idp, assertion);
    Ok(())
}

#[test]
fn test_wrong_private_key_fails() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let transport = KeyTransportAlgorithm::RsaOaepMgf1p;
    let encrypted = EncryptedAssertion::encrypt_for(
        &env.assertion(),
        ContentEncryptionAlgorithm::Aes256Gcm,
        &AesGcmCipher,
        &env.sp_wrapper(transport),
        &env.ctx,
    )?;
    let result = encrypted.decrypt(transport, &env.idp_unwrapper(transport), &AesGcmCipher, &env.ctx);
    assert!(matches!(result, Err(SamlError::Decryption)), "{result:?}");
    Ok(())
}

#[test]
fn test_key_transport_mismatch() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let encrypted = EncryptedAssertion::encrypt_for(
        &env.assertion(),
        ContentEncryptionAlgorithm::Aes256Gcm,
        &AesGcmCipher,
        &env.sp_wrapper(KeyTransportAlgorithm::RsaOaepMgf1p),
        &env.ctx,
    )?;
    let result = encrypted.decrypt(
        KeyTransportAlgorithm::RsaOaepSha256,
        &env.sp_unwrapper(KeyTransportAlgorithm::RsaOaepSha256),
        &AesGcmCipher,
        &env.ctx,
    );
    assert!(matches!(result, Err(SamlError::AlgorithmMismatch { .. })));
    Ok(())
}

#[test]
fn test_blacklisted_content_algorithm_is_refused() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let ctx = env
        .ctx
        .clone()
        .with_policy(AlgorithmPolicy::default().deny(ContentEncryptionAlgorithm::Aes128Gcm.uri()));
    let result = EncryptedAssertion::encrypt_for(
        &env.assertion(),
        ContentEncryptionAlgorithm::Aes128Gcm,
        &AesGcmCipher,
        &env.sp_wrapper(KeyTransportAlgorithm::RsaOaepMgf1p),
        &ctx,
    );
    assert!(matches!(result, Err(SamlError::BlacklistedAlgorithm(_))));
    Ok(())
}
