//! XML Encryption envelopes.
//!
//! One generic envelope serves `EncryptedID`, `EncryptedAttribute` and
//! `EncryptedAssertion`. The plaintext element is serialized, encrypted
//! under a fresh content key, and the content key is wrapped for each
//! recipient:
//!
//! - one recipient: the `xenc:EncryptedKey` sits inline in the
//!   `EncryptedData`'s `ds:KeyInfo`;
//! - several recipients: each `xenc:EncryptedKey` is a sibling of
//!   `EncryptedData` and points back at it through a `ReferenceList`.
//!
//! Decryption picks the key envelope that references the data, or the sole
//! unreferenced one, and never guesses between several.

use std::fmt;
use std::marker::PhantomData;

use saml_core::{ContentCipher, ContentEncryptionAlgorithm, KeyTransportAlgorithm, KeyUnwrapper, KeyWrapper};

use crate::context::SamlContext;
use crate::error::{SamlError, SamlResult};
use crate::signature::{decode_base64_text, encode_base64};
use crate::types::{
    at_most_one, exactly_one, expect_element, generate_id, opt_string, required_attr, FromXml,
    ToXml, DS_NS, SAML_NS, XENC11_NS, XENC_ELEMENT_TYPE, XENC_NS,
};
use crate::xml::{self, XmlElement};

/// A value that has an encrypted form.
pub trait Encryptable: ToXml + Sized {
    /// Local name of the `saml:` wrapper element.
    const WRAPPER: &'static str;

    /// Rebuilds the value from the decrypted element.
    ///
    /// Content that is not a registered kind of `Self` is
    /// [`SamlError::UnsupportedIdentifier`].
    fn from_decrypted(element: &XmlElement, ctx: &SamlContext) -> SamlResult<Self>;
}

fn xenc(name: &str) -> XmlElement {
    XmlElement::new(XENC_NS, "xenc", name)
}

/// `CipherData` content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherPayload {
    /// Inline `CipherValue`, decoded.
    Value(Vec<u8>),
    /// `CipherReference/@URI`. Never dereferenced by this library.
    Reference(String),
}

impl CipherPayload {
    fn append_to(&self, parent: &mut XmlElement) {
        let data = match self {
            Self::Value(bytes) => xenc("CipherData")
                .with_child(xenc("CipherValue").with_text(&encode_base64(bytes))),
            Self::Reference(uri) => {
                xenc("CipherData").with_child(xenc("CipherReference").with_attr("URI", uri.as_str()))
            }
        };
        parent.push_element(data);
    }

    fn parse(parent: &XmlElement) -> SamlResult<Self> {
        let data = exactly_one(parent, XENC_NS, "CipherData")?;
        if let Some(value) = at_most_one(data, XENC_NS, "CipherValue")? {
            return Ok(Self::Value(decode_base64_text(&value.text())?));
        }
        match at_most_one(data, XENC_NS, "CipherReference")? {
            Some(reference) => Ok(Self::Reference(required_attr(reference, "URI")?.to_string())),
            None => Err(SamlError::missing_element("CipherData", "CipherValue")),
        }
    }

    fn bytes(&self) -> SamlResult<&[u8]> {
        match self {
            Self::Value(bytes) => Ok(bytes),
            Self::Reference(uri) => {
                tracing::debug!(%uri, "cipher reference cannot be resolved");
                Err(SamlError::Decryption)
            }
        }
    }
}

/// `xenc:EncryptedKey`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherKeyEnvelope {
    /// `Id`.
    pub id: Option<String>,
    /// `EncryptionMethod/@Algorithm`.
    pub algorithm: String,
    /// `EncryptionMethod/ds:DigestMethod/@Algorithm`.
    pub digest_method: Option<String>,
    /// `EncryptionMethod/xenc11:MGF/@Algorithm`.
    pub mgf: Option<String>,
    /// `Recipient`.
    pub recipient: Option<String>,
    /// `CarriedKeyName`.
    pub carried_key_name: Option<String>,
    /// `ReferenceList/DataReference/@URI` values without the leading `#`.
    pub references: Vec<String>,
    /// The wrapped key.
    pub payload: CipherPayload,
}

impl CipherKeyEnvelope {
    fn references_data(&self, data_id: Option<&str>) -> bool {
        data_id.is_some_and(|id| self.references.iter().any(|r| r == id))
    }

    fn addressed_to(&self, recipient: Option<&str>) -> bool {
        match (recipient, &self.recipient) {
            (Some(wanted), Some(declared)) => wanted == declared,
            _ => true,
        }
    }

    fn parse(element: &XmlElement) -> SamlResult<Self> {
        expect_element(element, XENC_NS, "EncryptedKey")?;
        let method = exactly_one(element, XENC_NS, "EncryptionMethod")?;
        let references = match at_most_one(element, XENC_NS, "ReferenceList")? {
            Some(list) => list
                .children_named(XENC_NS, "DataReference")
                .map(|r| required_attr(r, "URI").map(|uri| uri.trim_start_matches('#').to_string()))
                .collect::<SamlResult<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok(Self {
            id: opt_string(element, "Id"),
            algorithm: required_attr(method, "Algorithm")?.to_string(),
            digest_method: method
                .first_child(DS_NS, "DigestMethod")
                .and_then(|d| opt_string(d, "Algorithm")),
            mgf: method
                .first_child(XENC11_NS, "MGF")
                .and_then(|m| opt_string(m, "Algorithm")),
            recipient: opt_string(element, "Recipient"),
            carried_key_name: at_most_one(element, XENC_NS, "CarriedKeyName")?.map(XmlElement::text),
            references,
            payload: CipherPayload::parse(element)?,
        })
    }
}

impl ToXml for CipherKeyEnvelope {
    fn to_element(&self) -> XmlElement {
        let mut el = xenc("EncryptedKey");
        el.set_opt_attr("Id", self.id.as_deref());
        el.set_opt_attr("Recipient", self.recipient.as_deref());

        let mut method = xenc("EncryptionMethod").with_attr("Algorithm", self.algorithm.as_str());
        if let Some(digest) = &self.digest_method {
            method.push_element(XmlElement::new(DS_NS, "ds", "DigestMethod").with_attr("Algorithm", digest.as_str()));
        }
        if let Some(mgf) = &self.mgf {
            method.push_element(XmlElement::new(XENC11_NS, "xenc11", "MGF").with_attr("Algorithm", mgf.as_str()));
        }
        el.push_element(method);
        self.payload.append_to(&mut el);

        if !self.references.is_empty() {
            let mut list = xenc("ReferenceList");
            for reference in &self.references {
                list.push_element(xenc("DataReference").with_attr("URI", format!("#{reference}")));
            }
            el.push_element(list);
        }
        if let Some(name) = &self.carried_key_name {
            el.push_element(xenc("CarriedKeyName").with_text(name));
        }
        el
    }
}

/// `xenc:EncryptedData`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherEnvelope {
    /// `Id`.
    pub id: Option<String>,
    /// `Type`.
    pub type_uri: Option<String>,
    /// `MimeType`.
    pub mime_type: Option<String>,
    /// `Encoding`.
    pub encoding: Option<String>,
    /// `EncryptionMethod/@Algorithm`.
    pub algorithm: String,
    /// `ds:KeyInfo/ds:KeyName`.
    pub key_name: Option<String>,
    /// Key envelopes inside `ds:KeyInfo`.
    pub inline_keys: Vec<CipherKeyEnvelope>,
    /// The encrypted content.
    pub payload: CipherPayload,
}

impl CipherEnvelope {
    fn parse(element: &XmlElement) -> SamlResult<Self> {
        expect_element(element, XENC_NS, "EncryptedData")?;
        let method = exactly_one(element, XENC_NS, "EncryptionMethod")?;
        let (key_name, inline_keys) = match at_most_one(element, DS_NS, "KeyInfo")? {
            Some(info) => (
                info.first_child(DS_NS, "KeyName").map(XmlElement::text),
                info.children_named(XENC_NS, "EncryptedKey")
                    .map(CipherKeyEnvelope::parse)
                    .collect::<SamlResult<Vec<_>>>()?,
            ),
            None => (None, Vec::new()),
        };
        Ok(Self {
            id: opt_string(element, "Id"),
            type_uri: opt_string(element, "Type"),
            mime_type: opt_string(element, "MimeType"),
            encoding: opt_string(element, "Encoding"),
            algorithm: required_attr(method, "Algorithm")?.to_string(),
            key_name,
            inline_keys,
            payload: CipherPayload::parse(element)?,
        })
    }
}

impl ToXml for CipherEnvelope {
    fn to_element(&self) -> XmlElement {
        let mut el = xenc("EncryptedData");
        el.set_opt_attr("Id", self.id.as_deref());
        el.set_opt_attr("Type", self.type_uri.as_deref());
        el.set_opt_attr("MimeType", self.mime_type.as_deref());
        el.set_opt_attr("Encoding", self.encoding.as_deref());
        el.push_element(xenc("EncryptionMethod").with_attr("Algorithm", self.algorithm.as_str()));

        if self.key_name.is_some() || !self.inline_keys.is_empty() {
            let mut info = XmlElement::new(DS_NS, "ds", "KeyInfo");
            if let Some(name) = &self.key_name {
                info.push_element(XmlElement::new(DS_NS, "ds", "KeyName").with_text(name));
            }
            for key in &self.inline_keys {
                key.append_to(&mut info);
            }
            el.push_element(info);
        }
        self.payload.append_to(&mut el);
        el
    }
}

/// An encrypted `T`: `saml:EncryptedID`, `saml:EncryptedAttribute` or
/// `saml:EncryptedAssertion`.
pub struct Encrypted<T> {
    data: CipherEnvelope,
    keys: Vec<CipherKeyEnvelope>,
    marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Encrypted<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            keys: self.keys.clone(),
            marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Encrypted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encrypted")
            .field("data", &self.data)
            .field("keys", &self.keys)
            .finish()
    }
}

impl<T> PartialEq for Encrypted<T> {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data && self.keys == other.keys
    }
}

impl<T> Eq for Encrypted<T> {}

impl<T: Encryptable> Encrypted<T> {
    /// Encrypts `value` for one or more recipients.
    pub fn encrypt(
        value: &T,
        content_algorithm: ContentEncryptionAlgorithm,
        cipher: &dyn ContentCipher,
        recipients: &[&dyn KeyWrapper],
        ctx: &SamlContext,
    ) -> SamlResult<Self> {
        if recipients.is_empty() {
            return Err(SamlError::Crypto("no recipient to encrypt for".into()));
        }
        ctx.policy().ensure_allowed(content_algorithm.uri())?;

        let plaintext = value.to_xml_string();
        let key = cipher.generate_key(content_algorithm)?;
        let ciphertext = cipher.encrypt(content_algorithm, &key, plaintext.as_bytes())?;
        let data_id = generate_id();

        let mut envelopes = Vec::with_capacity(recipients.len());
        for wrapper in recipients {
            let transport = wrapper.algorithm();
            ctx.policy().ensure_allowed(transport.uri())?;
            envelopes.push(CipherKeyEnvelope {
                id: Some(generate_id()),
                algorithm: transport.uri().to_string(),
                digest_method: transport.digest().map(|d| d.uri().to_string()),
                mgf: transport.mgf_uri().map(str::to_string),
                recipient: wrapper.recipient().map(str::to_string),
                carried_key_name: None,
                references: Vec::new(),
                payload: CipherPayload::Value(wrapper.wrap_key(&key)?),
            });
        }

        let (inline_keys, keys) = if envelopes.len() == 1 {
            (envelopes, Vec::new())
        } else {
            for envelope in &mut envelopes {
                envelope.references.push(data_id.clone());
            }
            (Vec::new(), envelopes)
        };

        tracing::debug!(
            wrapper = T::WRAPPER,
            algorithm = content_algorithm.uri(),
            recipients = recipients.len(),
            "encrypted element"
        );
        Ok(Self {
            data: CipherEnvelope {
                id: Some(data_id),
                type_uri: Some(XENC_ELEMENT_TYPE.to_string()),
                mime_type: None,
                encoding: None,
                algorithm: content_algorithm.uri().to_string(),
                key_name: None,
                inline_keys,
                payload: CipherPayload::Value(ciphertext),
            },
            keys,
            marker: PhantomData,
        })
    }

    /// Encrypts `value` for a single recipient.
    pub fn encrypt_for(
        value: &T,
        content_algorithm: ContentEncryptionAlgorithm,
        cipher: &dyn ContentCipher,
        recipient: &dyn KeyWrapper,
        ctx: &SamlContext,
    ) -> SamlResult<Self> {
        Self::encrypt(value, content_algorithm, cipher, &[recipient], ctx)
    }

    /// Decrypts with the recipient's private key.
    ///
    /// `key_transport` is the algorithm the caller expects; a key envelope
    /// declaring another is [`SamlError::AlgorithmMismatch`].
    pub fn decrypt(
        &self,
        key_transport: KeyTransportAlgorithm,
        unwrapper: &dyn KeyUnwrapper,
        cipher: &dyn ContentCipher,
        ctx: &SamlContext,
    ) -> SamlResult<T> {
        if unwrapper.algorithm() != key_transport {
            return Err(SamlError::AlgorithmMismatch {
                expected: key_transport.uri().to_string(),
                actual: unwrapper.algorithm().uri().to_string(),
            });
        }
        ctx.policy().ensure_allowed(&self.data.algorithm)?;
        let content_algorithm = ContentEncryptionAlgorithm::from_uri(&self.data.algorithm)
            .ok_or_else(|| SamlError::UnsupportedAlgorithm(self.data.algorithm.clone()))?;
        let ciphertext = self.data.payload.bytes()?;

        let mut last_error = SamlError::Decryption;
        for envelope in self.candidate_keys(unwrapper.recipient())? {
            ctx.policy().ensure_allowed(&envelope.algorithm)?;
            let declared = KeyTransportAlgorithm::from_declaration(
                &envelope.algorithm,
                envelope.digest_method.as_deref(),
                envelope.mgf.as_deref(),
            )
            .ok_or_else(|| SamlError::UnsupportedAlgorithm(envelope.algorithm.clone()))?;
            if declared != key_transport {
                return Err(SamlError::AlgorithmMismatch {
                    expected: key_transport.uri().to_string(),
                    actual: envelope.algorithm.clone(),
                });
            }

            let key = match unwrapper.unwrap_key(envelope.payload.bytes()?) {
                Ok(key) if key.len() == content_algorithm.key_len() => key,
                Ok(_) => {
                    tracing::debug!(key = ?envelope.id, "unwrapped key has the wrong length");
                    last_error = SamlError::Decryption;
                    continue;
                }
                Err(err) => {
                    tracing::debug!(key = ?envelope.id, "key envelope did not unwrap");
                    last_error = err.into();
                    continue;
                }
            };

            let plaintext = cipher.decrypt(content_algorithm, &key, ciphertext)?;
            let text = String::from_utf8(plaintext).map_err(|_| SamlError::Decryption)?;
            let element = xml::parse(&text)?;
            return T::from_decrypted(&element, ctx);
        }
        Err(last_error)
    }

    /// Key envelopes to try, in order.
    fn candidate_keys(&self, recipient: Option<&str>) -> SamlResult<Vec<&CipherKeyEnvelope>> {
        let data_id = self.data.id.as_deref();
        let referencing: Vec<_> = self
            .keys
            .iter()
            .filter(|k| k.references_data(data_id) && k.addressed_to(recipient))
            .collect();
        if !referencing.is_empty() {
            tracing::debug!(count = referencing.len(), "using referencing key envelopes");
            return Ok(referencing);
        }

        let unreferenced: Vec<_> = self
            .data
            .inline_keys
            .iter()
            .chain(self.keys.iter().filter(|k| k.references.is_empty()))
            .filter(|k| k.addressed_to(recipient))
            .collect();
        match unreferenced.len() {
            0 => Err(SamlError::missing_element(T::WRAPPER, "EncryptedKey")),
            1 => Ok(unreferenced),
            n => {
                tracing::warn!(candidates = n, "ambiguous key envelopes");
                Err(SamlError::AmbiguousKeyEnvelope(n))
            }
        }
    }
}

impl<T> Encrypted<T> {
    /// Assembles an envelope from parsed parts.
    #[must_use]
    pub fn from_parts(data: CipherEnvelope, keys: Vec<CipherKeyEnvelope>) -> Self {
        Self {
            data,
            keys,
            marker: PhantomData,
        }
    }

    /// The `EncryptedData`.
    #[must_use]
    pub fn cipher_envelope(&self) -> &CipherEnvelope {
        &self.data
    }

    /// Detached `EncryptedKey` siblings.
    #[must_use]
    pub fn key_envelopes(&self) -> &[CipherKeyEnvelope] {
        &self.keys
    }
}

impl<T: Encryptable> ToXml for Encrypted<T> {
    fn to_element(&self) -> XmlElement {
        let mut el = XmlElement::new(SAML_NS, "saml", T::WRAPPER);
        self.data.append_to(&mut el);
        for key in &self.keys {
            key.append_to(&mut el);
        }
        el
    }
}

impl<T: Encryptable> FromXml for Encrypted<T> {
    fn from_xml(element: &XmlElement, _ctx: &SamlContext) -> SamlResult<Self> {
        expect_element(element, SAML_NS, T::WRAPPER)?;
        let data = CipherEnvelope::parse(exactly_one(element, XENC_NS, "EncryptedData")?)?;
        let keys = element
            .children_named(XENC_NS, "EncryptedKey")
            .map(CipherKeyEnvelope::parse)
            .collect::<SamlResult<Vec<_>>>()?;
        Ok(Self::from_parts(data, keys))
    }
}
