//! Tree construction on top of the quick-xml pull parser.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{NamespaceDecl, XmlAttribute, XmlElement, XmlNode, XML_NS};
use crate::error::{SamlError, SamlResult};

/// Parses a document into its root element.
///
/// DOCTYPE declarations are refused outright; SAML never needs them and
/// they are the vehicle for entity expansion attacks.
pub fn parse(xml: &str) -> SamlResult<XmlElement> {
    let mut reader = Reader::from_str(xml);
    let mut builder = TreeBuilder::default();

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(start) => {
                let element = builder.open(&start)?;
                builder.stack.push(element);
            }
            Event::Empty(start) => {
                let element = builder.open(&start)?;
                builder.close(element)?;
            }
            Event::End(_) => {
                let element = builder
                    .stack
                    .pop()
                    .ok_or_else(|| SamlError::XmlParse("unbalanced end tag".to_string()))?;
                builder.close(element)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(xml_err)?;
                builder.text(&text)?;
            }
            Event::CData(cdata) => {
                let text = String::from_utf8(cdata.into_inner().into_owned())
                    .map_err(|e| SamlError::XmlParse(e.to_string()))?;
                builder.text(&text)?;
            }
            Event::Comment(comment) => {
                let text = String::from_utf8(comment.into_inner().into_owned())
                    .map_err(|e| SamlError::XmlParse(e.to_string()))?;
                if let Some(parent) = builder.stack.last_mut() {
                    parent.children.push(XmlNode::Comment(text));
                }
            }
            Event::DocType(_) => {
                return Err(SamlError::XmlParse("DOCTYPE is not allowed".to_string()));
            }
            Event::Decl(_) | Event::PI(_) => {}
            Event::Eof => break,
        }
    }

    if !builder.stack.is_empty() {
        return Err(SamlError::XmlParse("unexpected end of document".to_string()));
    }
    builder
        .root
        .ok_or_else(|| SamlError::XmlParse("document has no root element".to_string()))
}

fn xml_err(err: impl std::fmt::Display) -> SamlError {
    SamlError::XmlParse(err.to_string())
}

#[derive(Default)]
struct TreeBuilder {
    stack: Vec<XmlElement>,
    scopes: Vec<Vec<NamespaceDecl>>,
    root: Option<XmlElement>,
}

impl TreeBuilder {
    fn lookup(&self, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(XML_NS);
        }
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|decl| decl.prefix.as_deref() == prefix)
            .map(|decl| decl.uri.as_str())
    }

    fn open(&mut self, start: &BytesStart<'_>) -> SamlResult<XmlElement> {
        let qname = std::str::from_utf8(start.name().as_ref())
            .map_err(xml_err)?
            .to_string();

        let mut namespaces = Vec::new();
        let mut raw_attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(xml_err)?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(xml_err)?
                .to_string();
            let value = attr.unescape_value().map_err(xml_err)?.into_owned();

            if key == "xmlns" {
                namespaces.push(NamespaceDecl {
                    prefix: None,
                    uri: value,
                });
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                namespaces.push(NamespaceDecl {
                    prefix: Some(prefix.to_string()),
                    uri: value,
                });
            } else {
                raw_attributes.push((key, value));
            }
        }
        self.scopes.push(namespaces.clone());

        let (prefix, name) = split_qname(&qname);
        let namespace = match self.lookup(prefix) {
            Some("") | None if prefix.is_none() => None,
            Some(uri) => Some(uri.to_string()),
            None => {
                return Err(SamlError::XmlParse(format!(
                    "unbound namespace prefix in <{qname}>"
                )))
            }
        };

        let mut attributes = Vec::with_capacity(raw_attributes.len());
        for (key, value) in raw_attributes {
            let (attr_prefix, attr_name) = split_qname(&key);
            let attr_namespace = match attr_prefix {
                None => None,
                Some(p) => Some(
                    self.lookup(Some(p))
                        .ok_or_else(|| {
                            SamlError::XmlParse(format!("unbound namespace prefix in {key}"))
                        })?
                        .to_string(),
                ),
            };
            attributes.push(XmlAttribute {
                prefix: attr_prefix.map(str::to_string),
                name: attr_name.to_string(),
                namespace: attr_namespace,
                value,
            });
        }

        Ok(XmlElement {
            prefix: prefix.map(str::to_string),
            name: name.to_string(),
            namespace,
            namespaces,
            attributes,
            children: Vec::new(),
        })
    }

    fn close(&mut self, element: XmlElement) -> SamlResult<()> {
        self.scopes.pop();
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(XmlNode::Element(element)),
            None if self.root.is_none() => self.root = Some(element),
            None => {
                return Err(SamlError::XmlParse(
                    "document has more than one root element".to_string(),
                ))
            }
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> SamlResult<()> {
        match self.stack.last_mut() {
            Some(parent) => parent.push_text(text),
            None if text.trim().is_empty() => {}
            None => {
                return Err(SamlError::XmlParse(
                    "character data outside the root element".to_string(),
                ))
            }
        }
        Ok(())
    }
}

fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}
