//! Deterministic serializer for [`XmlElement`] trees.
//!
//! Declarations recorded on an element are written where they were made.
//! Any prefix an element or attribute uses but that is not in scope is
//! declared on the spot, so trees assembled in code serialize to
//! namespace-well-formed documents.

use super::{XmlElement, XmlNode, XML_NS};

/// Serializes an element (no XML declaration).
pub fn to_string(element: &XmlElement) -> String {
    let mut out = String::new();
    let mut scope = Scope::default();
    write_element(&mut out, element, &mut scope);
    out
}

#[derive(Default)]
struct Scope {
    frames: Vec<Vec<(Option<String>, String)>>,
}

impl Scope {
    fn lookup(&self, prefix: Option<&str>) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, uri)| uri.as_str())
    }
}

fn bound_in(
    decls: &[(Option<String>, String)],
    scope: &Scope,
    prefix: Option<&str>,
) -> Option<String> {
    decls
        .iter()
        .rev()
        .find(|(p, _)| p.as_deref() == prefix)
        .map(|(_, uri)| uri.clone())
        .or_else(|| scope.lookup(prefix).map(str::to_string))
}

fn write_element(out: &mut String, element: &XmlElement, scope: &mut Scope) {
    let mut decls: Vec<(Option<String>, String)> = Vec::new();

    for decl in &element.namespaces {
        if scope.lookup(decl.prefix.as_deref()) != Some(decl.uri.as_str()) {
            decls.push((decl.prefix.clone(), decl.uri.clone()));
        }
    }

    let prefix = element.prefix.as_deref();
    match &element.namespace {
        Some(uri) => {
            if bound_in(&decls, scope, prefix).as_deref() != Some(uri.as_str()) {
                decls.retain(|(p, _)| p.as_deref() != prefix);
                decls.push((element.prefix.clone(), uri.clone()));
            }
        }
        None => {
            if prefix.is_none()
                && bound_in(&decls, scope, None).is_some_and(|uri| !uri.is_empty())
            {
                decls.push((None, String::new()));
            }
        }
    }

    let mut attribute_names = Vec::with_capacity(element.attributes.len());
    for (index, attr) in element.attributes.iter().enumerate() {
        let qname = match &attr.namespace {
            None => attr.name.clone(),
            Some(uri) if uri == XML_NS => format!("xml:{}", attr.name),
            Some(uri) => {
                let attr_prefix = attr
                    .prefix
                    .clone()
                    .unwrap_or_else(|| format!("ns{index}"));
                if bound_in(&decls, scope, Some(&attr_prefix)).as_deref() != Some(uri.as_str()) {
                    decls.push((Some(attr_prefix.clone()), uri.clone()));
                }
                format!("{attr_prefix}:{}", attr.name)
            }
        };
        attribute_names.push(qname);
    }

    let qname = match prefix {
        Some(p) => format!("{p}:{}", element.name),
        None => element.name.clone(),
    };

    out.push('<');
    out.push_str(&qname);
    for (p, uri) in &decls {
        match p {
            Some(p) => {
                out.push_str(" xmlns:");
                out.push_str(p);
            }
            None => out.push_str(" xmlns"),
        }
        out.push_str("=\"");
        out.push_str(&escape_attr(uri));
        out.push('"');
    }
    for (name, attr) in attribute_names.iter().zip(&element.attributes) {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(&attr.value));
        out.push('"');
    }

    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');

    scope.frames.push(decls);
    for child in &element.children {
        match child {
            XmlNode::Element(el) => write_element(out, el, scope),
            XmlNode::Text(text) => out.push_str(&escape_text(text)),
            XmlNode::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
        }
    }
    scope.frames.pop();

    out.push_str("</");
    out.push_str(&qname);
    out.push('>');
}

/// Escapes character data using the C14N replacements.
pub(super) fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes an attribute value using the C14N replacements.
pub(super) fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
    out
}
