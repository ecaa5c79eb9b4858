//! Canonical XML 1.0 and Exclusive Canonical XML 1.0 over [`XmlElement`].
//!
//! Only element subtrees are canonicalized (the document-subset case used by
//! enveloped signatures). Comments are dropped regardless of the requested
//! variant, so text split by a comment canonicalizes exactly like the joined
//! text.

use std::collections::BTreeMap;

use saml_core::CanonicalizationAlgorithm;

use super::writer::{escape_attr, escape_text};
use super::{NamespaceDecl, XmlElement, XmlNode, XML_NS};

type Bindings = BTreeMap<String, String>;

/// Canonicalizes `element` as an apex with no inherited namespaces.
pub fn canonicalize(element: &XmlElement, algorithm: CanonicalizationAlgorithm) -> String {
    canonicalize_with_context(element, algorithm, &[])
}

/// Canonicalizes `element` given the declarations in scope from its ancestors.
///
/// Inclusive C14N renders every inherited binding on the apex; exclusive
/// C14N ignores them unless visibly utilized.
pub fn canonicalize_with_context(
    element: &XmlElement,
    algorithm: CanonicalizationAlgorithm,
    inherited: &[NamespaceDecl],
) -> String {
    canonicalize_with_prefixes(element, algorithm, inherited, &[])
}

/// Like [`canonicalize_with_context`], honouring an exclusive C14N
/// `InclusiveNamespaces PrefixList`.
///
/// Listed prefixes (`#default` for the default namespace) are rendered the
/// way inclusive C14N renders them. Inclusive C14N ignores the list.
pub fn canonicalize_with_prefixes(
    element: &XmlElement,
    algorithm: CanonicalizationAlgorithm,
    inherited: &[NamespaceDecl],
    inclusive_prefixes: &[String],
) -> String {
    let inclusive: Vec<String> = inclusive_prefixes
        .iter()
        .map(|p| if p == "#default" { String::new() } else { p.clone() })
        .collect();
    let mut in_scope = Bindings::new();
    for decl in inherited {
        in_scope.insert(key(decl.prefix.as_deref()), decl.uri.clone());
    }

    let mut out = String::new();
    render(
        &mut out,
        element,
        algorithm.is_exclusive(),
        &inclusive,
        &in_scope,
        &Bindings::new(),
    );
    out
}

fn key(prefix: Option<&str>) -> String {
    prefix.unwrap_or_default().to_string()
}

fn render(
    out: &mut String,
    element: &XmlElement,
    exclusive: bool,
    inclusive: &[String],
    parent_scope: &Bindings,
    rendered: &Bindings,
) {
    let mut in_scope = parent_scope.clone();
    for decl in &element.namespaces {
        in_scope.insert(key(decl.prefix.as_deref()), decl.uri.clone());
    }

    // Bindings the element and its attributes actually use.
    let mut utilized = Bindings::new();
    utilized.insert(
        key(element.prefix.as_deref()),
        element.namespace.clone().unwrap_or_default(),
    );
    for attr in &element.attributes {
        if let (Some(prefix), Some(uri)) = (&attr.prefix, &attr.namespace) {
            if uri != XML_NS {
                utilized.insert(prefix.clone(), uri.clone());
            }
        }
    }
    for (prefix, uri) in &utilized {
        in_scope.insert(prefix.clone(), uri.clone());
    }

    let candidates = if exclusive {
        let mut candidates = utilized;
        for prefix in inclusive {
            if let Some(uri) = in_scope.get(prefix) {
                candidates
                    .entry(prefix.clone())
                    .or_insert_with(|| uri.clone());
            }
        }
        candidates
    } else {
        in_scope.clone()
    };

    let mut emitted = Bindings::new();
    for (prefix, uri) in &candidates {
        let already = rendered.get(prefix);
        let needed = if prefix.is_empty() {
            // Default namespace: an empty value only matters to undeclare.
            match already {
                Some(current) => current != uri,
                None => !uri.is_empty(),
            }
        } else {
            already != Some(uri)
        };
        if needed {
            emitted.insert(prefix.clone(), uri.clone());
        }
    }

    let mut attributes: Vec<_> = element.attributes.iter().collect();
    attributes.sort_by(|a, b| {
        let a_ns = a.namespace.as_deref().unwrap_or_default();
        let b_ns = b.namespace.as_deref().unwrap_or_default();
        a_ns.cmp(b_ns).then_with(|| a.name.cmp(&b.name))
    });

    let qname = match &element.prefix {
        Some(p) => format!("{p}:{}", element.name),
        None => element.name.clone(),
    };

    out.push('<');
    out.push_str(&qname);
    // BTreeMap order puts the default namespace ("") first.
    for (prefix, uri) in &emitted {
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        out.push_str(&escape_attr(uri));
        out.push('"');
    }
    for attr in attributes {
        out.push(' ');
        match (&attr.namespace, &attr.prefix) {
            (Some(uri), _) if uri == XML_NS => {
                out.push_str("xml:");
            }
            (Some(_), Some(prefix)) => {
                out.push_str(prefix);
                out.push(':');
            }
            _ => {}
        }
        out.push_str(&attr.name);
        out.push_str("=\"");
        out.push_str(&escape_attr(&attr.value));
        out.push('"');
    }
    out.push('>');

    let mut now_rendered = rendered.clone();
    now_rendered.extend(emitted);

    for child in &element.children {
        match child {
            XmlNode::Element(el) => {
                render(out, el, exclusive, inclusive, &in_scope, &now_rendered);
            }
            XmlNode::Text(text) => out.push_str(&escape_text(text)),
            XmlNode::Comment(_) => {}
        }
    }

    out.push_str("</");
    out.push_str(&qname);
    out.push('>');
}
