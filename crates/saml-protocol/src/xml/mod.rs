//! Minimal owned XML tree.
//!
//! SAML processing needs an addressable tree (for signature references and
//! canonicalization) rather than a streaming view, but nothing close to a
//! general-purpose DOM. This module provides:
//!
//! - [`XmlElement`] / [`XmlNode`] - the tree, with namespaces resolved at parse time
//! - [`parse`] - quick-xml based reader
//! - [`to_string`] - deterministic writer
//! - [`canonicalize`] - inclusive and exclusive C14N 1.0, comments always excluded
//!
//! Equality on elements is semantic: namespace URI, local name, attributes
//! (in any order) and children. Prefixes and where namespaces were declared
//! do not participate.

mod c14n;
mod reader;
mod writer;

pub use c14n::{canonicalize, canonicalize_with_context, canonicalize_with_prefixes};
pub use reader::parse;
pub use writer::to_string;

/// The namespace bound to the reserved `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// A namespace declaration (`xmlns` or `xmlns:prefix`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    /// Declared prefix, `None` for the default namespace.
    pub prefix: Option<String>,
    /// Namespace URI. Empty undeclares the default namespace.
    pub uri: String,
}

impl NamespaceDecl {
    /// Creates a declaration.
    pub fn new(prefix: Option<&str>, uri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            uri: uri.into(),
        }
    }
}

/// An attribute with its resolved namespace.
#[derive(Debug, Clone, Eq)]
pub struct XmlAttribute {
    /// Prefix as written.
    pub prefix: Option<String>,
    /// Local name.
    pub name: String,
    /// Resolved namespace; unprefixed attributes have none.
    pub namespace: Option<String>,
    /// Unescaped value.
    pub value: String,
}

impl PartialEq for XmlAttribute {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.name == other.name && self.value == other.value
    }
}

/// A child node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    /// Nested element.
    Element(XmlElement),
    /// Character data (already unescaped, CDATA merged in).
    Text(String),
    /// Comment. Never part of a canonical form or of element text.
    Comment(String),
}

/// An element with resolved namespaces.
#[derive(Debug, Clone, Eq)]
pub struct XmlElement {
    /// Prefix as written (or chosen when building).
    pub prefix: Option<String>,
    /// Local name.
    pub name: String,
    /// Resolved namespace URI.
    pub namespace: Option<String>,
    /// Namespace declarations made on this element.
    pub namespaces: Vec<NamespaceDecl>,
    /// Attributes other than namespace declarations.
    pub attributes: Vec<XmlAttribute>,
    /// Child nodes in document order.
    pub children: Vec<XmlNode>,
}

impl PartialEq for XmlElement {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace
            && self.name == other.name
            && self.attributes.len() == other.attributes.len()
            && self
                .attributes
                .iter()
                .all(|a| other.attributes.iter().any(|b| a == b))
            && self.children == other.children
    }
}

impl XmlElement {
    /// Creates an element in `namespace`, written with `prefix`.
    pub fn new(namespace: &str, prefix: &str, name: &str) -> Self {
        Self {
            prefix: (!prefix.is_empty()).then(|| prefix.to_string()),
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
            namespaces: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Creates an element in no namespace.
    pub fn unqualified(name: &str) -> Self {
        Self {
            prefix: None,
            name: name.to_string(),
            namespace: None,
            namespaces: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// `{namespace}name`, used in diagnostics.
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{{{ns}}}{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Returns true if this element has the given namespace and local name.
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    /// Returns an unprefixed attribute value.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Returns a namespaced attribute value.
    pub fn attr_ns(&self, namespace: &str, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(namespace) && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Sets an unprefixed attribute, replacing any previous value.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(existing) = self
            .attributes
            .iter_mut()
            .find(|a| a.namespace.is_none() && a.name == name)
        {
            existing.value = value;
            return;
        }
        self.attributes.push(XmlAttribute {
            prefix: None,
            name: name.to_string(),
            namespace: None,
            value,
        });
    }

    /// Sets an optional unprefixed attribute.
    pub fn set_opt_attr(&mut self, name: &str, value: Option<impl Into<String>>) {
        if let Some(value) = value {
            self.set_attr(name, value);
        }
    }

    /// Sets a namespaced attribute.
    pub fn set_attr_ns(&mut self, namespace: &str, prefix: &str, name: &str, value: impl Into<String>) {
        let value = value.into();
        self.attributes
            .retain(|a| !(a.namespace.as_deref() == Some(namespace) && a.name == name));
        self.attributes.push(XmlAttribute {
            prefix: Some(prefix.to_string()),
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
            value,
        });
    }

    /// Builder form of [`set_attr`](Self::set_attr).
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Declares a namespace on this element unless the same binding exists.
    pub fn declare_namespace(&mut self, prefix: Option<&str>, uri: &str) {
        let exists = self
            .namespaces
            .iter()
            .any(|d| d.prefix.as_deref() == prefix && d.uri == uri);
        if !exists {
            self.namespaces.push(NamespaceDecl::new(prefix, uri));
        }
    }

    /// Appends a child element.
    pub fn push_element(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Appends character data, merging with a preceding text node.
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(XmlNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }

    /// Builder form of [`push_element`](Self::push_element).
    #[must_use]
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.push_element(child);
        self
    }

    /// Builder form of [`push_text`](Self::push_text).
    #[must_use]
    pub fn with_text(mut self, text: &str) -> Self {
        self.push_text(text);
        self
    }

    /// Child elements in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    /// Child elements with the given namespace and local name.
    pub fn children_named<'a, 'n>(
        &'a self,
        namespace: &'n str,
        name: &'n str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'n
    where
        'a: 'n,
    {
        self.child_elements().filter(move |el| el.is(namespace, name))
    }

    /// First child element with the given namespace and local name.
    pub fn first_child(&self, namespace: &str, name: &str) -> Option<&XmlElement> {
        self.child_elements().find(|el| el.is(namespace, name))
    }

    /// Concatenated character data of the direct children.
    ///
    /// Comments split text nodes but never truncate the value:
    /// `a<!-- x -->b` reads as `ab`.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns true if any child is an element.
    pub fn has_element_children(&self) -> bool {
        self.child_elements().next().is_some()
    }

    /// The element's `ID` (SAML) or `Id` (XML-DSig / XML-Enc) attribute.
    pub fn id(&self) -> Option<&str> {
        self.attr("ID").or_else(|| self.attr("Id"))
    }

    /// All elements in this subtree (including self) carrying the given ID.
    pub fn find_all_by_id<'a>(&'a self, id: &str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        collect_by_id(self, id, &mut found);
        found
    }

    /// Namespace declarations in scope at `target` from this root's
    /// ancestors, excluding those made on `target` itself.
    ///
    /// `target` must be a reference into this tree; returns `None` otherwise.
    pub fn inherited_namespaces(&self, target: &XmlElement) -> Option<Vec<NamespaceDecl>> {
        let mut path = Vec::new();
        if !path_to(self, target, &mut path) {
            return None;
        }
        let mut decls: Vec<NamespaceDecl> = Vec::new();
        for ancestor in path {
            for decl in &ancestor.namespaces {
                decls.retain(|d| d.prefix != decl.prefix);
                decls.push(decl.clone());
            }
        }
        Some(decls)
    }
}

fn collect_by_id<'a>(el: &'a XmlElement, id: &str, found: &mut Vec<&'a XmlElement>) {
    if el.id() == Some(id) {
        found.push(el);
    }
    for child in el.child_elements() {
        collect_by_id(child, id, found);
    }
}

fn path_to<'a>(el: &'a XmlElement, target: &XmlElement, path: &mut Vec<&'a XmlElement>) -> bool {
    if std::ptr::eq(el, target) {
        return true;
    }
    path.push(el);
    for child in el.child_elements() {
        if path_to(child, target, path) {
            return true;
        }
    }
    path.pop();
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "urn:test";

    #[test]
    fn text_skips_comments() {
        let el = parse("<a>user@<!-- injected -->example.com</a>").unwrap();
        assert_eq!(el.text(), "user@example.com");
    }

    #[test]
    fn equality_ignores_prefix_and_attribute_order() {
        let a = parse(r#"<p:x xmlns:p="urn:test" a="1" b="2"/>"#).unwrap();
        let b = parse(r#"<x xmlns="urn:test" b="2" a="1"/>"#).unwrap();
        assert_eq!(a, b);

        let c = parse(r#"<x xmlns="urn:other" b="2" a="1"/>"#).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn finds_duplicate_ids() {
        let el = parse(r#"<r ID="a"><c ID="b"/><d><e ID="b"/></d></r>"#).unwrap();
        assert_eq!(el.find_all_by_id("a").len(), 1);
        assert_eq!(el.find_all_by_id("b").len(), 2);
        assert!(el.find_all_by_id("z").is_empty());
    }

    #[test]
    fn inherited_namespaces_follow_the_path() {
        let root = parse(
            r#"<r xmlns:a="urn:a"><m xmlns:b="urn:b"><t xmlns:c="urn:c"/></m></r>"#,
        )
        .unwrap();
        let m = root.child_elements().next().unwrap();
        let t = m.child_elements().next().unwrap();

        let inherited = root.inherited_namespaces(t).unwrap();
        let prefixes: Vec<_> = inherited.iter().map(|d| d.prefix.as_deref()).collect();
        assert_eq!(prefixes, vec![Some("a"), Some("b")]);

        let detached = XmlElement::new(NS, "t", "t");
        assert!(root.inherited_namespaces(&detached).is_none());
    }

    #[test]
    fn builder_helpers() {
        let el = XmlElement::new(NS, "t", "Root")
            .with_attr("ID", "_1")
            .with_child(XmlElement::new(NS, "t", "Child").with_text("v"));
        assert_eq!(el.id(), Some("_1"));
        assert_eq!(el.first_child(NS, "Child").map(XmlElement::text), Some("v".to_string()));
        assert!(el.has_element_children());
    }
}
