//! Minimal XML element tree.
//!
//! The GAR dialect is small: namespaced elements, a handful of
//! attributes, text content. This tree keeps local names only (the
//! registry uses a single namespace per document) and treats every
//! edit as a rebuild — callers get a new tree, never aliased mutation
//! of a shared parse result.

use std::fmt::Write as _;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{GarError, Result};

/// One XML element: local name, attributes in source order, direct
/// text content, child elements in source order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Attribute value by local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First child with the given local name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given local name, in source order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// All descendants with the given local name, in document order.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut out = Vec::new();
        self.collect_descendants(name, &mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.collect_descendants(name, out);
        }
    }

    /// Text content of the first child with the given local name.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    /// New tree without any child of the given name.
    pub fn without_child(&self, name: &str) -> Element {
        let mut out = self.clone();
        out.children.retain(|c| c.name != name);
        out
    }

    /// New tree where every child of the given name carries the given
    /// text instead of its previous content.
    pub fn with_child_text(&self, name: &str, text: &str) -> Element {
        let mut out = self.clone();
        for child in out.children.iter_mut() {
            if child.name == name {
                child.text = text.to_string();
            }
        }
        out
    }

    /// New tree with an attribute set on the root (replacing any
    /// existing attribute of the same name).
    pub fn with_attribute(&self, key: &str, value: &str) -> Element {
        let mut out = self.clone();
        out.attributes.retain(|(k, _)| k != key);
        out.attributes.push((key.to_string(), value.to_string()));
        out
    }

    /// Serialize without an XML declaration. Attribute values and text
    /// are escaped.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        let _ = write!(out, "<{}", self.name);
        for (key, value) in &self.attributes {
            let _ = write!(out, r#" {}="{}""#, key, escape(value));
        }
        if self.text.is_empty() && self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if !self.text.is_empty() {
            let _ = write!(out, "{}", escape(&self.text));
        }
        for child in &self.children {
            child.write_xml(out);
        }
        let _ = write!(out, "</{}>", self.name);
    }
}

/// Parse a document and return its root element.
///
/// Namespace declarations are dropped; element and attribute names are
/// reduced to their local parts.
pub fn parse_document(bytes: &[u8]) -> Result<Element> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => {
                let element = element_from_start(&start)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| GarError::malformed("unbalanced end tag"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Event::Eof => {
                return Err(GarError::malformed("document has no root element"));
            }
            // Declarations, comments and processing instructions carry
            // nothing the translator needs.
            _ => {}
        }
        buf.clear();
    }
}

fn element_from_start(start: &quick_xml::events::BytesStart<'_>) -> Result<Element> {
    let mut element = Element::new(String::from_utf8_lossy(start.local_name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::InvalidAttr)?;
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(GarError::Xml)?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let xml = br#"<?xml version="1.0"?>
            <root xmlns="http://example.com/ns" id="r1">
                <item code="a">first</item>
                <item code="b">second</item>
                <empty/>
            </root>"#;

        let root = parse_document(xml).unwrap();
        assert_eq!(root.name, "root");
        assert_eq!(root.attr("id"), Some("r1"));
        // xmlns declaration is dropped
        assert_eq!(root.attributes.len(), 1);
        assert_eq!(root.children.len(), 3);
        let items: Vec<_> = root.children_named("item").collect();
        assert_eq!(items[0].text, "first");
        assert_eq!(items[1].attr("code"), Some("b"));
        assert!(root.child("empty").unwrap().children.is_empty());
    }

    #[test]
    fn strips_namespace_prefixes() {
        let xml = br#"<ns:root xmlns:ns="http://example.com/"><ns:leaf>x</ns:leaf></ns:root>"#;
        let root = parse_document(xml).unwrap();
        assert_eq!(root.name, "root");
        assert_eq!(root.child_text("leaf"), Some("x"));
    }

    #[test]
    fn serialization_escapes_content() {
        let mut element = Element::new("tag");
        element.text = "a < b & c".to_string();
        element
            .attributes
            .push(("label".to_string(), "\"quoted\"".to_string()));
        assert_eq!(
            element.to_xml(),
            r#"<tag label="&quot;quoted&quot;">a &lt; b &amp; c</tag>"#
        );
    }

    #[test]
    fn rebuild_edits_do_not_touch_the_source_tree() {
        let root = parse_document(
            br#"<sub><uaiEtab>0123456A</uaiEtab><debutValidite>old</debutValidite></sub>"#,
        )
        .unwrap();

        let patched = root
            .without_child("uaiEtab")
            .with_child_text("debutValidite", "new");

        assert!(patched.child("uaiEtab").is_none());
        assert_eq!(patched.child_text("debutValidite"), Some("new"));
        // the original parse is untouched
        assert_eq!(root.child_text("uaiEtab"), Some("0123456A"));
        assert_eq!(root.child_text("debutValidite"), Some("old"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_document(b"not xml at all").is_err());
        assert!(parse_document(b"").is_err());
    }
}
