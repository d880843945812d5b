//! A small owned XML element tree over `quick-xml` events.
//!
//! OLX files are read whole and are small, so a tree is simpler to work
//! with than the event stream. Comments, processing instructions and the
//! XML declaration are dropped; text and CDATA are kept as text nodes.

use std::fmt::Write as _;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

use courseforge_shared::{CourseError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value, or `""` when absent.
    pub fn attr_or_empty(&self, key: &str) -> &str {
        self.attr(key).unwrap_or_default()
    }

    /// Set `key`, replacing an existing value in place.
    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((key.to_string(), value)),
        }
    }

    /// Builder form of [`Element::set_attr`] that skips empty values.
    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        if !value.is_empty() {
            self.set_attr(key, value);
        }
        self
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Serialized children, without this element's own tags.
    pub fn inner_xml(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            write_node(child, &mut out);
        }
        out
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Element(e) => write_element(e, out),
        Node::Text(t) => out.push_str(&escape(t.as_str())),
    }
}

fn write_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.name);
    for (key, value) in &el.attrs {
        let _ = write!(out, " {key}=\"{}\"", escape_attr(value));
    }
    if el.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &el.children {
        write_node(child, out);
    }
    let _ = write!(out, "</{}>", el.name);
}

/// Attribute values also encode line breaks and tabs, which XML parsers
/// would otherwise normalize to spaces.
fn escape_attr(value: &str) -> String {
    escape(value)
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
        .replace('\t', "&#9;")
}

/// Parse a document with exactly one root element. `origin` names the
/// document in error messages.
pub fn parse(xml: &str, origin: &str) -> Result<Element> {
    let err = |detail: String| CourseError::parse(format!("{origin}: {detail}"));

    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            err(format!("malformed XML at byte {}: {e}", reader.buffer_position()))
        })?;
        match event {
            Event::Start(start) => stack.push(open(&start).map_err(err)?),
            Event::Empty(start) => {
                let el = open(&start).map_err(err)?;
                attach(&mut stack, &mut root, el).map_err(err)?;
            }
            Event::End(_) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| err("unbalanced closing tag".into()))?;
                attach(&mut stack, &mut root, el).map_err(err)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| err(format!("invalid text: {e}")))?;
                if let Some(parent) = stack.last_mut() {
                    push_text(parent, &text);
                }
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                if let Some(parent) = stack.last_mut() {
                    push_text(parent, &text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(err(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| err("document has no root element".into()))
}

fn open(start: &BytesStart<'_>) -> std::result::Result<Element, String> {
    let mut el = Element::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| format!("invalid attribute on <{}>: {e}", el.name))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| format!("invalid value for {key} on <{}>: {e}", el.name))?;
        el.attrs.push((key, value.into_owned()));
    }
    Ok(el)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    el: Element,
) -> std::result::Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.push(el);
            Ok(())
        }
        None if root.is_some() => Err(format!("second root element <{}>", el.name)),
        None => {
            *root = Some(el);
            Ok(())
        }
    }
}

fn push_text(parent: &mut Element, text: &str) {
    if let Some(Node::Text(prev)) = parent.children.last_mut() {
        prev.push_str(text);
    } else {
        parent.children.push(Node::Text(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_and_self_closing_elements() {
        let xml = r#"<?xml version="1.0"?>
<!-- exported -->
<sequential display_name="Loops &amp; more" graded="true">
  <vertical url_name="v1"/>
  <vertical url_name="v2"/>
</sequential>"#;
        let root = parse(xml, "seq.xml").unwrap();
        assert_eq!(root.name, "sequential");
        assert_eq!(root.attr("display_name"), Some("Loops & more"));
        let urls: Vec<_> = root.elements().map(|e| e.attr_or_empty("url_name")).collect();
        assert_eq!(urls, vec!["v1", "v2"]);
    }

    #[test]
    fn keeps_mixed_content_and_cdata() {
        let root = parse("<html><p>a <b>b</b></p><![CDATA[x < y]]></html>", "h").unwrap();
        assert_eq!(root.inner_xml(), "<p>a <b>b</b></p>x &lt; y");
    }

    #[test]
    fn serializes_with_escaping() {
        let mut el = Element::new("problem")
            .with_attr("markdown", "a < \"b\"")
            .with_attr("display_name", "");
        el.push(Element::new("label"));
        assert_eq!(el.to_xml(), r#"<problem markdown="a &lt; &quot;b&quot;"><label/></problem>"#);
        assert_eq!(parse(&el.to_xml(), "p").unwrap(), el);

        let multiline = Element::new("problem").with_attr("markdown", "Pick\n\n(x) B\n");
        assert_eq!(multiline.to_xml(), r#"<problem markdown="Pick&#10;&#10;(x) B&#10;"/>"#);
        assert_eq!(parse(&multiline.to_xml(), "p").unwrap(), multiline);
    }

    #[test]
    fn malformed_documents_name_their_origin() {
        let err = parse("<a><b></a>", "chapter/x.xml").unwrap_err();
        assert!(err.to_string().contains("chapter/x.xml"), "{err}");
        let err = parse("<a/><b/>", "two.xml").unwrap_err();
        assert!(err.to_string().contains("second root element"), "{err}");
        assert!(parse("", "empty.xml").is_err());
        assert!(parse("<a>", "open.xml").unwrap_err().to_string().contains("open.xml"));
    }
}
