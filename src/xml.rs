//! Minimal element tree for the LIF metadata header
//!
//! The header is a UTF-16 XML document small enough to hold in memory, and
//! the tree walker needs arbitrary re-traversal, so the quick-xml event
//! stream is materialized into a tiny owned DOM.

use crate::error::{LifError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

/// One XML element: name, attributes, and child elements.
///
/// Text content, comments, and processing instructions are discarded; the
/// LIF header carries everything in attributes.
#[derive(Debug, Clone, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: HashMap<String, String>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Attribute value by name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    /// First child element with the given name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All child elements with the given name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Descend through a chain of child names, taking the first match at
    /// each level
    pub fn find_path(&self, path: &[&str]) -> Option<&XmlElement> {
        let mut node = self;
        for name in path {
            node = node.child(name)?;
        }
        Some(node)
    }
}

/// Decode the raw UTF-16 header bytes into a string.
///
/// A byte-order mark, when present, is honored; without one the text is
/// little-endian like every other integer in the container.
pub fn decode_utf16_header(raw: &[u8]) -> Result<String> {
    let (text, _, had_errors) = encoding_rs::UTF_16LE.decode(raw);
    if had_errors {
        return Err(LifError::Xml("header text is not valid UTF-16".to_string()));
    }
    Ok(text.into_owned())
}

/// Parse an XML document into its root element
pub fn parse_document(text: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(element_from(&e)?),
            Event::Empty(e) => {
                let element = element_from(&e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| LifError::Xml("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(LifError::Xml("unterminated element".to_string()));
    }
    root.ok_or_else(|| LifError::Xml("empty XML document".to_string()))
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    } else {
        return Err(LifError::Xml("multiple root elements".to_string()));
    }
    Ok(())
}

fn element_from(e: &BytesStart<'_>) -> Result<XmlElement> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attributes = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| LifError::Xml(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| LifError::Xml(err.to_string()))?
            .into_owned();
        attributes.insert(key, value);
    }
    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_document() {
        let root = parse_document(
            r#"<Root Version="2">
                 <Element Name="outer">
                   <Children>
                     <Element Name="inner" />
                   </Children>
                 </Element>
               </Root>"#,
        )
        .unwrap();

        assert_eq!(root.name, "Root");
        assert_eq!(root.attr("Version"), Some("2"));
        let outer = root.child("Element").unwrap();
        assert_eq!(outer.attr("Name"), Some("outer"));
        let inner = outer.find_path(&["Children", "Element"]).unwrap();
        assert_eq!(inner.attr("Name"), Some("inner"));
    }

    #[test]
    fn test_children_named() {
        let root = parse_document(r#"<R><A x="1"/><B/><A x="2"/></R>"#).unwrap();
        let values: Vec<_> = root.children_named("A").filter_map(|a| a.attr("x")).collect();
        assert_eq!(values, vec!["1", "2"]);
    }

    #[test]
    fn test_attribute_unescaping() {
        let root = parse_document(r#"<R Name="a &amp; b"/>"#).unwrap();
        assert_eq!(root.attr("Name"), Some("a & b"));
    }

    #[test]
    fn test_malformed_document_fails() {
        assert!(parse_document("<R><A></R>").is_err());
        assert!(parse_document("").is_err());
    }

    #[test]
    fn test_decode_utf16_header() {
        let text = "<Root/>";
        let raw: Vec<u8> = text
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect();
        assert_eq!(decode_utf16_header(&raw).unwrap(), text);
    }
}
