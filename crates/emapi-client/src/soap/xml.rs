//! Minimal owned XML element tree
//!
//! Requests are built as element trees and responses are parsed into them.
//! Names are stored without namespace prefixes.

use crate::{Error, Result};
use base64::Engine;
use bytes::Bytes;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Local element name
    pub name: String,
    /// Attributes as written, qualified names included
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order
    pub children: Vec<XmlElement>,
    /// Concatenated text content
    pub text: String,
    /// Binary content, either a request payload or a resolved MTOM attachment
    pub binary: Option<Bytes>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Element holding a single text value
    pub fn text(name: impl Into<String>, value: impl Display) -> Self {
        Self {
            name: name.into(),
            text: value.to_string(),
            ..Self::default()
        }
    }

    /// Element holding binary content
    pub fn binary(name: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            binary: Some(value.into()),
            ..Self::default()
        }
    }

    /// Element marked `xsi:nil`
    pub fn nil(name: impl Into<String>) -> Self {
        Self::new(name).with_attribute("xsi:nil", "true")
    }

    /// Element wrapping one child per item
    pub fn list<I, T>(name: impl Into<String>, item: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Display,
    {
        Self::new(name).with_children(values.into_iter().map(|v| Self::text(item, v)))
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Self>) -> Self {
        self.children.extend(children);
        self
    }

    /// First direct child with the given local name
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First direct child whose name matches ignoring ASCII case
    pub fn child_ignore_case(&self, name: &str) -> Option<&Self> {
        self.children
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn required_child(&self, name: &str) -> Result<&Self> {
        self.child(name)
            .ok_or_else(|| Error::missing_element(format!("{}/{}", self.name, name)))
    }

    /// All direct children with the given local name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Depth-first search for a descendant, this element included
    pub fn find(&self, name: &str) -> Option<&Self> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    /// Attribute value by qualified or local name
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key || k.rsplit(':').next() == Some(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_nil(&self) -> bool {
        self.attribute("nil") == Some("true")
    }

    /// Parse trimmed text content
    pub fn parse_text<T>(&self) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let text = self.text.trim();
        text.parse().map_err(|e| {
            Error::invalid_response(format!("element {} has invalid value '{}': {}", self.name, text, e))
        })
    }

    /// Parse the text of a required child
    pub fn child_value<T>(&self, name: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.required_child(name)?.parse_text()
    }

    /// Binary content: the resolved attachment, or base64 decoded text
    pub fn bytes(&self) -> Result<Bytes> {
        if let Some(binary) = &self.binary {
            return Ok(binary.clone());
        }
        let text: String = self.text.split_whitespace().collect();
        if text.is_empty() {
            return Ok(Bytes::new());
        }
        let decoded = base64::engine::general_purpose::STANDARD.decode(text)?;
        Ok(Bytes::from(decoded))
    }

    /// Parse a document into its root element
    pub fn parse(input: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(input);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut stack: Vec<Self> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(start) => stack.push(Self::from_start(&start)?),
                Event::Empty(start) => {
                    let element = Self::from_start(&start)?;
                    Self::attach(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::invalid_response("unbalanced end tag"))?;
                    Self::attach(&mut stack, &mut root, element);
                }
                Event::Text(text) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(Error::invalid_response("document ended inside an element"));
        }
        root.ok_or_else(|| Error::invalid_response("empty XML document"))
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let mut element = Self::new(String::from_utf8_lossy(start.local_name().as_ref()));
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    fn attach(stack: &mut [Self], root: &mut Option<Self>, element: Self) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => *root = Some(element),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_prefixes_and_keeps_structure() {
        let xml = br#"<?xml version="1.0" encoding="utf-8"?>
            <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
              <s:Body>
                <GetFieldsResponse xmlns="http://ws.alterian.com/DMListManager/">
                  <GetFieldsResult>
                    <DMField><ID>1</ID><Name>email</Name></DMField>
                    <DMField><ID>2</ID><Name>first &amp; last</Name></DMField>
                  </GetFieldsResult>
                </GetFieldsResponse>
              </s:Body>
            </s:Envelope>"#;

        let root = XmlElement::parse(xml).unwrap();
        assert_eq!(root.name, "Envelope");

        let result = root.find("GetFieldsResult").unwrap();
        let fields: Vec<_> = result.children_named("DMField").collect();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].child_value::<i32>("ID").unwrap(), 1);
        assert_eq!(fields[1].required_child("Name").unwrap().text, "first & last");
    }

    #[test]
    fn test_empty_elements_and_attributes() {
        let xml = br#"<root xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><token xsi:nil="true"/><count>3</count></root>"#;
        let root = XmlElement::parse(xml).unwrap();

        assert!(root.child("token").unwrap().is_nil());
        assert_eq!(root.child_value::<u32>("count").unwrap(), 3);
        assert!(root.child("missing").is_none());
        assert!(matches!(
            root.required_child("missing"),
            Err(Error::MissingElement { .. })
        ));
    }

    #[test]
    fn test_bytes_decodes_base64_text() {
        let element = XmlElement::text("data", "aGVs\n bG8=");
        assert_eq!(element.bytes().unwrap().as_ref(), b"hello");

        let empty = XmlElement::new("data");
        assert!(empty.bytes().unwrap().is_empty());

        let binary = XmlElement::binary("data", vec![0x1f_u8, 0x8b]);
        assert_eq!(binary.bytes().unwrap().as_ref(), &[0x1f, 0x8b]);
    }

    #[test]
    fn test_invalid_value_reports_element() {
        let element = XmlElement::text("ID", "abc");
        let err = element.parse_text::<i32>().unwrap_err();
        assert!(err.to_string().contains("element ID has invalid value 'abc'"));
    }

    #[test]
    fn test_unbalanced_document_is_rejected() {
        assert!(XmlElement::parse(b"<a><b></b>").is_err());
        assert!(XmlElement::parse(b"").is_err());
    }
}
