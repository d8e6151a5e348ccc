//! SOAP Envelope
//!
//! Builds SOAP 1.1 requests for the SAPHostControl service and parses responses into a small
//! element tree. Every accessor on [`XmlNode`] returns an `Option`, so callers walk nested
//! response structures without probing for field presence.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt;

/// SOAP 1.1 envelope namespace
pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Namespace of the SAPHostControl service
pub const SERVICE_NS: &str = "urn:SAPHostControl";

const SERVICE_PREFIX: &str = "SAPHostControl";

/// An element of a SOAP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    text: Option<String>,
    children: Vec<Element>,
}

impl Element {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Create an element holding a text value
    pub fn text(name: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            name: name.into(),
            text: Some(value.to_string()),
            children: Vec::new(),
        }
    }

    /// Create an `item` holding an `mKey` / `mValue` pair
    pub fn property(key: &str, value: &str) -> Self {
        Self::new("item")
            .with(Self::text("mKey", key))
            .with(Self::text("mValue", value))
    }

    /// Append a child element
    pub fn with(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Element name
    pub fn name(&self) -> &str {
        &self.name
    }

    fn write_to(&self, out: &mut String, prefix: Option<&str>) {
        let tag = match prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        };

        if self.text.is_none() && self.children.is_empty() {
            out.push_str(&format!("<{}/>", tag));
            return;
        }

        out.push_str(&format!("<{}>", tag));
        if let Some(text) = &self.text {
            out.push_str(&escape(text.as_str()));
        }
        for child in &self.children {
            child.write_to(out, None);
        }
        out.push_str(&format!("</{}>", tag));
    }
}

/// Wrap an operation element into a complete SOAP envelope
pub fn envelope(operation: &Element) -> String {
    let mut out = String::with_capacity(512);
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    out.push_str(&format!(
        r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="{}" xmlns:{}="{}">"#,
        SOAP_ENV_NS, SERVICE_PREFIX, SERVICE_NS
    ));
    out.push_str("<SOAP-ENV:Body>");
    operation.write_to(&mut out, Some(SERVICE_PREFIX));
    out.push_str("</SOAP-ENV:Body>");
    out.push_str("</SOAP-ENV:Envelope>");
    out
}

/// A parsed XML element, names without namespace prefixes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Parse a document and return its root element
    pub fn parse(xml: &str) -> Result<XmlNode, String> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event().map_err(|e| e.to_string())? {
                Event::Start(start) => stack.push(Self::open(&start)?),
                Event::Empty(start) => {
                    let node = Self::open(&start)?;
                    Self::attach(&mut stack, &mut root, node);
                }
                Event::End(_) => {
                    let node = stack.pop().ok_or_else(|| "unbalanced end tag".to_string())?;
                    Self::attach(&mut stack, &mut root, node);
                }
                Event::Text(text) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&text.unescape().map_err(|e| e.to_string())?);
                    }
                }
                Event::CData(data) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err("unexpected end of document".to_string());
        }
        root.ok_or_else(|| "document has no root element".to_string())
    }

    fn open(start: &BytesStart<'_>) -> Result<XmlNode, String> {
        let mut node = XmlNode {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            ..Default::default()
        };
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|e| e.to_string())?
                .into_owned();
            node.attributes.push((key, value));
        }
        Ok(node)
    }

    fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(node);
        } else if root.is_none() {
            *root = Some(node);
        }
    }

    /// First child element named `name`
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All child elements named `name`
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text content, `None` when empty
    pub fn text(&self) -> Option<&str> {
        if self.text.is_empty() {
            None
        } else {
            Some(&self.text)
        }
    }

    /// Text content of the first child named `name`
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(XmlNode::text)
    }

    /// Attribute value by local name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Read `item` children holding `mKey` / `mValue` pairs
    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.children_named("item").filter_map(|item| {
            let key = item.child_text("mKey")?;
            Some((key, item.child_text("mValue").unwrap_or_default()))
        })
    }
}

/// The `Body` element of a SOAP envelope
pub fn body(document: &XmlNode) -> Option<&XmlNode> {
    if document.name == "Body" {
        return Some(document);
    }
    document.child("Body")
}

/// The fault string if the body carries a SOAP fault
pub fn fault(body: &XmlNode) -> Option<String> {
    let fault = body.child("Fault")?;
    let message = fault
        .child_text("faultstring")
        .or_else(|| fault.child_text("faultcode"))
        .unwrap_or("unknown fault");
    Some(message.to_string())
}
