//! Owned, mutable XML tree for OOXML parts.
//!
//! `roxmltree` is read-only, so every part that gets rewritten is converted into
//! this tree once, mutated in place, and serialized again with `quick-xml`.
//! Prefixes and `xmlns` declarations are carried over from the source so the
//! written part binds the same names as the template did. Comments and
//! processing instructions are dropped.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::Error;

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

pub(crate) const XML: Ns = Ns {
    prefix: "xml",
    uri: XML_NS,
};

/// A namespace together with the prefix used for elements this crate creates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Ns {
    pub(crate) prefix: &'static str,
    pub(crate) uri: &'static str,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Name {
    pub(crate) prefix: Option<String>,
    pub(crate) local: String,
    pub(crate) namespace: Option<String>,
}

impl Name {
    fn qualified(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.local),
            None => self.local.clone(),
        }
    }

    fn in_ns(ns: Ns, local: &str) -> Self {
        Name {
            prefix: Some(ns.prefix.to_string()),
            local: local.to_string(),
            namespace: Some(ns.uri.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Attribute {
    pub(crate) name: Name,
    pub(crate) value: String,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    pub(crate) fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        }
    }

    pub(crate) fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        }
    }

    pub(crate) fn is(&self, ns: Ns, local: &str) -> bool {
        self.as_element().is_some_and(|e| e.is(ns, local))
    }
}

/// `Clone` is a deep copy: the clone owns all of its strings and children.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Element {
    pub(crate) name: Name,
    pub(crate) attributes: Vec<Attribute>,
    /// `xmlns` declarations made on this element; `None` is the default namespace.
    pub(crate) namespaces: Vec<(Option<String>, String)>,
    pub(crate) children: Vec<Node>,
}

impl Element {
    pub(crate) fn new(ns: Ns, local: &str) -> Self {
        Element {
            name: Name::in_ns(ns, local),
            attributes: Vec::new(),
            namespaces: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element in the default (unprefixed) namespace, as used by package parts.
    pub(crate) fn unprefixed(namespace: &str, local: &str) -> Self {
        Element {
            name: Name {
                prefix: None,
                local: local.to_string(),
                namespace: Some(namespace.to_string()),
            },
            attributes: Vec::new(),
            namespaces: Vec::new(),
            children: Vec::new(),
        }
    }

    pub(crate) fn is(&self, ns: Ns, local: &str) -> bool {
        self.name.local == local && self.name.namespace.as_deref() == Some(ns.uri)
    }

    pub(crate) fn local_name(&self) -> &str {
        &self.name.local
    }

    pub(crate) fn plain_attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.local == local && a.name.namespace.is_none())
            .map(|a| a.value.as_str())
    }

    pub(crate) fn set_attr(&mut self, ns: Ns, local: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(existing) = self
            .attributes
            .iter_mut()
            .find(|a| a.name.local == local && a.name.namespace.as_deref() == Some(ns.uri))
        {
            existing.value = value;
            return;
        }
        self.attributes.push(Attribute {
            name: Name::in_ns(ns, local),
            value,
        });
    }

    pub(crate) fn set_plain_attr(&mut self, local: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(existing) = self
            .attributes
            .iter_mut()
            .find(|a| a.name.local == local && a.name.namespace.is_none())
        {
            existing.value = value;
            return;
        }
        self.attributes.push(Attribute {
            name: Name {
                prefix: None,
                local: local.to_string(),
                namespace: None,
            },
            value,
        });
    }

    pub(crate) fn with_attr(mut self, ns: Ns, local: &str, value: impl Into<String>) -> Self {
        self.set_attr(ns, local, value);
        self
    }

    pub(crate) fn with_plain_attr(mut self, local: &str, value: impl Into<String>) -> Self {
        self.set_plain_attr(local, value);
        self
    }

    pub(crate) fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub(crate) fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Declare `ns` on this element (used on fragments whose namespace the
    /// part root may not bind, e.g. `a:` and `pic:` inside drawings).
    pub(crate) fn declaring(mut self, ns: Ns) -> Self {
        self.declare(ns);
        self
    }

    pub(crate) fn declare(&mut self, ns: Ns) {
        if self
            .namespaces
            .iter()
            .any(|(p, uri)| p.as_deref() == Some(ns.prefix) && uri == ns.uri)
        {
            return;
        }
        self.namespaces
            .push((Some(ns.prefix.to_string()), ns.uri.to_string()));
    }

    pub(crate) fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub(crate) fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    pub(crate) fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    pub(crate) fn find_child(&self, ns: Ns, local: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.is(ns, local))
    }

    pub(crate) fn find_child_mut(&mut self, ns: Ns, local: &str) -> Option<&mut Element> {
        self.child_elements_mut().find(|e| e.is(ns, local))
    }

    /// Concatenated direct text children.
    pub(crate) fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    pub(crate) fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![Node::Text(text.into())];
    }

    /// Pre-order walk over this element and all descendant elements.
    pub(crate) fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Element)) {
        f(self);
        for child in self.child_elements() {
            child.walk(f);
        }
    }
}

pub(crate) fn parse(xml: &str) -> Result<Element, Error> {
    let doc = roxmltree::Document::parse(xml)?;
    Ok(convert(doc.root_element()))
}

fn prefix_for(node: roxmltree::Node, uri: Option<&str>) -> Option<String> {
    let uri = uri?;
    if uri == XML_NS {
        return Some("xml".to_string());
    }
    node.lookup_prefix(uri).map(String::from)
}

fn convert(node: roxmltree::Node) -> Element {
    let ns = node.tag_name().namespace();
    let name = Name {
        prefix: prefix_for(node, ns),
        local: node.tag_name().name().to_string(),
        namespace: ns.map(String::from),
    };

    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|p| p.namespaces().map(|n| (n.name(), n.uri())).collect())
        .unwrap_or_default();
    let namespaces = node
        .namespaces()
        .filter(|n| n.uri() != XML_NS && !inherited.contains(&(n.name(), n.uri())))
        .map(|n| (n.name().map(String::from), n.uri().to_string()))
        .collect();

    let attributes = node
        .attributes()
        .map(|a| Attribute {
            name: Name {
                prefix: prefix_for(node, a.namespace()),
                local: a.name().to_string(),
                namespace: a.namespace().map(String::from),
            },
            value: a.value().to_string(),
        })
        .collect();

    let mut children = Vec::new();
    for child in node.children() {
        if child.is_element() {
            children.push(Node::Element(convert(child)));
        } else if child.is_text()
            && let Some(text) = child.text()
        {
            children.push(Node::Text(text.to_string()));
        }
    }

    Element {
        name,
        attributes,
        namespaces,
        children,
    }
}

pub(crate) fn to_bytes(root: &Element) -> Result<Vec<u8>, Error> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    write_element(&mut writer, root)?;
    Ok(writer.into_inner())
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: &Element) -> Result<(), quick_xml::Error> {
    let qname = el.name.qualified();
    let mut start = BytesStart::new(qname.as_str());
    for (prefix, uri) in &el.namespaces {
        let key = match prefix {
            Some(p) => format!("xmlns:{p}"),
            None => "xmlns".to_string(),
        };
        start.push_attribute((key.as_str(), uri.as_str()));
    }
    for attr in &el.attributes {
        let key = attr.name.qualified();
        start.push_attribute((key.as_str(), attr.value.as_str()));
    }

    if el.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &el.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new(qname.as_str())))?;
    Ok(())
}
