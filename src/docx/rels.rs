use crate::error::Error;
use crate::xml::{self, Element};

pub(crate) const PKG_REL_NS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";
const OFFICE_DOCUMENT_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub(crate) const IMAGE_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
pub(crate) const HYPERLINK_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
const HEADER_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
const FOOTER_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer";

/// A `.rels` part. The element tree is the source of truth so relationships
/// this crate does not understand are written back untouched.
pub(crate) struct Relationships {
    root: Element,
}

impl Relationships {
    pub(crate) fn empty() -> Self {
        Relationships {
            root: Element::unprefixed(PKG_REL_NS, "Relationships"),
        }
    }

    pub(crate) fn parse(xml_content: &str) -> Result<Self, Error> {
        Ok(Relationships {
            root: xml::parse(xml_content)?,
        })
    }

    fn entries(&self) -> impl Iterator<Item = &Element> {
        self.root
            .child_elements()
            .filter(|e| e.local_name() == "Relationship")
    }

    fn targets_of_type(&self, rel_type: &str) -> Vec<&str> {
        self.entries()
            .filter(|e| e.plain_attr("Type") == Some(rel_type))
            .filter(|e| e.plain_attr("TargetMode") != Some("External"))
            .filter_map(|e| e.plain_attr("Target"))
            .collect()
    }

    pub(crate) fn office_document(&self) -> Option<&str> {
        self.targets_of_type(OFFICE_DOCUMENT_REL).into_iter().next()
    }

    pub(crate) fn header_footer_targets(&self) -> Vec<&str> {
        let mut targets = self.targets_of_type(HEADER_REL);
        targets.extend(self.targets_of_type(FOOTER_REL));
        targets
    }

    fn next_id(&self) -> String {
        let max = self
            .entries()
            .filter_map(|e| e.plain_attr("Id"))
            .filter_map(|id| id.strip_prefix("rId"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("rId{}", max + 1)
    }

    pub(crate) fn add(&mut self, rel_type: &str, target: &str, external: bool) -> String {
        let id = self.next_id();
        let mut rel = Element::unprefixed(PKG_REL_NS, "Relationship")
            .with_plain_attr("Id", id.as_str())
            .with_plain_attr("Type", rel_type)
            .with_plain_attr("Target", target);
        if external {
            rel.set_plain_attr("TargetMode", "External");
        }
        self.root.push(rel);
        id
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        xml::to_bytes(&self.root)
    }
}
