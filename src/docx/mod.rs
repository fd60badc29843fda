pub(crate) mod body;
mod rels;

use std::io::{Cursor, Read, Write};

use crate::error::Error;
use crate::xml::{self, Element, Ns};

pub(crate) use rels::Relationships;
use rels::{HYPERLINK_REL, IMAGE_REL};

pub(crate) const W: Ns = Ns {
    prefix: "w",
    uri: "http://schemas.openxmlformats.org/wordprocessingml/2006/main",
};
pub(crate) const R: Ns = Ns {
    prefix: "r",
    uri: "http://schemas.openxmlformats.org/officeDocument/2006/relationships",
};
pub(crate) const WP: Ns = Ns {
    prefix: "wp",
    uri: "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing",
};
pub(crate) const A: Ns = Ns {
    prefix: "a",
    uri: "http://schemas.openxmlformats.org/drawingml/2006/main",
};
pub(crate) const PIC: Ns = Ns {
    prefix: "pic",
    uri: "http://schemas.openxmlformats.org/drawingml/2006/picture",
};
pub(crate) const V: Ns = Ns {
    prefix: "v",
    uri: "urn:schemas-microsoft-com:vml",
};

const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const CONTENT_TYPES_PATH: &str = "[Content_Types].xml";
const DEFAULT_DOCUMENT_PATH: &str = "word/document.xml";

/// An opened DOCX package. Parts that generation rewrites are held as trees;
/// every other entry is carried through byte-for-byte in its original order.
pub(crate) struct Package {
    entries: Vec<(String, Vec<u8>)>,
    document_path: String,
    rels_path: String,
    pub(crate) document: Element,
    pub(crate) relationships: Relationships,
    content_types: Element,
    /// Header and footer parts, keyed by zip path.
    pub(crate) side_parts: Vec<(String, Element)>,
    new_media: Vec<(String, Vec<u8>)>,
    next_drawing_id: u32,
}

pub(crate) fn read_zip_text(entries: &[(String, Vec<u8>)], name: &str) -> Option<String> {
    entries
        .iter()
        .find(|(n, _)| n == name)
        .and_then(|(_, data)| String::from_utf8(data.clone()).ok())
}

/// "word/document.xml" → "word/_rels/document.xml.rels"
fn part_rels_path(part_path: &str) -> String {
    match part_path.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part_path}.rels"),
    }
}

/// Resolve a relationship target relative to the directory of its source part.
fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    match source_part.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{target}"),
        None => target.to_string(),
    }
}

impl Package {
    pub(crate) fn from_bytes(input: &[u8]) -> Result<Self, Error> {
        let mut zip = zip::ZipArchive::new(Cursor::new(input))
            .map_err(|_| Error::InvalidDocx("file is not a ZIP archive".into()))?;

        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            entries.push((name, data));
        }

        let document_path = read_zip_text(&entries, "_rels/.rels")
            .and_then(|xml| Relationships::parse(&xml).ok())
            .and_then(|rels| rels.office_document().map(|t| resolve_target("", t)))
            .unwrap_or_else(|| DEFAULT_DOCUMENT_PATH.to_string());

        let xml_content = read_zip_text(&entries, &document_path).ok_or_else(|| {
            Error::InvalidDocx(format!(
                "missing {document_path} (is this a DOCX file?)"
            ))
        })?;
        let mut document = xml::parse(&xml_content)?;
        document.declare(W);

        let rels_path = part_rels_path(&document_path);
        let relationships = match read_zip_text(&entries, &rels_path) {
            Some(xml) => Relationships::parse(&xml)?,
            None => Relationships::empty(),
        };

        let content_types = match read_zip_text(&entries, CONTENT_TYPES_PATH) {
            Some(xml) => xml::parse(&xml)?,
            None => return Err(Error::InvalidDocx("missing [Content_Types].xml".into())),
        };

        let mut side_parts = Vec::new();
        for target in relationships.header_footer_targets() {
            let path = resolve_target(&document_path, target);
            let Some(xml_text) = read_zip_text(&entries, &path) else {
                log::warn!("Relationship points at missing part {path}");
                continue;
            };
            let mut root = xml::parse(&xml_text)?;
            root.declare(W);
            side_parts.push((path, root));
        }

        let mut max_id = 0;
        document.walk(&mut |e| {
            if e.is(WP, "docPr")
                && let Some(id) = e.plain_attr("id").and_then(|v| v.parse::<u32>().ok())
            {
                max_id = max_id.max(id);
            }
        });

        Ok(Package {
            entries,
            document_path,
            rels_path,
            document,
            relationships,
            content_types,
            side_parts,
            new_media: Vec::new(),
            next_drawing_id: max_id + 1,
        })
    }

    pub(crate) fn body(&self) -> Option<&Element> {
        self.document.find_child(W, "body")
    }

    pub(crate) fn body_mut(&mut self) -> Option<&mut Element> {
        self.document.find_child_mut(W, "body")
    }

    pub(crate) fn next_drawing_id(&mut self) -> u32 {
        let id = self.next_drawing_id;
        self.next_drawing_id += 1;
        id
    }

    /// Add an external hyperlink relationship and return its id.
    pub(crate) fn add_hyperlink(&mut self, url: &str) -> String {
        self.document.declare(R);
        self.relationships.add(HYPERLINK_REL, url, true)
    }

    /// Store an image as a new media part and return its relationship id.
    pub(crate) fn add_image(&mut self, data: Vec<u8>, extension: &str, content_type: &str) -> String {
        self.document.declare(R);
        self.document.declare(WP);

        let taken = |name: &str, pkg: &Package| {
            pkg.entries.iter().any(|(n, _)| n == name) || pkg.new_media.iter().any(|(n, _)| n == name)
        };
        let media_dir = match self.document_path.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/media"),
            None => "media".to_string(),
        };
        let mut n = self.new_media.len() + 1;
        let mut file_name = format!("poc_{n}.{extension}");
        while taken(&format!("{media_dir}/{file_name}"), self) {
            n += 1;
            file_name = format!("poc_{n}.{extension}");
        }

        self.ensure_content_type(extension, content_type);
        self.new_media
            .push((format!("{media_dir}/{file_name}"), data));
        self.relationships
            .add(IMAGE_REL, &format!("media/{file_name}"), false)
    }

    fn ensure_content_type(&mut self, extension: &str, content_type: &str) {
        let present = self.content_types.child_elements().any(|e| {
            e.local_name() == "Default"
                && e.plain_attr("Extension")
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        });
        if present {
            return;
        }
        let default = Element::unprefixed(CONTENT_TYPES_NS, "Default")
            .with_plain_attr("Extension", extension)
            .with_plain_attr("ContentType", content_type);
        self.content_types
            .children
            .insert(0, xml::Node::Element(default));
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        let stored = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);

        let document = xml::to_bytes(&self.document)?;
        let rels = self.relationships.to_bytes()?;
        let content_types = xml::to_bytes(&self.content_types)?;
        let mut rels_written = false;

        for (name, data) in &self.entries {
            let rewritten = if *name == self.document_path {
                Some(document.clone())
            } else if *name == self.rels_path {
                rels_written = true;
                Some(rels.clone())
            } else if name == CONTENT_TYPES_PATH {
                Some(content_types.clone())
            } else if let Some((_, root)) = self.side_parts.iter().find(|(p, _)| p == name) {
                Some(xml::to_bytes(root)?)
            } else {
                None
            };
            let opts = if name.contains("/media/") { stored } else { deflated };
            zip.start_file(name.as_str(), opts)?;
            zip.write_all(rewritten.as_deref().unwrap_or(data))?;
        }

        if !rels_written {
            zip.start_file(self.rels_path.as_str(), deflated)?;
            zip.write_all(&rels)?;
        }
        for (name, data) in &self.new_media {
            zip.start_file(name.as_str(), stored)?;
            zip.write_all(data)?;
        }

        Ok(zip.finish()?.into_inner())
    }
}
