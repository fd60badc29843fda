#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::path::Path;

use docxide_report::{Finding, GenerateConfig, GenerationReport, Report, RiskLevel};

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const WP_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";

const DOCUMENT_OPEN: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:wps="http://schemas.microsoft.com/office/word/2010/wordprocessingShape" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006" xmlns:v="urn:schemas-microsoft-com:vml"><w:body>"#;
const DOCUMENT_CLOSE: &str = r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr></w:body></w:document>"#;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// A paragraph with one run per part; the first run is bold.
pub fn para_runs(parts: &[&str]) -> String {
    let mut xml = String::from("<w:p>");
    for (i, part) in parts.iter().enumerate() {
        xml.push_str("<w:r>");
        if i == 0 {
            xml.push_str("<w:rPr><w:b/></w:rPr>");
        }
        xml.push_str(&format!(
            r#"<w:t xml:space="preserve">{}</w:t></w:r>"#,
            escape(part)
        ));
    }
    xml.push_str("</w:p>");
    xml
}

pub fn para(text: &str) -> String {
    if text.is_empty() {
        "<w:p/>".to_string()
    } else {
        para_runs(&[text])
    }
}

/// A cell holding the given block XML.
pub fn cell_xml(content: &str) -> String {
    format!(r#"<w:tc><w:tcPr><w:tcW w:w="4500" w:type="dxa"/></w:tcPr>{content}</w:tc>"#)
}

pub fn cell(text: &str) -> String {
    cell_xml(&para(text))
}

pub fn table_xml(rows: &[Vec<String>]) -> String {
    let mut xml = String::from(r#"<w:tbl><w:tblPr><w:tblW w:w="9000" w:type="dxa"/></w:tblPr>"#);
    for row in rows {
        xml.push_str("<w:tr>");
        for c in row {
            xml.push_str(c);
        }
        xml.push_str("</w:tr>");
    }
    xml.push_str("</w:tbl>");
    xml
}

/// A table whose cells each hold one single-run paragraph.
pub fn table(rows: &[&[&str]]) -> String {
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|r| r.iter().map(|t| cell(t)).collect())
        .collect();
    table_xml(&rows)
}

/// A run anchoring a text box, written both as DrawingML and as VML fallback.
pub fn text_box_paragraph(inner: &str) -> String {
    let content = format!("<w:txbxContent>{}</w:txbxContent>", para(inner));
    format!(
        r#"<w:p><w:r><mc:AlternateContent><mc:Choice Requires="wps"><w:drawing><wp:anchor><wp:docPr id="7" name="Text Box 7"/><a:graphic><a:graphicData uri="http://schemas.microsoft.com/office/word/2010/wordprocessingShape"><wps:wsp><wps:txbx>{content}</wps:txbx></wps:wsp></a:graphicData></a:graphic></wp:anchor></w:drawing></mc:Choice><mc:Fallback><w:pict><v:shape><v:textbox>{content}</v:textbox></v:shape></w:pict></mc:Fallback></mc:AlternateContent></w:r></w:p>"#
    )
}

/// Builds a minimal DOCX package in memory.
#[derive(Default)]
pub struct TemplateBuilder {
    body: String,
    header: Option<String>,
}

impl TemplateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(mut self, xml: &str) -> Self {
        self.body.push_str(xml);
        self
    }

    pub fn para(self, text: &str) -> Self {
        self.raw(&para(text))
    }

    pub fn table(self, rows: &[&[&str]]) -> Self {
        self.raw(&table(rows))
    }

    pub fn header(mut self, text: &str) -> Self {
        self.header = Some(text.to_string());
        self
    }

    pub fn document_xml(&self) -> String {
        format!("{DOCUMENT_OPEN}{}{DOCUMENT_CLOSE}", self.body)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut parts: Vec<(&str, String)> = Vec::new();
        parts.push((
            "[Content_Types].xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>{}</Types>"#,
                if self.header.is_some() {
                    r#"<Override PartName="/word/header1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml"/>"#
                } else {
                    ""
                }
            ),
        ));
        parts.push((
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#
                .to_string(),
        ));
        parts.push(("word/document.xml", self.document_xml()));
        parts.push((
            "word/_rels/document.xml.rels",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>{}</Relationships>"#,
                if self.header.is_some() {
                    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/header" Target="header1.xml"/>"#
                } else {
                    ""
                }
            ),
        ));
        parts.push((
            "word/styles.xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"/>"#
                .to_string(),
        ));
        if let Some(text) = &self.header {
            parts.push((
                "word/header1.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">{}</w:hdr>"#,
                    para(text)
                ),
            ));
        }

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let opts = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in parts {
            zip.start_file(name, opts).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }
}

pub fn finding(id: &str, title: &str, level: RiskLevel) -> Finding {
    let mut f = Finding::new(id, title, level);
    f.description = format!("Description of {title}");
    f.affected_components = "https://app.example.com/login".into();
    f.recommendation = format!("Fix {title}");
    f.score = Some(7.5);
    f
}

pub fn report(findings: Vec<Finding>) -> Report {
    Report::new("Acme Web Assessment", findings).unwrap()
}

pub fn write_png(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    image::RgbImage::from_pixel(8, 8, image::Rgb([200, 30, 30]))
        .save(path)
        .unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(String),
    /// Rows of cells; a cell's paragraphs are joined with '\n'.
    Table(Vec<Vec<String>>),
}

/// A generated package, unpacked.
pub struct Generated {
    pub entries: Vec<(String, Vec<u8>)>,
    pub outcome: GenerationReport,
}

pub fn generate(template: &[u8], report: &Report, config: &GenerateConfig) -> Generated {
    init_logging();
    let (bytes, outcome) = docxide_report::generate_report_bytes(template, report, config).unwrap();
    Generated {
        entries: unzip(&bytes),
        outcome,
    }
}

pub fn unzip(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        entries.push((entry.name().to_string(), data));
    }
    entries
}

fn is_w(node: roxmltree::Node, local: &str) -> bool {
    node.is_element() && node.tag_name().name() == local && node.tag_name().namespace() == Some(W_NS)
}

/// Text of a paragraph, excluding text boxes anchored in it.
pub fn paragraph_text(p: roxmltree::Node) -> String {
    p.descendants()
        .filter(|n| is_w(*n, "t"))
        .filter(|n| {
            !n.ancestors()
                .take_while(|a| *a != p)
                .any(|a| is_w(a, "txbxContent"))
        })
        .filter_map(|n| n.text())
        .collect()
}

pub fn cell_text(tc: roxmltree::Node) -> String {
    tc.children()
        .filter(|n| is_w(*n, "p"))
        .map(paragraph_text)
        .collect::<Vec<_>>()
        .join("\n")
}

impl Generated {
    pub fn part(&self, name: &str) -> String {
        let (_, data) = self
            .entries
            .iter()
            .find(|(n, _)| n == name)
            .unwrap_or_else(|| panic!("missing part {name}"));
        String::from_utf8(data.clone()).unwrap()
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn document(&self) -> String {
        self.part("word/document.xml")
    }

    pub fn blocks(&self) -> Vec<Block> {
        let xml = self.document();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let body = doc
            .root_element()
            .children()
            .find(|n| is_w(*n, "body"))
            .unwrap();
        body.children()
            .filter_map(|n| {
                if is_w(n, "p") {
                    Some(Block::Paragraph(paragraph_text(n)))
                } else if is_w(n, "tbl") {
                    let rows = n
                        .children()
                        .filter(|r| is_w(*r, "tr"))
                        .map(|r| {
                            r.children()
                                .filter(|c| is_w(*c, "tc"))
                                .map(cell_text)
                                .collect()
                        })
                        .collect();
                    Some(Block::Table(rows))
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn tables(&self) -> Vec<Vec<Vec<String>>> {
        self.blocks()
            .into_iter()
            .filter_map(|b| match b {
                Block::Table(rows) => Some(rows),
                Block::Paragraph(_) => None,
            })
            .collect()
    }

    /// Relationship target for `id` in the main document's rels part, with
    /// its TargetMode.
    pub fn relationship(&self, id: &str) -> Option<(String, String, Option<String>)> {
        let xml = self.part("word/_rels/document.xml.rels");
        let doc = roxmltree::Document::parse(&xml).unwrap();
        doc.root_element()
            .children()
            .filter(|n| n.is_element())
            .find(|n| n.attribute("Id") == Some(id))
            .map(|n| {
                (
                    n.attribute("Type").unwrap_or_default().to_string(),
                    n.attribute("Target").unwrap_or_default().to_string(),
                    n.attribute("TargetMode").map(String::from),
                )
            })
    }
}
