//! Finding which body tables are section templates and which risk level each
//! one belongs to.

use crate::docx::W;
use crate::docx::body::{BlockKind, block_kind, block_indices};
use crate::model::RiskLevel;
use crate::xml::{Element, Node};

use super::placeholder::{HEADING_HINTS, STEPS_MARKERS};
use super::text;

/// Token fragments whose presence in a cell makes the table a section template.
const FIELD_HINTS: [&str; 11] = [
    "{{VULN_ID",
    "{TITLE}}",
    "{{DESCRIPTION}}",
    "{{RISK",
    "{{CVSS",
    "{{AFFECTED",
    "{{RECOMMENDATION}}",
    "{{REMEDIATION",
    "{{CWE_ID}}",
    "{{IMPACT}}",
    "{{REFERENCES}}",
];

/// How far back a heading may sit before its table, in blocks.
const HEADING_WINDOW: usize = 3;

/// A section template found in the body. Indices are child indices of
/// `w:body` as it was when the bindings were taken.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SectionBinding {
    pub(crate) table: usize,
    pub(crate) heading: Option<usize>,
    pub(crate) risk_level: RiskLevel,
    /// False when no keyword was found and the level is the default.
    pub(crate) classified: bool,
}

impl SectionBinding {
    /// Where the first instance goes once the template is removed.
    pub(crate) fn position(&self) -> usize {
        self.heading.unwrap_or(self.table)
    }
}

fn all_paragraph_text(el: &Element) -> String {
    let mut out = String::new();
    el.walk(&mut |e| {
        if e.is(W, "p") {
            out.push_str(&text::logical_text(e));
            out.push('\n');
        }
    });
    out
}

pub(crate) fn is_section_table(table: &Element) -> bool {
    let content = all_paragraph_text(table);
    FIELD_HINTS
        .iter()
        .chain(STEPS_MARKERS.iter())
        .any(|hint| content.contains(hint))
}

fn is_heading(p: &Element) -> bool {
    let content = text::logical_text(p);
    HEADING_HINTS.iter().any(|hint| content.contains(hint))
}

/// The heading paragraph bound to the table at `table`, if any. Only
/// paragraphs are considered; another table in between ends the search.
fn find_heading(body: &Element, blocks: &[usize], table: usize) -> Option<usize> {
    let pos = blocks.iter().position(|&i| i == table)?;
    for &idx in blocks[..pos].iter().rev().take(HEADING_WINDOW) {
        let node = &body.children[idx];
        match block_kind(node) {
            Some(BlockKind::Table) => return None,
            Some(BlockKind::Paragraph) => {
                if node.as_element().is_some_and(is_heading) {
                    return Some(idx);
                }
            }
            None => {}
        }
    }
    None
}

/// Category named by a paragraph such as "High Risk Findings".
pub(crate) fn classify_text(text: &str) -> Option<RiskLevel> {
    let lower = text.to_lowercase();
    let risk = lower.contains("risk");
    let keyed = [
        ("critical", RiskLevel::Critical),
        ("high", RiskLevel::High),
        ("medium", RiskLevel::Medium),
        ("low", RiskLevel::Low),
    ];
    if risk
        && let Some((_, level)) = keyed.iter().find(|(word, _)| lower.contains(word))
    {
        return Some(*level);
    }
    if lower.contains("info") && (risk || lower.contains("finding")) {
        return Some(RiskLevel::Informational);
    }
    None
}

/// Scan the body paragraphs before `table`, nearest first, for a category.
pub(crate) fn classify(body: &Element, table: usize) -> Option<RiskLevel> {
    body.children[..table]
        .iter()
        .rev()
        .filter_map(Node::as_element)
        .filter(|e| e.is(W, "p"))
        .find_map(|p| classify_text(&text::logical_text(p)))
}

/// Bindings for every top-level body table that carries finding tokens, in
/// document order.
pub(crate) fn locate_sections(body: &Element) -> Vec<SectionBinding> {
    let blocks = block_indices(body);
    let mut bindings = Vec::new();
    for &idx in &blocks {
        let Some(table) = body.children[idx].as_element() else {
            continue;
        };
        if !table.is(W, "tbl") || !is_section_table(table) {
            continue;
        }
        let heading = find_heading(body, &blocks, idx);
        let (risk_level, classified) = match classify(body, idx) {
            Some(level) => (level, true),
            None => (RiskLevel::High, false),
        };
        log::debug!(
            "Section template at block {idx}: {risk_level}{}{}",
            if heading.is_some() { ", with heading" } else { "" },
            if classified { "" } else { " (default)" }
        );
        bindings.push(SectionBinding {
            table: idx,
            heading,
            risk_level,
            classified,
        });
    }
    bindings
}
