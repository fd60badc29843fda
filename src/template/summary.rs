//! Summary tables: one marker row per risk level, expanded into one row per
//! finding.

use crate::docx::W;
use crate::docx::body::{
    RunStyle, child_indices, for_each_paragraph_mut, plain_text, text_element, text_run,
};
use crate::model::{Finding, Report, RiskLevel};
use crate::xml::{Element, Node};

use super::text;

pub(crate) const NONE_MARKER: &str = "None";

pub(crate) fn marker(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Critical => "{{CRITICAL_FINDINGS_LIST}}",
        RiskLevel::High => "{{HIGH_FINDINGS_LIST}}",
        RiskLevel::Medium => "{{MEDIUM_FINDINGS_LIST}}",
        RiskLevel::Low => "{{LOW_FINDINGS_LIST}}",
        RiskLevel::Informational => "{{INFO_FINDINGS_LIST}}",
    }
}

/// The level whose marker appears in the row, if any.
pub(crate) fn row_level(row: &Element) -> Option<RiskLevel> {
    let content = plain_text(row);
    RiskLevel::ALL
        .into_iter()
        .find(|&level| content.contains(marker(level)))
}

fn replace_everywhere(el: &mut Element, token: &str, value: &str) {
    for_each_paragraph_mut(el, &mut |p| {
        text::replace(p, token, value);
    });
}

/// Put `status` into the first paragraph of the cell, replacing what is there.
fn set_status(cell: &mut Element, status: &str) {
    let Some(p) = cell.find_child_mut(W, "p") else {
        return;
    };
    let has_run = p.child_elements().any(|e| e.is(W, "r"));
    if has_run {
        let mut first = true;
        for run in p.child_elements_mut().filter(|e| e.is(W, "r")) {
            run.children.retain(|n| n.is(W, "rPr"));
            if first {
                run.push(text_element(status));
                first = false;
            }
        }
    } else {
        p.push(text_run(
            status,
            RunStyle {
                bold: true,
                ..Default::default()
            },
        ));
    }
}

fn fill_row(row: &mut Element, level: RiskLevel, finding: &Finding) {
    let token = marker(level);
    let mut cells = row.child_elements_mut().filter(|e| e.is(W, "tc"));
    if let Some(first) = cells.next() {
        replace_everywhere(first, token, &finding.heading());
    }
    if let Some(status) = cells.next() {
        let content = plain_text(status);
        if content.trim().is_empty() || content.contains(token) {
            set_status(status, level.tag());
        }
    }
    for rest in cells {
        replace_everywhere(rest, token, "");
    }
}

/// Expand the marker rows of one table, last row first so earlier row
/// indices stay valid. Returns the number of rows written.
fn expand_table(table: &mut Element, report: &Report) -> usize {
    let mut written = 0;
    for idx in child_indices(table, "tr").into_iter().rev() {
        let Some(level) = table.children[idx].as_element().and_then(row_level) else {
            continue;
        };
        let findings: Vec<&Finding> = report.by_level(level).collect();
        if findings.is_empty() {
            if let Some(row) = table.children[idx].as_element_mut() {
                replace_everywhere(row, marker(level), NONE_MARKER);
            }
            continue;
        }
        let Node::Element(template) = table.children.remove(idx) else {
            continue;
        };
        for (k, finding) in findings.iter().enumerate() {
            let mut row = template.clone();
            fill_row(&mut row, level, finding);
            table.children.insert(idx + k, Node::Element(row));
        }
        log::debug!("Summary: {} {level} rows", findings.len());
        written += findings.len();
    }
    written
}

/// Expand every summary table in the body. Returns the number of rows written.
pub(crate) fn expand_summaries(body: &mut Element, report: &Report) -> usize {
    let mut written = 0;
    for table in body.child_elements_mut().filter(|e| e.is(W, "tbl")) {
        written += expand_table(table, report);
    }
    written
}
