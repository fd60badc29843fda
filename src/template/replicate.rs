//! Expanding one section template into one heading+table pair per finding.

use crate::docx::W;
use crate::docx::body::{cells_mut, empty_paragraph};
use crate::model::Finding;
use crate::xml::{Element, Node};

use super::images;
use super::locate::SectionBinding;
use super::placeholder::{TokenMap, resolve_cell};
use super::{Context, Warning};

/// Why a binding no longer matches the body it was taken from.
fn stale_reason(body: &Element, binding: &SectionBinding) -> Option<String> {
    if !body.children.get(binding.table).is_some_and(|n| n.is(W, "tbl")) {
        return Some(format!("no table at block {}", binding.table));
    }
    if let Some(h) = binding.heading
        && !body.children.get(h).is_some_and(|n| n.is(W, "p"))
    {
        return Some(format!("no heading paragraph at block {h}"));
    }
    None
}

fn fill_heading(heading: &mut Element, map: &TokenMap) {
    map.apply_to_paragraph(heading);
    map.apply(heading);
}

fn fill_table(table: &mut Element, finding: &Finding, map: &TokenMap, ctx: &mut Context) {
    let config = ctx.config;
    let font = config.value_font.as_deref();
    for cell in cells_mut(table) {
        resolve_cell(cell, map, ctx.package, font);
        if images::has_steps_marker(cell) {
            images::insert_steps(cell, finding, ctx);
        }
    }
}

fn insert_block(ctx: &mut Context, cursor: &mut usize, block: Element) {
    if let Some(body) = ctx.package.body_mut() {
        body.children.insert(*cursor, Node::Element(block));
        *cursor += 1;
    }
}

/// Replace the template at `binding` with one instance per finding and return
/// the number of instances written.
///
/// Bindings must be processed from last to first: every edit here happens at or
/// after the binding's position, so earlier bindings stay valid.
pub(crate) fn replicate_section(
    ctx: &mut Context,
    binding: &SectionBinding,
    findings: &[&Finding],
) -> usize {
    let Some(body) = ctx.package.body_mut() else {
        return 0;
    };
    if let Some(reason) = stale_reason(body, binding) {
        log::warn!("Skipping {} section: {reason}", binding.risk_level);
        ctx.outcome.warnings.push(Warning::SectionSkipped {
            risk_level: binding.risk_level,
            reason,
        });
        return 0;
    }

    let table = match body.children.remove(binding.table) {
        Node::Element(e) => e,
        Node::Text(_) => return 0,
    };
    let heading = binding
        .heading
        .and_then(|h| match body.children.remove(h) {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        });

    if findings.is_empty() {
        log::info!("No {} findings, removed section template", binding.risk_level);
        return 0;
    }

    let mut cursor = binding.position();
    for (i, finding) in findings.iter().enumerate() {
        let map = TokenMap::for_finding(finding);
        if let Some(template) = &heading {
            let mut instance = template.clone();
            fill_heading(&mut instance, &map);
            insert_block(ctx, &mut cursor, instance);
        }

        let mut instance = table.clone();
        fill_table(&mut instance, finding, &map, ctx);
        insert_block(ctx, &mut cursor, instance);

        if i + 1 < findings.len() {
            insert_block(ctx, &mut cursor, empty_paragraph());
        }
    }

    log::info!(
        "Expanded {} section into {} instances",
        binding.risk_level,
        findings.len()
    );
    findings.len()
}
