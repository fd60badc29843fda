//! Block-level view of a WordprocessingML body.
//!
//! A body (or table cell, or text box) is an ordered list of child nodes of
//! which `w:p` and `w:tbl` are the blocks. Blocks are addressed by their index
//! in the parent's `children`; any structural edit invalidates indices taken
//! before it.

use crate::xml::{Element, Node, XML};

use super::{V, W};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BlockKind {
    Paragraph,
    Table,
}

pub(crate) fn block_kind(node: &Node) -> Option<BlockKind> {
    let el = node.as_element()?;
    if el.is(W, "p") {
        Some(BlockKind::Paragraph)
    } else if el.is(W, "tbl") {
        Some(BlockKind::Table)
    } else {
        None
    }
}

/// Child indices of `parent` that hold paragraphs or tables, in order.
pub(crate) fn block_indices(parent: &Element) -> Vec<usize> {
    parent
        .children
        .iter()
        .enumerate()
        .filter(|(_, n)| block_kind(n).is_some())
        .map(|(i, _)| i)
        .collect()
}

pub(crate) fn child_indices(parent: &Element, local: &str) -> Vec<usize> {
    parent
        .children
        .iter()
        .enumerate()
        .filter(|(_, n)| n.is(W, local))
        .map(|(i, _)| i)
        .collect()
}

pub(crate) fn rows(table: &Element) -> impl Iterator<Item = &Element> {
    table.child_elements().filter(|e| e.is(W, "tr"))
}

pub(crate) fn cells_mut(table: &mut Element) -> impl Iterator<Item = &mut Element> {
    table
        .child_elements_mut()
        .filter(|e| e.is(W, "tr"))
        .flat_map(|row| row.child_elements_mut().filter(|e| e.is(W, "tc")))
}

/// Text-box content (`w:txbxContent`) holds paragraphs of its own; they are
/// not part of the paragraph whose run anchors the shape.
pub(crate) fn is_text_box_content(el: &Element) -> bool {
    el.is(W, "txbxContent")
}

/// All `w:t` text under `el`, one line per paragraph.
pub(crate) fn plain_text(el: &Element) -> String {
    fn collect(el: &Element, out: &mut String) {
        for child in &el.children {
            let Node::Element(e) = child else { continue };
            if e.is(W, "t") {
                out.push_str(&e.text());
            } else {
                collect(e, out);
                if e.is(W, "p") {
                    out.push('\n');
                }
            }
        }
    }
    let mut out = String::new();
    collect(el, &mut out);
    out
}

/// Visit every paragraph under `el`, including paragraphs nested in tables
/// and text boxes. A paragraph is visited before anything nested inside it.
pub(crate) fn for_each_paragraph_mut(el: &mut Element, f: &mut impl FnMut(&mut Element)) {
    for child in el.child_elements_mut() {
        if child.is(W, "p") {
            f(child);
        }
        for_each_paragraph_mut(child, f);
    }
}

/// Floating text containers under `el`: DrawingML text boxes and legacy VML
/// ones. A shape written with `mc:AlternateContent` appears once per encoding.
pub(crate) fn text_box_paths(el: &Element) -> Vec<Vec<usize>> {
    fn search(el: &Element, path: &mut Vec<usize>, in_vml: bool, out: &mut Vec<(bool, Vec<usize>)>) {
        for (i, child) in el.children.iter().enumerate() {
            let Node::Element(e) = child else { continue };
            path.push(i);
            if is_text_box_content(e) {
                out.push((in_vml, path.clone()));
            } else {
                search(e, path, in_vml || e.is(V, "textbox"), out);
            }
            path.pop();
        }
    }
    let mut found = Vec::new();
    search(el, &mut Vec::new(), false, &mut found);
    let vml_count = found.iter().filter(|(vml, _)| *vml).count();
    log::debug!(
        "Found {} standard and {} legacy text boxes",
        found.len() - vml_count,
        vml_count
    );
    // Standard encodings first: they are the ones current Word renders.
    found.sort_by_key(|(vml, _)| *vml);
    found.into_iter().map(|(_, p)| p).collect()
}

pub(crate) fn element_at<'a>(el: &'a Element, path: &[usize]) -> Option<&'a Element> {
    match path.split_first() {
        None => Some(el),
        Some((first, rest)) => element_at(el.children.get(*first)?.as_element()?, rest),
    }
}

pub(crate) fn element_at_mut<'a>(el: &'a mut Element, path: &[usize]) -> Option<&'a mut Element> {
    match path.split_first() {
        None => Some(el),
        Some((first, rest)) => {
            element_at_mut(el.children.get_mut(*first)?.as_element_mut()?, rest)
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct RunStyle<'a> {
    pub(crate) bold: bool,
    pub(crate) font: Option<&'a str>,
    pub(crate) color: Option<&'a str>,
    pub(crate) underline: bool,
}

fn run_properties(style: RunStyle) -> Option<Element> {
    let mut rpr = Element::new(W, "rPr");
    if let Some(font) = style.font {
        rpr.push(
            Element::new(W, "rFonts")
                .with_attr(W, "ascii", font)
                .with_attr(W, "hAnsi", font)
                .with_attr(W, "cs", font),
        );
    }
    if style.bold {
        rpr.push(Element::new(W, "b"));
    }
    if let Some(color) = style.color {
        rpr.push(Element::new(W, "color").with_attr(W, "val", color));
    }
    if style.underline {
        rpr.push(Element::new(W, "u").with_attr(W, "val", "single"));
    }
    (!rpr.children.is_empty()).then_some(rpr)
}

pub(crate) fn text_element(text: &str) -> Element {
    Element::new(W, "t")
        .with_attr(XML, "space", "preserve")
        .with_text(text)
}

/// Append `text` to a run, turning line breaks into `w:br`.
pub(crate) fn append_text(run: &mut Element, text: &str) {
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            run.push(Element::new(W, "br"));
        }
        let line = line.strip_suffix('\r').unwrap_or(line);
        if !line.is_empty() {
            run.push(text_element(line));
        }
    }
}

pub(crate) fn text_run(text: &str, style: RunStyle) -> Element {
    let mut run = Element::new(W, "r");
    if let Some(rpr) = run_properties(style) {
        run.push(rpr);
    }
    append_text(&mut run, text);
    run
}

pub(crate) fn empty_paragraph() -> Element {
    Element::new(W, "p")
}

pub(crate) fn paragraph_with(run: Element) -> Element {
    Element::new(W, "p").with_child(run)
}
