//! Paragraph text that may be split across several runs.
//!
//! Word splits text into runs wherever formatting, spell-check state or edit
//! history changes, so a token typed as `{{TITLE}}` can end up as `{{TI` +
//! `TLE}}`. The logical text of a paragraph is the concatenation of its
//! `w:t` elements; text boxes anchored in the paragraph are excluded since
//! their paragraphs are visited on their own.

use crate::docx::W;
use crate::docx::body::{append_text, element_at, element_at_mut, is_text_box_content};
use crate::xml::{Element, Node, XML};

/// Child-index paths from the paragraph to each of its `w:t` elements.
fn text_slots(p: &Element) -> Vec<Vec<usize>> {
    fn search(el: &Element, path: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        for (i, child) in el.children.iter().enumerate() {
            let Node::Element(e) = child else { continue };
            if is_text_box_content(e) || e.is(W, "p") {
                continue;
            }
            path.push(i);
            if e.is(W, "t") {
                out.push(path.clone());
            } else {
                search(e, path, out);
            }
            path.pop();
        }
    }
    let mut out = Vec::new();
    search(p, &mut Vec::new(), &mut out);
    out
}

pub(crate) fn logical_text(p: &Element) -> String {
    text_slots(p)
        .iter()
        .filter_map(|path| element_at(p, path))
        .map(|t| t.text())
        .collect()
}

fn write_slot(p: &mut Element, path: &[usize], text: String) {
    if let Some(t) = element_at_mut(p, path) {
        t.set_attr(XML, "space", "preserve");
        t.set_text(text);
    }
}

/// Replace every occurrence of `token` in the paragraph's logical text.
///
/// Occurrences inside a single `w:t` are replaced in place, which keeps every
/// run's formatting. Occurrences that straddle runs are resolved by writing
/// the whole post-substitution text into the first `w:t` and emptying the rest;
/// the first run's formatting then applies to the whole paragraph.
pub(crate) fn replace(p: &mut Element, token: &str, value: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    let slots = text_slots(p);
    let mut changed = false;

    for path in &slots {
        let Some(t) = element_at(p, path) else { continue };
        let text = t.text();
        if text.contains(token) {
            write_slot(p, path, text.replace(token, value));
            changed = true;
        }
    }

    if slots.len() > 1 {
        let full: String = slots
            .iter()
            .filter_map(|path| element_at(p, path))
            .map(|t| t.text())
            .collect();
        if full.contains(token) {
            log::debug!(
                "Token '{token}' split across {} text elements, consolidating",
                slots.len()
            );
            write_slot(p, &slots[0], full.replace(token, value));
            for path in &slots[1..] {
                write_slot(p, path, String::new());
            }
            changed = true;
        }
    }
    changed
}

/// Turn `\n` inside `w:t` text into `w:br` siblings within the same run.
pub(crate) fn split_line_breaks(p: &mut Element) {
    fn visit(el: &mut Element) {
        for child in el.child_elements_mut() {
            if is_text_box_content(child) || child.is(W, "p") {
                continue;
            }
            if child.is(W, "r") {
                split_run(child);
            } else {
                visit(child);
            }
        }
    }
    visit(p);
}

fn split_run(run: &mut Element) {
    let needs_split = run
        .child_elements()
        .any(|e| e.is(W, "t") && e.text().contains('\n'));
    if !needs_split {
        return;
    }
    let old = std::mem::take(&mut run.children);
    for node in old {
        match node {
            Node::Element(t) if t.is(W, "t") && t.text().contains('\n') => {
                append_text(run, &t.text());
            }
            other => run.children.push(other),
        }
    }
}

/// Remove every run from the paragraph, keeping paragraph properties.
pub(crate) fn clear_runs(p: &mut Element) {
    p.children
        .retain(|n| n.as_element().is_none_or(|e| e.is(W, "pPr")));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::body::{RunStyle, text_run};

    fn paragraph(parts: &[&str]) -> Element {
        let mut p = Element::new(W, "p");
        for (i, part) in parts.iter().enumerate() {
            p.push(text_run(
                part,
                RunStyle {
                    bold: i == 0,
                    ..Default::default()
                },
            ));
        }
        p
    }

    #[test]
    fn split_token_matches_single_run_result() {
        let mut whole = paragraph(&["Risk: {{RISK}} rated"]);
        let mut split = paragraph(&["Risk: {{RI", "S", "K}} rated"]);
        assert!(replace(&mut whole, "{{RISK}}", "High"));
        assert!(replace(&mut split, "{{RISK}}", "High"));
        assert_eq!(logical_text(&whole), "Risk: High rated");
        assert_eq!(logical_text(&split), logical_text(&whole));
    }

    #[test]
    fn consolidation_keeps_first_run_formatting() {
        let mut p = paragraph(&["{{REC", "OMMEN", "DATION}}"]);
        replace(&mut p, "{{RECOMMENDATION}}", "Patch now");
        let runs: Vec<&Element> = p.child_elements().collect();
        assert!(runs[0].find_child(W, "rPr").unwrap().find_child(W, "b").is_some());
        assert_eq!(runs[0].find_child(W, "t").unwrap().text(), "Patch now");
        assert_eq!(runs[1].find_child(W, "t").unwrap().text(), "");
        assert_eq!(runs[2].find_child(W, "t").unwrap().text(), "");
    }

    #[test]
    fn token_inside_one_run_leaves_neighbours_alone() {
        let mut p = paragraph(&["Intro ", "{{TITLE}}", " tail"]);
        replace(&mut p, "{{TITLE}}", "SQL injection");
        let texts: Vec<String> = p
            .child_elements()
            .map(|r| r.find_child(W, "t").unwrap().text())
            .collect();
        assert_eq!(texts, vec!["Intro ", "SQL injection", " tail"]);
    }

    #[test]
    fn line_breaks_become_br() {
        let mut p = paragraph(&["{{DESCRIPTION}}"]);
        replace(&mut p, "{{DESCRIPTION}}", "first\nsecond");
        split_line_breaks(&mut p);
        let run = p.child_elements().next().unwrap();
        let names: Vec<&str> = run
            .child_elements()
            .filter(|e| !e.is(W, "rPr"))
            .map(|e| e.local_name())
            .collect();
        assert_eq!(names, vec!["t", "br", "t"]);
        assert_eq!(logical_text(&p), "firstsecond");
    }
}
