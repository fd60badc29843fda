//! Token vocabulary and cell resolution.

use std::sync::LazyLock;

use regex::Regex;

use crate::docx::body::{RunStyle, for_each_paragraph_mut, is_text_box_content, text_run};
use crate::docx::{Package, R, W};
use crate::model::{Finding, Report, RiskLevel};
use crate::xml::Element;

use super::text;

pub(crate) const NOT_AVAILABLE: &str = "N/A";

/// Markers for the step sequence of a finding.
pub(crate) const STEPS_MARKERS: [&str; 2] = ["{{POC}}", "{{STEPS}}"];

/// Tokens that only make sense inside a finding section. Their presence near a
/// table marks it as a section template.
pub(crate) const HEADING_HINTS: [&str; 2] = ["VULN_ID", "{TITLE}}"];

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>]+").expect("valid URL pattern"));

/// Anything still shaped like a token after generation.
pub(crate) static LEFTOVER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{[^{}\n]+\}\}?|\{[^{}\n]+\}\}").expect("valid token pattern")
});

/// Matching order. Composite forms must win over the singles they contain and
/// malformed singles must only see what well-formed singles left behind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Priority {
    MalformedComposite,
    Composite,
    Single,
    MalformedSingle,
}

/// How a cell holding the token is rewritten.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FieldPolicy {
    /// Substitute inside the existing runs.
    InPlace,
    /// Replace the whole cell content with the value.
    ClearCell,
    /// Replace the whole cell content, linking every URL in the value.
    Hyperlinks,
}

#[derive(Clone, Debug)]
pub(crate) struct Substitution {
    pub(crate) token: &'static str,
    pub(crate) value: String,
    priority: Priority,
    pub(crate) policy: FieldPolicy,
}

/// Token → value pairs in matching order.
#[derive(Clone, Debug, Default)]
pub(crate) struct TokenMap {
    entries: Vec<Substitution>,
}

fn or_na(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

impl TokenMap {
    fn push(&mut self, token: &'static str, value: impl Into<String>, priority: Priority, policy: FieldPolicy) {
        self.entries.push(Substitution {
            token,
            value: value.into(),
            priority,
            policy,
        });
    }

    fn in_place(&mut self, token: &'static str, value: impl Into<String>) {
        self.push(token, value, Priority::Single, FieldPolicy::InPlace);
    }

    fn sorted(mut self) -> Self {
        self.entries.sort_by_key(|s| s.priority);
        self
    }

    pub(crate) fn for_finding(finding: &Finding) -> Self {
        let mut map = TokenMap::default();
        let heading = finding.heading();

        for token in ["{{VULN_ID}.{TITLE}}", "{{VULN_ID}}.{TITLE}}", "{{VULN_ID}.{{TITLE}}"] {
            map.push(token, heading.clone(), Priority::MalformedComposite, FieldPolicy::InPlace);
        }
        for token in ["{{VULN_ID}}. {{TITLE}}", "{{VULN_ID}}.{{TITLE}}"] {
            map.push(token, heading.clone(), Priority::Composite, FieldPolicy::InPlace);
        }

        let score = finding
            .score
            .map(|s| format!("{s:.1}"))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let recommendation = or_na(Some(&finding.recommendation));

        map.in_place("{{VULN_ID}}", finding.id.clone());
        map.in_place("{{TITLE}}", finding.title.clone());
        map.in_place("{{DESCRIPTION}}", finding.description.clone());
        map.in_place("{{RISK_LEVEL}}", finding.risk_level.name());
        map.in_place("{{RISK}}", finding.risk_level.name());
        map.in_place("{{CVSS_SCORE}}", score.clone());
        map.in_place("{{CVSS}}", score);
        map.in_place("{{AFFECTED_COMPONENTS}}", finding.affected_components.clone());
        map.in_place("{{AFFECTED}}", finding.affected_components.clone());
        map.in_place("{{CWE_ID}}", or_na(finding.cwe_id.as_deref()));
        map.in_place("{{REMEDIATION_EFFORT}}", or_na(finding.remediation_effort.as_deref()));
        map.push("{{RECOMMENDATION}}", recommendation.clone(), Priority::Single, FieldPolicy::ClearCell);
        map.push("{{REMEDIATION}}", recommendation, Priority::Single, FieldPolicy::ClearCell);
        map.push(
            "{{IMPACT}}",
            or_na(finding.impact.as_deref()),
            Priority::Single,
            FieldPolicy::ClearCell,
        );
        map.push(
            "{{REFERENCES}}",
            or_na(finding.references.as_deref()),
            Priority::Single,
            FieldPolicy::Hyperlinks,
        );

        map.push("{TITLE}}", finding.title.clone(), Priority::MalformedSingle, FieldPolicy::InPlace);
        map.push("{{VULN_ID}", finding.id.clone(), Priority::MalformedSingle, FieldPolicy::InPlace);
        map.sorted()
    }

    pub(crate) fn globals(report: &Report) -> Self {
        let mut map = TokenMap::default();
        map.in_place("{{REPORT_TITLE}}", report.title.clone());
        map.in_place("{{TOTAL_VULNS}}", report.total().to_string());
        for level in RiskLevel::ALL {
            let token = match level {
                RiskLevel::Critical => "{{CRITICAL_COUNT}}",
                RiskLevel::High => "{{HIGH_COUNT}}",
                RiskLevel::Medium => "{{MEDIUM_COUNT}}",
                RiskLevel::Low => "{{LOW_COUNT}}",
                RiskLevel::Informational => "{{INFO_COUNT}}",
            };
            map.in_place(token, report.count(level).to_string());
        }
        map.in_place("{{APP_URL}}", or_na(report.app_url.as_deref()));
        map
    }

    /// Substitute every token in one paragraph, in matching order.
    pub(crate) fn apply_to_paragraph(&self, p: &mut Element) {
        let mut touched = false;
        for sub in &self.entries {
            if text::logical_text(p).contains(sub.token) {
                touched |= text::replace(p, sub.token, &sub.value);
            }
        }
        if touched {
            text::split_line_breaks(p);
        }
    }

    /// Substitute in every paragraph under `el`, including tables and text boxes.
    pub(crate) fn apply(&self, el: &mut Element) {
        for_each_paragraph_mut(el, &mut |p| self.apply_to_paragraph(p));
    }
}

/// Logical text of the paragraphs a cell shows directly, text boxes excluded.
fn cell_text(cell: &Element) -> String {
    fn collect(el: &Element, out: &mut String) {
        for child in el.child_elements() {
            if child.is(W, "p") {
                out.push_str(&text::logical_text(child));
                out.push('\n');
            } else if !is_text_box_content(child) {
                collect(child, out);
            }
        }
    }
    let mut out = String::new();
    collect(cell, &mut out);
    out
}

/// Drop everything in the cell except its properties and leave one empty
/// paragraph that keeps the first paragraph's properties.
fn clear_cell(cell: &mut Element) -> Element {
    let ppr = cell
        .find_child(W, "p")
        .and_then(|p| p.find_child(W, "pPr"))
        .cloned();
    cell.children.retain(|n| n.is(W, "tcPr"));
    let mut p = Element::new(W, "p");
    if let Some(ppr) = ppr {
        p.push(ppr);
    }
    p
}

fn link_run(url: &str, font: Option<&str>) -> Element {
    text_run(
        url,
        RunStyle {
            font,
            color: Some("0000FF"),
            underline: true,
            ..Default::default()
        },
    )
}

/// One paragraph per non-empty line; URLs become external hyperlinks.
fn reference_paragraphs(template: &Element, value: &str, package: &mut Package, font: Option<&str>) -> Vec<Element> {
    let plain = RunStyle {
        font,
        ..Default::default()
    };
    let mut paragraphs = Vec::new();
    for line in value.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut p = template.clone();
        let mut last = 0;
        for m in URL.find_iter(line) {
            let url = m.as_str().trim_end_matches(['.', ',', ';', ')']);
            let before = &line[last..m.start()];
            if !before.is_empty() {
                p.push(text_run(before, plain));
            }
            let rid = package.add_hyperlink(url);
            p.push(
                Element::new(W, "hyperlink")
                    .with_attr(R, "id", rid)
                    .with_attr(W, "history", "1")
                    .with_child(link_run(url, font)),
            );
            last = m.start() + url.len();
        }
        let rest = &line[last..];
        if !rest.is_empty() {
            p.push(text_run(rest, plain));
        }
        paragraphs.push(p);
    }
    if paragraphs.is_empty() {
        paragraphs.push(template.clone());
    }
    paragraphs
}

/// Resolve the tokens of one table cell of a finding instance.
///
/// A cell holding a clear-cell or hyperlink token is rewritten wholesale with
/// that value; otherwise every token is substituted in place.
pub(crate) fn resolve_cell(cell: &mut Element, map: &TokenMap, package: &mut Package, font: Option<&str>) {
    let content = cell_text(cell);
    let whole_cell = map.entries.iter().find(|s| {
        content.contains(s.token)
            && match s.policy {
                FieldPolicy::InPlace => false,
                FieldPolicy::ClearCell => true,
                FieldPolicy::Hyperlinks => s.value != NOT_AVAILABLE,
            }
    });

    let Some(sub) = whole_cell else {
        map.apply(cell);
        return;
    };

    log::debug!("Rewriting cell for {}", sub.token);
    let template = clear_cell(cell);
    match sub.policy {
        FieldPolicy::Hyperlinks => {
            for p in reference_paragraphs(&template, &sub.value, package, font) {
                cell.push(p);
            }
        }
        _ => {
            let mut p = template;
            p.push(text_run(
                &sub.value,
                RunStyle {
                    font,
                    ..Default::default()
                },
            ));
            cell.push(p);
        }
    }
}
