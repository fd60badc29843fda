//! Filling a report template with findings.
//!
//! The passes run in a fixed order on one exclusively owned document tree:
//! section templates (last to first), summary rows, global tokens, and a final
//! scan for tokens nothing resolved.

mod images;
mod locate;
mod placeholder;
mod replicate;
mod summary;
mod text;

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use crate::assets::AssetResolver;
use crate::config::GenerateConfig;
use crate::docx::Package;
use crate::docx::body::{block_indices, rows};
use crate::docx::W;
use crate::error::Error;
use crate::model::{Finding, Report, RiskLevel};
use crate::xml::Element;

use placeholder::{LEFTOVER, TokenMap};

/// A condition generation recovered from. The output is still written.
#[derive(Clone, Debug, PartialEq)]
pub enum Warning {
    /// The section template was not where it was found; it is left as is.
    SectionSkipped { risk_level: RiskLevel, reason: String },
    /// No category keyword precedes the section; `assumed` was used.
    ClassificationFallback { block: usize, assumed: RiskLevel },
    MissingImage { finding: String, step: usize },
    UnreadableImage { path: PathBuf, reason: String },
    /// Token-shaped text left in the output.
    UnresolvedPlaceholder { token: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::SectionSkipped { risk_level, reason } => {
                write!(f, "{risk_level} section skipped: {reason}")
            }
            Warning::ClassificationFallback { block, assumed } => write!(
                f,
                "no risk level found before the section at block {block}, assumed {assumed}"
            ),
            Warning::MissingImage { finding, step } => {
                write!(f, "no image for {finding} step {step}")
            }
            Warning::UnreadableImage { path, reason } => {
                write!(f, "image {} skipped: {reason}", path.display())
            }
            Warning::UnresolvedPlaceholder { token } => {
                write!(f, "unresolved placeholder {token}")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionOutcome {
    pub risk_level: RiskLevel,
    pub classified: bool,
    pub instances: usize,
}

/// What one generation did.
#[derive(Clone, Debug, Default)]
pub struct GenerationReport {
    /// Section templates in document order.
    pub sections: Vec<SectionOutcome>,
    pub summary_rows: usize,
    pub images_inserted: usize,
    pub warnings: Vec<Warning>,
}

impl GenerationReport {
    pub fn unresolved_placeholders(&self) -> impl Iterator<Item = &str> {
        self.warnings.iter().filter_map(|w| match w {
            Warning::UnresolvedPlaceholder { token } => Some(token.as_str()),
            _ => None,
        })
    }
}

/// State shared by the passes of one generation.
pub(crate) struct Context<'a> {
    pub(crate) package: &'a mut Package,
    pub(crate) config: &'a GenerateConfig,
    pub(crate) resolver: &'a dyn AssetResolver,
    pub(crate) outcome: GenerationReport,
}

fn checked_body(package: &Package) -> Result<&Element, Error> {
    let body = package
        .body()
        .ok_or_else(|| Error::InvalidTemplate("document has no body".into()))?;
    if block_indices(body).is_empty() {
        return Err(Error::InvalidTemplate("document body is empty".into()));
    }
    Ok(body)
}

fn leftover_tokens(root: &Element, found: &mut BTreeSet<String>) {
    root.walk(&mut |e| {
        if e.is(W, "p") {
            let content = text::logical_text(e);
            for m in LEFTOVER.find_iter(&content) {
                found.insert(m.as_str().to_string());
            }
        }
    });
}

/// Run every pass over the package. Fails only when the template has no
/// usable body; everything else ends up in the returned warnings.
pub(crate) fn populate(
    package: &mut Package,
    report: &Report,
    config: &GenerateConfig,
    resolver: &dyn AssetResolver,
) -> Result<GenerationReport, Error> {
    let bindings = locate::locate_sections(checked_body(package)?);
    log::info!("Found {} section templates", bindings.len());

    let mut ctx = Context {
        package,
        config,
        resolver,
        outcome: GenerationReport::default(),
    };

    for binding in bindings.iter().filter(|b| !b.classified) {
        log::warn!(
            "No risk level keyword before the section at block {}, assuming {}",
            binding.table,
            binding.risk_level
        );
        ctx.outcome.warnings.push(Warning::ClassificationFallback {
            block: binding.table,
            assumed: binding.risk_level,
        });
    }

    let mut sections = Vec::with_capacity(bindings.len());
    for binding in bindings.iter().rev() {
        let findings: Vec<&Finding> = report.by_level(binding.risk_level).collect();
        let instances = replicate::replicate_section(&mut ctx, binding, &findings);
        sections.push(SectionOutcome {
            risk_level: binding.risk_level,
            classified: binding.classified,
            instances,
        });
    }
    sections.reverse();
    ctx.outcome.sections = sections;

    let Context {
        package,
        mut outcome,
        ..
    } = ctx;

    if let Some(body) = package.body_mut() {
        outcome.summary_rows = summary::expand_summaries(body, report);
    }

    let globals = TokenMap::globals(report);
    globals.apply(&mut package.document);
    for (_, part) in &mut package.side_parts {
        globals.apply(part);
    }

    let mut leftovers = BTreeSet::new();
    leftover_tokens(&package.document, &mut leftovers);
    for (_, part) in &package.side_parts {
        leftover_tokens(part, &mut leftovers);
    }
    for token in leftovers {
        log::warn!("Unresolved placeholder left in output: {token}");
        outcome
            .warnings
            .push(Warning::UnresolvedPlaceholder { token });
    }

    Ok(outcome)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionInfo {
    /// Child index of the table in the body.
    pub block: usize,
    pub risk_level: RiskLevel,
    pub classified: bool,
    pub heading: Option<String>,
}

/// The template structure generation would act on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplateOutline {
    pub sections: Vec<SectionInfo>,
    /// Summary marker rows, in document order.
    pub summary_rows: Vec<RiskLevel>,
    /// Every token-shaped string in the document, sorted.
    pub placeholders: Vec<String>,
}

pub(crate) fn outline(package: &Package) -> Result<TemplateOutline, Error> {
    let body = checked_body(package)?;

    let sections = locate::locate_sections(body)
        .into_iter()
        .map(|b| SectionInfo {
            block: b.table,
            risk_level: b.risk_level,
            classified: b.classified,
            heading: b
                .heading
                .and_then(|h| body.children[h].as_element())
                .map(text::logical_text),
        })
        .collect();

    let summary_rows = body
        .child_elements()
        .filter(|e| e.is(W, "tbl"))
        .flat_map(rows)
        .filter_map(summary::row_level)
        .collect();

    let mut placeholders = BTreeSet::new();
    leftover_tokens(&package.document, &mut placeholders);
    for (_, part) in &package.side_parts {
        leftover_tokens(part, &mut placeholders);
    }

    Ok(TemplateOutline {
        sections,
        summary_rows,
        placeholders: placeholders.into_iter().collect(),
    })
}
