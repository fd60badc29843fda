pub mod assets;
mod config;
mod docx;
mod error;
mod model;
mod template;
mod xml;

pub use assets::{AssetResolver, DirectoryAssets};
pub use config::{GenerateConfig, ImageSize};
pub use error::Error;
pub use model::{Finding, Report, RiskLevel};
pub use template::{
    GenerationReport, SectionInfo, SectionOutcome, TemplateOutline, Warning,
};

use std::path::Path;
use std::time::Instant;

use docx::Package;

/// Fill the template at `template` with `report` and write the result to
/// `output`. Nothing is written unless the whole document was produced.
pub fn generate_report(
    template: &Path,
    report: &Report,
    output: &Path,
    config: &GenerateConfig,
) -> Result<GenerationReport, Error> {
    check_size(std::fs::metadata(template)?.len(), config.max_template_bytes)?;
    let input = std::fs::read(template)?;
    let (bytes, outcome) = generate_report_bytes(&input, report, config)?;
    std::fs::write(output, &bytes)?;
    Ok(outcome)
}

/// In-memory variant of [`generate_report`] using [`DirectoryAssets`].
pub fn generate_report_bytes(
    template: &[u8],
    report: &Report,
    config: &GenerateConfig,
) -> Result<(Vec<u8>, GenerationReport), Error> {
    generate_with_resolver(template, report, config, &DirectoryAssets)
}

pub fn generate_with_resolver(
    template: &[u8],
    report: &Report,
    config: &GenerateConfig,
    resolver: &dyn AssetResolver,
) -> Result<(Vec<u8>, GenerationReport), Error> {
    check_size(template.len() as u64, config.max_template_bytes)?;
    let t0 = Instant::now();

    let mut package = Package::from_bytes(template)?;
    let t_parse = t0.elapsed();

    let outcome = template::populate(&mut package, report, config, resolver)?;
    let t_populate = t0.elapsed();

    let bytes = package.to_bytes()?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: parse={:.1}ms, populate={:.1}ms, write={:.1}ms, total={:.1}ms (output {} bytes, {} warnings)",
        t_parse.as_secs_f64() * 1000.0,
        (t_populate - t_parse).as_secs_f64() * 1000.0,
        (t_total - t_populate).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        bytes.len(),
        outcome.warnings.len(),
    );

    Ok((bytes, outcome))
}

/// Describe the sections, summary rows and tokens of a template.
pub fn inspect_template(
    template: &[u8],
    config: &GenerateConfig,
) -> Result<TemplateOutline, Error> {
    check_size(template.len() as u64, config.max_template_bytes)?;
    let package = Package::from_bytes(template)?;
    template::outline(&package)
}

fn check_size(size: u64, limit: u64) -> Result<(), Error> {
    if size > limit {
        return Err(Error::TemplateTooLarge { size, limit });
    }
    Ok(())
}
