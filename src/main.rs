use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use docxide_report::{GenerateConfig, Report, assets};

#[derive(Parser)]
#[command(name = "docxide-report")]
#[command(about = "Populate DOCX report templates with findings")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill a template with the findings from a JSON file
    Generate {
        /// Template DOCX
        template: PathBuf,
        /// Findings JSON ({"title": ..., "findings": [...]})
        findings: PathBuf,
        /// Output DOCX
        #[arg(short, long)]
        output: PathBuf,
        /// Folder with one asset folder per finding (or a folder containing one)
        #[arg(long, value_name = "DIR")]
        assets: Option<PathBuf>,
        /// Report title, overriding the one in the findings file
        #[arg(long)]
        title: Option<String>,
        /// Application URL for {{APP_URL}}
        #[arg(long, value_name = "URL")]
        app_url: Option<String>,
    },
    /// List the sections, summary rows and placeholders a template contains
    Inspect {
        /// Template DOCX
        template: PathBuf,
    },
}

fn run(cli: Cli) -> Result<(), docxide_report::Error> {
    match cli.command {
        Commands::Generate {
            template,
            findings,
            output,
            assets: asset_dir,
            title,
            app_url,
        } => {
            let mut report = Report::load_json(&findings)?;
            if let Some(title) = title {
                report.title = title;
            }
            if app_url.is_some() {
                report.app_url = app_url;
            }

            let mut config = GenerateConfig::default();
            if let Some(dir) = asset_dir {
                let base = assets::discover_base(&dir).unwrap_or(dir);
                log::info!("Using assets from {}", base.display());
                config = config.with_asset_base(base);
            }

            let outcome = docxide_report::generate_report(&template, &report, &output, &config)?;
            for warning in &outcome.warnings {
                log::warn!("{warning}");
            }
            let instances: usize = outcome.sections.iter().map(|s| s.instances).sum();
            println!(
                "Wrote {} ({} findings, {} section instances, {} summary rows, {} images, {} warnings)",
                output.display(),
                report.total(),
                instances,
                outcome.summary_rows,
                outcome.images_inserted,
                outcome.warnings.len()
            );
        }
        Commands::Inspect { template } => {
            let bytes = std::fs::read(&template)?;
            let outline =
                docxide_report::inspect_template(&bytes, &GenerateConfig::default())?;
            println!("Sections:");
            for section in &outline.sections {
                println!(
                    "  block {:>3}  {:<13}{}  {}",
                    section.block,
                    section.risk_level.name(),
                    if section.classified { "" } else { " (default)" },
                    section.heading.as_deref().unwrap_or("-")
                );
            }
            println!("Summary rows:");
            for level in &outline.summary_rows {
                println!("  {level}");
            }
            println!("Placeholders:");
            for token in &outline.placeholders {
                println!("  {token}");
            }
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
