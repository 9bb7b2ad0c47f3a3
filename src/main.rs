use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use log::info;

use passcan::{
    load_config, ExtractedPassportData, ExtractionPipeline, ExtractionReport, LocalCapability,
    ManualEntryForm, PipelineConfig, PipelineError,
};

#[derive(Parser)]
#[command(name = "passcan", version, about = "Extract passport fields from a scanned image")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON instead of the text report
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the recognition pipeline over a passport image
    Scan {
        /// Image file (PNG, JPEG, WebP or BMP)
        image: PathBuf,

        /// Skip the on-host engine even if this build supports it
        #[arg(long)]
        no_local: bool,

        /// Skip the remote OCR service
        #[arg(long)]
        no_remote: bool,

        /// API key for the remote OCR service
        #[arg(long)]
        api_key: Option<String>,

        /// Recognition language for both engines, e.g. "eng"
        #[arg(long)]
        language: Option<String>,
    },
    /// Record passport fields by hand, optionally seeded from a scan
    Manual {
        /// JSON file with previously extracted fields to pre-fill
        #[arg(long)]
        seed: Option<PathBuf>,

        #[command(flatten)]
        fields: ManualFields,
    },
}

#[derive(Args)]
struct ManualFields {
    #[arg(long)]
    passport_number: Option<String>,
    #[arg(long)]
    full_name: Option<String>,
    #[arg(long)]
    nationality: Option<String>,
    #[arg(long)]
    date_of_birth: Option<String>,
    #[arg(long)]
    expiry_date: Option<String>,
    #[arg(long)]
    issue_date: Option<String>,
    #[arg(long)]
    place_of_birth: Option<String>,
    #[arg(long)]
    sex: Option<String>,
    #[arg(long)]
    issuing_authority: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    emergency_contact_name: Option<String>,
    #[arg(long)]
    emergency_contact_relationship: Option<String>,
}

impl ManualFields {
    fn apply(&self, form: &mut ManualEntryForm) {
        if let Some(value) = &self.passport_number {
            form.passport_number = value.clone();
        }
        if let Some(value) = &self.full_name {
            form.full_name = value.clone();
        }
        if let Some(value) = &self.nationality {
            form.nationality = value.clone();
        }
        if let Some(value) = &self.date_of_birth {
            form.date_of_birth = value.clone();
        }
        if let Some(value) = &self.expiry_date {
            form.expiry_date = value.clone();
        }
        if let Some(value) = &self.issue_date {
            form.issue_date = value.clone();
        }
        if let Some(value) = &self.place_of_birth {
            form.place_of_birth = value.clone();
        }
        if let Some(value) = &self.sex {
            form.sex = value.clone();
        }
        if let Some(value) = &self.issuing_authority {
            form.issuing_authority = value.clone();
        }
        if let Some(value) = &self.address {
            form.address = value.clone();
        }
        if let Some(value) = &self.emergency_contact_name {
            form.emergency_contact_name = value.clone();
        }
        if let Some(value) = &self.emergency_contact_relationship {
            form.emergency_contact_relationship = value.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Command::Scan {
            image,
            no_local,
            no_remote,
            api_key,
            language,
        } => {
            if no_local {
                config.local.enabled = false;
            }
            if no_remote {
                config.remote.enabled = false;
            }
            if let Some(api_key) = api_key {
                config.remote.api_key = api_key;
            }
            if let Some(language) = language {
                config.local.language = language.clone();
                config.remote.language = language;
            }
            run_scan(&config, &image, cli.json).await
        }
        Command::Manual { seed, fields } => run_manual(seed.as_deref(), &fields, cli.json),
    }
}

async fn run_scan(config: &PipelineConfig, image_path: &Path, json: bool) -> anyhow::Result<()> {
    let image =
        fs::read(image_path).with_context(|| format!("reading {}", image_path.display()))?;
    let pipeline = ExtractionPipeline::new(config, LocalCapability::detect())?;
    info!(
        "scanning {} with {} engine(s)",
        image_path.display(),
        pipeline.engine_count()
    );

    let report = match pipeline.run(&image).await {
        Ok(report) => report,
        Err(PipelineError::AllEnginesFailed { attempted }) => {
            bail!(
                "no engine produced text ({} attempted); enter the fields with `passcan manual`",
                attempted
            )
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", report_json(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn run_manual(seed: Option<&Path>, fields: &ManualFields, json: bool) -> anyhow::Result<()> {
    let mut form = match seed {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let data: ExtractedPassportData = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", path.display()))?;
            ManualEntryForm::seeded(&data)
        }
        None => ManualEntryForm::new(),
    };
    fields.apply(&mut form);

    let data = match form.submit() {
        Ok(data) => data,
        Err(e) => bail!("{}", e),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("\nRECORDED FIELDS:");
        for (name, value) in data.fields() {
            if let Some(value) = value {
                println!("  {:<34}{}", format!("{}:", name.replace('_', " ")), value);
            }
        }
        println!("\n{} field(s) recorded.", data.filled_count());
    }
    Ok(())
}

fn print_report(report: &ExtractionReport) {
    println!("\n===============================================");
    println!("       PASSPORT FIELD EXTRACTION REPORT");
    println!("===============================================\n");

    println!("EXTRACTED FIELDS:");
    for (name, value) in report.data.fields() {
        println!(
            "  {:<34}{}",
            format!("{}:", name.replace('_', " ")),
            value.unwrap_or("-")
        );
    }

    println!("\nRECOGNITION ATTEMPTS:");
    for (index, attempt) in report.attempts.iter().enumerate() {
        let marker = if report.best_attempt == Some(index) {
            "  (best)"
        } else {
            ""
        };
        println!(
            "  {:<10} confidence {:>3}   {:>6} ms   {} chars{}",
            attempt.engine,
            attempt.confidence,
            attempt.elapsed.as_millis(),
            attempt.text.chars().count(),
            marker
        );
    }

    if report.suggests_manual_entry() {
        println!("\nNo fields could be extracted. Run `passcan manual` to enter them by hand.");
    }
}

fn report_json(report: &ExtractionReport) -> anyhow::Result<String> {
    let attempts: Vec<_> = report
        .attempts
        .iter()
        .enumerate()
        .map(|(index, attempt)| {
            serde_json::json!({
                "engine": attempt.engine,
                "confidence": attempt.confidence,
                "elapsed_ms": attempt.elapsed.as_millis() as u64,
                "characters": attempt.text.chars().count(),
                "best": report.best_attempt == Some(index),
            })
        })
        .collect();

    let value = serde_json::json!({
        "fields": report.data,
        "attempts": attempts,
        "manual_entry_suggested": report.suggests_manual_entry(),
    });
    Ok(serde_json::to_string_pretty(&value)?)
}
