//! GeoMine CLI
//!
//! Usage:
//!   geomine run --pdf-dir <dir> --ner-model <path> --gazetteer <csv> --output <jsonl> --gemini-key <key>
//!   geomine train --annotations <json> --output <dir>

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use geomine_cli::{init_logging, Pipeline, PipelineSummary};
use geomine_core::{AppConfig, Gazetteer};
use geomine_extractor::training::train_and_save;
use geomine_extractor::{load_tagger, TrainingOptions};
use geomine_resolver::{create_llm_client, GenerativeGeocoder, GeoResolver};
use geomine_vector::create_embedding_client;

#[derive(Parser)]
#[command(name = "geomine")]
#[command(about = "Extract mining projects from PDF reports and geolocate them")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the extraction and geolocation pipeline
    Run {
        /// Directory containing PDF reports
        #[arg(long)]
        pdf_dir: PathBuf,
        /// Trained tagger (model.json, or a model directory)
        #[arg(long)]
        ner_model: PathBuf,
        /// Gazetteer CSV with place_name, latitude, longitude
        #[arg(long)]
        gazetteer: PathBuf,
        /// Output JSONL file
        #[arg(long)]
        output: PathBuf,
        /// Gemini API key
        #[arg(long)]
        gemini_key: String,
    },
    /// Train a tagger from a Label Studio export
    Train {
        /// Label Studio JSON export
        #[arg(long)]
        annotations: PathBuf,
        /// Directory to write the model into
        #[arg(long)]
        output: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_logging(&config.logging)?;
    config.validate().context("invalid configuration")?;

    match cli.command {
        Commands::Run {
            pdf_dir,
            ner_model,
            gazetteer,
            output,
            gemini_key,
        } => {
            let summary =
                run_pipeline(config, &pdf_dir, &ner_model, &gazetteer, &output, gemini_key).await?;
            print_summary(&summary, &output);
        }
        Commands::Train {
            annotations,
            output,
        } => {
            let report = train_and_save(&annotations, &output, &TrainingOptions::default())
                .with_context(|| format!("training from {} failed", annotations.display()))?;
            println!("Model trained and saved to {}", report.model_path.display());
            println!(
                "Documents: {} | PROJECT spans: {} (dropped {}) | phrases: {} | cue words: {}",
                report.documents,
                report.spans,
                report.dropped_spans,
                report.phrases,
                report.cue_words
            );
            println!("Training set (exact spans): {}", report.metrics.report());
            println!("Training set (span text): {}", report.text_metrics.report());
        }
    }

    Ok(())
}

async fn run_pipeline(
    mut config: AppConfig,
    pdf_dir: &Path,
    ner_model: &Path,
    gazetteer_path: &Path,
    output: &Path,
    gemini_key: String,
) -> anyhow::Result<PipelineSummary> {
    if !pdf_dir.is_dir() {
        bail!("PDF directory not found: {}", pdf_dir.display());
    }
    config.llm.api_key = Some(gemini_key);

    let tagger = load_tagger(ner_model)
        .with_context(|| format!("failed to load tagger from {}", ner_model.display()))?;
    tracing::info!("Tagger '{}' loaded from {}", tagger.name(), ner_model.display());

    let gazetteer = Gazetteer::from_path(gazetteer_path)
        .with_context(|| format!("failed to load gazetteer {}", gazetteer_path.display()))?;
    tracing::info!("Gazetteer loaded: {} entries", gazetteer.len());

    let embedder = create_embedding_client(&config.embedding).with_context(|| {
        format!(
            "failed to create {:?} embedding backend (model dir {})",
            config.embedding.provider,
            config.embedding.onnx_model_dir.display()
        )
    })?;
    let llm = create_llm_client(&config.llm)?;
    let geocoder = GenerativeGeocoder::new(llm, config.resolver.bounding_box);
    let resolver = GeoResolver::build(gazetteer, embedder, geocoder, &config.resolver)
        .await
        .context("failed to index gazetteer names")?;

    Pipeline::new(tagger, resolver, config.tagger.context_window)
        .run(pdf_dir, output)
        .await
}

fn print_summary(summary: &PipelineSummary, output: &Path) {
    println!("Pipeline complete!");
    println!("PDFs processed: {}", summary.pdfs);
    println!("Total records: {}", summary.total_records);
    println!("Records with coordinates: {}", summary.resolved_records);
    println!("Success rate: {:.1}%", summary.success_rate());
    println!("Output saved to: {}", output.display());
}
