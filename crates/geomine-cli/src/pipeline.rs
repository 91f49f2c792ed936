//! Batch pipeline: PDFs -> pages -> project spans -> coordinates -> JSONL

use std::path::Path;

use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;

use geomine_core::OutputRecord;
use geomine_extractor::{project_candidates, EntityTagger};
use geomine_parser::{list_pdfs, PdfTextExtractor};
use geomine_resolver::GeoResolver;

const PROGRESS_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Stderr bar over the PDF list; indicatif hides it when stderr is not a terminal
fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    match ProgressStyle::with_template(PROGRESS_TEMPLATE) {
        Ok(style) => bar.set_style(style.progress_chars("=> ")),
        Err(e) => tracing::debug!("Progress template rejected: {e}"),
    }
    bar
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineSummary {
    pub pdfs: usize,
    pub pages: usize,
    pub total_records: usize,
    pub resolved_records: usize,
}

impl PipelineSummary {
    /// Percentage of records with coordinates; 0 for an empty run
    pub fn success_rate(&self) -> f64 {
        if self.total_records == 0 {
            0.0
        } else {
            self.resolved_records as f64 / self.total_records as f64 * 100.0
        }
    }
}

pub struct Pipeline {
    extractor: PdfTextExtractor,
    tagger: Box<dyn EntityTagger>,
    resolver: GeoResolver,
    context_window: usize,
}

impl Pipeline {
    pub fn new(tagger: Box<dyn EntityTagger>, resolver: GeoResolver, context_window: usize) -> Self {
        Self {
            extractor: PdfTextExtractor::new(),
            tagger,
            resolver,
            context_window,
        }
    }

    /// Process every PDF in `pdf_dir` (file-name order) and stream one record
    /// per project mention to `output`. The output file is truncated first and
    /// each line is flushed as soon as it is written.
    pub async fn run(&self, pdf_dir: &Path, output: &Path) -> anyhow::Result<PipelineSummary> {
        if !pdf_dir.is_dir() {
            bail!("PDF directory not found: {}", pdf_dir.display());
        }
        let pdfs = list_pdfs(pdf_dir)
            .with_context(|| format!("failed to list PDFs in {}", pdf_dir.display()))?;
        tracing::info!("Found {} PDF files in {}", pdfs.len(), pdf_dir.display());

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut out = tokio::fs::File::create(output)
            .await
            .with_context(|| format!("failed to create {}", output.display()))?;

        let mut summary = PipelineSummary::default();
        let progress = progress_bar(pdfs.len());

        for path in &pdfs {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            summary.pdfs += 1;
            progress.set_message(file_name.clone());

            let pages = self.extractor.extract(path);
            tracing::info!("Processing {} ({} pages with text)", file_name, pages.len());

            for page in pages {
                summary.pages += 1;
                let candidates = match project_candidates(
                    self.tagger.as_ref(),
                    &page.text,
                    &file_name,
                    page.page_number,
                    self.context_window,
                ) {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::warn!(
                            "Tagging failed for {} page {}: {e}",
                            file_name,
                            page.page_number
                        );
                        continue;
                    }
                };

                for candidate in candidates {
                    tracing::debug!(
                        "Project '{}' on {} page {}",
                        candidate.name,
                        file_name,
                        page.page_number
                    );
                    let resolution = self
                        .resolver
                        .resolve(&candidate.context, Some(&candidate.name))
                        .await;
                    let record = OutputRecord::new(&candidate, resolution);

                    let mut line = record.to_json_line()?;
                    line.push('\n');
                    out.write_all(line.as_bytes())
                        .await
                        .with_context(|| format!("failed to write {}", output.display()))?;
                    out.flush().await?;

                    summary.total_records += 1;
                    if record.is_resolved() {
                        summary.resolved_records += 1;
                    }
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        tracing::info!(
            "Pipeline complete: {} records, {} with coordinates ({:.1}%), written to {}",
            summary.total_records,
            summary.resolved_records,
            summary.success_rate(),
            output.display()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar_counts_pdfs() {
        let bar = progress_bar(3);
        assert_eq!(bar.length(), Some(3));
        bar.inc(1);
        assert_eq!(bar.position(), 1);
        bar.finish_and_clear();
        assert!(bar.is_finished());
    }

    #[test]
    fn test_success_rate() {
        let empty = PipelineSummary::default();
        assert_eq!(empty.success_rate(), 0.0);

        let summary = PipelineSummary {
            pdfs: 2,
            pages: 5,
            total_records: 8,
            resolved_records: 6,
        };
        assert!((summary.success_rate() - 75.0).abs() < 1e-9);
    }
}
