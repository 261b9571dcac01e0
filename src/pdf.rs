//! Batch driver: walk the input directory and run each document through
//! extraction and reconciliation. One document is processed to completion
//! before the next begins; a bad document fails alone.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tracing::warn;

use crate::extract;
use crate::reconcile::{self, Outcome};
use crate::settings::Settings;

#[derive(Debug, Default)]
pub struct BatchCounts {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchCounts {
    pub fn print(&self) {
        println!(
            "Saved {} new, {} updated, {} skipped, {} failed.",
            self.inserted, self.updated, self.skipped, self.failed,
        );
    }
}

pub fn run_batch(conn: &Connection, settings: &Settings) -> Result<BatchCounts> {
    let files = list_documents(&settings.input_dir)?;
    let mut counts = BatchCounts::default();
    if files.is_empty() {
        println!("No PDF documents found in {:?}.", settings.input_dir);
        return Ok(counts);
    }

    println!("Processing {} documents...", files.len());
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap()
            .progress_chars("#>-"),
    );

    for path in &files {
        match process_document(conn, settings, path) {
            Ok(Outcome::Inserted) => counts.inserted += 1,
            Ok(Outcome::Updated) => counts.updated += 1,
            Ok(Outcome::Skipped) => counts.skipped += 1,
            Err(e) => {
                counts.failed += 1;
                warn!(file = %path.display(), error = %e, "document failed");
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(counts)
}

pub fn list_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read input directory {:?}", dir))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|x| x.to_str())
                .is_some_and(|x| x.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn process_document(conn: &Connection, settings: &Settings, path: &Path) -> Result<Outcome> {
    // An image-only PDF comes back as empty text, which still yields a
    // record; only an unreadable file fails here.
    let text = pdf_extract::extract_text(path)
        .with_context(|| format!("failed to read text layer of {:?}", path))?;
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .context("document has a non-UTF-8 file name")?;
    let record = extract::extract(&text, name);
    reconcile::reconcile(conn, settings, &record)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_only_pdfs_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt", "c.pdf.bak"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let files = list_documents(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }

    #[test]
    fn missing_input_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(list_documents(&missing).is_err());
    }
}
