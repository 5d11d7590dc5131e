use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use streamscout_core::{classify, LogEntry, RegistrySnapshot, UrlMarkers, UrlRegistry};

use crate::{AppError, Result};

/// Classifies a captured telemetry dump offline.
#[derive(Args, Debug, Clone)]
pub struct ClassifyArgs {
    /// JSON-lines file; each line is a log entry object or a raw performance-log payload
    pub file: PathBuf,

    /// Also apply the manifest rule
    #[arg(long)]
    pub manifest: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyReport {
    pub entries: usize,
    pub skipped: usize,
    pub registry: RegistrySnapshot,
}

pub fn execute(markers: &UrlMarkers, args: &ClassifyArgs) -> Result<ClassifyReport> {
    let file = File::open(&args.file).map_err(|source| AppError::Dump {
        path: args.file.clone(),
        source,
    })?;
    classify_lines(BufReader::new(file), markers, args.manifest)
}

pub fn classify_lines<R: BufRead>(
    reader: R,
    markers: &UrlMarkers,
    search_for_manifest: bool,
) -> Result<ClassifyReport> {
    let mut registry = UrlRegistry::new();
    let mut entries = 0;
    let mut skipped = 0;
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        entries += 1;
        let entry = serde_json::from_str::<LogEntry>(line).unwrap_or_else(|_| LogEntry::new(line));
        match classify(&entry, markers, search_for_manifest) {
            Some((category, url)) => {
                registry.record(category, &url);
            }
            None => skipped += 1,
        }
    }
    Ok(ClassifyReport {
        entries,
        skipped,
        registry: registry.snapshot(),
    })
}
