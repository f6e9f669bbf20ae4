use crate::response::HistogramResponse;
use crate::runner::QueryOutcome;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Final report written at the end of a run
#[derive(Debug, Serialize, Deserialize)]
pub struct FinalReport {
    pub metadata: ReportMetadata,
    pub facets: BTreeMap<String, HistogramResponse>,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub query_id: String,
    pub partitions: usize,
    pub documents: u64,
    pub threads: usize,
}

/// Results manager collecting facet responses and writing the report
pub struct ResultsManager {
    output_file: Option<PathBuf>,
    threads: usize,
    query_id: Option<String>,
    partitions: usize,
    documents: u64,
    facets: BTreeMap<String, HistogramResponse>,
}

impl ResultsManager {
    /// Create a new results manager. Without an output file the report goes
    /// to standard output.
    pub fn new(output_file: Option<&Path>, threads: usize) -> Self {
        Self {
            output_file: output_file.map(Path::to_path_buf),
            threads,
            query_id: None,
            partitions: 0,
            documents: 0,
            facets: BTreeMap::new(),
        }
    }

    /// Add the outcome of one facet query under `name`
    pub fn add_facet(&mut self, name: &str, outcome: &QueryOutcome) {
        info!("Adding results for facet [{}]", name);
        self.query_id = Some(outcome.query_id.clone());
        self.partitions = self.partitions.max(outcome.partitions);
        self.documents = self.documents.max(outcome.documents);
        self.facets
            .insert(name.to_string(), HistogramResponse::from(&outcome.histogram));
    }

    pub fn facet(&self, name: &str) -> Option<&HistogramResponse> {
        self.facets.get(name)
    }

    /// Build the report envelope
    pub fn report(&self) -> FinalReport {
        FinalReport {
            metadata: ReportMetadata {
                version: crate::VERSION.to_string(),
                timestamp: chrono::Utc::now(),
                query_id: self.query_id.clone().unwrap_or_default(),
                partitions: self.partitions,
                documents: self.documents,
                threads: self.threads,
            },
            facets: self.facets.clone(),
        }
    }

    /// Write the report to its destination
    pub fn finalize(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.report())
            .context("Failed to serialize histogram report")?;

        match &self.output_file {
            Some(path) => {
                std::fs::write(path, &json)
                    .with_context(|| format!("Failed to write report to {:?}", path))?;
                info!("Results written to: {:?}", path);
            }
            None => {
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                writeln!(handle, "{}", json)?;
                handle.flush()?;
                debug!("Results written to stdout");
            }
        }
        Ok(())
    }
}
