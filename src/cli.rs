use crate::config::FacetRequest;
use crate::runner::RunnerOptions;
use crate::source::{Document, Partition};
use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Decimal Histogram - bucket numeric document fields across partitions
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Newline-delimited JSON input files, one partition per file
    #[clap(required = true, num_args = 1.., help_heading = "Input")]
    pub inputs: Vec<PathBuf>,

    /// Re-split all input documents round-robin into this many partitions
    #[clap(short = 'p', long, help_heading = "Input")]
    pub partitions: Option<usize>,

    /// JSON facet request file; flags below override its fields
    #[clap(short = 'r', long, help_heading = "Request")]
    pub request: Option<PathBuf>,

    /// Facet name used in the report
    #[clap(short = 'n', long, default_value = crate::defaults::FACET_NAME, help_heading = "Request")]
    pub name: String,

    /// Numeric field used as both bucket value and weight
    #[clap(short = 'f', long, help_heading = "Request")]
    pub field: Option<String>,

    /// Numeric field that selects the bucket
    #[clap(long, help_heading = "Request")]
    pub key_field: Option<String>,

    /// Numeric field accumulated into the bucket
    #[clap(long, help_heading = "Request")]
    pub value_field: Option<String>,

    /// Bucket width in interval mode
    #[clap(short = 'i', long, help_heading = "Request")]
    pub interval: Option<f64>,

    /// Value shift applied before bucketing in interval mode
    #[clap(long, allow_negative_numbers = true, help_heading = "Request")]
    pub offset: Option<f64>,

    /// Number of buckets; selects fixed-range mode
    #[clap(long, help_heading = "Request")]
    pub nbins: Option<i32>,

    /// Lower bound of the fixed range
    #[clap(long, allow_negative_numbers = true, help_heading = "Request")]
    pub xmin: Option<f64>,

    /// Upper bound of the fixed range
    #[clap(long, allow_negative_numbers = true, help_heading = "Request")]
    pub xmax: Option<f64>,

    /// Entry order: key, reverse_key, count, reverse_count, total, reverse_total
    #[clap(long, help_heading = "Request")]
    pub order: Option<String>,

    /// Worker threads (defaults to the number of CPU cores)
    #[clap(short = 't', long)]
    pub threads: Option<usize>,

    /// Maximum number of accumulators leased at once
    #[clap(long)]
    pub pool_capacity: Option<usize>,

    /// Reduce partial results in-process instead of through the wire codec
    #[clap(long, default_value_t = false)]
    pub no_transport: bool,

    /// Output file for the report (JSON); standard output when omitted
    #[clap(short = 'o', long)]
    pub output_file: Option<PathBuf>,

    /// Verbose output
    #[clap(short = 'v', long, default_value_t = false)]
    pub verbose: bool,

    /// Also write logs to this file
    #[clap(long)]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Worker thread count after applying the default.
    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(crate::utils::get_cpu_cores)
    }

    /// Build the facet request from the request file (if any) and the flags.
    pub fn build_request(&self) -> Result<FacetRequest> {
        let mut request = match &self.request {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read request file {:?}", path))?;
                FacetRequest::from_json(&json)?
            }
            None => FacetRequest::default(),
        };

        if self.field.is_some() {
            request.field = self.field.clone();
        }
        if self.key_field.is_some() {
            request.key_field = self.key_field.clone();
        }
        if self.value_field.is_some() {
            request.value_field = self.value_field.clone();
        }
        if let Some(interval) = self.interval {
            request.interval = interval;
        }
        if let Some(offset) = self.offset {
            request.offset = offset;
        }
        if let Some(nbins) = self.nbins {
            request.nbin = nbins;
        }
        if let Some(xmin) = self.xmin {
            request.xmin = xmin;
        }
        if let Some(xmax) = self.xmax {
            request.xmax = xmax;
        }
        if let Some(order) = &self.order {
            request.order = order.clone();
        }

        debug!("Facet request: {:?}", request);
        Ok(request)
    }

    /// Load the input files as partitions.
    pub fn load_partitions(&self) -> Result<Vec<Partition>> {
        let mut per_file = Vec::with_capacity(self.inputs.len());
        for path in &self.inputs {
            let documents = read_ndjson(path)?;
            info!("Loaded {} documents from {:?}", documents.len(), path);
            per_file.push(documents);
        }

        Ok(match self.partitions {
            Some(count) => split_round_robin(per_file.into_iter().flatten(), count)?,
            None => per_file
                .into_iter()
                .enumerate()
                .map(|(id, documents)| Partition::new(id, documents))
                .collect(),
        })
    }
}

impl From<&Args> for RunnerOptions {
    fn from(args: &Args) -> Self {
        let threads = args.thread_count();
        Self {
            threads,
            pool_capacity: args
                .pool_capacity
                .unwrap_or_else(|| crate::defaults::POOL_CAPACITY.max(threads)),
            transport: !args.no_transport,
        }
    }
}

/// Read newline-delimited JSON objects. Blank lines are ignored.
pub fn read_ndjson(path: &Path) -> Result<Vec<Document>> {
    let file = File::open(path).with_context(|| format!("Failed to open input {:?}", path))?;
    parse_ndjson(BufReader::new(file)).with_context(|| format!("Failed to parse input {:?}", path))
}

/// Parse newline-delimited JSON objects from `reader`.
pub fn parse_ndjson<R: BufRead>(reader: R) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(&line)
            .with_context(|| format!("Invalid JSON on line {}", index + 1))?
        {
            Value::Object(document) => documents.push(document),
            other => anyhow::bail!(
                "Line {} is not a JSON object (found {})",
                index + 1,
                json_kind(&other)
            ),
        }
    }
    Ok(documents)
}

/// Deal documents into `count` partitions in turn.
pub fn split_round_robin<I>(documents: I, count: usize) -> Result<Vec<Partition>>
where
    I: IntoIterator<Item = Document>,
{
    if count == 0 {
        anyhow::bail!("Partition count cannot be zero");
    }
    let mut buckets: Vec<Vec<Document>> = vec![Vec::new(); count];
    for (index, document) in documents.into_iter().enumerate() {
        buckets[index % count].push(document);
    }
    Ok(buckets
        .into_iter()
        .enumerate()
        .map(|(id, documents)| Partition::new(id, documents))
        .collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("decimal-histogram").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_build_request() {
        let args = parse(&[
            "data.ndjson",
            "--field",
            "price",
            "--nbins",
            "4",
            "--xmin",
            "-2",
            "--xmax",
            "2",
            "--order",
            "reverse_total",
        ]);
        let request = args.build_request().unwrap();
        assert_eq!(request.field.as_deref(), Some("price"));
        assert_eq!(request.nbin, 4);
        assert_eq!(request.xmin, -2.0);
        assert_eq!(request.order, "reverse_total");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_flags_override_request_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"field": "a", "interval": 5, "comparator": "count"}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = parse(&["data.ndjson", "--request", path.as_str(), "--interval", "0.5"]);
        let request = args.build_request().unwrap();
        assert_eq!(request.field.as_deref(), Some("a"));
        assert_eq!(request.interval, 0.5);
        assert_eq!(request.order, "count");
    }

    #[test]
    fn test_runner_options_from_args() {
        let args = parse(&["data.ndjson", "-t", "3", "--no-transport"]);
        let options = RunnerOptions::from(&args);
        assert_eq!(options.threads, 3);
        assert!(options.pool_capacity >= 3);
        assert!(!options.transport);
        assert_eq!(args.name, crate::defaults::FACET_NAME);
    }

    #[test]
    fn test_parse_ndjson() {
        let input = "{\"x\": 1}\n\n{\"x\": 2.5, \"y\": \"a\"}\n";
        let documents = parse_ndjson(input.as_bytes()).unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[1]["x"], 2.5);

        let err = parse_ndjson("{\"x\": 1}\n[1, 2]\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Line 2 is not a JSON object"));
        assert!(parse_ndjson("{not json".as_bytes()).is_err());
    }

    #[test]
    fn test_load_and_split_partitions() {
        let mut file = NamedTempFile::new().unwrap();
        for value in 0..5 {
            writeln!(file, "{{\"x\": {}}}", value).unwrap();
        }
        let path = file.path().to_str().unwrap().to_string();

        let args = parse(&[path.as_str()]);
        let partitions = args.load_partitions().unwrap();
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].len(), 5);

        let args = parse(&[path.as_str(), "--partitions", "2"]);
        let partitions = args.load_partitions().unwrap();
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].len(), 3);
        assert_eq!(partitions[1].len(), 2);
        assert_eq!(partitions[1].id(), 1);
        assert_eq!(partitions[1].column("x").present(), 2);

        assert!(split_round_robin(Vec::new(), 0).is_err());
    }
}
