use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::valuation::tools::error::{Result, ToolError};
use crate::valuation::tools::flatten::flatten;
use crate::valuation::tools::io::addresses::{dedupe_queries, read_queries};
use crate::valuation::tools::io::client::{FixtureClient, HttpValuationClient, ValuationClient};
use crate::valuation::tools::io::table::{OutputFormat, write_dataset};
use crate::valuation::tools::model::schema::{SchemaIssue, schema_issues};
use crate::valuation::tools::model::{Dataset, PropertyQuery};

/// Counts reported once a collection run finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollectSummary {
    pub requested: usize,
    pub retrieved: usize,
    pub failed: usize,
}

/// Result of a collection run.
#[derive(Debug, Clone, PartialEq)]
pub struct Collected {
    pub dataset: Dataset,
    pub summary: CollectSummary,
}

/// Fetches and flattens every query in turn.
///
/// A query the client cannot answer is logged and skipped. A response missing
/// one of `sections`, or carrying one that is not a mapping, aborts the run.
#[instrument(level = "info", skip_all, fields(queries = queries.len()))]
pub fn collect<C, S>(client: &C, queries: &[PropertyQuery], sections: &[S]) -> Result<Collected>
where
    C: ValuationClient + ?Sized,
    S: AsRef<str>,
{
    let mut dataset = Dataset::new();
    let mut summary = CollectSummary {
        requested: queries.len(),
        ..CollectSummary::default()
    };

    for query in queries {
        let raw = match client.fetch(query) {
            Ok(raw) => raw,
            Err(err) => {
                error!(address = %query.address, error = %err, "could not retrieve data for address");
                summary.failed += 1;
                continue;
            }
        };

        report_schema_issues(&query.address, &schema_issues(&raw, sections));

        let record = flatten(&raw, sections)?;
        debug!(address = %query.address, fields = record.len(), "flattened response");
        if dataset.insert(query.record_id(), record).is_some() {
            warn!(address = %query.address, "replaced earlier row with the same address");
        }
        summary.retrieved += 1;
    }

    info!(
        requested = summary.requested,
        retrieved = summary.retrieved,
        failed = summary.failed,
        "collection finished"
    );
    Ok(Collected { dataset, summary })
}

fn report_schema_issues(address: &str, issues: &[SchemaIssue]) {
    for issue in issues {
        match issue {
            SchemaIssue::MissingField { .. } => debug!(address, %issue, "schema deviation"),
            SchemaIssue::UnexpectedField { .. } => warn!(address, %issue, "schema deviation"),
        }
    }
}

/// Where raw responses come from.
#[derive(Debug, Clone)]
pub enum RecordSource {
    /// Live provider reached over HTTP.
    Http {
        endpoint: String,
        api_key_file: PathBuf,
        timeout: Duration,
    },
    /// Canned responses loaded from a JSON file.
    Fixtures(PathBuf),
}

/// Everything a fetch run needs.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub sections: Vec<String>,
    pub source: RecordSource,
}

/// Reads the API key from the first line of `path`.
pub fn read_api_key(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(ToolError::MissingInput(path.to_path_buf()));
    }
    let contents = fs::read_to_string(path)?;
    let key = contents.lines().next().unwrap_or_default().trim();
    if key.is_empty() {
        return Err(ToolError::InvalidInput(format!(
            "no API key found in {}",
            path.display()
        )));
    }
    Ok(key.to_string())
}

/// Reads the query list, collects the flattened responses, and writes the
/// dataset in the format implied by the output path.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %options.input.display(), output = %options.output.display())
)]
pub fn run_fetch(options: &FetchOptions) -> Result<CollectSummary> {
    let queries = read_queries(&options.input)?;
    let total = queries.len();
    let queries = dedupe_queries(queries);
    info!(total, unique = queries.len(), "read queries from input");

    let client: Box<dyn ValuationClient> = match &options.source {
        RecordSource::Http {
            endpoint,
            api_key_file,
            timeout,
        } => {
            let api_key = read_api_key(api_key_file)?;
            Box::new(HttpValuationClient::with_timeout(
                endpoint.clone(),
                api_key,
                *timeout,
            )?)
        }
        RecordSource::Fixtures(path) => {
            let fixtures = FixtureClient::from_path(path)?;
            debug!(responses = fixtures.len(), "loaded fixtures");
            Box::new(fixtures)
        }
    };

    let collected = collect(&*client, &queries, &options.sections)?;
    let format = OutputFormat::detect(&options.output);
    write_dataset(&options.output, &collected.dataset, format)?;
    info!(rows = collected.dataset.len(), %format, "dataset written");
    Ok(collected.summary)
}
