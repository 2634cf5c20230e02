// Typed file loading: rows are decoded into records, the records become one
// batch, and the batch is applied to the destination in a single transaction.
pub mod coerce;
pub mod csv;
pub mod decoder;
pub mod schema;

use crate::config::{DatabaseConfig, RunPlan};
use crate::db::destination::{DatabaseAddress, Destination, DuckDbDestination, WriteBatch};
use crate::error::{Context, LoadError};
use crate::source::read_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use self::csv::{CsvRowSource, ParserOptions};
use self::decoder::RecordDecoder;

#[derive(Debug, Clone, PartialEq)]
pub struct LoadSummary {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: usize,
}

/// Decodes `input` completely and applies it to `destination` as one batch.
///
/// Nothing is sent to the destination unless every row decodes.
pub fn load<D: Destination>(
    input: &[u8],
    table: &str,
    options: &ParserOptions,
    destination: &mut D,
) -> Result<LoadSummary, LoadError> {
    let rows = CsvRowSource::new(input, options);
    let decoder = RecordDecoder::new(rows).context("error: decode header")?;
    let columns: Arc<[String]> = decoder.schema().column_names().into();
    info!("Decoding rows for {} {}", table, decoder.schema());

    let mut batch = WriteBatch::new();
    for record in decoder {
        let record = record.context("error: decode row")?;
        batch.push(destination.upsert(table, &columns, record));
    }

    let rows = batch.len();
    if batch.is_empty() {
        warn!("Input for {} has no data rows", table);
    }
    debug!("Applying batch of {} mutations to {}", rows, table);
    destination.apply(batch).context("error: apply")?;

    Ok(LoadSummary {
        table: table.to_string(),
        columns: columns.to_vec(),
        rows,
    })
}

/// Runs one load end to end: open the source, buffer it, connect to the
/// destination and load. Validation has already happened in [`RunPlan`].
pub async fn run(plan: RunPlan) -> Result<LoadSummary, LoadError> {
    let started = Instant::now();

    let source = plan.source.provider(&plan.storage)?;
    let reader = source.open().await.context(source.stage())?;

    let RunPlan {
        address,
        table,
        parser,
        database,
        ..
    } = plan;

    let summary = tokio::task::spawn_blocking(move || -> Result<LoadSummary, LoadError> {
        let input = read_all(reader).context("error: read source")?;
        debug!("Buffered {} bytes of input", input.len());

        let mut destination = connect(&database, address).context("error: connect destination")?;
        load(&input, &table, &parser, &mut destination).context("error: load")
    })
    .await??;

    info!(
        "Loaded {} rows into {} in {:?}",
        summary.rows,
        summary.table,
        started.elapsed()
    );
    Ok(summary)
}

fn connect(database: &DatabaseConfig, address: DatabaseAddress) -> Result<DuckDbDestination, LoadError> {
    let destination = DuckDbDestination::connect(database, address)?;
    debug!(
        "Destination {} backed by {}",
        destination.address(),
        destination.db_path().display()
    );
    Ok(destination)
}
