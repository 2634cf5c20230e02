use crate::error::LoadError;
use crate::ingest::coerce::CoerceError;
use crate::ingest::csv::RowSource;
use crate::ingest::schema::{ColumnSchema, ColumnType, Record, TableSchema};
use tracing::debug;

/// Turns a row source into typed records.
///
/// The first row names the columns and the second declares their types. Every
/// later row yields one [`Record`]. Iteration stops at the first failing row and
/// never resumes.
pub struct RecordDecoder<S> {
    rows: S,
    schema: TableSchema,
    finished: bool,
}

impl<S: RowSource> RecordDecoder<S> {
    /// Consumes the two header rows and builds the column schema.
    pub fn new(mut rows: S) -> Result<Self, LoadError> {
        let names: Vec<String> = match rows.next_row()? {
            Some(row) => row.iter().map(str::to_string).collect(),
            None => return Err(LoadError::Schema("input has no column name row".to_string())),
        };

        let columns = match rows.next_row()? {
            Some(row) => {
                if row.len() != names.len() {
                    return Err(LoadError::Schema(format!(
                        "column name row has {} fields but type row has {}",
                        names.len(),
                        row.len()
                    )));
                }
                let line = row.line();
                names
                    .into_iter()
                    .zip(row.iter())
                    .map(|(name, tag)| match tag.parse::<ColumnType>() {
                        Ok(data_type) => Ok(ColumnSchema { name, data_type }),
                        Err(source) => Err(LoadError::Coerce { line, column: name, source }),
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            None => return Err(LoadError::Schema("input has no column type row".to_string())),
        };

        let schema = TableSchema { columns };
        debug!("Decoding rows with schema {}", schema);

        Ok(Self {
            rows,
            schema,
            finished: false,
        })
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn decode_next(&mut self) -> Result<Option<Record>, LoadError> {
        let Some(row) = self.rows.next_row()? else {
            return Ok(None);
        };

        let line = row.line();
        if row.len() != self.schema.len() {
            return Err(LoadError::Schema(format!(
                "line {}: expected {} fields, found {}",
                line,
                self.schema.len(),
                row.len()
            )));
        }

        let values = self
            .schema
            .columns
            .iter()
            .zip(row.iter())
            .map(|(column, raw)| {
                column
                    .data_type
                    .coerce(raw)
                    .map_err(|source: CoerceError| LoadError::Coerce {
                        line,
                        column: column.name.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Record::new(values)))
    }
}

impl<S: RowSource> Iterator for RecordDecoder<S> {
    type Item = Result<Record, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let next = self.decode_next().transpose();
        if !matches!(next, Some(Ok(_))) {
            self.finished = true;
        }
        next
    }
}
