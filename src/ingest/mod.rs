use crate::error::Result;
use crate::models::{IngestSummary, InteractionMatrix, RawInteraction};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Accumulates raw interaction records into a sparse interaction matrix.
///
/// Invalid records (negative ids, non-positive or non-finite weights) are
/// skipped and counted, never fatal. Duplicate (user, item) pairs sum
/// their weights into a single entry.
pub fn accumulate<I>(records: I) -> (InteractionMatrix, IngestSummary)
where
    I: IntoIterator<Item = RawInteraction>,
{
    let mut entries: BTreeMap<(u32, u32), f32> = BTreeMap::new();
    let mut accepted = 0usize;
    let mut skipped = 0usize;

    for record in records {
        match record.validate() {
            Ok(interaction) => {
                *entries
                    .entry((interaction.user_id, interaction.item_id))
                    .or_insert(0.0) += interaction.weight;
                accepted += 1;
            }
            Err(e) => {
                debug!("skipping record: {}", e);
                skipped += 1;
            }
        }
    }

    let matrix = InteractionMatrix::from_accumulated(entries);
    if skipped > 0 {
        warn!("skipped {} invalid interaction records", skipped);
    }

    let summary = IngestSummary {
        accepted,
        skipped,
        n_users: matrix.n_users(),
        n_items: matrix.n_items(),
    };
    (matrix, summary)
}

#[derive(Debug, Deserialize)]
struct EventRow {
    user_id: i64,
    item_id: i64,
    weight: f64,
}

/// Reads raw interaction records from an events CSV with
/// `user_id,item_id,weight` columns. Returns the records plus the count
/// of rows that would not even parse.
pub fn read_raw_events<P: AsRef<Path>>(path: P) -> Result<(Vec<RawInteraction>, usize)> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;

    let mut records = Vec::new();
    let mut unparsed = 0usize;
    for row in reader.deserialize::<EventRow>() {
        match row {
            Ok(r) => records.push(RawInteraction::new(r.user_id, r.item_id, r.weight)),
            Err(e) => {
                debug!("skipping unparsable row: {}", e);
                unparsed += 1;
            }
        }
    }
    Ok((records, unparsed))
}

/// Reads an events CSV and builds the interaction matrix. Rows that fail
/// to parse count as skipped, the same as rows that fail validation.
pub fn read_events_csv<P: AsRef<Path>>(path: P) -> Result<(InteractionMatrix, IngestSummary)> {
    let (records, unparsed) = read_raw_events(path)?;
    let (matrix, mut summary) = accumulate(records);
    summary.skipped += unparsed;
    info!(
        "ingested {} events ({} skipped) into a {}x{} matrix with {} entries",
        summary.accepted,
        summary.skipped,
        summary.n_users,
        summary.n_items,
        matrix.nnz()
    );
    Ok((matrix, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn accumulate_sums_duplicates() {
        let (matrix, summary) = accumulate(vec![
            RawInteraction::new(0, 0, 1.0),
            RawInteraction::new(0, 0, 2.5),
            RawInteraction::new(1, 2, 1.0),
        ]);

        assert_eq!(summary.accepted, 3);
        assert_eq!(summary.skipped, 0);
        // Two distinct pairs, not three entries.
        assert_eq!(matrix.nnz(), 2);
        assert_eq!(matrix.row(0), (&[0u32][..], &[3.5f32][..]));
    }

    #[test]
    fn accumulate_skips_invalid_rows() {
        let (matrix, summary) = accumulate(vec![
            RawInteraction::new(0, 0, 1.0),
            RawInteraction::new(-1, 0, 1.0),
            RawInteraction::new(0, 1, 0.0),
            RawInteraction::new(0, 1, f64::NAN),
        ]);

        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.skipped, 3);
        assert_eq!(matrix.nnz(), 1);
    }

    #[test]
    fn accumulate_empty_input() {
        let (matrix, summary) = accumulate(Vec::new());
        assert_eq!(matrix.n_users(), 0);
        assert_eq!(matrix.n_items(), 0);
        assert_eq!(summary.accepted, 0);
    }

    #[test]
    fn csv_reader_counts_bad_rows_as_skipped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "user_id,item_id,weight").unwrap();
        writeln!(file, "0,0,1.0").unwrap();
        writeln!(file, "0,1,2.0").unwrap();
        writeln!(file, "not,a,row").unwrap();
        writeln!(file, "1,1,-3.0").unwrap();
        file.flush().unwrap();

        let (matrix, summary) = read_events_csv(file.path()).unwrap();
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.skipped, 2);
        assert_eq!(matrix.n_users(), 1);
        assert_eq!(matrix.n_items(), 2);
    }
}
