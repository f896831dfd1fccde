// Primitives for reading CSV files.

use crate::poll::{io_common::*, *};

/// Reads the first and last names of a CSV file with a header row.
///
/// Rows shorter than the header are accepted: the missing fields are empty.
pub fn read_csv_names(path: &str) -> PollResult<Vec<NameRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let header: Vec<String> = rdr
        .headers()
        .context(CsvLineParseSnafu { lineno: 1_usize })?
        .iter()
        .map(|s| s.to_string())
        .collect();
    let (first_idx, last_idx) = column_indexes(&header, path)?;

    let mut res: Vec<NameRow> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is the first line.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        debug!("read_csv_names: lineno: {:?} row: {:?}", lineno, line);
        res.push(NameRow {
            first_name: line.get(first_idx).unwrap_or("").to_string(),
            last_name: line.get(last_idx).unwrap_or("").to_string(),
        });
    }
    Ok(res)
}
