use std::collections::HashMap;
use std::path::Path;

use crate::poll::*;

pub const FIRST_NAME_COLUMN: &str = "nome";
pub const LAST_NAME_COLUMN: &str = "cognome";

/// Where the candidates come from.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct CandidateSource {
    pub path: String,
    /// `csv` or `xlsx`. Inferred from the extension of the path if not provided.
    pub input_type: Option<String>,
    /// Only for Excel files.
    pub worksheet: Option<String>,
}

/// One row of the candidates table, before any cleaning.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct NameRow {
    pub first_name: String,
    pub last_name: String,
}

pub fn normalize_header(h: &str) -> String {
    h.trim().to_lowercase()
}

/// Finds the positions of the first name and last name columns in the header.
pub fn column_indexes<S: AsRef<str>>(header: &[S], path: &str) -> PollResult<(usize, usize)> {
    let normalized: Vec<String> = header.iter().map(|h| normalize_header(h.as_ref())).collect();
    debug!("column_indexes: header: {:?}", normalized);
    let find = |name: &str| normalized.iter().position(|h| h == name);
    match (find(FIRST_NAME_COLUMN), find(LAST_NAME_COLUMN)) {
        (Some(first), Some(last)) => Ok((first, last)),
        (first, last) => {
            let mut missing: Vec<&str> = vec![];
            if last.is_none() {
                missing.push(LAST_NAME_COLUMN);
            }
            if first.is_none() {
                missing.push(FIRST_NAME_COLUMN);
            }
            MissingColumnsSnafu {
                path: path.to_string(),
                missing: missing.join(", "),
            }
            .fail()
        }
    }
}

/// Sorts the rows by first name then last name, and builds the display names.
///
/// Rows with neither a first nor a last name are dropped. Homonyms are kept.
pub fn assemble_candidates(rows: &[NameRow]) -> Vec<String> {
    let mut cleaned: Vec<(String, String)> = rows
        .iter()
        .map(|r| (r.first_name.trim().to_string(), r.last_name.trim().to_string()))
        .filter(|(first, last)| !first.is_empty() || !last.is_empty())
        .collect();
    cleaned.sort();
    cleaned
        .iter()
        .map(|(first, last)| format!("{} {}", first, last))
        .collect()
}

fn input_type(source: &CandidateSource) -> String {
    match &source.input_type {
        Some(t) => t.to_lowercase(),
        None => Path::new(&source.path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .filter(|e| e == "xlsx")
            .unwrap_or_else(|| "csv".to_string()),
    }
}

/// Reads the candidates of a source.
///
/// If the file misses one of the required columns, this fails and no candidate at all is returned.
pub fn load_candidates(source: &CandidateSource) -> PollResult<Vec<String>> {
    info!("Attempting to read candidates file {:?}", source.path);
    let rows = match input_type(source).as_str() {
        "csv" => io_csv::read_csv_names(&source.path)?,
        "xlsx" => io_xlsx::read_xlsx_names(&source.path, source.worksheet.as_deref())?,
        x => whatever!("Input type not implemented {:?}: use csv or xlsx", x),
    };
    let candidates = assemble_candidates(&rows);
    info!("Loaded {} candidates from {}", candidates.len(), source.path);
    Ok(candidates)
}

/// Candidates already loaded during this session, by source.
#[derive(Debug, Clone, Default)]
pub struct CandidateCache {
    loaded: HashMap<CandidateSource, Vec<String>>,
}

impl CandidateCache {
    pub fn load(&mut self, source: &CandidateSource) -> PollResult<Vec<String>> {
        if let Some(candidates) = self.loaded.get(source) {
            debug!("CandidateCache: hit for {:?}", source.path);
            return Ok(candidates.clone());
        }
        let candidates = load_candidates(source)?;
        self.loaded.insert(source.clone(), candidates.clone());
        Ok(candidates)
    }
}
