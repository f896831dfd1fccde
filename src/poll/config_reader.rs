use crate::args::Args;
use crate::poll::io_common::CandidateSource;
use crate::poll::store::{JSON_PROVIDER, SQL_PROVIDER};
use crate::poll::*;

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// `json` or `sql`
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
    #[serde(rename = "databaseUrl")]
    pub database_url: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(rename = "candidatesFile")]
    pub candidates_file: Option<String>,
    #[serde(rename = "inputType")]
    pub input_type: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "requireNickname")]
    pub require_nickname: Option<bool>,
    pub columns: Option<usize>,
    pub store: Option<StoreSettings>,
}

/// The settings of a run, after merging the command line and the configuration file.
#[derive(PartialEq, Debug, Clone)]
pub struct Settings {
    pub candidates: Option<CandidateSource>,
    pub store: StoreSettings,
    pub rules: PollRules,
    pub columns: usize,
}

const DEFAULT_VOTES_FILE: &str = "voti.json";
const DEFAULT_COLUMNS: usize = 4;

/// A configuration file, with its relative paths resolved from the directory of the file.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct LoadedConfig {
    pub config: PollConfig,
    pub root: String,
}

impl LoadedConfig {
    fn resolve_path(&self, p: &str) -> String {
        if Path::new(p).is_absolute() || self.root.is_empty() {
            p.to_string()
        } else {
            Path::new(&self.root).join(p).display().to_string()
        }
    }
}

pub fn read_config(path: &str) -> PollResult<LoadedConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu {
        path: path.to_string(),
    })?;
    let config: PollConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    let root = Path::new(path)
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    Ok(LoadedConfig { config, root })
}

impl Settings {
    pub fn resolve(args: &Args, loaded: Option<&LoadedConfig>) -> PollResult<Settings> {
        let config = loaded.map(|l| l.config.clone());
        let resolve = |p: &str| match loaded {
            Some(l) => l.resolve_path(p),
            None => p.to_string(),
        };

        let candidates_path: Option<String> = match &args.candidates {
            Some(p) => Some(p.clone()),
            None => config
                .as_ref()
                .and_then(|c| c.candidates_file.clone())
                .map(|p| resolve(&p)),
        };
        let candidates = candidates_path.map(|path| CandidateSource {
            path,
            input_type: args
                .input_type
                .clone()
                .or_else(|| config.as_ref().and_then(|c| c.input_type.clone())),
            worksheet: args
                .excel_worksheet_name
                .clone()
                .or_else(|| config.as_ref().and_then(|c| c.excel_worksheet_name.clone())),
        });

        let config_store = config.as_ref().and_then(|c| c.store.clone());
        let provider = args
            .store
            .clone()
            .or_else(|| config_store.as_ref().map(|s| s.provider.clone()))
            .unwrap_or_else(|| JSON_PROVIDER.to_string());
        let store = match provider.as_str() {
            JSON_PROVIDER => StoreSettings {
                provider: JSON_PROVIDER.to_string(),
                file_path: Some(match &args.votes_file {
                    Some(p) => p.clone(),
                    None => config_store
                        .as_ref()
                        .and_then(|s| s.file_path.clone())
                        .map(|p| resolve(&p))
                        .unwrap_or_else(|| resolve(DEFAULT_VOTES_FILE)),
                }),
                database_url: None,
            },
            SQL_PROVIDER => {
                let url = match &args.database_url {
                    Some(u) => u.clone(),
                    None => match config_store.as_ref().and_then(|s| s.database_url.clone()) {
                        Some(u) => u,
                        None => whatever!(
                            "The sql store needs a database URL: use --database-url or EXIT_POLL_DATABASE_URL"
                        ),
                    },
                };
                StoreSettings {
                    provider: SQL_PROVIDER.to_string(),
                    file_path: None,
                    database_url: Some(url),
                }
            }
            x => whatever!("Unknown store {:?}: use json or sql", x),
        };

        // A nickname is required by default with the sql store.
        let require_nickname = args
            .require_nickname
            .or_else(|| config.as_ref().and_then(|c| c.require_nickname))
            .unwrap_or(store.provider == SQL_PROVIDER);

        let columns = args
            .columns
            .or_else(|| config.as_ref().and_then(|c| c.columns))
            .unwrap_or(DEFAULT_COLUMNS)
            .max(1);

        Ok(Settings {
            candidates,
            store,
            rules: PollRules { require_nickname },
            columns,
        })
    }

    pub fn candidate_source(&self) -> PollResult<CandidateSource> {
        match &self.candidates {
            Some(c) => Ok(c.clone()),
            None => whatever!("No candidates file: use --candidates or candidatesFile in the configuration"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Command;

    fn args() -> Args {
        Args {
            config: None,
            candidates: None,
            input_type: None,
            excel_worksheet_name: None,
            store: None,
            votes_file: None,
            database_url: None,
            require_nickname: None,
            columns: None,
            verbose: false,
            command: Command::Candidates,
        }
    }

    #[test]
    fn defaults() {
        let s = Settings::resolve(&args(), None).unwrap();
        assert_eq!(s.candidates, None);
        assert_eq!(s.store.provider, "json");
        assert_eq!(s.store.file_path, Some("voti.json".to_string()));
        assert!(!s.rules.require_nickname);
        assert_eq!(s.columns, 4);
        assert!(s.candidate_source().is_err());
    }

    #[test]
    fn sql_requires_url_and_nickname() {
        let mut a = args();
        a.store = Some("sql".to_string());
        assert!(Settings::resolve(&a, None).is_err());
        a.database_url = Some("sqlite::memory:".to_string());
        let s = Settings::resolve(&a, None).unwrap();
        assert!(s.rules.require_nickname);
        a.require_nickname = Some(false);
        let s = Settings::resolve(&a, None).unwrap();
        assert!(!s.rules.require_nickname);
    }

    #[test]
    fn unknown_store() {
        let mut a = args();
        a.store = Some("redis".to_string());
        assert!(Settings::resolve(&a, None).is_err());
    }

    #[test]
    fn config_file_paths_are_relative_to_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exitpoll.json");
        fs::write(
            &path,
            r#"{
                "candidatesFile": "candidati.csv",
                "columns": 3,
                "store": { "provider": "json", "filePath": "data/voti.json" }
            }"#,
        )
        .unwrap();
        let loaded = read_config(&path.display().to_string()).unwrap();
        let s = Settings::resolve(&args(), Some(&loaded)).unwrap();
        assert_eq!(
            s.candidate_source().unwrap().path,
            dir.path().join("candidati.csv").display().to_string()
        );
        assert_eq!(
            s.store.file_path,
            Some(dir.path().join("data/voti.json").display().to_string())
        );
        assert_eq!(s.columns, 3);

        // The command line wins.
        let mut a = args();
        a.candidates = Some("/tmp/altri.csv".to_string());
        a.columns = Some(2);
        let s = Settings::resolve(&a, Some(&loaded)).unwrap();
        assert_eq!(s.candidate_source().unwrap().path, "/tmp/altri.csv");
        assert_eq!(s.columns, 2);
    }

    #[test]
    fn malformed_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exitpoll.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            read_config(&path.display().to_string()),
            Err(PollError::ParsingJson { .. })
        ));
    }
}
