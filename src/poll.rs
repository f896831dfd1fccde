use log::{debug, info, warn};

use exit_poll::session::{Effect, Event, Phase, Session};
use exit_poll::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::io::Write;

use crate::args::{Args, Command, TopicAction};
use crate::poll::config_reader::*;
use crate::poll::io_common::*;
use crate::poll::store::*;

pub mod config_reader;
pub mod interactive;
pub mod io_common;
pub mod io_csv;
pub mod io_xlsx;
pub mod report;
pub mod store;
pub mod store_json;
pub mod store_sql;

#[derive(Debug, Snafu)]
pub enum PollError {
    #[snafu(display("Error opening the candidates file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of the candidates file"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The Excel file {path} has no worksheet {worksheet}"))]
    EmptyExcel { path: String, worksheet: String },
    #[snafu(display("Unexpected cell in row {lineno}: {content}"))]
    ExcelWrongCellType { lineno: usize, content: String },
    #[snafu(display(
        "The candidates file {path} must contain at least the columns 'cognome' and 'nome' (missing: {missing})"
    ))]
    MissingColumns { path: String, missing: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing the votes to {path}"))]
    WritingVotes {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error replacing the votes file {path}"))]
    PersistingVotes {
        source: tempfile::PersistError,
        path: String,
    },
    #[snafu(display("Error reading the input"))]
    ReadingInput { source: std::io::Error },
    #[snafu(display("Error writing the output"))]
    WritingOutput { source: std::io::Error },
    #[snafu(display("Database error"))]
    Database { source: sqlx::Error },
    #[snafu(display("Error starting the database runtime"))]
    DatabaseRuntime { source: std::io::Error },
    #[snafu(display("Unsupported database URL {url}: only mysql:// and sqlite: URLs are supported"))]
    UnsupportedDatabase { url: String },
    #[snafu(display("Malformed selections in the stored vote {id}"))]
    DecodingSelections { source: serde_json::Error, id: i64 },
    #[snafu(display("{source}"))]
    Session { source: SessionError },
    #[snafu(display("Difference detected between the report and the reference report"))]
    ReferenceMismatch {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type PollResult<T> = Result<T, PollError>;

/// Applies an event to the session and persists its effect.
///
/// The next session is only returned once the effect is stored. On error, the
/// caller keeps its current session.
pub fn commit(
    session: &Session,
    event: Event,
    rules: &PollRules,
    store: &mut dyn VoteStore,
) -> PollResult<Session> {
    let transition = session.apply(event, rules).context(SessionSnafu {})?;
    match &transition.effect {
        Effect::Nothing => {}
        Effect::RecordTopic(topic) => store.record_topic(topic)?,
        Effect::RecordVote(v) => {
            store.record_vote(&v.topic, v.voter.as_deref(), &v.selections)?;
        }
    }
    Ok(transition.session)
}

/// Starts a session, resuming the topic of the store when there is one.
///
/// A requested topic that differs from the current one is recorded as the new topic.
pub fn start_session(
    candidates: &[String],
    store: &mut dyn VoteStore,
    rules: &PollRules,
    requested_topic: Option<String>,
) -> PollResult<Session> {
    let current = store.current_topic()?;
    debug!(
        "start_session: current topic: {:?} requested: {:?}",
        current, requested_topic
    );
    match requested_topic.map(|t| t.trim().to_string()) {
        Some(t) if t != current => commit(
            &Session::new(candidates),
            Event::SetTopic(t),
            rules,
            store,
        ),
        _ => Ok(Session::with_topic(candidates, &current)),
    }
}

pub fn plural(count: usize, singular: &str, plural: &str) -> String {
    if count > 1 {
        plural.to_string()
    } else {
        singular.to_string()
    }
}

fn run_candidates(settings: &Settings, out: &mut dyn Write) -> PollResult<()> {
    let candidates = load_candidates(&settings.candidate_source()?)?;
    if candidates.is_empty() {
        warn!("No candidate found in the candidates file");
    }
    for (idx, c) in candidates.iter().enumerate() {
        writeln!(out, "{:>4}. {}", idx + 1, c).context(WritingOutputSnafu {})?;
    }
    Ok(())
}

fn run_topic(
    settings: &Settings,
    action: Option<TopicAction>,
    out: &mut dyn Write,
) -> PollResult<()> {
    let mut store = open_store(&settings.store)?;
    if let Some(TopicAction::Set { topic }) = action {
        let topic = topic.trim().to_string();
        if topic.is_empty() {
            return Err(SessionError::EmptyTopic).context(SessionSnafu {});
        }
        if settings.store.provider == JSON_PROVIDER {
            warn!("The json store does not keep the topic between runs: pass --topic to the vote command instead");
        }
        store.record_topic(&topic)?;
    }
    let current = store.current_topic()?;
    if current.is_empty() {
        writeln!(out, "No topic set.").context(WritingOutputSnafu {})?;
    } else {
        writeln!(out, "Current topic: {}", current).context(WritingOutputSnafu {})?;
    }
    Ok(())
}

fn run_vote(
    settings: &Settings,
    topic: Option<String>,
    picks: &[usize],
    names: &[String],
    nickname: Option<String>,
    out: &mut dyn Write,
) -> PollResult<()> {
    let candidates = load_candidates(&settings.candidate_source()?)?;
    let mut store = open_store(&settings.store)?;
    let rules = &settings.rules;
    let mut session = start_session(&candidates, store.as_mut(), rules, topic)?;
    if session.phase() == Phase::NoTopic {
        return Err(SessionError::NoTopic).context(SessionSnafu {});
    }

    let mut picks: Vec<usize> = picks.to_vec();
    picks.sort_unstable();
    picks.dedup();
    for p in picks {
        let idx = match p.checked_sub(1) {
            Some(idx) => idx,
            None => {
                return Err(SessionError::UnknownCandidate("#0".to_string()))
                    .context(SessionSnafu {})
            }
        };
        session = commit(&session, Event::Toggle(idx), rules, store.as_mut())?;
    }
    for n in names.iter() {
        session = commit(&session, Event::CheckName(n.clone()), rules, store.as_mut())?;
    }
    session = commit(
        &session,
        Event::Submit { voter: nickname },
        rules,
        store.as_mut(),
    )?;

    let num = session.last_vote().map(|v| v.selections.len()).unwrap_or(0);
    info!("Vote recorded in store {}", store.name());
    writeln!(
        out,
        "Vote recorded for {} {}. Thanks!",
        num,
        plural(num, "candidate", "candidates")
    )
    .context(WritingOutputSnafu {})?;
    Ok(())
}

fn run_report(
    settings: &Settings,
    topic: Option<String>,
    format: Option<String>,
    out_path: Option<String>,
    reference: Option<String>,
) -> PollResult<()> {
    let store = open_store(&settings.store)?;
    let votes = store.all_votes()?;
    info!("run_report: {} votes in store {}", votes.len(), store.name());
    let tallies: Vec<TopicTally> = match topic {
        Some(t) => tally_topic(&votes, &t).into_iter().collect(),
        None => tally(&votes),
    };

    let report_js = report::report_to_json(&tallies);
    let content = match format.as_deref() {
        None | Some("text") => report::render_text(&tallies),
        Some("json") => serde_json::to_string_pretty(&report_js).context(ParsingJsonSnafu {})?,
        Some(x) => whatever!("Unknown report format {:?}: use text or json", x),
    };

    match out_path.as_deref() {
        None | Some("") | Some("stdout") => {
            let mut stdout = std::io::stdout();
            writeln!(stdout, "{}", content).context(WritingOutputSnafu {})?;
        }
        Some(path) => {
            info!("Writing the report to {}", path);
            fs::write(path, content).context(WritingOutputSnafu {})?;
        }
    }

    if let Some(reference_path) = reference {
        report::check_reference(&report_js, &reference_path)?;
    }
    Ok(())
}

fn run_interactive(settings: &Settings) -> PollResult<()> {
    let source = settings.candidate_source()?;
    let mut cache = CandidateCache::default();
    // Fail before showing anything if the candidates cannot be read.
    let candidates = cache.load(&source)?;
    if candidates.is_empty() {
        whatever!("No candidate found in {}", source.path)
    }
    let mut store = open_store(&settings.store)?;
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    interactive::run_poll(
        &mut cache,
        &source,
        store.as_mut(),
        &settings.rules,
        settings.columns,
        &mut stdin.lock(),
        &mut stdout,
    )
}

pub fn run(args: Args) -> PollResult<()> {
    let config = match &args.config {
        Some(p) => Some(read_config(p)?),
        None => None,
    };
    let settings = Settings::resolve(&args, config.as_ref())?;
    info!(
        "candidates: {:?} store: {} columns: {}",
        settings.candidates.as_ref().map(|c| c.path.as_str()),
        settings.store.provider,
        settings.columns
    );

    let mut stdout = std::io::stdout();
    match args.command {
        Command::Candidates => run_candidates(&settings, &mut stdout),
        Command::Topic { action } => run_topic(&settings, action, &mut stdout),
        Command::Vote {
            topic,
            pick,
            name,
            nickname,
        } => run_vote(&settings, topic, &pick, &name, nickname, &mut stdout),
        Command::Report {
            topic,
            format,
            out,
            reference,
        } => run_report(&settings, topic, format, out, reference),
        Command::Poll => run_interactive(&settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::store::VoteStore;
    use crate::poll::store_json::JsonStore;

    fn write_candidates(dir: &std::path::Path) -> String {
        let path = dir.join("candidati.csv");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "Cognome,Nome").unwrap();
        writeln!(f, "Rossi,Anna").unwrap();
        writeln!(f, "Verdi,Bruno").unwrap();
        path.display().to_string()
    }

    fn settings(dir: &std::path::Path) -> Settings {
        Settings {
            candidates: Some(CandidateSource {
                path: write_candidates(dir),
                input_type: None,
                worksheet: None,
            }),
            store: StoreSettings {
                provider: JSON_PROVIDER.to_string(),
                file_path: Some(dir.join("voti.json").display().to_string()),
                database_url: None,
            },
            rules: PollRules::DEFAULT_RULES,
            columns: 4,
        }
    }

    #[test]
    fn vote_then_report() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let mut out: Vec<u8> = Vec::new();
        run_vote(
            &s,
            Some("Gita".to_string()),
            &[2, 1, 2],
            &[],
            None,
            &mut out,
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Vote recorded for 2 candidates. Thanks!\n"
        );

        let store = JsonStore::new(dir.path().join("voti.json"));
        let votes = store.all_votes().unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].topic, "Gita");
        assert_eq!(
            votes[0].selections,
            vec!["Anna Rossi".to_string(), "Bruno Verdi".to_string()]
        );
    }

    #[test]
    fn vote_without_topic_fails() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let mut out: Vec<u8> = Vec::new();
        let res = run_vote(&s, None, &[1], &[], None, &mut out);
        assert!(matches!(
            res,
            Err(PollError::Session {
                source: SessionError::NoTopic
            })
        ));
        assert!(!dir.path().join("voti.json").exists());
    }

    #[test]
    fn vote_without_selection_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let mut out: Vec<u8> = Vec::new();
        let res = run_vote(&s, Some("Gita".to_string()), &[], &[], None, &mut out);
        assert!(matches!(
            res,
            Err(PollError::Session {
                source: SessionError::NoSelection
            })
        ));
        let store = JsonStore::new(dir.path().join("voti.json"));
        assert!(store.all_votes().unwrap().is_empty());
    }

    #[test]
    fn vote_by_name_and_unknown_pick() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let mut out: Vec<u8> = Vec::new();
        run_vote(
            &s,
            Some("Gita".to_string()),
            &[],
            &["Bruno Verdi".to_string()],
            Some("zorro".to_string()),
            &mut out,
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Vote recorded for 1 candidate. Thanks!\n"
        );
        let mut out: Vec<u8> = Vec::new();
        let res = run_vote(&s, Some("Gita".to_string()), &[3], &[], None, &mut out);
        assert!(matches!(
            res,
            Err(PollError::Session {
                source: SessionError::UnknownCandidate(_)
            })
        ));
    }

    #[test]
    fn start_session_resumes_topic() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStore::new(dir.path().join("voti.json"));
        store.record_topic("Gita").unwrap();
        let candidates = vec!["A B".to_string()];
        let s = start_session(&candidates, &mut store, &PollRules::DEFAULT_RULES, None).unwrap();
        assert_eq!(s.phase(), Phase::AwaitingVote);
        assert_eq!(s.topic(), "Gita");

        let s = start_session(
            &candidates,
            &mut store,
            &PollRules::DEFAULT_RULES,
            Some("Cena".to_string()),
        )
        .unwrap();
        assert_eq!(s.topic(), "Cena");
        assert_eq!(store.current_topic().unwrap(), "Cena");
    }

    #[test]
    fn plurals() {
        assert_eq!(plural(1, "vote", "votes"), "vote");
        assert_eq!(plural(2, "vote", "votes"), "votes");
    }
}
