// The poll in a terminal: one line read, one event applied.

use std::io::BufRead;

use crate::poll::*;

const AWAITING_HELP: &str =
    "Numbers toggle candidates (e.g. `1 3`), `n <nickname>` sets your nickname, `s` submits, `h` shows all the results, `q` quits.";
const VOTED_HELP: &str =
    "`r` starts a new vote, `h` shows all the results, `c` shows this vote, `q` quits.";

// What one line of input asks for.
#[derive(Eq, PartialEq, Debug, Clone)]
enum Input {
    Topic(String),
    Toggle(Vec<usize>),
    Nickname(String),
    Submit,
    Restart,
    History,
    Current,
    Quit,
    Unknown(String),
}

fn parse_picks(line: &str) -> Option<Vec<usize>> {
    let picks: Option<Vec<usize>> = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().ok())
        .collect();
    picks.filter(|p| !p.is_empty())
}

fn parse_input(phase: Phase, line: &str) -> Input {
    let line = line.trim();
    match phase {
        Phase::NoTopic => match line {
            "q" => Input::Quit,
            _ => Input::Topic(line.to_string()),
        },
        Phase::AwaitingVote => match line {
            "s" => Input::Submit,
            "h" => Input::History,
            "q" => Input::Quit,
            "n" => Input::Nickname("".to_string()),
            _ if line.starts_with("n ") => Input::Nickname(line[2..].trim().to_string()),
            _ => match parse_picks(line) {
                Some(picks) => Input::Toggle(picks),
                None => Input::Unknown(line.to_string()),
            },
        },
        Phase::Voted => match line {
            "r" => Input::Restart,
            "h" => Input::History,
            "c" => Input::Current,
            "q" => Input::Quit,
            _ => Input::Unknown(line.to_string()),
        },
    }
}

/// The candidates as a grid of checkboxes, `columns` per row, numbered from 1.
pub fn render_ballot(session: &Session, columns: usize) -> String {
    let ballot = session.ballot();
    let cells: Vec<String> = ballot
        .candidates()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let mark = if ballot.is_checked(idx) { "x" } else { " " };
            format!("[{}] {:>2}. {}", mark, idx + 1, name)
        })
        .collect();
    let width = cells.iter().map(|c| c.chars().count()).max().unwrap_or(0);
    cells
        .chunks(columns.max(1))
        .map(|row| {
            row.iter()
                .map(|c| format!("{:<width$}", c, width = width))
                .collect::<Vec<String>>()
                .join("  ")
                .trim_end()
                .to_string()
        })
        .collect::<Vec<String>>()
        .join("\n")
}

fn say<W: Write>(output: &mut W, text: &str) -> PollResult<()> {
    writeln!(output, "{}", text).context(WritingOutputSnafu {})
}

fn read_line<R: BufRead>(input: &mut R) -> PollResult<Option<String>> {
    let mut line = String::new();
    let num = input.read_line(&mut line).context(ReadingInputSnafu {})?;
    if num == 0 {
        Ok(None)
    } else {
        Ok(Some(line))
    }
}

fn show_phase<W: Write>(
    session: &Session,
    nickname: &Option<String>,
    columns: usize,
    output: &mut W,
) -> PollResult<()> {
    match session.phase() {
        Phase::NoTopic => say(output, "Enter the topic of the poll (`q` quits):"),
        Phase::AwaitingVote => {
            say(output, &format!("Topic: {}", session.topic()))?;
            if let Some(n) = nickname {
                say(output, &format!("Nickname: {}", n))?;
            }
            say(output, &render_ballot(session, columns))?;
            say(output, AWAITING_HELP)
        }
        Phase::Voted => {
            say(output, "You have already voted.")?;
            say(output, VOTED_HELP)
        }
    }
}

// What the poll works with, besides the session.
struct PollContext<'a> {
    cache: &'a mut CandidateCache,
    source: &'a CandidateSource,
    store: &'a mut dyn VoteStore,
    rules: &'a PollRules,
}

// Handles one line of input and returns the next session.
fn handle<W: Write>(
    line: Input,
    session: &Session,
    nickname: &mut Option<String>,
    ctx: &mut PollContext,
    output: &mut W,
) -> PollResult<Session> {
    let rules = ctx.rules;
    match line {
        Input::Quit => Ok(session.clone()),
        Input::Topic(t) => commit(session, Event::SetTopic(t), rules, ctx.store),
        Input::Toggle(picks) => {
            // All the picks of a line are applied, or none.
            let mut next = session.clone();
            for p in picks {
                let idx = match p.checked_sub(1) {
                    Some(idx) => idx,
                    None => {
                        return Err(SessionError::UnknownCandidate("#0".to_string()))
                            .context(SessionSnafu {})
                    }
                };
                next = commit(&next, Event::Toggle(idx), rules, ctx.store)?;
            }
            Ok(next)
        }
        Input::Nickname(n) => {
            *nickname = Some(n).filter(|s| !s.is_empty());
            Ok(session.clone())
        }
        Input::Submit => {
            let voter = nickname.clone();
            let next = commit(session, Event::Submit { voter }, rules, ctx.store)?;
            let num = next.last_vote().map(|v| v.selections.len()).unwrap_or(0);
            say(
                output,
                &format!(
                    "Vote recorded for {} {}. Thanks!",
                    num,
                    plural(num, "candidate", "candidates")
                ),
            )?;
            Ok(next)
        }
        Input::Restart => {
            commit(session, Event::Reset, rules, ctx.store)?;
            ctx.store.restart_session()?;
            *nickname = None;
            let candidates = ctx.cache.load(ctx.source)?;
            start_session(&candidates, ctx.store, rules, None)
        }
        Input::History => {
            let votes = ctx.store.all_votes()?;
            say(output, &report::render_text(&tally(&votes)))?;
            Ok(session.clone())
        }
        Input::Current => {
            say(output, &report::render_text(&session.report()))?;
            Ok(session.clone())
        }
        Input::Unknown(l) => {
            say(output, &format!("Unknown command {:?}", l))?;
            Ok(session.clone())
        }
    }
}

/// Runs the poll until `q` or the end of the input.
///
/// Invalid input is reported and leaves the session as it was. So does a
/// failure of the store: the vote can be submitted again. A restart resumes
/// the topic of the store if the store keeps one across sessions.
pub fn run_poll<R: BufRead, W: Write>(
    cache: &mut CandidateCache,
    source: &CandidateSource,
    store: &mut dyn VoteStore,
    rules: &PollRules,
    columns: usize,
    input: &mut R,
    output: &mut W,
) -> PollResult<()> {
    let candidates = cache.load(source)?;
    let mut session = start_session(&candidates, store, rules, None)?;
    let mut nickname: Option<String> = None;
    let mut ctx = PollContext {
        cache,
        source,
        store,
        rules,
    };

    loop {
        show_phase(&session, &nickname, columns, output)?;
        let line = match read_line(input)? {
            Some(l) => parse_input(session.phase(), &l),
            None => {
                debug!("run_poll: end of input");
                break;
            }
        };
        if line == Input::Quit {
            break;
        }
        let step = handle(line, &session, &mut nickname, &mut ctx, output);
        match step {
            Ok(next) => session = next,
            Err(PollError::Session { source }) => say(output, &format!("Error: {}", source))?,
            Err(e @ PollError::WritingOutput { .. }) => return Err(e),
            Err(e) => {
                warn!("run_poll: {}", e);
                say(output, &format!("Error: {}", e))?;
            }
        }
    }
    Ok(())
}
