// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// A single submission, as it is persisted by a vote store.
///
/// The selections are kept in the order in which they were presented to the
/// voter. Nothing checks that a selection is a registered candidate.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct VoteRecord {
    /// The topic (tematica) this vote was cast under.
    pub topic: String,
    /// A free-text voter tag. It is not checked for uniqueness.
    pub voter: Option<String>,
    pub selections: Vec<String>,
}

impl VoteRecord {
    pub fn new(topic: &str, voter: Option<&str>, selections: &[String]) -> VoteRecord {
        VoteRecord {
            topic: topic.to_string(),
            voter: voter.map(|s| s.to_string()),
            selections: selections.to_vec(),
        }
    }
}

// ******** Output data structures *********

/// One line of a tally.
#[derive(PartialEq, Debug, Clone)]
pub struct TallyRow {
    pub candidate: String,
    pub count: u64,
    /// Between 0 and 100. Zero when the topic has no selection at all.
    pub percentage: f64,
}

/// The tally of all the votes cast under one topic.
///
/// Rows are sorted by decreasing count. Candidates with the same count keep
/// the order in which they were first seen.
#[derive(PartialEq, Debug, Clone)]
pub struct TopicTally {
    pub topic: String,
    /// The number of individual selections, across all the ballots.
    pub total: u64,
    pub rows: Vec<TallyRow>,
}

/// Validation errors raised by the session. None of them changes the state
/// of the session.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SessionError {
    /// The topic is empty or only made of whitespace.
    EmptyTopic,
    /// The action requires a topic, and none is set yet.
    NoTopic,
    TopicAlreadySet,
    /// The candidate index or name does not exist on the ballot.
    UnknownCandidate(String),
    NoSelection,
    MissingVoter,
    AlreadyVoted,
    /// The ballot has been submitted and cannot be changed until a restart.
    BallotLocked,
}

impl Error for SessionError {}

impl Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::EmptyTopic => write!(f, "please enter the topic of the poll to proceed"),
            SessionError::NoTopic => write!(f, "no topic is set for this poll"),
            SessionError::TopicAlreadySet => write!(f, "the topic of this poll is already set"),
            SessionError::UnknownCandidate(c) => write!(f, "unknown candidate: {}", c),
            SessionError::NoSelection => write!(f, "you must select at least one candidate"),
            SessionError::MissingVoter => write!(f, "you must enter a nickname"),
            SessionError::AlreadyVoted => write!(f, "you have already voted"),
            SessionError::BallotLocked => {
                write!(f, "the ballot was already submitted, restart the poll first")
            }
        }
    }
}

// ********* Configuration **********

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PollRules {
    /// If true, a vote must carry a non-empty voter tag.
    pub require_nickname: bool,
}

impl PollRules {
    pub const DEFAULT_RULES: PollRules = PollRules {
        require_nickname: false,
    };
}
