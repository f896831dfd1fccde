use log::{debug, info};

use crate::ballot::Ballot;
pub use crate::config::*;

/// The phases of a poll session.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Phase {
    /// No topic is known yet. The ballot is not shown.
    NoTopic,
    /// The ballot can be filled in and submitted.
    AwaitingVote,
    /// The vote was submitted. Only a restart leaves this phase.
    Voted,
}

/// What the user did.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Event {
    SetTopic(String),
    /// Flips the checkbox at this position (starting at 0).
    Toggle(usize),
    CheckName(String),
    Submit { voter: Option<String> },
    /// Clears the ballot, the topic and the voted flag.
    Reset,
}

/// What the host must persist before adopting the next session.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Effect {
    Nothing,
    RecordTopic(String),
    RecordVote(VoteRecord),
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Transition {
    pub session: Session,
    pub effect: Effect,
}

/// The state of one voter's session.
///
/// Sessions are values: [`Session::apply`] never modifies the current session
/// and returns the next one along with the effect to persist. If persisting
/// fails, the host simply keeps the current session.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Session {
    topic: String,
    voted: bool,
    last_vote: Option<VoteRecord>,
    ballot: Ballot,
}

impl Session {
    pub fn new(candidates: &[String]) -> Session {
        Session {
            topic: "".to_string(),
            voted: false,
            last_vote: None,
            ballot: Ballot::new(candidates),
        }
    }

    /// A session on a topic that is already recorded somewhere else.
    ///
    /// An empty topic gives a session without topic.
    pub fn with_topic(candidates: &[String], topic: &str) -> Session {
        Session {
            topic: topic.trim().to_string(),
            ..Session::new(candidates)
        }
    }

    pub fn phase(&self) -> Phase {
        if self.voted {
            Phase::Voted
        } else if self.topic.is_empty() {
            Phase::NoTopic
        } else {
            Phase::AwaitingVote
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn voted(&self) -> bool {
        self.voted
    }

    pub fn last_vote(&self) -> Option<&VoteRecord> {
        self.last_vote.as_ref()
    }

    pub fn ballot(&self) -> &Ballot {
        &self.ballot
    }

    /// The tally of the vote submitted in this session only.
    pub fn report(&self) -> Vec<TopicTally> {
        match &self.last_vote {
            Some(v) => crate::tally(std::slice::from_ref(v)),
            None => vec![],
        }
    }

    /// Computes the next session.
    pub fn apply(&self, event: Event, rules: &PollRules) -> Result<Transition, SessionError> {
        debug!("apply: phase: {:?} event: {:?}", self.phase(), event);
        match event {
            Event::SetTopic(topic) => self.set_topic(&topic),
            Event::Toggle(idx) => {
                let mut next = self.editable()?;
                next.ballot.toggle(idx)?;
                Ok(unchanged(next))
            }
            Event::CheckName(name) => {
                let mut next = self.editable()?;
                next.ballot.check_name(&name)?;
                Ok(unchanged(next))
            }
            Event::Submit { voter } => self.submit(voter, rules),
            Event::Reset => {
                info!("apply: restarting the session");
                let mut ballot = self.ballot.clone();
                ballot.clear();
                Ok(unchanged(Session {
                    topic: "".to_string(),
                    voted: false,
                    last_vote: None,
                    ballot,
                }))
            }
        }
    }

    fn set_topic(&self, topic: &str) -> Result<Transition, SessionError> {
        if self.phase() != Phase::NoTopic {
            return Err(SessionError::TopicAlreadySet);
        }
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(SessionError::EmptyTopic);
        }
        Ok(Transition {
            session: Session {
                topic: topic.to_string(),
                ..self.clone()
            },
            effect: Effect::RecordTopic(topic.to_string()),
        })
    }

    // A copy of the session whose ballot may be changed.
    fn editable(&self) -> Result<Session, SessionError> {
        match self.phase() {
            Phase::NoTopic => Err(SessionError::NoTopic),
            Phase::Voted => Err(SessionError::BallotLocked),
            Phase::AwaitingVote => Ok(self.clone()),
        }
    }

    fn submit(&self, voter: Option<String>, rules: &PollRules) -> Result<Transition, SessionError> {
        match self.phase() {
            Phase::NoTopic => return Err(SessionError::NoTopic),
            Phase::Voted => return Err(SessionError::AlreadyVoted),
            Phase::AwaitingVote => {}
        }
        let selections = self.ballot.selections();
        if selections.is_empty() {
            return Err(SessionError::NoSelection);
        }
        let voter: Option<String> = voter
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if voter.is_none() && rules.require_nickname {
            return Err(SessionError::MissingVoter);
        }
        let record = VoteRecord {
            topic: self.topic.clone(),
            voter,
            selections,
        };
        info!(
            "submit: topic: {:?} {:?} selections",
            record.topic,
            record.selections.len()
        );
        Ok(Transition {
            session: Session {
                voted: true,
                last_vote: Some(record.clone()),
                ..self.clone()
            },
            effect: Effect::RecordVote(record),
        })
    }
}

fn unchanged(session: Session) -> Transition {
    Transition {
        session,
        effect: Effect::Nothing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<String> {
        vec!["A B".to_string(), "C D".to_string(), "E F".to_string()]
    }

    fn awaiting() -> Session {
        Session::new(&candidates())
            .apply(Event::SetTopic("Gita".to_string()), &PollRules::DEFAULT_RULES)
            .unwrap()
            .session
    }

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn step(s: &Session, e: Event) -> Session {
        s.apply(e, &PollRules::DEFAULT_RULES).unwrap().session
    }

    #[test]
    fn starts_without_topic() {
        let s = Session::new(&candidates());
        assert_eq!(s.phase(), Phase::NoTopic);
        assert_eq!(s.topic(), "");
        assert!(s.report().is_empty());
    }

    #[test]
    fn topic_is_recorded() {
        let t = Session::new(&candidates())
            .apply(Event::SetTopic("  Gita  ".to_string()), &PollRules::DEFAULT_RULES)
            .unwrap();
        assert_eq!(t.effect, Effect::RecordTopic("Gita".to_string()));
        assert_eq!(t.session.phase(), Phase::AwaitingVote);
        assert_eq!(t.session.topic(), "Gita");
    }

    #[test]
    fn empty_topic_is_rejected() {
        let s = Session::new(&candidates());
        let res = s.apply(Event::SetTopic("   ".to_string()), &PollRules::DEFAULT_RULES);
        assert_eq!(res, Err(SessionError::EmptyTopic));
        assert_eq!(s.phase(), Phase::NoTopic);
    }

    #[test]
    fn topic_cannot_change_while_voting() {
        let s = awaiting();
        let res = s.apply(Event::SetTopic("Altro".to_string()), &PollRules::DEFAULT_RULES);
        assert_eq!(res, Err(SessionError::TopicAlreadySet));
    }

    #[test]
    fn ballot_hidden_without_topic() {
        let s = Session::new(&candidates());
        assert_eq!(
            s.apply(Event::Toggle(0), &PollRules::DEFAULT_RULES),
            Err(SessionError::NoTopic)
        );
        assert_eq!(
            s.apply(Event::Submit { voter: None }, &PollRules::DEFAULT_RULES),
            Err(SessionError::NoTopic)
        );
    }

    #[test]
    fn toggle_far_out_of_range() {
        let s = awaiting();
        assert!(matches!(
            s.apply(Event::Toggle(usize::MAX), &PollRules::DEFAULT_RULES),
            Err(SessionError::UnknownCandidate(_))
        ));
        assert_eq!(s.ballot().count_checked(), 0);
    }

    #[test]
    fn resumed_topic() {
        let s = Session::with_topic(&candidates(), "Gita");
        assert_eq!(s.phase(), Phase::AwaitingVote);
        assert_eq!(Session::with_topic(&candidates(), " ").phase(), Phase::NoTopic);
    }

    #[test]
    fn zero_selections_stay_awaiting() {
        let s = awaiting();
        let res = s.apply(Event::Submit { voter: None }, &PollRules::DEFAULT_RULES);
        assert_eq!(res, Err(SessionError::NoSelection));
        assert_eq!(s.phase(), Phase::AwaitingVote);
        assert!(s.last_vote().is_none());
    }

    #[test]
    fn submit_records_vote() {
        init_logs();
        let s = step(&awaiting(), Event::Toggle(2));
        let s = step(&s, Event::CheckName("A B".to_string()));
        let t = s
            .apply(
                Event::Submit {
                    voter: Some(" zorro ".to_string()),
                },
                &PollRules::DEFAULT_RULES,
            )
            .unwrap();
        let expected = VoteRecord::new(
            "Gita",
            Some("zorro"),
            &["A B".to_string(), "E F".to_string()],
        );
        assert_eq!(t.effect, Effect::RecordVote(expected.clone()));
        assert_eq!(t.session.phase(), Phase::Voted);
        assert_eq!(t.session.last_vote(), Some(&expected));
        let report = t.session.report();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].total, 2);
        assert_eq!(report[0].rows[0].percentage, 50.0);
    }

    #[test]
    fn nickname_required() {
        let rules = PollRules {
            require_nickname: true,
        };
        let s = step(&awaiting(), Event::Toggle(0));
        assert_eq!(
            s.apply(Event::Submit { voter: None }, &rules),
            Err(SessionError::MissingVoter)
        );
        assert_eq!(
            s.apply(
                Event::Submit {
                    voter: Some("  ".to_string())
                },
                &rules
            ),
            Err(SessionError::MissingVoter)
        );
        assert!(s
            .apply(
                Event::Submit {
                    voter: Some("x".to_string())
                },
                &rules
            )
            .is_ok());
    }

    #[test]
    fn blank_nickname_is_absent() {
        let s = step(&awaiting(), Event::Toggle(0));
        let t = s
            .apply(
                Event::Submit {
                    voter: Some("".to_string()),
                },
                &PollRules::DEFAULT_RULES,
            )
            .unwrap();
        assert_eq!(t.session.last_vote().unwrap().voter, None);
    }

    #[test]
    fn voted_is_read_only() {
        let s = step(&awaiting(), Event::Toggle(0));
        let s = step(&s, Event::Submit { voter: None });
        assert_eq!(
            s.apply(Event::Toggle(1), &PollRules::DEFAULT_RULES),
            Err(SessionError::BallotLocked)
        );
        assert_eq!(
            s.apply(Event::Submit { voter: None }, &PollRules::DEFAULT_RULES),
            Err(SessionError::AlreadyVoted)
        );
    }

    #[test]
    fn reset_clears_everything() {
        init_logs();
        let s = step(&awaiting(), Event::Toggle(0));
        let s = step(&s, Event::Toggle(1));
        let s = step(&s, Event::Submit { voter: None });
        let t = s.apply(Event::Reset, &PollRules::DEFAULT_RULES).unwrap();
        assert_eq!(t.effect, Effect::Nothing);
        let s = t.session;
        assert_eq!(s.phase(), Phase::NoTopic);
        assert!(!s.voted());
        assert_eq!(s.topic(), "");
        assert!(s.last_vote().is_none());
        assert_eq!(s.ballot().count_checked(), 0);
        assert_eq!(s.ballot().candidates().len(), 3);
    }
}
