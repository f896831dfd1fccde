// The votes, as a single JSON array in a file.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::poll::store::VoteStore;
use crate::poll::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
struct StoredVote {
    tematica: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nickname: Option<String>,
    voti: Vec<String>,
}

/// A store backed by a JSON file.
///
/// The topic is not written on its own: it only lives in memory until the
/// session restarts, and it is written along with each vote.
pub struct JsonStore {
    path: PathBuf,
    topic: String,
}

impl JsonStore {
    pub fn new<P: AsRef<Path>>(path: P) -> JsonStore {
        JsonStore {
            path: path.as_ref().to_path_buf(),
            topic: "".to_string(),
        }
    }

    fn path_str(&self) -> String {
        self.path.display().to_string()
    }

    // A missing file holds no vote. A file that is not a JSON array of votes
    // is overwritten with an empty array: its content is lost.
    fn read_votes(&self) -> PollResult<Vec<StoredVote>> {
        if !self.path.exists() {
            debug!("read_votes: {:?} does not exist yet", self.path);
            return Ok(vec![]);
        }
        let contents = fs::read(&self.path).context(OpeningJsonSnafu {
            path: self.path_str(),
        })?;
        match serde_json::from_slice::<Vec<StoredVote>>(&contents) {
            Ok(votes) => Ok(votes),
            Err(e) => {
                warn!(
                    "The votes file {} is malformed ({}), replacing it with an empty list",
                    self.path_str(),
                    e
                );
                self.write_votes(&[])?;
                Ok(vec![])
            }
        }
    }

    // Writes to a temporary file next to the target, then renames it over the
    // target. Readers see either the old or the new content.
    fn write_votes(&self, votes: &[StoredVote]) -> PollResult<()> {
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let path = self.path_str();
        let mut tmp = NamedTempFile::new_in(&dir).context(WritingVotesSnafu { path: &path })?;
        serde_json::to_writer_pretty(&mut tmp, votes).context(ParsingJsonSnafu {})?;
        tmp.write_all(b"\n")
            .context(WritingVotesSnafu { path: &path })?;
        tmp.persist(&self.path)
            .context(PersistingVotesSnafu { path: &path })?;
        Ok(())
    }
}

impl VoteStore for JsonStore {
    fn name(&self) -> String {
        format!("json:{}", self.path_str())
    }

    fn record_topic(&mut self, topic: &str) -> PollResult<()> {
        self.topic = topic.to_string();
        Ok(())
    }

    fn current_topic(&self) -> PollResult<String> {
        Ok(self.topic.clone())
    }

    fn restart_session(&mut self) -> PollResult<()> {
        debug!("restart_session: forgetting topic {:?}", self.topic);
        self.topic.clear();
        Ok(())
    }

    fn record_vote(
        &mut self,
        topic: &str,
        voter: Option<&str>,
        selections: &[String],
    ) -> PollResult<()> {
        // TODO: lock the file, two concurrent writers can still lose a vote.
        let mut votes = self.read_votes()?;
        votes.push(StoredVote {
            tematica: topic.to_string(),
            nickname: voter.map(|s| s.to_string()),
            voti: selections.to_vec(),
        });
        debug!("record_vote: {} votes in {}", votes.len(), self.path_str());
        self.write_votes(&votes)
    }

    fn all_votes(&self) -> PollResult<Vec<VoteRecord>> {
        let votes = self.read_votes()?;
        Ok(votes
            .into_iter()
            .map(|v| VoteRecord {
                topic: v.tematica,
                voter: v.nickname,
                selections: v.voti,
            })
            .collect())
    }
}
