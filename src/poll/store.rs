use crate::poll::config_reader::StoreSettings;
use crate::poll::store_json::JsonStore;
use crate::poll::store_sql::SqlStore;
use crate::poll::*;

pub const JSON_PROVIDER: &str = "json";
pub const SQL_PROVIDER: &str = "sql";

/// Where the votes go.
///
/// Stores are append-only: a vote or a topic, once recorded, is never changed.
/// Nothing coordinates two programs writing to the same store.
pub trait VoteStore {
    /// A short description, for the logs.
    fn name(&self) -> String;

    /// Records a new topic. It becomes the current topic.
    fn record_topic(&mut self, topic: &str) -> PollResult<()>;

    /// The last recorded topic, or an empty string.
    fn current_topic(&self) -> PollResult<String>;

    /// Called when a session is reset. Stores that only keep the topic for
    /// the length of a session forget it here.
    fn restart_session(&mut self) -> PollResult<()> {
        Ok(())
    }

    fn record_vote(
        &mut self,
        topic: &str,
        voter: Option<&str>,
        selections: &[String],
    ) -> PollResult<()>;

    /// All the votes, in the order in which they were recorded.
    fn all_votes(&self) -> PollResult<Vec<VoteRecord>>;
}

pub fn open_store(settings: &StoreSettings) -> PollResult<Box<dyn VoteStore>> {
    let store: Box<dyn VoteStore> = match settings.provider.as_str() {
        JSON_PROVIDER => match &settings.file_path {
            Some(p) => Box::new(JsonStore::new(p)),
            None => whatever!("The json store needs a file path"),
        },
        SQL_PROVIDER => match &settings.database_url {
            Some(url) => Box::new(SqlStore::connect(url)?),
            None => whatever!("The sql store needs a database URL"),
        },
        x => whatever!("Unknown store {:?}: use json or sql", x),
    };
    info!("Using store {}", store.name());
    Ok(store)
}
