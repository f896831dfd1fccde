// The votes, in a MySQL or SQLite database.

use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row, ValueRef};
use tokio::runtime::Runtime;

use crate::poll::store::VoteStore;
use crate::poll::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum Dialect {
    MySql,
    Sqlite,
}

impl Dialect {
    fn from_url(url: &str) -> PollResult<Dialect> {
        if url.starts_with("mysql:") || url.starts_with("mariadb:") {
            Ok(Dialect::MySql)
        } else if url.starts_with("sqlite:") {
            Ok(Dialect::Sqlite)
        } else {
            UnsupportedDatabaseSnafu {
                url: redact(url),
            }
            .fail()
        }
    }

    // SQLite databases are created on first use, unless the URL sets a mode.
    fn connect_url(&self, url: &str) -> String {
        match self {
            Dialect::Sqlite if !url.contains(":memory:") && !url.contains("mode=") => {
                let sep = if url.contains('?') { '&' } else { '?' };
                format!("{}{}mode=rwc", url, sep)
            }
            _ => url.to_string(),
        }
    }

    fn create_tables(&self) -> [&'static str; 2] {
        match self {
            Dialect::MySql => [
                r#"
                CREATE TABLE IF NOT EXISTS tematica_votazione (
                    id BIGINT AUTO_INCREMENT PRIMARY KEY,
                    tematica TEXT NOT NULL,
                    aggiornata_il TIMESTAMP DEFAULT CURRENT_TIMESTAMP
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS voti (
                    id BIGINT AUTO_INCREMENT PRIMARY KEY,
                    tematica TEXT NOT NULL,
                    nickname VARCHAR(255),
                    voti TEXT NOT NULL
                )
                "#,
            ],
            Dialect::Sqlite => [
                r#"
                CREATE TABLE IF NOT EXISTS tematica_votazione (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    tematica TEXT NOT NULL,
                    aggiornata_il TIMESTAMP DEFAULT CURRENT_TIMESTAMP
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS voti (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    tematica TEXT NOT NULL,
                    nickname TEXT,
                    voti TEXT NOT NULL
                )
                "#,
            ],
        }
    }
}

// Hides the credentials of a database URL.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

/// A store backed by two SQL tables, one for the topics and one for the votes.
///
/// The program is synchronous: the store runs its own single-threaded runtime
/// and blocks on every query.
pub struct SqlStore {
    pool: AnyPool,
    rt: Runtime,
    url: String,
}

impl SqlStore {
    pub fn connect(url: &str) -> PollResult<SqlStore> {
        let dialect = Dialect::from_url(url)?;
        sqlx::any::install_default_drivers();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context(DatabaseRuntimeSnafu {})?;
        info!("Connecting to {}", redact(url));
        // A single connection, kept for the whole run. This also keeps
        // in-memory SQLite databases alive.
        let pool = rt
            .block_on(
                AnyPoolOptions::new()
                    .max_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect(&dialect.connect_url(url)),
            )
            .context(DatabaseSnafu {})?;
        for stmt in dialect.create_tables() {
            rt.block_on(sqlx::query(stmt).execute(&pool))
                .context(DatabaseSnafu {})?;
        }
        Ok(SqlStore {
            pool,
            rt,
            url: redact(url),
        })
    }
}

impl Drop for SqlStore {
    fn drop(&mut self) {
        self.rt.block_on(self.pool.close());
    }
}

// The Any driver does not decode NULL into an Option: check for it first.
fn read_nickname(row: &AnyRow) -> PollResult<Option<String>> {
    let raw = row.try_get_raw("nickname").context(DatabaseSnafu {})?;
    if raw.is_null() {
        return Ok(None);
    }
    let nickname: String = row.try_get("nickname").context(DatabaseSnafu {})?;
    Ok(Some(nickname))
}

impl VoteStore for SqlStore {
    fn name(&self) -> String {
        format!("sql:{}", self.url)
    }

    fn record_topic(&mut self, topic: &str) -> PollResult<()> {
        self.rt
            .block_on(
                sqlx::query("INSERT INTO tematica_votazione (tematica) VALUES (?)")
                    .bind(topic)
                    .execute(&self.pool),
            )
            .context(DatabaseSnafu {})?;
        info!("record_topic: {:?}", topic);
        Ok(())
    }

    fn current_topic(&self) -> PollResult<String> {
        let row = self
            .rt
            .block_on(
                sqlx::query(
                    "SELECT tematica FROM tematica_votazione ORDER BY aggiornata_il DESC, id DESC LIMIT 1",
                )
                .fetch_optional(&self.pool),
            )
            .context(DatabaseSnafu {})?;
        match row {
            Some(r) => r.try_get::<String, _>("tematica").context(DatabaseSnafu {}),
            None => Ok("".to_string()),
        }
    }

    fn record_vote(
        &mut self,
        topic: &str,
        voter: Option<&str>,
        selections: &[String],
    ) -> PollResult<()> {
        let voti = serde_json::to_string(selections).context(ParsingJsonSnafu {})?;
        self.rt
            .block_on(
                sqlx::query("INSERT INTO voti (tematica, nickname, voti) VALUES (?, ?, ?)")
                    .bind(topic)
                    .bind(voter)
                    .bind(voti)
                    .execute(&self.pool),
            )
            .context(DatabaseSnafu {})?;
        Ok(())
    }

    fn all_votes(&self) -> PollResult<Vec<VoteRecord>> {
        let rows = self
            .rt
            .block_on(
                sqlx::query("SELECT id, tematica, nickname, voti FROM voti ORDER BY id")
                    .fetch_all(&self.pool),
            )
            .context(DatabaseSnafu {})?;
        let mut res: Vec<VoteRecord> = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            let id: i64 = row.try_get("id").context(DatabaseSnafu {})?;
            let voti: String = row.try_get("voti").context(DatabaseSnafu {})?;
            let selections: Vec<String> =
                serde_json::from_str(&voti).context(DecodingSelectionsSnafu { id })?;
            res.push(VoteRecord {
                topic: row.try_get("tematica").context(DatabaseSnafu {})?,
                voter: read_nickname(row)?,
                selections,
            });
        }
        debug!("all_votes: {} votes", res.len());
        Ok(res)
    }
}
