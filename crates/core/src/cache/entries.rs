//! Avatar entry operations on the SQLite store.

use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::SqliteStore;
use super::{CacheEntry, CacheStore, EntryKey};
use crate::{Error, ResolvedUrl};

fn format_timestamp(at: SystemTime) -> String {
    DateTime::<Utc>::from(at).to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(domain: &str, text: &str) -> Result<SystemTime, Error> {
    DateTime::parse_from_rfc3339(text)
        .map(|at| SystemTime::from(at.with_timezone(&Utc)))
        .map_err(|e| Error::CorruptEntry(format!("{domain}: bad written_at {text:?}: {e}")))
}

impl SqliteStore {
    /// Insert or replace the entry for `key` with an explicit write time.
    ///
    /// Uses UPSERT semantics so a domain never has more than one row.
    pub async fn put_at(&self, key: &EntryKey, url: &ResolvedUrl, written_at: SystemTime) -> Result<(), Error> {
        let domain = key.domain().to_string();
        let url = url.as_str().to_string();
        let written_at = format_timestamp(written_at);
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO avatars (domain, url, written_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(domain) DO UPDATE SET
                        url = excluded.url,
                        written_at = excluded.written_at",
                    params![domain, url, written_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn get(&self, key: &EntryKey) -> Result<Option<CacheEntry>, Error> {
        let domain = key.domain().to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare("SELECT url, written_at FROM avatars WHERE domain = ?1")?;

                let result = stmt.query_row(params![domain], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                });

                match result {
                    Ok((url, written_at)) => Ok(Some(CacheEntry {
                        url: ResolvedUrl::from_stored(&url),
                        written_at: parse_timestamp(&domain, &written_at)?,
                    })),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, key: &EntryKey, url: &ResolvedUrl) -> Result<(), Error> {
        self.put_at(key, url, SystemTime::now()).await
    }

    async fn remove(&self, key: &EntryKey) -> Result<(), Error> {
        let domain = key.domain().to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM avatars WHERE domain = ?1", params![domain])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
