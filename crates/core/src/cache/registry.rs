//! Durable record of the active cache generation per worker scope.
//!
//! The host may be torn down between any two events, so which generation
//! won the last activation lives here rather than in memory.

use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use crate::Error;

/// The generation that last activated for a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ActiveRecord {
    pub scope: String,
    pub active_generation: String,
    pub activated_at: String,
}

impl CacheDb {
    /// Get the active generation recorded for `scope`, if any.
    pub async fn active_generation(&self, scope: &str) -> Result<Option<ActiveRecord>, Error> {
        let scope = scope.to_string();
        self.conn
            .call(move |conn| -> Result<Option<ActiveRecord>, Error> {
                let result = conn.query_row(
                    "SELECT scope, active_generation, activated_at FROM registration WHERE scope = ?1",
                    params![scope],
                    |row| {
                        Ok(ActiveRecord {
                            scope: row.get(0)?,
                            active_generation: row.get(1)?,
                            activated_at: row.get(2)?,
                        })
                    },
                );

                match result {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Record `generation` as active for `scope`, replacing any previous one.
    pub async fn set_active_generation(&self, scope: &str, generation: &str) -> Result<(), Error> {
        let scope = scope.to_string();
        let generation = generation.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO registration (scope, active_generation, activated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(scope) DO UPDATE SET
                        active_generation = excluded.active_generation,
                        activated_at = excluded.activated_at",
                    params![scope, generation, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_scope() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.active_generation("http://localhost:8000/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_replaces_previous() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.set_active_generation("http://localhost:8000/", "v1").await.unwrap();
        db.set_active_generation("http://localhost:8000/", "v2").await.unwrap();
        db.set_active_generation("https://other.example/", "v9").await.unwrap();

        let record = db.active_generation("http://localhost:8000/").await.unwrap().unwrap();
        assert_eq!(record.active_generation, "v2");
    }
}
