//! Cache generation and entry operations.
//!
//! Mirrors the small surface a worker needs from persistent cache storage:
//! open/enumerate/delete named caches, match a URL, put one entry, and put a
//! whole manifest atomically.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use url::Url;

use super::connection::CacheDb;
use super::keys::{body_digest, entry_key};
use crate::Error;
use crate::network::Response;

/// A response stored in a cache generation.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct StoredResponse {
    pub cache_name: String,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers_json: String,
    #[serde(skip)]
    pub body: Vec<u8>,
    pub body_sha256: String,
    pub stored_at: String,
}

impl StoredResponse {
    /// Rebuild the response this entry was stored from.
    pub fn into_response(self) -> Result<Response, Error> {
        let url = Url::parse(&self.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", self.url)))?;
        let headers: Vec<(String, String)> = serde_json::from_str(&self.headers_json)
            .map_err(|e| Error::InvalidInput(format!("{}: corrupt stored headers: {e}", self.url)))?;
        Ok(Response {
            url,
            status: self.status,
            content_type: self.content_type,
            headers,
            body: Bytes::from(self.body),
        })
    }
}

/// Name and size of one cache generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheSummary {
    pub name: String,
    pub entries: u64,
    pub created_at: String,
}

/// Owned row ready to be written inside a `call` closure.
struct EntryRow {
    url: String,
    status: u16,
    content_type: Option<String>,
    headers_json: String,
    body: Vec<u8>,
    body_sha256: String,
}

impl EntryRow {
    fn from_response(response: &Response) -> Self {
        Self {
            url: entry_key(&response.url),
            status: response.status,
            content_type: response.content_type.clone(),
            headers_json: serde_json::to_string(&response.headers).unwrap_or_else(|_| "[]".into()),
            body: response.body.to_vec(),
            body_sha256: body_digest(&response.body),
        }
    }

    fn upsert(&self, conn: &rusqlite::Connection, cache_name: &str, now: &str) -> Result<(), Error> {
        conn.execute(
            "INSERT INTO cache_entries (
                cache_name, url, status, content_type, headers_json, body, body_sha256, stored_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(cache_name, url) DO UPDATE SET
                status = excluded.status,
                content_type = excluded.content_type,
                headers_json = excluded.headers_json,
                body = excluded.body,
                body_sha256 = excluded.body_sha256,
                stored_at = excluded.stored_at",
            params![
                cache_name,
                &self.url,
                self.status,
                &self.content_type,
                &self.headers_json,
                &self.body,
                &self.body_sha256,
                now,
            ],
        )?;
        Ok(())
    }
}

fn ensure_cache(conn: &rusqlite::Connection, name: &str, now: &str) -> Result<(), Error> {
    conn.execute("INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)", params![name, now])?;
    Ok(())
}

impl CacheDb {
    /// Create the named cache if it does not exist yet.
    pub async fn open_cache(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> { ensure_cache(conn, &name, &now) })
            .await
            .map_err(Error::from)
    }

    /// Check whether a cache with this name exists.
    pub async fn has_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM caches WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// All cache names, oldest first.
    pub async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Every cache with its entry count, oldest first.
    pub async fn cache_summaries(&self) -> Result<Vec<CacheSummary>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<CacheSummary>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT c.name, c.created_at, COUNT(e.url)
                     FROM caches c LEFT JOIN cache_entries e ON e.cache_name = c.name
                     GROUP BY c.name
                     ORDER BY c.created_at ASC, c.name ASC",
                )?;
                let summaries = stmt
                    .query_map([], |row| {
                        Ok(CacheSummary {
                            name: row.get(0)?,
                            created_at: row.get(1)?,
                            entries: row.get::<_, i64>(2)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(summaries)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a cache and all of its entries.
    ///
    /// Returns false if no cache had that name.
    pub async fn delete_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the entry stored for `url` in the named cache.
    pub async fn match_entry(&self, cache_name: &str, url: &Url) -> Result<Option<StoredResponse>, Error> {
        let cache_name = cache_name.to_string();
        let key = entry_key(url);
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT cache_name, url, status, content_type, headers_json, body, body_sha256, stored_at
                     FROM cache_entries WHERE cache_name = ?1 AND url = ?2",
                )?;

                let result = stmt.query_row(params![cache_name, key], |row| {
                    Ok(StoredResponse {
                        cache_name: row.get(0)?,
                        url: row.get(1)?,
                        status: row.get(2)?,
                        content_type: row.get(3)?,
                        headers_json: row.get(4)?,
                        body: row.get(5)?,
                        body_sha256: row.get(6)?,
                        stored_at: row.get(7)?,
                    })
                });

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or overwrite one entry in an existing cache.
    ///
    /// Last writer wins when two writes race for the same key. A cache that
    /// was deleted (or never installed) is not recreated.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheMiss` if no cache has that name.
    pub async fn put_entry(&self, cache_name: &str, response: &Response) -> Result<(), Error> {
        let cache_name = cache_name.to_string();
        let row = EntryRow::from_response(response);
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM caches WHERE name = ?1)",
                    params![cache_name],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(Error::CacheMiss(cache_name));
                }
                row.upsert(conn, &cache_name, &now)
            })
            .await
            .map_err(Error::from)
    }

    /// Create the cache and write every response in one transaction.
    ///
    /// Either all entries (and the cache itself) become visible, or none do.
    pub async fn put_all(&self, cache_name: &str, responses: &[Response]) -> Result<(), Error> {
        let cache_name = cache_name.to_string();
        let rows: Vec<EntryRow> = responses.iter().map(EntryRow::from_response).collect();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.unchecked_transaction()?;
                ensure_cache(&tx, &cache_name, &now)?;
                for row in &rows {
                    row.upsert(&tx, &cache_name, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// URLs stored in the named cache, sorted.
    pub async fn cache_keys(&self, cache_name: &str) -> Result<Vec<String>, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM cache_entries WHERE cache_name = ?1 ORDER BY url")?;
                let keys = stmt
                    .query_map(params![cache_name], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_response(url: &str, body: &str) -> Response {
        Response {
            url: Url::parse(url).unwrap(),
            status: 200,
            content_type: Some("text/html".to_string()),
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: Bytes::from(body.to_string()),
        }
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let response = make_response("https://example.com/index.html", "<h1>hi</h1>");

        db.open_cache("v1").await.unwrap();
        db.put_entry("v1", &response).await.unwrap();

        let stored = db.match_entry("v1", &response.url).await.unwrap().unwrap();
        assert_eq!(stored.status, 200);
        assert_eq!(stored.body_sha256, body_digest(b"<h1>hi</h1>"));

        let restored = stored.into_response().unwrap();
        assert_eq!(restored.body, response.body);
        assert_eq!(restored.header("Content-Type"), Some("text/html"));
    }

    #[tokio::test]
    async fn test_match_is_scoped_to_cache() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let response = make_response("https://example.com/", "root");
        db.open_cache("v1").await.unwrap();
        db.put_entry("v1", &response).await.unwrap();

        assert!(db.match_entry("v2", &response.url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_cache("v1").await.unwrap();
        db.put_entry("v1", &make_response("https://example.com/app.js", "old")).await.unwrap();
        db.put_entry("v1", &make_response("https://example.com/app.js", "new")).await.unwrap();

        let url = Url::parse("https://example.com/app.js").unwrap();
        let stored = db.match_entry("v1", &url).await.unwrap().unwrap();
        assert_eq!(stored.body, b"new".to_vec());
        assert_eq!(db.cache_keys("v1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_put_all_creates_cache() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let responses = vec![
            make_response("https://example.com/", "root"),
            make_response("https://example.com/style.css", "css"),
        ];

        db.put_all("v1", &responses).await.unwrap();

        assert!(db.has_cache("v1").await.unwrap());
        assert_eq!(
            db.cache_keys("v1").await.unwrap(),
            vec!["https://example.com/".to_string(), "https://example.com/style.css".to_string()]
        );
    }

    #[tokio::test]
    async fn test_delete_cache_drops_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_cache("old").await.unwrap();
        db.put_entry("old", &make_response("https://example.com/", "root")).await.unwrap();
        db.open_cache("new").await.unwrap();

        assert!(db.delete_cache("old").await.unwrap());
        assert!(!db.delete_cache("old").await.unwrap());

        assert_eq!(db.cache_names().await.unwrap(), vec!["new".to_string()]);
        assert!(db.cache_keys("old").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_summaries_count_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_cache("empty").await.unwrap();
        db.open_cache("full").await.unwrap();
        db.put_entry("full", &make_response("https://example.com/a.png", "a")).await.unwrap();
        db.put_entry("full", &make_response("https://example.com/b.png", "b")).await.unwrap();

        let summaries = db.cache_summaries().await.unwrap();
        let full = summaries.iter().find(|s| s.name == "full").unwrap();
        let empty = summaries.iter().find(|s| s.name == "empty").unwrap();
        assert_eq!(full.entries, 2);
        assert_eq!(empty.entries, 0);
    }

    #[tokio::test]
    async fn test_put_entry_does_not_recreate_deleted_cache() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_cache("v1").await.unwrap();
        db.open_cache("v2").await.unwrap();
        db.delete_cache("v1").await.unwrap();

        let result = db.put_entry("v1", &make_response("https://example.com/app.js", "late")).await;

        assert!(matches!(result, Err(Error::CacheMiss(name)) if name == "v1"));
        assert_eq!(db.cache_names().await.unwrap(), vec!["v2".to_string()]);
        assert!(db.cache_keys("v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_headers_are_an_error() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let response = make_response("https://example.com/", "root");
        db.open_cache("v1").await.unwrap();
        db.put_entry("v1", &response).await.unwrap();

        let mut stored = db.match_entry("v1", &response.url).await.unwrap().unwrap();
        stored.headers_json = "{not json".to_string();

        assert!(matches!(stored.into_response(), Err(Error::InvalidInput(msg)) if msg.contains("headers")));
    }
}
