use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use crate::app::{BroadsheetError, Result};
use crate::store::{cache_key, CachedResponse, ResponseCache};

pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.run_migrations()?;
        Ok(cache)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.run_migrations()?;
        Ok(cache)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.lock()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| BroadsheetError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            BroadsheetError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    /// Delete copies fetched before `cutoff`.
    pub fn prune(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM responses WHERE fetched_at < ?1",
            params![Self::format_datetime(cutoff)],
        )?;
        Ok(removed)
    }

    /// Fixed-width UTC timestamps so that text order is time order.
    fn format_datetime(dt: DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }
}

impl ResponseCache for SqliteCache {
    fn get(&self, url: &str) -> Result<Option<CachedResponse>> {
        let conn = self.lock()?;

        let result = conn
            .query_row(
                "SELECT body, total, total_pages, fetched_at FROM responses WHERE key = ?1",
                params![cache_key(url)],
                |row| {
                    Ok(CachedResponse {
                        body: row.get(0)?,
                        total: row.get::<_, Option<i64>>(1)?.map(|t| t.max(0) as u64),
                        total_pages: row.get::<_, Option<i64>>(2)?.map(|t| t.max(0) as u32),
                        fetched_at: row
                            .get::<_, String>(3)
                            .ok()
                            .and_then(|s| Self::parse_datetime(&s))
                            .unwrap_or_else(Utc::now),
                    })
                },
            )
            .optional()?;

        Ok(result)
    }

    fn put(&self, url: &str, response: &CachedResponse) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO responses (key, url, body, total, total_pages, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(key) DO UPDATE SET
                body = excluded.body,
                total = excluded.total,
                total_pages = excluded.total_pages,
                fetched_at = excluded.fetched_at",
            params![
                cache_key(url),
                url,
                response.body,
                response.total.map(|t| t as i64),
                response.total_pages.map(i64::from),
                Self::format_datetime(response.fetched_at)
            ],
        )?;

        Ok(())
    }

    fn clear(&self) -> Result<usize> {
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM responses", [])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> CachedResponse {
        CachedResponse {
            body: body.as_bytes().to_vec(),
            total: Some(40),
            total_pages: Some(4),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_put_and_get() {
        let cache = SqliteCache::in_memory().unwrap();
        let url = "https://example.com/wp-json/wp/v2/posts?page=1&per_page=12&_embed";
        cache.put(url, &response("[]")).unwrap();

        let cached = cache.get(url).unwrap().unwrap();
        assert_eq!(cached.body, b"[]");
        assert_eq!(cached.total, Some(40));
        assert_eq!(cached.total_pages, Some(4));
    }

    #[test]
    fn test_miss_returns_none() {
        let cache = SqliteCache::in_memory().unwrap();
        assert!(cache.get("https://example.com/nothing").unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let cache = SqliteCache::in_memory().unwrap();
        let url = "https://example.com/wp-json/wp/v2/posts/1?_embed";
        cache.put(url, &response("old")).unwrap();
        cache.put(url, &response("new")).unwrap();
        assert_eq!(cache.get(url).unwrap().unwrap().body, b"new");
    }

    #[test]
    fn test_clear() {
        let cache = SqliteCache::in_memory().unwrap();
        cache.put("https://example.com/a", &response("a")).unwrap();
        cache.put("https://example.com/b", &response("b")).unwrap();
        assert_eq!(cache.clear().unwrap(), 2);
        assert!(cache.get("https://example.com/a").unwrap().is_none());
    }

    #[test]
    fn test_prune_removes_old_copies() {
        let cache = SqliteCache::in_memory().unwrap();
        let mut old = response("old");
        old.fetched_at = Utc::now() - chrono::Duration::days(45);
        cache.put("https://example.com/old", &old).unwrap();
        cache.put("https://example.com/new", &response("new")).unwrap();

        let removed = cache.prune(Utc::now() - chrono::Duration::days(30)).unwrap();
        assert_eq!(removed, 1);
        assert!(cache.get("https://example.com/old").unwrap().is_none());
        assert!(cache.get("https://example.com/new").unwrap().is_some());
    }

    #[test]
    fn test_file_backed_cache_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.db");
        {
            let cache = SqliteCache::new(&path).unwrap();
            cache.put("https://example.com/a", &response("kept")).unwrap();
        }
        let reopened = SqliteCache::new(&path).unwrap();
        assert_eq!(reopened.get("https://example.com/a").unwrap().unwrap().body, b"kept");
    }
}
