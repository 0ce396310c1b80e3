use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use docmatch_core::{ItemId, MatchCandidate, MatchCriteria, MatchId, MatchStatus, NewMatch};
use docmatch_matching::{CreateOutcome, MatchStore, StoreError};
use docmatch_ocr::{CacheError, RecognitionCache, RecognitionResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::{debug, warn};

pub type DbPool = Pool<Sqlite>;

type CandidateRow = (i64, i64, i64, f64, String, String, String);

const CANDIDATE_COLUMNS: &str =
    "id, lost_ref, found_ref, confidence_score, match_criteria, status, created_at";

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA cache_size = -32000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS match_candidates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lost_ref INTEGER NOT NULL,
            found_ref INTEGER NOT NULL,
            confidence_score REAL NOT NULL,
            match_criteria TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL,
            UNIQUE (lost_ref, found_ref)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recognition_cache (
            key TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            expires_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// SQLite-backed match store and recognition cache sharing one pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        Ok(Self { pool: create_db(path).await? })
    }

    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn candidate_for_pair(&self, lost: ItemId, found: ItemId) -> Result<Option<MatchCandidate>, StoreError> {
        let row = sqlx::query_as::<_, CandidateRow>(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM match_candidates WHERE lost_ref = ? AND found_ref = ?"
        ))
        .bind(lost.0)
        .bind(found.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        row.map(candidate_from_row).transpose()
    }

    pub async fn get_candidate(&self, id: MatchId) -> Result<Option<MatchCandidate>, StoreError> {
        let row = sqlx::query_as::<_, CandidateRow>(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM match_candidates WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        row.map(candidate_from_row).transpose()
    }

    /// Moves a candidate through the review workflow. Returns false when no
    /// row has that id.
    pub async fn update_candidate_status(&self, id: MatchId, status: MatchStatus) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE match_candidates SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(query_error)?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes cache rows whose TTL has passed.
    pub async fn purge_expired_cache(&self) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM recognition_cache WHERE expires_at <= ?")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(cache_error)?;
        Ok(result.rows_affected())
    }
}

fn query_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

fn cache_error(e: sqlx::Error) -> CacheError {
    CacheError::Unavailable(e.to_string())
}

fn candidate_from_row(r: CandidateRow) -> Result<MatchCandidate, StoreError> {
    let match_criteria: MatchCriteria = serde_json::from_str(&r.4)
        .map_err(|e| StoreError::Query(format!("candidate {} has unreadable criteria: {e}", r.0)))?;
    let status = MatchStatus::from_str(&r.5).map_err(StoreError::Query)?;
    let created_at = DateTime::parse_from_rfc3339(&r.6)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("candidate {} has bad created_at: {e}", r.0)))?;

    Ok(MatchCandidate {
        id: MatchId(r.0),
        lost_ref: ItemId(r.1),
        found_ref: ItemId(r.2),
        confidence_score: r.3 as f32,
        match_criteria,
        status,
        created_at,
    })
}

impl MatchStore for SqliteStore {
    async fn create_if_absent(&self, new: NewMatch) -> Result<CreateOutcome, StoreError> {
        let criteria = serde_json::to_string(&new.match_criteria)
            .map_err(|e| StoreError::Query(format!("failed to encode criteria: {e}")))?;
        let created_at = Utc::now();

        // The unique pair index makes the insert the arbiter of concurrent
        // creations; a conflicting insert returns no row.
        let inserted = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO match_candidates
                (lost_ref, found_ref, confidence_score, match_criteria, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (lost_ref, found_ref) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new.lost_ref.0)
        .bind(new.found_ref.0)
        .bind(new.confidence_score as f64)
        .bind(&criteria)
        .bind(MatchStatus::Pending.to_string())
        .bind(created_at.to_rfc3339())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        if let Some((id,)) = inserted {
            debug!(match_id = id, lost = %new.lost_ref, found = %new.found_ref, "candidate inserted");
            return Ok(CreateOutcome::Created(MatchCandidate::from_new(MatchId(id), new, created_at)));
        }

        match self.candidate_for_pair(new.lost_ref, new.found_ref).await? {
            Some(existing) => Ok(CreateOutcome::AlreadyExists(existing)),
            None => Err(StoreError::Query(format!(
                "insert of pair ({}, {}) conflicted but no row was found",
                new.lost_ref, new.found_ref
            ))),
        }
    }

    async fn list_candidates(&self) -> Result<Vec<MatchCandidate>, StoreError> {
        let rows = sqlx::query_as::<_, CandidateRow>(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM match_candidates ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        rows.into_iter().map(candidate_from_row).collect()
    }
}

impl RecognitionCache for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<RecognitionResult>, CacheError> {
        let row = sqlx::query_as::<_, (String, i64)>(
            "SELECT payload, expires_at FROM recognition_cache WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(cache_error)?;

        let Some((payload, expires_at)) = row else {
            return Ok(None);
        };
        if expires_at <= Utc::now().timestamp() {
            return Ok(None);
        }
        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|e| CacheError::Corrupt { key: key.to_string(), message: e.to_string() })
    }

    async fn put(&self, key: &str, result: &RecognitionResult, ttl: Duration) -> Result<(), CacheError> {
        let payload = serde_json::to_string(result)
            .map_err(|e| CacheError::Corrupt { key: key.to_string(), message: e.to_string() })?;
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp().saturating_add(ttl_secs);

        sqlx::query(
            r#"
            INSERT INTO recognition_cache (key, payload, expires_at) VALUES (?, ?, ?)
            ON CONFLICT (key) DO UPDATE SET payload = excluded.payload, expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(&payload)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(key, error = %e, "cache write failed");
            cache_error(e)
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmatch_core::AppliedWeight;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn open_store() -> (TempDir, SqliteStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&dir.path().join("docmatch.db")).await.unwrap();
        (dir, store)
    }

    fn new_match(lost: i64, found: i64, score: f32) -> NewMatch {
        NewMatch {
            lost_ref: ItemId(lost),
            found_ref: ItemId(found),
            confidence_score: score,
            match_criteria: MatchCriteria::basic(vec![AppliedWeight {
                field: "document_number".into(),
                weight: 0.15,
                similarity: 1.0,
                contribution: 0.15,
            }]),
        }
    }

    #[tokio::test]
    async fn create_if_absent_is_idempotent_per_pair() {
        let (_dir, store) = open_store().await;

        let first = store.create_if_absent(new_match(1, 2, 0.9)).await.unwrap();
        assert!(first.is_created());
        assert_eq!(first.candidate().status, MatchStatus::Pending);

        let second = store.create_if_absent(new_match(1, 2, 0.4)).await.unwrap();
        assert!(!second.is_created());
        assert_eq!(second.candidate().id, first.candidate().id);
        assert!((second.candidate().confidence_score - 0.9).abs() < 1e-6);
        assert_eq!(second.candidate().match_criteria, first.candidate().match_criteria);

        let other = store.create_if_absent(new_match(1, 3, 0.7)).await.unwrap();
        assert!(other.is_created());
        assert_eq!(store.list_candidates().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_creations_leave_one_row() {
        let (_dir, store) = open_store().await;
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let outcome = store.create_if_absent(new_match(5, 6, 0.8)).await.unwrap();
                outcome.is_created()
            }));
        }
        let mut created = 0;
        for h in handles {
            if h.await.unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.list_candidates().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn status_updates_persist() {
        let (_dir, store) = open_store().await;
        let id = store.create_if_absent(new_match(1, 2, 0.9)).await.unwrap().candidate().id;

        assert!(store.update_candidate_status(id, MatchStatus::Confirmed).await.unwrap());
        let reloaded = store.get_candidate(id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, MatchStatus::Confirmed);
        assert!(!store.update_candidate_status(MatchId(999), MatchStatus::Rejected).await.unwrap());
    }

    #[tokio::test]
    async fn candidates_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docmatch.db");
        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.create_if_absent(new_match(1, 2, 0.9)).await.unwrap();
            store.pool().close().await;
        }
        let store = SqliteStore::open(&path).await.unwrap();
        let outcome = store.create_if_absent(new_match(1, 2, 0.9)).await.unwrap();
        assert!(!outcome.is_created());
    }

    #[tokio::test]
    async fn cache_round_trip_and_expiry() {
        let (_dir, store) = open_store().await;
        let result = RecognitionResult::degraded(0.2);

        assert!(store.get("ocr:abc").await.unwrap().is_none());
        store.put("ocr:abc", &result, Duration::from_secs(3600)).await.unwrap();
        assert_eq!(store.get("ocr:abc").await.unwrap(), Some(result.clone()));

        store.put("ocr:old", &result, Duration::ZERO).await.unwrap();
        assert!(store.get("ocr:old").await.unwrap().is_none());
        assert_eq!(store.purge_expired_cache().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn cached_results_come_back_bit_identical() {
        let (_dir, store) = open_store().await;
        let nanos = [2_729_756_367u64, 1, 999_999_999, 123_456_789_012, 4_100_000_001];
        for (i, n) in nanos.into_iter().enumerate() {
            let mut result = RecognitionResult::degraded(Duration::from_nanos(n).as_secs_f64());
            result.raw_text = "NOM: DIALLO".into();
            result.confidence_score = 0.1 + i as f32 / 7.0;

            let key = format!("ocr:{i}");
            store.put(&key, &result, Duration::from_secs(60)).await.unwrap();
            let cached = store.get(&key).await.unwrap().unwrap();
            assert_eq!(cached, result);
            assert_eq!(cached.processing_time.to_bits(), result.processing_time.to_bits());
        }
    }

    #[tokio::test]
    async fn huge_ttl_saturates_instead_of_overflowing() {
        let (_dir, store) = open_store().await;
        let result = RecognitionResult::degraded(0.5);
        store.put("ocr:forever", &result, Duration::MAX).await.unwrap();
        assert_eq!(store.get("ocr:forever").await.unwrap(), Some(result));
    }

    #[tokio::test]
    async fn corrupt_cache_payload_is_reported() {
        let (_dir, store) = open_store().await;
        sqlx::query("INSERT INTO recognition_cache (key, payload, expires_at) VALUES (?, ?, ?)")
            .bind("ocr:bad")
            .bind("{not json")
            .bind(Utc::now().timestamp() + 3600)
            .execute(store.pool())
            .await
            .unwrap();

        let err = store.get("ocr:bad").await.unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }
}
