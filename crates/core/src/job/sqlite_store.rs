//! SQLite-backed job ledger.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::{Job, JobError, JobKind, JobStatus, JobStore, NewJob};

const JOB_COLUMNS: &str = "job_id, job_kind, status, target_path, source_paths, output_path, error_message, created_at, updated_at";

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, JobError> {
        let conn = Connection::open(path).map_err(|e| JobError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, JobError> {
        let conn = Connection::open_in_memory().map_err(|e| JobError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                job_id TEXT PRIMARY KEY,
                job_kind TEXT NOT NULL,
                status TEXT NOT NULL,
                target_path TEXT NOT NULL,
                source_paths TEXT NOT NULL DEFAULT '[]',
                reserved_output_path TEXT,
                output_path TEXT,
                error_message TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            "#,
        )
        .map_err(|e| JobError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, JobError> {
        self.conn
            .lock()
            .map_err(|_| JobError::Database("job store connection lock poisoned".to_string()))
    }

    fn timestamp(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let kind: String = row.get(1)?;
        let status: String = row.get(2)?;
        let source_paths_json: String = row.get(4)?;
        let created_at: String = row.get(7)?;
        let updated_at: String = row.get(8)?;

        let kind = kind
            .parse::<JobKind>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?;
        let status = status
            .parse::<JobStatus>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into()))?;
        let source_paths: Vec<String> = serde_json::from_str(&source_paths_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

        Ok(Job {
            job_id: row.get(0)?,
            kind,
            status,
            target_path: row.get(3)?,
            source_paths,
            output_path: row.get(5)?,
            error_message: row.get(6)?,
            created_at: Self::parse_timestamp(7, &created_at)?,
            updated_at: Self::parse_timestamp(8, &updated_at)?,
        })
    }

    /// Current time at the precision the ledger stores.
    fn now() -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }

    fn invalid(job_id: &str, reason: &str) -> JobError {
        JobError::InvalidUpdate {
            job_id: job_id.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, job: NewJob) -> Result<Job, JobError> {
        if job.job_id.is_empty() {
            return Err(Self::invalid(&job.job_id, "job id cannot be empty"));
        }

        let source_paths_json = serde_json::to_string(&job.source_paths)
            .map_err(|e| JobError::Database(e.to_string()))?;
        let now = Self::now();
        let now_str = Self::timestamp(now);

        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT INTO jobs (job_id, job_kind, status, target_path, source_paths, reserved_output_path, output_path, error_message, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?)",
            params![
                job.job_id,
                job.kind.as_str(),
                JobStatus::Submitted.as_str(),
                job.target_path,
                source_paths_json,
                job.reserved_output_path,
                now_str,
                now_str,
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(JobError::AlreadyExists(job.job_id));
            }
            Err(e) => return Err(JobError::Database(e.to_string())),
        }

        Ok(Job {
            job_id: job.job_id,
            kind: job.kind,
            status: JobStatus::Submitted,
            target_path: job.target_path,
            source_paths: job.source_paths,
            output_path: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        output_path: Option<&str>,
        error: Option<&str>,
    ) -> Result<Job, JobError> {
        let output_path = output_path.filter(|p| !p.is_empty());
        let error = error.filter(|e| !e.is_empty());

        match status {
            JobStatus::Failed if error.is_none() => {
                return Err(Self::invalid(job_id, "failed status needs an error message"));
            }
            JobStatus::Failed => {}
            _ if error.is_some() => {
                return Err(Self::invalid(job_id, "only failed jobs carry an error message"));
            }
            _ => {}
        }
        if output_path.is_some() && status != JobStatus::Completed {
            return Err(Self::invalid(job_id, "only completed jobs carry an output path"));
        }

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| JobError::Database(e.to_string()))?;

        let current = tx
            .query_row(
                &format!(
                    "SELECT {}, reserved_output_path FROM jobs WHERE job_id = ?",
                    JOB_COLUMNS
                ),
                params![job_id],
                |row| Ok((Self::row_to_job(row)?, row.get::<_, Option<String>>(9)?)),
            )
            .optional()
            .map_err(|e| JobError::Database(e.to_string()))?;

        let (current, reserved) = match current {
            Some(found) => found,
            None => return Err(JobError::NotFound(job_id.to_string())),
        };

        if !current.status.can_transition_to(status) {
            return Err(JobError::InvalidTransition {
                job_id: job_id.to_string(),
                from: current.status,
                to: status,
            });
        }

        let new_output = match status {
            JobStatus::Completed => {
                let merged = output_path
                    .map(str::to_string)
                    .or(current.output_path.clone())
                    .or(reserved.filter(|p| !p.is_empty()));
                if merged.is_none() {
                    return Err(Self::invalid(job_id, "completed status needs an output path"));
                }
                merged
            }
            _ => current.output_path.clone(),
        };
        let new_error = error.map(str::to_string);

        // Never step backwards, even if the wall clock does.
        let now = Self::now().max(current.updated_at);

        tx.execute(
            "UPDATE jobs SET status = ?, output_path = ?, error_message = ?, updated_at = ? WHERE job_id = ?",
            params![
                status.as_str(),
                new_output,
                new_error,
                Self::timestamp(now),
                job_id,
            ],
        )
        .map_err(|e| JobError::Database(e.to_string()))?;

        tx.commit().map_err(|e| JobError::Database(e.to_string()))?;

        Ok(Job {
            status,
            output_path: new_output,
            error_message: new_error,
            updated_at: now,
            ..current
        })
    }

    fn get(&self, job_id: &str) -> Result<Option<Job>, JobError> {
        let conn = self.lock()?;

        conn.query_row(
            &format!("SELECT {} FROM jobs WHERE job_id = ?", JOB_COLUMNS),
            params![job_id],
            Self::row_to_job,
        )
        .optional()
        .map_err(|e| JobError::Database(e.to_string()))
    }

    fn list(&self, limit: usize) -> Result<Vec<Job>, JobError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM jobs ORDER BY created_at DESC, rowid DESC LIMIT ?",
                JOB_COLUMNS
            ))
            .map_err(|e| JobError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![limit as i64], Self::row_to_job)
            .map_err(|e| JobError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| JobError::Database(e.to_string()))
    }

    fn count(&self, status: Option<JobStatus>) -> Result<i64, JobError> {
        let conn = self.lock()?;

        let result = match status {
            Some(status) => conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE status = ?",
                params![status.as_str()],
                |row| row.get(0),
            ),
            None => conn.query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0)),
        };

        result.map_err(|e| JobError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn create_test_store() -> SqliteJobStore {
        SqliteJobStore::in_memory().unwrap()
    }

    fn new_job(id: &str) -> NewJob {
        NewJob {
            job_id: id.to_string(),
            kind: JobKind::Image,
            target_path: format!("/uploads/{}.png", id),
            source_paths: vec![format!("/uploads/{}-src.jpg", id)],
            reserved_output_path: format!("/outputs/{}.png", id),
        }
    }

    #[test]
    fn test_create_job() {
        let store = create_test_store();
        let job = store.create(new_job("a")).unwrap();

        assert_eq!(job.job_id, "a");
        assert_eq!(job.status, JobStatus::Submitted);
        assert_eq!(job.source_paths, vec!["/uploads/a-src.jpg".to_string()]);
        assert!(job.output_path.is_none());
        assert!(job.error_message.is_none());
        assert_eq!(job.created_at, job.updated_at);
    }

    #[test]
    fn test_create_duplicate_leaves_first_row_untouched() {
        let store = create_test_store();
        store.create(new_job("dup")).unwrap();
        store
            .update_status("dup", JobStatus::Queued, None, None)
            .unwrap();

        let mut second = new_job("dup");
        second.kind = JobKind::Video;
        second.target_path = "/elsewhere.mp4".to_string();
        let err = store.create(second).unwrap_err();
        assert!(matches!(err, JobError::AlreadyExists(id) if id == "dup"));

        let stored = store.get("dup").unwrap().unwrap();
        assert_eq!(stored.kind, JobKind::Image);
        assert_eq!(stored.status, JobStatus::Queued);
        assert_eq!(stored.target_path, "/uploads/dup.png");
    }

    #[test]
    fn test_get_nonexistent_job() {
        let store = create_test_store();
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_full_success_path() {
        let store = create_test_store();
        store.create(new_job("ok")).unwrap();
        store.update_status("ok", JobStatus::Queued, None, None).unwrap();
        store.update_status("ok", JobStatus::Running, None, None).unwrap();
        let done = store
            .update_status("ok", JobStatus::Completed, Some("/outputs/final.png"), None)
            .unwrap();

        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.output_path.as_deref(), Some("/outputs/final.png"));
        assert!(done.error_message.is_none());
        assert!(done.updated_at >= done.created_at);

        let fetched = store.get("ok").unwrap().unwrap();
        assert_eq!(fetched, done);
    }

    #[test]
    fn test_complete_without_path_promotes_reserved_output() {
        let store = create_test_store();
        store.create(new_job("r")).unwrap();
        store.update_status("r", JobStatus::Queued, None, None).unwrap();
        store.update_status("r", JobStatus::Running, None, None).unwrap();
        let done = store.update_status("r", JobStatus::Completed, None, None).unwrap();

        assert_eq!(done.output_path.as_deref(), Some("/outputs/r.png"));
    }

    #[test]
    fn test_failure_sets_error_and_keeps_output_empty() {
        let store = create_test_store();
        store.create(new_job("f")).unwrap();
        store.update_status("f", JobStatus::Queued, None, None).unwrap();
        store.update_status("f", JobStatus::Running, None, None).unwrap();
        let failed = store
            .update_status("f", JobStatus::Failed, None, Some("engine exploded"))
            .unwrap();

        assert_eq!(failed.error_message.as_deref(), Some("engine exploded"));
        assert!(failed.output_path.is_none());
    }

    #[test]
    fn test_failed_requires_error_message() {
        let store = create_test_store();
        store.create(new_job("e")).unwrap();

        let err = store
            .update_status("e", JobStatus::Failed, None, Some(""))
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidUpdate { .. }));
        assert_eq!(store.get("e").unwrap().unwrap().status, JobStatus::Submitted);
    }

    #[test]
    fn test_output_path_rejected_before_completion() {
        let store = create_test_store();
        store.create(new_job("p")).unwrap();

        let err = store
            .update_status("p", JobStatus::Queued, Some("/outputs/x.png"), None)
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidUpdate { .. }));
    }

    #[test]
    fn test_invalid_transition_is_rejected_and_row_unchanged() {
        let store = create_test_store();
        store.create(new_job("t")).unwrap();

        let err = store
            .update_status("t", JobStatus::Running, None, None)
            .unwrap_err();
        assert!(matches!(
            err,
            JobError::InvalidTransition {
                from: JobStatus::Submitted,
                to: JobStatus::Running,
                ..
            }
        ));
        assert_eq!(store.get("t").unwrap().unwrap().status, JobStatus::Submitted);
    }

    #[test]
    fn test_no_transition_out_of_terminal_state() {
        let store = create_test_store();
        store.create(new_job("term")).unwrap();
        store
            .update_status("term", JobStatus::Failed, None, Some("bad staging"))
            .unwrap();

        let err = store
            .update_status("term", JobStatus::Queued, None, None)
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidTransition { .. }));
    }

    #[test]
    fn test_update_nonexistent_job() {
        let store = create_test_store();
        let err = store
            .update_status("ghost", JobStatus::Queued, None, None)
            .unwrap_err();
        assert!(matches!(err, JobError::NotFound(id) if id == "ghost"));
    }

    #[test]
    fn test_updated_at_never_decreases() {
        let store = create_test_store();
        let created = store.create(new_job("m")).unwrap();
        let queued = store.update_status("m", JobStatus::Queued, None, None).unwrap();
        let running = store.update_status("m", JobStatus::Running, None, None).unwrap();

        assert!(queued.updated_at >= created.updated_at);
        assert!(running.updated_at >= queued.updated_at);
        assert_eq!(running.created_at, created.created_at);
    }

    #[test]
    fn test_returned_job_matches_stored_row() {
        let store = create_test_store();

        let created = store.create(new_job("rt")).unwrap();
        assert_eq!(store.get("rt").unwrap().unwrap(), created);

        let queued = store.update_status("rt", JobStatus::Queued, None, None).unwrap();
        assert_eq!(store.get("rt").unwrap().unwrap(), queued);
        assert!(queued.updated_at >= queued.created_at);
    }

    #[test]
    fn test_list_most_recent_first_and_bounded() {
        let store = create_test_store();
        for id in ["first", "second", "third"] {
            store.create(new_job(id)).unwrap();
        }

        let jobs = store.list(2).unwrap();
        let ids: Vec<_> = jobs.iter().map(|j| j.job_id.as_str()).collect();
        assert_eq!(ids, vec!["third", "second"]);

        assert!(store.list(0).unwrap().is_empty());
        assert_eq!(store.list(50).unwrap().len(), 3);
    }

    #[test]
    fn test_count_by_status() {
        let store = create_test_store();
        store.create(new_job("c1")).unwrap();
        store.create(new_job("c2")).unwrap();
        store.update_status("c2", JobStatus::Queued, None, None).unwrap();

        assert_eq!(store.count(None).unwrap(), 2);
        assert_eq!(store.count(Some(JobStatus::Queued)).unwrap(), 1);
        assert_eq!(store.count(Some(JobStatus::Completed)).unwrap(), 0);
    }

    #[test]
    fn test_concurrent_creates_with_same_id_admit_once() {
        let store = Arc::new(create_test_store());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.create(new_job("race")).is_ok())
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
    }

    #[test]
    fn test_file_based_store_persists() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("jobs.db");

        {
            let store = SqliteJobStore::new(&db_path).unwrap();
            store.create(new_job("persist")).unwrap();
            store
                .update_status("persist", JobStatus::Queued, None, None)
                .unwrap();
        }

        let reopened = SqliteJobStore::new(&db_path).unwrap();
        let job = reopened.get("persist").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.kind, JobKind::Image);
    }
}
