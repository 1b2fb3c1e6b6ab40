use crate::errors::StoreError;
use crate::model::{
    CaseResult, CaseSnapshot, ChatConfig, ChatMessage, ConfigId, Diagnosis, DiagnosisSnapshot,
    RankedMatch, Run, RunErrorRow, RunSnapshot, RunStatus, SamplingParams, TestCase,
};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct Store {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Hex SHA-256 of the serialized snapshot.
pub fn snapshot_digest(snapshot_json: &str) -> String {
    hex::encode(Sha256::digest(snapshot_json.as_bytes()))
}

fn parse_status(raw: &str) -> Result<RunStatus, StoreError> {
    RunStatus::parse(raw).ok_or_else(|| StoreError::Database(format!("unknown run status '{}'", raw)))
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Database(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(path)?;
        match conn.query_row("PRAGMA journal_mode = WAL", [], |r| r.get::<_, String>(0)) {
            Ok(mode) if mode.eq_ignore_ascii_case("wal") => {}
            Ok(mode) => {
                tracing::warn!(db = %path.display(), %mode, "database is not in WAL mode")
            }
            Err(e) => {
                tracing::warn!(db = %path.display(), error = %e, "failed to enable WAL mode")
            }
        }
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(crate::storage::schema::DDL)?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Run `f` inside `BEGIN IMMEDIATE`, committing on success.
    fn write_txn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self.conn();
        conn.execute("BEGIN IMMEDIATE", [])?;
        let result = f(&conn);
        match result {
            Ok(value) => match conn.execute("COMMIT", []) {
                Ok(_) => Ok(value),
                Err(e) => {
                    // A failed COMMIT leaves the transaction open.
                    let _ = conn.execute("ROLLBACK", []);
                    Err(e.into())
                }
            },
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    // --- groups -------------------------------------------------------------

    pub fn upsert_group(&self, name: &str) -> Result<i64, StoreError> {
        upsert_group_on(&self.conn(), name)
    }

    pub fn group_id(&self, name: &str) -> Result<Option<i64>, StoreError> {
        let conn = self.conn();
        Ok(conn
            .query_row(
                "SELECT id FROM test_groups WHERE name = ?1",
                params![name],
                |r| r.get(0),
            )
            .optional()?)
    }

    pub fn group_names(&self) -> Result<Vec<String>, StoreError> {
        self.names("SELECT name FROM test_groups ORDER BY name")
    }

    fn names(&self, sql: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    // --- chat configs -------------------------------------------------------

    pub fn upsert_chat_config(&self, cfg: &ChatConfig) -> Result<ConfigId, StoreError> {
        let messages_json = serde_json::to_string(&cfg.messages)?;
        let sampling_json = serde_json::to_string(&cfg.sampling)?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO chat_configs
                (identifier, active, endpoint, api_key, model, stream,
                 messages_json, sampling_json, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(identifier) DO UPDATE SET
                active = excluded.active,
                endpoint = excluded.endpoint,
                api_key = excluded.api_key,
                model = excluded.model,
                stream = excluded.stream,
                messages_json = excluded.messages_json,
                sampling_json = excluded.sampling_json,
                updated_at = excluded.updated_at",
            params![
                cfg.identifier,
                cfg.active,
                cfg.endpoint,
                cfg.api_key,
                cfg.model,
                cfg.stream,
                messages_json,
                sampling_json,
                now(),
            ],
        )?;
        let id = conn.query_row(
            "SELECT id FROM chat_configs WHERE identifier = ?1",
            params![cfg.identifier],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    /// Active chat configuration by identifier.
    pub fn chat_config(&self, identifier: &str) -> Result<Option<(ConfigId, ChatConfig)>, StoreError> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT id, identifier, active, endpoint, api_key, model, stream,
                        messages_json, sampling_json
                 FROM chat_configs WHERE identifier = ?1 AND active = 1",
                params![identifier],
                |r| {
                    Ok((
                        r.get::<_, i64>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, bool>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, String>(4)?,
                        r.get::<_, String>(5)?,
                        r.get::<_, bool>(6)?,
                        r.get::<_, String>(7)?,
                        r.get::<_, String>(8)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, identifier, active, endpoint, api_key, model, stream, messages, sampling)) =
            row
        else {
            return Ok(None);
        };
        let messages: Vec<ChatMessage> = serde_json::from_str(&messages)?;
        let sampling: SamplingParams = serde_json::from_str(&sampling)?;
        Ok(Some((
            id,
            ChatConfig {
                identifier,
                active,
                endpoint,
                api_key,
                model,
                stream,
                messages,
                sampling,
            },
        )))
    }

    pub fn chat_identifiers(&self) -> Result<Vec<String>, StoreError> {
        self.names("SELECT identifier FROM chat_configs WHERE active = 1 ORDER BY identifier")
    }

    // --- cases and diagnoses ------------------------------------------------

    pub fn upsert_diagnosis(&self, d: &Diagnosis) -> Result<i64, StoreError> {
        upsert_diagnosis_on(&self.conn(), d)
    }

    /// Insert or replace a case together with its group and diagnosis links.
    pub fn upsert_test_case(&self, case: &TestCase) -> Result<i64, StoreError> {
        self.write_txn(|conn| {
            conn.execute(
                "INSERT INTO test_cases (name, input) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET input = excluded.input",
                params![case.name, case.input],
            )?;
            let case_id: i64 = conn.query_row(
                "SELECT id FROM test_cases WHERE name = ?1",
                params![case.name],
                |r| r.get(0),
            )?;

            conn.execute("DELETE FROM test_case_groups WHERE case_id = ?1", params![case_id])?;
            conn.execute(
                "DELETE FROM test_case_diagnoses WHERE case_id = ?1",
                params![case_id],
            )?;

            for g in &case.groups {
                let group_id = upsert_group_on(conn, g)?;
                conn.execute(
                    "INSERT OR IGNORE INTO test_case_groups (case_id, group_id) VALUES (?1, ?2)",
                    params![case_id, group_id],
                )?;
            }
            for d in &case.diagnoses {
                let diagnosis_id = upsert_diagnosis_on(conn, d)?;
                conn.execute(
                    "INSERT OR IGNORE INTO test_case_diagnoses (case_id, diagnosis_id) VALUES (?1, ?2)",
                    params![case_id, diagnosis_id],
                )?;
            }
            Ok(case_id)
        })
    }

    /// Every case in the group with its expected diagnoses, ordered by id.
    pub fn cases_for_group(&self, group_id: i64) -> Result<Vec<CaseSnapshot>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.name, c.input
             FROM test_cases c
             JOIN test_case_groups g ON g.case_id = c.id
             WHERE g.group_id = ?1
             ORDER BY c.id",
        )?;
        let rows = stmt.query_map(params![group_id], |r| {
            Ok(CaseSnapshot {
                id: r.get(0)?,
                name: r.get(1)?,
                input: r.get(2)?,
                diagnoses: Vec::new(),
            })
        })?;
        let mut cases = Vec::new();
        for r in rows {
            cases.push(r?);
        }

        let mut dstmt = conn.prepare(
            "SELECT d.id, d.name, d.pattern
             FROM diagnoses d
             JOIN test_case_diagnoses cd ON cd.diagnosis_id = d.id
             WHERE cd.case_id = ?1
             ORDER BY d.id",
        )?;
        for case in &mut cases {
            let rows = dstmt.query_map(params![case.id], |r| {
                Ok(DiagnosisSnapshot {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    pattern: r.get(2)?,
                })
            })?;
            for r in rows {
                case.diagnoses.push(r?);
            }
        }
        Ok(cases)
    }

    // --- runs ---------------------------------------------------------------

    /// Persist a new NOT_STARTED run holding a serialized copy of `snapshot`.
    pub fn create_run(
        &self,
        group_id: i64,
        chat_id: ConfigId,
        snapshot: &RunSnapshot,
    ) -> Result<i64, StoreError> {
        let snapshot_json = serde_json::to_string(snapshot)?;
        let digest = snapshot_digest(&snapshot_json);
        let conn = self.conn();
        conn.execute(
            "INSERT INTO runs (status, created_at, group_id, chat_id, snapshot_json, snapshot_sha256)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                RunStatus::NotStarted.as_str(),
                now(),
                group_id,
                chat_id,
                snapshot_json,
                digest
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn run(&self, run_id: i64) -> Result<Run, StoreError> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT r.id, r.status, r.created_at, r.finished_at, g.name, c.identifier,
                        r.snapshot_sha256
                 FROM runs r
                 JOIN test_groups g ON g.id = r.group_id
                 JOIN chat_configs c ON c.id = r.chat_id
                 WHERE r.id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?;
        row.ok_or(StoreError::RunNotFound { run_id })?
    }

    pub fn list_runs(&self, limit: u32) -> Result<Vec<Run>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT r.id, r.status, r.created_at, r.finished_at, g.name, c.identifier,
                    r.snapshot_sha256
             FROM runs r
             JOIN test_groups g ON g.id = r.group_id
             JOIN chat_configs c ON c.id = r.chat_id
             ORDER BY r.id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], run_from_row)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r??);
        }
        Ok(out)
    }

    pub fn run_status(&self, run_id: i64) -> Result<RunStatus, StoreError> {
        let conn = self.conn();
        let raw: Option<String> = conn
            .query_row(
                "SELECT status FROM runs WHERE id = ?1",
                params![run_id],
                |r| r.get(0),
            )
            .optional()?;
        match raw {
            Some(s) => parse_status(&s),
            None => Err(StoreError::RunNotFound { run_id }),
        }
    }

    /// Load the run's snapshot, verifying it against the stored digest.
    pub fn load_snapshot(&self, run_id: i64) -> Result<RunSnapshot, StoreError> {
        let conn = self.conn();
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT snapshot_json, snapshot_sha256 FROM runs WHERE id = ?1",
                params![run_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        let Some((json, stored)) = row else {
            return Err(StoreError::RunNotFound { run_id });
        };
        let computed = snapshot_digest(&json);
        if computed != stored {
            return Err(StoreError::SnapshotDigestMismatch {
                run_id,
                stored,
                computed,
            });
        }
        Ok(serde_json::from_str(&json)?)
    }

    /// Compare-and-set the run status. Fails with `InvalidTransition` when the
    /// current status is not an allowed predecessor of `to`.
    pub fn transition_run(&self, run_id: i64, to: RunStatus) -> Result<(), StoreError> {
        let allowed = to.allowed_predecessors();
        let conn = self.conn();

        // At most two predecessors exist; pad so one statement covers both.
        let changed = match allowed {
            [] => 0,
            [only] | [only, _] => {
                let alt = allowed.get(1).unwrap_or(only);
                conn.execute(
                    "UPDATE runs SET status = ?1, finished_at = COALESCE(?2, finished_at)
                     WHERE id = ?3 AND status IN (?4, ?5)",
                    params![
                        to.as_str(),
                        to.is_terminal().then(now),
                        run_id,
                        only.as_str(),
                        alt.as_str()
                    ],
                )?
            }
            _ => {
                return Err(StoreError::Database(format!(
                    "unsupported transition table for {}",
                    to
                )))
            }
        };

        if changed == 1 {
            return Ok(());
        }

        let from: Option<String> = conn
            .query_row(
                "SELECT status FROM runs WHERE id = ?1",
                params![run_id],
                |r| r.get(0),
            )
            .optional()?;
        match from {
            None => Err(StoreError::RunNotFound { run_id }),
            Some(raw) => Err(StoreError::InvalidTransition {
                run_id,
                from: parse_status(&raw)?,
                to,
            }),
        }
    }

    // --- results ------------------------------------------------------------

    /// Atomically append one CaseResult and its ranks. Returns the result id.
    pub fn save_case_result(
        &self,
        run_id: i64,
        case: &CaseSnapshot,
        response: &str,
        ranked: &[RankedMatch],
    ) -> Result<i64, StoreError> {
        self.write_txn(|conn| {
            conn.execute(
                "INSERT INTO case_results (run_id, case_id, case_name, response, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![run_id, case.id, case.name, response, now()],
            )?;
            let result_id = conn.last_insert_rowid();
            let mut stmt = conn.prepare(
                "INSERT INTO case_result_diagnoses (result_id, diagnosis_id, diagnosis_name, rank)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for m in ranked {
                stmt.execute(params![result_id, m.diagnosis_id, m.diagnosis, m.rank])?;
            }
            Ok(result_id)
        })
    }

    /// Results of a run; ranks ordered by position with misses last.
    pub fn case_results(&self, run_id: i64) -> Result<Vec<CaseResult>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, run_id, case_id, case_name, response
             FROM case_results WHERE run_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![run_id], |r| {
            Ok(CaseResult {
                id: r.get(0)?,
                run_id: r.get(1)?,
                case_id: r.get(2)?,
                case_name: r.get(3)?,
                response: r.get(4)?,
                ranks: Vec::new(),
            })
        })?;
        let mut results = Vec::new();
        for r in rows {
            results.push(r?);
        }

        let mut rstmt = conn.prepare(
            "SELECT diagnosis_id, diagnosis_name, rank
             FROM case_result_diagnoses
             WHERE result_id = ?1
             ORDER BY rank = 0, rank, diagnosis_id",
        )?;
        for res in &mut results {
            let rows = rstmt.query_map(params![res.id], |r| {
                Ok(RankedMatch {
                    diagnosis_id: r.get(0)?,
                    diagnosis: r.get(1)?,
                    rank: r.get(2)?,
                })
            })?;
            for r in rows {
                res.ranks.push(r?);
            }
        }
        Ok(results)
    }

    // --- error log ----------------------------------------------------------

    pub fn record_run_error(
        &self,
        run_id: i64,
        case_id: Option<i64>,
        kind: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO run_errors (run_id, case_id, kind, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, case_id, kind, message, now()],
        )?;
        Ok(())
    }

    pub fn run_errors(&self, run_id: i64) -> Result<Vec<RunErrorRow>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT run_id, case_id, kind, message, created_at
             FROM run_errors WHERE run_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![run_id], |r| {
            Ok(RunErrorRow {
                run_id: r.get(0)?,
                case_id: r.get(1)?,
                kind: r.get(2)?,
                message: r.get(3)?,
                created_at: r.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

fn run_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Run, StoreError>> {
    let status: String = r.get(1)?;
    let id = r.get(0)?;
    let created_at = r.get(2)?;
    let finished_at = r.get(3)?;
    let group = r.get(4)?;
    let chat = r.get(5)?;
    let snapshot_sha256 = r.get(6)?;
    Ok(parse_status(&status).map(|status| Run {
        id,
        status,
        created_at,
        finished_at,
        group,
        chat,
        snapshot_sha256,
    }))
}

fn upsert_group_on(conn: &Connection, name: &str) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO test_groups (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        params![name],
    )?;
    Ok(conn.query_row(
        "SELECT id FROM test_groups WHERE name = ?1",
        params![name],
        |r| r.get(0),
    )?)
}

fn upsert_diagnosis_on(conn: &Connection, d: &Diagnosis) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO diagnoses (name, pattern) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET pattern = excluded.pattern",
        params![d.name, d.pattern],
    )?;
    Ok(conn.query_row(
        "SELECT id FROM diagnoses WHERE name = ?1",
        params![d.name],
        |r| r.get(0),
    )?)
}
