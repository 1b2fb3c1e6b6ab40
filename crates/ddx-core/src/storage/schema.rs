pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS test_groups (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS chat_configs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  identifier TEXT NOT NULL UNIQUE,
  active INTEGER NOT NULL DEFAULT 1,
  endpoint TEXT NOT NULL,
  api_key TEXT NOT NULL DEFAULT '',
  model TEXT NOT NULL,
  stream INTEGER NOT NULL DEFAULT 0,
  messages_json TEXT NOT NULL,
  sampling_json TEXT NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS test_cases (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL UNIQUE,
  input TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS diagnoses (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL UNIQUE,
  pattern TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS test_case_diagnoses (
  case_id INTEGER NOT NULL REFERENCES test_cases(id),
  diagnosis_id INTEGER NOT NULL REFERENCES diagnoses(id),
  PRIMARY KEY (case_id, diagnosis_id)
);

CREATE TABLE IF NOT EXISTS test_case_groups (
  case_id INTEGER NOT NULL REFERENCES test_cases(id),
  group_id INTEGER NOT NULL REFERENCES test_groups(id),
  PRIMARY KEY (case_id, group_id)
);

CREATE TABLE IF NOT EXISTS runs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  status TEXT NOT NULL,
  created_at TEXT NOT NULL,
  finished_at TEXT,
  group_id INTEGER NOT NULL REFERENCES test_groups(id),
  chat_id INTEGER NOT NULL REFERENCES chat_configs(id),
  snapshot_json TEXT NOT NULL,
  snapshot_sha256 TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS case_results (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  run_id INTEGER NOT NULL REFERENCES runs(id),
  case_id INTEGER NOT NULL,
  case_name TEXT NOT NULL,
  response TEXT NOT NULL,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS case_result_diagnoses (
  result_id INTEGER NOT NULL REFERENCES case_results(id),
  diagnosis_id INTEGER NOT NULL,
  diagnosis_name TEXT NOT NULL,
  rank INTEGER NOT NULL,
  PRIMARY KEY (result_id, diagnosis_id)
);

CREATE TABLE IF NOT EXISTS run_errors (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  run_id INTEGER NOT NULL REFERENCES runs(id),
  case_id INTEGER,
  kind TEXT NOT NULL,
  message TEXT NOT NULL,
  created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_case_results_run ON case_results(run_id);
CREATE INDEX IF NOT EXISTS idx_run_errors_run ON run_errors(run_id);
"#;
