//! SQLite schema, created idempotently at open.
//!
//! The `attendance` primary key carries the ledger uniqueness invariant:
//! at most one row per (student, course, date). All writers rely on it.

pub const PRAGMAS: &str = "\
    PRAGMA journal_mode = WAL;\
    PRAGMA synchronous = NORMAL;\
    PRAGMA busy_timeout = 5000;\
    PRAGMA foreign_keys = ON;";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS courses (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    code            TEXT NOT NULL UNIQUE,
    academician_id  TEXT
);

CREATE TABLE IF NOT EXISTS enrollments (
    id          TEXT PRIMARY KEY,
    student_id  TEXT NOT NULL,
    course_id   TEXT NOT NULL REFERENCES courses (id) ON DELETE CASCADE,
    approval    TEXT NOT NULL DEFAULT 'pending'
                CHECK (approval IN ('pending', 'approved', 'rejected')),
    UNIQUE (student_id, course_id)
);

CREATE TABLE IF NOT EXISTS schedule_entries (
    id          TEXT PRIMARY KEY,
    course_id   TEXT NOT NULL REFERENCES courses (id) ON DELETE CASCADE,
    weekday     TEXT NOT NULL CHECK (weekday IN
                ('Monday','Tuesday','Wednesday','Thursday','Friday','Saturday','Sunday')),
    start_time  TEXT NOT NULL,
    end_time    TEXT NOT NULL,
    location    TEXT
);

CREATE TABLE IF NOT EXISTS attendance (
    student_id  TEXT NOT NULL,
    course_id   TEXT NOT NULL,
    date        TEXT NOT NULL,
    status      INTEGER,
    PRIMARY KEY (student_id, course_id, date)
);

CREATE TABLE IF NOT EXISTS performance (
    student_id       TEXT NOT NULL,
    course_id        TEXT NOT NULL,
    attendance_rate  REAL NOT NULL
                     CHECK (attendance_rate >= 0 AND attendance_rate <= 1),
    PRIMARY KEY (student_id, course_id)
);

CREATE TABLE IF NOT EXISTS face_embeddings (
    id          TEXT PRIMARY KEY,
    student_id  TEXT NOT NULL,
    embedding   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_schedule_weekday ON schedule_entries (weekday);
CREATE INDEX IF NOT EXISTS idx_attendance_pair ON attendance (student_id, course_id);
CREATE INDEX IF NOT EXISTS idx_embeddings_student ON face_embeddings (student_id);
";
