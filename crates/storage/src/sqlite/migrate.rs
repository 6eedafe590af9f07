use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Version 1: institutions, users, the exam hierarchy, assignments, progress,
/// pomodoro sessions and login sessions.
///
/// Codes are unique among live rows only, so every uniqueness rule is a
/// partial index on `deleted_at IS NULL`.
const SCHEMA_V1: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS institutions (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL,
        deleted_at TEXT
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        email TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        role TEXT NOT NULL,
        institution_id INTEGER,
        target_score INTEGER CHECK (target_score BETWEEN 0 AND 1000),
        daily_study_hours INTEGER CHECK (daily_study_hours BETWEEN 1 AND 24),
        is_active INTEGER NOT NULL DEFAULT 1,
        last_login_at TEXT,
        created_at TEXT NOT NULL,
        deleted_at TEXT,
        FOREIGN KEY (institution_id) REFERENCES institutions(id)
    );
    ",
    r"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email_live
        ON users(email) WHERE deleted_at IS NULL;
    ",
    r"
    CREATE TABLE IF NOT EXISTS exams (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        code TEXT NOT NULL,
        description TEXT,
        status TEXT NOT NULL,
        start_date TEXT,
        end_date TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    );
    ",
    r"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_exams_code_live
        ON exams(code) WHERE deleted_at IS NULL;
    ",
    r"
    CREATE TABLE IF NOT EXISTS sections (
        id INTEGER PRIMARY KEY,
        exam_id INTEGER NOT NULL,
        code TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        sort_order INTEGER NOT NULL CHECK (sort_order >= 0),
        created_at TEXT NOT NULL,
        deleted_at TEXT,
        FOREIGN KEY (exam_id) REFERENCES exams(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_sections_exam_code_live
        ON sections(exam_id, code) WHERE deleted_at IS NULL;
    ",
    r"
    CREATE TABLE IF NOT EXISTS subjects (
        id INTEGER PRIMARY KEY,
        section_id INTEGER NOT NULL,
        code TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        sort_order INTEGER NOT NULL CHECK (sort_order >= 0),
        created_at TEXT NOT NULL,
        deleted_at TEXT,
        FOREIGN KEY (section_id) REFERENCES sections(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_subjects_section_code_live
        ON subjects(section_id, code) WHERE deleted_at IS NULL;
    ",
    r"
    CREATE TABLE IF NOT EXISTS topics (
        id INTEGER PRIMARY KEY,
        subject_id INTEGER NOT NULL,
        code TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        sort_order INTEGER NOT NULL CHECK (sort_order >= 0),
        created_at TEXT NOT NULL,
        deleted_at TEXT,
        FOREIGN KEY (subject_id) REFERENCES subjects(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_topics_subject_code_live
        ON topics(subject_id, code) WHERE deleted_at IS NULL;
    ",
    r"
    CREATE TABLE IF NOT EXISTS exam_assignments (
        id INTEGER PRIMARY KEY,
        exam_id INTEGER NOT NULL,
        user_id INTEGER,
        institution_id INTEGER,
        assigned_at TEXT NOT NULL,
        deleted_at TEXT,
        CHECK (user_id IS NOT NULL OR institution_id IS NOT NULL),
        FOREIGN KEY (exam_id) REFERENCES exams(id) ON DELETE CASCADE,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
        FOREIGN KEY (institution_id) REFERENCES institutions(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_exam_assignments_user_assigned
        ON exam_assignments(user_id, assigned_at, id);
    ",
    r"
    CREATE TABLE IF NOT EXISTS user_progress (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL,
        topic_id INTEGER NOT NULL,
        status TEXT NOT NULL,
        notes TEXT,
        completed_at TEXT,
        updated_at TEXT NOT NULL,
        deleted_at TEXT,
        UNIQUE (user_id, topic_id),
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
        FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_user_progress_user_updated
        ON user_progress(user_id, updated_at);
    ",
    r"
    CREATE TABLE IF NOT EXISTS pomodoro_sessions (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL,
        duration INTEGER NOT NULL CHECK (duration > 0),
        is_break INTEGER NOT NULL DEFAULT 0,
        completed INTEGER NOT NULL DEFAULT 0,
        started_at TEXT NOT NULL,
        completed_at TEXT,
        deleted_at TEXT,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_pomodoro_sessions_user_started
        ON pomodoro_sessions(user_id, started_at);
    ",
    r"
    CREATE TABLE IF NOT EXISTS auth_sessions (
        token TEXT PRIMARY KEY,
        user_id INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    );
    ",
];

/// Runs the versioned schema migrations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1.iter().copied() {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
