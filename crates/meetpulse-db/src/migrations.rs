use rusqlite::Connection;
use tracing::info;

use crate::DbResult;

pub fn run(conn: &Connection) -> DbResult<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                name        TEXT,
                phone       TEXT,
                bio         TEXT,
                is_admin    INTEGER NOT NULL DEFAULT 0,
                is_approved INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            -- One row per (email, purpose): issuing a new code replaces the old one.
            CREATE TABLE otp_challenges (
                email         TEXT NOT NULL COLLATE NOCASE,
                purpose       TEXT NOT NULL CHECK (purpose IN ('signup', 'login')),
                code_hash     TEXT NOT NULL,
                expires_at    TEXT NOT NULL,
                attempt_count INTEGER NOT NULL DEFAULT 0,
                staged_name   TEXT,
                staged_phone  TEXT,
                staged_bio    TEXT,
                created_at    TEXT NOT NULL,
                PRIMARY KEY (email, purpose)
            );

            CREATE TABLE meetings (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                title       TEXT NOT NULL,
                description TEXT,
                is_visible  INTEGER NOT NULL DEFAULT 1,
                created_by  INTEGER REFERENCES users(id) ON DELETE SET NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE questions (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                meeting_id  INTEGER NOT NULL REFERENCES meetings(id) ON DELETE CASCADE,
                author_id   INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                text        TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_questions_meeting ON questions(meeting_id, id);
            CREATE INDEX idx_questions_author ON questions(author_id);

            CREATE TABLE question_votes (
                question_id INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                vote_type   TEXT NOT NULL CHECK (vote_type IN ('up', 'down')),
                created_at  TEXT NOT NULL,
                PRIMARY KEY (question_id, user_id)
            );

            CREATE INDEX idx_question_votes_user ON question_votes(user_id);

            CREATE TABLE pulse_polls (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                meeting_id  INTEGER NOT NULL REFERENCES meetings(id) ON DELETE CASCADE,
                question_id INTEGER REFERENCES questions(id) ON DELETE SET NULL,
                title       TEXT NOT NULL,
                active      INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL,
                ended_at    TEXT
            );

            -- At most one running poll per meeting.
            CREATE UNIQUE INDEX idx_pulse_polls_one_active
                ON pulse_polls(meeting_id) WHERE active = 1;
            CREATE INDEX idx_pulse_polls_meeting ON pulse_polls(meeting_id, id);

            CREATE TABLE pulse_options (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                poll_id     INTEGER NOT NULL REFERENCES pulse_polls(id) ON DELETE CASCADE,
                text        TEXT NOT NULL,
                sort_order  INTEGER NOT NULL
            );

            CREATE INDEX idx_pulse_options_poll ON pulse_options(poll_id, sort_order);

            CREATE TABLE pulse_votes (
                poll_id     INTEGER NOT NULL REFERENCES pulse_polls(id) ON DELETE CASCADE,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                option_id   INTEGER NOT NULL REFERENCES pulse_options(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (poll_id, user_id)
            );

            CREATE INDEX idx_pulse_votes_option ON pulse_votes(option_id);
            CREATE INDEX idx_pulse_votes_user ON pulse_votes(user_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
