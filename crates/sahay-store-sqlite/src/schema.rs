//! SQL schema for the Sahay SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id        TEXT PRIMARY KEY,
    username       TEXT,
    full_name      TEXT,
    email          TEXT,
    is_campaigner  INTEGER NOT NULL DEFAULT 0,
    is_trial_used  INTEGER NOT NULL DEFAULT 0,
    is_beneficiary INTEGER NOT NULL DEFAULT 0,
    got_benefited  INTEGER NOT NULL DEFAULT 0,
    payment_slip   TEXT,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS beneficiaries (
    beneficiary_id       TEXT PRIMARY KEY,
    user_id              TEXT NOT NULL REFERENCES users(user_id),
    full_name            TEXT,
    applied_for          TEXT NOT NULL,
    description_of_need  TEXT,
    note_by_verifier     TEXT,
    expected_amount      REAL NOT NULL DEFAULT 0,
    fund_raised          REAL NOT NULL DEFAULT 0,
    blood_units_needed   INTEGER NOT NULL DEFAULT 0,
    blood_units_received INTEGER NOT NULL DEFAULT 0,
    verification_status  TEXT NOT NULL DEFAULT 'pending',     -- 'pending' | 'approved' | 'rejected'
    funding_status       TEXT NOT NULL DEFAULT 'Not-Started', -- 'Not-Started' | 'in-progress' | 'start received' | 'fulfilled'
    created_at           TEXT NOT NULL
);

-- The donation ledger is append-only; only `status` is ever updated,
-- by reconciliation and by the closeout.
CREATE TABLE IF NOT EXISTS donations (
    donation_id    TEXT PRIMARY KEY,
    donor_id       TEXT NOT NULL,
    donor_name     TEXT,
    beneficiary_id TEXT NOT NULL REFERENCES beneficiaries(beneficiary_id),
    kind           TEXT NOT NULL,
    category       TEXT,
    mode           TEXT NOT NULL,   -- 'full_amount' | 'partial_amount' | 'acknowledge_only'
    amount         REAL,            -- Fundraising / amount-bearing modes only
    blood_units    INTEGER,         -- Blood only
    description    TEXT,
    status         TEXT NOT NULL DEFAULT 'pending', -- 'pending' | 'in-progress' | 'start received' | 'fulfilled'
    recorded_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS surveys (
    survey_id       TEXT PRIMARY KEY,
    created_by      TEXT NOT NULL REFERENCES users(user_id),
    title           TEXT NOT NULL,
    org_name        TEXT,
    budget          REAL NOT NULL DEFAULT 0,
    duration_days   INTEGER NOT NULL DEFAULT 0,
    start_date      TEXT,
    end_date        TEXT,
    status          TEXT NOT NULL DEFAULT 'draft', -- 'draft' | 'active' | 'completed' | 'paused'
    admin_created   INTEGER NOT NULL DEFAULT 0,
    allow_anonymous INTEGER NOT NULL DEFAULT 1,
    is_trial        INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS survey_questions (
    question_id TEXT PRIMARY KEY,
    survey_id   TEXT NOT NULL REFERENCES surveys(survey_id) ON DELETE CASCADE,
    position    INTEGER NOT NULL,
    text        TEXT NOT NULL,
    kind        TEXT NOT NULL,    -- 'text' | 'single' | 'multiple'
    options     TEXT NOT NULL DEFAULT '[]',
    attachment  TEXT              -- JSON-encoded Attachment or NULL
);

-- Concurrent submissions from the same respondent race to the UNIQUE
-- constraint; the loser surfaces as a duplicate-response error.
CREATE TABLE IF NOT EXISTS survey_responses (
    response_id     TEXT PRIMARY KEY,
    survey_id       TEXT NOT NULL REFERENCES surveys(survey_id) ON DELETE CASCADE,
    respondent_key  TEXT NOT NULL,
    respondent_id   TEXT,
    anonymous_id    TEXT,
    respondent_name TEXT NOT NULL DEFAULT 'Guest User',
    answers         TEXT NOT NULL DEFAULT '{}',
    responded_at    TEXT NOT NULL,
    UNIQUE (survey_id, respondent_key)
);

-- Renewal requests outlive the surveys they reference; no foreign key.
CREATE TABLE IF NOT EXISTS renewal_requests (
    request_id    TEXT PRIMARY KEY,
    survey_id     TEXT NOT NULL,
    requested_by  TEXT NOT NULL REFERENCES users(user_id),
    budget        REAL NOT NULL,
    duration_days INTEGER NOT NULL,
    requested_at  TEXT NOT NULL
);

-- Denormalised summaries of deleted surveys, kept on the owning user.
CREATE TABLE IF NOT EXISTS archived_surveys (
    archive_id       TEXT PRIMARY KEY,
    user_id          TEXT NOT NULL REFERENCES users(user_id),
    title            TEXT NOT NULL,
    org_name         TEXT,
    question_count   INTEGER NOT NULL,
    respondent_count INTEGER NOT NULL,
    start_date       TEXT,
    end_date         TEXT,
    archived_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS donations_beneficiary_idx ON donations(beneficiary_id);
CREATE INDEX IF NOT EXISTS beneficiaries_user_idx    ON beneficiaries(user_id);
CREATE INDEX IF NOT EXISTS questions_survey_idx      ON survey_questions(survey_id);
CREATE INDEX IF NOT EXISTS responses_survey_idx      ON survey_responses(survey_id);

PRAGMA user_version = 1;
";
