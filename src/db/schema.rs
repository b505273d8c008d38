//! Slot table schema and well-known slot keys

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS slots (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Serialized transcript (JSON array of messages)
pub const HISTORY_KEY: &str = "chat_history";

/// Remaining suggestion chips (JSON array)
pub const SUGGESTIONS_KEY: &str = "chat_suggestions";

/// Signed-in user blob, including the access token
pub const SESSION_KEY: &str = "session_user";

/// Chosen chat scope string
pub const SCOPE_KEY: &str = "selected_context";
