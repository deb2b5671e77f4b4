pub const SCHEMA: &str = r#"
-- Accounts; passwords are argon2id PHC strings
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    username TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    authorized_by_idp INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

-- Operations are the unit of access control; path names the data directory
CREATE TABLE IF NOT EXISTS operations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL DEFAULT 'default',
    last_used TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

-- At most one row per (user, operation)
CREATE TABLE IF NOT EXISTS permissions (
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    op_id INTEGER NOT NULL REFERENCES operations(id) ON DELETE CASCADE,
    access_level TEXT NOT NULL
        CHECK (access_level IN ('creator', 'admin', 'collaborator', 'viewer')),
    PRIMARY KEY (user_id, op_id)
);

-- Exactly one creator per operation
CREATE UNIQUE INDEX IF NOT EXISTS idx_permissions_one_creator
    ON permissions(op_id) WHERE access_level = 'creator';

-- commit_hash points into the operation's git history by convention
CREATE TABLE IF NOT EXISTS changes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    op_id INTEGER NOT NULL REFERENCES operations(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    commit_hash TEXT NOT NULL,
    comment TEXT,
    version_name TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    op_id INTEGER NOT NULL REFERENCES operations(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    text TEXT NOT NULL,
    message_type INTEGER NOT NULL DEFAULT 0,
    reply_id INTEGER REFERENCES messages(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_operations_category ON operations(category);
CREATE INDEX IF NOT EXISTS idx_permissions_op ON permissions(op_id);
CREATE INDEX IF NOT EXISTS idx_changes_op ON changes(op_id, created_at);
CREATE INDEX IF NOT EXISTS idx_messages_op ON messages(op_id);
"#;
