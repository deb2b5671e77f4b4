use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::schema::SCHEMA;
use super::{PermissionBatch, Store};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

// Fixed precision keeps lexical order equal to chronological order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn constraint_as_conflict(err: rusqlite::Error, what: &str) -> Error {
    if is_constraint_violation(&err) {
        Error::conflict(what)
    } else {
        Error::from(err)
    }
}

const USER_COLUMNS: &str = "id, email, username, password_hash, authorized_by_idp, created_at";

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
        authorized_by_idp: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

const OPERATION_COLUMNS: &str = "id, path, description, category, last_used, active, created_at";

fn row_to_operation(row: &Row<'_>) -> rusqlite::Result<Operation> {
    Ok(Operation {
        id: row.get(0)?,
        path: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        last_used: row.get::<_, Option<String>>(4)?.map(|s| parse_datetime(&s)),
        active: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

fn row_to_permission(row: &Row<'_>) -> rusqlite::Result<Permission> {
    Ok(Permission {
        user_id: row.get(0)?,
        op_id: row.get(1)?,
        access_level: row.get(2)?,
    })
}

fn row_to_change(row: &Row<'_>) -> rusqlite::Result<Change> {
    Ok(Change {
        id: row.get(0)?,
        op_id: row.get(1)?,
        user_id: row.get(2)?,
        commit_hash: row.get(3)?,
        comment: row.get(4)?,
        version_name: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    let raw_type: i64 = row.get(4)?;
    let message_type = MessageType::from_i64(raw_type).unwrap_or_else(|| {
        tracing::error!("Invalid message type in database: {}", raw_type);
        MessageType::Text
    });
    Ok(Message {
        id: row.get(0)?,
        op_id: row.get(1)?,
        user_id: row.get(2)?,
        text: row.get(3)?,
        message_type,
        reply_id: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
        authorized_by_idp: bool,
    ) -> Result<User> {
        let conn = self.conn();
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO users (email, username, password_hash, authorized_by_idp, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                email,
                username,
                password_hash,
                authorized_by_idp,
                format_datetime(&created_at),
            ],
        )
        .map_err(|e| constraint_as_conflict(e, "email already registered"))?;

        Ok(User {
            id: conn.last_insert_rowid(),
            email: email.to_string(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            authorized_by_idp,
            created_at,
        })
    }

    fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
        let rows = stmt.query_map([], row_to_user)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let rows = self
            .conn()
            .execute(
                "UPDATE users SET email = ?1, username = ?2, password_hash = ?3, authorized_by_idp = ?4
                 WHERE id = ?5",
                params![
                    user.email,
                    user.username,
                    user.password_hash,
                    user.authorized_by_idp,
                    user.id
                ],
            )
            .map_err(|e| constraint_as_conflict(e, "email already registered"))?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_user(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let (created, changes): (i64, i64) = tx.query_row(
            "SELECT
                 (SELECT COUNT(*) FROM permissions WHERE user_id = ?1 AND access_level = 'creator'),
                 (SELECT COUNT(*) FROM changes WHERE user_id = ?1)",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if created > 0 {
            return Err(Error::conflict("user is the creator of an operation"));
        }
        if changes > 0 {
            return Err(Error::conflict("user has recorded changes"));
        }

        tx.execute("DELETE FROM messages WHERE user_id = ?1", params![id])?;
        tx.execute("DELETE FROM permissions WHERE user_id = ?1", params![id])?;
        let rows = tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(rows > 0)
    }

    // Operation operations

    fn create_operation(&self, op: &NewOperation, creator_id: i64) -> Result<Operation> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let created_at = Utc::now();

        tx.execute(
            "INSERT INTO operations (path, description, category, last_used, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                op.path,
                op.description,
                op.category,
                op.last_used.as_ref().map(format_datetime),
                op.active,
                format_datetime(&created_at),
            ],
        )
        .map_err(|e| constraint_as_conflict(e, "operation path already exists"))?;

        let id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO permissions (user_id, op_id, access_level) VALUES (?1, ?2, ?3)",
            params![creator_id, id, AccessLevel::Creator],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                Error::NotFound
            } else {
                Error::from(e)
            }
        })?;

        tx.commit()?;

        Ok(Operation {
            id,
            path: op.path.clone(),
            description: op.description.clone(),
            category: op.category.clone(),
            last_used: op.last_used,
            active: op.active,
            created_at,
        })
    }

    fn get_operation(&self, id: i64) -> Result<Option<Operation>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {OPERATION_COLUMNS} FROM operations WHERE id = ?1"),
            params![id],
            row_to_operation,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_operation_by_path(&self, path: &str) -> Result<Option<Operation>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {OPERATION_COLUMNS} FROM operations WHERE path = ?1"),
            params![path],
            row_to_operation,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_operations_in_category(&self, category: &str) -> Result<Vec<Operation>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {OPERATION_COLUMNS} FROM operations WHERE category = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![category], row_to_operation)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_operation(&self, op: &Operation) -> Result<()> {
        let rows = self
            .conn()
            .execute(
                "UPDATE operations SET path = ?1, description = ?2, category = ?3, last_used = ?4, active = ?5
                 WHERE id = ?6",
                params![
                    op.path,
                    op.description,
                    op.category,
                    op.last_used.as_ref().map(format_datetime),
                    op.active,
                    op.id
                ],
            )
            .map_err(|e| constraint_as_conflict(e, "operation path already exists"))?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn touch_operation(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "UPDATE operations SET last_used = ?1, active = 1 WHERE id = ?2",
            params![format_datetime(&at), id],
        )?;
        Ok(())
    }

    fn delete_operation(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM permissions WHERE op_id = ?1", params![id])?;
        tx.execute("DELETE FROM changes WHERE op_id = ?1", params![id])?;
        tx.execute("DELETE FROM messages WHERE op_id = ?1", params![id])?;
        let rows = tx.execute("DELETE FROM operations WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(rows > 0)
    }

    // Permission operations

    fn get_access_level(&self, user_id: i64, op_id: i64) -> Result<Option<AccessLevel>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT access_level FROM permissions WHERE user_id = ?1 AND op_id = ?2",
            params![user_id, op_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_creator(&self, op_id: i64) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT u.id, u.email, u.username, u.password_hash, u.authorized_by_idp, u.created_at
             FROM users u
             JOIN permissions p ON p.user_id = u.id
             WHERE p.op_id = ?1 AND p.access_level = 'creator'",
            params![op_id],
            row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_operation_permissions(&self, op_id: i64) -> Result<Vec<Permission>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT user_id, op_id, access_level FROM permissions WHERE op_id = ?1 ORDER BY user_id",
        )?;
        let rows = stmt.query_map(params![op_id], row_to_permission)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_user_permissions(&self, user_id: i64) -> Result<Vec<Permission>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT user_id, op_id, access_level FROM permissions WHERE user_id = ?1 ORDER BY op_id",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_permission)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_members(&self, op_id: i64) -> Result<Vec<MemberRef>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.username, p.access_level
             FROM permissions p
             JOIN users u ON u.id = p.user_id
             WHERE p.op_id = ?1
             ORDER BY u.id",
        )?;
        let rows = stmt.query_map(params![op_id], |row| {
            Ok(MemberRef {
                id: row.get(0)?,
                username: row.get(1)?,
                access_level: row.get(2)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_non_members(&self, op_id: i64) -> Result<Vec<UserRef>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.username
             FROM users u
             WHERE NOT EXISTS (
                 SELECT 1 FROM permissions p WHERE p.user_id = u.id AND p.op_id = ?1
             )
             ORDER BY u.id",
        )?;
        let rows = stmt.query_map(params![op_id], |row| {
            Ok(UserRef {
                id: row.get(0)?,
                username: row.get(1)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn apply_permissions(&self, batch: &PermissionBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        for (user_id, op_id) in &batch.delete {
            tx.execute(
                "DELETE FROM permissions
                 WHERE user_id = ?1 AND op_id = ?2 AND access_level != 'creator'",
                params![user_id, op_id],
            )?;
        }

        for perm in &batch.update {
            tx.execute(
                "UPDATE permissions SET access_level = ?3
                 WHERE user_id = ?1 AND op_id = ?2 AND access_level != 'creator'",
                params![perm.user_id, perm.op_id, perm.access_level],
            )
            .map_err(|e| constraint_as_conflict(e, "operation already has a creator"))?;
        }

        for perm in &batch.insert {
            tx.execute(
                "INSERT INTO permissions (user_id, op_id, access_level) VALUES (?1, ?2, ?3)",
                params![perm.user_id, perm.op_id, perm.access_level],
            )
            .map_err(|e| {
                constraint_as_conflict(
                    e,
                    &format!(
                        "cannot grant user {} access to operation {}",
                        perm.user_id, perm.op_id
                    ),
                )
            })?;
        }

        tx.commit()?;
        Ok(())
    }

    // Change operations

    fn create_change(
        &self,
        op_id: i64,
        user_id: i64,
        commit_hash: &str,
        comment: Option<&str>,
    ) -> Result<Change> {
        let conn = self.conn();
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO changes (op_id, user_id, commit_hash, comment, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                op_id,
                user_id,
                commit_hash,
                comment,
                format_datetime(&created_at)
            ],
        )?;

        Ok(Change {
            id: conn.last_insert_rowid(),
            op_id,
            user_id,
            commit_hash: commit_hash.to_string(),
            comment: comment.map(String::from),
            version_name: None,
            created_at,
        })
    }

    fn get_change(&self, id: i64) -> Result<Option<Change>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, op_id, user_id, commit_hash, comment, version_name, created_at
             FROM changes WHERE id = ?1",
            params![id],
            row_to_change,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_changes(&self, op_id: i64, named_only: bool) -> Result<Vec<ChangeSummary>> {
        let filter = if named_only {
            "AND c.version_name IS NOT NULL"
        } else {
            ""
        };
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT c.id, c.comment, c.version_name, u.username, c.commit_hash, c.created_at
             FROM changes c
             JOIN users u ON u.id = c.user_id
             WHERE c.op_id = ?1 {filter}
             ORDER BY c.created_at DESC, c.id DESC"
        ))?;

        let rows = stmt.query_map(params![op_id], |row| {
            Ok(ChangeSummary {
                id: row.get(0)?,
                comment: row.get(1)?,
                version_name: row.get(2)?,
                username: row.get(3)?,
                commit_hash: row.get(4)?,
                created_at: parse_datetime(&row.get::<_, String>(5)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn set_version_name(&self, change_id: i64, version_name: Option<&str>) -> Result<bool> {
        let rows = self.conn().execute(
            "UPDATE changes SET version_name = ?1 WHERE id = ?2",
            params![version_name, change_id],
        )?;
        Ok(rows > 0)
    }

    // Message operations

    fn create_message(
        &self,
        op_id: i64,
        user_id: i64,
        text: &str,
        message_type: MessageType,
        reply_id: Option<i64>,
    ) -> Result<Message> {
        let conn = self.conn();
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO messages (op_id, user_id, text, message_type, reply_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                op_id,
                user_id,
                text,
                message_type.as_i64(),
                reply_id,
                format_datetime(&created_at)
            ],
        )?;

        Ok(Message {
            id: conn.last_insert_rowid(),
            op_id,
            user_id,
            text: text.to_string(),
            message_type,
            reply_id,
            created_at,
        })
    }

    fn list_messages(&self, op_id: i64) -> Result<Vec<Message>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, op_id, user_id, text, message_type, reply_id, created_at
             FROM messages WHERE op_id = ?1 ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map(params![op_id], row_to_message)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}
