use chrono::Utc;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{not_found_as, DbError};
use crate::models::{ContactMessage, ContactSubmission};

const SUBMISSION_COLUMNS: &str = "id, name, email, organization, phone, message, is_read, created_at";

fn submission_from_row(row: &Row) -> rusqlite::Result<ContactSubmission> {
    Ok(ContactSubmission {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        organization: row.get(3)?,
        phone: row.get(4)?,
        message: row.get(5)?,
        is_read: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Stores a visitor's message as unread and returns its id.
pub fn create_submission(conn: &Connection, message: &ContactMessage) -> Result<String, DbError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO contact_submissions (id, name, email, organization, phone, message, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
        params![
            id,
            message.name,
            message.email,
            message.organization,
            message.phone,
            message.message,
            Utc::now(),
        ],
    )?;
    Ok(id)
}

pub fn read_all_submissions(conn: &Connection) -> Result<Vec<ContactSubmission>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM contact_submissions ORDER BY created_at DESC",
        SUBMISSION_COLUMNS
    ))?;
    let rows = stmt
        .query_map([], submission_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn read_submission(conn: &Connection, id: &str) -> Result<ContactSubmission, DbError> {
    conn.query_row(
        &format!("SELECT {} FROM contact_submissions WHERE id = ?1", SUBMISSION_COLUMNS),
        [id],
        submission_from_row,
    )
    .map_err(not_found_as("contact submission"))
}

/// Flags a submission as read. Only an unread row is touched, so the
/// transition happens at most once; returns whether this call made it.
pub fn mark_submission_read(conn: &Connection, id: &str) -> Result<bool, DbError> {
    let changed = conn.execute(
        "UPDATE contact_submissions SET is_read = 1 WHERE id = ?1 AND is_read = 0",
        [id],
    )?;
    Ok(changed == 1)
}

/// Returns (total, unread).
pub fn count_submissions(conn: &Connection) -> Result<(i64, i64), DbError> {
    Ok(conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN is_read = 0 THEN 1 ELSE 0 END), 0) FROM contact_submissions",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_test_db, sample_contact};

    #[test]
    fn new_submissions_are_unread() {
        let conn = open_test_db();
        let id = create_submission(&conn, &sample_contact()).unwrap();
        let row = read_submission(&conn, &id).unwrap();
        assert!(!row.is_read);
        assert_eq!(row.organization, "Acme Holdings");
        assert_eq!(count_submissions(&conn).unwrap(), (1, 1));
    }

    #[test]
    fn mark_read_happens_once() {
        let conn = open_test_db();
        let id = create_submission(&conn, &sample_contact()).unwrap();
        assert!(mark_submission_read(&conn, &id).unwrap());
        assert!(!mark_submission_read(&conn, &id).unwrap());
        assert!(read_submission(&conn, &id).unwrap().is_read);
        assert_eq!(count_submissions(&conn).unwrap(), (1, 0));
    }

    #[test]
    fn empty_inbox_counts_zero() {
        let conn = open_test_db();
        assert_eq!(count_submissions(&conn).unwrap(), (0, 0));
        assert!(read_all_submissions(&conn).unwrap().is_empty());
        assert!(matches!(read_submission(&conn, "nope"), Err(DbError::NotFound(_))));
    }
}
