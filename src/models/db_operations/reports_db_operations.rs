use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use uuid::Uuid;

use super::{not_found_as, DbError};
use crate::models::publish::PublishState;
use crate::models::{Report, ReportDraft};

const REPORT_COLUMNS: &str = "id, title, description, file_url, file_name, category, published, published_at, created_by, created_at, updated_at";

fn report_from_row(row: &Row) -> rusqlite::Result<Report> {
    Ok(Report {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        file_url: row.get(3)?,
        file_name: row.get(4)?,
        category: row.get(5)?,
        published: row.get(6)?,
        published_at: row.get(7)?,
        created_by: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub fn create_report(conn: &Connection, draft: &ReportDraft, created_by: &str) -> Result<String, DbError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO insights_reports (id, title, description, file_url, file_name, category, published, published_at, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, ?7, ?8)",
        params![
            id,
            draft.title,
            draft.description,
            draft.file_url,
            draft.file_name,
            draft.category,
            created_by,
            Utc::now(),
        ],
    )?;
    Ok(id)
}

pub fn update_report(conn: &Connection, report_id: &str, draft: &ReportDraft) -> Result<(), DbError> {
    let changed = conn.execute(
        "UPDATE insights_reports SET title = ?1, description = ?2, file_url = ?3, file_name = ?4,
         category = ?5, updated_at = ?6 WHERE id = ?7",
        params![
            draft.title,
            draft.description,
            draft.file_url,
            draft.file_name,
            draft.category,
            Utc::now(),
            report_id,
        ],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("report {}", report_id)));
    }
    Ok(())
}

pub fn toggle_report_published(conn: &mut Connection, report_id: &str, now: DateTime<Utc>) -> Result<PublishState, DbError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current = tx
        .query_row(
            "SELECT published, published_at FROM insights_reports WHERE id = ?1",
            [report_id],
            |row| Ok(PublishState::from_columns(row.get(0)?, row.get(1)?)),
        )
        .map_err(not_found_as("report"))?;

    let next = current.toggle(now);
    let (published, published_at) = next.columns();
    tx.execute(
        "UPDATE insights_reports SET published = ?1, published_at = ?2 WHERE id = ?3",
        params![published, published_at, report_id],
    )?;
    tx.commit()?;
    Ok(next)
}

pub fn delete_report(conn: &Connection, report_id: &str) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM insights_reports WHERE id = ?1", [report_id])?)
}

pub fn read_report_by_id(conn: &Connection, report_id: &str) -> Result<Report, DbError> {
    conn.query_row(
        &format!("SELECT {} FROM insights_reports WHERE id = ?1", REPORT_COLUMNS),
        [report_id],
        report_from_row,
    )
    .map_err(not_found_as("report"))
}

pub fn read_published_report_by_id(conn: &Connection, report_id: &str) -> Result<Option<Report>, DbError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM insights_reports WHERE id = ?1 AND published = 1", REPORT_COLUMNS),
            [report_id],
            report_from_row,
        )
        .optional()?)
}

pub fn read_published_reports(conn: &Connection) -> Result<Vec<Report>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM insights_reports WHERE published = 1
         ORDER BY COALESCE(published_at, created_at) DESC",
        REPORT_COLUMNS
    ))?;
    let reports = stmt
        .query_map([], report_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(reports)
}

pub fn read_all_reports(conn: &Connection) -> Result<Vec<Report>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM insights_reports ORDER BY created_at DESC",
        REPORT_COLUMNS
    ))?;
    let reports = stmt
        .query_map([], report_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(reports)
}

pub fn count_reports(conn: &Connection) -> Result<i64, DbError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM insights_reports", [], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::open_test_db;

    fn draft(title: &str) -> ReportDraft {
        ReportDraft {
            title: title.to_string(),
            description: Some("Quarterly outlook".to_string()),
            category: None,
            file_url: "/media/reports/1-abc.pdf".to_string(),
            file_name: "outlook.pdf".to_string(),
        }
    }

    #[test]
    fn only_published_reports_are_public() {
        let mut conn = open_test_db();
        let shown = create_report(&conn, &draft("Shown"), "admin-1").unwrap();
        let hidden = create_report(&conn, &draft("Hidden"), "admin-1").unwrap();
        toggle_report_published(&mut conn, &shown, Utc::now()).unwrap();

        let public = read_published_reports(&conn).unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].id, shown);
        assert!(read_published_report_by_id(&conn, &hidden).unwrap().is_none());
        assert!(read_published_report_by_id(&conn, &shown).unwrap().is_some());
        assert_eq!(read_all_reports(&conn).unwrap().len(), 2);
    }

    #[test]
    fn publish_invariant_holds_across_toggles() {
        let mut conn = open_test_db();
        let id = create_report(&conn, &draft("Outlook"), "admin-1").unwrap();
        for _ in 0..3 {
            toggle_report_published(&mut conn, &id, Utc::now()).unwrap();
            let report = read_report_by_id(&conn, &id).unwrap();
            assert_eq!(report.published, report.published_at.is_some());
        }
    }

    #[test]
    fn update_and_delete() {
        let conn = open_test_db();
        let id = create_report(&conn, &draft("Outlook"), "admin-1").unwrap();
        let mut edited = draft("Outlook 2025");
        edited.file_url = "/media/reports/2-def.pdf".to_string();
        update_report(&conn, &id, &edited).unwrap();
        let report = read_report_by_id(&conn, &id).unwrap();
        assert_eq!(report.title, "Outlook 2025");
        assert_eq!(report.file_url, "/media/reports/2-def.pdf");

        assert!(matches!(update_report(&conn, "missing", &edited), Err(DbError::NotFound(_))));
        assert_eq!(delete_report(&conn, &id).unwrap(), 1);
        assert_eq!(count_reports(&conn).unwrap(), 0);
    }
}
