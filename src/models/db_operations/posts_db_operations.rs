use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use uuid::Uuid;

use super::{not_found_as, DbError};
use crate::models::publish::PublishState;
use crate::models::{BlogPost, BlogPostDraft};

const POST_COLUMNS: &str = "id, title, slug, excerpt, content, featured_image_url, category, author_name, author_id, published, published_at, created_at, updated_at";

fn post_from_row(row: &Row) -> rusqlite::Result<BlogPost> {
    Ok(BlogPost {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        excerpt: row.get(3)?,
        content: row.get(4)?,
        featured_image_url: row.get(5)?,
        category: row.get(6)?,
        author_name: row.get(7)?,
        author_id: row.get(8)?,
        published: row.get(9)?,
        published_at: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// Inserts a new post as a draft and returns its id.
pub fn create_post(conn: &Connection, draft: &BlogPostDraft, author_id: &str) -> Result<String, DbError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO blog_posts (id, title, slug, excerpt, content, featured_image_url, category, author_name, author_id, published, published_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, NULL, ?10)",
        params![
            id,
            draft.title,
            draft.slug,
            draft.excerpt,
            draft.content,
            draft.featured_image_url,
            draft.category,
            draft.author_name,
            author_id,
            Utc::now(),
        ],
    )?;
    Ok(id)
}

/// Rewrites the content fields. The publish state is left as it is.
pub fn update_post(conn: &Connection, post_id: &str, draft: &BlogPostDraft) -> Result<(), DbError> {
    let changed = conn.execute(
        "UPDATE blog_posts SET title = ?1, slug = ?2, excerpt = ?3, content = ?4, featured_image_url = ?5,
         category = ?6, author_name = ?7, updated_at = ?8 WHERE id = ?9",
        params![
            draft.title,
            draft.slug,
            draft.excerpt,
            draft.content,
            draft.featured_image_url,
            draft.category,
            draft.author_name,
            Utc::now(),
            post_id,
        ],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("blog post {}", post_id)));
    }
    Ok(())
}

/// Flips draft <-> published for one row inside a single transaction and
/// returns the new state.
pub fn toggle_post_published(conn: &mut Connection, post_id: &str, now: DateTime<Utc>) -> Result<PublishState, DbError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current = tx
        .query_row(
            "SELECT published, published_at FROM blog_posts WHERE id = ?1",
            [post_id],
            |row| Ok(PublishState::from_columns(row.get(0)?, row.get(1)?)),
        )
        .map_err(not_found_as("blog post"))?;

    let next = current.toggle(now);
    let (published, published_at) = next.columns();
    tx.execute(
        "UPDATE blog_posts SET published = ?1, published_at = ?2 WHERE id = ?3",
        params![published, published_at, post_id],
    )?;
    tx.commit()?;
    Ok(next)
}

pub fn delete_post(conn: &Connection, post_id: &str) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM blog_posts WHERE id = ?1", [post_id])?)
}

pub fn read_post_by_id(conn: &Connection, post_id: &str) -> Result<BlogPost, DbError> {
    conn.query_row(
        &format!("SELECT {} FROM blog_posts WHERE id = ?1", POST_COLUMNS),
        [post_id],
        post_from_row,
    )
    .map_err(not_found_as("blog post"))
}

/// Looks up a post for the public site: only published rows match.
pub fn read_published_post_by_slug(conn: &Connection, slug: &str) -> Result<Option<BlogPost>, DbError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM blog_posts WHERE slug = ?1 AND published = 1", POST_COLUMNS),
            [slug],
            post_from_row,
        )
        .optional()?)
}

/// Published posts, newest first by publish time (creation time as fallback).
pub fn read_published_posts(conn: &Connection, limit: Option<u32>) -> Result<Vec<BlogPost>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM blog_posts WHERE published = 1
         ORDER BY COALESCE(published_at, created_at) DESC LIMIT ?1",
        POST_COLUMNS
    ))?;
    // SQLite treats a negative LIMIT as "no limit".
    let limit = limit.map(i64::from).unwrap_or(-1);
    let posts = stmt
        .query_map([limit], post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

/// Every post, drafts included, for the CMS.
pub fn read_all_posts(conn: &Connection) -> Result<Vec<BlogPost>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM blog_posts ORDER BY created_at DESC",
        POST_COLUMNS
    ))?;
    let posts = stmt
        .query_map([], post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

pub fn count_posts(conn: &Connection) -> Result<i64, DbError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM blog_posts", [], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::open_test_db;

    fn draft(title: &str, slug: &str) -> BlogPostDraft {
        BlogPostDraft {
            title: title.to_string(),
            slug: slug.to_string(),
            excerpt: None,
            content: "<p>Body</p>".to_string(),
            featured_image_url: None,
            category: Some("Governance".to_string()),
            author_name: Some("Desk".to_string()),
        }
    }

    #[test]
    fn new_posts_start_as_drafts_and_stay_off_the_public_list() {
        let conn = open_test_db();
        let id = create_post(&conn, &draft("First", "first"), "author-1").unwrap();

        let post = read_post_by_id(&conn, &id).unwrap();
        assert!(!post.published);
        assert!(post.published_at.is_none());
        assert!(read_published_posts(&conn, None).unwrap().is_empty());
        assert!(read_published_post_by_slug(&conn, "first").unwrap().is_none());
    }

    #[test]
    fn toggle_publishes_then_unpublishes() {
        let mut conn = open_test_db();
        let id = create_post(&conn, &draft("First", "first"), "author-1").unwrap();

        let now = Utc::now();
        let state = toggle_post_published(&mut conn, &id, now).unwrap();
        assert!(state.is_published());
        let post = read_post_by_id(&conn, &id).unwrap();
        assert!(post.published);
        assert!(post.published_at.is_some());
        assert_eq!(read_published_posts(&conn, None).unwrap().len(), 1);

        let state = toggle_post_published(&mut conn, &id, Utc::now()).unwrap();
        assert_eq!(state, PublishState::Draft);
        let post = read_post_by_id(&conn, &id).unwrap();
        assert!(!post.published);
        assert!(post.published_at.is_none());
    }

    #[test]
    fn toggle_on_missing_post_is_not_found() {
        let mut conn = open_test_db();
        let err = toggle_post_published(&mut conn, "missing", Utc::now()).unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[test]
    fn edits_do_not_change_publish_state() {
        let mut conn = open_test_db();
        let id = create_post(&conn, &draft("First", "first"), "author-1").unwrap();
        toggle_post_published(&mut conn, &id, Utc::now()).unwrap();
        let before = read_post_by_id(&conn, &id).unwrap();

        update_post(&conn, &id, &draft("Renamed", "renamed")).unwrap();
        let after = read_post_by_id(&conn, &id).unwrap();
        assert_eq!(after.title, "Renamed");
        assert_eq!(after.publish_state(), before.publish_state());
        assert!(after.updated_at.is_some());
    }

    #[test]
    fn duplicate_slug_is_a_conflict() {
        let conn = open_test_db();
        create_post(&conn, &draft("First", "same"), "author-1").unwrap();
        let err = create_post(&conn, &draft("Second", "same"), "author-1").unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[test]
    fn public_list_is_newest_first_and_limited() {
        let mut conn = open_test_db();
        let older = create_post(&conn, &draft("Older", "older"), "a").unwrap();
        let newer = create_post(&conn, &draft("Newer", "newer"), "a").unwrap();
        create_post(&conn, &draft("Hidden", "hidden"), "a").unwrap();

        let base = Utc::now();
        toggle_post_published(&mut conn, &older, base - chrono::Duration::days(2)).unwrap();
        toggle_post_published(&mut conn, &newer, base).unwrap();

        let posts = read_published_posts(&conn, None).unwrap();
        let slugs: Vec<&str> = posts.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["newer", "older"]);
        assert!(posts.iter().all(|p| p.published));

        assert_eq!(read_published_posts(&conn, Some(1)).unwrap().len(), 1);
        assert_eq!(read_all_posts(&conn).unwrap().len(), 3);
        assert_eq!(count_posts(&conn).unwrap(), 3);
    }

    #[test]
    fn delete_is_terminal() {
        let conn = open_test_db();
        let id = create_post(&conn, &draft("Gone", "gone"), "a").unwrap();
        assert_eq!(delete_post(&conn, &id).unwrap(), 1);
        assert!(matches!(read_post_by_id(&conn, &id), Err(DbError::NotFound(_))));
        assert_eq!(delete_post(&conn, &id).unwrap(), 0);
    }
}
