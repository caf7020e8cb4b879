use crate::helper::slug_helpers::SlugField;
use crate::helper::storage_helpers::StorageError;
use crate::models::db_operations::{
    posts_db_operations, reports_db_operations, submissions_db_operations, users_db_operations, DbError,
};
use crate::models::publish::PublishState;
use crate::models::{
    BlogPost, BlogPostDraft, ContactSubmission, DashboardStats, Identity, Report, ReportDraft, Role, UserWithRole,
};
use crate::DbPool;
use chrono::Utc;
use thiserror::Error;

pub const SELF_DEMOTION_MESSAGE: &str = "You cannot remove admin access from yourself.";
pub const FILE_REQUIRED_MESSAGE: &str = "Please upload a file before saving.";
pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Error, Debug)]
pub enum HelperError {
    /// User-facing input problem; the message is shown as-is.
    #[error("{0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Db(#[from] DbError),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Session error: {0}")]
    Session(String),
}

impl HelperError {
    /// Text safe to show an admin in a notification.
    pub fn user_message(&self) -> String {
        match self {
            HelperError::Validation(msg) | HelperError::Forbidden(msg) => msg.clone(),
            HelperError::NotFound(what) => format!("{} not found.", what),
            HelperError::Storage(
                e @ (StorageError::TooLarge(_) | StorageError::UnsupportedType(_) | StorageError::NoFile),
            ) => e.to_string(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

// Helper to get a connection from the pool
pub(crate) fn get_conn(pool: &DbPool) -> Result<r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>, HelperError> {
    pool.get().map_err(HelperError::Pool)
}

fn missing_as(what: &str) -> impl FnOnce(DbError) -> HelperError + '_ {
    move |e| match e {
        DbError::NotFound(_) => HelperError::NotFound(what.to_string()),
        other => HelperError::Db(other),
    }
}

pub fn dashboard_stats(pool: &DbPool) -> Result<DashboardStats, HelperError> {
    let conn = get_conn(pool)?;
    let (submissions, unread_submissions) = submissions_db_operations::count_submissions(&conn)?;
    Ok(DashboardStats {
        reports: reports_db_operations::count_reports(&conn)?,
        blog_posts: posts_db_operations::count_posts(&conn)?,
        submissions,
        unread_submissions,
        users: users_db_operations::count_profiles(&conn)?,
    })
}

// --- Users ---

/// Every profile with its admin flag. Role holders are read once and
/// looked up as a set, so the list costs two queries regardless of size.
pub fn list_users_with_roles(pool: &DbPool) -> Result<Vec<UserWithRole>, HelperError> {
    let conn = get_conn(pool)?;
    let profiles = users_db_operations::read_all_profiles(&conn)?;
    let admins = users_db_operations::read_role_holders(&conn, Role::Admin)?;
    Ok(profiles
        .into_iter()
        .map(|p| UserWithRole {
            is_admin: admins.contains(&p.user_id),
            id: p.id,
            user_id: p.user_id,
            email: p.email,
            full_name: p.full_name,
            created_at: p.created_at,
        })
        .collect())
}

/// Grants or revokes admin for `target_user_id`, based on the stored state.
/// Returns whether the target is an admin afterwards.
///
/// Acting on oneself is refused before any write is issued.
pub fn toggle_admin_role(pool: &DbPool, actor: &Identity, target_user_id: &str) -> Result<bool, HelperError> {
    if actor.id == target_user_id {
        return Err(HelperError::Forbidden(SELF_DEMOTION_MESSAGE.to_string()));
    }

    let mut conn = get_conn(pool)?;
    if users_db_operations::read_identity(&conn, target_user_id)?.is_none() {
        return Err(HelperError::NotFound("User".to_string()));
    }

    if users_db_operations::has_role(&conn, target_user_id, Role::Admin)? {
        match users_db_operations::revoke_role(&mut conn, &actor.id, target_user_id, Role::Admin) {
            Ok(_) => Ok(false),
            Err(DbError::Precondition(reason)) => {
                log::warn!("Admin role revocation by {} refused: {}", actor.email, reason);
                Err(HelperError::Forbidden("Your admin access has changed. Please sign in again.".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    } else {
        users_db_operations::grant_role(&conn, target_user_id, Role::Admin)?;
        Ok(true)
    }
}

pub fn validate_credentials_input(email: &str, password: &str) -> Result<(), HelperError> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(HelperError::Validation("Please enter a valid email address.".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(HelperError::Validation(format!(
            "Password must be at least {} characters.",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Creates an identity, its profile and (optionally) the admin role in one transaction.
pub fn create_user(
    pool: &DbPool,
    email: &str,
    password: &str,
    full_name: Option<&str>,
    make_admin: bool,
) -> Result<Identity, HelperError> {
    validate_credentials_input(email, password)?;
    let mut conn = get_conn(pool)?;
    let role = if make_admin { Some(Role::Admin) } else { None };
    users_db_operations::create_identity_with_role(&mut conn, email.trim(), password, full_name, role).map_err(|e| match e {
        DbError::Conflict(_) => HelperError::Validation("A user with this email already exists.".to_string()),
        other => other.into(),
    })
}

// --- Blog posts ---

/// Raw editor input for a blog post.
#[derive(Debug, Default, Clone)]
pub struct PostInput<'a> {
    pub title: &'a str,
    pub slug: Option<&'a str>,
    pub excerpt: Option<&'a str>,
    pub content: &'a str,
    pub featured_image_url: Option<&'a str>,
    pub category: Option<&'a str>,
    pub author_name: Option<&'a str>,
}

fn blank_to_none(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

pub fn post_draft_from_input(input: &PostInput) -> Result<BlogPostDraft, HelperError> {
    crate::helper::form_helpers::require_fields(&[("Title", input.title), ("Content", input.content)])?;
    let slug = SlugField::from_form(input.title, input.slug);
    if slug.value().is_empty() {
        return Err(HelperError::Validation(
            "Slug must contain at least one letter or number.".to_string(),
        ));
    }
    Ok(BlogPostDraft {
        title: input.title.trim().to_string(),
        slug: slug.value().to_string(),
        excerpt: blank_to_none(input.excerpt),
        content: input.content.to_string(),
        featured_image_url: blank_to_none(input.featured_image_url),
        category: blank_to_none(input.category),
        author_name: blank_to_none(input.author_name),
    })
}

/// Creates the post when `post_id` is `None`, updates it otherwise. Returns the post id.
pub fn save_post(pool: &DbPool, author: &Identity, post_id: Option<&str>, input: &PostInput) -> Result<String, HelperError> {
    let draft = post_draft_from_input(input)?;
    let conn = get_conn(pool)?;
    let result = match post_id {
        Some(id) => posts_db_operations::update_post(&conn, id, &draft).map(|_| id.to_string()),
        None => posts_db_operations::create_post(&conn, &draft, &author.id),
    };
    result.map_err(|e| match e {
        DbError::Conflict(_) => HelperError::Validation(format!("A post with the slug '{}' already exists.", draft.slug)),
        DbError::NotFound(_) => HelperError::NotFound("Blog post".to_string()),
        other => other.into(),
    })
}

pub fn toggle_post(pool: &DbPool, post_id: &str) -> Result<PublishState, HelperError> {
    let mut conn = get_conn(pool)?;
    posts_db_operations::toggle_post_published(&mut conn, post_id, Utc::now()).map_err(missing_as("Blog post"))
}

pub fn delete_post(pool: &DbPool, post_id: &str) -> Result<(), HelperError> {
    let conn = get_conn(pool)?;
    match posts_db_operations::delete_post(&conn, post_id)? {
        0 => Err(HelperError::NotFound("Blog post".to_string())),
        _ => Ok(()),
    }
}

pub fn fetch_all_posts(pool: &DbPool) -> Result<Vec<BlogPost>, HelperError> {
    let conn = get_conn(pool)?;
    Ok(posts_db_operations::read_all_posts(&conn)?)
}

pub fn fetch_post(pool: &DbPool, post_id: &str) -> Result<BlogPost, HelperError> {
    let conn = get_conn(pool)?;
    posts_db_operations::read_post_by_id(&conn, post_id).map_err(missing_as("Blog post"))
}

// --- Reports ---

#[derive(Debug, Default, Clone)]
pub struct ReportInput<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub category: Option<&'a str>,
    pub file_url: Option<&'a str>,
    pub file_name: Option<&'a str>,
}

pub fn report_draft_from_input(input: &ReportInput) -> Result<ReportDraft, HelperError> {
    crate::helper::form_helpers::require_fields(&[("Title", input.title)])?;
    let file_url = blank_to_none(input.file_url)
        .ok_or_else(|| HelperError::Validation(FILE_REQUIRED_MESSAGE.to_string()))?;
    let file_name = blank_to_none(input.file_name).unwrap_or_else(|| {
        file_url.rsplit('/').next().unwrap_or(&file_url).to_string()
    });
    Ok(ReportDraft {
        title: input.title.trim().to_string(),
        description: blank_to_none(input.description),
        category: blank_to_none(input.category),
        file_url,
        file_name,
    })
}

pub fn save_report(pool: &DbPool, author: &Identity, report_id: Option<&str>, input: &ReportInput) -> Result<String, HelperError> {
    let draft = report_draft_from_input(input)?;
    let conn = get_conn(pool)?;
    let result = match report_id {
        Some(id) => reports_db_operations::update_report(&conn, id, &draft).map(|_| id.to_string()),
        None => reports_db_operations::create_report(&conn, &draft, &author.id),
    };
    result.map_err(missing_as("Report"))
}

pub fn toggle_report(pool: &DbPool, report_id: &str) -> Result<PublishState, HelperError> {
    let mut conn = get_conn(pool)?;
    reports_db_operations::toggle_report_published(&mut conn, report_id, Utc::now()).map_err(missing_as("Report"))
}

pub fn delete_report(pool: &DbPool, report_id: &str) -> Result<(), HelperError> {
    let conn = get_conn(pool)?;
    match reports_db_operations::delete_report(&conn, report_id)? {
        0 => Err(HelperError::NotFound("Report".to_string())),
        _ => Ok(()),
    }
}

pub fn fetch_all_reports(pool: &DbPool) -> Result<Vec<Report>, HelperError> {
    let conn = get_conn(pool)?;
    Ok(reports_db_operations::read_all_reports(&conn)?)
}

pub fn fetch_report(pool: &DbPool, report_id: &str) -> Result<Report, HelperError> {
    let conn = get_conn(pool)?;
    reports_db_operations::read_report_by_id(&conn, report_id).map_err(missing_as("Report"))
}

// --- Submissions ---

pub fn fetch_all_submissions(pool: &DbPool) -> Result<Vec<ContactSubmission>, HelperError> {
    let conn = get_conn(pool)?;
    Ok(submissions_db_operations::read_all_submissions(&conn)?)
}

/// Loads a submission for viewing and marks it read. Viewing an already-read
/// submission issues no write.
pub fn open_submission(pool: &DbPool, submission_id: &str) -> Result<ContactSubmission, HelperError> {
    let conn = get_conn(pool)?;
    let mut submission = submissions_db_operations::read_submission(&conn, submission_id).map_err(missing_as("Submission"))?;
    if !submission.is_read {
        submissions_db_operations::mark_submission_read(&conn, submission_id)?;
        submission.is_read = true;
    }
    Ok(submission)
}
