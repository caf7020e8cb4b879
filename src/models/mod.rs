use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use self::publish::PublishState;

/// An authenticated principal, as known to the identity store.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

/// Roles that can be granted through `user_roles`. Only `admin` exists.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A profile row joined with its derived admin flag, as listed by the user manager.
#[derive(Debug, Serialize, Clone)]
pub struct UserWithRole {
    pub id: String,
    pub user_id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_admin: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub featured_image_url: Option<String>,
    pub category: Option<String>,
    pub author_name: Option<String>,
    pub author_id: Option<String>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl BlogPost {
    pub fn publish_state(&self) -> PublishState {
        PublishState::from_columns(self.published, self.published_at)
    }
}

/// Editable fields of a blog post. The slug is already normalized.
#[derive(Debug, Clone)]
pub struct BlogPostDraft {
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub featured_image_url: Option<String>,
    pub category: Option<String>,
    pub author_name: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct Report {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub file_url: String,
    pub file_name: String,
    pub category: Option<String>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Report {
    pub fn publish_state(&self) -> PublishState {
        PublishState::from_columns(self.published, self.published_at)
    }
}

#[derive(Debug, Clone)]
pub struct ReportDraft {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub file_url: String,
    pub file_name: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct ContactSubmission {
    pub id: String,
    pub name: String,
    pub email: String,
    pub organization: String,
    pub phone: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// What a visitor typed into the contact form, after validation.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub organization: String,
    pub phone: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Notification {
    pub message: String,
    pub r#type: String, // 'success' or 'error'
}

#[derive(Debug, Serialize, Default, Clone, PartialEq, Eq)]
pub struct DashboardStats {
    pub reports: i64,
    pub blog_posts: i64,
    pub submissions: i64,
    pub unread_submissions: i64,
    pub users: i64,
}

pub mod db_operations;
pub mod publish;
