use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed keyword string stamped on every post written through the front-end.
pub const DEFAULT_META_KEYWORD: &str = "New Post, TTB Blogs";

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Post {
    pub id: i64,
    pub user_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub meta_des: String,
    pub meta_keyword: String,
    pub seo_title: String,
    pub r#type: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub tag: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Topic {
    pub id: i64,
    pub name_topic: String,
    pub slug_topic: String,
}

/// Row shape used by every listing page.
#[derive(Debug, Serialize, Clone)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub r#type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub topic: Option<Topic>,
    pub author_name: Option<String>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Serialize)]
pub struct PostDetail {
    pub post: Post,
    pub body_html: String,
    pub tags: Vec<Tag>,
    pub topic: Option<Topic>,
    pub author_name: Option<String>,
    pub can_manage: bool,
}

/// Everything needed to insert a post. Built by the content service, never by handlers.
#[derive(Debug, Clone)]
pub struct PostFields {
    pub user_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub tag_ids: Vec<i64>,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub meta_des: String,
    pub meta_keyword: String,
    pub seo_title: String,
    pub r#type: Option<String>,
    pub active: bool,
}

/// Fields an update may touch. Ownership and the active flag are not part of an update.
#[derive(Debug, Clone)]
pub struct PostChanges {
    pub topic_id: Option<i64>,
    pub tag_ids: Vec<i64>,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub meta_des: String,
    pub meta_keyword: String,
    pub seo_title: String,
    pub r#type: Option<String>,
}

/// Raw post form input, after form decoding but before validation.
#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub title: String,
    pub slug_title: String,
    pub body: String,
    pub topic_id: Option<i64>,
    pub tag_ids: Vec<i64>,
    pub r#type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ActingUser {
    pub id: i64,
    pub username: String,
    pub role: String,
}

impl ActingUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

#[derive(Debug, Serialize)]
pub struct Member {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Notification {
    pub message: String,
    pub r#type: String, // 'success' or 'error'
}

pub mod db_operations;
pub mod pagination;
pub mod policy;
pub mod post_store;
