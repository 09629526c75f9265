use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::helper::sanitization_helpers;
use crate::models::db_operations::posts_db_operations::DbError;
use crate::models::pagination::{Page, PageRequest};
use crate::models::policy::PostPolicy;
use crate::models::post_store::PostStore;
use crate::models::{
    ActingUser, Post, PostChanges, PostDetail, PostFields, PostInput, PostSummary, Tag, Topic,
    DEFAULT_META_KEYWORD,
};

const MAX_TITLE_CHARS: usize = 255;
const MAX_SEARCH_CHARS: usize = 100;

pub const POST_CREATED_MESSAGE: &str = "The post has been successfully created";
pub const POST_UPDATED_MESSAGE: &str = "The post has been successfully updated";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {}", .0.join(" "))]
    Validation(Vec<String>),
    #[error("This action is unauthorized.")]
    Forbidden,
    #[error("Store error: {0}")]
    Store(#[from] DbError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedirectTarget {
    Back,
    Path(String),
}

/// Where the transport should send the user after a write, and what to flash.
#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    pub to: RedirectTarget,
    pub message: Option<String>,
}

#[derive(Debug)]
pub struct Mutation<T> {
    pub record: T,
    pub redirect: Redirect,
}

/// A filtered listing with the banner shown above it.
#[derive(Debug)]
pub struct Listing {
    pub info: String,
    pub posts: Page<PostSummary>,
}

#[derive(Debug, Serialize)]
pub struct FormOptions {
    pub topics: Vec<Topic>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Serialize)]
pub struct EditForm {
    pub post: Post,
    pub selected_tag_ids: Vec<i64>,
    pub options: FormOptions,
}

/// Validated, sanitised post fields shared by create and update.
struct CleanPost {
    title: String,
    slug: String,
    body: String,
    topic_id: Option<i64>,
    tag_ids: Vec<i64>,
    r#type: Option<String>,
}

pub struct ContentService {
    store: Arc<dyn PostStore>,
    policy: Arc<dyn PostPolicy>,
    per_page: u32,
}

impl ContentService {
    pub fn new(store: Arc<dyn PostStore>, policy: Arc<dyn PostPolicy>, per_page: u32) -> Self {
        Self { store, policy, per_page: per_page.max(1) }
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    fn page(&self, page: u32) -> PageRequest {
        PageRequest::new(page, self.per_page)
    }

    pub fn can_manage(&self, user: Option<&ActingUser>, post: &Post) -> bool {
        self.policy.can_manage(user, post)
    }

    fn authorize(&self, user: Option<&ActingUser>, post: &Post) -> Result<(), ServiceError> {
        if self.policy.can_manage(user, post) {
            return Ok(());
        }
        log::warn!(
            "User {:?} denied 'manage' on post {}",
            user.map(|u| u.username.as_str()),
            post.id
        );
        Err(ServiceError::Forbidden)
    }

    fn post_by_id(&self, id: i64) -> Result<Post, ServiceError> {
        self.store
            .find_by_id(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("post {}", id)))
    }

    // ====================================================================
    // =========================== READS ==================================
    // ====================================================================

    pub fn list_recent(&self, page: u32) -> Result<Page<PostSummary>, ServiceError> {
        Ok(self.store.list_recent_active(self.page(page))?)
    }

    /// Inactive posts are only visible to users who may manage them.
    pub fn get_by_slug(&self, slug: &str, user: Option<&ActingUser>) -> Result<PostDetail, ServiceError> {
        let post = self
            .store
            .find_by_slug(slug)?
            .ok_or_else(|| ServiceError::NotFound(format!("post '{}'", slug)))?;

        let can_manage = self.policy.can_manage(user, &post);
        if !post.active && !can_manage {
            return Err(ServiceError::NotFound(format!("post '{}'", slug)));
        }

        let tags = self.store.load_tags(post.id)?;
        let topic = match post.topic_id {
            Some(topic_id) => self.store.find_topic_by_id(topic_id)?,
            None => None,
        };
        let author_name = match post.user_id {
            Some(user_id) => self.store.author_name(user_id)?,
            None => None,
        };

        Ok(PostDetail {
            body_html: sanitization_helpers::render_markdown(&post.body),
            post,
            tags,
            topic,
            author_name,
            can_manage,
        })
    }

    pub fn form_options(&self) -> Result<FormOptions, ServiceError> {
        Ok(FormOptions {
            topics: self.store.all_topics()?,
            tags: self.store.all_tags()?,
        })
    }

    pub fn edit(&self, id: i64, user: Option<&ActingUser>) -> Result<EditForm, ServiceError> {
        let post = self.post_by_id(id)?;
        self.authorize(user, &post)?;
        let selected_tag_ids = self.store.load_tags(post.id)?.into_iter().map(|t| t.id).collect();
        Ok(EditForm { post, selected_tag_ids, options: self.form_options()? })
    }

    pub fn list_by_tag(&self, tag_id: i64, page: u32) -> Result<Listing, ServiceError> {
        let tag = self
            .store
            .find_tag(tag_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("tag {}", tag_id)))?;
        let posts = self.store.list_active_by_tag(tag.id, self.page(page))?;
        Ok(Listing { info: banner("Posts found with tag ", &tag.tag), posts })
    }

    pub fn list_by_topic(&self, topic_slug: &str, page: u32) -> Result<Listing, ServiceError> {
        let topic = self
            .store
            .find_topic_by_slug(topic_slug)?
            .ok_or_else(|| ServiceError::NotFound(format!("topic '{}'", topic_slug)))?;
        let posts = self.store.list_active_by_topic(&topic.slug_topic, self.page(page))?;
        Ok(Listing { info: banner("Posts for Topic: ", &topic.name_topic), posts })
    }

    pub fn list_by_type(&self, post_type: &str, page: u32) -> Result<Page<PostSummary>, ServiceError> {
        Ok(self.store.list_active_by_type(post_type, self.page(page))?)
    }

    /// Keyword search. The term is carried into every pagination link.
    pub fn search(&self, query: &str, page: u32) -> Result<Listing, ServiceError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ServiceError::Validation(vec!["The search field is required.".to_string()]));
        }
        if query.chars().count() > MAX_SEARCH_CHARS {
            return Err(ServiceError::Validation(vec![format!(
                "The search may not be greater than {} characters.",
                MAX_SEARCH_CHARS
            )]));
        }
        let posts = self.store.search(query, self.page(page))?.appends("search", query);
        Ok(Listing { info: banner("Posts found with search: ", query), posts })
    }

    // ====================================================================
    // =========================== WRITES =================================
    // ====================================================================

    pub fn create(&self, input: PostInput, user: Option<&ActingUser>) -> Result<Mutation<Post>, ServiceError> {
        let post = self.insert_post(input, user)?;
        Ok(Mutation {
            record: post,
            redirect: Redirect { to: RedirectTarget::Back, message: Some(POST_CREATED_MESSAGE.to_string()) },
        })
    }

    /// Same as [`ContentService::create`] with `type` forced from the route.
    pub fn create_question(
        &self,
        mut input: PostInput,
        post_type: &str,
        user: Option<&ActingUser>,
    ) -> Result<Mutation<Post>, ServiceError> {
        input.r#type = Some(post_type.trim().to_string()).filter(|t| !t.is_empty());
        let post = self.insert_post(input, user)?;
        Ok(Mutation {
            record: post,
            redirect: Redirect {
                to: RedirectTarget::Path("/".to_string()),
                message: Some(POST_CREATED_MESSAGE.to_string()),
            },
        })
    }

    fn insert_post(&self, input: PostInput, user: Option<&ActingUser>) -> Result<Post, ServiceError> {
        let clean = self.validate(input, None)?;
        let fields = PostFields {
            user_id: user.map(|u| u.id),
            topic_id: clean.topic_id,
            tag_ids: clean.tag_ids,
            meta_des: clean.title.clone(),
            meta_keyword: DEFAULT_META_KEYWORD.to_string(),
            seo_title: clean.slug.clone(),
            title: clean.title,
            slug: clean.slug,
            body: clean.body,
            r#type: clean.r#type,
            active: true,
        };
        let post = self.store.insert(&fields)?;
        log::info!("Post {} ('{}') created", post.id, post.slug);
        Ok(post)
    }

    /// Authorises before validating; the active flag is never changed here.
    pub fn update(&self, id: i64, input: PostInput, user: Option<&ActingUser>) -> Result<Mutation<Post>, ServiceError> {
        let post = self.post_by_id(id)?;
        self.authorize(user, &post)?;

        let clean = self.validate(input, Some(&post))?;
        let changes = PostChanges {
            topic_id: clean.topic_id,
            tag_ids: clean.tag_ids,
            meta_des: clean.title.clone(),
            meta_keyword: DEFAULT_META_KEYWORD.to_string(),
            seo_title: clean.slug.clone(),
            title: clean.title,
            slug: clean.slug,
            body: clean.body,
            r#type: clean.r#type,
        };
        let updated = self.store.update(&post, &changes)?;
        log::info!("Post {} updated", updated.id);
        Ok(Mutation {
            record: updated,
            redirect: Redirect { to: RedirectTarget::Back, message: Some(POST_UPDATED_MESSAGE.to_string()) },
        })
    }

    pub fn delete(&self, id: i64, user: Option<&ActingUser>) -> Result<Mutation<()>, ServiceError> {
        let post = self.post_by_id(id)?;
        self.authorize(user, &post)?;
        self.store.delete(&post)?;
        log::info!("Post {} deleted", post.id);
        Ok(Mutation { record: (), redirect: Redirect { to: RedirectTarget::Back, message: None } })
    }

    /// `existing` is the post being updated, whose own slug does not count as taken.
    fn validate(&self, input: PostInput, existing: Option<&Post>) -> Result<CleanPost, ServiceError> {
        let mut errors = Vec::new();

        let title = sanitization_helpers::strip_all_html(input.title.trim()).trim().to_string();
        if title.is_empty() {
            errors.push("The title field is required.".to_string());
        } else if title.chars().count() > MAX_TITLE_CHARS {
            errors.push(format!("The title may not be greater than {} characters.", MAX_TITLE_CHARS));
        }

        let slug = sanitization_helpers::slugify(&input.slug_title);
        if input.slug_title.trim().is_empty() {
            errors.push("The slug title field is required.".to_string());
        } else if slug.is_empty() {
            errors.push("The slug title format is invalid.".to_string());
        } else if let Some(taken) = self.store.find_by_slug(&slug)? {
            if existing.map_or(true, |post| post.id != taken.id) {
                errors.push("The slug title has already been taken.".to_string());
            }
        }

        if input.body.trim().is_empty() {
            errors.push("The body field is required.".to_string());
        }

        if let Some(topic_id) = input.topic_id {
            if self.store.find_topic_by_id(topic_id)?.is_none() {
                errors.push("The selected topic is invalid.".to_string());
            }
        }

        if !input.tag_ids.is_empty() && self.store.find_tags(&input.tag_ids)?.len() != input.tag_ids.len() {
            errors.push("The selected tags are invalid.".to_string());
        }

        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        Ok(CleanPost {
            title,
            slug,
            body: input.body,
            topic_id: input.topic_id,
            tag_ids: input.tag_ids,
            r#type: input.r#type,
        })
    }
}

fn banner(label: &str, value: &str) -> String {
    format!("{}<strong>{}</strong>", label, html_escape::encode_text(value))
}
