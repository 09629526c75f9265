use crate::models::db_operations::posts_db_operations::{self, DbError};
use crate::models::db_operations::{taxonomy_db_operations, users_db_operations};
use crate::models::pagination::{Page, PageRequest};
use crate::models::{Post, PostChanges, PostFields, PostSummary, Tag, Topic};
use crate::DbPool;

/// Persistence contract consumed by the content service.
///
/// Listing operations only ever return active posts, newest first.
pub trait PostStore: Send + Sync {
    fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, DbError>;
    fn find_by_id(&self, id: i64) -> Result<Option<Post>, DbError>;

    fn list_recent_active(&self, page: PageRequest) -> Result<Page<PostSummary>, DbError>;
    fn list_active_by_tag(&self, tag_id: i64, page: PageRequest) -> Result<Page<PostSummary>, DbError>;
    fn list_active_by_topic(&self, topic_slug: &str, page: PageRequest) -> Result<Page<PostSummary>, DbError>;
    fn list_active_by_type(&self, post_type: &str, page: PageRequest) -> Result<Page<PostSummary>, DbError>;
    fn search(&self, query: &str, page: PageRequest) -> Result<Page<PostSummary>, DbError>;

    fn insert(&self, fields: &PostFields) -> Result<Post, DbError>;
    fn update(&self, post: &Post, changes: &PostChanges) -> Result<Post, DbError>;
    fn delete(&self, post: &Post) -> Result<(), DbError>;

    // Relation loads. Nothing is fetched implicitly.
    fn load_tags(&self, post_id: i64) -> Result<Vec<Tag>, DbError>;
    fn find_tag(&self, id: i64) -> Result<Option<Tag>, DbError>;
    fn find_tags(&self, ids: &[i64]) -> Result<Vec<Tag>, DbError>;
    fn all_tags(&self) -> Result<Vec<Tag>, DbError>;
    fn find_topic_by_id(&self, id: i64) -> Result<Option<Topic>, DbError>;
    fn find_topic_by_slug(&self, slug: &str) -> Result<Option<Topic>, DbError>;
    fn all_topics(&self) -> Result<Vec<Topic>, DbError>;
    fn author_name(&self, user_id: i64) -> Result<Option<String>, DbError>;
}

/// SQLite-backed store. Each call checks out exactly one pooled connection.
pub struct SqlitePostStore {
    pool: DbPool,
}

impl SqlitePostStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>, DbError> {
        self.pool.get().map_err(DbError::Pool)
    }
}

impl PostStore for SqlitePostStore {
    fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, DbError> {
        posts_db_operations::read_post_by_slug(&*self.conn()?, slug)
    }

    fn find_by_id(&self, id: i64) -> Result<Option<Post>, DbError> {
        posts_db_operations::read_post_by_id(&*self.conn()?, id)
    }

    fn list_recent_active(&self, page: PageRequest) -> Result<Page<PostSummary>, DbError> {
        posts_db_operations::read_latest_post_summaries(&*self.conn()?, page)
    }

    fn list_active_by_tag(&self, tag_id: i64, page: PageRequest) -> Result<Page<PostSummary>, DbError> {
        posts_db_operations::read_post_summaries_by_tag(&*self.conn()?, tag_id, page)
    }

    fn list_active_by_topic(&self, topic_slug: &str, page: PageRequest) -> Result<Page<PostSummary>, DbError> {
        posts_db_operations::read_post_summaries_by_topic(&*self.conn()?, topic_slug, page)
    }

    fn list_active_by_type(&self, post_type: &str, page: PageRequest) -> Result<Page<PostSummary>, DbError> {
        posts_db_operations::read_post_summaries_by_type(&*self.conn()?, post_type, page)
    }

    fn search(&self, query: &str, page: PageRequest) -> Result<Page<PostSummary>, DbError> {
        posts_db_operations::read_post_summaries_by_keyword(&*self.conn()?, query, page)
    }

    fn insert(&self, fields: &PostFields) -> Result<Post, DbError> {
        let mut conn = self.conn()?;
        posts_db_operations::create_post(&mut conn, fields)
    }

    fn update(&self, post: &Post, changes: &PostChanges) -> Result<Post, DbError> {
        let mut conn = self.conn()?;
        posts_db_operations::update_post(&mut conn, post.id, changes)
    }

    fn delete(&self, post: &Post) -> Result<(), DbError> {
        let mut conn = self.conn()?;
        posts_db_operations::delete_post(&mut conn, post.id)
    }

    fn load_tags(&self, post_id: i64) -> Result<Vec<Tag>, DbError> {
        posts_db_operations::read_tags_for_post(&*self.conn()?, post_id)
    }

    fn find_tag(&self, id: i64) -> Result<Option<Tag>, DbError> {
        taxonomy_db_operations::read_tag_by_id(&*self.conn()?, id)
    }

    fn find_tags(&self, ids: &[i64]) -> Result<Vec<Tag>, DbError> {
        taxonomy_db_operations::read_tags_by_ids(&*self.conn()?, ids)
    }

    fn all_tags(&self) -> Result<Vec<Tag>, DbError> {
        taxonomy_db_operations::read_all_tags(&*self.conn()?)
    }

    fn find_topic_by_id(&self, id: i64) -> Result<Option<Topic>, DbError> {
        taxonomy_db_operations::read_topic_by_id(&*self.conn()?, id)
    }

    fn find_topic_by_slug(&self, slug: &str) -> Result<Option<Topic>, DbError> {
        taxonomy_db_operations::read_topic_by_slug(&*self.conn()?, slug)
    }

    fn all_topics(&self) -> Result<Vec<Topic>, DbError> {
        taxonomy_db_operations::read_all_topics(&*self.conn()?)
    }

    fn author_name(&self, user_id: i64) -> Result<Option<String>, DbError> {
        Ok(users_db_operations::read_username_by_id(&*self.conn()?, user_id)?)
    }
}
