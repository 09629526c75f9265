use chrono::Utc;
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use thiserror::Error;

use crate::helper::sanitization_helpers;
use crate::models::pagination::{Page, PageRequest};
use crate::models::{Post, PostChanges, PostFields, PostSummary, Tag, Topic};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Item not found in database: {0}")]
    NotFound(String),
}

const POST_COLUMNS: &str = "id, user_id, topic_id, title, slug, body, meta_des, meta_keyword, seo_title, type, active, created_at, updated_at";

// Summary queries share one FROM clause so the count and the page agree on filters.
const SUMMARY_FROM: &str = "FROM posts p
    LEFT JOIN topics t ON t.id = p.topic_id
    LEFT JOIN users u ON u.id = p.user_id
    WHERE p.active = 1";

fn post_from_row(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        topic_id: row.get(2)?,
        title: row.get(3)?,
        slug: row.get(4)?,
        body: row.get(5)?,
        meta_des: row.get(6)?,
        meta_keyword: row.get(7)?,
        seo_title: row.get(8)?,
        r#type: row.get(9)?,
        active: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn summary_from_row(row: &Row) -> rusqlite::Result<PostSummary> {
    let body: String = row.get(3)?;
    let topic = match row.get::<_, Option<i64>>(6)? {
        Some(id) => Some(Topic {
            id,
            name_topic: row.get(7)?,
            slug_topic: row.get(8)?,
        }),
        None => None,
    };
    Ok(PostSummary {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        excerpt: sanitization_helpers::make_excerpt(&body),
        r#type: row.get(4)?,
        created_at: row.get(5)?,
        topic,
        author_name: row.get(9)?,
        tags: Vec::new(),
    })
}

/// Escapes LIKE wildcards so user input only ever matches literally.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Runs a paginated summary query. `filter` is appended to the shared WHERE clause
/// and must use positional `?` placeholders matching `filter_params`.
fn read_active_summaries(
    conn: &Connection,
    filter: &str,
    filter_params: &[&dyn ToSql],
    request: PageRequest,
) -> Result<Page<PostSummary>, DbError> {
    let count_sql = format!("SELECT COUNT(*) {} {}", SUMMARY_FROM, filter);
    let total: i64 = conn.query_row(&count_sql, filter_params, |row| row.get(0))?;

    let page_sql = format!(
        "SELECT p.id, p.title, p.slug, p.body, p.type, p.created_at,
                t.id, t.name_topic, t.slug_topic, u.username
         {} {}
         ORDER BY p.created_at DESC, p.id DESC
         LIMIT ? OFFSET ?",
        SUMMARY_FROM, filter
    );
    let limit = i64::from(request.per_page);
    let offset = i64::try_from(request.offset()).unwrap_or(i64::MAX);
    let mut page_params: Vec<&dyn ToSql> = filter_params.to_vec();
    page_params.push(&limit);
    page_params.push(&offset);

    let mut stmt = conn.prepare(&page_sql)?;
    let mut summaries = stmt
        .query_map(page_params.as_slice(), summary_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let ids: Vec<i64> = summaries.iter().map(|s| s.id).collect();
    let mut tags_by_post = load_tags_for_posts(conn, &ids)?;
    for summary in &mut summaries {
        summary.tags = tags_by_post.remove(&summary.id).unwrap_or_default();
    }

    Ok(Page::new(summaries, request, u64::try_from(total).unwrap_or(0)))
}

// ====================================================================
// ========================= LOOKUPS ==================================
// ====================================================================

pub fn read_post_by_slug(conn: &Connection, slug: &str) -> Result<Option<Post>, DbError> {
    let sql = format!("SELECT {} FROM posts WHERE slug = ?1", POST_COLUMNS);
    Ok(conn.query_row(&sql, [slug], post_from_row).optional()?)
}

pub fn read_post_by_id(conn: &Connection, id: i64) -> Result<Option<Post>, DbError> {
    let sql = format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS);
    Ok(conn.query_row(&sql, [id], post_from_row).optional()?)
}

pub fn read_tags_for_post(conn: &Connection, post_id: i64) -> Result<Vec<Tag>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT tg.id, tg.tag FROM post_tag pt
         JOIN tags tg ON tg.id = pt.tag_id
         WHERE pt.post_id = ?1
         ORDER BY tg.tag",
    )?;
    let tags = stmt
        .query_map([post_id], |row| Ok(Tag { id: row.get(0)?, tag: row.get(1)? }))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

/// Loads the tags of several posts in one round trip.
pub fn load_tags_for_posts(conn: &Connection, post_ids: &[i64]) -> Result<HashMap<i64, Vec<Tag>>, DbError> {
    let mut tags_by_post: HashMap<i64, Vec<Tag>> = HashMap::new();
    if post_ids.is_empty() {
        return Ok(tags_by_post);
    }

    let placeholders = vec!["?"; post_ids.len()].join(", ");
    let sql = format!(
        "SELECT pt.post_id, tg.id, tg.tag FROM post_tag pt
         JOIN tags tg ON tg.id = pt.tag_id
         WHERE pt.post_id IN ({})
         ORDER BY tg.tag",
        placeholders
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(post_ids.iter()), |row| {
        Ok((row.get::<_, i64>(0)?, Tag { id: row.get(1)?, tag: row.get(2)? }))
    })?;
    for row in rows {
        let (post_id, tag) = row?;
        tags_by_post.entry(post_id).or_default().push(tag);
    }
    Ok(tags_by_post)
}

// ====================================================================
// ========================= LISTINGS =================================
// ====================================================================

pub fn read_latest_post_summaries(conn: &Connection, request: PageRequest) -> Result<Page<PostSummary>, DbError> {
    read_active_summaries(conn, "", &[], request)
}

pub fn read_post_summaries_by_tag(
    conn: &Connection,
    tag_id: i64,
    request: PageRequest,
) -> Result<Page<PostSummary>, DbError> {
    read_active_summaries(
        conn,
        "AND EXISTS (SELECT 1 FROM post_tag pt WHERE pt.post_id = p.id AND pt.tag_id = ?)",
        &[&tag_id],
        request,
    )
}

pub fn read_post_summaries_by_topic(
    conn: &Connection,
    topic_slug: &str,
    request: PageRequest,
) -> Result<Page<PostSummary>, DbError> {
    read_active_summaries(conn, "AND t.slug_topic = ?", &[&topic_slug], request)
}

pub fn read_post_summaries_by_type(
    conn: &Connection,
    post_type: &str,
    request: PageRequest,
) -> Result<Page<PostSummary>, DbError> {
    read_active_summaries(conn, "AND p.type = ?", &[&post_type], request)
}

pub fn read_post_summaries_by_keyword(
    conn: &Connection,
    keyword_query: &str,
    request: PageRequest,
) -> Result<Page<PostSummary>, DbError> {
    let pattern = like_pattern(keyword_query);
    read_active_summaries(
        conn,
        "AND (p.title LIKE ? ESCAPE '\\' OR p.body LIKE ? ESCAPE '\\')",
        &[&pattern, &pattern],
        request,
    )
}

// ====================================================================
// ========================= MUTATIONS ================================
// ====================================================================

fn replace_post_tags(conn: &Connection, post_id: i64, tag_ids: &[i64]) -> Result<(), DbError> {
    conn.execute("DELETE FROM post_tag WHERE post_id = ?1", [post_id])?;
    let mut stmt = conn.prepare("INSERT OR IGNORE INTO post_tag (post_id, tag_id) VALUES (?1, ?2)")?;
    for tag_id in tag_ids {
        stmt.execute(params![post_id, tag_id])?;
    }
    Ok(())
}

pub fn create_post(conn: &mut Connection, fields: &PostFields) -> Result<Post, DbError> {
    let now = Utc::now();
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO posts (user_id, topic_id, title, slug, body, meta_des, meta_keyword, seo_title, type, active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            fields.user_id,
            fields.topic_id,
            fields.title,
            fields.slug,
            fields.body,
            fields.meta_des,
            fields.meta_keyword,
            fields.seo_title,
            fields.r#type,
            fields.active,
            now,
        ],
    )?;
    let post_id = tx.last_insert_rowid();
    replace_post_tags(&tx, post_id, &fields.tag_ids)?;
    let post = read_post_by_id(&tx, post_id)?.ok_or_else(|| DbError::NotFound(post_id.to_string()))?;
    tx.commit()?;
    Ok(post)
}

/// Rewrites the editable columns of a post. `active`, `user_id` and `created_at` are never touched.
pub fn update_post(conn: &mut Connection, post_id: i64, changes: &PostChanges) -> Result<Post, DbError> {
    let tx = conn.transaction()?;
    let updated = tx.execute(
        "UPDATE posts SET topic_id = ?1, title = ?2, slug = ?3, body = ?4, meta_des = ?5,
            meta_keyword = ?6, seo_title = ?7, type = ?8, updated_at = ?9
         WHERE id = ?10",
        params![
            changes.topic_id,
            changes.title,
            changes.slug,
            changes.body,
            changes.meta_des,
            changes.meta_keyword,
            changes.seo_title,
            changes.r#type,
            Utc::now(),
            post_id,
        ],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(post_id.to_string()));
    }
    replace_post_tags(&tx, post_id, &changes.tag_ids)?;
    let post = read_post_by_id(&tx, post_id)?.ok_or_else(|| DbError::NotFound(post_id.to_string()))?;
    tx.commit()?;
    Ok(post)
}

pub fn delete_post(conn: &mut Connection, post_id: i64) -> Result<(), DbError> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM post_tag WHERE post_id = ?1", [post_id])?;
    let deleted = tx.execute("DELETE FROM posts WHERE id = ?1", [post_id])?;
    if deleted == 0 {
        return Err(DbError::NotFound(post_id.to_string()));
    }
    tx.commit()?;
    Ok(())
}
