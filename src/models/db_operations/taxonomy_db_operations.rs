use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::posts_db_operations::DbError;
use crate::models::{Tag, Topic};

fn topic_from_row(row: &Row) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: row.get(0)?,
        name_topic: row.get(1)?,
        slug_topic: row.get(2)?,
    })
}

fn tag_from_row(row: &Row) -> rusqlite::Result<Tag> {
    Ok(Tag { id: row.get(0)?, tag: row.get(1)? })
}

pub fn create_topic(conn: &Connection, name_topic: &str, slug_topic: &str) -> Result<Topic, DbError> {
    conn.execute(
        "INSERT INTO topics (name_topic, slug_topic) VALUES (?1, ?2)",
        params![name_topic, slug_topic],
    )?;
    Ok(Topic {
        id: conn.last_insert_rowid(),
        name_topic: name_topic.to_string(),
        slug_topic: slug_topic.to_string(),
    })
}

pub fn create_tag(conn: &Connection, tag: &str) -> Result<Tag, DbError> {
    conn.execute("INSERT INTO tags (tag) VALUES (?1)", [tag])?;
    Ok(Tag { id: conn.last_insert_rowid(), tag: tag.to_string() })
}

pub fn read_topic_by_id(conn: &Connection, id: i64) -> Result<Option<Topic>, DbError> {
    Ok(conn
        .query_row("SELECT id, name_topic, slug_topic FROM topics WHERE id = ?1", [id], topic_from_row)
        .optional()?)
}

pub fn read_topic_by_slug(conn: &Connection, slug: &str) -> Result<Option<Topic>, DbError> {
    Ok(conn
        .query_row("SELECT id, name_topic, slug_topic FROM topics WHERE slug_topic = ?1", [slug], topic_from_row)
        .optional()?)
}

pub fn read_all_topics(conn: &Connection) -> Result<Vec<Topic>, DbError> {
    let mut stmt = conn.prepare("SELECT id, name_topic, slug_topic FROM topics ORDER BY name_topic")?;
    let topics = stmt.query_map([], topic_from_row)?.collect::<Result<Vec<_>, _>>()?;
    Ok(topics)
}

pub fn read_tag_by_id(conn: &Connection, id: i64) -> Result<Option<Tag>, DbError> {
    Ok(conn
        .query_row("SELECT id, tag FROM tags WHERE id = ?1", [id], tag_from_row)
        .optional()?)
}

pub fn read_tags_by_ids(conn: &Connection, ids: &[i64]) -> Result<Vec<Tag>, DbError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("SELECT id, tag FROM tags WHERE id IN ({}) ORDER BY tag", placeholders);
    let mut stmt = conn.prepare(&sql)?;
    let tags = stmt
        .query_map(params_from_iter(ids.iter()), tag_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

pub fn read_all_tags(conn: &Connection) -> Result<Vec<Tag>, DbError> {
    let mut stmt = conn.prepare("SELECT id, tag FROM tags ORDER BY tag")?;
    let tags = stmt.query_map([], tag_from_row)?.collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::db_setup::test_pool;

    #[test]
    fn topics_resolve_by_id_and_slug() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let topic = create_topic(&conn, "Databases", "databases").unwrap();

        assert_eq!(read_topic_by_id(&conn, topic.id).unwrap(), Some(topic.clone()));
        assert_eq!(read_topic_by_slug(&conn, "databases").unwrap(), Some(topic));
        assert!(read_topic_by_slug(&conn, "nope").unwrap().is_none());
        assert!(create_topic(&conn, "Other", "databases").is_err());
    }

    #[test]
    fn tags_by_ids_ignores_unknown_ids() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let web = create_tag(&conn, "web").unwrap();
        let api = create_tag(&conn, "api").unwrap();

        let found = read_tags_by_ids(&conn, &[web.id, api.id, 999]).unwrap();
        assert_eq!(found, vec![api.clone(), web.clone()]);
        assert_eq!(read_all_tags(&conn).unwrap(), vec![api, web]);
        assert!(read_tags_by_ids(&conn, &[]).unwrap().is_empty());
    }
}
