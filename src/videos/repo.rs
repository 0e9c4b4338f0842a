use anyhow::Context;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::params::GenerationParams;
use super::repo_types::{GeneratedVideo, VideoStatus};

const VIDEO_COLUMNS: &str = "id, user_id, prompt, duration, aspect_ratio, quality, style, mode, \
                             source_image_key, prediction_id, url, status, error, created_at, \
                             completed_at";

pub async fn insert_generating(
    db: &PgPool,
    id: Uuid,
    user_id: Uuid,
    p: &GenerationParams,
) -> anyhow::Result<GeneratedVideo> {
    let row = sqlx::query_as::<_, GeneratedVideo>(&format!(
        r#"
        INSERT INTO videos (id, user_id, prompt, duration, aspect_ratio, quality, style, mode, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {VIDEO_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(user_id)
    .bind(&p.prompt)
    .bind(p.duration as i32)
    .bind(p.aspect_ratio)
    .bind(p.quality)
    .bind(p.style)
    .bind(p.mode)
    .bind(VideoStatus::Generating)
    .fetch_one(db)
    .await
    .context("insert video")?;
    Ok(row)
}

pub async fn set_source_image(db: &PgPool, id: Uuid, key: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE videos SET source_image_key = $2 WHERE id = $1")
        .bind(id)
        .bind(key)
        .execute(db)
        .await
        .context("set source image")?;
    Ok(())
}

pub async fn set_prediction_id(db: &PgPool, id: Uuid, prediction_id: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE videos SET prediction_id = $2 WHERE id = $1")
        .bind(id)
        .bind(prediction_id)
        .execute(db)
        .await
        .context("set prediction id")?;
    Ok(())
}

pub async fn mark_completed(db: &PgPool, id: Uuid, url: &str) -> anyhow::Result<GeneratedVideo> {
    let row = sqlx::query_as::<_, GeneratedVideo>(&format!(
        r#"
        UPDATE videos SET status = $2, url = $3, completed_at = now()
         WHERE id = $1
        RETURNING {VIDEO_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(VideoStatus::Completed)
    .bind(url)
    .fetch_one(db)
    .await
    .context("mark video completed")?;
    Ok(row)
}

pub async fn mark_failed(db: &PgPool, id: Uuid, error: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE videos SET status = $2, error = $3, completed_at = now() WHERE id = $1")
        .bind(id)
        .bind(VideoStatus::Failed)
        .bind(error)
        .execute(db)
        .await
        .context("mark video failed")?;
    Ok(())
}

/// Escape LIKE wildcards so the search term matches literally.
pub fn like_pattern(q: &str) -> String {
    let mut out = String::with_capacity(q.len() + 2);
    out.push('%');
    for c in q.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

pub async fn list_by_user(
    db: &PgPool,
    user_id: Uuid,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<GeneratedVideo>> {
    let pattern = search.map(like_pattern);
    let rows = sqlx::query_as::<_, GeneratedVideo>(&format!(
        r#"
        SELECT {VIDEO_COLUMNS}
          FROM videos
         WHERE user_id = $1
           AND ($2::text IS NULL OR prompt ILIKE $2 ESCAPE '\')
         ORDER BY created_at DESC
         LIMIT $3 OFFSET $4
        "#
    ))
    .bind(user_id)
    .bind(pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list videos")?;
    Ok(rows)
}

pub async fn find_for_user(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> anyhow::Result<Option<GeneratedVideo>> {
    let row = sqlx::query_as::<_, GeneratedVideo>(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
    .context("find video")?;
    Ok(row)
}

/// Deletes the caller's videos among `ids`, returning the stored source image
/// keys of the removed rows.
pub async fn delete_for_user(
    db: &PgPool,
    user_id: Uuid,
    ids: &[Uuid],
) -> anyhow::Result<Vec<Option<String>>> {
    let keys: Vec<(Option<String>,)> = sqlx::query_as(
        r#"
        DELETE FROM videos
         WHERE user_id = $1 AND id = ANY($2)
        RETURNING source_image_key
        "#,
    )
    .bind(user_id)
    .bind(ids)
    .fetch_all(db)
    .await
    .context("delete videos")?;
    Ok(keys.into_iter().map(|(k,)| k).collect())
}

/// Marks rows whose generation outlived any possible poll as failed.
pub async fn fail_stale(db: &PgPool, started_before: OffsetDateTime) -> anyhow::Result<u64> {
    let res = sqlx::query(
        r#"
        UPDATE videos
           SET status = $1, error = $2, completed_at = now()
         WHERE status = $3 AND created_at < $4
        "#,
    )
    .bind(VideoStatus::Failed)
    .bind("interrupted by server restart")
    .bind(VideoStatus::Generating)
    .bind(started_before)
    .execute(db)
    .await
    .context("fail stale generations")?;
    Ok(res.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("cat"), "%cat%");
        assert_eq!(like_pattern("100%_real"), "%100\\%\\_real%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
