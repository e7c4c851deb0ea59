//! Entity queries
//!
//! Every function takes a `&mut SqliteConnection`, so callers decide
//! the transaction scope: a reconciliation pass passes the same
//! transaction into every call and commits once at the end.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::models::*;
use crate::error::AppError;

// =============================================================================
// Dashboards
// =============================================================================

/// All dashboards in display order
pub async fn all_dashboards(conn: &mut SqliteConnection) -> Result<Vec<Dashboard>, AppError> {
    let dashboards = sqlx::query_as::<_, Dashboard>("SELECT * FROM dashboards ORDER BY ord ASC")
        .fetch_all(conn)
        .await?;

    Ok(dashboards)
}

pub async fn dashboard_by_id(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Dashboard>, AppError> {
    let dashboard = sqlx::query_as::<_, Dashboard>("SELECT * FROM dashboards WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(dashboard)
}

pub async fn dashboard_by_rule_id(
    conn: &mut SqliteConnection,
    rule_id: &str,
) -> Result<Option<Dashboard>, AppError> {
    let dashboard = sqlx::query_as::<_, Dashboard>("SELECT * FROM dashboards WHERE rule_id = ?")
        .bind(rule_id)
        .fetch_optional(conn)
        .await?;

    Ok(dashboard)
}

/// Next free display position (current max + 1)
pub async fn next_dashboard_ord(conn: &mut SqliteConnection) -> Result<i64, AppError> {
    let next: (i64,) = sqlx::query_as("SELECT COALESCE(MAX(ord), 0) + 1 FROM dashboards")
        .fetch_one(conn)
        .await?;

    Ok(next.0)
}

pub async fn insert_dashboard(
    conn: &mut SqliteConnection,
    dashboard: &Dashboard,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO dashboards (id, rule_id, title, search_query, ord, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&dashboard.id)
    .bind(&dashboard.rule_id)
    .bind(&dashboard.title)
    .bind(&dashboard.search_query)
    .bind(dashboard.ord)
    .bind(dashboard.created_at)
    .bind(dashboard.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Update the mutable fields of a dashboard
pub async fn update_dashboard(
    conn: &mut SqliteConnection,
    dashboard: &Dashboard,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE dashboards
        SET rule_id = ?, title = ?, search_query = ?, ord = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&dashboard.rule_id)
    .bind(&dashboard.title)
    .bind(&dashboard.search_query)
    .bind(dashboard.ord)
    .bind(dashboard.updated_at)
    .bind(&dashboard.id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Delete one dashboard and close the gap in display positions
///
/// # Returns
/// `true` if a dashboard was deleted
pub async fn delete_dashboard(conn: &mut SqliteConnection, id: &str) -> Result<bool, AppError> {
    let Some(dashboard) = dashboard_by_id(&mut *conn, id).await? else {
        return Ok(false);
    };

    sqlx::query("DELETE FROM dashboards WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("UPDATE dashboards SET ord = ord - 1 WHERE ord > ?")
        .bind(dashboard.ord)
        .execute(conn)
        .await?;

    Ok(true)
}

/// Delete every dashboard whose id is not in `keep_ids`
pub async fn delete_dashboards_not_in(
    conn: &mut SqliteConnection,
    keep_ids: &[String],
) -> Result<u64, AppError> {
    if keep_ids.is_empty() {
        let result = sqlx::query("DELETE FROM dashboards").execute(conn).await?;
        return Ok(result.rows_affected());
    }

    let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM dashboards WHERE id NOT IN (");
    let mut ids = builder.separated(", ");
    for id in keep_ids {
        ids.push_bind(id);
    }
    ids.push_unseparated(")");

    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}

// =============================================================================
// Authors
// =============================================================================

pub async fn author_by_external_id(
    conn: &mut SqliteConnection,
    external_id: &str,
) -> Result<Option<Author>, AppError> {
    let author = sqlx::query_as::<_, Author>("SELECT * FROM authors WHERE external_id = ?")
        .bind(external_id)
        .fetch_optional(conn)
        .await?;

    Ok(author)
}

pub async fn insert_author(conn: &mut SqliteConnection, author: &Author) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO authors (id, external_id, display_name, handle, avatar_url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&author.id)
    .bind(&author.external_id)
    .bind(&author.display_name)
    .bind(&author.handle)
    .bind(&author.avatar_url)
    .bind(author.created_at)
    .bind(author.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn update_author(conn: &mut SqliteConnection, author: &Author) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE authors
        SET display_name = ?, handle = ?, avatar_url = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&author.display_name)
    .bind(&author.handle)
    .bind(&author.avatar_url)
    .bind(author.updated_at)
    .bind(&author.id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Delete authors no post references any more
pub async fn delete_orphan_authors(conn: &mut SqliteConnection) -> Result<u64, AppError> {
    let result = sqlx::query(
        "DELETE FROM authors WHERE id NOT IN (SELECT DISTINCT author_id FROM posts)",
    )
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Posts
// =============================================================================

pub async fn post_by_external_id(
    conn: &mut SqliteConnection,
    external_id: &str,
) -> Result<Option<Post>, AppError> {
    let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE external_id = ?")
        .bind(external_id)
        .fetch_optional(conn)
        .await?;

    Ok(post)
}

pub async fn insert_post(conn: &mut SqliteConnection, post: &Post) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO posts (id, author_id, external_id, content, published_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.id)
    .bind(&post.author_id)
    .bind(&post.external_id)
    .bind(&post.content)
    .bind(post.published_at)
    .bind(post.created_at)
    .bind(post.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn update_post(conn: &mut SqliteConnection, post: &Post) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE posts
        SET content = ?, published_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.content)
    .bind(post.published_at)
    .bind(post.updated_at)
    .bind(&post.id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Delete posts no dashboard references any more
pub async fn delete_orphan_posts(conn: &mut SqliteConnection) -> Result<u64, AppError> {
    let result = sqlx::query(
        "DELETE FROM posts WHERE id NOT IN (SELECT DISTINCT post_id FROM dashboard_posts)",
    )
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Feed for one dashboard: posts with their authors, newest first
pub async fn posts_for_dashboard(
    conn: &mut SqliteConnection,
    dashboard_id: &str,
) -> Result<Vec<PostWithAuthor>, AppError> {
    let posts = sqlx::query_as::<_, PostWithAuthor>(
        r#"
        SELECT p.id, p.external_id, p.content, p.published_at,
               a.display_name AS author_display_name,
               a.handle AS author_handle,
               a.avatar_url AS author_avatar_url
        FROM dashboard_posts dp
        JOIN posts p ON p.id = dp.post_id
        JOIN authors a ON a.id = p.author_id
        WHERE dp.dashboard_id = ?
        ORDER BY p.published_at DESC
        "#,
    )
    .bind(dashboard_id)
    .fetch_all(conn)
    .await?;

    Ok(posts)
}

// =============================================================================
// Dashboard <-> Post associations
// =============================================================================

pub async fn association_by_pair(
    conn: &mut SqliteConnection,
    dashboard_id: &str,
    post_id: &str,
) -> Result<Option<DashboardPost>, AppError> {
    let association = sqlx::query_as::<_, DashboardPost>(
        "SELECT * FROM dashboard_posts WHERE dashboard_id = ? AND post_id = ?",
    )
    .bind(dashboard_id)
    .bind(post_id)
    .fetch_optional(conn)
    .await?;

    Ok(association)
}

pub async fn insert_association(
    conn: &mut SqliteConnection,
    association: &DashboardPost,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO dashboard_posts (id, dashboard_id, post_id, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&association.id)
    .bind(&association.dashboard_id)
    .bind(&association.post_id)
    .bind(association.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Associations past the retention window for one dashboard
///
/// Posts are ranked newest first by publish time; everything after the
/// first `keep` rows is returned for eviction.
pub async fn associations_beyond_retention(
    conn: &mut SqliteConnection,
    dashboard_id: &str,
    keep: i64,
) -> Result<Vec<DashboardPost>, AppError> {
    let associations = sqlx::query_as::<_, DashboardPost>(
        r#"
        SELECT dp.id, dp.dashboard_id, dp.post_id, dp.created_at
        FROM dashboard_posts dp
        JOIN posts p ON p.id = dp.post_id
        WHERE dp.dashboard_id = ?
        ORDER BY p.published_at DESC
        LIMIT -1 OFFSET ?
        "#,
    )
    .bind(dashboard_id)
    .bind(keep)
    .fetch_all(conn)
    .await?;

    Ok(associations)
}

pub async fn delete_associations(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> Result<u64, AppError> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM dashboard_posts WHERE id IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}

/// Delete every association whose dashboard is not in `keep_dashboard_ids`
pub async fn delete_associations_for_dashboards_not_in(
    conn: &mut SqliteConnection,
    keep_dashboard_ids: &[String],
) -> Result<u64, AppError> {
    if keep_dashboard_ids.is_empty() {
        let result = sqlx::query("DELETE FROM dashboard_posts").execute(conn).await?;
        return Ok(result.rows_affected());
    }

    let mut builder =
        QueryBuilder::<Sqlite>::new("DELETE FROM dashboard_posts WHERE dashboard_id NOT IN (");
    let mut ids = builder.separated(", ");
    for id in keep_dashboard_ids {
        ids.push_bind(id);
    }
    ids.push_unseparated(")");

    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}

/// Delete every association whose post is not in `keep_post_ids`
pub async fn delete_associations_for_posts_not_in(
    conn: &mut SqliteConnection,
    keep_post_ids: &[String],
) -> Result<u64, AppError> {
    if keep_post_ids.is_empty() {
        let result = sqlx::query("DELETE FROM dashboard_posts").execute(conn).await?;
        return Ok(result.rows_affected());
    }

    let mut builder =
        QueryBuilder::<Sqlite>::new("DELETE FROM dashboard_posts WHERE post_id NOT IN (");
    let mut ids = builder.separated(", ");
    for id in keep_post_ids {
        ids.push_bind(id);
    }
    ids.push_unseparated(")");

    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}

/// Delete all associations belonging to one dashboard
pub async fn delete_associations_for_dashboard(
    conn: &mut SqliteConnection,
    dashboard_id: &str,
) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM dashboard_posts WHERE dashboard_id = ?")
        .bind(dashboard_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}
