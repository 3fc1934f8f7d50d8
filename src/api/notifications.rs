use crate::{
    auth::ExtractAuth,
    error::{AppError, AppResult},
    models::{Notification, NotificationKind},
    schema::notifications,
    DbPool,
};
use axum::{
    extract::Path,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationResponse {
    id: i32,
    kind: NotificationKind,
    title: String,
    message: String,
    related_id: Option<i32>,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl NotificationResponse {
    fn from_row(row: Notification) -> Self {
        Self {
            id: row.id,
            kind: row.kind,
            title: row.title,
            message: row.message,
            related_id: row.related_id,
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}

async fn list(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(auth): ExtractAuth,
) -> AppResult<Json<Vec<NotificationResponse>>> {
    let conn = &mut pool.get().await?;

    let rows = notifications::table
        .filter(notifications::user_id.eq(auth.user_id))
        .order(notifications::created_at.desc())
        .load::<Notification>(conn)
        .await?;

    Ok(Json(rows.into_iter().map(NotificationResponse::from_row).collect()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnreadCountResponse {
    unread_count: i64,
}

async fn unread_count(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(auth): ExtractAuth,
) -> AppResult<Json<UnreadCountResponse>> {
    let conn = &mut pool.get().await?;

    let count = notifications::table
        .filter(
            notifications::user_id
                .eq(auth.user_id)
                .and(notifications::is_read.eq(false)),
        )
        .count()
        .get_result::<i64>(conn)
        .await?;

    Ok(Json(UnreadCountResponse {
        unread_count: count,
    }))
}

#[derive(Serialize)]
struct MarkReadResponse {
    status: &'static str,
}

async fn mark_read(
    Extension(pool): Extension<DbPool>,
    Path(notification_id): Path<i32>,
    ExtractAuth(auth): ExtractAuth,
) -> AppResult<Json<MarkReadResponse>> {
    let conn = &mut pool.get().await?;

    let updated = diesel::update(
        notifications::table.filter(
            notifications::id
                .eq(notification_id)
                .and(notifications::user_id.eq(auth.user_id)),
        ),
    )
    .set(notifications::is_read.eq(true))
    .execute(conn)
    .await?;

    if updated == 0 {
        return Err(AppError::NotFound("notification"));
    }
    Ok(Json(MarkReadResponse { status: "read" }))
}

async fn mark_all_read(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(auth): ExtractAuth,
) -> AppResult<Json<MarkReadResponse>> {
    let conn = &mut pool.get().await?;

    diesel::update(
        notifications::table.filter(
            notifications::user_id
                .eq(auth.user_id)
                .and(notifications::is_read.eq(false)),
        ),
    )
    .set(notifications::is_read.eq(true))
    .execute(conn)
    .await?;

    Ok(Json(MarkReadResponse { status: "read" }))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list))
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/:notification_id/read", post(mark_read))
}
