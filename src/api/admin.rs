use super::club::{load_clubs, ClubResponse};
use crate::{
    auth::ExtractAuth,
    error::{AppError, AppResult},
    models::{Club, ClubStatus},
    notify, policy,
    schema::*,
    DbPool,
};
use axum::{
    extract::Path,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

async fn pending_clubs(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(auth): ExtractAuth,
) -> AppResult<Json<Vec<ClubResponse>>> {
    if !policy::can_review_clubs(&auth) {
        return Err(AppError::Permission(
            "only admins and faculty can review pending clubs".into(),
        ));
    }

    let conn = &mut pool.get().await?;

    let rows = clubs::table
        .filter(clubs::status.eq(ClubStatus::Pending))
        .order(clubs::created_at.desc())
        .load::<Club>(conn)
        .await?;

    Ok(Json(load_clubs(conn, rows, &auth).await?))
}

#[derive(Serialize)]
struct ClubStatusResponse {
    status: ClubStatus,
}

async fn approve(
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
    ExtractAuth(auth): ExtractAuth,
) -> AppResult<Json<ClubStatusResponse>> {
    policy::require_platform_admin(&auth)?;

    let conn = &mut pool.get().await?;

    let club = clubs::table
        .find(club_id)
        .first::<Club>(conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound("club"))?;

    // A non-pending club reports its current status instead of erroring; no
    // re-stamp, no re-notify.
    if club.status != ClubStatus::Pending {
        return Ok(Json(ClubStatusResponse {
            status: club.status,
        }));
    }

    let admin_id = auth.user_id;
    let status = conn
        .transaction::<_, AppError, _>(|conn| {
            async move {
                let now = Utc::now();
                let updated: Club = diesel::update(clubs::table.find(club.id))
                    .set((
                        clubs::status.eq(ClubStatus::Active),
                        clubs::approved_by.eq(Some(admin_id)),
                        clubs::approved_at.eq(Some(now)),
                        clubs::updated_at.eq(now),
                    ))
                    .get_result(conn)
                    .await?;

                notify::enqueue(conn, notify::club_approved(&updated).into_iter().collect())
                    .await?;
                Ok(updated.status)
            }
            .scope_boxed()
        })
        .await?;

    notify::dispatch_pending(conn).await;
    Ok(Json(ClubStatusResponse { status }))
}

#[derive(Deserialize)]
struct RejectRequest {
    reason: Option<String>,
}

async fn reject(
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
    ExtractAuth(auth): ExtractAuth,
    body: Option<Json<RejectRequest>>,
) -> AppResult<Json<ClubStatusResponse>> {
    policy::require_platform_admin(&auth)?;

    let conn = &mut pool.get().await?;

    let club = clubs::table
        .find(club_id)
        .first::<Club>(conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound("club"))?;

    if club.status != ClubStatus::Pending {
        return Ok(Json(ClubStatusResponse {
            status: club.status,
        }));
    }

    let reason = body
        .and_then(|Json(b)| b.reason)
        .unwrap_or_default();
    let status = conn
        .transaction::<_, AppError, _>(|conn| {
            async move {
                let updated: Club = diesel::update(clubs::table.find(club.id))
                    .set((
                        clubs::status.eq(ClubStatus::Inactive),
                        clubs::updated_at.eq(Utc::now()),
                    ))
                    .get_result(conn)
                    .await?;

                notify::enqueue(
                    conn,
                    notify::club_rejected(&updated, &reason).into_iter().collect(),
                )
                .await?;
                Ok(updated.status)
            }
            .scope_boxed()
        })
        .await?;

    notify::dispatch_pending(conn).await;
    Ok(Json(ClubStatusResponse { status }))
}

pub fn app() -> Router {
    Router::new()
        .route("/admin/pending", get(pending_clubs))
        .route("/:club_id/approve", post(approve))
        .route("/:club_id/reject", post(reject))
}
