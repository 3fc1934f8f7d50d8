use super::club::UserBrief;
use crate::{
    auth::ExtractAuth,
    error::{unique_violation, AppError, AppResult},
    models::{Club, ClubRole, ClubRoleKind, NewClubRole, User},
    policy,
    schema::*,
    DbPool,
};
use axum::{extract::Path, routing::get, Extension, Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClubRoleResponse {
    id: i32,
    club_id: i32,
    user: UserBrief,
    role: ClubRoleKind,
    assigned_by: Option<i32>,
    assigned_at: DateTime<Utc>,
}

async fn list_roles(
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
    ExtractAuth(auth): ExtractAuth,
) -> AppResult<Json<Vec<ClubRoleResponse>>> {
    let conn = &mut pool.get().await?;

    let club = clubs::table
        .find(club_id)
        .first::<Club>(conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound("club"))?;

    // Role records are manager-facing; everyone else sees an empty list.
    if !policy::can_manage(&auth, &club) {
        return Ok(Json(Vec::new()));
    }

    let rows: Vec<(ClubRole, User)> = club_roles::table
        .inner_join(users::table)
        .filter(club_roles::club_id.eq(club.id))
        .order(club_roles::assigned_at.asc())
        .load(conn)
        .await?;

    Ok(Json(
        rows.into_iter()
            .map(|(record, user)| ClubRoleResponse {
                id: record.id,
                club_id: record.club_id,
                user: UserBrief::from_user(&user),
                role: record.role,
                assigned_by: record.assigned_by,
                assigned_at: record.assigned_at,
            })
            .collect(),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoleRequest {
    user_id: i32,
    role: ClubRoleKind,
}

async fn create_role(
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
    ExtractAuth(auth): ExtractAuth,
    Json(req): Json<CreateRoleRequest>,
) -> AppResult<Json<ClubRoleResponse>> {
    let conn = &mut pool.get().await?;

    let club = clubs::table
        .find(club_id)
        .first::<Club>(conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound("club"))?;

    policy::require_manage(&auth, &club)?;

    let user = users::table
        .find(req.user_id)
        .first::<User>(conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound("user"))?;

    let record: ClubRole = diesel::insert_into(club_roles::table)
        .values(NewClubRole {
            club_id: club.id,
            user_id: user.id,
            role: req.role,
            assigned_by: Some(auth.user_id),
            assigned_at: Utc::now(),
        })
        .get_result(conn)
        .await
        .map_err(|e| {
            unique_violation(
                e,
                AppError::Validation("user already holds a role in this club".into()),
            )
        })?;

    Ok(Json(ClubRoleResponse {
        id: record.id,
        club_id: record.club_id,
        user: UserBrief::from_user(&user),
        role: record.role,
        assigned_by: record.assigned_by,
        assigned_at: record.assigned_at,
    }))
}

pub fn app() -> Router {
    Router::new().route("/:club_id/roles", get(list_roles).post(create_role))
}
