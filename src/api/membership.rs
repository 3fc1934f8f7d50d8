use super::club::UserBrief;
use crate::{
    auth::ExtractAuth,
    error::{unique_violation, AppError, AppResult},
    models::{
        Club, ClubMember, ClubMembershipRequest, ClubRoleKind, ClubStatus, NewClubMember,
        NewClubRole, NewMembershipRequest, RequestStatus, User,
    },
    notify,
    policy::{self, JoinPlan, RequestAction},
    schema::*,
    DbPool,
};
use axum::{
    extract::Path,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct JoinRequest {
    message: Option<String>,
}

#[derive(Serialize)]
struct WorkflowStatusResponse {
    status: &'static str,
}

async fn join(
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
    ExtractAuth(auth): ExtractAuth,
    body: Option<Json<JoinRequest>>,
) -> AppResult<Json<WorkflowStatusResponse>> {
    let conn = &mut pool.get().await?;

    // Only active clubs can be joined; anything else is invisible here.
    let club = clubs::table
        .filter(clubs::id.eq(club_id).and(clubs::status.eq(ClubStatus::Active)))
        .first::<Club>(conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound("club"))?;

    let is_member = club_members::table
        .filter(
            club_members::club_id
                .eq(club.id)
                .and(club_members::user_id.eq(auth.user_id)),
        )
        .first::<ClubMember>(conn)
        .await
        .optional()?
        .is_some();

    match policy::decide_join(&club, is_member)? {
        JoinPlan::RequestApproval => {
            let already_pending = club_membership_requests::table
                .filter(
                    club_membership_requests::club_id
                        .eq(club.id)
                        .and(club_membership_requests::user_id.eq(auth.user_id))
                        .and(club_membership_requests::status.eq(RequestStatus::Pending)),
                )
                .first::<ClubMembershipRequest>(conn)
                .await
                .optional()?
                .is_some();
            if already_pending {
                return Err(AppError::DuplicateRequest);
            }

            let message = body.and_then(|Json(b)| b.message).unwrap_or_default();
            let requester = auth.display_name.clone();
            let user_id = auth.user_id;
            conn.transaction::<_, AppError, _>(|conn| {
                async move {
                    diesel::insert_into(club_membership_requests::table)
                        .values(NewMembershipRequest {
                            club_id: club.id,
                            user_id,
                            message,
                            status: RequestStatus::Pending,
                            created_at: Utc::now(),
                        })
                        .execute(conn)
                        .await
                        .map_err(|e| unique_violation(e, AppError::DuplicateRequest))?;

                    notify::enqueue(conn, notify::membership_requested(&club, &requester)).await?;
                    Ok(())
                }
                .scope_boxed()
            })
            .await?;

            notify::dispatch_pending(conn).await;
            Ok(Json(WorkflowStatusResponse {
                status: "pending_approval",
            }))
        }
        JoinPlan::Direct => {
            let user_id = auth.user_id;
            conn.transaction::<_, AppError, _>(|conn| {
                async move {
                    let now = Utc::now();
                    diesel::insert_into(club_members::table)
                        .values(NewClubMember {
                            club_id: club.id,
                            user_id,
                            joined_at: now,
                        })
                        .execute(conn)
                        .await
                        .map_err(|e| unique_violation(e, AppError::AlreadyMember))?;

                    diesel::insert_into(club_roles::table)
                        .values(NewClubRole {
                            club_id: club.id,
                            user_id,
                            role: ClubRoleKind::Member,
                            assigned_by: Some(user_id),
                            assigned_at: now,
                        })
                        .on_conflict((club_roles::club_id, club_roles::user_id))
                        .do_nothing()
                        .execute(conn)
                        .await?;

                    notify::enqueue(conn, vec![notify::member_joined(&club, user_id)]).await?;
                    Ok(())
                }
                .scope_boxed()
            })
            .await?;

            notify::dispatch_pending(conn).await;
            Ok(Json(WorkflowStatusResponse { status: "joined" }))
        }
    }
}

async fn leave(
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
    ExtractAuth(auth): ExtractAuth,
) -> AppResult<Json<WorkflowStatusResponse>> {
    let conn = &mut pool.get().await?;

    let club = clubs::table
        .find(club_id)
        .first::<Club>(conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound("club"))?;

    let is_member = club_members::table
        .filter(
            club_members::club_id
                .eq(club.id)
                .and(club_members::user_id.eq(auth.user_id)),
        )
        .first::<ClubMember>(conn)
        .await
        .optional()?
        .is_some();

    policy::check_leave(&club, auth.user_id, is_member)?;

    let user_id = auth.user_id;
    conn.transaction::<_, AppError, _>(|conn| {
        async move {
            diesel::delete(
                club_members::table.filter(
                    club_members::club_id
                        .eq(club_id)
                        .and(club_members::user_id.eq(user_id)),
                ),
            )
            .execute(conn)
            .await?;
            diesel::delete(
                club_roles::table.filter(
                    club_roles::club_id
                        .eq(club_id)
                        .and(club_roles::user_id.eq(user_id)),
                ),
            )
            .execute(conn)
            .await?;
            Ok(())
        }
        .scope_boxed()
    })
    .await?;

    Ok(Json(WorkflowStatusResponse { status: "left" }))
}

async fn members(
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
    ExtractAuth(auth): ExtractAuth,
) -> AppResult<Json<Vec<UserBrief>>> {
    let conn = &mut pool.get().await?;

    let club = clubs::table
        .find(club_id)
        .first::<Club>(conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound("club"))?;

    let is_member = club_members::table
        .filter(
            club_members::club_id
                .eq(club.id)
                .and(club_members::user_id.eq(auth.user_id)),
        )
        .first::<ClubMember>(conn)
        .await
        .optional()?
        .is_some();

    // Outsiders see an empty roster, not an error.
    if !(is_member || policy::can_manage(&auth, &club)) {
        return Ok(Json(Vec::new()));
    }

    let roster: Vec<(ClubMember, User)> = club_members::table
        .inner_join(users::table)
        .filter(club_members::club_id.eq(club.id))
        .filter(users::is_active.eq(true))
        .order(users::display_name.asc())
        .load(conn)
        .await?;

    Ok(Json(
        roster
            .into_iter()
            .map(|(_, user)| UserBrief::from_user(&user))
            .collect(),
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MembershipRequestResponse {
    id: i32,
    club_id: i32,
    user: UserBrief,
    message: String,
    status: RequestStatus,
    created_at: DateTime<Utc>,
}

async fn pending_requests(
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
    ExtractAuth(auth): ExtractAuth,
) -> AppResult<Json<Vec<MembershipRequestResponse>>> {
    let conn = &mut pool.get().await?;

    let club = clubs::table
        .find(club_id)
        .first::<Club>(conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound("club"))?;

    // Non-managers get an empty list, not an error.
    if !policy::can_manage(&auth, &club) {
        return Ok(Json(Vec::new()));
    }

    let rows: Vec<(ClubMembershipRequest, User)> = club_membership_requests::table
        .inner_join(users::table)
        .filter(
            club_membership_requests::club_id
                .eq(club.id)
                .and(club_membership_requests::status.eq(RequestStatus::Pending)),
        )
        .order(club_membership_requests::created_at.desc())
        .load(conn)
        .await?;

    Ok(Json(
        rows.into_iter()
            .map(|(request, user)| MembershipRequestResponse {
                id: request.id,
                club_id: request.club_id,
                user: UserBrief::from_user(&user),
                message: request.message,
                status: request.status,
                created_at: request.created_at,
            })
            .collect(),
    ))
}

#[derive(Deserialize)]
struct ProcessRequest {
    action: String,
}

#[derive(Serialize)]
struct ProcessResponse {
    status: RequestStatus,
}

async fn process_request(
    Extension(pool): Extension<DbPool>,
    Path((club_id, request_id)): Path<(i32, i32)>,
    ExtractAuth(auth): ExtractAuth,
    Json(req): Json<ProcessRequest>,
) -> AppResult<Json<ProcessResponse>> {
    let conn = &mut pool.get().await?;

    let club = clubs::table
        .find(club_id)
        .first::<Club>(conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound("club"))?;

    let request = club_membership_requests::table
        .filter(
            club_membership_requests::id
                .eq(request_id)
                .and(club_membership_requests::club_id.eq(club.id)),
        )
        .first::<ClubMembershipRequest>(conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound("membership request"))?;

    policy::require_manage(&auth, &club)?;
    let action = RequestAction::parse(&req.action)?;
    policy::ensure_pending(&request)?;

    let manager_id = auth.user_id;
    let resolved = match action {
        RequestAction::Approve => RequestStatus::Approved,
        RequestAction::Reject => RequestStatus::Rejected,
    };

    conn.transaction::<_, AppError, _>(|conn| {
        async move {
            let now = Utc::now();
            diesel::update(club_membership_requests::table.find(request.id))
                .set((
                    club_membership_requests::status.eq(resolved),
                    club_membership_requests::processed_at.eq(Some(now)),
                    club_membership_requests::processed_by.eq(Some(manager_id)),
                ))
                .execute(conn)
                .await?;

            match action {
                RequestAction::Approve => {
                    diesel::insert_into(club_members::table)
                        .values(NewClubMember {
                            club_id: club.id,
                            user_id: request.user_id,
                            joined_at: now,
                        })
                        .on_conflict((club_members::club_id, club_members::user_id))
                        .do_nothing()
                        .execute(conn)
                        .await?;

                    diesel::insert_into(club_roles::table)
                        .values(NewClubRole {
                            club_id: club.id,
                            user_id: request.user_id,
                            role: ClubRoleKind::Member,
                            assigned_by: Some(manager_id),
                            assigned_at: now,
                        })
                        .on_conflict((club_roles::club_id, club_roles::user_id))
                        .do_nothing()
                        .execute(conn)
                        .await?;

                    notify::enqueue(conn, vec![notify::request_approved(&club, request.user_id)])
                        .await?;
                }
                RequestAction::Reject => {
                    notify::enqueue(conn, vec![notify::request_rejected(&club, request.user_id)])
                        .await?;
                }
            }
            Ok(())
        }
        .scope_boxed()
    })
    .await?;

    notify::dispatch_pending(conn).await;
    Ok(Json(ProcessResponse { status: resolved }))
}

pub fn app() -> Router {
    Router::new()
        .route("/:club_id/join", post(join))
        .route("/:club_id/leave", post(leave))
        .route("/:club_id/members", get(members))
        .route("/:club_id/membership-requests", get(pending_requests))
        .route(
            "/:club_id/membership-requests/:request_id/process",
            post(process_request),
        )
}
