use crate::{
    auth::{AuthContext, ExtractAuth},
    error::{AppError, AppResult},
    models::{
        Club, ClubMember, ClubRoleKind, ClubStatus, NewClubMember, NewClubRole, PlatformRole, User,
    },
    notify, policy,
    schema::*,
    DbPool,
};
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::{
    scoped_futures::ScopedFutureExt, AsyncConnection, AsyncPgConnection, RunQueryDsl,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserBrief {
    pub id: i32,
    pub display_name: String,
    pub role: PlatformRole,
}

impl UserBrief {
    pub(crate) fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name.clone(),
            role: user.role,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClubResponse {
    id: i32,
    name: String,
    description: String,
    status: ClubStatus,
    category: String,
    website: String,
    contact_email: String,
    meeting_schedule: String,
    rules: String,
    requires_approval: bool,
    president: Option<UserBrief>,
    faculty_advisor: Option<UserBrief>,
    member_count: i64,
    is_member: bool,
    can_manage: bool,
    approved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

pub(crate) async fn load_clubs(
    conn: &mut AsyncPgConnection,
    rows: Vec<Club>,
    viewer: &AuthContext,
) -> AppResult<Vec<ClubResponse>> {
    let club_ids: Vec<i32> = rows.iter().map(|c| c.id).collect();

    let user_ids: Vec<i32> = rows
        .iter()
        .flat_map(|c| [c.president_id, c.faculty_advisor_id])
        .flatten()
        .collect();
    let people: HashMap<i32, User> = users::table
        .filter(users::id.eq_any(user_ids))
        .load::<User>(conn)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let member_counts: HashMap<i32, i64> = club_members::table
        .filter(club_members::club_id.eq_any(club_ids.iter().copied()))
        .group_by(club_members::club_id)
        .select((club_members::club_id, count_star()))
        .load::<(i32, i64)>(conn)
        .await?
        .into_iter()
        .collect();

    let my_memberships: HashSet<i32> = club_members::table
        .filter(
            club_members::user_id
                .eq(viewer.user_id)
                .and(club_members::club_id.eq_any(club_ids.iter().copied())),
        )
        .load::<ClubMember>(conn)
        .await?
        .into_iter()
        .map(|m| m.club_id)
        .collect();

    Ok(rows
        .into_iter()
        .map(|club| {
            let president = club
                .president_id
                .and_then(|id| people.get(&id))
                .map(UserBrief::from_user);
            let faculty_advisor = club
                .faculty_advisor_id
                .and_then(|id| people.get(&id))
                .map(UserBrief::from_user);
            ClubResponse {
                id: club.id,
                member_count: member_counts.get(&club.id).copied().unwrap_or(0),
                is_member: my_memberships.contains(&club.id),
                can_manage: policy::can_manage(viewer, &club),
                president,
                faculty_advisor,
                name: club.name,
                description: club.description,
                status: club.status,
                category: club.category,
                website: club.website,
                contact_email: club.contact_email,
                meeting_schedule: club.meeting_schedule,
                rules: club.rules,
                requires_approval: club.requires_approval,
                approved_at: club.approved_at,
                created_at: club.created_at,
            }
        })
        .collect())
}

#[derive(Deserialize)]
struct ListParams {
    category: Option<String>,
    search: Option<String>,
    my_clubs: Option<bool>,
}

async fn list(
    Extension(pool): Extension<DbPool>,
    Query(params): Query<ListParams>,
    ExtractAuth(auth): ExtractAuth,
) -> AppResult<Json<Vec<ClubResponse>>> {
    let conn = &mut pool.get().await?;

    let mut query = clubs::table
        .filter(clubs::status.eq(ClubStatus::Active))
        .order(clubs::created_at.desc())
        .into_boxed();

    if let Some(category) = params.category {
        query = query.filter(clubs::category.ilike(format!("%{category}%")));
    }
    if let Some(search) = params.search {
        let pattern = format!("%{search}%");
        query = query.filter(
            clubs::name
                .ilike(pattern.clone())
                .or(clubs::description.ilike(pattern.clone()))
                .or(clubs::category.ilike(pattern)),
        );
    }
    if params.my_clubs.unwrap_or(false) {
        query = query.filter(
            clubs::id.eq_any(
                club_members::table
                    .filter(club_members::user_id.eq(auth.user_id))
                    .select(club_members::club_id),
            ),
        );
    }

    let rows = query.load::<Club>(conn).await?;
    Ok(Json(load_clubs(conn, rows, &auth).await?))
}

async fn my_clubs(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(auth): ExtractAuth,
) -> AppResult<Json<Vec<ClubResponse>>> {
    let conn = &mut pool.get().await?;

    let rows = clubs::table
        .filter(clubs::status.eq(ClubStatus::Active))
        .filter(
            clubs::id.eq_any(
                club_members::table
                    .filter(club_members::user_id.eq(auth.user_id))
                    .select(club_members::club_id),
            ),
        )
        .order(clubs::name.asc())
        .load::<Club>(conn)
        .await?;
    Ok(Json(load_clubs(conn, rows, &auth).await?))
}

async fn info(
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
    ExtractAuth(auth): ExtractAuth,
) -> AppResult<Json<ClubResponse>> {
    let conn = &mut pool.get().await?;

    let club = clubs::table
        .find(club_id)
        .first::<Club>(conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound("club"))?;

    Ok(Json(load_clubs(conn, vec![club], &auth).await?.pop().ok_or_else(
        || anyhow::anyhow!("`load_clubs` should return one club"),
    )?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateClubRequest {
    name: String,
    description: String,
    faculty_advisor: Option<i32>,
    category: Option<String>,
    website: Option<String>,
    contact_email: Option<String>,
    meeting_schedule: Option<String>,
    rules: Option<String>,
    requires_approval: Option<bool>,
}

async fn create(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(auth): ExtractAuth,
    Json(req): Json<CreateClubRequest>,
) -> AppResult<(StatusCode, Json<ClubResponse>)> {
    #[derive(Insertable)]
    #[diesel(table_name = clubs)]
    struct NewClub {
        name: String,
        description: String,
        status: ClubStatus,
        category: String,
        website: String,
        contact_email: String,
        meeting_schedule: String,
        rules: String,
        requires_approval: bool,
        president_id: Option<i32>,
        faculty_advisor_id: Option<i32>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    }

    if req.name.trim().is_empty() {
        return Err(AppError::Validation("club name must not be empty".into()));
    }

    let conn = &mut pool.get().await?;

    if let Some(advisor_id) = req.faculty_advisor {
        let advisor = users::table
            .find(advisor_id)
            .first::<User>(conn)
            .await
            .optional()?
            .ok_or(AppError::Validation(
                "faculty advisor does not reference a known user".into(),
            ))?;
        if advisor.role != PlatformRole::Faculty {
            return Err(AppError::Validation(
                "faculty advisor must hold the faculty role".into(),
            ));
        }
    }

    let rules = req.rules.unwrap_or_default();
    let requires_approval = req
        .requires_approval
        .unwrap_or_else(|| policy::rules_imply_approval(&rules));
    let now = Utc::now();
    let creator = auth.user_id;

    let new_club = NewClub {
        name: req.name,
        description: req.description,
        status: ClubStatus::Pending,
        category: req.category.unwrap_or_default(),
        website: req.website.unwrap_or_default(),
        contact_email: req.contact_email.unwrap_or_default(),
        meeting_schedule: req.meeting_schedule.unwrap_or_default(),
        rules,
        requires_approval,
        president_id: Some(creator),
        faculty_advisor_id: req.faculty_advisor,
        created_at: now,
        updated_at: now,
    };

    let club = conn
        .transaction::<_, AppError, _>(|conn| {
            async move {
                let club: Club = diesel::insert_into(clubs::table)
                    .values(new_club)
                    .get_result(conn)
                    .await?;

                diesel::insert_into(club_members::table)
                    .values(NewClubMember {
                        club_id: club.id,
                        user_id: creator,
                        joined_at: now,
                    })
                    .execute(conn)
                    .await?;

                diesel::insert_into(club_roles::table)
                    .values(NewClubRole {
                        club_id: club.id,
                        user_id: creator,
                        role: ClubRoleKind::President,
                        assigned_by: Some(creator),
                        assigned_at: now,
                    })
                    .execute(conn)
                    .await?;

                notify::enqueue(conn, notify::advisor_assigned(&club).into_iter().collect())
                    .await?;

                Ok(club)
            }
            .scope_boxed()
        })
        .await?;

    notify::dispatch_pending(conn).await;

    let response = load_clubs(conn, vec![club], &auth)
        .await?
        .pop()
        .ok_or_else(|| anyhow::anyhow!("`load_clubs` should return one club"))?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateClubRequest {
    description: Option<String>,
    category: Option<String>,
    website: Option<String>,
    contact_email: Option<String>,
    meeting_schedule: Option<String>,
    rules: Option<String>,
    requires_approval: Option<bool>,
}

async fn update_club(
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
    ExtractAuth(auth): ExtractAuth,
    Json(req): Json<UpdateClubRequest>,
) -> AppResult<Json<ClubResponse>> {
    // Name, status and president are identity fields; they never change here.
    #[derive(AsChangeset)]
    #[diesel(table_name = clubs)]
    struct ClubChanges {
        description: Option<String>,
        category: Option<String>,
        website: Option<String>,
        contact_email: Option<String>,
        meeting_schedule: Option<String>,
        rules: Option<String>,
        requires_approval: Option<bool>,
        updated_at: DateTime<Utc>,
    }

    let conn = &mut pool.get().await?;

    let club = clubs::table
        .find(club_id)
        .first::<Club>(conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound("club"))?;

    policy::require_manage(&auth, &club)?;

    let updated = diesel::update(clubs::table.find(club.id))
        .set(ClubChanges {
            description: req.description,
            category: req.category,
            website: req.website,
            contact_email: req.contact_email,
            meeting_schedule: req.meeting_schedule,
            rules: req.rules,
            requires_approval: req.requires_approval,
            updated_at: Utc::now(),
        })
        .get_result::<Club>(conn)
        .await?;

    Ok(Json(load_clubs(conn, vec![updated], &auth).await?.pop().ok_or_else(
        || anyhow::anyhow!("`load_clubs` should return one club"),
    )?))
}

#[derive(Serialize)]
struct DeleteResponse {
    status: &'static str,
}

async fn delete_club(
    Extension(pool): Extension<DbPool>,
    Path(club_id): Path<i32>,
    ExtractAuth(auth): ExtractAuth,
) -> AppResult<Json<DeleteResponse>> {
    let conn = &mut pool.get().await?;

    let club = clubs::table
        .find(club_id)
        .first::<Club>(conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound("club"))?;

    if !policy::can_delete(&auth, &club) {
        return Err(AppError::Permission(
            "you do not have permission to delete this club".into(),
        ));
    }

    // Notifications are owned by their recipients and survive the club.
    conn.transaction::<_, AppError, _>(|conn| {
        async move {
            diesel::delete(club_roles::table.filter(club_roles::club_id.eq(club_id)))
                .execute(conn)
                .await?;
            diesel::delete(club_members::table.filter(club_members::club_id.eq(club_id)))
                .execute(conn)
                .await?;
            diesel::delete(
                club_membership_requests::table
                    .filter(club_membership_requests::club_id.eq(club_id)),
            )
            .execute(conn)
            .await?;
            diesel::delete(clubs::table.find(club_id)).execute(conn).await?;
            Ok(())
        }
        .scope_boxed()
    })
    .await?;

    Ok(Json(DeleteResponse { status: "deleted" }))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/my-clubs", get(my_clubs))
        .route("/:club_id", get(info).put(update_club).delete(delete_club))
}
