use crate::schema::*;
use chrono::{DateTime, Utc};
use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::{AsExpression, FromSqlRow};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Platform-wide role carried by the user-identity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow, Serialize, Deserialize)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum PlatformRole {
    Student,
    Faculty,
    Admin,
    ClubAdmin,
}

impl PlatformRole {
    pub fn as_str(self) -> &'static str {
        match self {
            PlatformRole::Student => "student",
            PlatformRole::Faculty => "faculty",
            PlatformRole::Admin => "admin",
            PlatformRole::ClubAdmin => "club_admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(PlatformRole::Student),
            "faculty" => Some(PlatformRole::Faculty),
            "admin" => Some(PlatformRole::Admin),
            "club_admin" => Some(PlatformRole::ClubAdmin),
            _ => None,
        }
    }
}

impl ToSql<Text, Pg> for PlatformRole {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for PlatformRole {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        let s = std::str::from_utf8(value.as_bytes())?;
        Self::parse(s).ok_or_else(|| format!("unrecognized platform role `{s}`").into())
    }
}

/// Club lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow, Serialize, Deserialize)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum ClubStatus {
    Pending,
    Active,
    Suspended,
    Inactive,
}

impl ClubStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ClubStatus::Pending => "pending",
            ClubStatus::Active => "active",
            ClubStatus::Suspended => "suspended",
            ClubStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ClubStatus::Pending),
            "active" => Some(ClubStatus::Active),
            "suspended" => Some(ClubStatus::Suspended),
            "inactive" => Some(ClubStatus::Inactive),
            _ => None,
        }
    }
}

impl ToSql<Text, Pg> for ClubStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for ClubStatus {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        let s = std::str::from_utf8(value.as_bytes())?;
        Self::parse(s).ok_or_else(|| format!("unrecognized club status `{s}`").into())
    }
}

/// Resolution state of a membership request. Terminal once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow, Serialize, Deserialize)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

impl ToSql<Text, Pg> for RequestStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for RequestStatus {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        let s = std::str::from_utf8(value.as_bytes())?;
        Self::parse(s).ok_or_else(|| format!("unrecognized request status `{s}`").into())
    }
}

/// Per-club role label. A plain fact, not a capability hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow, Serialize, Deserialize)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum ClubRoleKind {
    President,
    VicePresident,
    Secretary,
    Treasurer,
    Member,
}

impl ClubRoleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ClubRoleKind::President => "president",
            ClubRoleKind::VicePresident => "vice_president",
            ClubRoleKind::Secretary => "secretary",
            ClubRoleKind::Treasurer => "treasurer",
            ClubRoleKind::Member => "member",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "president" => Some(ClubRoleKind::President),
            "vice_president" => Some(ClubRoleKind::VicePresident),
            "secretary" => Some(ClubRoleKind::Secretary),
            "treasurer" => Some(ClubRoleKind::Treasurer),
            "member" => Some(ClubRoleKind::Member),
            _ => None,
        }
    }
}

impl ToSql<Text, Pg> for ClubRoleKind {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for ClubRoleKind {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        let s = std::str::from_utf8(value.as_bytes())?;
        Self::parse(s).ok_or_else(|| format!("unrecognized club role `{s}`").into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow, Serialize, Deserialize)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Event,
    Post,
    Club,
    Message,
    System,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Event => "event",
            NotificationKind::Post => "post",
            NotificationKind::Club => "club",
            NotificationKind::Message => "message",
            NotificationKind::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "event" => Some(NotificationKind::Event),
            "post" => Some(NotificationKind::Post),
            "club" => Some(NotificationKind::Club),
            "message" => Some(NotificationKind::Message),
            "system" => Some(NotificationKind::System),
            _ => None,
        }
    }
}

impl ToSql<Text, Pg> for NotificationKind {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for NotificationKind {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        let s = std::str::from_utf8(value.as_bytes())?;
        Self::parse(s).ok_or_else(|| format!("unrecognized notification kind `{s}`").into())
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub display_name: String,
    pub role: PlatformRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
pub struct Club {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub status: ClubStatus,
    pub category: String,
    pub website: String,
    pub contact_email: String,
    pub meeting_schedule: String,
    pub rules: String,
    pub requires_approval: bool,
    pub president_id: Option<i32>,
    pub faculty_advisor_id: Option<i32>,
    pub approved_by: Option<i32>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(Club))]
#[diesel(belongs_to(User))]
pub struct ClubMember {
    pub id: i32,
    pub club_id: i32,
    pub user_id: i32,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(Club))]
#[diesel(belongs_to(User))]
pub struct ClubMembershipRequest {
    pub id: i32,
    pub club_id: i32,
    pub user_id: i32,
    pub message: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<i32>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(Club))]
#[diesel(belongs_to(User))]
pub struct ClubRole {
    pub id: i32,
    pub club_id: i32,
    pub user_id: i32,
    pub role: ClubRoleKind,
    pub assigned_by: Option<i32>,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
pub struct Notification {
    pub id: i32,
    pub user_id: i32,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related_id: Option<i32>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = notification_outbox)]
pub struct OutboxEntry {
    pub id: i32,
    pub user_id: i32,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

#[derive(Insertable)]
#[diesel(table_name = club_members)]
pub struct NewClubMember {
    pub club_id: i32,
    pub user_id: i32,
    pub joined_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = club_roles)]
pub struct NewClubRole {
    pub club_id: i32,
    pub user_id: i32,
    pub role: ClubRoleKind,
    pub assigned_by: Option<i32>,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = club_membership_requests)]
pub struct NewMembershipRequest {
    pub club_id: i32,
    pub user_id: i32,
    pub message: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub user_id: i32,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related_id: Option<i32>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = notification_outbox)]
pub struct NewOutboxEntry {
    pub user_id: i32,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing_rejects_unknown_values() {
        assert_eq!(ClubStatus::parse("active"), Some(ClubStatus::Active));
        assert_eq!(ClubStatus::parse("archived"), None);
        assert_eq!(RequestStatus::parse("pending"), Some(RequestStatus::Pending));
        assert_eq!(RequestStatus::parse(""), None);
        assert_eq!(ClubRoleKind::parse("vice_president"), Some(ClubRoleKind::VicePresident));
        assert_eq!(ClubRoleKind::parse("janitor"), None);
    }
}
