//! Authorization and membership-workflow decision rules.
//!
//! Everything here is a pure function over already-loaded rows; handlers do
//! the loading and the writing. Predicates are recomputed on every call, so a
//! role change takes effect on the next check.

use crate::{
    auth::AuthContext,
    error::{AppError, AppResult},
    models::{Club, ClubMembershipRequest, PlatformRole, RequestStatus},
};

/// A manager of a club: its president, its faculty advisor, or a platform
/// admin/faculty account.
pub fn can_manage(ctx: &AuthContext, club: &Club) -> bool {
    club.president_id == Some(ctx.user_id)
        || club.faculty_advisor_id == Some(ctx.user_id)
        || matches!(ctx.role, PlatformRole::Admin | PlatformRole::Faculty)
}

pub fn require_manage(ctx: &AuthContext, club: &Club) -> AppResult<()> {
    if can_manage(ctx, club) {
        Ok(())
    } else {
        Err(AppError::Permission(
            "you do not have permission to manage this club".into(),
        ))
    }
}

/// Deleting a club is narrower than managing it: president or platform admin.
pub fn can_delete(ctx: &AuthContext, club: &Club) -> bool {
    club.president_id == Some(ctx.user_id) || ctx.role == PlatformRole::Admin
}

/// The pending-club review queue is visible to admins and faculty.
pub fn can_review_clubs(ctx: &AuthContext) -> bool {
    matches!(ctx.role, PlatformRole::Admin | PlatformRole::Faculty)
}

pub fn require_platform_admin(ctx: &AuthContext) -> AppResult<()> {
    if ctx.role == PlatformRole::Admin {
        Ok(())
    } else {
        Err(AppError::Permission(
            "only platform admins can approve or reject clubs".into(),
        ))
    }
}

/// Legacy convention: a club's free-text rules gate joining whenever they
/// mention "approval". Used only to default the explicit flag when a creator
/// does not set one.
pub fn rules_imply_approval(rules: &str) -> bool {
    rules.to_lowercase().contains("approval")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinPlan {
    /// Add membership and a `member` role right away.
    Direct,
    /// Park a pending request for a manager to process.
    RequestApproval,
}

pub fn decide_join(club: &Club, is_member: bool) -> AppResult<JoinPlan> {
    if is_member {
        return Err(AppError::AlreadyMember);
    }
    if club.requires_approval {
        Ok(JoinPlan::RequestApproval)
    } else {
        Ok(JoinPlan::Direct)
    }
}

pub fn check_leave(club: &Club, user_id: i32, is_member: bool) -> AppResult<()> {
    if !is_member {
        return Err(AppError::NotMember);
    }
    if club.president_id == Some(user_id) {
        return Err(AppError::PresidentCannotLeave);
    }
    Ok(())
}

/// Requests are terminal once resolved; re-processing is rejected.
pub fn ensure_pending(request: &ClubMembershipRequest) -> AppResult<()> {
    if request.status == RequestStatus::Pending {
        Ok(())
    } else {
        Err(AppError::Validation(
            "membership request has already been processed".into(),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Approve,
    Reject,
}

impl RequestAction {
    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "approve" => Ok(RequestAction::Approve),
            "reject" => Ok(RequestAction::Reject),
            other => Err(AppError::InvalidAction(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClubStatus;
    use chrono::Utc;

    fn club_with(president: Option<i32>, advisor: Option<i32>, requires_approval: bool) -> Club {
        Club {
            id: 1,
            name: "Chess Club".to_string(),
            description: String::new(),
            status: ClubStatus::Active,
            category: String::new(),
            website: String::new(),
            contact_email: String::new(),
            meeting_schedule: String::new(),
            rules: String::new(),
            requires_approval,
            president_id: president,
            faculty_advisor_id: advisor,
            approved_by: None,
            approved_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ctx(user_id: i32, role: PlatformRole) -> AuthContext {
        AuthContext {
            user_id,
            display_name: format!("user-{user_id}"),
            role,
        }
    }

    fn request_with(status: RequestStatus) -> ClubMembershipRequest {
        ClubMembershipRequest {
            id: 7,
            club_id: 1,
            user_id: 2,
            message: String::new(),
            status,
            created_at: Utc::now(),
            processed_at: None,
            processed_by: None,
        }
    }

    #[test]
    fn managers_are_president_advisor_admin_and_faculty() {
        let club = club_with(Some(1), Some(2), false);

        assert!(can_manage(&ctx(1, PlatformRole::Student), &club));
        assert!(can_manage(&ctx(2, PlatformRole::Faculty), &club));
        assert!(can_manage(&ctx(9, PlatformRole::Admin), &club));
        assert!(can_manage(&ctx(9, PlatformRole::Faculty), &club));
        assert!(!can_manage(&ctx(9, PlatformRole::Student), &club));
        assert!(!can_manage(&ctx(9, PlatformRole::ClubAdmin), &club));
    }

    #[test]
    fn deletion_is_limited_to_president_and_platform_admin() {
        let club = club_with(Some(1), Some(2), false);

        assert!(can_delete(&ctx(1, PlatformRole::Student), &club));
        assert!(can_delete(&ctx(9, PlatformRole::Admin), &club));
        assert!(!can_delete(&ctx(2, PlatformRole::Faculty), &club));
        assert!(!can_delete(&ctx(9, PlatformRole::Faculty), &club));
    }

    #[test]
    fn approval_token_matches_anywhere_in_rules() {
        assert!(rules_imply_approval("Members join by APPROVAL of the board"));
        assert!(rules_imply_approval("disapproval will be noted"));
        assert!(!rules_imply_approval(""));
        assert!(!rules_imply_approval("open to everyone"));
    }

    #[test]
    fn joining_twice_is_rejected() {
        let club = club_with(Some(1), None, false);
        assert!(matches!(
            decide_join(&club, true),
            Err(AppError::AlreadyMember)
        ));
    }

    #[test]
    fn approval_gated_clubs_never_join_directly() {
        let club = club_with(Some(1), None, true);
        assert_eq!(decide_join(&club, false).unwrap(), JoinPlan::RequestApproval);
    }

    #[test]
    fn open_clubs_join_directly() {
        let club = club_with(Some(1), None, false);
        assert_eq!(decide_join(&club, false).unwrap(), JoinPlan::Direct);
    }

    #[test]
    fn leave_requires_membership() {
        let club = club_with(Some(1), None, false);
        assert!(matches!(
            check_leave(&club, 5, false),
            Err(AppError::NotMember)
        ));
    }

    #[test]
    fn president_is_blocked_from_leaving() {
        let club = club_with(Some(1), None, false);
        assert!(matches!(
            check_leave(&club, 1, true),
            Err(AppError::PresidentCannotLeave)
        ));
        assert!(check_leave(&club, 5, true).is_ok());
    }

    #[test]
    fn resolved_requests_cannot_be_reprocessed() {
        assert!(ensure_pending(&request_with(RequestStatus::Pending)).is_ok());
        assert!(matches!(
            ensure_pending(&request_with(RequestStatus::Approved)),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            ensure_pending(&request_with(RequestStatus::Rejected)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn only_the_exact_action_strings_are_accepted() {
        assert_eq!(RequestAction::parse("approve").unwrap(), RequestAction::Approve);
        assert_eq!(RequestAction::parse("reject").unwrap(), RequestAction::Reject);
        assert!(matches!(
            RequestAction::parse("Approve"),
            Err(AppError::InvalidAction(_))
        ));
        assert!(matches!(
            RequestAction::parse("defer"),
            Err(AppError::InvalidAction(_))
        ));
    }
}
