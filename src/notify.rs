//! Notification fan-out through a transactional outbox.
//!
//! Mutating operations build [`Intent`] values and append them to the outbox
//! inside their own transaction; [`dispatch_pending`] later materializes them
//! into notification rows. Dispatch failures are logged and retried on the
//! next pass, never surfaced to the request that caused them.

use crate::{
    error::AppResult,
    models::{Club, NewNotification, NewOutboxEntry, NotificationKind, OutboxEntry},
    schema::{notification_outbox, notifications},
};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{
    scoped_futures::ScopedFutureExt, AsyncConnection, AsyncPgConnection, RunQueryDsl,
};

const DISPATCH_BATCH: i64 = 100;

/// One notification to one recipient, not yet written anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub user_id: i32,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related_id: Option<i32>,
}

pub fn advisor_assigned(club: &Club) -> Option<Intent> {
    club.faculty_advisor_id.map(|advisor| Intent {
        user_id: advisor,
        kind: NotificationKind::Club,
        title: "New Club Created".to_string(),
        message: format!("You have been assigned as faculty advisor for {}", club.name),
        related_id: Some(club.id),
    })
}

pub fn club_approved(club: &Club) -> Option<Intent> {
    club.president_id.map(|president| Intent {
        user_id: president,
        kind: NotificationKind::Club,
        title: "Club Approved".to_string(),
        message: format!("Your club {} has been approved and is now active", club.name),
        related_id: Some(club.id),
    })
}

pub fn club_rejected(club: &Club, reason: &str) -> Option<Intent> {
    club.president_id.map(|president| Intent {
        user_id: president,
        kind: NotificationKind::Club,
        title: "Club Rejected".to_string(),
        message: format!("Your club {} has been rejected. Reason: {}", club.name, reason),
        related_id: Some(club.id),
    })
}

/// One intent per manager on record: president and faculty advisor, each if
/// present.
pub fn membership_requested(club: &Club, requester: &str) -> Vec<Intent> {
    [club.president_id, club.faculty_advisor_id]
        .into_iter()
        .flatten()
        .map(|manager| Intent {
            user_id: manager,
            kind: NotificationKind::Club,
            title: "New Membership Request".to_string(),
            message: format!("{} wants to join {}", requester, club.name),
            related_id: Some(club.id),
        })
        .collect()
}

pub fn member_joined(club: &Club, user_id: i32) -> Intent {
    Intent {
        user_id,
        kind: NotificationKind::Club,
        title: "Joined Club".to_string(),
        message: format!("You have successfully joined {}", club.name),
        related_id: Some(club.id),
    }
}

pub fn request_approved(club: &Club, user_id: i32) -> Intent {
    Intent {
        user_id,
        kind: NotificationKind::Club,
        title: "Membership Approved".to_string(),
        message: format!(
            "Your membership request for {} has been approved",
            club.name
        ),
        related_id: Some(club.id),
    }
}

pub fn request_rejected(club: &Club, user_id: i32) -> Intent {
    Intent {
        user_id,
        kind: NotificationKind::Club,
        title: "Membership Rejected".to_string(),
        message: format!(
            "Your membership request for {} has been rejected",
            club.name
        ),
        related_id: Some(club.id),
    }
}

/// Append intents to the outbox. Call inside the operation's transaction so
/// the intents commit or roll back with the primary mutation.
pub async fn enqueue(conn: &mut AsyncPgConnection, intents: Vec<Intent>) -> AppResult<()> {
    if intents.is_empty() {
        return Ok(());
    }
    let now = Utc::now();
    let rows: Vec<NewOutboxEntry> = intents
        .into_iter()
        .map(|intent| NewOutboxEntry {
            user_id: intent.user_id,
            kind: intent.kind,
            title: intent.title,
            message: intent.message,
            related_id: intent.related_id,
            created_at: now,
        })
        .collect();
    diesel::insert_into(notification_outbox::table)
        .values(rows)
        .execute(conn)
        .await?;
    Ok(())
}

/// Materialize undelivered outbox rows into notification records.
///
/// Best-effort: each row is delivered in its own small transaction, failures
/// stay in the outbox for the next pass. Returns how many were delivered.
pub async fn dispatch_pending(conn: &mut AsyncPgConnection) -> usize {
    let pending: Vec<OutboxEntry> = match notification_outbox::table
        .filter(notification_outbox::dispatched_at.is_null())
        .order(notification_outbox::created_at.asc())
        .limit(DISPATCH_BATCH)
        .load(conn)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read notification outbox");
            return 0;
        }
    };

    let mut delivered = 0;
    for entry in pending {
        let entry_id = entry.id;
        let result = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                async move {
                    diesel::insert_into(notifications::table)
                        .values(NewNotification {
                            user_id: entry.user_id,
                            kind: entry.kind,
                            title: entry.title,
                            message: entry.message,
                            related_id: entry.related_id,
                            is_read: false,
                            created_at: entry.created_at,
                        })
                        .execute(conn)
                        .await?;
                    diesel::update(notification_outbox::table.find(entry_id))
                        .set(notification_outbox::dispatched_at.eq(Some(Utc::now())))
                        .execute(conn)
                        .await?;
                    Ok(())
                }
                .scope_boxed()
            })
            .await;

        match result {
            Ok(()) => delivered += 1,
            Err(e) => {
                tracing::warn!(outbox_id = entry_id, error = %e, "notification dispatch failed, leaving for retry");
            }
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClubStatus;

    fn club_with(president: Option<i32>, advisor: Option<i32>) -> Club {
        Club {
            id: 42,
            name: "Debate Society".to_string(),
            description: String::new(),
            status: ClubStatus::Active,
            category: String::new(),
            website: String::new(),
            contact_email: String::new(),
            meeting_schedule: String::new(),
            rules: String::new(),
            requires_approval: true,
            president_id: president,
            faculty_advisor_id: advisor,
            approved_by: None,
            approved_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn request_fan_out_targets_each_present_manager() {
        let both = membership_requested(&club_with(Some(1), Some(2)), "Ada");
        assert_eq!(
            both.iter().map(|i| i.user_id).collect::<Vec<_>>(),
            vec![1, 2]
        );

        let president_only = membership_requested(&club_with(Some(1), None), "Ada");
        assert_eq!(president_only.len(), 1);
        assert_eq!(president_only[0].user_id, 1);

        assert!(membership_requested(&club_with(None, None), "Ada").is_empty());
    }

    #[test]
    fn request_fan_out_names_the_requester_and_club() {
        let intents = membership_requested(&club_with(Some(1), None), "Ada");
        assert_eq!(intents[0].message, "Ada wants to join Debate Society");
        assert_eq!(intents[0].related_id, Some(42));
        assert_eq!(intents[0].kind, NotificationKind::Club);
    }

    #[test]
    fn lifecycle_intents_go_to_the_president_when_present() {
        let club = club_with(Some(7), None);
        assert_eq!(club_approved(&club).unwrap().user_id, 7);
        assert!(club_approved(&club_with(None, None)).is_none());

        let rejected = club_rejected(&club, "incomplete charter").unwrap();
        assert!(rejected.message.contains("Reason: incomplete charter"));
    }

    #[test]
    fn join_and_resolution_intents_target_the_member() {
        let club = club_with(Some(1), Some(2));
        assert_eq!(member_joined(&club, 9).user_id, 9);
        assert_eq!(request_approved(&club, 9).user_id, 9);
        assert_eq!(request_rejected(&club, 9).user_id, 9);
        assert_eq!(member_joined(&club, 9).related_id, Some(42));
    }
}
