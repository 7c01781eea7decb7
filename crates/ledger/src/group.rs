//! Group state as seen by the timeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MemberId, util::lenient_instant};

/// Current state of a group.
///
/// Only the latest close and reopen are tracked here: `closed_at` survives a
/// reopen, so a reopened group yields both a `group_closed` and a
/// `group_reopened` event. A soft-deleted group keeps all of its records and
/// can be restored by its owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupState {
    pub id: String,
    pub name: String,
    pub owner_id: MemberId,
    /// Ordered roster; the order drives balance listing and transfer
    /// tie-breaking.
    #[serde(default)]
    pub member_ids: Vec<MemberId>,
    #[serde(default, alias = "isClosed")]
    pub closed: bool,
    #[serde(default, deserialize_with = "lenient_instant")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "closedByUserId")]
    pub closed_by: Option<MemberId>,
    #[serde(default, deserialize_with = "lenient_instant")]
    pub reopened_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "reopenedByUserId")]
    pub reopened_by: Option<MemberId>,
    #[serde(default, deserialize_with = "lenient_instant")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "isDeleted")]
    pub deleted: bool,
    #[serde(default, deserialize_with = "lenient_instant")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "deletedByUserId")]
    pub deleted_by: Option<MemberId>,
}

impl GroupState {
    pub fn new(id: String, name: String, owner_id: MemberId) -> Self {
        Self {
            id,
            name,
            member_ids: vec![owner_id.clone()],
            owner_id,
            closed: false,
            closed_at: None,
            closed_by: None,
            reopened_at: None,
            reopened_by: None,
            created_at: None,
            deleted: false,
            deleted_at: None,
            deleted_by: None,
        }
    }

    pub fn is_member(&self, member_id: &str) -> bool {
        self.member_ids.iter().any(|m| m == member_id)
    }

    pub fn is_owner(&self, member_id: &str) -> bool {
        self.owner_id == member_id
    }
}

/// One persisted rename of a group, taken from the audit trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRecord {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_instant")]
    pub at: Option<DateTime<Utc>>,
    #[serde(default, alias = "actorUserId")]
    pub actor_id: Option<MemberId>,
    pub before: String,
    pub after: String,
}
