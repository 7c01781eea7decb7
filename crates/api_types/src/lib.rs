use std::fmt;

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{MapAccess, Visitor},
    ser::SerializeMap,
};
use serde_json::Value;

/// Response body for every create endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct Created {
    pub id: String,
}

pub mod group {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GroupNew {
        pub name: String,
        /// Defaults to the acting member.
        pub owner_id: Option<String>,
        #[serde(default)]
        pub member_ids: Vec<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupRename {
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MemberNew {
        pub member_id: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Group {
        pub id: String,
        pub name: String,
        pub owner_id: String,
        pub member_ids: Vec<String>,
        pub is_closed: bool,
        pub is_deleted: bool,
        /// RFC 3339 with milliseconds.
        pub created_at: Option<String>,
    }

    /// Query string of the group reads.
    ///
    /// `includeDeleted=true` (any case) lists soft-deleted records and lets
    /// the owner read a deleted group.
    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListQuery {
        pub include_deleted: Option<String>,
    }

    impl ListQuery {
        pub fn include_deleted(&self) -> bool {
            self.include_deleted
                .as_deref()
                .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
        }
    }

    /// Role of a member inside a group.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum MemberRole {
        Owner,
        Member,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberView {
        pub id: String,
        pub role: MemberRole,
    }

    /// Counts and sums over the active records of a group.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct FinancialSummary {
        pub expense_count: usize,
        pub settlement_count: usize,
        pub total_expenses: f64,
        pub total_settled: f64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Financials {
        pub balances: crate::balances::Balances,
        pub summary: FinancialSummary,
        pub transfers: Vec<crate::balances::TransferView>,
    }

    /// Response of `GET /groups/{groupId}`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupDetails {
        pub group: Group,
        pub members: Vec<MemberView>,
        pub financials: Financials,
    }
}

pub mod expense {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SplitView {
        pub user_id: String,
        pub share: f64,
    }

    /// Request body for a new expense.
    ///
    /// `paidByUserId` defaults to the acting member and a missing `splits`
    /// list divides the amount evenly over the group.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ExpenseNew {
        pub title: String,
        pub amount: f64,
        pub paid_by_user_id: Option<String>,
        pub splits: Option<Vec<SplitView>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ExpenseView {
        pub id: String,
        pub title: String,
        pub amount: f64,
        pub paid_by_user_id: String,
        pub splits: Vec<SplitView>,
        pub is_deleted: bool,
        pub created_by_user_id: Option<String>,
        pub created_at: Option<String>,
        pub deleted_by_user_id: Option<String>,
        pub deleted_at: Option<String>,
    }
}

pub mod settlement {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SettlementNew {
        pub from_user_id: String,
        pub to_user_id: String,
        pub amount: f64,
        pub note: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SettlementView {
        pub id: String,
        pub from_user_id: String,
        pub to_user_id: String,
        pub amount: f64,
        pub note: String,
        pub is_deleted: bool,
        pub created_by_user_id: Option<String>,
        pub created_at: Option<String>,
        pub deleted_by_user_id: Option<String>,
        pub deleted_at: Option<String>,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum SettlementStatus {
        Active,
        Deleted,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct HistoryItem {
        pub status: SettlementStatus,
        /// Deletion instant of a deleted settlement, creation instant
        /// otherwise.
        pub event_at: Option<String>,
        #[serde(flatten)]
        pub settlement: SettlementView,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SettlementHistory {
        pub group_id: String,
        pub count: usize,
        pub items: Vec<HistoryItem>,
    }

    /// Optional body of `POST /groups/{groupId}/settle-all`.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct SettleAllNew {
        pub note: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SettleAllResponse {
        pub group_id: String,
        pub created_count: usize,
        pub settlements: Vec<SettlementView>,
        pub transfers_used: Vec<crate::balances::TransferView>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub message: Option<String>,
    }
}

pub mod balances {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TransferView {
        pub from_user_id: String,
        pub to_user_id: String,
        pub amount: f64,
    }

    /// Member balances in roster order, written as a JSON object whose keys
    /// keep that order.
    #[derive(Debug, Default, PartialEq)]
    pub struct Balances(pub Vec<(String, f64)>);

    impl Balances {
        pub fn get(&self, member_id: &str) -> Option<f64> {
            self.0
                .iter()
                .find(|(member, _)| member == member_id)
                .map(|(_, amount)| *amount)
        }
    }

    impl FromIterator<(String, f64)> for Balances {
        fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
            Self(iter.into_iter().collect())
        }
    }

    impl Serialize for Balances {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(self.0.len()))?;
            for (member, amount) in &self.0 {
                map.serialize_entry(member, amount)?;
            }
            map.end()
        }
    }

    struct BalancesVisitor;

    impl<'de> Visitor<'de> for BalancesVisitor {
        type Value = Balances;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of member ids to amounts")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Balances, A::Error> {
            let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some(entry) = access.next_entry()? {
                entries.push(entry);
            }
            Ok(Balances(entries))
        }
    }

    impl<'de> Deserialize<'de> for Balances {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_map(BalancesVisitor)
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalancesResponse {
        pub balances: Balances,
        pub transfers: Vec<TransferView>,
    }
}

pub mod timeline {
    use super::*;

    /// Query string of the timeline endpoint.
    ///
    /// `limit` is kept as a string so that a malformed value can be reported
    /// with the same error body as the other validation failures.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TimelineQuery {
        #[serde(rename = "type")]
        pub entity_type: Option<String>,
        pub action: Option<String>,
        pub limit: Option<String>,
        pub before: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EntityView {
        #[serde(rename = "type")]
        pub entity_type: String,
        pub id: String,
        pub payload: Value,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct EventView {
        pub id: String,
        /// `<entity>_<action>`, e.g. `expense_created`.
        pub kind: String,
        /// RFC 3339 with milliseconds.
        pub at: String,
        pub actor_user_id: Option<String>,
        pub entity: EntityView,
        /// Same value as `entity.payload`.
        pub payload: Value,
        pub title: String,
        pub subtitle: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TimelineResponse {
        pub events: Vec<EventView>,
        /// Pass back as `before` to fetch the next page.
        pub next_before: Option<String>,
    }
}

pub mod error {
    use super::*;

    /// Body of every non-2xx response.
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ErrorBody {
        pub code: String,
        pub message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub max_allowed: Option<f64>,
    }
}
