//! The module contains the errors the ledger can throw.
//!
//! The errors fall in three families:
//!
//! - validation errors, caused by malformed caller input ([`InvalidCursor`],
//!   [`InvalidFilter`], [`InvalidAmount`], [`InvalidSplit`], [`InvalidName`],
//!   [`NotMember`]);
//! - conflicts, business rules refusing a write ([`NothingOwed`],
//!   [`ExceedsOwed`], [`GroupClosed`], [`GroupDeleted`]);
//! - permission failures, an acting member outside the group or without the
//!   right role ([`Forbidden`]);
//! - lookup and storage failures of the collaborator ([`KeyNotFound`],
//!   [`Storage`]).
//!
//! Empty results are never errors: zero balances, zero transfers and an empty
//! timeline are valid answers.
//!
//!  [`InvalidCursor`]: LedgerError::InvalidCursor
//!  [`InvalidFilter`]: LedgerError::InvalidFilter
//!  [`InvalidAmount`]: LedgerError::InvalidAmount
//!  [`InvalidSplit`]: LedgerError::InvalidSplit
//!  [`InvalidName`]: LedgerError::InvalidName
//!  [`NotMember`]: LedgerError::NotMember
//!  [`NothingOwed`]: LedgerError::NothingOwed
//!  [`ExceedsOwed`]: LedgerError::ExceedsOwed
//!  [`GroupClosed`]: LedgerError::GroupClosed
//!  [`GroupDeleted`]: LedgerError::GroupDeleted
//!  [`Forbidden`]: LedgerError::Forbidden
//!  [`KeyNotFound`]: LedgerError::KeyNotFound
//!  [`Storage`]: LedgerError::Storage
use thiserror::Error;

use crate::{MemberId, Money};

/// Ledger custom errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid split: {0}")]
    InvalidSplit(String),
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error("\"{0}\" is not a member of the group")]
    NotMember(MemberId),
    #[error("Nothing owed between these two members right now")]
    NothingOwed { from: MemberId, to: MemberId },
    #[error("Settlement of {requested} exceeds the owed amount of {max_allowed}")]
    ExceedsOwed { requested: Money, max_allowed: Money },
    #[error("Group is closed: {0}")]
    GroupClosed(String),
    #[error("Group is deleted: {0}")]
    GroupDeleted(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Returns `true` for errors caused by malformed caller input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidCursor(_)
                | Self::InvalidFilter(_)
                | Self::InvalidAmount(_)
                | Self::InvalidSplit(_)
                | Self::InvalidName(_)
                | Self::NotMember(_)
        )
    }

    /// Returns `true` for business-rule rejections.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::NothingOwed { .. }
                | Self::ExceedsOwed { .. }
                | Self::GroupClosed(_)
                | Self::GroupDeleted(_)
        )
    }
}
