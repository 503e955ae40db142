//! Token status and its transition table.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a pickup token.
///
/// ```text
/// pending --> preparing --> served      (terminal)
///    |            |
///    +------------+-------> cancelled   (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "pickup.token_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    /// Issued, not yet picked up by the shop.
    #[default]
    Pending,
    /// The shop is working on the order.
    Preparing,
    /// Handed over to the customer.
    Served,
    /// Withdrawn before being served.
    Cancelled,
}

impl TokenStatus {
    /// Statuses that still count towards a shop's backlog.
    pub const NON_TERMINAL: [Self; 2] = [Self::Pending, Self::Preparing];

    /// Returns `true` for `served` and `cancelled`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Served | Self::Cancelled)
    }

    /// Whether a single edge `self -> next` exists in the state machine.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Preparing)
                | (Self::Preparing, Self::Served)
                | (Self::Pending | Self::Preparing, Self::Cancelled)
        )
    }

    /// Whether `target` can be reached from `self` by following one or more
    /// edges forward.
    #[must_use]
    pub const fn can_advance_to(self, target: Self) -> bool {
        if self.can_transition_to(target) {
            return true;
        }
        // The only two-edge path is pending -> preparing -> served.
        matches!((self, target), (Self::Pending, Self::Served))
    }

    /// Database/wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::Served => "served",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TokenStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "preparing" => Ok(Self::Preparing),
            "served" => Ok(Self::Served),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid token status: {s}")),
        }
    }
}
