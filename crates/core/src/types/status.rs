//! Status enums for various entities.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a quote.
///
/// Only [`QuoteStatus::Approved`] quotes are eligible for the cart; the rest
/// of the lifecycle is owned by the quoting and order services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    /// Created, awaiting admin pricing.
    #[default]
    Pending,
    /// Priced and sent to the customer.
    Sent,
    /// Accepted by the customer; can be checked out.
    Approved,
    /// Declined by the customer.
    Rejected,
    /// Paid through a payment gateway.
    Paid,
    /// Purchased from the origin merchant.
    Ordered,
    Shipped,
    Completed,
    Cancelled,
    Expired,
}

impl QuoteStatus {
    /// Whether a quote in this status may be placed in the cart.
    #[must_use]
    pub const fn is_cart_eligible(self) -> bool {
        matches!(self, Self::Approved)
    }

    /// Snake-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Paid => "paid",
            Self::Ordered => "ordered",
            Self::Shipped => "shipped",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "paid" => Ok(Self::Paid),
            "ordered" => Ok(Self::Ordered),
            "shipped" => Ok(Self::Shipped),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            _ => Err(format!("invalid quote status: {s}")),
        }
    }
}
