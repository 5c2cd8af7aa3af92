//! Dispatch lifecycle vocabulary for orders, delivery tasks, and couriers.
//!
//! Nothing here executes a transition. A transition happens when a writer
//! upserts the next-state triple; these types only say which states exist and
//! which moves between them are legal.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Predicate holding an order's status.
pub const ORDER_STATUS: &str = "order_status";
/// Predicate holding a delivery task's status.
pub const TASK_STATUS: &str = "task_status";
/// Predicate holding the time the task entered its current phase.
pub const TASK_STARTED_AT: &str = "task_started_at";
/// Predicate linking a task to its order.
pub const TASK_OF_ORDER: &str = "task_of_order";
/// Predicate linking a task to its courier.
pub const ASSIGNED_TO: &str = "assigned_to";
/// Predicate holding a courier's status.
pub const COURIER_STATUS: &str = "courier_status";

/// Reference dwell time for each task phase, in seconds.
pub const DEFAULT_DWELL_SECS: i64 = 5;

/// Error returned when a status string is not part of the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} status: {value}")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub value: String,
}

// ── Order ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Picking,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Picking => "PICKING",
            Self::OutForDelivery => "OUT_FOR_DELIVERY",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Legal moves: the linear fulfilment chain, plus cancellation while
    /// the order is still `CREATED`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Picking)
                | (Self::Picking, Self::OutForDelivery)
                | (Self::OutForDelivery, Self::Delivered)
                | (Self::Created, Self::Cancelled)
        )
    }

    /// The next state on the fulfilment chain, if any.
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            Self::Created => Some(Self::Picking),
            Self::Picking => Some(Self::OutForDelivery),
            Self::OutForDelivery => Some(Self::Delivered),
            Self::Delivered | Self::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(Self::Created),
            "PICKING" => Ok(Self::Picking),
            "OUT_FOR_DELIVERY" => Ok(Self::OutForDelivery),
            "DELIVERED" => Ok(Self::Delivered),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(UnknownStatus {
                kind: "order",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Delivery Task ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Picking,
    Delivering,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Picking => "PICKING",
            Self::Delivering => "DELIVERING",
            Self::Completed => "COMPLETED",
        }
    }

    /// Strictly sequential: each phase has exactly one successor.
    pub fn next(&self) -> Option<TaskStatus> {
        match self {
            Self::Picking => Some(Self::Delivering),
            Self::Delivering => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        self.next() == Some(next)
    }

    /// The order status implied by a task entering this phase.
    pub fn order_status(&self) -> OrderStatus {
        match self {
            Self::Picking => OrderStatus::Picking,
            Self::Delivering => OrderStatus::OutForDelivery,
            Self::Completed => OrderStatus::Delivered,
        }
    }

    /// A non-terminal phase may advance once its dwell has elapsed.
    pub fn is_ready_to_advance(
        &self,
        phase_started_at: DateTime<Utc>,
        now: DateTime<Utc>,
        dwell: Duration,
    ) -> bool {
        self.next().is_some() && now >= phase_started_at + dwell
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PICKING" => Ok(Self::Picking),
            "DELIVERING" => Ok(Self::Delivering),
            "COMPLETED" => Ok(Self::Completed),
            _ => Err(UnknownStatus {
                kind: "task",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Courier ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourierStatus {
    OffShift,
    Available,
    OnDelivery,
}

impl CourierStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OffShift => "OFF_SHIFT",
            Self::Available => "AVAILABLE",
            Self::OnDelivery => "ON_DELIVERY",
        }
    }

    /// `OFF_SHIFT ⇄ AVAILABLE ⇄ ON_DELIVERY`; no direct jump between the ends.
    pub fn can_transition_to(&self, next: CourierStatus) -> bool {
        matches!(
            (self, next),
            (Self::OffShift, Self::Available)
                | (Self::Available, Self::OffShift)
                | (Self::Available, Self::OnDelivery)
                | (Self::OnDelivery, Self::Available)
        )
    }
}

impl FromStr for CourierStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OFF_SHIFT" => Ok(Self::OffShift),
            "AVAILABLE" => Ok(Self::Available),
            "ON_DELIVERY" => Ok(Self::OnDelivery),
            _ => Err(UnknownStatus {
                kind: "courier",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for CourierStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A courier counts as available only when on duty and every task that
/// references it is `COMPLETED`.
pub fn courier_is_available<'a>(
    status: CourierStatus,
    task_statuses: impl IntoIterator<Item = &'a TaskStatus>,
) -> bool {
    status == CourierStatus::Available
        && task_statuses
            .into_iter()
            .all(|t| *t == TaskStatus::Completed)
}
