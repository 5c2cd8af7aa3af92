//! Dispatch read models over the triple store.
//!
//! These answer the questions a dispatcher asks on each cycle: which orders
//! still need a courier, which tasks have dwelt long enough to advance, and
//! which couriers are free.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use freshgraph_core::dispatch::{
    courier_is_available, CourierStatus, OrderStatus, TaskStatus, ASSIGNED_TO, COURIER_STATUS,
    ORDER_STATUS, TASK_OF_ORDER, TASK_STARTED_AT, TASK_STATUS,
};
use freshgraph_core::TripleFilter;
use freshgraph_graph::TripleStore;

use crate::error::Result;

/// A delivery task whose current phase has run its dwell.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReadyTask {
    pub task_id: String,
    pub order_id: Option<String>,
    pub status: TaskStatus,
    pub next_status: TaskStatus,
    pub phase_started_at: DateTime<Utc>,
}

pub struct DispatchBoard {
    store: Arc<dyn TripleStore>,
}

impl DispatchBoard {
    pub fn new(store: Arc<dyn TripleStore>) -> Self {
        Self { store }
    }

    /// `CREATED` orders that no delivery task points at yet.
    pub async fn orders_awaiting_courier(&self) -> Result<Vec<String>> {
        let created = self
            .store
            .query(&TripleFilter {
                predicate: Some(ORDER_STATUS.to_string()),
                object_value: Some(OrderStatus::Created.as_str().to_string()),
                ..Default::default()
            })
            .await?;

        let mut awaiting = Vec::new();
        for triple in created {
            let tasks = self
                .store
                .find_by_object(TASK_OF_ORDER, &triple.subject_id)
                .await?;
            if tasks.is_empty() {
                awaiting.push(triple.subject_id);
            }
        }
        Ok(awaiting)
    }

    /// Tasks in a non-terminal phase whose dwell has elapsed at `now`.
    ///
    /// The phase start is `task_started_at` when present and parseable,
    /// otherwise the time the status was last written.
    pub async fn tasks_ready_to_advance(
        &self,
        now: DateTime<Utc>,
        dwell: Duration,
    ) -> Result<Vec<ReadyTask>> {
        let statuses = self
            .store
            .query(&TripleFilter {
                predicate: Some(TASK_STATUS.to_string()),
                ..Default::default()
            })
            .await?;

        let mut ready = Vec::new();
        for triple in statuses {
            let Ok(status) = triple.object_value.parse::<TaskStatus>() else {
                tracing::debug!(task = %triple.subject_id, value = %triple.object_value, "Skipping unknown task status");
                continue;
            };
            let Some(next_status) = status.next() else {
                continue;
            };

            let phase_started_at = self
                .store
                .get(&triple.subject_id, TASK_STARTED_AT)
                .await?
                .and_then(|t| DateTime::parse_from_rfc3339(&t.object_value).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(triple.updated_at);

            if status.is_ready_to_advance(phase_started_at, now, dwell) {
                let order_id = self
                    .store
                    .get(&triple.subject_id, TASK_OF_ORDER)
                    .await?
                    .map(|t| t.object_value);
                ready.push(ReadyTask {
                    task_id: triple.subject_id,
                    order_id,
                    status,
                    next_status,
                    phase_started_at,
                });
            }
        }
        Ok(ready)
    }

    /// Couriers marked `AVAILABLE` with every assigned task `COMPLETED`.
    pub async fn couriers_available(&self) -> Result<Vec<String>> {
        let couriers = self
            .store
            .query(&TripleFilter {
                predicate: Some(COURIER_STATUS.to_string()),
                ..Default::default()
            })
            .await?;

        let mut available = Vec::new();
        for triple in couriers {
            let Ok(status) = triple.object_value.parse::<CourierStatus>() else {
                continue;
            };
            if status != CourierStatus::Available {
                continue;
            }

            let mut task_statuses = Vec::new();
            for assignment in self.store.find_by_object(ASSIGNED_TO, &triple.subject_id).await? {
                let status = self
                    .store
                    .get(&assignment.subject_id, TASK_STATUS)
                    .await?
                    .and_then(|t| t.object_value.parse::<TaskStatus>().ok());
                // A task with no readable status still holds the courier.
                task_statuses.push(status.unwrap_or(TaskStatus::Picking));
            }

            if courier_is_available(status, &task_statuses) {
                available.push(triple.subject_id);
            }
        }
        Ok(available)
    }
}
