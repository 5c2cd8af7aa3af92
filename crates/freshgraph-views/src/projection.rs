//! The order-with-lines projection shared by every tier.
//!
//! An order row joins the order's own facts with its customer (`placed_by`),
//! store (`order_store`), delivery task (`task_of_order`, reverse link) and
//! line items (`line_of_order`, reverse link, each joined with its product
//! via `line_product`).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use freshgraph_core::dispatch::{ASSIGNED_TO, ORDER_STATUS, TASK_OF_ORDER, TASK_STATUS};
use freshgraph_core::{ChangeEvent, Triple};
use freshgraph_graph::TripleStore;

use crate::error::Result;
use crate::tier::TierRow;

pub const ORDER_PREFIX: &str = "order";
pub const LINE_OF_ORDER: &str = "line_of_order";
pub const PLACED_BY: &str = "placed_by";
pub const ORDER_STORE: &str = "order_store";
pub const LINE_PRODUCT: &str = "line_product";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub line_id: String,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub quantity: Option<i64>,
    pub unit_price: Option<f64>,
    pub line_amount: Option<f64>,
    pub line_sequence: Option<i64>,
    pub perishable_flag: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderRow {
    pub order_id: String,
    pub order_number: Option<String>,
    pub order_status: Option<String>,
    pub store_id: Option<String>,
    pub customer_id: Option<String>,
    pub delivery_window_start: Option<String>,
    pub delivery_window_end: Option<String>,
    pub order_total_amount: Option<f64>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
    pub store_name: Option<String>,
    pub store_zone: Option<String>,
    pub store_address: Option<String>,
    pub delivery_task_id: Option<String>,
    pub assigned_courier_id: Option<String>,
    pub delivery_task_status: Option<String>,
    pub delivery_eta: Option<String>,
    pub line_items: Vec<LineItem>,
    pub line_item_count: usize,
    pub computed_total: f64,
    pub has_perishable_items: bool,
    pub effective_updated_at: Option<DateTime<Utc>>,
}

/// A projected row plus every subject id it was computed from.
#[derive(Debug, Clone)]
pub struct Projection {
    pub row: TierRow,
    pub contributors: BTreeSet<String>,
}

/// Facts of one subject, keyed by predicate.
struct Facts(HashMap<String, Triple>);

impl Facts {
    fn value(&self, predicate: &str) -> Option<String> {
        self.0.get(predicate).map(|t| t.object_value.clone())
    }

    fn int(&self, predicate: &str) -> Option<i64> {
        self.0.get(predicate)?.object_value.trim().parse().ok()
    }

    fn float(&self, predicate: &str) -> Option<f64> {
        self.0.get(predicate)?.object_value.trim().parse().ok()
    }

    fn flag(&self, predicate: &str) -> bool {
        self.0
            .get(predicate)
            .is_some_and(|t| t.object_value.trim().eq_ignore_ascii_case("true"))
    }
}

/// Collects facts and tracks the freshest contributing `updated_at`.
#[derive(Default)]
struct Gather {
    contributors: BTreeSet<String>,
    effective_updated_at: Option<DateTime<Utc>>,
}

impl Gather {
    /// Referenced subjects count as contributors even before they have any
    /// facts, so their first write still reaches the row.
    fn absorb(&mut self, subject_id: &str, triples: Vec<Triple>) -> Facts {
        self.contributors.insert(subject_id.to_string());
        for t in &triples {
            self.bump(t.updated_at);
        }
        Facts(triples.into_iter().map(|t| (t.predicate.clone(), t)).collect())
    }

    fn bump(&mut self, at: DateTime<Utc>) {
        if self.effective_updated_at.map_or(true, |cur| at > cur) {
            self.effective_updated_at = Some(at);
        }
    }
}

/// Computes order rows from the triple store.
#[derive(Clone)]
pub struct OrderProjector {
    store: Arc<dyn TripleStore>,
}

impl OrderProjector {
    pub fn new(store: Arc<dyn TripleStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn TripleStore> {
        &self.store
    }

    /// Every order id currently present in the store.
    pub async fn order_keys(&self) -> Result<Vec<String>> {
        Ok(self.store.subjects_with_prefix(ORDER_PREFIX).await?)
    }

    /// Project one order. `None` if the order has no facts.
    pub async fn project(&self, order_id: &str) -> Result<Option<Projection>> {
        let mut gather = Gather::default();

        let order = gather.absorb(order_id, self.store.subject_triples(order_id).await?);
        if order.0.is_empty() {
            return Ok(None);
        }

        let customer_id = order.value(PLACED_BY);
        let customer = match &customer_id {
            Some(id) => gather.absorb(id, self.store.subject_triples(id).await?),
            None => Facts(HashMap::new()),
        };

        let store_id = order.value(ORDER_STORE);
        let store = match &store_id {
            Some(id) => gather.absorb(id, self.store.subject_triples(id).await?),
            None => Facts(HashMap::new()),
        };

        // First task by id if several point at the order.
        let task_links = self.store.find_by_object(TASK_OF_ORDER, order_id).await?;
        let task_id = task_links.iter().map(|t| t.subject_id.clone()).min();
        let task = match &task_id {
            Some(id) => gather.absorb(id, self.store.subject_triples(id).await?),
            None => Facts(HashMap::new()),
        };

        let mut line_items = Vec::new();
        let line_links = self.store.find_by_object(LINE_OF_ORDER, order_id).await?;
        for link in line_links {
            let line = gather.absorb(
                &link.subject_id,
                self.store.subject_triples(&link.subject_id).await?,
            );
            let product_id = line.value(LINE_PRODUCT);
            let product = match &product_id {
                Some(id) => gather.absorb(id, self.store.subject_triples(id).await?),
                None => Facts(HashMap::new()),
            };

            let quantity = line.int("quantity");
            let unit_price = line
                .float("order_line_unit_price")
                .or_else(|| product.float("unit_price"));
            let line_amount = line.float("line_amount").or_else(|| {
                quantity
                    .zip(unit_price)
                    .map(|(q, p)| round2(q as f64 * p))
            });

            line_items.push(LineItem {
                line_id: link.subject_id.clone(),
                product_id,
                product_name: product.value("product_name"),
                category: product.value("category"),
                quantity,
                unit_price,
                line_amount,
                line_sequence: line.int("line_sequence"),
                perishable_flag: line.flag("perishable_flag") || product.flag("perishable"),
            });
        }
        line_items.sort_by(|a, b| {
            a.line_sequence
                .cmp(&b.line_sequence)
                .then_with(|| a.line_id.cmp(&b.line_id))
        });

        let computed_total = round2(line_items.iter().filter_map(|l| l.line_amount).sum());
        let has_perishable_items = line_items.iter().any(|l| l.perishable_flag);

        let row = OrderRow {
            order_id: order_id.to_string(),
            order_number: order.value("order_number"),
            order_status: order.value(ORDER_STATUS),
            store_id,
            customer_id,
            delivery_window_start: order.value("delivery_window_start"),
            delivery_window_end: order.value("delivery_window_end"),
            order_total_amount: order.float("order_total_amount"),
            customer_name: customer.value("customer_name"),
            customer_email: customer.value("customer_email"),
            customer_address: customer.value("customer_address"),
            store_name: store.value("store_name"),
            store_zone: store.value("store_zone"),
            store_address: store.value("store_address"),
            delivery_task_id: task_id,
            assigned_courier_id: task.value(ASSIGNED_TO),
            delivery_task_status: task.value(TASK_STATUS),
            delivery_eta: task.value("delivery_eta"),
            line_item_count: line_items.len(),
            line_items,
            computed_total,
            has_perishable_items,
            effective_updated_at: gather.effective_updated_at,
        };

        Ok(Some(Projection {
            row: TierRow {
                key: order_id.to_string(),
                effective_updated_at: row.effective_updated_at,
                payload: serde_json::to_value(&row)?,
            },
            contributors: gather.contributors,
        }))
    }
}

/// The order a change event names directly, without consulting any index:
/// the order itself, or the target of a `line_of_order` / `task_of_order`
/// link carried by the event.
pub fn direct_order(event: &ChangeEvent) -> Option<String> {
    if event.subject_prefix() == ORDER_PREFIX {
        return Some(event.subject_id().to_string());
    }
    match event.predicate() {
        LINE_OF_ORDER | TASK_OF_ORDER => event.object_value().map(str::to_string),
        _ => None,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshgraph_core::{ChangeKind, ObjectType, TripleInput};
    use freshgraph_graph::MemoryTripleStore;
    use freshgraph_ontology::seed::demo_order;

    async fn seeded() -> Arc<MemoryTripleStore> {
        let store = Arc::new(MemoryTripleStore::new());
        for result in store.upsert_batch(demo_order("FM-1001")).await {
            result.unwrap();
        }
        store
    }

    fn payload(p: &Projection) -> OrderRow {
        serde_json::from_value(p.row.payload.clone()).unwrap()
    }

    #[tokio::test]
    async fn joins_customer_store_task_and_lines() {
        let store = seeded().await;
        let projector = OrderProjector::new(store.clone());

        let projection = projector.project("order:FM-1001").await.unwrap().unwrap();
        let row = payload(&projection);

        assert_eq!(row.order_status.as_deref(), Some("CREATED"));
        assert_eq!(row.customer_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(row.store_zone.as_deref(), Some("BK"));
        assert_eq!(row.assigned_courier_id.as_deref(), Some("courier:CR-07"));
        assert_eq!(row.delivery_task_status.as_deref(), Some("PICKING"));
        assert_eq!(row.line_item_count, 2);
        assert_eq!(row.line_items[0].product_name.as_deref(), Some("Whole Milk 1L"));
        assert_eq!(row.computed_total, 8.28);
        assert!(row.has_perishable_items);
        assert!(projection.contributors.contains("product:sourdough"));
        assert!(projection.contributors.contains("customer:C-FM-1001"));
    }

    #[tokio::test]
    async fn effective_updated_at_tracks_freshest_contributor() {
        let store = seeded().await;
        let projector = OrderProjector::new(store.clone());
        let before = projector.project("order:FM-1001").await.unwrap().unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let touched = store
            .touch("product:sourdough", "category")
            .await
            .unwrap()
            .unwrap();

        let after = projector.project("order:FM-1001").await.unwrap().unwrap();
        assert_eq!(after.row.effective_updated_at, Some(touched.updated_at));
        assert!(after.row.effective_updated_at > before.row.effective_updated_at);
    }

    #[tokio::test]
    async fn referenced_subjects_without_facts_are_contributors() {
        let store = Arc::new(MemoryTripleStore::new());
        store
            .upsert(TripleInput::new("order:P1", PLACED_BY, "customer:NEW", ObjectType::EntityRef))
            .await
            .unwrap();
        let projection = OrderProjector::new(store)
            .project("order:P1")
            .await
            .unwrap()
            .unwrap();
        assert!(projection.contributors.contains("customer:NEW"));
        assert_eq!(payload(&projection).customer_name, None);
    }

    #[tokio::test]
    async fn missing_order_projects_to_none() {
        let store = seeded().await;
        let projector = OrderProjector::new(store);
        assert!(projector.project("order:nope").await.unwrap().is_none());
        assert_eq!(projector.order_keys().await.unwrap(), vec!["order:FM-1001"]);
    }

    #[test]
    fn direct_order_follows_links_and_orders() {
        let now = Utc::now();
        let line = Triple::from_input(
            TripleInput::new("orderline:X:1", LINE_OF_ORDER, "order:X", ObjectType::EntityRef),
            now,
        );
        let event = ChangeEvent::new(ChangeKind::Deleted { triple: line });
        assert_eq!(direct_order(&event).as_deref(), Some("order:X"));

        let touch = ChangeEvent::new(ChangeKind::Touched {
            subject_id: "order:X".to_string(),
            predicate: ORDER_STATUS.to_string(),
            updated_at: now,
        });
        assert_eq!(direct_order(&touch).as_deref(), Some("order:X"));

        let name = Triple::from_input(
            TripleInput::new("customer:C", "customer_name", "Ada", ObjectType::String),
            now,
        );
        assert!(direct_order(&ChangeEvent::new(ChangeKind::Upserted { triple: name })).is_none());
    }
}
