//! The FreshMart grocery-delivery ontology and a small demo data set.

use freshgraph_core::{ObjectType, TripleInput};

use crate::error::Result;
use crate::schema::{NewClass, NewProperty, Ontology};

/// Build the FreshMart ontology.
pub fn freshmart() -> Result<Ontology> {
    let mut o = Ontology::new();

    let customer = o
        .create_class(NewClass::new("Customer", "customer").with_description("A shopper"))?
        .id;
    let store = o
        .create_class(NewClass::new("Store", "store").with_description("A fulfilment store"))?
        .id;
    let product = o
        .create_class(NewClass::new("Product", "product").with_description("A catalog item"))?
        .id;
    let inventory = o
        .create_class(NewClass::new("InventoryItem", "inventory").with_description("Stock of a product at a store"))?
        .id;
    let order = o
        .create_class(NewClass::new("Order", "order").with_description("A customer order"))?
        .id;
    let line = o
        .create_class(NewClass::new("OrderLine", "orderline").with_description("One product line of an order"))?
        .id;
    let courier = o
        .create_class(NewClass::new("Courier", "courier").with_description("A delivery courier"))?
        .id;
    let task = o
        .create_class(NewClass::new("DeliveryTask", "task").with_description("Picking and delivery of one order"))?
        .id;

    use ObjectType::{Bool, EntityRef, Float, Int, String as Text, Timestamp};
    let properties = [
        // Customer
        NewProperty::literal("customer_name", customer, Text).single(),
        NewProperty::literal("customer_email", customer, Text).single(),
        NewProperty::literal("customer_address", customer, Text).single(),
        // Store
        NewProperty::literal("store_name", store, Text).single().required(),
        NewProperty::literal("store_zone", store, Text).single(),
        NewProperty::literal("store_address", store, Text).single(),
        NewProperty::literal("store_status", store, Text).single(),
        NewProperty::literal("store_capacity_orders_per_hour", store, Int).single(),
        // Product
        NewProperty::literal("product_name", product, Text).single().required(),
        NewProperty::literal("category", product, Text).single(),
        NewProperty::literal("unit_price", product, Float).single(),
        NewProperty::literal("perishable", product, Bool).single(),
        // InventoryItem
        NewProperty::link("inventory_store", inventory, store).single(),
        NewProperty::link("inventory_product", inventory, product).single(),
        NewProperty::literal("stock_level", inventory, Int).single(),
        NewProperty::literal("replenishment_eta", inventory, Timestamp).single(),
        // Order
        NewProperty::literal("order_number", order, Text).single().required(),
        NewProperty::literal("order_status", order, Text).single().required(),
        NewProperty::link("order_store", order, store).single(),
        NewProperty::link("placed_by", order, customer).single(),
        NewProperty::literal("delivery_window_start", order, Timestamp).single(),
        NewProperty::literal("delivery_window_end", order, Timestamp).single(),
        NewProperty::literal("order_total_amount", order, Float).single(),
        // OrderLine
        NewProperty::link("line_of_order", line, order).single().required(),
        NewProperty::link("line_product", line, product).single().required(),
        NewProperty::literal("quantity", line, Int).single(),
        NewProperty::literal("order_line_unit_price", line, Float).single(),
        NewProperty::literal("line_amount", line, Float).single(),
        NewProperty::literal("line_sequence", line, Int).single(),
        NewProperty::literal("perishable_flag", line, Bool).single(),
        // Courier
        NewProperty::literal("courier_name", courier, Text).single(),
        NewProperty::link("home_store", courier, store).single(),
        NewProperty::literal("vehicle_type", courier, Text).single(),
        NewProperty::literal("courier_status", courier, Text).single(),
        // DeliveryTask
        NewProperty::link("task_of_order", task, order).single().required(),
        NewProperty::link("assigned_to", task, courier).single(),
        NewProperty::literal("task_status", task, Text).single(),
        NewProperty::literal("task_started_at", task, Timestamp).single(),
        NewProperty::literal("delivery_eta", task, Timestamp).single(),
    ];
    for prop in properties {
        o.create_property(prop)?;
    }

    tracing::debug!(
        classes = o.list_classes().len(),
        properties = o.list_properties(None).len(),
        "FreshMart ontology built"
    );
    Ok(o)
}

/// Demo facts for one order: its customer, store, two products, two lines,
/// a courier, and a delivery task in `PICKING`.
///
/// `order_ref` is the local part, e.g. `FM-1001` for `order:FM-1001`.
pub fn demo_order(order_ref: &str) -> Vec<TripleInput> {
    let order = format!("order:{order_ref}");
    let customer = format!("customer:C-{order_ref}");
    let store = "store:BK-01".to_string();
    let courier = "courier:CR-07".to_string();
    let task = format!("task:T-{order_ref}");
    let milk = "product:milk-1l".to_string();
    let bread = "product:sourdough".to_string();
    let line = |n: u32| format!("orderline:{order_ref}:{n}");

    let now = chrono::Utc::now();
    let window_start = (now + chrono::Duration::minutes(30)).to_rfc3339();
    let window_end = (now + chrono::Duration::minutes(90)).to_rfc3339();

    use ObjectType::{Bool, EntityRef, Float, Int, String as Text, Timestamp};
    let facts: Vec<(String, &str, String, ObjectType)> = vec![
        (customer.clone(), "customer_name", "Ada Lovelace".into(), Text),
        (customer.clone(), "customer_email", "ada@example.com".into(), Text),
        (customer.clone(), "customer_address", "12 Analytical Row".into(), Text),
        (store.clone(), "store_name", "FreshMart Brooklyn".into(), Text),
        (store.clone(), "store_zone", "BK".into(), Text),
        (store.clone(), "store_address", "1 Atlantic Ave".into(), Text),
        (store.clone(), "store_status", "OPEN".into(), Text),
        (store.clone(), "store_capacity_orders_per_hour", "40".into(), Int),
        (milk.clone(), "product_name", "Whole Milk 1L".into(), Text),
        (milk.clone(), "category", "dairy".into(), Text),
        (milk.clone(), "unit_price", "1.89".into(), Float),
        (milk.clone(), "perishable", "true".into(), Bool),
        (bread.clone(), "product_name", "Sourdough Loaf".into(), Text),
        (bread.clone(), "category", "bakery".into(), Text),
        (bread.clone(), "unit_price", "4.50".into(), Float),
        (bread.clone(), "perishable", "false".into(), Bool),
        (order.clone(), "order_number", order_ref.into(), Text),
        (order.clone(), "order_status", "CREATED".into(), Text),
        (order.clone(), "order_store", store.clone(), EntityRef),
        (order.clone(), "placed_by", customer.clone(), EntityRef),
        (order.clone(), "delivery_window_start", window_start, Timestamp),
        (order.clone(), "delivery_window_end", window_end, Timestamp),
        (order.clone(), "order_total_amount", "8.28".into(), Float),
        (line(1), "line_of_order", order.clone(), EntityRef),
        (line(1), "line_product", milk.clone(), EntityRef),
        (line(1), "quantity", "2".into(), Int),
        (line(1), "order_line_unit_price", "1.89".into(), Float),
        (line(1), "line_amount", "3.78".into(), Float),
        (line(1), "line_sequence", "1".into(), Int),
        (line(1), "perishable_flag", "true".into(), Bool),
        (line(2), "line_of_order", order.clone(), EntityRef),
        (line(2), "line_product", bread.clone(), EntityRef),
        (line(2), "quantity", "1".into(), Int),
        (line(2), "order_line_unit_price", "4.50".into(), Float),
        (line(2), "line_amount", "4.50".into(), Float),
        (line(2), "line_sequence", "2".into(), Int),
        (line(2), "perishable_flag", "false".into(), Bool),
        (courier.clone(), "courier_name", "Grace".into(), Text),
        (courier.clone(), "home_store", store.clone(), EntityRef),
        (courier.clone(), "vehicle_type", "bike".into(), Text),
        (courier.clone(), "courier_status", "ON_DELIVERY".into(), Text),
        (task.clone(), "task_of_order", order.clone(), EntityRef),
        (task.clone(), "assigned_to", courier, EntityRef),
        (task.clone(), "task_status", "PICKING".into(), Text),
        (task, "task_started_at", now.to_rfc3339(), Timestamp),
    ];

    facts
        .into_iter()
        .map(|(s, p, v, ty)| TripleInput::new(s, p, v, ty))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::validate;

    #[test]
    fn freshmart_has_expected_shape() {
        let o = freshmart().unwrap();
        assert_eq!(o.list_classes().len(), 8);
        let order = o.class_by_prefix("order").unwrap();
        assert_eq!(order.class_name, "Order");

        let placed_by = o.property_by_name("placed_by").unwrap();
        assert_eq!(placed_by.range_kind, ObjectType::EntityRef);
        assert_eq!(
            placed_by.range_class_id,
            Some(o.class_by_prefix("customer").unwrap().id)
        );
        assert!(o.property_by_name("order_status").unwrap().is_required);
    }

    #[test]
    fn demo_data_is_valid_against_freshmart() {
        let o = freshmart().unwrap();
        for triple in demo_order("FM-1001") {
            let r = validate(&o, &triple).unwrap();
            assert!(r.is_valid, "{} {}: {:?}", triple.subject_id, triple.predicate, r.errors);
        }
    }
}
