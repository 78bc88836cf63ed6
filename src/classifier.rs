// ===============================
// src/classifier.rs
// ===============================
//
// Acrylic heuristic:
// - tags (descricaoDetalhada) mention the "dubon" brand, or
// - description mentions "acrilico".
// Both sides are lowercased and stripped of accents before matching.
//
use unicode_normalization::UnicodeNormalization;

use crate::domain::{DigestItem, LineItem, Order};
use crate::stores;

const TAG_MARKER: &str = "dubon";
const DESCRIPTION_MARKER: &str = "acrilico";

/// Lowercase, decompose, keep only ASCII. "Acrílico" -> "acrilico".
pub fn normalize(s: &str) -> String {
    s.to_lowercase().nfkd().filter(char::is_ascii).collect()
}

fn item_matches(item: &LineItem) -> bool {
    let tags = normalize(item.tags.as_deref().unwrap_or_default());
    let description = normalize(item.description.as_deref().unwrap_or_default());
    tags.contains(TAG_MARKER) || description.contains(DESCRIPTION_MARKER)
}

pub fn is_acrylic(order: &Order) -> bool {
    order.items.iter().any(item_matches)
}

pub fn extract_items(order: &Order) -> Vec<DigestItem> {
    let store = stores::resolve(&order.store_id);
    order
        .items
        .iter()
        .filter(|it| item_matches(it))
        .map(|it| DigestItem {
            store,
            quantity: it.quantity,
            description: it.description.clone().unwrap_or_else(|| "N/A".to_string()),
        })
        .collect()
}

/// Acrylic order from a store that takes part in the acrylic flow.
pub fn forwards_to_acrylic(order: &Order) -> bool {
    !stores::excluded_from_digest(stores::resolve(&order.store_id)) && is_acrylic(order)
}

/// Digest items for a batch of orders, excluded stores dropped before classification.
pub fn collect_digest_items(orders: &[Order]) -> Vec<DigestItem> {
    orders
        .iter()
        .filter(|o| !stores::excluded_from_digest(stores::resolve(&o.store_id)))
        .filter(|o| is_acrylic(o))
        .flat_map(extract_items)
        .collect()
}
