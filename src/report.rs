// ===============================
// src/report.rs
// ===============================
//
// Text rendering for Slack:
// - order_message : one notification per new order
// - acrylic_digest: store-grouped acrylic sales, None when nothing to report
//
use rust_decimal::{Decimal, RoundingStrategy};

use crate::classifier;
use crate::domain::{DigestItem, Order};
use crate::stores;

pub const SEPARATOR: &str =
    "___________________________________________________________________";
pub const DIGEST_TITLE: &str = "*RELATÓRIO DE ACRÍLICOS*";
pub const NOTHING_TO_REPORT: &str = "Nenhuma venda de acrílicos para relatar.";

/// Digest sections: (substring of the store label, section header).
const SECTIONS: [(&str, &str); 2] = [
    ("Mercado Livre", "*Vendas de Acrílicos - Mercado Livre*"),
    ("Shopee", "*Vendas de Acrílicos - Shopee*"),
];

/// Brazilian real: `1234.5` -> `R$ 1.234,50`.
pub fn format_brl(value: Decimal) -> String {
    // Exact decimal ties round half-to-even (2.675 -> 2,68); Bling totals already come in centavos.
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
    let plain = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("R$ {sign}{grouped},{frac_part}")
}

pub fn order_message(order: &Order) -> String {
    let mut msg = String::new();
    msg.push_str(stores::resolve(&order.store_id));
    msg.push('\n');
    let id = if order.id.is_empty() { "N/A" } else { order.id.as_str() };
    msg.push_str(&format!("Nº Pedido: {id}\n"));
    msg.push_str(&format!("Comprador: {}\n", order.buyer.as_deref().unwrap_or("N/A")));

    for it in &order.items {
        msg.push_str(&format!(
            "Item: {} | {}\n",
            it.sku.as_deref().unwrap_or("N/A"),
            it.description.as_deref().unwrap_or("N/A")
        ));
        msg.push_str(&format!("Quantidade: {}\n", it.quantity));
    }

    msg.push_str(&format!("Valor total: {}\n", format_brl(order.total)));
    msg.push_str(SEPARATOR);
    msg
}

/// Render already-classified digest items; None if no section has entries.
pub fn render_digest(items: &[DigestItem]) -> Option<String> {
    let mut lines = vec![DIGEST_TITLE.to_string()];
    let mut sections = 0;

    for (needle, header) in SECTIONS {
        let matching: Vec<&DigestItem> = items.iter().filter(|i| i.store.contains(needle)).collect();
        if matching.is_empty() {
            continue;
        }
        sections += 1;
        lines.push(format!("\n{header}"));
        lines.extend(matching.iter().map(|i| format!("{} | {}", i.quantity, i.description)));
    }

    (sections > 0).then(|| lines.join("\n"))
}

/// Acrylic digest over a batch of fetched orders.
pub fn acrylic_digest(orders: &[Order]) -> Option<String> {
    render_digest(&classifier::collect_digest_items(orders))
}
