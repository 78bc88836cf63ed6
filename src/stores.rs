// ===============================
// src/stores.rs (store id -> channel label)
// ===============================
use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;

pub const UNKNOWN_STORE: &str = "Desconhecido";

/// Fulfilment-by-marketplace stores; their sales never enter the acrylic digest.
pub const DIGEST_EXCLUDED: [&str; 2] = [
    "(FULL) Mercado Livre - NETHBIKES",
    "(FULL) Mercado Livre - NETHSHOP",
];

static STORES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from_iter([
        ("204764247", "Mercado Livre - NETHBIKES"),
        ("204768359", "(FULL) Mercado Livre - NETHBIKES"),
        ("204774516", "(FULL) Mercado Livre - NETHSHOP"),
        ("204774520", "Mercado Livre - NETHSHOP"),
        ("204768346", "Amazon - NETHBIKES (Normal)"),
        ("204781160", "Magalu - NETHBIKES"),
        ("204886217", "Magalu - NETHSHOP"),
        ("204767286", "(FBA) Amazon - NETHBIKES"),
        ("204765146", "Shopee - NETHBIKES"),
        ("204848504", "Shopee - NETHSHOP"),
        ("204880146", "Shein - NETHSHOP"),
    ])
});

pub fn resolve(store_id: &str) -> &'static str {
    STORES.get(store_id.trim()).copied().unwrap_or(UNKNOWN_STORE)
}

pub fn excluded_from_digest(label: &str) -> bool {
    DIGEST_EXCLUDED.contains(&label)
}
