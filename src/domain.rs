// ===============================
// src/domain.rs
// ===============================
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;

/// Literal status Bling reports for orders still waiting to be fulfilled.
pub const OPEN_STATUS: &str = "Em aberto";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus { Open, Other(String) }

impl OrderStatus {
    pub fn from_raw(raw: &str) -> Self {
        if raw == OPEN_STATUS { OrderStatus::Open } else { OrderStatus::Other(raw.to_string()) }
    }
    pub fn is_open(&self) -> bool { matches!(self, OrderStatus::Open) }
    pub fn as_str(&self) -> &str {
        match self { OrderStatus::Open => OPEN_STATUS, OrderStatus::Other(raw) => raw }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub sku: Option<String>,
    pub description: Option<String>,
    pub tags: Option<String>,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: String,
    pub status: OrderStatus,
    pub store_id: String,
    pub buyer: Option<String>,
    pub total: Decimal,
    pub items: Vec<LineItem>,
}

/// One acrylic line item as it appears in the digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestItem { pub store: &'static str, pub quantity: i64, pub description: String }

/// Inclusive range of emission dates, as Bling filters them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange { pub start: NaiveDate, pub end: NaiveDate }

impl DateRange {
    pub fn single(day: NaiveDate) -> Self { Self { start: day, end: day } }

    /// Yesterday through today: the window used for the acrylic digest.
    pub fn trailing_day(today: NaiveDate) -> Self {
        Self { start: today - Duration::days(1), end: today }
    }

    /// `dataEmissao[dd/mm/yyyy TO dd/mm/yyyy]`
    pub fn to_filter(&self) -> String {
        format!(
            "dataEmissao[{} TO {}]",
            self.start.format("%d/%m/%Y"),
            self.end.format("%d/%m/%Y")
        )
    }
}
