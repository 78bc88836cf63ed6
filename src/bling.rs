// ===============================
// src/bling.rs
// ===============================
//
// Order Source Adapter for the Bling v2 REST API.
// - fetch(range): one GET per call, never fails towards the caller
// - only "Em aberto" orders survive
//
// Payload sample (trimmed):
// {"retorno":{"pedidos":[{"pedido":{"numero":"4512","situacao":"Em aberto","loja":"204765146",
//   "cliente":{"nome":"Maria"},"totalvenda":"89.90",
//   "itens":[{"item":{"codigo":"AC-01","descricao":"Placa Acrílico","descricaoDetalhada":"dubon","quantidade":"3.0000"}}]}}]}}
//
use std::future::Future;
use std::str::FromStr;

use chrono::Local;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::domain::{DateRange, LineItem, Order, OrderStatus};
use crate::error::RelayError;
use crate::metrics::{BLING_FETCH_ERRORS, ORDERS_FETCHED};

/// Anything that can hand out open orders for a date range.
pub trait OrderSource {
    /// `None` means today. Errors are absorbed: the result is simply empty.
    fn fetch(&self, range: Option<DateRange>) -> impl Future<Output = Vec<Order>> + Send;
}

#[derive(Clone, Debug)]
pub struct BlingClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl BlingClient {
    pub fn new(http: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self { http, base_url, api_key }
    }

    fn orders_url(&self, range: &DateRange) -> String {
        format!(
            "{}/pedidos/json/?apikey={}&filters={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.api_key),
            urlencoding::encode(&range.to_filter())
        )
    }

    async fn get_body(&self, range: &DateRange) -> Result<String, RelayError> {
        let rsp = self.http.get(self.orders_url(range)).send().await?;
        let status = rsp.status();
        let body = rsp.text().await?;
        if !status.is_success() {
            return Err(RelayError::Status { status, body });
        }
        Ok(body)
    }
}

impl OrderSource for BlingClient {
    async fn fetch(&self, range: Option<DateRange>) -> Vec<Order> {
        let range = range.unwrap_or_else(|| DateRange::single(Local::now().date_naive()));
        let body = match self.get_body(&range).await {
            Ok(b) => b,
            Err(e) => {
                error!(error = %e, filter = %range.to_filter(), "bling: fetch failed");
                BLING_FETCH_ERRORS.with_label_values(&[e.code()]).inc();
                return Vec::new();
            }
        };
        match parse_orders(&body) {
            Ok(orders) => {
                ORDERS_FETCHED.inc_by(orders.len() as u64);
                orders
            }
            Err(e) => {
                error!(error = %e, "bling: unexpected payload");
                BLING_FETCH_ERRORS.with_label_values(&["payload"]).inc();
                Vec::new()
            }
        }
    }
}

// ---- Wire models ----
#[derive(Debug, Deserialize)]
struct Envelope {
    retorno: Retorno,
}

#[derive(Debug, Deserialize)]
struct Retorno {
    #[serde(default)]
    pedidos: Option<Vec<PedidoWrapper>>,
    #[serde(default)]
    erros: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PedidoWrapper {
    pedido: Pedido,
}

#[derive(Debug, Deserialize)]
struct Pedido {
    #[serde(default)]
    numero: Value,
    #[serde(default)]
    situacao: String,
    #[serde(default)]
    loja: Value,
    #[serde(default)]
    cliente: Option<Cliente>,
    #[serde(default)]
    totalvenda: Value,
    #[serde(default)]
    itens: Vec<ItemWrapper>,
}

#[derive(Debug, Deserialize)]
struct Cliente {
    #[serde(default)]
    nome: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemWrapper {
    item: Item,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    codigo: Option<String>,
    #[serde(default)]
    descricao: Option<String>,
    #[serde(rename = "descricaoDetalhada", default)]
    descricao_detalhada: Option<String>,
    #[serde(default)]
    quantidade: Value,
}

/// Bling mixes strings and numbers for ids and amounts; ids are kept as strings.
fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn value_to_f64(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn value_to_decimal(v: &Value) -> Decimal {
    let raw = value_to_string(v);
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .unwrap_or(Decimal::ZERO)
}

impl From<Pedido> for Order {
    fn from(p: Pedido) -> Self {
        let items = p
            .itens
            .into_iter()
            .map(|w| LineItem {
                quantity: (value_to_f64(&w.item.quantidade) as i64).max(0),
                sku: w.item.codigo,
                description: w.item.descricao,
                tags: w.item.descricao_detalhada,
            })
            .collect();
        Order {
            id: value_to_string(&p.numero),
            status: OrderStatus::from_raw(&p.situacao),
            store_id: value_to_string(&p.loja),
            buyer: p.cliente.and_then(|c| c.nome),
            total: value_to_decimal(&p.totalvenda),
            items,
        }
    }
}

/// Decode a response body and keep the open orders.
pub fn parse_orders(body: &str) -> Result<Vec<Order>, RelayError> {
    let env: Envelope = serde_json::from_str(body)?;
    let Some(pedidos) = env.retorno.pedidos else {
        match env.retorno.erros {
            Some(erros) => info!(%erros, "bling: no orders in range"),
            None => info!("bling: no orders in range"),
        }
        return Ok(Vec::new());
    };

    let total = pedidos.len();
    let open: Vec<Order> = pedidos
        .into_iter()
        .map(|w| Order::from(w.pedido))
        .filter(|o| {
            // an empty id would collide in the dedup set with every other id-less order
            if o.id.is_empty() {
                warn!(store = %o.store_id, "bling: order without numero, skipped");
                return false;
            }
            if !o.status.is_open() {
                debug!(order = %o.id, status = %o.status.as_str(), "bling: skipped, not open");
            }
            o.status.is_open()
        })
        .collect();
    debug!(total, open = open.len(), "bling: orders decoded");
    Ok(open)
}
