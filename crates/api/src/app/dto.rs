use chrono::{DateTime, Utc};
use serde::Deserialize;

use stocktill_core::UserId;

// -------------------------
// Request DTOs
// -------------------------

/// Manual stock movement submission. The `type` string is parsed through the
/// movement-kind boundary so unknown types surface the standard
/// unknown-movement-type message.
#[derive(Debug, Deserialize)]
pub struct RecordMovementRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub quantity: i64,
    pub reason: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Backfill/seeding timestamp; omitted means "now".
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SaleLineRequest {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateSaleRequest {
    pub lines: Vec<SaleLineRequest>,
    #[serde(default)]
    pub cashier: Option<UserId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LedgerQuery {
    /// "asc" or "desc"; the ledger page shows newest first by default.
    #[serde(default)]
    pub order: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub year: i32,
    #[serde(default)]
    pub month: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OpeningBalancesRequest {
    #[serde(default)]
    pub user_id: Option<UserId>,
}
