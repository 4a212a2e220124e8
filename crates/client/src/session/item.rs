//! Item lookup request and response handling.
//!
//! The catalog answers item lookups with a set-value payload:
//!
//! ```json
//! {"item":[{"id":"P2_COD1","value":"7891000055120"},
//!          {"id":"P2_DESCRICAO","value":"ACHOC PO NESCAU 800G"},
//!          {"id":"P2_PRECO","value":"13,35"},
//!          {"id":"P2_SEQUENCIA","value":"29250"}]}
//! ```
//!
//! An empty description is the catalog's way of saying "no such item".

use pricetag_core::{Price, Product};
use serde::Deserialize;
use uuid::Uuid;

use super::FLOW_ID;
use super::error::SessionError;
use super::state::Session;

const ITEM_STEP_ID: &str = "2";
const CURSOR: &str = "B";
const STORE_ID: &str = "221";

const FIELD_BARCODE: &str = "P2_COD1";
const FIELD_DESCRIPTION: &str = "P2_DESCRICAO";
const FIELD_PRICE: &str = "P2_PRECO";
const FIELD_SEQUENCE: &str = "P2_SEQUENCIA";

#[derive(Debug, Deserialize)]
struct ItemResponse {
    item: Vec<ItemField>,
}

#[derive(Debug, Deserialize)]
struct ItemField {
    id: String,
    #[serde(default)]
    value: Option<serde_json::Value>,
}

impl ItemResponse {
    fn field(&self, id: &str) -> Option<String> {
        let value = self.item.iter().find(|f| f.id == id)?.value.as_ref()?;
        let text = match value {
            serde_json::Value::String(s) => s.trim().to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }
}

/// Form body for an item lookup, with repeated `p_arg_*` keys in order.
pub fn item_form(session: &Session, code: &str) -> Vec<(&'static str, String)> {
    vec![
        ("p_request", session.ajax_token.clone()),
        ("p_flow_id", FLOW_ID.to_string()),
        ("p_flow_step_id", ITEM_STEP_ID.to_string()),
        ("p_instance", session.session_id.clone()),
        ("p_debug", String::new()),
        ("p_arg_names", "P2_CURSOR".to_string()),
        ("p_arg_names", "P2_LOJA_ID".to_string()),
        ("p_arg_names", "P2_COD1".to_string()),
        ("p_arg_values", CURSOR.to_string()),
        ("p_arg_values", STORE_ID.to_string()),
        ("p_arg_values", code.to_string()),
    ]
}

/// Parse an item lookup response.
///
/// Returns `Ok(None)` for the structurally valid "no such item" answer and
/// `Err(SessionError::Parse)` for anything else that is not a full item.
pub fn parse_item(body: &str, code: &str) -> Result<Option<Product>, SessionError> {
    let response: ItemResponse =
        serde_json::from_str(body).map_err(|e| SessionError::Parse(format!("not an item payload: {e}")))?;

    let Some(description) = response.field(FIELD_DESCRIPTION) else {
        return Ok(None);
    };

    let price = response
        .field(FIELD_PRICE)
        .ok_or_else(|| SessionError::Parse(format!("{FIELD_PRICE} missing")))
        .and_then(|raw| parse_price(&raw))?;

    let sequence_code = response
        .field(FIELD_SEQUENCE)
        .ok_or_else(|| SessionError::Parse(format!("{FIELD_SEQUENCE} missing")))?;
    let sequence_code: i64 = sequence_code
        .parse()
        .map_err(|_| SessionError::Parse(format!("{FIELD_SEQUENCE} not a number: {sequence_code:?}")))?;

    let barcode = response.field(FIELD_BARCODE).unwrap_or_else(|| code.to_string());

    Ok(Some(Product {
        id: Uuid::new_v4(),
        barcode,
        description,
        sequence_code,
        prices: vec![Price::observed_now(price)],
    }))
}

/// Parse a displayed price such as `13,35`, `R$ 1.234,56` or `5.65`.
fn parse_price(raw: &str) -> Result<f64, SessionError> {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.' || *c == '-')
        .collect();
    let normalized = if digits.contains(',') { digits.replace('.', "").replace(',', ".") } else { digits };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| SessionError::Parse(format!("{FIELD_PRICE} not a price: {raw:?}")))
}
