//! Bybit v5 REST client (USDT linear perpetuals).
//!
//! Blocking `reqwest` client with HMAC-SHA256 request signing per the v5
//! header scheme: sign(timestamp + api_key + recv_window + payload), hex
//! encoded into `X-BAPI-SIGN`. Kline responses arrive newest-first and are
//! reversed before leaving this module.

use super::{
    Exchange, ExchangeError, OpenOrder, OrderAck, OrderKind, OrderRequest, OrderStatus, OrderType,
    PositionInfo,
};
use crate::domain::{Bar, OrderSide};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

const MAINNET_URL: &str = "https://api.bybit.com";
const TESTNET_URL: &str = "https://api-testnet.bybit.com";
const CATEGORY: &str = "linear";
/// retCode for "leverage not modified" — idempotent, not a failure.
const LEVERAGE_NOT_MODIFIED: i64 = 110043;

/// API key pair, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, ExchangeError> {
        let api_key = std::env::var("BYBIT_API_KEY")
            .map_err(|_| ExchangeError::MissingCredentials("BYBIT_API_KEY".into()))?;
        let api_secret = std::env::var("BYBIT_API_SECRET")
            .map_err(|_| ExchangeError::MissingCredentials("BYBIT_API_SECRET".into()))?;
        Ok(Self {
            api_key,
            api_secret,
        })
    }
}

pub struct BybitClient {
    client: reqwest::blocking::Client,
    base_url: String,
    credentials: Option<Credentials>,
    recv_window_ms: u64,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg")]
    ret_msg: String,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct KlineResult {
    list: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct OrderResult {
    #[serde(rename = "orderId")]
    order_id: String,
}

#[derive(Debug, Deserialize)]
struct ListResult<T> {
    list: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct OrderRow {
    #[serde(rename = "orderId")]
    order_id: String,
    symbol: String,
    side: String,
    #[serde(rename = "orderType")]
    order_type: String,
    qty: String,
    #[serde(default)]
    price: String,
    #[serde(default, rename = "triggerPrice")]
    trigger_price: String,
    #[serde(default, rename = "reduceOnly")]
    reduce_only: bool,
    #[serde(rename = "orderStatus")]
    order_status: String,
}

#[derive(Debug, Deserialize)]
struct PositionRow {
    symbol: String,
    side: String,
    size: String,
    #[serde(default, rename = "avgPrice")]
    avg_price: String,
    #[serde(default, rename = "takeProfit")]
    take_profit: String,
    #[serde(default, rename = "stopLoss")]
    stop_loss: String,
}

impl BybitClient {
    pub fn new(credentials: Option<Credentials>, testnet: bool) -> Result<Self, ExchangeError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: if testnet { TESTNET_URL } else { MAINNET_URL }.to_string(),
            credentials,
            recv_window_ms: 5000,
        })
    }

    fn credentials(&self) -> Result<&Credentials, ExchangeError> {
        self.credentials
            .as_ref()
            .ok_or_else(|| ExchangeError::MissingCredentials("no API key configured".into()))
    }

    fn sign(&self, timestamp: i64, payload: &str) -> Result<String, ExchangeError> {
        let creds = self.credentials()?;
        let message = format!(
            "{timestamp}{}{}{payload}",
            creds.api_key, self.recv_window_ms
        );
        let mut mac = HmacSha256::new_from_slice(creds.api_secret.as_bytes())
            .map_err(|e| ExchangeError::Transport(format!("failed to init signer: {e}")))?;
        mac.update(message.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn get_public<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &str,
    ) -> Result<T, ExchangeError> {
        let url = format!("{}{path}?{query}", self.base_url);
        let resp = self.client.get(url).send()?;
        unwrap_envelope(resp.json::<Envelope<T>>()?)
    }

    fn get_signed<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &str,
    ) -> Result<T, ExchangeError> {
        let creds = self.credentials()?;
        let timestamp = Utc::now().timestamp_millis();
        let signature = self.sign(timestamp, query)?;
        let url = format!("{}{path}?{query}", self.base_url);
        let resp = self
            .client
            .get(url)
            .header("X-BAPI-API-KEY", &creds.api_key)
            .header("X-BAPI-TIMESTAMP", timestamp.to_string())
            .header("X-BAPI-RECV-WINDOW", self.recv_window_ms.to_string())
            .header("X-BAPI-SIGN", signature)
            .send()?;
        unwrap_envelope(resp.json::<Envelope<T>>()?)
    }

    fn post_signed<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ExchangeError> {
        let creds = self.credentials()?;
        let payload = body.to_string();
        let timestamp = Utc::now().timestamp_millis();
        let signature = self.sign(timestamp, &payload)?;
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .client
            .post(url)
            .header("X-BAPI-API-KEY", &creds.api_key)
            .header("X-BAPI-TIMESTAMP", timestamp.to_string())
            .header("X-BAPI-RECV-WINDOW", self.recv_window_ms.to_string())
            .header("X-BAPI-SIGN", signature)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()?;
        unwrap_envelope(resp.json::<Envelope<T>>()?)
    }

    fn post_signed_allowing<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
        tolerated_code: i64,
    ) -> Result<Option<T>, ExchangeError> {
        match self.post_signed::<T>(path, body) {
            Ok(v) => Ok(Some(v)),
            Err(ExchangeError::Api { code, .. }) if code == tolerated_code => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<T, ExchangeError> {
    if envelope.ret_code != 0 {
        return Err(ExchangeError::Api {
            code: envelope.ret_code,
            message: envelope.ret_msg,
        });
    }
    envelope
        .result
        .ok_or_else(|| ExchangeError::ResponseFormat("success response with no result".into()))
}

fn parse_f64(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        None
    } else {
        raw.parse().ok()
    }
}

fn parse_side(raw: &str) -> Option<OrderSide> {
    match raw {
        "Buy" => Some(OrderSide::Buy),
        "Sell" => Some(OrderSide::Sell),
        _ => None,
    }
}

/// Bybit trigger direction: 1 = triggered when price rises to the trigger,
/// 2 = when it falls. A sell stop protects a long (price falling), a buy
/// stop protects a short (price rising).
fn trigger_direction(side: OrderSide) -> i32 {
    match side {
        OrderSide::Sell => 2,
        OrderSide::Buy => 1,
    }
}

/// Kline rows arrive newest-first as
/// [startTime, open, high, low, close, volume, turnover].
fn parse_kline_rows(symbol: &str, rows: Vec<Vec<String>>) -> Result<Vec<Bar>, ExchangeError> {
    let mut bars = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() < 6 {
            return Err(ExchangeError::ResponseFormat(format!(
                "kline row has {} fields, expected at least 6",
                row.len()
            )));
        }
        let ms: i64 = row[0]
            .parse()
            .map_err(|_| ExchangeError::ResponseFormat(format!("bad kline timestamp: {}", row[0])))?;
        let ts: DateTime<Utc> = DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| ExchangeError::ResponseFormat(format!("invalid timestamp: {ms}")))?;
        let field = |i: usize| -> Result<f64, ExchangeError> {
            row[i]
                .parse()
                .map_err(|_| ExchangeError::ResponseFormat(format!("bad kline field: {}", row[i])))
        };
        bars.push(Bar {
            symbol: symbol.to_string(),
            ts,
            open: field(1)?,
            high: field(2)?,
            low: field(3)?,
            close: field(4)?,
            volume: field(5)?,
        });
    }
    bars.reverse();
    Ok(bars)
}

fn parse_order_row(row: OrderRow) -> Option<OpenOrder> {
    let side = parse_side(&row.side)?;
    Some(OpenOrder {
        order_id: row.order_id,
        symbol: row.symbol,
        side,
        kind: if row.order_type == "Limit" {
            OrderKind::Limit
        } else {
            OrderKind::Market
        },
        qty: parse_f64(&row.qty)?,
        price: parse_f64(&row.price),
        trigger_price: parse_f64(&row.trigger_price),
        reduce_only: row.reduce_only,
        status: OrderStatus::parse(&row.order_status),
    })
}

impl Exchange for BybitClient {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Bar>, ExchangeError> {
        let query =
            format!("category={CATEGORY}&symbol={symbol}&interval={interval}&limit={limit}");
        let result: KlineResult = self.get_public("/v5/market/kline", &query)?;
        parse_kline_rows(symbol, result.list)
    }

    fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        let mut body = json!({
            "category": CATEGORY,
            "symbol": request.symbol,
            "side": request.side.as_str(),
            "qty": request.qty,
            "reduceOnly": request.reduce_only,
        });
        match request.order_type {
            OrderType::Market => {
                body["orderType"] = json!("Market");
            }
            OrderType::Limit { price } => {
                body["orderType"] = json!("Limit");
                body["price"] = json!(price.to_string());
                body["timeInForce"] = json!("GTC");
            }
            OrderType::StopMarket { trigger_price } => {
                body["orderType"] = json!("Market");
                body["triggerPrice"] = json!(trigger_price.to_string());
                body["triggerDirection"] = json!(trigger_direction(request.side));
                body["triggerBy"] = json!("LastPrice");
            }
        }
        let result: OrderResult = self.post_signed("/v5/order/create", &body)?;
        Ok(OrderAck {
            order_id: result.order_id,
        })
    }

    fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<(), ExchangeError> {
        let body = json!({
            "category": CATEGORY,
            "symbol": symbol,
            "orderId": order_id,
        });
        let _: OrderResult = self.post_signed("/v5/order/cancel", &body)?;
        Ok(())
    }

    fn get_open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>, ExchangeError> {
        let query = format!("category={CATEGORY}&symbol={symbol}");
        let result: ListResult<OrderRow> = self.get_signed("/v5/order/realtime", &query)?;
        Ok(result.list.into_iter().filter_map(parse_order_row).collect())
    }

    fn find_open_order(
        &self,
        symbol: &str,
        order_id: &str,
    ) -> Result<Option<OpenOrder>, ExchangeError> {
        let query = format!("category={CATEGORY}&symbol={symbol}&orderId={order_id}");
        let result: ListResult<OrderRow> = self.get_signed("/v5/order/realtime", &query)?;
        Ok(result.list.into_iter().filter_map(parse_order_row).next())
    }

    fn order_history_status(
        &self,
        symbol: &str,
        order_id: &str,
    ) -> Result<Option<OrderStatus>, ExchangeError> {
        let query = format!("category={CATEGORY}&symbol={symbol}&orderId={order_id}");
        let result: ListResult<OrderRow> = self.get_signed("/v5/order/history", &query)?;
        Ok(result
            .list
            .into_iter()
            .next()
            .map(|row| OrderStatus::parse(&row.order_status)))
    }

    fn get_positions(&self, symbol: Option<&str>) -> Result<Vec<PositionInfo>, ExchangeError> {
        let query = match symbol {
            Some(sym) => format!("category={CATEGORY}&symbol={sym}"),
            None => format!("category={CATEGORY}&settleCoin=USDT"),
        };
        let result: ListResult<PositionRow> = self.get_signed("/v5/position/list", &query)?;
        Ok(result
            .list
            .into_iter()
            .filter_map(|row| {
                let side = parse_side(&row.side)?;
                let size = parse_f64(&row.size)?;
                if size <= 0.0 {
                    return None;
                }
                Some(PositionInfo {
                    symbol: row.symbol,
                    side,
                    size,
                    avg_price: parse_f64(&row.avg_price).unwrap_or(f64::NAN),
                    take_profit: parse_f64(&row.take_profit),
                    stop_loss: parse_f64(&row.stop_loss),
                })
            })
            .collect())
    }

    fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError> {
        let body = json!({
            "category": CATEGORY,
            "symbol": symbol,
            "buyLeverage": leverage.to_string(),
            "sellLeverage": leverage.to_string(),
        });
        self.post_signed_allowing::<serde_json::Value>(
            "/v5/position/set-leverage",
            &body,
            LEVERAGE_NOT_MODIFIED,
        )?;
        Ok(())
    }
}
