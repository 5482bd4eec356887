//! Publication payload normalization
//!
//! Producers are not consistent about key casing, so every field is looked
//! up through a fixed list of accepted spellings before falling back to a
//! case-insensitive match on the canonical name.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

use monitor_core::{
    Channel, FeedEvent, NormalizeError, NormalizeResult, PriceTick, TradeSignal, WalletSnapshot,
};

/// Canonical field name and the spellings accepted for it
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub spellings: &'static [&'static str],
}

pub const CLOSE: FieldSpec = FieldSpec { name: "close", spellings: &["close", "Close", "CLOSE"] };
pub const SYMBOL: FieldSpec = FieldSpec { name: "symbol", spellings: &["symbol", "Symbol", "SYMBOL"] };
pub const INTERVAL: FieldSpec = FieldSpec { name: "interval", spellings: &["interval", "Interval"] };
pub const EVENT_TIME: FieldSpec = FieldSpec {
    name: "event_time",
    spellings: &["event_time", "EventTime", "eventTime"],
};
pub const USDT: FieldSpec = FieldSpec { name: "usdt", spellings: &["usdt", "USDT", "Usdt"] };
pub const BTC: FieldSpec = FieldSpec { name: "btc", spellings: &["btc", "BTC", "Btc"] };
pub const ACTION: FieldSpec = FieldSpec { name: "action", spellings: &["action", "Action", "ACTION"] };
pub const REASON: FieldSpec = FieldSpec { name: "reason", spellings: &["reason", "Reason", "REASON"] };
pub const PRICE: FieldSpec = FieldSpec { name: "price", spellings: &["price", "Price", "PRICE"] };

/// Find a field, ignoring `null` values
pub fn lookup<'a>(object: &'a Map<String, Value>, field: &FieldSpec) -> Option<&'a Value> {
    field
        .spellings
        .iter()
        .find_map(|key| object.get(*key))
        .or_else(|| {
            object
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(field.name))
                .map(|(_, value)| value)
        })
        .filter(|value| !value.is_null())
}

/// Parse a number or numeric string, plain or scientific notation
pub fn parse_decimal(field: &'static str, value: &Value) -> NormalizeResult<Decimal> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(NormalizeError::InvalidNumber {
                field,
                value: other.to_string(),
            })
        }
    };

    // rust_decimal tolerates `_` separators, plain float syntax does not
    let plain = !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    if !plain {
        return Err(NormalizeError::InvalidNumber { field, value: text });
    }

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| NormalizeError::InvalidNumber { field, value: text })
}

fn object<'a>(channel: Channel, data: &'a Value) -> NormalizeResult<&'a Map<String, Value>> {
    data.as_object().ok_or(NormalizeError::NotAnObject { channel })
}

fn required<'a>(
    channel: Channel,
    object: &'a Map<String, Value>,
    field: &FieldSpec,
) -> NormalizeResult<&'a Value> {
    lookup(object, field).ok_or(NormalizeError::MissingField {
        channel,
        field: field.name,
    })
}

fn required_string(
    channel: Channel,
    object: &Map<String, Value>,
    field: &FieldSpec,
) -> NormalizeResult<String> {
    required(channel, object, field)?
        .as_str()
        .map(str::to_string)
        .ok_or(NormalizeError::InvalidString { field: field.name })
}

fn optional_string(object: &Map<String, Value>, field: &FieldSpec) -> Option<String> {
    lookup(object, field).and_then(Value::as_str).map(str::to_string)
}

/// Candle payload -> price tick. `None` when there is no usable close price.
pub fn price(data: &Value) -> Option<PriceTick> {
    let object = data.as_object()?;
    let close = parse_decimal(CLOSE.name, lookup(object, &CLOSE)?).ok()?;

    let event_time = optional_string(object, &EVENT_TIME)
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc));

    Some(PriceTick {
        close,
        symbol: optional_string(object, &SYMBOL),
        interval: optional_string(object, &INTERVAL),
        event_time,
    })
}

/// Wallet payload -> full snapshot
pub fn wallet(data: &Value) -> NormalizeResult<WalletSnapshot> {
    let object = object(Channel::Wallet, data)?;
    let usdt = parse_decimal(USDT.name, required(Channel::Wallet, object, &USDT)?)?;
    let btc = parse_decimal(BTC.name, required(Channel::Wallet, object, &BTC)?)?;

    Ok(WalletSnapshot::new(usdt, btc))
}

/// Signal payload -> trade signal
pub fn signal(data: &Value) -> NormalizeResult<TradeSignal> {
    let object = object(Channel::Signals, data)?;
    let action = required_string(Channel::Signals, object, &ACTION)?;
    let reason = required_string(Channel::Signals, object, &REASON)?;
    let symbol = required_string(Channel::Signals, object, &SYMBOL)?;

    let mut signal = TradeSignal::new(action, reason, symbol);
    signal.price = lookup(object, &PRICE).and_then(|v| parse_decimal(PRICE.name, v).ok());
    Ok(signal)
}

/// Normalize a publication. `Ok(None)` means the payload is dropped
/// without any trace (price payloads without a close).
pub fn normalize(channel: Channel, data: &Value) -> NormalizeResult<Option<FeedEvent>> {
    match channel {
        Channel::Kline => Ok(price(data).map(FeedEvent::Price)),
        Channel::Wallet => wallet(data).map(|w| Some(FeedEvent::Wallet(w))),
        Channel::Signals => signal(data).map(|s| Some(FeedEvent::Signal(s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_core::SignalAction;
    use rust_decimal::prelude::*;
    use serde_json::json;

    #[test]
    fn test_price_from_string_and_number() {
        let tick = price(&json!({"close": "96012.57"})).unwrap();
        assert_eq!(tick.close, Decimal::from_str("96012.57").unwrap());

        let tick = price(&json!({
            "symbol": "BTCUSDT",
            "interval": "1m",
            "close": 96012.5,
            "event_time": "2024-05-01T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(tick.close, Decimal::from_str("96012.5").unwrap());
        assert_eq!(tick.symbol.as_deref(), Some("BTCUSDT"));
        assert_eq!(tick.interval.as_deref(), Some("1m"));
        assert!(tick.event_time.is_some());
    }

    #[test]
    fn test_price_without_close_is_dropped() {
        assert!(price(&json!({"open": "1.0"})).is_none());
        assert!(price(&json!({"close": null})).is_none());
        assert!(price(&json!({"close": "abc"})).is_none());
        assert!(price(&json!("96000")).is_none());
        assert_eq!(normalize(Channel::Kline, &json!({})), Ok(None));
    }

    #[test]
    fn test_wallet_snapshot() {
        let snapshot = wallet(&json!({"usdt": "123.456", "btc": "0.00123"})).unwrap();
        assert_eq!(snapshot.usdt, Decimal::from_str("123.456").unwrap());
        assert_eq!(snapshot.btc, Decimal::from_str("0.00123").unwrap());

        // float64 values from the producer, including scientific notation
        let snapshot = wallet(&json!({"USDT": 0, "BTC": 1e-5})).unwrap();
        assert_eq!(snapshot.usdt, Decimal::ZERO);
        assert_eq!(snapshot.btc, Decimal::from_str("0.00001").unwrap());
    }

    #[test]
    fn test_wallet_validation() {
        assert_eq!(
            wallet(&json!({"usdt": "10"})),
            Err(NormalizeError::MissingField {
                channel: Channel::Wallet,
                field: "btc",
            })
        );
        assert!(matches!(
            wallet(&json!({"usdt": "ten", "btc": "1"})),
            Err(NormalizeError::InvalidNumber { field: "usdt", .. })
        ));
        assert!(matches!(
            wallet(&json!([1, 2])),
            Err(NormalizeError::NotAnObject { .. })
        ));
    }

    #[test]
    fn test_parse_decimal_rejects_separators() {
        assert!(parse_decimal("usdt", &json!("1_000")).is_err());
        assert!(parse_decimal("usdt", &json!("")).is_err());
        assert!(parse_decimal("usdt", &json!("12 BTC")).is_err());
        assert_eq!(
            parse_decimal("usdt", &json!(" 1000 ")).unwrap(),
            Decimal::from(1000)
        );
        assert_eq!(
            parse_decimal("btc", &json!("1.5e-3")).unwrap(),
            Decimal::from_str("0.0015").unwrap()
        );
    }

    #[test]
    fn test_signal_lowercase_fields() {
        let signal = signal(&json!({"action": "buy", "reason": "rsi_oversold", "symbol": "BTCUSDT"})).unwrap();
        assert_eq!(signal.action, SignalAction::Buy);
        assert_eq!(signal.reason, "rsi_oversold");
        assert_eq!(signal.symbol, "BTCUSDT");
    }

    #[test]
    fn test_signal_alternate_casing() {
        let signal = signal(&json!({"Action": "SELL", "Reason": "take_profit", "Symbol": "ETHUSDT"})).unwrap();
        assert_eq!(signal.action, SignalAction::Sell);
        assert!(signal.is_recognized());

        let signal = super::signal(&json!({"aCtIoN": "Buy", "REASON": "x", "symbol": "BTCUSDT", "price": 96000.1}))
            .unwrap();
        assert_eq!(signal.action, SignalAction::Buy);
        assert_eq!(signal.price, Decimal::from_str("96000.1").ok());
    }

    #[test]
    fn test_signal_unrecognized_action_is_sell() {
        let signal = signal(&json!({"action": "HOLD", "reason": "flat", "symbol": "BTCUSDT"})).unwrap();
        assert_eq!(signal.action, SignalAction::Sell);
        assert!(!signal.is_recognized());
    }

    #[test]
    fn test_signal_missing_field() {
        assert_eq!(
            signal(&json!({"action": "BUY", "reason": "x"})),
            Err(NormalizeError::MissingField {
                channel: Channel::Signals,
                field: "symbol",
            })
        );
        assert_eq!(
            signal(&json!({"action": 1, "reason": "x", "symbol": "BTCUSDT"})),
            Err(NormalizeError::InvalidString { field: "action" })
        );
    }
}
