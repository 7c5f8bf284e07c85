use bitcoin::{Amount, Denomination, OutPoint, SignedAmount, Txid};

use crate::error::CoreError;
use crate::types::{RawTransaction, TxInput, TxOutput};

/// Decode a verbose `getrawtransaction` result.
///
/// Timestamps come from `time`, falling back to `blocktime`; both are
/// absent for transactions still sitting in the mempool.
pub(super) fn parse_raw_transaction(raw: &serde_json::Value) -> Result<RawTransaction, CoreError> {
    let txid = parse_txid(raw.get("txid"), "txid")?;
    let time =
        parse_u64_optional(raw.get("time")).or_else(|| parse_u64_optional(raw.get("blocktime")));
    let fee = raw
        .get("fee")
        .filter(|fee| !fee.is_null())
        .map(parse_signed_btc_amount)
        .transpose()?;

    let vin = raw
        .get("vin")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| CoreError::InvalidTxData(format!("{txid}: missing vin array")))?;
    let vout = raw
        .get("vout")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| CoreError::InvalidTxData(format!("{txid}: missing vout array")))?;

    Ok(RawTransaction {
        txid,
        time,
        fee,
        inputs: parse_vin(vin)?,
        outputs: parse_vout(vout)?,
    })
}

/// Decode a `getaddresstxids` result: a flat array of txid strings.
pub(super) fn parse_txid_list(raw: &serde_json::Value) -> Result<Vec<Txid>, CoreError> {
    // Address-index nodes answer `null` rather than `[]` for some unknown
    // addresses.
    if raw.is_null() {
        return Ok(Vec::new());
    }

    raw.as_array()
        .ok_or_else(|| CoreError::InvalidTxData(format!("expected txid array, got: {raw}")))?
        .iter()
        .map(|value| parse_txid(Some(value), "getaddresstxids item"))
        .collect()
}

pub(super) fn parse_txid(
    value: Option<&serde_json::Value>,
    field: &str,
) -> Result<Txid, CoreError> {
    let value = value
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| CoreError::InvalidTxData(format!("missing {field}")))?;
    value
        .parse()
        .map_err(|e| CoreError::InvalidTxData(format!("invalid {field} `{value}`: {e}")))
}

fn parse_u32_required(value: Option<&serde_json::Value>, field: &str) -> Result<u32, CoreError> {
    let n = value
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| CoreError::InvalidTxData(format!("missing {field}")))?;
    u32::try_from(n).map_err(|_| CoreError::InvalidTxData(format!("{field} out of range: {n}")))
}

fn parse_u64_optional(value: Option<&serde_json::Value>) -> Option<u64> {
    value.and_then(serde_json::Value::as_u64)
}

fn parse_vin(vin: &[serde_json::Value]) -> Result<Vec<TxInput>, CoreError> {
    vin.iter()
        .map(|input| {
            if input.get("coinbase").is_some() {
                return Ok(TxInput { prevout: None });
            }
            let prev_txid = parse_txid(input.get("txid"), "vin.txid")?;
            let prev_vout = parse_u32_required(input.get("vout"), "vin.vout")?;
            Ok(TxInput {
                prevout: Some(OutPoint::new(prev_txid, prev_vout)),
            })
        })
        .collect()
}

// Outputs are indexed by array position; `vout[i].n == i` on every node
// we talk to, so `n` is not consulted.
fn parse_vout(vout: &[serde_json::Value]) -> Result<Vec<TxOutput>, CoreError> {
    vout.iter()
        .map(|output| {
            let value = parse_btc_amount(
                output
                    .get("value")
                    .ok_or_else(|| CoreError::InvalidTxData("missing value in vout".into()))?,
            )?;
            let address = output.get("scriptPubKey").and_then(script_pubkey_address);
            Ok(TxOutput { value, address })
        })
        .collect()
}

/// Bitcoin Core 22+ reports a single `address`; older releases and the
/// address-index forks report an `addresses` array. The first entry wins.
fn script_pubkey_address(spk: &serde_json::Value) -> Option<String> {
    if let Some(address) = spk.get("address").and_then(serde_json::Value::as_str) {
        return Some(address.to_owned());
    }
    spk.get("addresses")
        .and_then(serde_json::Value::as_array)
        .and_then(|addresses| addresses.first())
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
}

/// Parse a BTC amount from a JSON value.
///
/// Number values go through `Amount::from_float_in` to support scientific
/// notation, while string values go through `Amount::from_str_in`.
pub(super) fn parse_btc_amount(value: &serde_json::Value) -> Result<Amount, CoreError> {
    match value {
        serde_json::Value::Number(n) => {
            let parsed = n
                .as_f64()
                .ok_or_else(|| CoreError::InvalidTxData(format!("invalid BTC amount `{value}`")))?;
            Amount::from_float_in(parsed, Denomination::Bitcoin)
                .map_err(|e| CoreError::InvalidTxData(format!("invalid BTC amount `{value}`: {e}")))
        }
        serde_json::Value::String(s) => Amount::from_str_in(s, Denomination::Bitcoin)
            .map_err(|e| CoreError::InvalidTxData(format!("invalid BTC amount `{s}`: {e}"))),
        _ => Err(CoreError::InvalidTxData(format!(
            "expected numeric BTC amount, got: {value}"
        ))),
    }
}

fn parse_signed_btc_amount(value: &serde_json::Value) -> Result<SignedAmount, CoreError> {
    match value {
        serde_json::Value::Number(n) => {
            let parsed = n
                .as_f64()
                .ok_or_else(|| CoreError::InvalidTxData(format!("invalid fee `{value}`")))?;
            SignedAmount::from_float_in(parsed, Denomination::Bitcoin)
                .map_err(|e| CoreError::InvalidTxData(format!("invalid fee `{value}`: {e}")))
        }
        serde_json::Value::String(s) => SignedAmount::from_str_in(s, Denomination::Bitcoin)
            .map_err(|e| CoreError::InvalidTxData(format!("invalid fee `{s}`: {e}"))),
        _ => Err(CoreError::InvalidTxData(format!(
            "expected numeric fee, got: {value}"
        ))),
    }
}
