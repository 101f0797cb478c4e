//! Derived fields attached to well-known actions after a successful decode.

use serde_json::{json, Map, Value as Json};

/// Attach `@transfer`, `@newaccount`, … to `extras` when `data` carries the
/// fields they are built from. Actions with missing or malformed fields get
/// no extra.
pub fn attach(account: &str, name: &str, data: &Json, extras: &mut Map<String, Json>) {
    let extra = match (account, name) {
        (_, "transfer") => transfer(data).map(|v| ("@transfer", v)),
        ("eosio", "newaccount") => newaccount(data).map(|v| ("@newaccount", v)),
        ("eosio", "updateauth") => updateauth(data).map(|v| ("@updateauth", v)),
        ("eosio", "buyrambytes") => buyrambytes(data).map(|v| ("@buyrambytes", v)),
        ("eosio", "delegatebw") => delegatebw(data).map(|v| ("@delegatebw", v)),
        ("eosio", "undelegatebw") => undelegatebw(data).map(|v| ("@undelegatebw", v)),
        _ => None,
    };
    if let Some((key, value)) = extra {
        extras.insert(key.to_string(), value);
    }
}

/// `"1.5000 EOS"` → `(1.5, "EOS")`.
fn split_asset(asset: &str) -> Option<(f64, &str)> {
    let (amount, symbol) = asset.trim().split_once(' ')?;
    Some((amount.parse().ok()?, symbol))
}

fn asset_amount(data: &Json, field: &str) -> Option<f64> {
    split_asset(data.get(field)?.as_str()?).map(|(amount, _)| amount)
}

fn transfer(data: &Json) -> Option<Json> {
    let (amount, symbol) = split_asset(data.get("quantity")?.as_str()?)?;
    Some(json!({
        "from": data.get("from")?,
        "to": data.get("to")?,
        "amount": amount,
        "symbol": symbol,
        "memo": data.get("memo").cloned().unwrap_or(Json::Null),
    }))
}

fn newaccount(data: &Json) -> Option<Json> {
    let newact = data.get("newact").or_else(|| data.get("name"))?;
    Some(json!({
        "active": data.get("active")?,
        "owner": data.get("owner")?,
        "newact": newact,
    }))
}

fn updateauth(data: &Json) -> Option<Json> {
    Some(json!({
        "permission": data.get("permission")?,
        "parent": data.get("parent")?,
        "auth": data.get("auth")?,
    }))
}

fn buyrambytes(data: &Json) -> Option<Json> {
    Some(json!({
        "payer": data.get("payer")?,
        "receiver": data.get("receiver")?,
        "bytes": data.get("bytes")?,
    }))
}

fn delegatebw(data: &Json) -> Option<Json> {
    let cpu = asset_amount(data, "stake_cpu_quantity")?;
    let net = asset_amount(data, "stake_net_quantity")?;
    Some(json!({
        "from": data.get("from")?,
        "receiver": data.get("receiver")?,
        "stake_cpu_quantity": cpu,
        "stake_net_quantity": net,
        "transfer": data.get("transfer").cloned().unwrap_or(Json::Bool(false)),
        "amount": cpu + net,
    }))
}

fn undelegatebw(data: &Json) -> Option<Json> {
    let cpu = asset_amount(data, "unstake_cpu_quantity")?;
    let net = asset_amount(data, "unstake_net_quantity")?;
    Some(json!({
        "from": data.get("from")?,
        "receiver": data.get("receiver")?,
        "unstake_cpu_quantity": cpu,
        "unstake_net_quantity": net,
        "amount": cpu + net,
    }))
}
