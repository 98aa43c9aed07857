use crate::messages::TradeEnvelope;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use ti_types::{AssetDecimals, Exchange, PairIdentity, ScraperError, Trade};
use tracing::warn;

const SELL: &str = "SELL";
const MIN_ROW_LEN: usize = 5;

/// Turns a trade push into canonical trades, one per row.
///
/// Malformed numeric fields are logged and replaced with zero rather than failing the frame.
/// A base asset missing from `decimals` fails the whole frame since every volume in it would
/// be wrong.
pub fn normalize(
    exchange: Exchange,
    envelope: &TradeEnvelope,
    decimals: &AssetDecimals,
    identity: &PairIdentity,
) -> Result<Vec<Trade>, ScraperError> {
    if envelope.data.is_empty() {
        return Ok(Vec::new());
    }

    let market = envelope.topic.market.as_str();
    let symbol = market.split('-').next().unwrap_or(market);
    let exponent = decimals
        .get(symbol)
        .ok_or_else(|| ScraperError::UnknownAsset(symbol.to_string()))?;

    let mut trades = Vec::with_capacity(envelope.data.len());
    for row in envelope.data.iter() {
        if row.len() < MIN_ROW_LEN {
            warn!("{exchange}: Skipping short trade row for {market}: {row:?}");
            continue;
        }

        let timestamp_ms = u64::from_str(&row[0]).unwrap_or_else(|_| {
            warn!("{exchange}: Invalid timestamp '{}' for {market}", row[0]);
            0
        });
        let mut volume = scale_volume(&row[3], exponent).unwrap_or_else(|| {
            warn!("{exchange}: Invalid volume '{}' for {market}", row[3]);
            0.0
        });
        let price = f64::from_str(&row[4])
            .ok()
            .filter(|p| p.is_finite())
            .unwrap_or_else(|| {
                warn!("{exchange}: Invalid price '{}' for {market}", row[4]);
                0.0
            });

        if row[2] == SELL {
            volume = -volume;
        }

        trades.push(Trade {
            exchange,
            symbol: symbol.to_string(),
            pair: market.to_string(),
            price,
            volume,
            timestamp_ms,
            foreign_trade_id: row[1].clone(),
            verified_pair: identity.verified,
            base_token: identity.base_token.clone(),
            quote_token: identity.quote_token.clone(),
        });
    }

    Ok(trades)
}

/// `raw / 10^decimals`, exact where the value fits in a `Decimal`.
fn scale_volume(raw: &str, decimals: u32) -> Option<f64> {
    let exact = Decimal::from_str(raw)
        .ok()
        .zip(Decimal::try_new(1, decimals).ok())
        .and_then(|(value, unit)| value.checked_mul(unit))
        .and_then(|value| value.to_f64());

    exact.or_else(|| {
        let scaled = f64::from_str(raw).ok()? / 10f64.powi(decimals as i32);
        scaled.is_finite().then_some(scaled)
    })
}
