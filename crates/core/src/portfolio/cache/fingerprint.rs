use chrono::NaiveDate;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::Result;
use crate::fx::normalize_currency_code;
use crate::portfolio::metrics::DateRange;
use crate::portfolio::performance::ReturnMethod;
use crate::portfolio::portfolio_model::{PortfolioFilter, SnapshotRequest};

/// Canonical form of everything a snapshot depends on. Field order is fixed
/// by the struct, so the JSON encoding is stable.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FingerprintInput<'a> {
    user_id: &'a str,
    base_currency: String,
    filter: PortfolioFilter,
    range: DateRange,
    end_date: NaiveDate,
    method: ReturnMethod,
    data_version: &'a str,
}

/// SHA-256 hex digest identifying the snapshot of `request` over the data
/// at `data_version`. Requests that differ only in filter order or letter
/// case share a fingerprint.
pub fn snapshot_fingerprint(request: &SnapshotRequest, data_version: &str) -> Result<String> {
    let input = FingerprintInput {
        user_id: request.user_id.trim(),
        base_currency: normalize_currency_code(&request.base_currency),
        filter: request.filter.normalize(),
        range: request.range,
        end_date: request.end_date,
        method: request.method,
        data_version,
    };
    let canonical = serde_json::to_vec(&input)?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}
