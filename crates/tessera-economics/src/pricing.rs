// crates/tessera-economics/src/pricing.rs
//
// Unit-of-compute price resolution.

use tessera_core::{Ledger, TesseraError};

/// Median of `proposals`, or `default` when there is no single median.
///
/// An empty set yields `default`. An even-sized set yields the middle value
/// only when both middle proposals agree; otherwise `default`. In particular
/// two differing proposals never move the price: the previous epoch's price
/// stays until an odd count or an agreeing middle pair exists. The result
/// depends only on the multiset of proposals.
pub fn resolve_price(proposals: &[u64], default: u64) -> u64 {
    if proposals.is_empty() {
        return default;
    }
    let mut sorted = proposals.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        return sorted[mid];
    }
    if sorted[mid - 1] == sorted[mid] {
        sorted[mid]
    } else {
        default
    }
}

/// Resolve the price for the upcoming epoch from the proposals stored in
/// the ledger.
///
/// `default` is the previous epoch's price, or the configured default when
/// no previous price exists.
///
/// # Errors
///
/// Returns any ledger read error unchanged.
pub fn resolve_epoch_price(ledger: &dyn Ledger, default: u64) -> Result<u64, TesseraError> {
    let proposals: Vec<u64> = ledger.get_price_proposals()?.into_values().collect();
    let price = resolve_price(&proposals, default);
    tracing::info!(
        "Resolved unit-of-compute price {} from {} proposals (default {})",
        price,
        proposals.len(),
        default
    );
    Ok(price)
}
