// crates/tessera-economics/src/emission.rs
//
// Epoch reward emission with halving.
//
//   pool = base_epoch_reward / 2^(height / halving_interval)
//
// computed with a right shift, so the pool is zero after 64 halvings.

use tessera_core::RewardParams;

/// Reward pool minted for an epoch settled at block `height`.
///
/// Heights before zero and a non-positive halving interval both yield the
/// unhalved base reward.
pub fn reward_pool_at(params: &RewardParams, height: i64) -> u64 {
    if height <= 0 || params.halving_interval <= 0 {
        return params.base_epoch_reward;
    }
    let halvings = height / params.halving_interval;
    if halvings >= 64 {
        return 0;
    }
    params.base_epoch_reward >> halvings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_halving_before_interval() {
        let params = RewardParams::default();
        assert_eq!(reward_pool_at(&params, 0), 1_048_576);
        assert_eq!(reward_pool_at(&params, 50), 1_048_576);
        assert_eq!(reward_pool_at(&params, 99), 1_048_576);
    }

    #[test]
    fn test_halving_at_interval() {
        let params = RewardParams::default();
        assert_eq!(reward_pool_at(&params, 100), 524_288);
        assert_eq!(reward_pool_at(&params, 250), 262_144);
    }

    #[test]
    fn test_pool_reaches_zero() {
        let params = RewardParams::default();
        // 2^20 base: gone after 21 halvings.
        assert_eq!(reward_pool_at(&params, 2_100), 0);
        assert_eq!(reward_pool_at(&params, 100 * 64), 0);
        assert_eq!(reward_pool_at(&params, i64::MAX), 0);
    }
}
