//! Vesting Tracker
//!
//! Per-owner accounting of amounts committed to the time-locked escrow
//! conversion. Embedded in the PairController and surfaced read-only through
//! both vaults.

use odra::casper_types::U256;
use odra::prelude::*;
use crate::meridian::VESTING_DURATION_MS;

/// A recorded vesting commitment
#[odra::odra_type]
pub struct VestingPosition {
    pub pair_amount: U256,
    pub amount: U256,
    pub start_timestamp: u64,
    pub maturity_duration: u64,
}

#[odra::module]
pub struct VestingTracker {
    amount: Mapping<Address, U256>,
    pair_amount: Mapping<Address, U256>,
    start_ts: Mapping<Address, u64>,
}

#[odra::module]
impl VestingTracker {
    /// Record a new commitment for an owner
    pub fn record(&mut self, owner: Address, amount: U256, pair_amount: U256) {
        self.amount.set(&owner, amount);
        self.pair_amount.set(&owner, pair_amount);
        self.start_ts.set(&owner, self.env().get_block_time());
    }

    /// Settle (clear) the owner's commitment
    pub fn settle(&mut self, owner: Address) {
        self.amount.set(&owner, U256::zero());
        self.pair_amount.set(&owner, U256::zero());
        self.start_ts.set(&owner, 0);
    }

    /// Whether the owner has an open commitment
    pub fn is_active(&self, owner: Address) -> bool {
        self.amount.get(&owner).unwrap_or_default() > U256::zero()
    }

    /// The owner's current position (zeroed when none is open)
    pub fn position_of(&self, owner: Address) -> VestingPosition {
        VestingPosition {
            pair_amount: self.pair_amount.get(&owner).unwrap_or_default(),
            amount: self.amount.get(&owner).unwrap_or_default(),
            start_timestamp: self.start_ts.get(&owner).unwrap_or_default(),
            maturity_duration: VESTING_DURATION_MS,
        }
    }
}
