//! Meridian Staking Hub — reference implementation
//!
//! The Meridian hub is the external staking system the Tandem vaults sit on
//! top of. This module is a deployable implementation of the surface the
//! vaults consume, used for integration tests and testnet deployments; on a
//! network with the real hub, the vaults are simply pointed at its address.
//!
//! Balances live under an owner key and are operated on by registered
//! custodians (the vaults), which also carry the CEP-18 token legs of each
//! operation. Escrowed MDN is internal bookkeeping and never a token.
//!
//! ## Units
//! - MLP/MDN/esMDN: wad (U256), 18 decimals
//! - Native rewards: motes (U512)

use odra::casper_types::{U256, U512};
use odra::prelude::*;
use odra::ContractRef;
use crate::tokens::{MdnTokenContractRef, MlpTokenContractRef};

/// Vesting maturity window: 365 days (Odra block time is in milliseconds)
pub const VESTING_DURATION_MS: u64 = 31_536_000_000;

// ==========================================
// Events
// ==========================================

pub mod events {
    use odra::casper_types::{U256, U512};
    use odra::prelude::*;

    #[odra::event]
    pub struct Staked {
        pub owner: Address,
        pub asset: String,
        pub amount: U256,
    }

    #[odra::event]
    pub struct Unstaked {
        pub owner: Address,
        pub asset: String,
        pub amount: U256,
    }

    #[odra::event]
    pub struct RewardsDistributed {
        pub owner: Address,
        pub mdn_amount: U256,
        pub esc_amount: U256,
        pub native_amount: U512,
    }

    #[odra::event]
    pub struct VestDeposited {
        pub owner: Address,
        pub amount: U256,
        pub pair_amount: U256,
    }

    #[odra::event]
    pub struct VestWithdrawn {
        pub owner: Address,
        pub converted: U256,
        pub returned_esc: U256,
    }

    #[odra::event]
    pub struct AccountHandedOff {
        pub from: Address,
        pub to: Address,
    }
}

// ==========================================
// Types
// ==========================================

/// Result of withdrawing from the vester
#[odra::odra_type]
pub struct UnvestOutcome {
    pub converted: U256,
    pub returned_esc: U256,
}

// ==========================================
// Errors
// ==========================================

#[odra::odra_error]
pub enum MeridianError {
    Unauthorized = 41,
    InsufficientStake = 42,
    InsufficientEscrow = 43,
    VestingActive = 44,
    TransferNotApproved = 45,
    ReservedPrincipal = 46,
}

// ==========================================
// Contract
// ==========================================

#[odra::module(events = [
    events::Staked,
    events::Unstaked,
    events::RewardsDistributed,
    events::VestDeposited,
    events::VestWithdrawn,
    events::AccountHandedOff
])]
pub struct MeridianStaking {
    mlp_token: Var<Address>,
    mdn_token: Var<Address>,

    admin: Var<Address>,
    distributor: Var<Address>,
    custodians: Mapping<Address, bool>,

    // Per-owner position
    staked_mlp: Mapping<Address, U256>,
    staked_mdn: Mapping<Address, U256>,
    staked_esc: Mapping<Address, U256>,
    esc_balance: Mapping<Address, U256>, // claimed, not yet staked escrow

    // Pending rewards, fed by the distributor
    pending_mdn: Mapping<Address, U256>,
    pending_esc: Mapping<Address, U256>,
    pending_native: Mapping<Address, U512>,

    // Vester: one position per owner, linear conversion over the maturity window
    vest_amount: Mapping<Address, U256>,
    vest_pair: Mapping<Address, U256>,
    vest_start: Mapping<Address, u64>,
    vest_converted: Mapping<Address, U256>,

    // Account hand-off approvals: sender -> approved custodian
    transfer_receiver: Mapping<Address, Address>,
}

#[odra::module]
impl MeridianStaking {
    // ==========================================
    // Initialization & admin
    // ==========================================

    /// Initialize the hub with the two token addresses
    pub fn init(&mut self, mlp_token: Address, mdn_token: Address) {
        self.mlp_token.set(mlp_token);
        self.mdn_token.set(mdn_token);
        self.admin.set(self.env().caller());
        self.distributor.set(self.env().caller());
    }

    /// Register a custodian allowed to operate positions (admin only)
    pub fn register_custodian(&mut self, custodian: Address) {
        self.require_admin();
        self.custodians.set(&custodian, true);
    }

    /// Set the reward distributor role (admin only)
    pub fn set_distributor(&mut self, distributor: Address) {
        self.require_admin();
        self.distributor.set(distributor);
    }

    // ==========================================
    // Staking primitives (custodian only)
    // ==========================================

    /// Stake MLP for an owner; tokens are pulled from the caller
    pub fn stake_mlp(&mut self, owner: Address, amount: U256) {
        self.require_custodian();
        let caller = self.env().caller();
        let self_address = self.env().self_address();
        self.mlp_ref().transfer_from(caller, self_address, amount);
        let current = self.staked_mlp.get(&owner).unwrap_or_default();
        self.staked_mlp.set(&owner, current + amount);
        self.env().emit_event(events::Staked {
            owner,
            asset: "MLP".to_string(),
            amount,
        });
    }

    /// Unstake MLP; principal reserved by an active vest cannot leave
    pub fn unstake_mlp(&mut self, owner: Address, amount: U256) {
        self.require_custodian();
        let staked = self.staked_mlp.get(&owner).unwrap_or_default();
        if staked < amount {
            self.env().revert(MeridianError::InsufficientStake);
        }
        let reserved = self.vest_pair.get(&owner).unwrap_or_default();
        if staked - amount < reserved {
            self.env().revert(MeridianError::ReservedPrincipal);
        }
        self.staked_mlp.set(&owner, staked - amount);
        let caller = self.env().caller();
        self.mlp_ref().transfer(caller, amount);
        self.env().emit_event(events::Unstaked {
            owner,
            asset: "MLP".to_string(),
            amount,
        });
    }

    /// Stake MDN for an owner; tokens are pulled from the caller
    pub fn stake_mdn(&mut self, owner: Address, amount: U256) {
        self.require_custodian();
        let caller = self.env().caller();
        let self_address = self.env().self_address();
        self.mdn_ref().transfer_from(caller, self_address, amount);
        let current = self.staked_mdn.get(&owner).unwrap_or_default();
        self.staked_mdn.set(&owner, current + amount);
        self.env().emit_event(events::Staked {
            owner,
            asset: "MDN".to_string(),
            amount,
        });
    }

    /// Unstake MDN; tokens are sent to the caller
    pub fn unstake_mdn(&mut self, owner: Address, amount: U256) {
        self.require_custodian();
        let staked = self.staked_mdn.get(&owner).unwrap_or_default();
        if staked < amount {
            self.env().revert(MeridianError::InsufficientStake);
        }
        self.staked_mdn.set(&owner, staked - amount);
        let caller = self.env().caller();
        self.mdn_ref().transfer(caller, amount);
        self.env().emit_event(events::Unstaked {
            owner,
            asset: "MDN".to_string(),
            amount,
        });
    }

    /// Stake claimed escrow for an owner
    pub fn stake_esc(&mut self, owner: Address, amount: U256) {
        self.require_custodian();
        let balance = self.esc_balance.get(&owner).unwrap_or_default();
        if balance < amount {
            self.env().revert(MeridianError::InsufficientEscrow);
        }
        self.esc_balance.set(&owner, balance - amount);
        let staked = self.staked_esc.get(&owner).unwrap_or_default();
        self.staked_esc.set(&owner, staked + amount);
        self.env().emit_event(events::Staked {
            owner,
            asset: "esMDN".to_string(),
            amount,
        });
    }

    // ==========================================
    // Claims (custodian only)
    // ==========================================

    /// Claim pending MDN rewards; tokens are sent to the caller
    pub fn claim_mdn(&mut self, owner: Address) -> U256 {
        self.require_custodian();
        let amount = self.pending_mdn.get(&owner).unwrap_or_default();
        if amount > U256::zero() {
            self.pending_mdn.set(&owner, U256::zero());
            let caller = self.env().caller();
            self.mdn_ref().transfer(caller, amount);
        }
        amount
    }

    /// Claim pending escrow rewards into the owner's unstaked escrow balance
    pub fn claim_esc(&mut self, owner: Address) -> U256 {
        self.require_custodian();
        let amount = self.pending_esc.get(&owner).unwrap_or_default();
        if amount > U256::zero() {
            self.pending_esc.set(&owner, U256::zero());
            let balance = self.esc_balance.get(&owner).unwrap_or_default();
            self.esc_balance.set(&owner, balance + amount);
        }
        amount
    }

    /// Claim pending native rewards; motes are sent to the caller
    pub fn claim_native(&mut self, owner: Address) -> U512 {
        self.require_custodian();
        let amount = self.pending_native.get(&owner).unwrap_or_default();
        if amount > U512::zero() {
            self.pending_native.set(&owner, U512::zero());
            let caller = self.env().caller();
            self.env().transfer_tokens(&caller, &amount);
        }
        amount
    }

    /// Claim the matured portion of an active vest as MDN, sent to the caller.
    /// Closes the position once fully converted.
    pub fn claim_vested(&mut self, owner: Address) -> U256 {
        self.require_custodian();
        let amount = self.vest_amount.get(&owner).unwrap_or_default();
        if amount == U256::zero() {
            return U256::zero();
        }
        let matured = self.matured_of(owner);
        let converted = self.vest_converted.get(&owner).unwrap_or_default();
        let newly = matured - converted;
        if newly > U256::zero() {
            self.vest_converted.set(&owner, converted + newly);
            let caller = self.env().caller();
            self.mdn_ref().transfer(caller, newly);
        }
        if matured == amount {
            self.clear_vest(owner);
        }
        newly
    }

    // ==========================================
    // Vester (custodian only)
    // ==========================================

    /// Commit staked escrow to conversion, reserving the same amount of
    /// staked MLP as the pair. Re-vesting before maturity is rejected.
    pub fn vest(&mut self, owner: Address, amount: U256) {
        self.require_custodian();
        if amount == U256::zero() {
            return;
        }
        if self.vest_amount.get(&owner).unwrap_or_default() > U256::zero() {
            self.env().revert(MeridianError::VestingActive);
        }
        let staked_esc = self.staked_esc.get(&owner).unwrap_or_default();
        if staked_esc < amount {
            self.env().revert(MeridianError::InsufficientEscrow);
        }
        let staked_mlp = self.staked_mlp.get(&owner).unwrap_or_default();
        if staked_mlp < amount {
            self.env().revert(MeridianError::InsufficientStake);
        }
        self.staked_esc.set(&owner, staked_esc - amount);
        self.vest_amount.set(&owner, amount);
        self.vest_pair.set(&owner, amount);
        self.vest_start.set(&owner, self.env().get_block_time());
        self.vest_converted.set(&owner, U256::zero());
        self.env().emit_event(events::VestDeposited {
            owner,
            amount,
            pair_amount: amount,
        });
    }

    /// Withdraw from the vester: the matured remainder converts to MDN (sent
    /// to the caller), the unmatured remainder returns to staked escrow, and
    /// the pair reservation is released. A no-op when no position exists.
    pub fn unvest(&mut self, owner: Address) -> UnvestOutcome {
        self.require_custodian();
        let amount = self.vest_amount.get(&owner).unwrap_or_default();
        if amount == U256::zero() {
            return UnvestOutcome {
                converted: U256::zero(),
                returned_esc: U256::zero(),
            };
        }
        let matured = self.matured_of(owner);
        let converted = self.vest_converted.get(&owner).unwrap_or_default();
        let newly = matured - converted;
        if newly > U256::zero() {
            let caller = self.env().caller();
            self.mdn_ref().transfer(caller, newly);
        }
        let returned = amount - matured;
        if returned > U256::zero() {
            let staked_esc = self.staked_esc.get(&owner).unwrap_or_default();
            self.staked_esc.set(&owner, staked_esc + returned);
        }
        self.clear_vest(owner);
        self.env().emit_event(events::VestWithdrawn {
            owner,
            converted: newly,
            returned_esc: returned,
        });
        UnvestOutcome {
            converted: newly,
            returned_esc: returned,
        }
    }

    // ==========================================
    // Reward feed (distributor only)
    // ==========================================

    /// Credit pending MDN and escrow rewards for an owner
    pub fn distribute(&mut self, owner: Address, mdn_amount: U256, esc_amount: U256) {
        self.require_distributor();
        let mdn = self.pending_mdn.get(&owner).unwrap_or_default();
        self.pending_mdn.set(&owner, mdn + mdn_amount);
        let esc = self.pending_esc.get(&owner).unwrap_or_default();
        self.pending_esc.set(&owner, esc + esc_amount);
        self.env().emit_event(events::RewardsDistributed {
            owner,
            mdn_amount,
            esc_amount,
            native_amount: U512::zero(),
        });
    }

    /// Credit attached CSPR as pending native rewards for an owner
    #[odra(payable)]
    pub fn distribute_native(&mut self, owner: Address) {
        self.require_distributor();
        let amount = self.env().attached_value();
        let pending = self.pending_native.get(&owner).unwrap_or_default();
        self.pending_native.set(&owner, pending + amount);
        self.env().emit_event(events::RewardsDistributed {
            owner,
            mdn_amount: U256::zero(),
            esc_amount: U256::zero(),
            native_amount: amount,
        });
    }

    // ==========================================
    // Account hand-off
    // ==========================================

    /// Approve a custodian to pull this caller's entire position
    pub fn approve_account_transfer(&mut self, receiver: Address) {
        let caller = self.env().caller();
        self.transfer_receiver.set(&caller, receiver);
    }

    /// Pull an approved sender's entire position under the owner key
    /// (custodian only; the sender must have no active vest)
    pub fn accept_transfer(&mut self, sender: Address, owner: Address) {
        self.require_custodian();
        let caller = self.env().caller();
        if self.transfer_receiver.get(&sender) != Some(caller) {
            self.env().revert(MeridianError::TransferNotApproved);
        }
        // The approval stays behind pointing at an emptied position, so a
        // replayed accept moves nothing.
        self.move_position(sender, owner);
    }

    /// Move an owner's entire position to another key (custodian only;
    /// the source must have no active vest)
    pub fn transfer_account(&mut self, from: Address, to: Address) {
        self.require_custodian();
        self.move_position(from, to);
    }

    // ==========================================
    // View Functions
    // ==========================================

    /// Staked MLP for an owner
    pub fn staked_mlp_of(&self, owner: Address) -> U256 {
        self.staked_mlp.get(&owner).unwrap_or_default()
    }

    /// Staked MLP not reserved by an active vest
    pub fn unreserved_mlp_of(&self, owner: Address) -> U256 {
        let staked = self.staked_mlp.get(&owner).unwrap_or_default();
        let reserved = self.vest_pair.get(&owner).unwrap_or_default();
        staked - reserved
    }

    /// Staked MDN for an owner
    pub fn staked_mdn_of(&self, owner: Address) -> U256 {
        self.staked_mdn.get(&owner).unwrap_or_default()
    }

    /// Staked escrow for an owner
    pub fn staked_esc_of(&self, owner: Address) -> U256 {
        self.staked_esc.get(&owner).unwrap_or_default()
    }

    /// Claimed, unstaked escrow for an owner
    pub fn esc_balance_of(&self, owner: Address) -> U256 {
        self.esc_balance.get(&owner).unwrap_or_default()
    }

    /// Pending MDN rewards
    pub fn pending_mdn_of(&self, owner: Address) -> U256 {
        self.pending_mdn.get(&owner).unwrap_or_default()
    }

    /// Pending escrow rewards
    pub fn pending_esc_of(&self, owner: Address) -> U256 {
        self.pending_esc.get(&owner).unwrap_or_default()
    }

    /// Pending native rewards in motes
    pub fn pending_native_of(&self, owner: Address) -> U512 {
        self.pending_native.get(&owner).unwrap_or_default()
    }

    /// Active vest amount
    pub fn vest_amount_of(&self, owner: Address) -> U256 {
        self.vest_amount.get(&owner).unwrap_or_default()
    }

    /// Principal reserved by the active vest
    pub fn vest_pair_of(&self, owner: Address) -> U256 {
        self.vest_pair.get(&owner).unwrap_or_default()
    }

    /// Matured portion of the active vest (linear over the maturity window)
    pub fn matured_of(&self, owner: Address) -> U256 {
        let amount = self.vest_amount.get(&owner).unwrap_or_default();
        if amount == U256::zero() {
            return U256::zero();
        }
        let start = self.vest_start.get(&owner).unwrap_or_default();
        let now = self.env().get_block_time();
        if now <= start {
            return U256::zero();
        }
        let elapsed = now - start;
        if elapsed >= VESTING_DURATION_MS {
            amount
        } else {
            amount * U256::from(elapsed) / U256::from(VESTING_DURATION_MS)
        }
    }

    /// Whether an address is a registered custodian
    pub fn is_custodian(&self, address: Address) -> bool {
        self.custodians.get(&address).unwrap_or_default()
    }

    // ==========================================
    // Internal Functions
    // ==========================================

    fn require_admin(&self) {
        if self.admin.get() != Some(self.env().caller()) {
            self.env().revert(MeridianError::Unauthorized);
        }
    }

    fn require_distributor(&self) {
        if self.distributor.get() != Some(self.env().caller()) {
            self.env().revert(MeridianError::Unauthorized);
        }
    }

    fn require_custodian(&self) {
        if !self.custodians.get(&self.env().caller()).unwrap_or_default() {
            self.env().revert(MeridianError::Unauthorized);
        }
    }

    fn clear_vest(&mut self, owner: Address) {
        self.vest_amount.set(&owner, U256::zero());
        self.vest_pair.set(&owner, U256::zero());
        self.vest_start.set(&owner, 0);
        self.vest_converted.set(&owner, U256::zero());
    }

    /// Move every balance and pending reward from one key to another
    fn move_position(&mut self, from: Address, to: Address) {
        if self.vest_amount.get(&from).unwrap_or_default() > U256::zero() {
            self.env().revert(MeridianError::VestingActive);
        }

        let mlp = self.staked_mlp.get(&from).unwrap_or_default();
        self.staked_mlp.set(&from, U256::zero());
        let current = self.staked_mlp.get(&to).unwrap_or_default();
        self.staked_mlp.set(&to, current + mlp);

        let mdn = self.staked_mdn.get(&from).unwrap_or_default();
        self.staked_mdn.set(&from, U256::zero());
        let current = self.staked_mdn.get(&to).unwrap_or_default();
        self.staked_mdn.set(&to, current + mdn);

        let esc = self.staked_esc.get(&from).unwrap_or_default();
        self.staked_esc.set(&from, U256::zero());
        let current = self.staked_esc.get(&to).unwrap_or_default();
        self.staked_esc.set(&to, current + esc);

        let esc_bal = self.esc_balance.get(&from).unwrap_or_default();
        self.esc_balance.set(&from, U256::zero());
        let current = self.esc_balance.get(&to).unwrap_or_default();
        self.esc_balance.set(&to, current + esc_bal);

        let p_mdn = self.pending_mdn.get(&from).unwrap_or_default();
        self.pending_mdn.set(&from, U256::zero());
        let current = self.pending_mdn.get(&to).unwrap_or_default();
        self.pending_mdn.set(&to, current + p_mdn);

        let p_esc = self.pending_esc.get(&from).unwrap_or_default();
        self.pending_esc.set(&from, U256::zero());
        let current = self.pending_esc.get(&to).unwrap_or_default();
        self.pending_esc.set(&to, current + p_esc);

        let p_native = self.pending_native.get(&from).unwrap_or_default();
        self.pending_native.set(&from, U512::zero());
        let current = self.pending_native.get(&to).unwrap_or_default();
        self.pending_native.set(&to, current + p_native);

        self.env().emit_event(events::AccountHandedOff { from, to });
    }

    // ==========================================
    // Token references
    // ==========================================

    fn mlp_ref(&self) -> MlpTokenContractRef {
        let addr = self.mlp_token.get().expect("MLP token not set");
        MlpTokenContractRef::new(self.env().clone(), addr)
    }

    fn mdn_ref(&self) -> MdnTokenContractRef {
        let addr = self.mdn_token.get().expect("MDN token not set");
        MdnTokenContractRef::new(self.env().clone(), addr)
    }
}
