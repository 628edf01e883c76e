//! MdnVault — Ledger B
//!
//! Tracks each owner's MDN governance balance held inside the pair's single
//! Meridian position. The staking position itself is custodied by the
//! companion MlpVault, so every deposit and withdrawal routes the token legs
//! through it; this vault owns the accounting.
//!
//! ## Units
//! - MDN: wad (U256), 18 decimals

use odra::casper_types::U256;
use odra::prelude::*;
use odra::ContractRef;
use crate::errors::PairVaultError;
use crate::meridian::MeridianStakingContractRef;
use crate::mlp_vault::MlpVaultContractRef;
use crate::pair_controller::PairControllerContractRef;
use crate::tokens::MdnTokenContractRef;
use crate::vesting::VestingPosition;

// ==========================================
// Events
// ==========================================

pub mod events {
    use odra::casper_types::U256;
    use odra::prelude::*;

    #[odra::event]
    pub struct Deposited {
        pub owner: Address,
        pub sub_account: u64,
        pub amount: U256,
    }

    #[odra::event]
    pub struct Withdrawn {
        pub owner: Address,
        pub sub_account: u64,
        pub amount: U256,
    }

    #[odra::event]
    pub struct Swept {
        pub owner: Address,
        pub amount: U256,
    }

    #[odra::event]
    pub struct Synced {
        pub owner: Address,
        pub amount: U256,
    }
}

// ==========================================
// Contract
// ==========================================

#[odra::module(events = [
    events::Deposited,
    events::Withdrawn,
    events::Swept,
    events::Synced
])]
pub struct MdnVault {
    admin: Var<Address>,
    controller: Var<Address>,
    staking: Var<Address>,
    mdn_token: Var<Address>,
    companion: Var<Address>,

    locked: Var<bool>,

    generation: Mapping<Address, u32>,
    balances: Mapping<(Address, u32, u64), U256>,
    owner_total: Mapping<Address, U256>,

    // One-shot reconciliation flag per companion link
    synced: Mapping<Address, bool>,
}

#[odra::module]
impl MdnVault {
    // ==========================================
    // Initialization
    // ==========================================

    /// Initialize the vault
    pub fn init(&mut self, controller: Address, staking: Address, mdn_token: Address) {
        self.admin.set(self.env().caller());
        self.controller.set(controller);
        self.staking.set(staking);
        self.mdn_token.set(mdn_token);
    }

    /// Set the companion MlpVault (admin only, one shot)
    pub fn set_companion(&mut self, companion: Address) {
        self.require_admin();
        if self.companion.get().is_some() {
            self.env().revert(PairVaultError::AlreadyConfigured);
        }
        self.companion.set(companion);
    }

    // ==========================================
    // User Functions
    // ==========================================

    /// Deposit MDN into a sub-account. The tokens are pulled from the caller
    /// and staked through the companion vault, which custodies the position.
    pub fn deposit(&mut self, sub_account: u64, amount: U256) {
        self.enter_guard();
        let owner = self.env().caller();
        self.require_not_frozen(owner, sub_account);
        if amount == U256::zero() {
            self.env().revert(PairVaultError::ZeroAmount);
        }

        self.controller_ref().touch_link(owner);

        let self_address = self.env().self_address();
        let companion = self.companion.get().expect("companion not set");
        self.mdn_ref().transfer_from(owner, self_address, amount);
        self.mdn_ref().transfer(companion, amount);
        self.companion_ref().companion_stake_gov(owner, amount);
        self.credit(owner, sub_account, amount);

        self.env().emit_event(events::Deposited {
            owner,
            sub_account,
            amount,
        });
        self.exit_guard();
    }

    /// Withdraw MDN from a sub-account: unstaked through the companion and
    /// sent to the caller.
    pub fn withdraw(&mut self, sub_account: u64, amount: U256) {
        self.enter_guard();
        let owner = self.env().caller();
        self.require_not_frozen(owner, sub_account);
        if amount == U256::zero() {
            self.env().revert(PairVaultError::ZeroAmount);
        }
        if self.balance_of(owner, sub_account) < amount {
            self.env().revert(PairVaultError::InsufficientBalance);
        }

        self.companion_ref().companion_unstake_gov(owner, amount);
        self.mdn_ref().transfer(owner, amount);
        self.debit(owner, sub_account, amount);

        self.env().emit_event(events::Withdrawn {
            owner,
            sub_account,
            amount,
        });
        self.exit_guard();
    }

    /// Sweep MDN that has accumulated in the companion vault for the caller
    /// into this ledger, staking it on the way. Zero balance is a no-op.
    pub fn sweep(&mut self) {
        self.enter_guard();
        let owner = self.env().caller();
        self.require_not_frozen(owner, 0);

        let amount = self.companion_ref().companion_sweep(owner);
        if amount > U256::zero() {
            self.credit(owner, 0, amount);
            self.env().emit_event(events::Swept { owner, amount });
        }
        self.exit_guard();
    }

    /// Reconcile a pre-existing Meridian MDN stake into this ledger.
    /// Controller identity only; exactly once per companion link.
    pub fn sync(&mut self, owner: Address) {
        self.require_controller();
        if self.synced.get(&owner).unwrap_or_default() {
            self.env().revert(PairVaultError::AlreadySynced);
        }
        self.synced.set(&owner, true);

        let staked = self.staking_ref().staked_mdn_of(owner);
        let tracked = self.owner_total.get(&owner).unwrap_or_default();
        let amount = staked - tracked;
        if amount > U256::zero() {
            self.credit(owner, 0, amount);
        }
        self.env().emit_event(events::Synced { owner, amount });
    }

    // ==========================================
    // Companion entry point (MlpVault identity only)
    // ==========================================

    /// Mirror an MDN stake performed by the companion (reward staking, sweep)
    pub fn companion_credit(&mut self, owner: Address, amount: U256) {
        self.require_companion();
        self.credit(owner, 0, amount);
    }

    // ==========================================
    // Controller entry points
    // ==========================================

    /// Credit an owner's default sub-account (controller only)
    pub fn controller_credit(&mut self, owner: Address, amount: U256) {
        self.require_controller();
        self.credit(owner, 0, amount);
    }

    /// Drop every sub-account balance for an owner after a committed hand-off
    pub fn clear_all_balances(&mut self, owner: Address) {
        self.require_controller();
        let generation = self.generation.get(&owner).unwrap_or_default();
        self.generation.set(&owner, generation + 1);
        self.owner_total.set(&owner, U256::zero());
    }

    // ==========================================
    // View Functions
    // ==========================================

    /// Virtual balance of a sub-account
    pub fn balance_of(&self, owner: Address, sub_account: u64) -> U256 {
        let generation = self.generation.get(&owner).unwrap_or_default();
        self.balances
            .get(&(owner, generation, sub_account))
            .unwrap_or_default()
    }

    /// Sum of the owner's sub-account balances
    pub fn owner_total_of(&self, owner: Address) -> U256 {
        self.owner_total.get(&owner).unwrap_or_default()
    }

    /// Whether the one-shot reconciliation has run for an owner
    pub fn is_synced(&self, owner: Address) -> bool {
        self.synced.get(&owner).unwrap_or_default()
    }

    /// Freeze state as reported by the shared controller
    pub fn is_frozen(&self, owner: Address, sub_account: u64) -> bool {
        self.controller_ref().is_frozen(owner, sub_account)
    }

    /// The owner's recorded vesting position
    pub fn vesting_position_of(&self, owner: Address) -> VestingPosition {
        self.controller_ref().vesting_position_of(owner)
    }

    /// The companion MlpVault
    pub fn companion(&self) -> Option<Address> {
        self.companion.get()
    }

    // ==========================================
    // Internal Functions
    // ==========================================

    fn require_admin(&self) {
        if self.admin.get() != Some(self.env().caller()) {
            self.env().revert(PairVaultError::Unauthorized);
        }
    }

    fn require_companion(&self) {
        if self.companion.get() != Some(self.env().caller()) {
            self.env().revert(PairVaultError::Unauthorized);
        }
    }

    fn require_controller(&self) {
        if self.controller.get() != Some(self.env().caller()) {
            self.env().revert(PairVaultError::Unauthorized);
        }
    }

    fn require_not_frozen(&self, owner: Address, sub_account: u64) {
        if self.controller_ref().is_frozen(owner, sub_account) {
            self.env().revert(PairVaultError::VaultFrozen);
        }
    }

    fn enter_guard(&mut self) {
        if self.locked.get_or_default() {
            self.env().revert(PairVaultError::ReentrantCall);
        }
        self.locked.set(true);
    }

    fn exit_guard(&mut self) {
        self.locked.set(false);
    }

    fn credit(&mut self, owner: Address, sub_account: u64, amount: U256) {
        let generation = self.generation.get(&owner).unwrap_or_default();
        let key = (owner, generation, sub_account);
        let balance = self.balances.get(&key).unwrap_or_default();
        self.balances.set(&key, balance + amount);
        let total = self.owner_total.get(&owner).unwrap_or_default();
        self.owner_total.set(&owner, total + amount);
    }

    fn debit(&mut self, owner: Address, sub_account: u64, amount: U256) {
        let generation = self.generation.get(&owner).unwrap_or_default();
        let key = (owner, generation, sub_account);
        let balance = self.balances.get(&key).unwrap_or_default();
        if balance < amount {
            self.env().revert(PairVaultError::InsufficientBalance);
        }
        self.balances.set(&key, balance - amount);
        let total = self.owner_total.get(&owner).unwrap_or_default();
        self.owner_total.set(&owner, total - amount);
    }

    // ==========================================
    // Contract references
    // ==========================================

    fn controller_ref(&self) -> PairControllerContractRef {
        let addr = self.controller.get().expect("controller not set");
        PairControllerContractRef::new(self.env().clone(), addr)
    }

    fn staking_ref(&self) -> MeridianStakingContractRef {
        let addr = self.staking.get().expect("staking not set");
        MeridianStakingContractRef::new(self.env().clone(), addr)
    }

    fn mdn_ref(&self) -> MdnTokenContractRef {
        let addr = self.mdn_token.get().expect("MDN token not set");
        MdnTokenContractRef::new(self.env().clone(), addr)
    }

    fn companion_ref(&self) -> MlpVaultContractRef {
        let addr = self.companion.get().expect("companion not set");
        MlpVaultContractRef::new(self.env().clone(), addr)
    }
}
