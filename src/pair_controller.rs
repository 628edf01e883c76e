//! Pair Controller
//!
//! The shared coordination contract for one MlpVault/MdnVault pair:
//! - companion links, established lazily on first account activity
//! - freeze flags consulted by both vaults (owner-level for the transfer
//!   protocol, per-sub-account for async operations)
//! - the one-shot account-transfer protocol (request / signal / cancel /
//!   accept)
//! - the vesting tracker, recorded by Ledger A and readable by both ledgers
//!
//! Both vaults answer freeze queries from this contract, so freeze symmetry
//! between the ledgers holds by construction.

use odra::casper_types::U256;
use odra::prelude::*;
use odra::ContractRef;
use crate::errors::PairVaultError;
use crate::mdn_vault::MdnVaultContractRef;
use crate::meridian::MeridianStakingContractRef;
use crate::mlp_vault::MlpVaultContractRef;
use crate::vesting::{VestingPosition, VestingTracker};

// ==========================================
// Events
// ==========================================

pub mod events {
    use odra::casper_types::U256;
    use odra::prelude::*;

    #[odra::event]
    pub struct CompanionLinked {
        pub owner: Address,
    }

    #[odra::event]
    pub struct TransferRequested {
        pub owner: Address,
        pub recipient: Address,
        pub expected_mlp: U256,
        pub expected_mdn: U256,
    }

    #[odra::event]
    pub struct TransferCommitted {
        pub owner: Address,
        pub recipient: Address,
        pub mlp_amount: U256,
        pub mdn_amount: U256,
    }

    #[odra::event]
    pub struct TransferCancelled {
        pub owner: Address,
        pub by_signal: bool,
    }

    #[odra::event]
    pub struct FullTransferAccepted {
        pub sender: Address,
        pub recipient: Address,
        pub mlp_amount: U256,
        pub mdn_amount: U256,
    }

    #[odra::event]
    pub struct AccountFrozen {
        pub owner: Address,
        pub sub_account: u64,
    }

    #[odra::event]
    pub struct AccountUnfrozen {
        pub owner: Address,
        pub sub_account: u64,
    }
}

// ==========================================
// Contract
// ==========================================

#[odra::module(events = [
    events::CompanionLinked,
    events::TransferRequested,
    events::TransferCommitted,
    events::TransferCancelled,
    events::FullTransferAccepted,
    events::AccountFrozen,
    events::AccountUnfrozen
])]
pub struct PairController {
    admin: Var<Address>,
    staking: Var<Address>,
    transfer_handler: Var<Address>,
    mlp_vault: Var<Address>,
    mdn_vault: Var<Address>,
    async_coordinator: Var<Address>,

    // Companion links
    linked: Mapping<Address, bool>,

    // Freeze flags
    owner_frozen: Mapping<Address, bool>,
    account_frozen: Mapping<(Address, u64), bool>,
    frozen_accounts: Mapping<Address, u64>,

    // Transfer protocol, one live request per owner
    transfer_pending: Mapping<Address, bool>,
    transfer_recipient: Mapping<Address, Address>,
    expected_mlp: Mapping<Address, U256>,
    expected_mdn: Mapping<Address, U256>,
    has_transferred_once: Mapping<Address, bool>,
    has_accepted: Mapping<Address, bool>,

    vesting: SubModule<VestingTracker>,
}

#[odra::module]
impl PairController {
    // ==========================================
    // Initialization
    // ==========================================

    /// Initialize with the staking hub address and the trusted handler role
    pub fn init(&mut self, staking: Address, transfer_handler: Address) {
        self.admin.set(self.env().caller());
        self.staking.set(staking);
        self.transfer_handler.set(transfer_handler);
    }

    /// Register the vault pair (admin only, one shot)
    pub fn register_vaults(&mut self, mlp_vault: Address, mdn_vault: Address) {
        self.require_admin();
        if self.mlp_vault.get().is_some() {
            self.env().revert(PairVaultError::AlreadyConfigured);
        }
        self.mlp_vault.set(mlp_vault);
        self.mdn_vault.set(mdn_vault);
    }

    /// Register the async coordinator (admin only, one shot)
    pub fn set_async_coordinator(&mut self, coordinator: Address) {
        self.require_admin();
        if self.async_coordinator.get().is_some() {
            self.env().revert(PairVaultError::AlreadyConfigured);
        }
        self.async_coordinator.set(coordinator);
    }

    // ==========================================
    // Freeze Controller
    // ==========================================

    /// Whether the account is frozen, by the transfer protocol or an async
    /// operation. Both vaults consult this before mutating state.
    pub fn is_frozen(&self, owner: Address, sub_account: u64) -> bool {
        self.owner_frozen.get(&owner).unwrap_or_default()
            || self.account_frozen.get(&(owner, sub_account)).unwrap_or_default()
    }

    /// Whether the owner-level transfer freeze is set
    pub fn is_owner_frozen(&self, owner: Address) -> bool {
        self.owner_frozen.get(&owner).unwrap_or_default()
    }

    /// Number of sub-accounts frozen by async operations
    pub fn frozen_account_count(&self, owner: Address) -> u64 {
        self.frozen_accounts.get(&owner).unwrap_or_default()
    }

    /// Freeze or unfreeze a sub-account (async coordinator only)
    pub fn set_account_frozen(&mut self, owner: Address, sub_account: u64, frozen: bool) {
        if self.async_coordinator.get() != Some(self.env().caller()) {
            self.env().revert(PairVaultError::Unauthorized);
        }
        let current = self.account_frozen.get(&(owner, sub_account)).unwrap_or_default();
        if current == frozen {
            return;
        }
        self.account_frozen.set(&(owner, sub_account), frozen);
        let count = self.frozen_accounts.get(&owner).unwrap_or_default();
        if frozen {
            self.frozen_accounts.set(&owner, count + 1);
            self.env().emit_event(events::AccountFrozen { owner, sub_account });
        } else {
            self.frozen_accounts.set(&owner, count - 1);
            self.env().emit_event(events::AccountUnfrozen { owner, sub_account });
        }
    }

    // ==========================================
    // Companion links
    // ==========================================

    /// Establish the companion link for an owner (vaults only; idempotent)
    pub fn touch_link(&mut self, owner: Address) {
        self.require_vault();
        if !self.linked.get(&owner).unwrap_or_default() {
            self.linked.set(&owner, true);
            self.env().emit_event(events::CompanionLinked { owner });
        }
    }

    /// Whether the companion link exists for an owner
    pub fn has_link(&self, owner: Address) -> bool {
        self.linked.get(&owner).unwrap_or_default()
    }

    // ==========================================
    // Transfer Protocol
    // ==========================================

    /// Request migration of the caller's entire position to a recipient.
    /// Freezes both ledgers until the handler signals or the caller cancels.
    pub fn request_transfer(&mut self, recipient: Address) {
        let owner = self.env().caller();
        if self.has_transferred_once.get(&owner).unwrap_or_default() {
            self.env().revert(PairVaultError::AlreadyTransferredOnce);
        }
        if self.transfer_pending.get(&owner).unwrap_or_default() {
            self.env().revert(PairVaultError::TransferAlreadyInProgress);
        }
        if self.owner_frozen.get(&owner).unwrap_or_default()
            || self.frozen_accounts.get(&owner).unwrap_or_default() > 0
        {
            self.env().revert(PairVaultError::VaultFrozen);
        }

        let expected_mlp = self.mlp_ref().owner_total_of(owner);
        let expected_mdn = self.mdn_ref().owner_total_of(owner);
        self.expected_mlp.set(&owner, expected_mlp);
        self.expected_mdn.set(&owner, expected_mdn);
        self.transfer_recipient.set(&owner, recipient);
        self.transfer_pending.set(&owner, true);
        self.owner_frozen.set(&owner, true);

        self.env().emit_event(events::TransferRequested {
            owner,
            recipient,
            expected_mlp,
            expected_mdn,
        });
    }

    /// Commit or cancel a pending request (trusted handler only). The amounts
    /// are the handler's observation of the true external position; on a
    /// match the position is handed off, on a mismatch the request is
    /// cancelled so the owner can retry — never a revert.
    pub fn signal_transfer(&mut self, owner: Address, mlp_amount: U256, mdn_amount: U256) {
        if self.transfer_handler.get() != Some(self.env().caller()) {
            self.env().revert(PairVaultError::Unauthorized);
        }
        if !self.transfer_pending.get(&owner).unwrap_or_default() {
            self.env().revert(PairVaultError::TransferNotInProgress);
        }

        let recorded_mlp = self.mlp_ref().owner_total_of(owner);
        let recorded_mdn = self.mdn_ref().owner_total_of(owner);
        self.transfer_pending.set(&owner, false);
        self.owner_frozen.set(&owner, false);

        if recorded_mlp == mlp_amount && recorded_mdn == mdn_amount {
            let recipient = self
                .transfer_recipient
                .get(&owner)
                .unwrap_or_else(|| self.env().revert(PairVaultError::NotConfigured));
            self.staking_ref().transfer_account(owner, recipient);
            self.mlp_ref().clear_all_balances(owner);
            self.mdn_ref().clear_all_balances(owner);
            self.has_transferred_once.set(&owner, true);
            self.env().emit_event(events::TransferCommitted {
                owner,
                recipient,
                mlp_amount,
                mdn_amount,
            });
        } else {
            self.env().emit_event(events::TransferCancelled {
                owner,
                by_signal: true,
            });
        }
    }

    /// Cancel the caller's pending request. Fails loudly when the external
    /// position no longer matches what was recorded at request time.
    pub fn cancel_transfer(&mut self) {
        let owner = self.env().caller();
        if !self.transfer_pending.get(&owner).unwrap_or_default() {
            self.env().revert(PairVaultError::TransferNotInProgress);
        }

        let staking = self.staking_ref();
        let live_mlp = staking.staked_mlp_of(owner);
        let live_mdn = staking.staked_mdn_of(owner);
        if live_mlp != self.expected_mlp.get(&owner).unwrap_or_default()
            || live_mdn != self.expected_mdn.get(&owner).unwrap_or_default()
        {
            self.env().revert(PairVaultError::InvalidUnderlyingBalance);
        }

        self.transfer_pending.set(&owner, false);
        self.owner_frozen.set(&owner, false);
        self.env().emit_event(events::TransferCancelled {
            owner,
            by_signal: false,
        });
    }

    /// Accept a sender's entire external position into the caller's ledger
    /// pair. One shot per recipient; the sender must have approved the
    /// hand-off in the staking hub beforehand.
    pub fn accept_full_account_transfer(&mut self, sender: Option<Address>) {
        let recipient = self.env().caller();
        let sender = match sender {
            Some(s) if s != recipient => s,
            _ => self.env().revert(PairVaultError::InvalidSender),
        };
        if self.has_accepted.get(&recipient).unwrap_or_default() {
            self.env().revert(PairVaultError::AlreadyAccepted);
        }
        if self.owner_frozen.get(&recipient).unwrap_or_default()
            || self.frozen_accounts.get(&recipient).unwrap_or_default() > 0
        {
            self.env().revert(PairVaultError::VaultFrozen);
        }
        self.has_accepted.set(&recipient, true);
        if !self.linked.get(&recipient).unwrap_or_default() {
            self.linked.set(&recipient, true);
            self.env().emit_event(events::CompanionLinked { owner: recipient });
        }

        let mut staking = self.staking_ref();
        let mlp_amount = staking.staked_mlp_of(sender);
        let mdn_amount = staking.staked_mdn_of(sender);
        staking.accept_transfer(sender, recipient);

        if mlp_amount > U256::zero() {
            self.mlp_ref().controller_credit(recipient, mlp_amount);
        }
        let mut mdn_vault = self.mdn_ref();
        if mdn_vault.is_synced(recipient) {
            if mdn_amount > U256::zero() {
                mdn_vault.controller_credit(recipient, mdn_amount);
            }
        } else {
            mdn_vault.sync(recipient);
        }

        self.env().emit_event(events::FullTransferAccepted {
            sender,
            recipient,
            mlp_amount,
            mdn_amount,
        });
    }

    // ==========================================
    // Vesting Tracker
    // ==========================================

    /// Record a vesting commitment (Ledger A only)
    pub fn record_vest(&mut self, owner: Address, amount: U256, pair_amount: U256) {
        self.require_mlp_vault();
        self.vesting.record(owner, amount, pair_amount);
    }

    /// Settle the owner's vesting commitment (Ledger A only)
    pub fn settle_vest(&mut self, owner: Address) {
        self.require_mlp_vault();
        self.vesting.settle(owner);
    }

    /// The owner's recorded vesting position
    pub fn vesting_position_of(&self, owner: Address) -> VestingPosition {
        self.vesting.position_of(owner)
    }

    // ==========================================
    // View Functions
    // ==========================================

    /// Whether a transfer request is pending for an owner
    pub fn is_transfer_pending(&self, owner: Address) -> bool {
        self.transfer_pending.get(&owner).unwrap_or_default()
    }

    /// Whether the owner has completed the one-shot outbound transfer
    pub fn has_transferred(&self, owner: Address) -> bool {
        self.has_transferred_once.get(&owner).unwrap_or_default()
    }

    /// Whether the recipient has consumed the one-shot inbound acceptance
    pub fn has_accepted_transfer(&self, recipient: Address) -> bool {
        self.has_accepted.get(&recipient).unwrap_or_default()
    }

    /// The trusted handler role
    pub fn transfer_handler(&self) -> Option<Address> {
        self.transfer_handler.get()
    }

    /// The registered Ledger A vault
    pub fn mlp_vault(&self) -> Option<Address> {
        self.mlp_vault.get()
    }

    /// The registered Ledger B vault
    pub fn mdn_vault(&self) -> Option<Address> {
        self.mdn_vault.get()
    }

    // ==========================================
    // Internal Functions
    // ==========================================

    fn require_admin(&self) {
        if self.admin.get() != Some(self.env().caller()) {
            self.env().revert(PairVaultError::Unauthorized);
        }
    }

    fn require_vault(&self) {
        let caller = self.env().caller();
        if self.mlp_vault.get() != Some(caller) && self.mdn_vault.get() != Some(caller) {
            self.env().revert(PairVaultError::Unauthorized);
        }
    }

    fn require_mlp_vault(&self) {
        if self.mlp_vault.get() != Some(self.env().caller()) {
            self.env().revert(PairVaultError::Unauthorized);
        }
    }

    fn mlp_ref(&self) -> MlpVaultContractRef {
        let addr = self.mlp_vault.get().unwrap_or_else(|| {
            self.env().revert(PairVaultError::NotConfigured)
        });
        MlpVaultContractRef::new(self.env().clone(), addr)
    }

    fn mdn_ref(&self) -> MdnVaultContractRef {
        let addr = self.mdn_vault.get().unwrap_or_else(|| {
            self.env().revert(PairVaultError::NotConfigured)
        });
        MdnVaultContractRef::new(self.env().clone(), addr)
    }

    fn staking_ref(&self) -> MeridianStakingContractRef {
        let addr = self.staking.get().unwrap_or_else(|| {
            self.env().revert(PairVaultError::NotConfigured)
        });
        MeridianStakingContractRef::new(self.env().clone(), addr)
    }
}
