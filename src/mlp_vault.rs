//! MlpVault — Ledger A
//!
//! Tracks each owner's staked MLP principal and custodies the Meridian
//! position for the whole pair. Every Meridian primitive routes through this
//! vault: MLP staking round trips, the reward batch, the vester, and the
//! async request entry points. MDN legs initiated by the companion MdnVault
//! arrive through identity-checked companion entry points.
//!
//! Per-account balances are keyed (owner, generation, sub-account); a
//! committed account hand-off bumps the generation instead of walking the
//! sub-account space.
//!
//! ## Units
//! - MLP/MDN: wad (U256), 18 decimals
//! - Native rewards: motes (U512)

use alloc::vec::Vec;
use odra::casper_types::{U256, U512};
use odra::prelude::*;
use odra::ContractRef;
use crate::async_ops::{AsyncCoordinatorContractRef, RequestKind};
use crate::errors::PairVaultError;
use crate::margin_external::MarginEngineContractRef;
use crate::mdn_vault::MdnVaultContractRef;
use crate::meridian::MeridianStakingContractRef;
use crate::pair_controller::PairControllerContractRef;
use crate::tokens::{MdnTokenContractRef, MlpTokenContractRef};
use crate::vesting::VestingPosition;

// ==========================================
// Events
// ==========================================

pub mod events {
    use odra::casper_types::{U256, U512};
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
    pub struct RewardsHandled {
        pub owner: Address,
        pub gov_claimed: U256,
        pub gov_staked: bool,
        pub native_claimed: U512,
        pub native_deposited: bool,
    }

    #[odra::event]
    pub struct VestStarted {
        pub owner: Address,
        pub amount: U256,
    }

    #[odra::event]
    pub struct VestSettled {
        pub owner: Address,
        pub converted: U256,
        pub restaked: bool,
    }

    #[odra::event]
    pub struct AsyncDepositRequested {
        pub owner: Address,
        pub sub_account: u64,
        pub amount: U256,
        pub request_id: u64,
    }

    #[odra::event]
    pub struct AsyncWithdrawalRequested {
        pub owner: Address,
        pub sub_account: u64,
        pub amount: U256,
        pub request_id: u64,
    }
}

// ==========================================
// Contract
// ==========================================

#[odra::module(events = [
    events::Deposited,
    events::Withdrawn,
    events::RewardsHandled,
    events::VestStarted,
    events::VestSettled,
    events::AsyncDepositRequested,
    events::AsyncWithdrawalRequested
])]
pub struct MlpVault {
    admin: Var<Address>,
    controller: Var<Address>,
    staking: Var<Address>,
    mlp_token: Var<Address>,
    mdn_token: Var<Address>,
    margin_engine: Var<Address>,
    companion: Var<Address>,
    coordinator: Var<Address>,

    locked: Var<bool>,

    generation: Mapping<Address, u32>,
    balances: Mapping<(Address, u32, u64), U256>,
    owner_total: Mapping<Address, U256>,

    // Claimed MDN held here until staked or swept into the companion ledger
    unswept_gov: Mapping<Address, U256>,

    // MLP escrowed for a pending async deposit
    async_escrow: Mapping<(Address, u64), U256>,
}

#[odra::module]
impl MlpVault {
    // ==========================================
    // Initialization
    // ==========================================

    /// Initialize the vault
    pub fn init(
        &mut self,
        controller: Address,
        staking: Address,
        mlp_token: Address,
        mdn_token: Address,
        margin_engine: Address,
    ) {
        self.admin.set(self.env().caller());
        self.controller.set(controller);
        self.staking.set(staking);
        self.mlp_token.set(mlp_token);
        self.mdn_token.set(mdn_token);
        self.margin_engine.set(margin_engine);
    }

    /// Set the companion MdnVault (admin only, one shot)
    pub fn set_companion(&mut self, companion: Address) {
        self.require_admin();
        if self.companion.get().is_some() {
            self.env().revert(PairVaultError::AlreadyConfigured);
        }
        self.companion.set(companion);
    }

    /// Set the async coordinator (admin only, one shot)
    pub fn set_coordinator(&mut self, coordinator: Address) {
        self.require_admin();
        if self.coordinator.get().is_some() {
            self.env().revert(PairVaultError::AlreadyConfigured);
        }
        self.coordinator.set(coordinator);
    }

    // ==========================================
    // User Functions
    // ==========================================

    /// Deposit MLP into a sub-account: the tokens are pulled from the caller,
    /// staked in Meridian under the caller's key, and tracked here.
    pub fn deposit(&mut self, sub_account: u64, amount: U256) {
        self.enter_guard();
        let owner = self.env().caller();
        self.require_not_frozen(owner, sub_account);
        if amount == U256::zero() {
            self.env().revert(PairVaultError::ZeroAmount);
        }

        self.controller_ref().touch_link(owner);

        let self_address = self.env().self_address();
        self.mlp_ref().transfer_from(owner, self_address, amount);
        self.stake_principal(owner, amount);
        self.credit(owner, sub_account, amount);

        self.env().emit_event(events::Deposited {
            owner,
            sub_account,
            amount,
        });
        self.exit_guard();
    }

    /// Withdraw MLP from a sub-account: unstaked from Meridian and sent to
    /// the caller. Principal reserved by an active vest cannot leave.
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

        self.staking_ref().unstake_mlp(owner, amount);
        self.mlp_ref().transfer(owner, amount);
        self.debit(owner, sub_account, amount);

        self.env().emit_event(events::Withdrawn {
            owner,
            sub_account,
            amount,
        });
        self.exit_guard();
    }

    /// Batch reward handling over the Meridian primitives, with the native
    /// deposit routed to margin sub-account 0.
    pub fn handle_rewards(
        &mut self,
        claim_gov: bool,
        stake_gov: bool,
        claim_esc: bool,
        stake_esc: bool,
        convert_vested_gov: bool,
        claim_native: bool,
        deposit_native_if_claiming: bool,
    ) {
        self.handle_rewards_with_account(
            0,
            claim_gov,
            stake_gov,
            claim_esc,
            stake_esc,
            convert_vested_gov,
            claim_native,
            deposit_native_if_claiming,
        );
    }

    /// Batch reward handling with an explicit margin sub-account for the
    /// native deposit. All seven toggles are independent except that
    /// depositing native rewards requires claiming them in the same call;
    /// each toggle is a no-op when the corresponding balance is zero.
    pub fn handle_rewards_with_account(
        &mut self,
        deposit_account_number: u64,
        claim_gov: bool,
        stake_gov: bool,
        claim_esc: bool,
        stake_esc: bool,
        convert_vested_gov: bool,
        claim_native: bool,
        deposit_native_if_claiming: bool,
    ) {
        self.enter_guard();
        let owner = self.env().caller();
        self.require_not_frozen(owner, deposit_account_number);
        if deposit_native_if_claiming && !claim_native {
            self.env().revert(PairVaultError::NativeDepositWithoutClaim);
        }

        let mut staking = self.staking_ref();

        let mut gov_claimed = U256::zero();
        if claim_gov {
            gov_claimed += staking.claim_mdn(owner);
        }
        if convert_vested_gov {
            gov_claimed += staking.claim_vested(owner);
            // A fully matured position closes in the hub; settle the tracker
            if staking.vest_amount_of(owner) == U256::zero() {
                self.controller_ref().settle_vest(owner);
            }
        }
        if stake_gov {
            let unswept = self.unswept_gov.get(&owner).unwrap_or_default();
            let total = gov_claimed + unswept;
            if total > U256::zero() {
                self.unswept_gov.set(&owner, U256::zero());
                self.stake_gov_for(owner, total);
            }
        } else if gov_claimed > U256::zero() {
            let unswept = self.unswept_gov.get(&owner).unwrap_or_default();
            self.unswept_gov.set(&owner, unswept + gov_claimed);
        }

        if claim_esc {
            staking.claim_esc(owner);
        }
        if stake_esc {
            let esc = staking.esc_balance_of(owner);
            if esc > U256::zero() {
                staking.stake_esc(owner, esc);
            }
        }

        let mut native_claimed = U512::zero();
        if claim_native {
            native_claimed = staking.claim_native(owner);
            if native_claimed > U512::zero() {
                if deposit_native_if_claiming {
                    self.margin_ref()
                        .with_tokens(native_claimed)
                        .deposit_native(owner, deposit_account_number);
                } else {
                    self.env().transfer_tokens(&owner, &native_claimed);
                }
            }
        }

        self.env().emit_event(events::RewardsHandled {
            owner,
            gov_claimed,
            gov_staked: stake_gov,
            native_claimed,
            native_deposited: deposit_native_if_claiming,
        });
        self.exit_guard();
    }

    /// Commit escrowed MDN to the time-locked conversion, reserving the same
    /// amount of staked principal as the pair. `vest(0)` is a no-op.
    pub fn vest(&mut self, amount: U256) {
        self.enter_guard();
        let owner = self.env().caller();
        self.require_not_frozen(owner, 0);
        if amount == U256::zero() {
            self.exit_guard();
            return;
        }

        self.staking_ref().vest(owner, amount);
        self.controller_ref().record_vest(owner, amount, amount);

        self.env().emit_event(events::VestStarted { owner, amount });
        self.exit_guard();
    }

    /// Settle the active vest: matured MDN is re-staked (and mirrored on the
    /// companion ledger) or paid to the caller's wallet; the unmatured
    /// remainder returns to staked escrow. A no-op when nothing is vesting.
    pub fn unvest(&mut self, stake_gov: bool) {
        self.enter_guard();
        let owner = self.env().caller();
        self.require_not_frozen(owner, 0);

        let outcome = self.staking_ref().unvest(owner);
        if outcome.converted > U256::zero() {
            if stake_gov {
                self.stake_gov_for(owner, outcome.converted);
            } else {
                self.mdn_ref().transfer(owner, outcome.converted);
            }
        }
        self.controller_ref().settle_vest(owner);

        self.env().emit_event(events::VestSettled {
            owner,
            converted: outcome.converted,
            restaked: stake_gov,
        });
        self.exit_guard();
    }

    /// Request an asynchronous deposit: the MLP is escrowed here and the
    /// account frozen until the keeper's callback settles or fails it.
    pub fn request_async_deposit(
        &mut self,
        sub_account: u64,
        amount: U256,
        min_output: U256,
        extra_data: Vec<u8>,
    ) {
        self.enter_guard();
        let owner = self.env().caller();
        self.require_not_frozen(owner, sub_account);
        if amount == U256::zero() {
            self.env().revert(PairVaultError::ZeroAmount);
        }

        let self_address = self.env().self_address();
        self.mlp_ref().transfer_from(owner, self_address, amount);
        let escrow = self.async_escrow.get(&(owner, sub_account)).unwrap_or_default();
        self.async_escrow.set(&(owner, sub_account), escrow + amount);

        let request_id = self.coordinator_ref().create_request(
            owner,
            sub_account,
            RequestKind::Deposit,
            amount,
            min_output,
            extra_data,
        );

        self.env().emit_event(events::AsyncDepositRequested {
            owner,
            sub_account,
            amount,
            request_id,
        });
        self.exit_guard();
    }

    /// Request an asynchronous withdrawal; nothing is debited until the
    /// keeper's callback succeeds.
    pub fn request_async_withdrawal(
        &mut self,
        sub_account: u64,
        amount: U256,
        min_output: U256,
        extra_data: Vec<u8>,
    ) {
        self.enter_guard();
        let owner = self.env().caller();
        self.require_not_frozen(owner, sub_account);
        if amount == U256::zero() {
            self.env().revert(PairVaultError::ZeroAmount);
        }
        if self.balance_of(owner, sub_account) < amount {
            self.env().revert(PairVaultError::InsufficientBalance);
        }

        let request_id = self.coordinator_ref().create_request(
            owner,
            sub_account,
            RequestKind::Withdrawal,
            amount,
            min_output,
            extra_data,
        );

        self.env().emit_event(events::AsyncWithdrawalRequested {
            owner,
            sub_account,
            amount,
            request_id,
        });
        self.exit_guard();
    }

    // ==========================================
    // Companion entry points (MdnVault identity only)
    // ==========================================

    /// Stake MDN the companion has just moved here for an owner
    pub fn companion_stake_gov(&mut self, owner: Address, amount: U256) {
        self.require_companion();
        self.stake_gov_raw(owner, amount);
    }

    /// Unstake an owner's MDN and hand the tokens back to the companion
    pub fn companion_unstake_gov(&mut self, owner: Address, amount: U256) {
        self.require_companion();
        self.staking_ref().unstake_mdn(owner, amount);
        let companion = self.companion.get().expect("companion not set");
        self.mdn_ref().transfer(companion, amount);
    }

    /// Stake any MDN that has accumulated here for the owner, returning the
    /// amount for the companion ledger to credit. Zero is a no-op.
    pub fn companion_sweep(&mut self, owner: Address) -> U256 {
        self.require_companion();
        let amount = self.unswept_gov.get(&owner).unwrap_or_default();
        if amount == U256::zero() {
            return U256::zero();
        }
        self.unswept_gov.set(&owner, U256::zero());
        self.stake_gov_raw(owner, amount);
        amount
    }

    // ==========================================
    // Controller entry points
    // ==========================================

    /// Credit an owner's default sub-account (controller only)
    pub fn controller_credit(&mut self, owner: Address, amount: U256) {
        self.require_controller();
        self.credit(owner, 0, amount);
    }

    /// Drop every sub-account balance for an owner after a committed
    /// hand-off; unswept MDN is returned to the departing owner's wallet.
    pub fn clear_all_balances(&mut self, owner: Address) {
        self.require_controller();
        let unswept = self.unswept_gov.get(&owner).unwrap_or_default();
        if unswept > U256::zero() {
            self.unswept_gov.set(&owner, U256::zero());
            self.mdn_ref().transfer(owner, unswept);
        }
        let generation = self.generation.get(&owner).unwrap_or_default();
        self.generation.set(&owner, generation + 1);
        self.owner_total.set(&owner, U256::zero());
    }

    // ==========================================
    // Coordinator entry points
    // ==========================================

    /// Stake the escrow of an executed async deposit and credit the account
    pub fn settle_async_deposit(&mut self, owner: Address, sub_account: u64, amount: U256) {
        self.require_coordinator();
        let escrow = self.async_escrow.get(&(owner, sub_account)).unwrap_or_default();
        if escrow < amount {
            self.env().revert(PairVaultError::InsufficientBalance);
        }
        self.async_escrow.set(&(owner, sub_account), escrow - amount);
        self.stake_principal(owner, amount);
        self.credit(owner, sub_account, amount);
    }

    /// Unstake and pay out an executed async withdrawal
    pub fn settle_async_withdrawal(
        &mut self,
        owner: Address,
        sub_account: u64,
        amount: U256,
        recipient: Address,
    ) {
        self.require_coordinator();
        if self.balance_of(owner, sub_account) < amount {
            self.env().revert(PairVaultError::InsufficientBalance);
        }
        self.staking_ref().unstake_mlp(owner, amount);
        self.mlp_ref().transfer(recipient, amount);
        self.debit(owner, sub_account, amount);
    }

    /// Return the escrow of a failed async deposit to the owner
    pub fn refund_async_deposit(&mut self, owner: Address, sub_account: u64) {
        self.require_coordinator();
        let escrow = self.async_escrow.get(&(owner, sub_account)).unwrap_or_default();
        if escrow > U256::zero() {
            self.async_escrow.set(&(owner, sub_account), U256::zero());
            self.mlp_ref().transfer(owner, escrow);
        }
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

    /// MDN claimed for an owner but not yet staked or swept
    pub fn unswept_gov_of(&self, owner: Address) -> U256 {
        self.unswept_gov.get(&owner).unwrap_or_default()
    }

    /// MLP escrowed for a pending async deposit
    pub fn escrow_of(&self, owner: Address, sub_account: u64) -> U256 {
        self.async_escrow.get(&(owner, sub_account)).unwrap_or_default()
    }

    /// Freeze state as reported by the shared controller
    pub fn is_frozen(&self, owner: Address, sub_account: u64) -> bool {
        self.controller_ref().is_frozen(owner, sub_account)
    }

    /// The owner's recorded vesting position
    pub fn vesting_position_of(&self, owner: Address) -> VestingPosition {
        self.controller_ref().vesting_position_of(owner)
    }

    /// The companion MdnVault
    pub fn companion(&self) -> Option<Address> {
        self.companion.get()
    }

    /// The async coordinator
    pub fn coordinator(&self) -> Option<Address> {
        self.coordinator.get()
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

    fn require_coordinator(&self) {
        if self.coordinator.get() != Some(self.env().caller()) {
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

    /// Approve and stake MLP held by this vault under the owner's key
    fn stake_principal(&mut self, owner: Address, amount: U256) {
        let staking = self.staking.get().expect("staking not set");
        self.mlp_ref().approve(staking, amount);
        self.staking_ref().stake_mlp(owner, amount);
    }

    /// Approve and stake MDN held by this vault under the owner's key
    fn stake_gov_raw(&mut self, owner: Address, amount: U256) {
        let staking = self.staking.get().expect("staking not set");
        self.mdn_ref().approve(staking, amount);
        self.staking_ref().stake_mdn(owner, amount);
    }

    /// Stake MDN and mirror the increase on the companion ledger
    fn stake_gov_for(&mut self, owner: Address, amount: U256) {
        self.stake_gov_raw(owner, amount);
        self.companion_ref().companion_credit(owner, amount);
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

    fn mlp_ref(&self) -> MlpTokenContractRef {
        let addr = self.mlp_token.get().expect("MLP token not set");
        MlpTokenContractRef::new(self.env().clone(), addr)
    }

    fn mdn_ref(&self) -> MdnTokenContractRef {
        let addr = self.mdn_token.get().expect("MDN token not set");
        MdnTokenContractRef::new(self.env().clone(), addr)
    }

    fn companion_ref(&self) -> MdnVaultContractRef {
        let addr = self.companion.get().expect("companion not set");
        MdnVaultContractRef::new(self.env().clone(), addr)
    }

    fn coordinator_ref(&self) -> AsyncCoordinatorContractRef {
        let addr = self.coordinator.get().expect("coordinator not set");
        AsyncCoordinatorContractRef::new(self.env().clone(), addr)
    }

    fn margin_ref(&self) -> MarginEngineContractRef {
        let addr = self.margin_engine.get().expect("margin engine not set");
        MarginEngineContractRef::new(self.env().clone(), addr)
    }
}
