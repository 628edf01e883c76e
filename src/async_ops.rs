//! Async Operation Coordinator
//!
//! Deposits and withdrawals of the MLP principal that need a keeper with
//! fresh price data are recorded here as requests. Creating a request
//! freezes the affected sub-account; the keeper's callback consumes the
//! request exactly once and resolves it Executed or Failed. Application-level
//! failure never reverts the keeper's transaction.
//!
//! The extra-data payload attached to a request is bounded at creation time:
//! it must decode to exactly two 32-byte fields (an output floor and a
//! routing parameter). Anything else is rejected before a request exists, so
//! an oversized payload can never reach the callback and strand the account
//! frozen.
//!
//! Liquidators use `prepare_for_liquidation` to convert a frozen,
//! undercollateralized account's stuck request into a fresh withdrawal
//! request whose proceeds settle to the margin engine.

use alloc::vec::Vec;
use odra::casper_types::U256;
use odra::prelude::*;
use odra::ContractRef;
use crate::errors::PairVaultError;
use crate::margin_external::MarginEngineContractRef;
use crate::mlp_vault::MlpVaultContractRef;
use crate::meridian::MeridianStakingContractRef;
use crate::pair_controller::PairControllerContractRef;

/// Exact byte length of a valid extra-data payload: two 32-byte fields
pub const EXTRA_DATA_LEN: usize = 64;

// ==========================================
// Events
// ==========================================

pub mod events {
    use odra::casper_types::U256;
    use odra::prelude::*;

    #[odra::event]
    pub struct AsyncRequestCreated {
        pub request_id: u64,
        pub owner: Address,
        pub sub_account: u64,
        pub is_withdrawal: bool,
        pub amount: U256,
    }

    #[odra::event]
    pub struct AsyncRequestExecuted {
        pub request_id: u64,
        pub output_amount: U256,
    }

    #[odra::event]
    pub struct AsyncRequestFailed {
        pub request_id: u64,
        pub output_amount: U256,
    }

    #[odra::event]
    pub struct LiquidationPrepared {
        pub request_id: u64,
        pub owner: Address,
        pub sub_account: u64,
        pub superseded_request: bool,
    }
}

// ==========================================
// Types
// ==========================================

/// Direction of an async operation
#[odra::odra_type]
#[derive(Default)]
pub enum RequestKind {
    #[default]
    Deposit = 0,
    Withdrawal = 1,
}

/// Lifecycle of an async request (terminal once resolved)
#[odra::odra_type]
#[derive(Default)]
pub enum RequestStatus {
    #[default]
    Pending = 0,
    Executed = 1,
    Failed = 2,
}

/// A recorded async operation
#[odra::odra_type]
pub struct AsyncRequest {
    pub owner: Address,
    pub sub_account: u64,
    pub kind: RequestKind,
    pub amount: U256,
    pub min_output: U256,
    pub floor_output: U256,
    pub routing_key: U256,
    pub expiration: u64,
    pub for_liquidation: bool,
    pub status: RequestStatus,
}

// ==========================================
// Contract
// ==========================================

#[odra::module(events = [
    events::AsyncRequestCreated,
    events::AsyncRequestExecuted,
    events::AsyncRequestFailed,
    events::LiquidationPrepared
])]
pub struct AsyncCoordinator {
    admin: Var<Address>,
    controller: Var<Address>,
    mlp_vault: Var<Address>,
    staking: Var<Address>,
    margin_engine: Var<Address>,
    keeper: Var<Address>,
    liquidator: Var<Address>,

    requests: Mapping<u64, AsyncRequest>,
    next_request_id: Var<u64>,

    // At most one live request per account; freeze blocks creating a second
    active_request: Mapping<(Address, u64), u64>,
    has_active: Mapping<(Address, u64), bool>,
}

#[odra::module]
impl AsyncCoordinator {
    // ==========================================
    // Initialization
    // ==========================================

    /// Initialize the coordinator with its collaborators and roles
    pub fn init(
        &mut self,
        controller: Address,
        mlp_vault: Address,
        staking: Address,
        margin_engine: Address,
        keeper: Address,
        liquidator: Address,
    ) {
        self.admin.set(self.env().caller());
        self.controller.set(controller);
        self.mlp_vault.set(mlp_vault);
        self.staking.set(staking);
        self.margin_engine.set(margin_engine);
        self.keeper.set(keeper);
        self.liquidator.set(liquidator);
        self.next_request_id.set(1);
    }

    // ==========================================
    // Request creation (vault identity only)
    // ==========================================

    /// Record a pending request and freeze the account. The extra-data
    /// payload is validated here, never at callback time.
    pub fn create_request(
        &mut self,
        owner: Address,
        sub_account: u64,
        kind: RequestKind,
        amount: U256,
        min_output: U256,
        extra_data: Vec<u8>,
    ) -> u64 {
        if self.mlp_vault.get() != Some(self.env().caller()) {
            self.env().revert(PairVaultError::Unauthorized);
        }
        let (floor_output, routing_key) = self.decode_extra_data(&extra_data);
        if amount == U256::zero() {
            self.env().revert(PairVaultError::ZeroAmount);
        }

        let is_withdrawal = kind == RequestKind::Withdrawal;
        let request_id = self.store_request(AsyncRequest {
            owner,
            sub_account,
            kind,
            amount,
            min_output,
            floor_output,
            routing_key,
            expiration: 0,
            for_liquidation: false,
            status: RequestStatus::Pending,
        });
        self.controller_ref().set_account_frozen(owner, sub_account, true);

        self.env().emit_event(events::AsyncRequestCreated {
            request_id,
            owner,
            sub_account,
            is_withdrawal,
            amount,
        });
        request_id
    }

    // ==========================================
    // Keeper callback
    // ==========================================

    /// Consume a pending request exactly once. Output below the acceptable
    /// floor, an expired liquidation window, an account that regained
    /// collateral, or an unsatisfiable unstake all resolve the request as
    /// Failed and unfreeze the account — the keeper's transaction succeeds
    /// either way.
    pub fn execute_callback(&mut self, request_id: u64, output_amount: U256) {
        if self.keeper.get() != Some(self.env().caller()) {
            self.env().revert(PairVaultError::Unauthorized);
        }
        let mut request = match self.requests.get(&request_id) {
            Some(r) => r,
            None => self.env().revert(PairVaultError::RequestNotPending),
        };
        if request.status != RequestStatus::Pending {
            self.env().revert(PairVaultError::RequestNotPending);
        }

        if !self.callback_can_execute(&request, output_amount) {
            request.status = RequestStatus::Failed;
            self.requests.set(&request_id, request.clone());
            self.resolve_account(&request);
            if request.kind == RequestKind::Deposit {
                self.vault_ref().refund_async_deposit(request.owner, request.sub_account);
            }
            self.env().emit_event(events::AsyncRequestFailed {
                request_id,
                output_amount,
            });
            return;
        }

        match request.kind {
            RequestKind::Deposit => {
                self.vault_ref().settle_async_deposit(
                    request.owner,
                    request.sub_account,
                    request.amount,
                );
            }
            RequestKind::Withdrawal => {
                let recipient = if request.for_liquidation {
                    self.margin_engine.get().expect("margin engine not set")
                } else {
                    request.owner
                };
                self.vault_ref().settle_async_withdrawal(
                    request.owner,
                    request.sub_account,
                    request.amount,
                    recipient,
                );
            }
        }
        request.status = RequestStatus::Executed;
        self.requests.set(&request_id, request.clone());
        self.resolve_account(&request);

        self.env().emit_event(events::AsyncRequestExecuted {
            request_id,
            output_amount,
        });
    }

    // ==========================================
    // Liquidation preparation (liquidator role only)
    // ==========================================

    /// Convert a frozen, undercollateralized account into a fresh withdrawal
    /// request for the keeper. The stuck request, if any, is failed and its
    /// escrow refunded; the account stays frozen for the new request. The
    /// acceptable output is the worst case of the caller's minimum and the
    /// payload's floor field.
    pub fn prepare_for_liquidation(
        &mut self,
        owner: Address,
        sub_account: u64,
        input_amount: U256,
        min_output_amount: U256,
        expiration_timestamp: u64,
        extra_data: Vec<u8>,
    ) -> u64 {
        if self.liquidator.get() != Some(self.env().caller()) {
            self.env().revert(PairVaultError::Unauthorized);
        }
        let (floor_output, routing_key) = self.decode_extra_data(&extra_data);

        let controller = self.controller_ref();
        if !controller.is_frozen(owner, sub_account) {
            self.env().revert(PairVaultError::AccountNotFrozen);
        }
        if !self.margin_ref().is_account_undercollateralized(owner, sub_account) {
            self.env().revert(PairVaultError::AccountNotLiquidatable);
        }
        if expiration_timestamp <= self.env().get_block_time() {
            self.env().revert(PairVaultError::InvalidExpiration);
        }
        if input_amount == U256::zero() {
            self.env().revert(PairVaultError::ZeroAmount);
        }
        if self.vault_ref().balance_of(owner, sub_account) < input_amount {
            self.env().revert(PairVaultError::InsufficientBalance);
        }

        let superseded = self.supersede_active(owner, sub_account);

        let request_id = self.store_request(AsyncRequest {
            owner,
            sub_account,
            kind: RequestKind::Withdrawal,
            amount: input_amount,
            min_output: min_output_amount,
            floor_output,
            routing_key,
            expiration: expiration_timestamp,
            for_liquidation: true,
            status: RequestStatus::Pending,
        });
        self.controller_ref().set_account_frozen(owner, sub_account, true);

        self.env().emit_event(events::LiquidationPrepared {
            request_id,
            owner,
            sub_account,
            superseded_request: superseded,
        });
        request_id
    }

    // ==========================================
    // View Functions
    // ==========================================

    /// A stored request by handle
    pub fn request_of(&self, request_id: u64) -> Option<AsyncRequest> {
        self.requests.get(&request_id)
    }

    /// The live request handle for an account, if any
    pub fn active_request_of(&self, owner: Address, sub_account: u64) -> Option<u64> {
        if self.has_active.get(&(owner, sub_account)).unwrap_or_default() {
            self.active_request.get(&(owner, sub_account))
        } else {
            None
        }
    }

    /// The keeper role
    pub fn keeper(&self) -> Option<Address> {
        self.keeper.get()
    }

    /// The liquidator role
    pub fn liquidator(&self) -> Option<Address> {
        self.liquidator.get()
    }

    // ==========================================
    // Internal Functions
    // ==========================================

    /// Exactly two 32-byte big-endian fields; any other length is rejected
    /// before a request exists.
    fn decode_extra_data(&self, raw: &[u8]) -> (U256, U256) {
        if raw.len() != EXTRA_DATA_LEN {
            self.env().revert(PairVaultError::InvalidExtraData);
        }
        let floor = U256::from_big_endian(&raw[0..32]);
        let routing = U256::from_big_endian(&raw[32..64]);
        (floor, routing)
    }

    fn store_request(&mut self, request: AsyncRequest) -> u64 {
        let request_id = self.next_request_id.get_or_default();
        self.next_request_id.set(request_id + 1);
        self.active_request
            .set(&(request.owner, request.sub_account), request_id);
        self.has_active.set(&(request.owner, request.sub_account), true);
        self.requests.set(&request_id, request);
        request_id
    }

    /// Unfreeze and clear the active marker once a request is terminal
    fn resolve_account(&mut self, request: &AsyncRequest) {
        self.has_active
            .set(&(request.owner, request.sub_account), false);
        self.controller_ref()
            .set_account_frozen(request.owner, request.sub_account, false);
    }

    /// Application-level feasibility of a callback; false means Failed, not
    /// a revert.
    fn callback_can_execute(&self, request: &AsyncRequest, output_amount: U256) -> bool {
        let required = if request.min_output > request.floor_output {
            request.min_output
        } else {
            request.floor_output
        };
        if output_amount < required {
            return false;
        }
        if request.for_liquidation {
            if self.env().get_block_time() > request.expiration {
                return false;
            }
            if !self
                .margin_ref()
                .is_account_undercollateralized(request.owner, request.sub_account)
            {
                return false;
            }
        }
        if request.kind == RequestKind::Withdrawal {
            if self.vault_ref().balance_of(request.owner, request.sub_account) < request.amount {
                return false;
            }
            if self.staking_ref().unreserved_mlp_of(request.owner) < request.amount {
                return false;
            }
        }
        true
    }

    /// Fail the account's live request, refunding any deposit escrow. The
    /// freeze stays in place for the request that replaces it.
    fn supersede_active(&mut self, owner: Address, sub_account: u64) -> bool {
        if !self.has_active.get(&(owner, sub_account)).unwrap_or_default() {
            return false;
        }
        let request_id = self
            .active_request
            .get(&(owner, sub_account))
            .unwrap_or_default();
        let mut request = match self.requests.get(&request_id) {
            Some(r) => r,
            None => return false,
        };
        if request.status != RequestStatus::Pending {
            return false;
        }
        request.status = RequestStatus::Failed;
        let is_deposit = request.kind == RequestKind::Deposit;
        self.requests.set(&request_id, request);
        self.has_active.set(&(owner, sub_account), false);
        if is_deposit {
            self.vault_ref().refund_async_deposit(owner, sub_account);
        }
        self.env().emit_event(events::AsyncRequestFailed {
            request_id,
            output_amount: U256::zero(),
        });
        true
    }

    // ==========================================
    // Contract references
    // ==========================================

    fn controller_ref(&self) -> PairControllerContractRef {
        let addr = self.controller.get().expect("controller not set");
        PairControllerContractRef::new(self.env().clone(), addr)
    }

    fn vault_ref(&self) -> MlpVaultContractRef {
        let addr = self.mlp_vault.get().expect("vault not set");
        MlpVaultContractRef::new(self.env().clone(), addr)
    }

    fn staking_ref(&self) -> MeridianStakingContractRef {
        let addr = self.staking.get().expect("staking not set");
        MeridianStakingContractRef::new(self.env().clone(), addr)
    }

    fn margin_ref(&self) -> MarginEngineContractRef {
        let addr = self.margin_engine.get().expect("margin engine not set");
        MarginEngineContractRef::new(self.env().clone(), addr)
    }
}
