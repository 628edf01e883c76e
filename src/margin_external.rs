//! Margin Engine External Contract Interface
//!
//! The margin/collateralization engine is an external collaborator. This
//! module defines the narrow interface the Tandem contracts consume from it,
//! plus a deployable stub for tests and demos.

use odra::casper_types::U512;
use odra::prelude::*;

/// Margin Engine External Contract Interface
///
/// The engine decides solvency; the Tandem contracts only ever ask whether an
/// account is undercollateralized and forward claimed native rewards into it.
#[odra::external_contract]
pub trait MarginEngine {
    /// Whether the given (owner, sub-account) is currently undercollateralized
    fn is_account_undercollateralized(&self, owner: Address, sub_account: u64) -> bool;

    /// Deposit attached CSPR into the owner's margin sub-account
    fn deposit_native(&mut self, owner: Address, sub_account: u64);
}

/// Errors for the stub engine
#[odra::odra_error]
pub enum MarginStubError {
    Unauthorized = 9001,
}

/// Mock margin engine for testing and demo purposes.
/// Solvency is set per account by the deployer instead of being computed.
#[odra::module]
pub struct MarginEngineStub {
    owner: Var<Address>,
    undercollateralized: Mapping<(Address, u64), bool>,
    native_deposits: Mapping<(Address, u64), U512>,
}

#[odra::module]
impl MarginEngineStub {
    /// Initialize the stub
    pub fn init(&mut self) {
        self.owner.set(self.env().caller());
    }

    /// Mark an account as under- or fully-collateralized (deployer only)
    pub fn set_undercollateralized(&mut self, owner: Address, sub_account: u64, flag: bool) {
        if self.owner.get() != Some(self.env().caller()) {
            self.env().revert(MarginStubError::Unauthorized);
        }
        self.undercollateralized.set(&(owner, sub_account), flag);
    }

    /// Whether the given (owner, sub-account) is currently undercollateralized
    pub fn is_account_undercollateralized(&self, owner: Address, sub_account: u64) -> bool {
        self.undercollateralized.get(&(owner, sub_account)).unwrap_or_default()
    }

    /// Deposit attached CSPR into the owner's margin sub-account
    #[odra(payable)]
    pub fn deposit_native(&mut self, owner: Address, sub_account: u64) {
        let amount = self.env().attached_value();
        let current = self.native_deposits.get(&(owner, sub_account)).unwrap_or_default();
        self.native_deposits.set(&(owner, sub_account), current + amount);
    }

    /// Native CSPR recorded for an account
    pub fn native_deposit_of(&self, owner: Address, sub_account: u64) -> U512 {
        self.native_deposits.get(&(owner, sub_account)).unwrap_or_default()
    }
}
