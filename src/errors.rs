//! Shared error set for the Tandem core contracts.
//!
//! One enum serves MlpVault, MdnVault, PairController and AsyncCoordinator so
//! that a failure surfaces the same reason string no matter which contract of
//! the pair raised it.

use odra::prelude::*;

/// Errors raised by the paired vaults and their coordination contracts.
#[odra::odra_error]
pub enum PairVaultError {
    Unauthorized = 1,
    VaultFrozen = 2,
    TransferAlreadyInProgress = 3,
    TransferNotInProgress = 4,
    AlreadyTransferredOnce = 5,
    AlreadyAccepted = 6,
    InvalidSender = 7,
    ReentrantCall = 8,
    InvalidExtraData = 9,
    InsufficientBalance = 10,
    InvalidUnderlyingBalance = 11,
    AlreadySynced = 12,
    NativeDepositWithoutClaim = 13,
    ZeroAmount = 14,
    AlreadyConfigured = 15,
    NotConfigured = 16,
    RequestNotPending = 17,
    AccountNotFrozen = 18,
    AccountNotLiquidatable = 19,
    InvalidExpiration = 20,
}
