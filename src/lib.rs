//! Tandem — Paired Staking Vaults over the Meridian hub (Odra)
//!
//! This crate implements a pair of per-user accounting vaults that together
//! represent one external Meridian staking position:
//! - MlpVault: staked MLP principal, custodies the Meridian position
//! - MdnVault: MDN governance balance held inside the same position
//! - PairController: companion links, freeze flags, account-transfer protocol
//! - AsyncCoordinator: keeper-executed operations and liquidation preparation

#![cfg_attr(target_arch = "wasm32", no_std)]

extern crate alloc;

pub mod errors;
pub mod tokens;
pub mod margin_external;
pub mod meridian;
pub mod vesting;
pub mod pair_controller;
pub mod mlp_vault;
pub mod mdn_vault;
pub mod async_ops;
