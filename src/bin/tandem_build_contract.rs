//! Build contract binary for Odra WASM generation
//!
//! This binary is compiled to WASM and contains the contract entry points.

#![cfg_attr(target_arch = "wasm32", no_std)]
#![cfg_attr(target_arch = "wasm32", no_main)]

#[cfg(target_arch = "wasm32")]
extern crate odra_casper_wasm_env;

#[cfg(target_arch = "wasm32")]
use tandem_casper::async_ops::AsyncCoordinator;
#[cfg(target_arch = "wasm32")]
use tandem_casper::margin_external::MarginEngineStub;
#[cfg(target_arch = "wasm32")]
use tandem_casper::mdn_vault::MdnVault;
#[cfg(target_arch = "wasm32")]
use tandem_casper::meridian::MeridianStaking;
#[cfg(target_arch = "wasm32")]
use tandem_casper::mlp_vault::MlpVault;
#[cfg(target_arch = "wasm32")]
use tandem_casper::pair_controller::PairController;
#[cfg(target_arch = "wasm32")]
use tandem_casper::tokens::{MdnToken, MlpToken};
#[cfg(target_arch = "wasm32")]
use odra_casper_wasm_env as _;

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    panic!("tandem_build_contract is intended to be built for wasm32-unknown-unknown only");
}
