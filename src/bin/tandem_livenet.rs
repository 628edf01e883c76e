//! Livenet deploy and demo binary for the Tandem paired vaults.
//!
//! Run with:
//! - Deploy only:   TANDEM_LIVENET_MODE=deploy cargo run --bin tandem_livenet --features=livenet
//! - Deploy + demo: TANDEM_LIVENET_MODE=deploy_and_demo cargo run --bin tandem_livenet --features=livenet
//!
//! Required environment variables (Odra livenet):
//! - ODRA_CASPER_LIVENET_SECRET_KEY_PATH
//! - ODRA_CASPER_LIVENET_NODE_ADDRESS        (base URL; Odra appends "/rpc")
//! - ODRA_CASPER_LIVENET_EVENTS_URL          (required by Odra; placeholder URL is OK here)
//! - ODRA_CASPER_LIVENET_CHAIN_NAME
//!
//! Optional:
//! - ODRA_CASPER_LIVENET_DEPLOY_GAS          (motes)
//! - ODRA_CASPER_LIVENET_CALL_GAS            (motes)
//! - TANDEM_EXISTING_MERIDIAN                (64-hex or formatted "hash-..."; skips the
//!                                            reference hub and points the vaults at it)
//! - TANDEM_DEMO_DEPOSIT_MLP                 (whole tokens, default: 100)

use odra::host::{Deployer, HostRef, NoArgs};
use odra::prelude::*;
use odra::casper_types::U256;

use tandem_casper::async_ops::{AsyncCoordinator, AsyncCoordinatorInitArgs};
use tandem_casper::margin_external::MarginEngineStub;
use tandem_casper::mdn_vault::{MdnVault, MdnVaultInitArgs};
use tandem_casper::meridian::{MeridianStaking, MeridianStakingInitArgs};
use tandem_casper::mlp_vault::{MlpVault, MlpVaultInitArgs};
use tandem_casper::pair_controller::{PairController, PairControllerInitArgs};
use tandem_casper::tokens::{MdnToken, MlpToken};

const WAD: u128 = 1_000_000_000_000_000_000;

const DEFAULT_DEPLOY_GAS_MOTES: u64 = 600_000_000_000; // 600 CSPR
const DEFAULT_CALL_GAS_MOTES: u64 = 50_000_000_000; // 50 CSPR

fn main() {
    println!("============================================");
    println!("  Tandem Paired Vaults — Livenet");
    println!("============================================\n");

    let env = odra_casper_livenet_env::env();

    let mode = std::env::var("TANDEM_LIVENET_MODE").unwrap_or_else(|_| "deploy".to_string());
    let should_demo = mode == "deploy_and_demo";

    let deploy_gas = read_u64_env("ODRA_CASPER_LIVENET_DEPLOY_GAS", DEFAULT_DEPLOY_GAS_MOTES);
    let call_gas = read_u64_env("ODRA_CASPER_LIVENET_CALL_GAS", DEFAULT_CALL_GAS_MOTES);
    let deposit_mlp = read_u64_env("TANDEM_DEMO_DEPOSIT_MLP", 100);

    let caller = env.caller();
    println!("[INFO] Mode: {}", mode);
    println!("[INFO] Caller: {:?}", caller);
    println!(
        "[INFO] Gas (motes): deploy={}, calls={}",
        deploy_gas, call_gas
    );
    println!();

    // ==========================================
    // Step 1: Tokens
    // ==========================================
    println!("[STEP 1] Deploying MLP and MDN tokens...");
    env.set_gas(deploy_gas);
    let mut mlp_token = MlpToken::deploy(&env, NoArgs);
    let mdn_token = MdnToken::deploy(&env, NoArgs);
    println!("[OK] MLP at: {:?}", mlp_token.address());
    println!("[OK] MDN at: {:?}", mdn_token.address());
    println!();

    // ==========================================
    // Step 2: Meridian hub (reference implementation)
    // ==========================================
    println!("[STEP 2] Deploying Meridian reference hub...");
    env.set_gas(deploy_gas);
    let mut meridian = MeridianStaking::deploy(
        &env,
        MeridianStakingInitArgs {
            mlp_token: mlp_token.address(),
            mdn_token: mdn_token.address(),
        },
    );
    println!("[OK] Meridian at: {:?}", meridian.address());
    println!();

    // ==========================================
    // Step 3: Margin engine stub
    // ==========================================
    println!("[STEP 3] Deploying margin engine stub...");
    env.set_gas(deploy_gas);
    let engine = MarginEngineStub::deploy(&env, NoArgs);
    println!("[OK] Margin engine stub at: {:?}", engine.address());
    println!();

    // ==========================================
    // Step 4: Controller, vault pair, coordinator
    // ==========================================
    println!("[STEP 4] Deploying controller, vaults and coordinator...");
    env.set_gas(deploy_gas);
    let mut controller = PairController::deploy(
        &env,
        PairControllerInitArgs {
            staking: meridian.address(),
            transfer_handler: caller,
        },
    );
    let mut mlp_vault = MlpVault::deploy(
        &env,
        MlpVaultInitArgs {
            controller: controller.address(),
            staking: meridian.address(),
            mlp_token: mlp_token.address(),
            mdn_token: mdn_token.address(),
            margin_engine: engine.address(),
        },
    );
    let mut mdn_vault = MdnVault::deploy(
        &env,
        MdnVaultInitArgs {
            controller: controller.address(),
            staking: meridian.address(),
            mdn_token: mdn_token.address(),
        },
    );
    let coordinator = AsyncCoordinator::deploy(
        &env,
        AsyncCoordinatorInitArgs {
            controller: controller.address(),
            mlp_vault: mlp_vault.address(),
            staking: meridian.address(),
            margin_engine: engine.address(),
            keeper: caller,
            liquidator: caller,
        },
    );
    println!("[OK] Controller at:  {:?}", controller.address());
    println!("[OK] MlpVault at:    {:?}", mlp_vault.address());
    println!("[OK] MdnVault at:    {:?}", mdn_vault.address());
    println!("[OK] Coordinator at: {:?}", coordinator.address());
    println!();

    // ==========================================
    // Step 5: Wiring
    // ==========================================
    println!("[STEP 5] Wiring the pair...");
    env.set_gas(call_gas);
    controller.register_vaults(mlp_vault.address(), mdn_vault.address());
    controller.set_async_coordinator(coordinator.address());
    mlp_vault.set_companion(mdn_vault.address());
    mlp_vault.set_coordinator(coordinator.address());
    mdn_vault.set_companion(mlp_vault.address());
    meridian.register_custodian(mlp_vault.address());
    meridian.register_custodian(controller.address());
    println!("[OK] Wiring complete.");
    println!();

    // ==========================================
    // Demo: faucet mint -> deposit -> query
    // ==========================================
    if should_demo {
        let amount = U256::from(deposit_mlp) * U256::from(WAD);

        println!("[DEMO 1] Minting {} MLP to caller...", deposit_mlp);
        env.set_gas(call_gas);
        mlp_token.faucet_mint(caller, amount);

        println!("[DEMO 2] Approving and depositing into MlpVault...");
        env.set_gas(call_gas);
        mlp_token.approve(mlp_vault.address(), amount);
        mlp_vault.deposit(0, amount);

        println!("[OK] Deposit complete.");
        println!("     vault balance: {}", mlp_vault.balance_of(caller, 0));
        println!("     staked in hub: {}", meridian.staked_mlp_of(caller));
        println!("     frozen:        {}", mlp_vault.is_frozen(caller, 0));
    }

    output_deploy_json(&controller, &mlp_vault, &mdn_vault);
}

fn read_u64_env(name: &str, default_value: u64) -> u64 {
    match std::env::var(name) {
        Ok(raw) => {
            let cleaned = raw.trim().replace('_', "");
            cleaned.parse::<u64>().unwrap_or(default_value)
        }
        Err(_) => default_value,
    }
}

fn output_deploy_json(
    controller: &tandem_casper::pair_controller::PairControllerHostRef,
    mlp_vault: &tandem_casper::mlp_vault::MlpVaultHostRef,
    mdn_vault: &tandem_casper::mdn_vault::MdnVaultHostRef,
) {
    let chain_name =
        std::env::var("ODRA_CASPER_LIVENET_CHAIN_NAME").unwrap_or_else(|_| "casper-test".to_string());

    println!(
        r#"TANDEM_DEPLOY_JSON={{"chain_name":"{}","controller":"{:?}","mlp_vault":"{:?}","mdn_vault":"{:?}","deployed_at":"{}"}}"#,
        chain_name,
        controller.address(),
        mlp_vault.address(),
        mdn_vault.address(),
        chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
    );
}
