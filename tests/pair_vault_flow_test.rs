//! Pair Vault Flow Tests
//!
//! Deposit/withdraw round trips on both ledgers, the reward batch, sweep,
//! and the vester.

use odra::host::{Deployer, HostRef, NoArgs};
use odra::prelude::*;
use odra::casper_types::{U256, U512};

use tandem_casper::async_ops::{AsyncCoordinator, AsyncCoordinatorInitArgs};
use tandem_casper::margin_external::{MarginEngineStub, MarginEngineStubHostRef};
use tandem_casper::mdn_vault::{MdnVault, MdnVaultHostRef, MdnVaultInitArgs};
use tandem_casper::meridian::{
    MeridianStaking, MeridianStakingHostRef, MeridianStakingInitArgs, VESTING_DURATION_MS,
};
use tandem_casper::mlp_vault::{MlpVault, MlpVaultHostRef, MlpVaultInitArgs};
use tandem_casper::pair_controller::{PairController, PairControllerHostRef, PairControllerInitArgs};
use tandem_casper::tokens::{MdnToken, MdnTokenHostRef, MlpToken, MlpTokenHostRef};

const WAD: u128 = 1_000_000_000_000_000_000;

/// Whole tokens to wad
fn wad(units: u64) -> U256 {
    U256::from(units) * U256::from(WAD)
}

// ==========================================
// Helper: Deploy the pair
// ==========================================

struct Tandem {
    mlp_token: MlpTokenHostRef,
    mdn_token: MdnTokenHostRef,
    meridian: MeridianStakingHostRef,
    engine: MarginEngineStubHostRef,
    controller: PairControllerHostRef,
    mlp_vault: MlpVaultHostRef,
    mdn_vault: MdnVaultHostRef,
}

fn deploy_tandem(env: &odra::host::HostEnv) -> Tandem {
    let deployer = env.get_account(0);
    let handler = env.get_account(2);
    let keeper = env.get_account(3);
    let liquidator = env.get_account(4);
    env.set_caller(deployer);

    let mlp_token = MlpToken::deploy(env, NoArgs);
    let mdn_token = MdnToken::deploy(env, NoArgs);
    let meridian = MeridianStaking::deploy(
        env,
        MeridianStakingInitArgs {
            mlp_token: mlp_token.address(),
            mdn_token: mdn_token.address(),
        },
    );
    let engine = MarginEngineStub::deploy(env, NoArgs);
    let controller = PairController::deploy(
        env,
        PairControllerInitArgs {
            staking: meridian.address(),
            transfer_handler: handler,
        },
    );
    let mlp_vault = MlpVault::deploy(
        env,
        MlpVaultInitArgs {
            controller: controller.address(),
            staking: meridian.address(),
            mlp_token: mlp_token.address(),
            mdn_token: mdn_token.address(),
            margin_engine: engine.address(),
        },
    );
    let mdn_vault = MdnVault::deploy(
        env,
        MdnVaultInitArgs {
            controller: controller.address(),
            staking: meridian.address(),
            mdn_token: mdn_token.address(),
        },
    );
    let coordinator = AsyncCoordinator::deploy(
        env,
        AsyncCoordinatorInitArgs {
            controller: controller.address(),
            mlp_vault: mlp_vault.address(),
            staking: meridian.address(),
            margin_engine: engine.address(),
            keeper,
            liquidator,
        },
    );

    let mut controller_mut = PairControllerHostRef::new(controller.address(), env.clone());
    controller_mut.register_vaults(mlp_vault.address(), mdn_vault.address());
    controller_mut.set_async_coordinator(coordinator.address());
    let mut mlp_vault_mut = MlpVaultHostRef::new(mlp_vault.address(), env.clone());
    mlp_vault_mut.set_companion(mdn_vault.address());
    mlp_vault_mut.set_coordinator(coordinator.address());
    let mut mdn_vault_mut = MdnVaultHostRef::new(mdn_vault.address(), env.clone());
    mdn_vault_mut.set_companion(mlp_vault.address());
    let mut meridian_mut = MeridianStakingHostRef::new(meridian.address(), env.clone());
    meridian_mut.register_custodian(mlp_vault.address());
    meridian_mut.register_custodian(controller.address());

    Tandem {
        mlp_token,
        mdn_token,
        meridian,
        engine,
        controller,
        mlp_vault,
        mdn_vault,
    }
}

/// Mint MLP to the user and deposit it into sub-account 0 of Ledger A
fn fund_and_deposit(env: &odra::host::HostEnv, t: &Tandem, user: Address, amount: U256) {
    env.set_caller(user);
    let mut mlp = MlpTokenHostRef::new(t.mlp_token.address(), env.clone());
    mlp.faucet_mint(user, amount);
    mlp.approve(t.mlp_vault.address(), amount);
    let mut vault = MlpVaultHostRef::new(t.mlp_vault.address(), env.clone());
    vault.deposit(0, amount);
}

/// Feed MDN/escrow rewards for the user and make sure the hub can pay claims
fn distribute_rewards(
    env: &odra::host::HostEnv,
    t: &Tandem,
    user: Address,
    mdn_amount: U256,
    esc_amount: U256,
) {
    env.set_caller(env.get_account(0));
    let mut mdn = MdnTokenHostRef::new(t.mdn_token.address(), env.clone());
    mdn.faucet_mint(t.meridian.address(), mdn_amount + wad(1_000));
    let mut meridian = MeridianStakingHostRef::new(t.meridian.address(), env.clone());
    meridian.distribute(user, mdn_amount, esc_amount);
}

// ==========================================
// Ledger A: deposit / withdraw
// ==========================================

#[test]
fn test_deposit_tracks_staked_principal() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);

    fund_and_deposit(&env, &t, user, wad(100));

    assert_eq!(t.mlp_vault.balance_of(user, 0), wad(100));
    assert_eq!(t.mlp_vault.owner_total_of(user), wad(100));
    assert_eq!(t.meridian.staked_mlp_of(user), wad(100));
    assert!(t.controller.has_link(user));
}

#[test]
fn test_deposit_withdraw_round_trip() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);

    fund_and_deposit(&env, &t, user, wad(10));

    env.set_caller(user);
    let mut vault = MlpVaultHostRef::new(t.mlp_vault.address(), env.clone());
    vault.withdraw(0, wad(10));

    assert_eq!(t.mlp_vault.balance_of(user, 0), U256::zero());
    assert_eq!(t.meridian.staked_mlp_of(user), U256::zero());
    assert_eq!(t.mlp_token.balance_of(user), wad(10));
}

#[test]
fn test_sub_accounts_are_independent() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);

    env.set_caller(user);
    let mut mlp = MlpTokenHostRef::new(t.mlp_token.address(), env.clone());
    mlp.faucet_mint(user, wad(30));
    mlp.approve(t.mlp_vault.address(), wad(30));
    let mut vault = MlpVaultHostRef::new(t.mlp_vault.address(), env.clone());
    vault.deposit(0, wad(10));
    vault.deposit(7, wad(20));

    assert_eq!(t.mlp_vault.balance_of(user, 0), wad(10));
    assert_eq!(t.mlp_vault.balance_of(user, 7), wad(20));
    assert_eq!(t.mlp_vault.owner_total_of(user), wad(30));
}

#[test]
#[should_panic(expected = "ZeroAmount")]
fn test_deposit_zero_reverts() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);

    env.set_caller(user);
    let mut vault = MlpVaultHostRef::new(t.mlp_vault.address(), env.clone());
    vault.deposit(0, U256::zero());
}

#[test]
#[should_panic(expected = "InsufficientBalance")]
fn test_withdraw_more_than_balance_reverts() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);

    fund_and_deposit(&env, &t, user, wad(10));

    env.set_caller(user);
    let mut vault = MlpVaultHostRef::new(t.mlp_vault.address(), env.clone());
    vault.withdraw(0, wad(11));
}

// ==========================================
// Ledger B: deposit / withdraw through the companion
// ==========================================

#[test]
fn test_mdn_deposit_routes_through_companion() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);

    env.set_caller(user);
    let mut mdn = MdnTokenHostRef::new(t.mdn_token.address(), env.clone());
    mdn.faucet_mint(user, wad(5));
    mdn.approve(t.mdn_vault.address(), wad(5));
    let mut vault = MdnVaultHostRef::new(t.mdn_vault.address(), env.clone());
    vault.deposit(0, wad(5));

    assert_eq!(t.mdn_vault.balance_of(user, 0), wad(5));
    assert_eq!(t.meridian.staked_mdn_of(user), wad(5));
    assert_eq!(t.mdn_token.balance_of(user), U256::zero());
}

#[test]
fn test_mdn_withdraw_round_trip() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);

    env.set_caller(user);
    let mut mdn = MdnTokenHostRef::new(t.mdn_token.address(), env.clone());
    mdn.faucet_mint(user, wad(5));
    mdn.approve(t.mdn_vault.address(), wad(5));
    let mut vault = MdnVaultHostRef::new(t.mdn_vault.address(), env.clone());
    vault.deposit(0, wad(5));
    vault.withdraw(0, wad(5));

    assert_eq!(t.mdn_vault.balance_of(user, 0), U256::zero());
    assert_eq!(t.meridian.staked_mdn_of(user), U256::zero());
    assert_eq!(t.mdn_token.balance_of(user), wad(5));
}

// ==========================================
// Reward handling
// ==========================================

#[test]
fn test_handle_rewards_claim_and_stake_gov() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);

    fund_and_deposit(&env, &t, user, wad(100));
    distribute_rewards(&env, &t, user, wad(3), U256::zero());

    env.set_caller(user);
    let mut vault = MlpVaultHostRef::new(t.mlp_vault.address(), env.clone());
    vault.handle_rewards(true, true, false, false, false, false, false);

    assert_eq!(t.meridian.staked_mdn_of(user), wad(3));
    assert_eq!(t.mdn_vault.balance_of(user, 0), wad(3));
    assert_eq!(t.mlp_vault.unswept_gov_of(user), U256::zero());
}

#[test]
fn test_handle_rewards_claim_without_stake_holds_unswept() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);

    fund_and_deposit(&env, &t, user, wad(100));
    distribute_rewards(&env, &t, user, wad(3), U256::zero());

    env.set_caller(user);
    let mut vault = MlpVaultHostRef::new(t.mlp_vault.address(), env.clone());
    vault.handle_rewards(true, false, false, false, false, false, false);

    assert_eq!(t.mlp_vault.unswept_gov_of(user), wad(3));
    assert_eq!(t.mdn_vault.balance_of(user, 0), U256::zero());

    // Sweep moves the held MDN into Ledger B, staking it on the way
    let mut mdn_vault = MdnVaultHostRef::new(t.mdn_vault.address(), env.clone());
    mdn_vault.sweep();

    assert_eq!(t.mlp_vault.unswept_gov_of(user), U256::zero());
    assert_eq!(t.mdn_vault.balance_of(user, 0), wad(3));
    assert_eq!(t.meridian.staked_mdn_of(user), wad(3));
}

#[test]
fn test_sweep_with_zero_balance_is_noop() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);

    env.set_caller(user);
    let mut mdn_vault = MdnVaultHostRef::new(t.mdn_vault.address(), env.clone());
    mdn_vault.sweep();

    assert_eq!(t.mdn_vault.balance_of(user, 0), U256::zero());
}

#[test]
fn test_handle_rewards_esc_claim_and_stake() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);

    fund_and_deposit(&env, &t, user, wad(100));
    distribute_rewards(&env, &t, user, U256::zero(), wad(4));

    env.set_caller(user);
    let mut vault = MlpVaultHostRef::new(t.mlp_vault.address(), env.clone());
    vault.handle_rewards(false, false, true, true, false, false, false);

    assert_eq!(t.meridian.staked_esc_of(user), wad(4));
    assert_eq!(t.meridian.pending_esc_of(user), U256::zero());
}

#[test]
fn test_handle_rewards_native_deposits_into_margin_engine() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);
    let motes = U512::from(2_000_000_000u64);

    fund_and_deposit(&env, &t, user, wad(100));

    env.set_caller(env.get_account(0));
    let mut meridian = MeridianStakingHostRef::new(t.meridian.address(), env.clone());
    meridian.with_tokens(motes).distribute_native(user);

    env.set_caller(user);
    let mut vault = MlpVaultHostRef::new(t.mlp_vault.address(), env.clone());
    vault.handle_rewards_with_account(7, false, false, false, false, false, true, true);

    assert_eq!(t.engine.native_deposit_of(user, 7), motes);
    assert_eq!(t.meridian.pending_native_of(user), U512::zero());
}

#[test]
#[should_panic(expected = "NativeDepositWithoutClaim")]
fn test_handle_rewards_deposit_native_requires_claim() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);

    env.set_caller(user);
    let mut vault = MlpVaultHostRef::new(t.mlp_vault.address(), env.clone());
    vault.handle_rewards(false, false, false, false, false, false, true);
}

#[test]
fn test_handle_rewards_is_noop_when_nothing_pending() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);

    fund_and_deposit(&env, &t, user, wad(100));

    env.set_caller(user);
    let mut vault = MlpVaultHostRef::new(t.mlp_vault.address(), env.clone());
    vault.handle_rewards(true, true, true, true, true, true, true);

    assert_eq!(t.mlp_vault.balance_of(user, 0), wad(100));
    assert_eq!(t.mdn_vault.balance_of(user, 0), U256::zero());
    assert_eq!(t.mlp_vault.unswept_gov_of(user), U256::zero());
    assert_eq!(t.meridian.staked_mdn_of(user), U256::zero());
}

// ==========================================
// Vesting
// ==========================================

/// Stake escrow rewards so the user has esMDN available to vest
fn stake_escrow(env: &odra::host::HostEnv, t: &Tandem, user: Address, amount: U256) {
    distribute_rewards(env, t, user, U256::zero(), amount);
    env.set_caller(user);
    let mut vault = MlpVaultHostRef::new(t.mlp_vault.address(), env.clone());
    vault.handle_rewards(false, false, true, true, false, false, false);
}

#[test]
fn test_vest_zero_then_unvest_is_noop() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);

    fund_and_deposit(&env, &t, user, wad(100));

    env.set_caller(user);
    let mut vault = MlpVaultHostRef::new(t.mlp_vault.address(), env.clone());
    vault.vest(U256::zero());
    vault.unvest(false);

    assert_eq!(t.mlp_vault.balance_of(user, 0), wad(100));
    assert_eq!(t.mdn_vault.balance_of(user, 0), U256::zero());
    assert_eq!(t.mlp_vault.vesting_position_of(user).amount, U256::zero());
}

#[test]
fn test_vest_records_position_on_both_ledgers() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);

    fund_and_deposit(&env, &t, user, wad(100));
    stake_escrow(&env, &t, user, wad(5));

    env.set_caller(user);
    let mut vault = MlpVaultHostRef::new(t.mlp_vault.address(), env.clone());
    vault.vest(wad(5));

    let from_a = t.mlp_vault.vesting_position_of(user);
    let from_b = t.mdn_vault.vesting_position_of(user);
    assert_eq!(from_a.amount, wad(5));
    assert_eq!(from_a.pair_amount, wad(5));
    assert_eq!(from_b.amount, wad(5));
    assert_eq!(t.meridian.staked_esc_of(user), U256::zero());
}

#[test]
#[should_panic(expected = "ReservedPrincipal")]
fn test_vest_reserves_principal_against_withdrawal() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);

    fund_and_deposit(&env, &t, user, wad(100));
    stake_escrow(&env, &t, user, wad(5));

    env.set_caller(user);
    let mut vault = MlpVaultHostRef::new(t.mlp_vault.address(), env.clone());
    vault.vest(wad(5));

    // 5 of the 100 staked MLP are reserved as the pair
    vault.withdraw(0, wad(96));
}

#[test]
fn test_unvest_after_full_maturity_restakes() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);
    let vest_amount = U256::from(WAD / 100); // 0.01

    fund_and_deposit(&env, &t, user, wad(100));
    stake_escrow(&env, &t, user, vest_amount);

    env.set_caller(user);
    let mut vault = MlpVaultHostRef::new(t.mlp_vault.address(), env.clone());
    vault.vest(vest_amount);

    env.advance_block_time(VESTING_DURATION_MS);

    env.set_caller(user);
    vault.unvest(true);

    assert_eq!(t.meridian.staked_mdn_of(user), vest_amount);
    assert_eq!(t.mdn_vault.balance_of(user, 0), vest_amount);
    assert_eq!(t.mlp_vault.vesting_position_of(user).amount, U256::zero());
    assert_eq!(t.meridian.staked_esc_of(user), U256::zero());
    // The pair reservation is released
    assert_eq!(t.meridian.unreserved_mlp_of(user), wad(100));
}

#[test]
fn test_unvest_at_half_maturity_splits_position() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);

    fund_and_deposit(&env, &t, user, wad(100));
    stake_escrow(&env, &t, user, wad(10));

    env.set_caller(user);
    let mut vault = MlpVaultHostRef::new(t.mlp_vault.address(), env.clone());
    vault.vest(wad(10));

    env.advance_block_time(VESTING_DURATION_MS / 2);

    env.set_caller(user);
    vault.unvest(false);

    // Half converted to wallet MDN, half returned to staked escrow
    assert_eq!(t.mdn_token.balance_of(user), wad(5));
    assert_eq!(t.meridian.staked_esc_of(user), wad(5));
    assert_eq!(t.mlp_vault.vesting_position_of(user).amount, U256::zero());
}

#[test]
fn test_handle_rewards_converts_matured_vest() {
    let env = odra_test::env();
    let t = deploy_tandem(&env);
    let user = env.get_account(1);

    fund_and_deposit(&env, &t, user, wad(100));
    stake_escrow(&env, &t, user, wad(2));

    env.set_caller(user);
    let mut vault = MlpVaultHostRef::new(t.mlp_vault.address(), env.clone());
    vault.vest(wad(2));

    env.advance_block_time(VESTING_DURATION_MS);

    env.set_caller(user);
    vault.handle_rewards(false, true, false, false, true, false, false);

    // The matured conversion is claimed and staked like a reward
    assert_eq!(t.meridian.staked_mdn_of(user), wad(2));
    assert_eq!(t.mdn_vault.balance_of(user, 0), wad(2));
}
