//! CEP-18 Token implementations: MLP and MDN
//!
//! - MLP: Meridian pool token (the staked principal), faucet mint for testing
//! - MDN: Meridian governance token, faucet mint for testing
//!
//! Escrowed MDN is internal to the Meridian hub and never surfaces as a token.

use alloc::string::String;
use odra::casper_types::U256;
use odra::prelude::*;
use odra_modules::cep18::events::{
    Burn, DecreaseAllowance, IncreaseAllowance, Mint, SetAllowance, Transfer, TransferFrom,
};
use odra_modules::cep18_token::Cep18;

/// MLP: Meridian pool token. Anyone can call faucet_mint to get test tokens.
#[odra::module(events = [
    Mint,
    Burn,
    SetAllowance,
    IncreaseAllowance,
    DecreaseAllowance,
    Transfer,
    TransferFrom
])]
pub struct MlpToken {
    token: SubModule<Cep18>,
}

#[odra::module]
impl MlpToken {
    /// Initialize the token
    pub fn init(&mut self) {
        self.token
            .init("MLP".to_string(), "Meridian LP".to_string(), 18u8, U256::zero());
    }

    /// Token name
    pub fn name(&self) -> String {
        self.token.name()
    }

    /// Token symbol
    pub fn symbol(&self) -> String {
        self.token.symbol()
    }

    /// Token decimals
    pub fn decimals(&self) -> u8 {
        self.token.decimals()
    }

    /// Total supply
    pub fn total_supply(&self) -> U256 {
        self.token.total_supply()
    }

    /// Balance of an address
    pub fn balance_of(&self, owner: Address) -> U256 {
        self.token.balance_of(&owner)
    }

    /// Allowance from owner to spender
    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.token.allowance(&owner, &spender)
    }

    /// Transfer tokens
    pub fn transfer(&mut self, recipient: Address, amount: U256) {
        self.token.transfer(&recipient, &amount);
    }

    /// Approve spender
    pub fn approve(&mut self, spender: Address, amount: U256) {
        self.token.approve(&spender, &amount);
    }

    /// Transfer from (with allowance)
    pub fn transfer_from(&mut self, owner: Address, recipient: Address, amount: U256) {
        self.token.transfer_from(&owner, &recipient, &amount);
    }

    /// Faucet mint - anyone can call to get test tokens
    pub fn faucet_mint(&mut self, to: Address, amount: U256) {
        self.token.raw_mint(&to, &amount);
    }
}

/// MDN: Meridian governance token. Anyone can call faucet_mint to get test tokens.
#[odra::module(events = [
    Mint,
    Burn,
    SetAllowance,
    IncreaseAllowance,
    DecreaseAllowance,
    Transfer,
    TransferFrom
])]
pub struct MdnToken {
    token: SubModule<Cep18>,
}

#[odra::module]
impl MdnToken {
    /// Initialize the token
    pub fn init(&mut self) {
        self.token
            .init("MDN".to_string(), "Meridian".to_string(), 18u8, U256::zero());
    }

    /// Token name
    pub fn name(&self) -> String {
        self.token.name()
    }

    /// Token symbol
    pub fn symbol(&self) -> String {
        self.token.symbol()
    }

    /// Token decimals
    pub fn decimals(&self) -> u8 {
        self.token.decimals()
    }

    /// Total supply
    pub fn total_supply(&self) -> U256 {
        self.token.total_supply()
    }

    /// Balance of an address
    pub fn balance_of(&self, owner: Address) -> U256 {
        self.token.balance_of(&owner)
    }

    /// Allowance from owner to spender
    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.token.allowance(&owner, &spender)
    }

    /// Transfer tokens
    pub fn transfer(&mut self, recipient: Address, amount: U256) {
        self.token.transfer(&recipient, &amount);
    }

    /// Approve spender
    pub fn approve(&mut self, spender: Address, amount: U256) {
        self.token.approve(&spender, &amount);
    }

    /// Transfer from (with allowance)
    pub fn transfer_from(&mut self, owner: Address, recipient: Address, amount: U256) {
        self.token.transfer_from(&owner, &recipient, &amount);
    }

    /// Faucet mint - anyone can call to get test tokens
    pub fn faucet_mint(&mut self, to: Address, amount: U256) {
        self.token.raw_mint(&to, &amount);
    }
}
