// Contract bindings used by the staking dashboard.
pub mod abi;
pub mod format;

pub use abi::{CallValue, ContractCallSpec};
pub use format::ResultTransform;

use ethers::abi::Abi;
use ethers::types::Address;
use std::str::FromStr;
use std::sync::Arc;

use crate::{
    config::Config,
    constants::{FN_BALANCE_OF, FN_SUBMIT, FN_TOTAL_SUPPLY, STAKING_ABI, TOKEN_ABI},
    error::{AppError, Result},
};

/// Fixed contracts and fragments the dashboard talks to.
#[derive(Debug, Clone)]
pub struct StakingContracts {
    pub staking: Address,
    pub token: Address,
    stake_args: Vec<CallValue>,
    staking_abi: Arc<Abi>,
    token_abi: Arc<Abi>,
}

impl StakingContracts {
    pub fn from_config(config: &Config) -> Result<Self> {
        let staking_abi = abi::parse_fragment(STAKING_ABI)?;
        let token_abi = abi::parse_fragment(TOKEN_ABI)?;

        // Configured arguments are typed against the fragment's declared inputs.
        let submit = abi::lookup_function(&staking_abi, FN_SUBMIT)?;
        let raw_args = [config.stake_referral_address.as_str()];
        if submit.inputs.len() != raw_args.len() {
            return Err(AppError::Abi(format!(
                "{} expects {} argument(s), configured {}",
                FN_SUBMIT,
                submit.inputs.len(),
                raw_args.len()
            )));
        }
        let stake_args = submit
            .inputs
            .iter()
            .zip(raw_args)
            .map(|(param, raw)| CallValue::parse(&param.kind, raw))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            staking: parse_address("STAKING_CONTRACT_ADDRESS", &config.staking_contract_address)?,
            token: parse_address("TOKEN_CONTRACT_ADDRESS", &config.token_contract_address)?,
            stake_args,
            staking_abi,
            token_abi,
        })
    }

    /// `balanceOf(owner)` on the token contract.
    pub fn staked_balance(&self, owner: Address) -> Result<ContractCallSpec> {
        ContractCallSpec::read(
            self.token,
            self.token_abi.clone(),
            FN_BALANCE_OF,
            vec![CallValue::Address(owner)],
        )
    }

    /// `totalSupply()` on the staking contract.
    pub fn total_staked(&self) -> Result<ContractCallSpec> {
        ContractCallSpec::read(
            self.staking,
            self.staking_abi.clone(),
            FN_TOTAL_SUPPLY,
            Vec::new(),
        )
    }

    /// `submit(referral)`, payable.
    pub fn stake(&self) -> Result<ContractCallSpec> {
        ContractCallSpec::write(
            self.staking,
            self.staking_abi.clone(),
            FN_SUBMIT,
            self.stake_args.clone(),
        )
    }
}

fn parse_address(name: &str, raw: &str) -> Result<Address> {
    Address::from_str(raw.trim())
        .map_err(|_| AppError::BadRequest(format!("{} is not a valid address", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DEFAULT_STAKE_REFERRAL, DEFAULT_STAKING_CONTRACT};

    #[test]
    fn default_contracts_build_every_spec() {
        let contracts = StakingContracts::from_config(&Config::default()).expect("defaults");
        let staking = Address::from_str(DEFAULT_STAKING_CONTRACT).expect("address");
        assert_eq!(contracts.staking, staking);

        let total = contracts.total_staked().expect("totalSupply");
        assert_eq!(total.contract(), staking);
        assert!(total.args().is_empty());

        let owner = Address::repeat_byte(0x11);
        let balance = contracts.staked_balance(owner).expect("balanceOf");
        assert_eq!(balance.args(), &[CallValue::Address(owner)]);

        let referral = Address::from_str(DEFAULT_STAKE_REFERRAL).expect("address");
        let stake = contracts.stake().expect("submit");
        assert!(stake.is_payable());
        assert_eq!(stake.args(), &[CallValue::Address(referral)]);
    }

    #[test]
    fn invalid_referral_is_rejected() {
        let config = Config {
            stake_referral_address: "not-an-address".to_string(),
            ..Config::default()
        };
        assert!(StakingContracts::from_config(&config).is_err());
    }
}
