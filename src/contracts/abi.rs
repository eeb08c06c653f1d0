//! Call-by-name dispatch against a minimal ABI fragment.
//!
//! A [`ContractCallSpec`] is resolved and type-checked once, when it is built.
//! After that it is immutable: a call with different arguments is a new spec.

use ethers::abi::{Abi, Function, ParamType, StateMutability, Token};
use ethers::types::{Address, Bytes, U256};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{AppError, Result};

/// A positional argument for a contract call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallValue {
    Address(Address),
    Uint(U256),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
}

impl CallValue {
    /// Parses a textual argument according to its declared ABI type.
    pub fn parse(kind: &ParamType, raw: &str) -> Result<Self> {
        let raw = raw.trim();
        match kind {
            ParamType::Address => Address::from_str(raw)
                .map(CallValue::Address)
                .map_err(|_| AppError::Abi(format!("'{}' is not an address", raw))),
            ParamType::Uint(_) => {
                let value = match raw.strip_prefix("0x") {
                    Some(hex) => U256::from_str_radix(hex, 16).ok(),
                    None => U256::from_dec_str(raw).ok(),
                }
                .ok_or_else(|| AppError::Abi(format!("'{}' is not an unsigned integer", raw)))?;
                let parsed = CallValue::Uint(value);
                if !parsed.matches(kind) {
                    return Err(AppError::Abi(format!("'{}' overflows {}", raw, kind)));
                }
                Ok(parsed)
            }
            ParamType::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" => Ok(CallValue::Bool(true)),
                "false" => Ok(CallValue::Bool(false)),
                _ => Err(AppError::Abi(format!("'{}' is not a bool", raw))),
            },
            ParamType::String => Ok(CallValue::String(raw.to_string())),
            ParamType::Bytes | ParamType::FixedBytes(_) => {
                let bytes = hex::decode(raw.trim_start_matches("0x"))
                    .map_err(|_| AppError::Abi(format!("'{}' is not hex bytes", raw)))?;
                let parsed = CallValue::Bytes(bytes);
                if !parsed.matches(kind) {
                    return Err(AppError::Abi(format!("'{}' does not fit {}", raw, kind)));
                }
                Ok(parsed)
            }
            other => Err(AppError::Abi(format!("unsupported argument type {}", other))),
        }
    }

    /// Whether this value is acceptable for a parameter of the given type.
    pub fn matches(&self, kind: &ParamType) -> bool {
        match (self, kind) {
            (CallValue::Address(_), ParamType::Address) => true,
            (CallValue::Uint(value), ParamType::Uint(bits)) => *bits >= 256 || value.bits() <= *bits,
            (CallValue::Bool(_), ParamType::Bool) => true,
            (CallValue::String(_), ParamType::String) => true,
            (CallValue::Bytes(_), ParamType::Bytes) => true,
            (CallValue::Bytes(bytes), ParamType::FixedBytes(len)) => bytes.len() == *len,
            _ => false,
        }
    }

    pub fn to_token(&self) -> Token {
        match self {
            CallValue::Address(address) => Token::Address(*address),
            CallValue::Uint(value) => Token::Uint(*value),
            CallValue::Bool(value) => Token::Bool(*value),
            CallValue::String(value) => Token::String(value.clone()),
            CallValue::Bytes(bytes) => Token::Bytes(bytes.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Read,
    Write,
}

#[derive(Debug, Clone)]
pub struct ContractCallSpec {
    contract: Address,
    function: Function,
    args: Vec<CallValue>,
}

impl ContractCallSpec {
    /// Builds a spec for a `view`/`pure` function.
    pub fn read(
        contract: Address,
        abi: Arc<Abi>,
        function_name: &str,
        args: Vec<CallValue>,
    ) -> Result<Self> {
        Self::build(contract, abi, function_name, args, CallKind::Read)
    }

    /// Builds a spec for a state-changing function.
    pub fn write(
        contract: Address,
        abi: Arc<Abi>,
        function_name: &str,
        args: Vec<CallValue>,
    ) -> Result<Self> {
        Self::build(contract, abi, function_name, args, CallKind::Write)
    }

    fn build(
        contract: Address,
        abi: Arc<Abi>,
        function_name: &str,
        args: Vec<CallValue>,
        kind: CallKind,
    ) -> Result<Self> {
        let function = lookup_function(&abi, function_name)?.clone();

        let read_only = matches!(
            function.state_mutability,
            StateMutability::View | StateMutability::Pure
        );
        match kind {
            CallKind::Read if !read_only => {
                return Err(AppError::Abi(format!(
                    "{} mutates state and cannot be used as a read",
                    function_name
                )))
            }
            CallKind::Write if read_only => {
                return Err(AppError::Abi(format!(
                    "{} is read-only and cannot be submitted as a transaction",
                    function_name
                )))
            }
            _ => {}
        }

        if function.inputs.len() != args.len() {
            return Err(AppError::Abi(format!(
                "{} expects {} argument(s), got {}",
                function_name,
                function.inputs.len(),
                args.len()
            )));
        }
        for (index, (param, arg)) in function.inputs.iter().zip(&args).enumerate() {
            if !arg.matches(&param.kind) {
                return Err(AppError::Abi(format!(
                    "{} argument {} must be {}, got {:?}",
                    function_name, index, param.kind, arg
                )));
            }
        }

        Ok(Self {
            contract,
            function,
            args,
        })
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn function_name(&self) -> &str {
        &self.function.name
    }

    pub fn args(&self) -> &[CallValue] {
        &self.args
    }

    pub fn is_payable(&self) -> bool {
        self.function.state_mutability == StateMutability::Payable
    }

    /// Selector plus ABI-encoded arguments.
    pub fn calldata(&self) -> Result<Bytes> {
        let tokens: Vec<Token> = self.args.iter().map(CallValue::to_token).collect();
        self.function
            .encode_input(&tokens)
            .map(Bytes::from)
            .map_err(|e| AppError::Abi(format!("encode {}: {}", self.function.name, e)))
    }

    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<Token>> {
        self.function
            .decode_output(data)
            .map_err(|e| AppError::Abi(format!("decode {}: {}", self.function.name, e)))
    }
}

/// Resolves `name` to exactly one function of the fragment. Overloads are
/// rejected since positional dispatch could not tell them apart.
pub fn lookup_function<'a>(abi: &'a Abi, name: &str) -> Result<&'a Function> {
    let candidates = abi
        .functions_by_name(name)
        .map_err(|_| AppError::Abi(format!("function {} is not in the ABI fragment", name)))?;
    match candidates.as_slice() {
        [function] => Ok(function),
        [] => Err(AppError::Abi(format!(
            "function {} is not in the ABI fragment",
            name
        ))),
        _ => Err(AppError::Abi(format!(
            "function {} is overloaded in the ABI fragment",
            name
        ))),
    }
}

pub fn parse_fragment(signatures: &[&str]) -> Result<Arc<Abi>> {
    ethers::abi::parse_abi(signatures)
        .map(Arc::new)
        .map_err(|e| AppError::Abi(format!("invalid ABI fragment: {}", e)))
}
