//! Constructor and call arguments, and their ABI encoding.

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue},
    primitives::{Address, Bytes, U256, keccak256},
};
use serde::{Deserialize, Serialize};

use crate::DeployError;

/// A single ABI argument.
///
/// Arguments are kept in this serializable form so that they can take part in the
/// deployment fingerprint and be recorded by the in-memory ledger. Integer widths are not
/// tracked here: every static integer occupies a full word, so the width only matters in the
/// function signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AbiValue {
    Address(Address),
    Uint(U256),
    Bool(bool),
    String(String),
    Bytes(Bytes),
    Tuple(Vec<AbiValue>),
    Array(Vec<AbiValue>),
}

impl AbiValue {
    /// Shorthand for a `uint` argument.
    pub fn uint(value: u64) -> Self {
        Self::Uint(U256::from(value))
    }

    fn kind(&self) -> &'static str {
        match self {
            AbiValue::Address(_) => "address",
            AbiValue::Uint(_) => "uint",
            AbiValue::Bool(_) => "bool",
            AbiValue::String(_) => "string",
            AbiValue::Bytes(_) => "bytes",
            AbiValue::Tuple(_) => "tuple",
            AbiValue::Array(_) => "array",
        }
    }

    /// Check this value against a declared parameter type, tuples and arrays included.
    fn check(&self, ty: &DynSolType) -> Result<(), String> {
        match (ty, self) {
            (DynSolType::Address, AbiValue::Address(_))
            | (DynSolType::Bool, AbiValue::Bool(_))
            | (DynSolType::String, AbiValue::String(_))
            | (DynSolType::Bytes, AbiValue::Bytes(_)) => Ok(()),
            (DynSolType::Uint(bits), AbiValue::Uint(word)) => {
                if word.bit_len() <= *bits {
                    Ok(())
                } else {
                    Err(format!("{} does not fit in uint{}", word, bits))
                }
            }
            (DynSolType::Tuple(types), AbiValue::Tuple(items)) => {
                if types.len() != items.len() {
                    return Err(format!(
                        "{} has {} fields, {} given",
                        ty.sol_type_name(),
                        types.len(),
                        items.len()
                    ));
                }
                types.iter().zip(items).try_for_each(|(ty, item)| item.check(ty))
            }
            (DynSolType::Array(inner), AbiValue::Array(items)) => {
                items.iter().try_for_each(|item| item.check(inner))
            }
            (DynSolType::FixedArray(inner, len), AbiValue::Array(items)) => {
                if items.len() != *len {
                    return Err(format!(
                        "{} has {} elements, {} given",
                        ty.sol_type_name(),
                        len,
                        items.len()
                    ));
                }
                items.iter().try_for_each(|item| item.check(inner))
            }
            _ => Err(format!("expected {}, got {}", ty.sol_type_name(), self.kind())),
        }
    }

    /// The value typed as `ty`. Only meaningful once [`AbiValue::check`] has passed.
    fn typed(&self, ty: &DynSolType) -> DynSolValue {
        match (ty, self) {
            (DynSolType::Uint(bits), AbiValue::Uint(word)) => DynSolValue::Uint(*word, *bits),
            (DynSolType::Tuple(types), AbiValue::Tuple(items)) => DynSolValue::Tuple(
                types.iter().zip(items).map(|(ty, item)| item.typed(ty)).collect(),
            ),
            (DynSolType::Array(inner), AbiValue::Array(items)) => {
                DynSolValue::Array(items.iter().map(|item| item.typed(inner)).collect())
            }
            (DynSolType::FixedArray(inner, _), AbiValue::Array(items)) => {
                DynSolValue::FixedArray(items.iter().map(|item| item.typed(inner)).collect())
            }
            (_, value) => value.into(),
        }
    }
}

impl From<Address> for AbiValue {
    fn from(value: Address) -> Self {
        Self::Address(value)
    }
}

impl From<U256> for AbiValue {
    fn from(value: U256) -> Self {
        Self::Uint(value)
    }
}

impl From<bool> for AbiValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&AbiValue> for DynSolValue {
    fn from(value: &AbiValue) -> Self {
        match value {
            AbiValue::Address(address) => DynSolValue::Address(*address),
            AbiValue::Uint(word) => DynSolValue::Uint(*word, 256),
            AbiValue::Bool(flag) => DynSolValue::Bool(*flag),
            AbiValue::String(text) => DynSolValue::String(text.clone()),
            AbiValue::Bytes(bytes) => DynSolValue::Bytes(bytes.to_vec()),
            AbiValue::Tuple(items) => DynSolValue::Tuple(items.iter().map(Into::into).collect()),
            AbiValue::Array(items) => DynSolValue::Array(items.iter().map(Into::into).collect()),
        }
    }
}

/// ABI-encode a list of arguments as a parameter sequence (constructor arguments or the
/// body of a call after the selector).
pub fn encode_params(args: &[AbiValue]) -> Vec<u8> {
    if args.is_empty() {
        return Vec::new();
    }
    DynSolValue::Tuple(args.iter().map(Into::into).collect()).abi_encode_params()
}

/// A contract call: a full Solidity signature and its arguments.
///
/// The signature is spelled out (e.g. `registerPairGroup((address,uint8))`) rather than
/// derived from the arguments, so the selector always matches the deployed ABI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub signature: String,
    pub args: Vec<AbiValue>,
}

impl FunctionCall {
    pub fn new(signature: impl Into<String>, args: Vec<AbiValue>) -> Self {
        Self {
            signature: signature.into(),
            args,
        }
    }

    /// The method name, i.e. the signature up to the opening parenthesis.
    pub fn method(&self) -> &str {
        self.signature
            .split_once('(')
            .map(|(name, _)| name)
            .unwrap_or(&self.signature)
    }

    /// The 4-byte function selector.
    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature.as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }

    /// Parameter types declared by the signature.
    pub fn param_types(&self) -> Result<Vec<DynSolType>, DeployError> {
        let invalid = |reason: String| DeployError::InvalidCall {
            signature: self.signature.clone(),
            reason,
        };

        let params = self
            .signature
            .find('(')
            .filter(|open| *open > 0)
            .map(|open| &self.signature[open..])
            .ok_or_else(|| invalid("expected `name(types)`".to_string()))?;
        if params == "()" {
            return Ok(Vec::new());
        }

        match DynSolType::parse(params) {
            Ok(DynSolType::Tuple(types)) => Ok(types),
            Ok(other) => Err(invalid(format!("unexpected parameter list {}", other.sol_type_name()))),
            Err(e) => Err(invalid(e.to_string())),
        }
    }

    /// Check every argument against the type the signature declares for it.
    pub fn validate(&self) -> Result<(), DeployError> {
        self.typed_args().map(|_| ())
    }

    fn typed_args(&self) -> Result<Vec<DynSolValue>, DeployError> {
        let types = self.param_types()?;
        let invalid = |reason: String| DeployError::InvalidCall {
            signature: self.signature.clone(),
            reason,
        };

        if types.len() != self.args.len() {
            return Err(invalid(format!(
                "signature declares {} parameters, {} arguments given",
                types.len(),
                self.args.len()
            )));
        }

        types
            .iter()
            .zip(&self.args)
            .enumerate()
            .map(|(index, (ty, arg))| {
                arg.check(ty)
                    .map(|_| arg.typed(ty))
                    .map_err(|reason| invalid(format!("argument {}: {}", index, reason)))
            })
            .collect()
    }

    /// Selector followed by the encoded arguments.
    pub fn calldata(&self) -> Result<Bytes, DeployError> {
        let args = self.typed_args()?;
        let mut data = self.selector().to_vec();
        if !args.is_empty() {
            data.extend(DynSolValue::Tuple(args).abi_encode_params());
        }
        Ok(data.into())
    }
}
