//! Chain and price-feed capabilities consumed by the market engine.

use crate::domain::Address;
use crate::error::LendError;
use alloy_primitives::U256;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use contracts::{decode_returns, IntoRawValue};
use std::fmt;
use std::hash::{Hash, Hasher};

pub mod batch;
pub mod contracts;
pub mod curve_api;
pub mod mock;
pub mod rpc;

pub use batch::{demux, BatchReader, Demuxed};
pub use contracts::{int256, IController, IERC20, IFactory, ILlamma, IMonetaryPolicy, IVault};
pub use curve_api::{CurveApiClient, PoolCoin, PoolData, PriceApi, FACTORY_TYPES};
pub use mock::{MockChain, MockPriceApi, MockWriter};
pub use rpc::JsonRpcReader;

type ReturnDecoder = fn(&[u8]) -> Result<RawValue, TransportError>;

/// Method name of a Solidity signature, e.g. `max_borrowable` of
/// `max_borrowable(uint256,uint256)`.
fn method_name(signature: &str) -> &str {
    signature.split('(').next().unwrap_or(signature)
}

/// One view call against `contract`, ABI-encoded from a `sol!` call.
///
/// Two requests are the same read when they target the same contract with the
/// same calldata.
#[derive(Clone)]
pub struct ReadRequest {
    pub contract: Address,
    signature: &'static str,
    calldata: Vec<u8>,
    decoder: ReturnDecoder,
}

impl ReadRequest {
    pub fn new<C>(contract: &Address, call: C) -> Self
    where
        C: SolCall,
        C::Return: IntoRawValue,
    {
        Self {
            contract: contract.clone(),
            signature: C::SIGNATURE,
            calldata: call.abi_encode(),
            decoder: decode_returns::<C>,
        }
    }

    /// Solidity signature, e.g. `max_borrowable(uint256,uint256)`.
    pub fn signature(&self) -> &'static str {
        self.signature
    }

    pub fn method(&self) -> &str {
        method_name(self.signature)
    }

    pub fn calldata(&self) -> &[u8] {
        &self.calldata
    }

    /// Decode the `eth_call` return data of this request.
    pub fn decode(&self, data: &[u8]) -> Result<RawValue, TransportError> {
        (self.decoder)(data)
    }
}

impl PartialEq for ReadRequest {
    fn eq(&self, other: &Self) -> bool {
        self.contract == other.contract && self.calldata == other.calldata
    }
}

impl Eq for ReadRequest {}

impl Hash for ReadRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.contract.hash(state);
        self.calldata.hash(state);
    }
}

impl fmt::Debug for ReadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadRequest")
            .field("contract", &self.contract)
            .field("signature", &self.signature)
            .field("calldata", &hex::encode(&self.calldata))
            .finish()
    }
}

impl fmt::Display for ReadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.contract, self.signature)
    }
}

/// Decoded return value of a view call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Uint(U256),
    Int(i128),
    Bool(bool),
    Address(Address),
    Str(String),
    Array(Vec<RawValue>),
}

impl RawValue {
    fn mismatch(&self, expected: &str) -> LendError {
        LendError::batch_read(format!("expected {}, got {:?}", expected, self))
    }

    pub fn as_u256(&self) -> Result<U256, LendError> {
        match self {
            RawValue::Uint(v) => Ok(*v),
            RawValue::Int(v) if *v >= 0 => Ok(U256::from(*v as u128)),
            other => Err(other.mismatch("uint")),
        }
    }

    pub fn as_i128(&self) -> Result<i128, LendError> {
        match self {
            RawValue::Int(v) => Ok(*v),
            RawValue::Uint(v) => i128::try_from(*v).map_err(|_| self.mismatch("int128 range")),
            other => Err(other.mismatch("int")),
        }
    }

    pub fn as_i64(&self) -> Result<i64, LendError> {
        let v = self.as_i128()?;
        i64::try_from(v).map_err(|_| self.mismatch("int64 range"))
    }

    pub fn as_u64(&self) -> Result<u64, LendError> {
        let v = self.as_u256()?;
        u64::try_from(v).map_err(|_| self.mismatch("uint64 range"))
    }

    pub fn as_bool(&self) -> Result<bool, LendError> {
        match self {
            RawValue::Bool(b) => Ok(*b),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_address(&self) -> Result<Address, LendError> {
        match self {
            RawValue::Address(a) => Ok(a.clone()),
            other => Err(other.mismatch("address")),
        }
    }

    pub fn as_str(&self) -> Result<&str, LendError> {
        match self {
            RawValue::Str(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    /// Fixed-size array of exactly `len` elements.
    pub fn as_array(&self, len: usize) -> Result<&[RawValue], LendError> {
        match self {
            RawValue::Array(items) if items.len() == len => Ok(items),
            other => Err(other.mismatch(&format!("array[{}]", len))),
        }
    }
}

/// Contract read capability provided by the node connection.
///
/// `batch_call` must return exactly one value per request, in request order,
/// or fail as a whole.
#[async_trait]
pub trait ContractReader: Send + Sync + fmt::Debug {
    async fn call(&self, request: &ReadRequest) -> Result<RawValue, TransportError>;

    async fn batch_call(&self, requests: &[ReadRequest]) -> Result<Vec<RawValue>, TransportError>;
}

/// A state-changing contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub from: Address,
    pub contract: Address,
    pub signature: &'static str,
    pub calldata: Vec<u8>,
}

impl WriteRequest {
    pub fn new<C: SolCall>(from: &Address, contract: &Address, call: C) -> Self {
        Self {
            from: from.clone(),
            contract: contract.clone(),
            signature: C::SIGNATURE,
            calldata: call.abi_encode(),
        }
    }

    pub fn method(&self) -> &str {
        method_name(self.signature)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOverrides {
    pub gas_limit: Option<u64>,
}

/// Contract write capability provided by the signer.
#[async_trait]
pub trait ContractWriter: Send + Sync + fmt::Debug {
    async fn estimate_gas(&self, request: &WriteRequest) -> Result<u64, TransportError>;

    /// Returns the transaction hash.
    async fn send(
        &self,
        request: &WriteRequest,
        overrides: TxOverrides,
    ) -> Result<String, TransportError>;
}

/// Error type for transport operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 5xx server error)
    HttpError { status: u16, message: String },
    /// Error object returned by the JSON-RPC node
    RpcError { code: i64, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded
    RateLimited,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            TransportError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            TransportError::RpcError { code, message } => {
                write!(f, "RPC error {}: {}", code, message)
            }
            TransportError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            TransportError::RateLimited => write!(f, "Rate limited"),
        }
    }
}

impl std::error::Error for TransportError {}
