//! In-memory chain, signer and price API for tests without network calls.

use super::contracts::IntoRawValue;
use super::{
    ContractReader, ContractWriter, PoolData, PriceApi, RawValue, ReadRequest, TransportError,
    TxOverrides, WriteRequest,
};
use crate::domain::Address;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Mock contract reader answering from a fixed table of calls.
///
/// Counts round-trips so tests can assert on batching and caching.
#[derive(Debug, Default)]
pub struct MockChain {
    values: Mutex<HashMap<ReadRequest, RawValue>>,
    failure: Mutex<Option<TransportError>>,
    batches: AtomicUsize,
    calls: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the value returned by `call` on `contract`.
    pub fn with_value<C>(self, contract: &Address, call: C, value: RawValue) -> Self
    where
        C: SolCall,
        C::Return: IntoRawValue,
    {
        self.set_value(contract, call, value);
        self
    }

    /// Change a value after the mock has been shared.
    pub fn set_value<C>(&self, contract: &Address, call: C, value: RawValue)
    where
        C: SolCall,
        C::Return: IntoRawValue,
    {
        let request = ReadRequest::new(contract, call);
        if let Ok(mut values) = self.values.lock() {
            values.insert(request, value);
        }
    }

    /// Make every following round-trip fail with `error` (or succeed again with `None`).
    pub fn set_failure(&self, error: Option<TransportError>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = error;
        }
    }

    /// Number of round-trips served (single calls and batches).
    pub fn batch_count(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    /// Number of individual calls served across all round-trips.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, request: &ReadRequest) -> Result<RawValue, TransportError> {
        let values = self
            .values
            .lock()
            .map_err(|_| TransportError::NetworkError("mock poisoned".to_string()))?;
        values.get(request).cloned().ok_or_else(|| TransportError::RpcError {
            code: -32000,
            message: format!("execution reverted: {}", request),
        })
    }

    fn check_failure(&self) -> Result<(), TransportError> {
        match self.failure.lock() {
            Ok(failure) => match failure.as_ref() {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            },
            Err(_) => Err(TransportError::NetworkError("mock poisoned".to_string())),
        }
    }
}

#[async_trait]
impl ContractReader for MockChain {
    async fn call(&self, request: &ReadRequest) -> Result<RawValue, TransportError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        self.lookup(request)
    }

    async fn batch_call(&self, requests: &[ReadRequest]) -> Result<Vec<RawValue>, TransportError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.calls.fetch_add(requests.len(), Ordering::SeqCst);
        self.check_failure()?;
        requests.iter().map(|r| self.lookup(r)).collect()
    }
}

/// Mock signer recording every estimate and send.
#[derive(Debug, Default)]
pub struct MockWriter {
    gas: u64,
    estimated: Mutex<Vec<WriteRequest>>,
    sent: Mutex<Vec<(WriteRequest, TxOverrides)>>,
}

impl MockWriter {
    pub fn new(gas: u64) -> Self {
        Self {
            gas,
            ..Default::default()
        }
    }

    pub fn estimated(&self) -> Vec<WriteRequest> {
        self.estimated.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn sent(&self) -> Vec<(WriteRequest, TxOverrides)> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ContractWriter for MockWriter {
    async fn estimate_gas(&self, request: &WriteRequest) -> Result<u64, TransportError> {
        if let Ok(mut estimated) = self.estimated.lock() {
            estimated.push(request.clone());
        }
        Ok(self.gas)
    }

    async fn send(
        &self,
        request: &WriteRequest,
        overrides: TxOverrides,
    ) -> Result<String, TransportError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| TransportError::NetworkError("mock poisoned".to_string()))?;
        sent.push((request.clone(), overrides));
        Ok(format!("0x{:064x}", sent.len()))
    }
}

/// Mock price API keyed by factory type.
#[derive(Debug, Default)]
pub struct MockPriceApi {
    pools: HashMap<String, Vec<PoolData>>,
    requests: AtomicUsize,
}

impl MockPriceApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pools(mut self, factory_type: &str, pools: Vec<PoolData>) -> Self {
        self.pools.insert(factory_type.to_string(), pools);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceApi for MockPriceApi {
    async fn fetch_pools(
        &self,
        _network: &str,
        factory_type: &str,
    ) -> Result<Vec<PoolData>, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.pools.get(factory_type).cloned().unwrap_or_default())
    }
}
