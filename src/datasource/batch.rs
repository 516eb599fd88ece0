//! Aggregation of independent reads into as few round-trips as possible.

use super::{ContractReader, RawValue, ReadRequest};
use crate::error::LendError;
use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Field name → one value per entity, in entity order.
pub type Demuxed = BTreeMap<String, Vec<RawValue>>;

/// Submits read requests in batches and hands results back in request order.
///
/// A batch is atomic: if any chunk fails the whole call fails.
#[derive(Debug, Clone)]
pub struct BatchReader {
    reader: Arc<dyn ContractReader>,
    max_batch_size: usize,
}

impl BatchReader {
    pub fn new(reader: Arc<dyn ContractReader>, max_batch_size: usize) -> Self {
        Self {
            reader,
            max_batch_size: max_batch_size.max(1),
        }
    }

    /// Read every request; result `i` answers request `i`.
    pub async fn batch(&self, calls: Vec<ReadRequest>) -> Result<Vec<RawValue>, LendError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let chunks: Vec<&[ReadRequest]> = calls.chunks(self.max_batch_size).collect();
        debug!(
            "Submitting batch of {} calls in {} round-trip(s)",
            calls.len(),
            chunks.len()
        );

        let results = try_join_all(chunks.iter().map(|chunk| async move {
            let values = self.reader.batch_call(chunk).await?;
            if values.len() != chunk.len() {
                return Err(LendError::batch_read(format!(
                    "transport returned {} results for {} calls",
                    values.len(),
                    chunk.len()
                )));
            }
            Ok::<_, LendError>(values)
        }))
        .await?;

        Ok(results.into_iter().flatten().collect())
    }

    /// Convenience for a single read that still goes through the batch path.
    pub async fn read_one(&self, call: ReadRequest) -> Result<RawValue, LendError> {
        self.batch(vec![call])
            .await?
            .pop()
            .ok_or_else(|| LendError::batch_read("empty batch result"))
    }
}

/// Split a flat result list into per-field columns.
///
/// Callers emit the reads of every entity in the same field order, so result
/// `i * fields.len() + j` belongs to field `j` of entity `i`.
pub fn demux(flat: Vec<RawValue>, fields: &[&str]) -> Result<Demuxed, LendError> {
    if fields.is_empty() {
        return Err(LendError::domain("demux needs at least one field"));
    }
    if flat.len() % fields.len() != 0 {
        return Err(LendError::batch_read(format!(
            "{} results do not divide into groups of {}",
            flat.len(),
            fields.len()
        )));
    }

    let groups = flat.len() / fields.len();
    let mut out: Demuxed = fields
        .iter()
        .map(|f| (f.to_string(), Vec::with_capacity(groups)))
        .collect();
    for (i, value) in flat.into_iter().enumerate() {
        let field = fields[i % fields.len()];
        if let Some(column) = out.get_mut(field) {
            column.push(value);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{int256, ILlamma, MockChain};
    use crate::domain::Address;
    use alloy_primitives::U256;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address::from_bytes(bytes)
    }

    fn uint(v: u64) -> RawValue {
        RawValue::Uint(U256::from(v))
    }

    fn bands_x(n: i128) -> ILlamma::bands_xCall {
        ILlamma::bands_xCall { n: int256(n) }
    }

    fn bands_y(n: i128) -> ILlamma::bands_yCall {
        ILlamma::bands_yCall { n: int256(n) }
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let amm = addr(1);
        let chain = MockChain::new()
            .with_value(&amm, bands_x(1), uint(10))
            .with_value(&amm, bands_x(2), uint(20))
            .with_value(&amm, bands_x(3), uint(30));
        let chain = Arc::new(chain);
        let reader = BatchReader::new(chain.clone(), 500);

        let calls = (1..=3)
            .rev()
            .map(|n| ReadRequest::new(&amm, bands_x(n)))
            .collect();
        let values = reader.batch(calls).await.unwrap();
        assert_eq!(values, vec![uint(30), uint(20), uint(10)]);
        assert_eq!(chain.batch_count(), 1);
    }

    #[tokio::test]
    async fn test_batch_chunks_by_max_size() {
        let amm = addr(1);
        let mut chain = MockChain::new();
        for n in 0..5 {
            chain = chain.with_value(&amm, bands_y(n), uint(n as u64));
        }
        let chain = Arc::new(chain);
        let reader = BatchReader::new(chain.clone(), 2);

        let calls = (0..5)
            .map(|n| ReadRequest::new(&amm, bands_y(n)))
            .collect();
        let values = reader.batch(calls).await.unwrap();
        assert_eq!(values, (0..5).map(uint).collect::<Vec<_>>());
        assert_eq!(chain.batch_count(), 3);
    }

    #[tokio::test]
    async fn test_batch_fails_atomically() {
        let amm = addr(1);
        let chain = Arc::new(MockChain::new().with_value(&amm, ILlamma::feeCall {}, uint(1)));
        let reader = BatchReader::new(chain, 500);

        // Second call is unknown to the mock, so the whole batch fails.
        let calls = vec![
            ReadRequest::new(&amm, ILlamma::feeCall {}),
            ReadRequest::new(&amm, ILlamma::admin_feeCall {}),
        ];
        let result = reader.batch(calls).await;
        assert!(matches!(result, Err(LendError::BatchRead(_))));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_network() {
        let chain = Arc::new(MockChain::new());
        let reader = BatchReader::new(chain.clone(), 500);
        assert!(reader.batch(Vec::new()).await.unwrap().is_empty());
        assert_eq!(chain.batch_count(), 0);
    }

    #[test]
    fn test_demux_groups_by_field() {
        let flat = vec![uint(1), uint(2), uint(3), uint(4), uint(5), uint(6)];
        let out = demux(flat, &["controller", "amm"]).unwrap();
        assert_eq!(out["controller"], vec![uint(1), uint(3), uint(5)]);
        assert_eq!(out["amm"], vec![uint(2), uint(4), uint(6)]);
    }

    #[test]
    fn test_demux_rejects_ragged_input() {
        let flat = vec![uint(1), uint(2), uint(3)];
        assert!(matches!(
            demux(flat, &["a", "b"]),
            Err(LendError::BatchRead(_))
        ));
    }
}
