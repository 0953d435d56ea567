use std::collections::BTreeMap;

use super::classifier::Classified;
use super::models::{ContractRecord, UnderlyingQuote};

/// A contract record stamped with the order it was accepted in
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub seq: u64,
    pub record: ContractRecord,
}

/// Current authoritative state for one subscription scope.
///
/// Only `apply`, `upsert_contract` and `clear` mutate it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainSnapshot {
    underlying: Option<UnderlyingQuote>,
    contracts: BTreeMap<String, SnapshotEntry>,
    next_seq: u64,
}

impl ChainSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one classified message into the snapshot.
    ///
    /// Returns `true` when the snapshot changed.
    pub fn apply(&mut self, message: Classified) -> bool {
        match message {
            Classified::UnderlyingQuote(quote) => {
                self.underlying = Some(quote);
                true
            }
            Classified::ContractUpdate(record) => {
                self.upsert_contract(record);
                true
            }
            Classified::Ignored(_) => false,
        }
    }

    /// Remove any record with the same symbol, then insert this one.
    ///
    /// Full replace: fields absent from `record` are absent afterwards.
    /// Returns the record it replaced.
    pub fn upsert_contract(&mut self, record: ContractRecord) -> Option<ContractRecord> {
        let previous = self.contracts.remove(&record.symbol).map(|e| e.record);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.contracts
            .insert(record.symbol.clone(), SnapshotEntry { seq, record });
        previous
    }

    pub fn clear(&mut self) {
        self.underlying = None;
        self.contracts.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.underlying.is_none() && self.contracts.is_empty()
    }

    pub fn underlying(&self) -> Option<&UnderlyingQuote> {
        self.underlying.as_ref()
    }

    pub fn contract(&self, symbol: &str) -> Option<&ContractRecord> {
        self.contracts.get(symbol).map(|e| &e.record)
    }

    /// Entries ordered by contract symbol
    pub fn entries(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.contracts.values()
    }

    pub fn contract_count(&self) -> usize {
        self.contracts.len()
    }
}
