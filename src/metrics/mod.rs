// src/metrics/mod.rs
//! Engine counter aggregation
//!
//! Each unit of work produces its own `MetricsCollector`; the pipeline
//! combines them with `merge` after the tasks complete, so no counter is
//! ever shared between concurrent tasks. The collector only observes —
//! nothing reads it to make a control decision.

use serde::Serialize;
use std::collections::BTreeMap;
use std::iter::Sum;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsCollector {
    /// Units of work executed across all pipeline stages.
    pub tasks: u64,
    /// Block or row fragments produced by the generation stage.
    pub fragments: u64,
    /// Bytes of fragment payload produced by the generation stage.
    pub generated_bytes: u64,
    /// Bytes of fragment payload moved through the join.
    pub shuffle_bytes: u64,
    /// (A-block, B-block) pairs multiplied by the join output.
    pub pairs_multiplied: u64,
    /// Distinct output blocks after the reduce.
    pub output_blocks: u64,
    /// Bytes of reduced output payload.
    pub result_bytes: u64,
    /// Bytes spilled to scratch storage. The local pipeline never spills;
    /// a real scheduler backing the same contract would report here.
    pub spill_bytes: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associative, commutative combination of two counter sets.
    pub fn merge(mut self, other: Self) -> Self {
        self.tasks += other.tasks;
        self.fragments += other.fragments;
        self.generated_bytes += other.generated_bytes;
        self.shuffle_bytes += other.shuffle_bytes;
        self.pairs_multiplied += other.pairs_multiplied;
        self.output_blocks += other.output_blocks;
        self.result_bytes += other.result_bytes;
        self.spill_bytes += other.spill_bytes;
        self
    }

    /// Render the counters into a result metrics map.
    pub fn to_map(&self) -> BTreeMap<String, serde_json::Value> {
        let mut map = BTreeMap::new();
        map.insert("tasks".to_string(), self.tasks.into());
        map.insert("fragments".to_string(), self.fragments.into());
        map.insert("generatedBytes".to_string(), self.generated_bytes.into());
        map.insert("shuffleBytes".to_string(), self.shuffle_bytes.into());
        map.insert("pairsMultiplied".to_string(), self.pairs_multiplied.into());
        map.insert("outputBlocks".to_string(), self.output_blocks.into());
        map.insert("resultBytes".to_string(), self.result_bytes.into());
        map.insert("spillBytes".to_string(), self.spill_bytes.into());
        map
    }
}

impl Sum for MetricsCollector {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Self::merge)
    }
}
