use ironloop_config::SampleStrategy;
use rand::seq::index;
use serde_json::{Value, json};

use super::ResultProcessor;

/// Keep a representative subset of list-shaped payloads.
///
/// Output is `{items, total_count, sample_size, strategy}`. Non-lists and
/// lists no longer than `sample_size` pass through unchanged.
#[derive(Debug, Clone)]
pub struct Sample {
    sample_size: usize,
    strategy: SampleStrategy,
}

impl Sample {
    pub fn new(sample_size: usize, strategy: SampleStrategy) -> Self {
        Self {
            sample_size,
            strategy,
        }
    }

    /// Indices to keep, ascending, for a list of `len > sample_size` items.
    fn pick(&self, len: usize) -> Vec<usize> {
        let n = self.sample_size;
        match self.strategy {
            SampleStrategy::First => (0..n).collect(),
            SampleStrategy::Distributed => (0..n).map(|i| i * len / n).collect(),
            SampleStrategy::Random => {
                let mut picked = index::sample(&mut rand::rng(), len, n).into_vec();
                picked.sort_unstable();
                picked
            }
        }
    }
}

impl ResultProcessor for Sample {
    fn name(&self) -> &str {
        "sample"
    }

    fn process_value(&self, value: Value) -> Value {
        let Value::Array(items) = value else {
            return value;
        };
        if items.len() <= self.sample_size {
            return Value::Array(items);
        }

        let total_count = items.len();
        let picked: Vec<Value> = self
            .pick(total_count)
            .into_iter()
            .map(|i| items[i].clone())
            .collect();

        json!({
            "items": picked,
            "total_count": total_count,
            "sample_size": self.sample_size,
            "strategy": self.strategy,
        })
    }
}
