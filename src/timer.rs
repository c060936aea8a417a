use std::collections::HashMap;

use indexmap::IndexMap;

use crate::value::Value;

/// Per-thread aggregator of Stopwatch samples, indexed by a frame's position
/// within its thread (not its absolute frame index).
#[derive(Debug, Default)]
pub struct Timer {
    /// frame-index-in-thread -> (stopwatch name -> duration_us)
    samples: HashMap<usize, IndexMap<String, u32>>,
}

impl Timer {
    pub fn new() -> Self {
        Timer::default()
    }

    /// Reserves slots for every frame index this thread will ever report,
    /// matching the original's explicit `initStorage` step.
    pub fn init_storage(&mut self, frame_indices: impl IntoIterator<Item = usize>) {
        for idx in frame_indices {
            self.samples.entry(idx).or_default();
        }
    }

    /// Merges a decoded Stopwatch message's samples into the slot for
    /// `frame_index_in_thread`.
    pub fn parse_stopwatch(&mut self, stopwatch: &Value, frame_index_in_thread: usize) {
        let entry = self.samples.entry(frame_index_in_thread).or_default();
        if let Some(items) = stopwatch.field("samples").and_then(|v| match v {
            Value::Array(items) => Some(items),
            _ => None,
        }) {
            for item in items {
                let name = item.field("name").and_then(Value::as_str).unwrap_or_default().to_string();
                if let Some(duration) = item.field("duration_us").and_then(Value::as_u32) {
                    entry.insert(name, duration);
                }
            }
        }
    }

    /// The aggregated representation used in place of a raw Stopwatch
    /// message's own `reprDict`.
    pub fn get_stopwatch(&self, frame_index_in_thread: usize) -> Value {
        let mut map = IndexMap::new();
        if let Some(entry) = self.samples.get(&frame_index_in_thread) {
            for (name, duration) in entry {
                map.insert(name.clone(), Value::U32(*duration));
            }
        }
        Value::Record(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stopwatch_value(samples: &[(&str, u32)]) -> Value {
        let items = samples
            .iter()
            .map(|(n, d)| {
                Value::Record(IndexMap::from_iter([
                    ("name".to_string(), Value::Str((*n).to_string())),
                    ("duration_us".to_string(), Value::U32(*d)),
                ]))
            })
            .collect();
        Value::Record(IndexMap::from_iter([("samples".to_string(), Value::Array(items))]))
    }

    #[test]
    fn merges_named_samples_by_frame_index() {
        let mut timer = Timer::new();
        timer.parse_stopwatch(&stopwatch_value(&[("motion", 120)]), 3);
        timer.parse_stopwatch(&stopwatch_value(&[("perception", 80)]), 3);
        let dict = timer.get_stopwatch(3);
        assert_eq!(dict.field("motion").unwrap().clone(), Value::U32(120));
        assert_eq!(dict.field("perception").unwrap().clone(), Value::U32(80));
    }

    #[test]
    fn unknown_frame_index_yields_empty_dict() {
        let timer = Timer::new();
        let dict = timer.get_stopwatch(7);
        assert_eq!(dict.as_record().unwrap().len(), 0);
    }
}
