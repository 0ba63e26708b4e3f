//! Best-effort memory size estimation for cache diagnostics

use bytes::Bytes;
use std::sync::Arc;

/// Approximate heap footprint of a cached value, in bytes.
///
/// Only used for `CacheStatistics::estimated_size`; never for eviction.
pub trait EstimateSize {
    fn estimated_size(&self) -> usize;
}

impl EstimateSize for str {
    fn estimated_size(&self) -> usize {
        self.len()
    }
}

impl EstimateSize for String {
    fn estimated_size(&self) -> usize {
        self.len()
    }
}

impl EstimateSize for Bytes {
    fn estimated_size(&self) -> usize {
        self.len()
    }
}

impl EstimateSize for u8 {
    fn estimated_size(&self) -> usize {
        1
    }
}

impl EstimateSize for bool {
    fn estimated_size(&self) -> usize {
        4
    }
}

macro_rules! fixed_size {
    ($($t:ty),*) => {
        $(impl EstimateSize for $t {
            fn estimated_size(&self) -> usize {
                8
            }
        })*
    };
}

fixed_size!(u16, u32, u64, usize, i32, i64, f32, f64);

impl<T: EstimateSize> EstimateSize for Vec<T> {
    fn estimated_size(&self) -> usize {
        self.iter().map(EstimateSize::estimated_size).sum()
    }
}

impl<T: EstimateSize> EstimateSize for Option<T> {
    fn estimated_size(&self) -> usize {
        self.as_ref().map_or(0, EstimateSize::estimated_size)
    }
}

impl<T: EstimateSize + ?Sized> EstimateSize for Arc<T> {
    fn estimated_size(&self) -> usize {
        (**self).estimated_size()
    }
}

impl EstimateSize for serde_json::Value {
    fn estimated_size(&self) -> usize {
        use serde_json::Value;
        match self {
            Value::Null => 0,
            Value::Bool(_) => 4,
            Value::Number(_) => 8,
            Value::String(s) => s.len(),
            Value::Array(items) => items.iter().map(EstimateSize::estimated_size).sum(),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| k.len() + v.estimated_size())
                .sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_estimate_walks_nested_values() {
        let value = json!({"mean": 1.5, "tags": ["ok", "x"], "label": "abcd"});
        // keys: mean(4)+tags(4)+label(5), number 8, strings 2+1+4
        assert_eq!(value.estimated_size(), 4 + 8 + 4 + 3 + 5 + 4);
    }

    #[test]
    fn test_bytes_estimate_is_length() {
        assert_eq!(Bytes::from_static(&[0u8; 64]).estimated_size(), 64);
        assert_eq!(None::<String>.estimated_size(), 0);
    }
}
