use ahash::RandomState;
use std::collections::{HashMap as StdHashMap, HashSet as StdHashSet};

pub type HashMap<K, V> = StdHashMap<K, V, RandomState>;
pub type HashSet<K> = StdHashSet<K, RandomState>;

/// Linear interpolation between two values. Returns a value between `start` and
/// `end` based on the interpolation parameter `t` (typically 0.0 to 1.0).
pub fn lerp(start: f32, end: f32, t: f32) -> f32 {
    end * t + start * (1.0 - t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_hits_endpoints_exactly() {
        assert_eq!(lerp(100.0, 50.0, 0.0), 100.0);
        assert_eq!(lerp(100.0, 50.0, 1.0), 50.0);
        assert_eq!(lerp(100.0, 50.0, 0.25), 87.5);
    }
}
