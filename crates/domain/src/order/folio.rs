//! Human-facing order references.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Prefix every generated folio starts with.
pub const FOLIO_PREFIX: &str = "ORD-";

/// A unique order reference such as `ORD-1760793600123`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Folio(String);

impl Folio {
    /// Wraps an existing folio string (e.g. one typed by the user or read
    /// back from storage).
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Millisecond stamp encoded in a generated folio.
    pub fn millis(&self) -> Option<i64> {
        self.0.strip_prefix(FOLIO_PREFIX)?.parse().ok()
    }
}

impl std::fmt::Display for Folio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Folio {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Issues time-derived folios that are strictly increasing within a process.
///
/// Two requests landing in the same millisecond get consecutive stamps
/// rather than a collision.
#[derive(Debug, Default)]
pub struct FolioGenerator {
    last: AtomicI64,
}

impl FolioGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> Folio {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self.last.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Folio(format!("{FOLIO_PREFIX}{candidate}")),
                Err(current) => last = current,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_folio_format() {
        let folio = FolioGenerator::new().next();
        assert!(folio.as_str().starts_with(FOLIO_PREFIX));
        assert!(folio.millis().is_some());
    }

    #[test]
    fn test_thousand_folios_are_unique() {
        let generator = FolioGenerator::new();
        let folios: HashSet<Folio> = (0..1000).map(|_| generator.next()).collect();
        assert_eq!(folios.len(), 1000);
    }

    #[test]
    fn test_unique_across_threads() {
        let generator = Arc::new(FolioGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || (0..250).map(|_| generator.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }
        assert_eq!(all.len(), 1000);
    }

    #[test]
    fn test_new_trims_input() {
        assert_eq!(Folio::new("  ORD-42 ").as_str(), "ORD-42");
        assert_eq!(Folio::from("ORD-42").millis(), Some(42));
        assert_eq!(Folio::from("X-42").millis(), None);
    }
}
