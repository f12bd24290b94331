use crate::identity::Identities;
use crate::types::MonthlyRecord;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::OnceCell;

/// An immutable copy of the source table as of `captured_at`.
///
/// The identity index is built on first use and lives exactly as long as the
/// snapshot, so a refreshed snapshot always gets a fresh index.
#[derive(Debug)]
pub struct Snapshot {
    records: Vec<MonthlyRecord>,
    captured_at: DateTime<Utc>,
    identities: OnceCell<Identities>,
}

impl Snapshot {
    pub fn new(records: Vec<MonthlyRecord>, captured_at: DateTime<Utc>) -> Self {
        Self {
            records,
            captured_at,
            identities: OnceCell::new(),
        }
    }

    pub fn records(&self) -> &[MonthlyRecord] {
        &self.records
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.captured_at)
    }

    pub fn identities(&self) -> &Identities {
        self.identities.get_or_init(|| Identities::build(&self.records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
