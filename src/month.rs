//! Canonical `YYYY-MM` month keys.
//!
//! Report months arrive as form labels like `"Apr (4/2025)"`. Only the
//! numeric parenthetical is authoritative; the month name is ignored.

use crate::types::MonthlyRecord;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static MONTH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((\d{1,2})/(\d{4})\)").expect("month pattern compiles"));

/// Parse a raw report-month label into its canonical key.
///
/// Returns `None` for absent, blank or unrecognised labels, for years that
/// are not four digits, and for month numbers outside 1..=12.
pub fn parse_report_month(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    let caps = MONTH_PATTERN.captures(raw)?;
    let month: u32 = caps[1].parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    let year = &caps[2];
    Some(format!("{}-{:02}", year, month))
}

/// The canonical key of the month containing `date`.
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// The `count` month keys ending at the month of `today`, oldest first.
pub fn trailing_months(today: NaiveDate, count: usize) -> Vec<String> {
    let mut year = today.year();
    let mut month = today.month();
    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        keys.push(format!("{:04}-{:02}", year, month));
        if month == 1 {
            month = 12;
            year -= 1;
        } else {
            month -= 1;
        }
    }
    keys.reverse();
    keys
}

/// Distinct parseable months present in the records, newest first.
pub fn available_months(records: &[MonthlyRecord]) -> Vec<String> {
    let months: BTreeSet<String> = records
        .iter()
        .filter_map(|r| parse_report_month(r.report_month.as_deref()))
        .collect();
    months.into_iter().rev().collect()
}

/// Inclusive range check on canonical keys; open ends accept everything.
pub fn month_in_range(key: &str, start: Option<&str>, end: Option<&str>) -> bool {
    start.map_or(true, |s| key >= s) && end.map_or(true, |e| key <= e)
}
