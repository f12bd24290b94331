//! Rolling twelve-month reporting completeness.
//!
//! Facilities carry a reported/not-reported flag per month. Districts and
//! regions carry the share of their facilities that reported. Regions are
//! computed from facility totals across all their districts, not from the
//! district percentages, so small districts do not skew the region figure.

use crate::identity::{DistrictIdentity, Identities, RegionIdentity};
use crate::month::{parse_report_month, trailing_months};
use crate::snapshot::Snapshot;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

pub const WINDOW_MONTHS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Region,
    District,
    Facility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Coverage {
    Reported(BTreeMap<String, bool>),
    Percent(BTreeMap<String, u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletenessNode {
    pub kind: NodeKind,
    pub id: String,
    pub name: String,
    pub months: Coverage,
    pub children: Vec<CompletenessNode>,
}

impl CompletenessNode {
    /// Percentage for `month`, or the 0/100 equivalent of a facility flag.
    pub fn percent(&self, month: &str) -> Option<u8> {
        match &self.months {
            Coverage::Percent(m) => m.get(month).copied(),
            Coverage::Reported(m) => m.get(month).map(|r| if *r { 100 } else { 0 }),
        }
    }

    pub fn reported(&self, month: &str) -> Option<bool> {
        match &self.months {
            Coverage::Reported(m) => m.get(month).copied(),
            Coverage::Percent(_) => None,
        }
    }
}

/// round(100 × reporting / total), halves rounded up; 0 when there is
/// nothing to report.
pub fn percent(reporting: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((200 * reporting + total) / (2 * total)) as u8
}

/// Completeness tree for the twelve months ending at the current month.
pub fn completeness(
    snapshot: &Snapshot,
    region_id: Option<&str>,
    district_id: Option<&str>,
) -> Vec<CompletenessNode> {
    completeness_at(snapshot, region_id, district_id, Utc::now().date_naive())
}

pub fn completeness_at(
    snapshot: &Snapshot,
    region_id: Option<&str>,
    district_id: Option<&str>,
    today: NaiveDate,
) -> Vec<CompletenessNode> {
    let window = trailing_months(today, WINDOW_MONTHS);
    let in_window: HashSet<&str> = window.iter().map(String::as_str).collect();

    // A facility reports in a month if it has at least one row for it.
    let mut reported: HashSet<(&str, String)> = HashSet::new();
    for r in snapshot.records() {
        if let Some(key) = parse_report_month(r.report_month.as_deref()) {
            if in_window.contains(key.as_str()) {
                reported.insert((r.facility_id.as_str(), key));
            }
        }
    }

    let ids = snapshot.identities();
    let builder = TreeBuilder {
        ids,
        window: &window,
        reported: &reported,
    };

    ids.regions()
        .iter()
        .filter(|r| region_id.map_or(true, |rid| r.id == rid))
        .filter_map(|region| builder.region(region, district_id))
        .collect()
}

struct TreeBuilder<'a> {
    ids: &'a Identities,
    window: &'a [String],
    reported: &'a HashSet<(&'a str, String)>,
}

/// Per-month reporting counts over a fixed facility population.
struct Tally {
    reporting: Vec<usize>,
    facilities: usize,
}

impl Tally {
    fn new(months: usize) -> Self {
        Self {
            reporting: vec![0; months],
            facilities: 0,
        }
    }

    fn absorb(&mut self, other: &Tally) {
        for (mine, theirs) in self.reporting.iter_mut().zip(&other.reporting) {
            *mine += theirs;
        }
        self.facilities += other.facilities;
    }
}

impl<'a> TreeBuilder<'a> {
    fn percentages(&self, tally: &Tally) -> Coverage {
        Coverage::Percent(
            self.window
                .iter()
                .zip(&tally.reporting)
                .map(|(m, n)| (m.clone(), percent(*n, tally.facilities)))
                .collect(),
        )
    }

    fn region(&self, region: &RegionIdentity, district_id: Option<&str>) -> Option<CompletenessNode> {
        let districts: Vec<&DistrictIdentity> = self
            .ids
            .districts_of_region_id(&region.id)
            .into_iter()
            .filter(|d| district_id.map_or(true, |did| d.id == did))
            .collect();
        if district_id.is_some() && districts.is_empty() {
            return None;
        }

        let mut tally = Tally::new(self.window.len());
        let mut children = Vec::with_capacity(districts.len());
        for district in districts {
            let (node, district_tally) = self.district(district);
            tally.absorb(&district_tally);
            children.push(node);
        }

        Some(CompletenessNode {
            kind: NodeKind::Region,
            id: region.id.clone(),
            name: region.name.clone(),
            months: self.percentages(&tally),
            children,
        })
    }

    fn district(&self, district: &DistrictIdentity) -> (CompletenessNode, Tally) {
        let mut tally = Tally::new(self.window.len());
        let mut children = Vec::new();
        for facility in self.ids.facilities_of_district(&district.region_id, &district.id) {
            let flags: Vec<bool> = self
                .window
                .iter()
                .map(|m| self.reported.contains(&(facility.id.as_str(), m.clone())))
                .collect();
            for (count, flag) in tally.reporting.iter_mut().zip(&flags) {
                if *flag {
                    *count += 1;
                }
            }
            tally.facilities += 1;
            let months: BTreeMap<String, bool> = self.window.iter().cloned().zip(flags).collect();
            children.push(CompletenessNode {
                kind: NodeKind::Facility,
                id: facility.id.clone(),
                name: facility.name.clone(),
                months: Coverage::Reported(months),
                children: Vec::new(),
            });
        }

        let node = CompletenessNode {
            kind: NodeKind::District,
            id: district.id.clone(),
            name: district.name.clone(),
            months: self.percentages(&tally),
            children,
        };
        (node, tally)
    }
}

/// Flatten a forest into `(kind, id, name, month → percent)` rows for tabular
/// output, parents before children.
pub fn flatten(nodes: &[CompletenessNode]) -> Vec<(NodeKind, String, String, BTreeMap<String, u8>)> {
    let mut out = Vec::new();
    let mut stack: Vec<&CompletenessNode> = nodes.iter().rev().collect();
    while let Some(node) = stack.pop() {
        let months = match &node.months {
            Coverage::Percent(m) => m.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            Coverage::Reported(m) => m
                .iter()
                .map(|(k, v)| (k.clone(), if *v { 100 } else { 0 }))
                .collect(),
        };
        out.push((node.kind, node.id.clone(), node.name.clone(), months));
        stack.extend(node.children.iter().rev());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MonthlyRecord;

    fn rec(fac: &str, region: &str, district: &str, month: Option<&str>) -> MonthlyRecord {
        MonthlyRecord {
            facility_id: fac.into(),
            facility_name: fac.into(),
            region_id: region.into(),
            region_name: format!("{} name", region),
            district_id: district.into(),
            district_name: format!("{} name", district),
            report_month: month.map(String::from),
            ..Default::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(1, 10), 10);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(4, 4), 100);
    }

    #[test]
    fn region_uses_facility_totals_not_district_mean() {
        let mut records = vec![rec("A1", "R1", "DA", Some("May (5/2025)"))];
        for i in 0..9 {
            records.push(rec(&format!("B{}", i), "R1", "DB", Some("Jan (1/2020)")));
        }
        let snapshot = Snapshot::new(records, Utc::now());
        let forest = completeness_at(&snapshot, None, None, today());
        assert_eq!(forest.len(), 1);
        let region = &forest[0];
        assert_eq!(region.percent("2025-05"), Some(10));
        assert_eq!(region.children[0].percent("2025-05"), Some(100));
        assert_eq!(region.children[1].percent("2025-05"), Some(0));
    }

    #[test]
    fn facilities_appear_even_without_reports_in_window() {
        let records = vec![
            rec("F1", "R1", "D1", Some("Apr (4/2025)")),
            rec("F1", "R1", "D1", Some("Apr (4/2025)")),
            rec("F2", "R1", "D1", Some("Apr (4/2023)")),
            rec("F3", "R1", "D1", None),
        ];
        let snapshot = Snapshot::new(records, Utc::now());
        let forest = completeness_at(&snapshot, Some("R1"), Some("D1"), today());
        let district = &forest[0].children[0];
        assert_eq!(district.children.len(), 3);
        assert_eq!(district.children[0].reported("2025-04"), Some(true));
        assert_eq!(district.children[0].reported("2025-05"), Some(false));
        assert_eq!(district.children[1].reported("2025-04"), Some(false));
        assert_eq!(district.percent("2025-04"), Some(33));
        assert_eq!(district.percent("2025-03"), Some(0));
    }

    #[test]
    fn every_node_covers_the_whole_window() {
        let snapshot = Snapshot::new(vec![rec("F1", "R1", "D1", Some("May (5/2025)"))], Utc::now());
        let forest = completeness_at(&snapshot, None, None, today());
        for (_, _, _, months) in flatten(&forest) {
            assert_eq!(months.len(), WINDOW_MONTHS);
            assert!(months.contains_key("2024-06"));
            assert!(months.contains_key("2025-05"));
            assert!(!months.contains_key("2024-05"));
        }
    }

    #[test]
    fn region_without_facilities_is_zero() {
        let snapshot = Snapshot::new(vec![rec("", "R1", "D1", Some("May (5/2025)"))], Utc::now());
        let forest = completeness_at(&snapshot, None, None, today());
        assert_eq!(forest[0].percent("2025-05"), Some(0));
        assert_eq!(forest[0].children[0].percent("2025-05"), Some(0));
        assert!(forest[0].children[0].children.is_empty());
    }

    #[test]
    fn filters_select_scope() {
        let snapshot = Snapshot::new(
            vec![
                rec("F1", "R1", "D1", Some("May (5/2025)")),
                rec("F2", "R1", "D2", Some("May (5/2025)")),
                rec("F3", "R2", "D3", Some("May (5/2025)")),
            ],
            Utc::now(),
        );
        assert_eq!(completeness_at(&snapshot, None, None, today()).len(), 2);
        let only_r2 = completeness_at(&snapshot, Some("R2"), None, today());
        assert_eq!(only_r2.len(), 1);
        assert_eq!(only_r2[0].id, "R2");
        let d2 = completeness_at(&snapshot, None, Some("D2"), today());
        assert_eq!(d2.len(), 1);
        assert_eq!(d2[0].children.len(), 1);
        assert_eq!(d2[0].children[0].id, "D2");
        assert!(completeness_at(&snapshot, Some("R404"), None, today()).is_empty());
        assert!(completeness_at(&Snapshot::new(Vec::new(), Utc::now()), None, None, today()).is_empty());
    }
}
