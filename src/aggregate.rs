//! Patient and vaccine-stock sums at region, district or facility level.

use crate::month::parse_report_month;
use crate::snapshot::Snapshot;
use crate::types::{AggregateRow, MonthlyRecord};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Region,
    District,
    Facility,
}

impl Level {
    /// Filters must be supplied top-down; a district without its region has
    /// no level.
    pub fn for_filters(region_id: Option<&str>, district_id: Option<&str>) -> Option<Level> {
        match (region_id, district_id) {
            (None, None) => Some(Level::Region),
            (Some(_), None) => Some(Level::District),
            (Some(_), Some(_)) => Some(Level::Facility),
            (None, Some(_)) => None,
        }
    }

    fn key<'a>(&self, r: &'a MonthlyRecord) -> &'a str {
        match self {
            Level::Region => &r.region_id,
            Level::District => &r.district_id,
            Level::Facility => &r.facility_id,
        }
    }
}

#[derive(Default, Clone, Copy)]
struct Acc {
    patients: u64,
    vaccine_stock: u64,
}

/// Group the snapshot one level below the given scope and sum each member.
///
/// Every member of the scope gets a row, including members whose rows all
/// fall outside `month`. Unknown scope IDs yield an empty result.
pub fn aggregate(
    snapshot: &Snapshot,
    region_id: Option<&str>,
    district_id: Option<&str>,
    month: Option<&str>,
) -> Vec<AggregateRow> {
    let Some(level) = Level::for_filters(region_id, district_id) else {
        warn!(?district_id, "district filter without region filter is not supported");
        return Vec::new();
    };
    let ids = snapshot.identities();

    // Members come from the unfiltered snapshot so that a month filter can
    // zero a member but never remove it.
    let members: Vec<AggregateRow> = match (region_id, district_id) {
        (None, None) => ids
            .regions()
            .iter()
            .map(|r| AggregateRow {
                region_id: r.id.clone(),
                region_name: r.name.clone(),
                district_id: None,
                district_name: None,
                facility_id: None,
                facility_name: None,
                patients: 0,
                vaccine_stock: 0,
            })
            .collect(),
        (Some(rid), None) => {
            let Some(region) = ids.region_by_id(rid) else {
                debug!(region_id = rid, "unknown region");
                return Vec::new();
            };
            ids.districts_of_region_id(rid)
                .into_iter()
                .map(|d| AggregateRow {
                    region_id: region.id.clone(),
                    region_name: region.name.clone(),
                    district_id: Some(d.id.clone()),
                    district_name: Some(d.name.clone()),
                    facility_id: None,
                    facility_name: None,
                    patients: 0,
                    vaccine_stock: 0,
                })
                .collect()
        }
        (Some(rid), Some(did)) => {
            let (Some(region), Some(district)) = (ids.region_by_id(rid), ids.district_by_id(rid, did))
            else {
                debug!(region_id = rid, district_id = did, "unknown region or district");
                return Vec::new();
            };
            ids.facilities_of_district(rid, did)
                .into_iter()
                .map(|f| AggregateRow {
                    region_id: region.id.clone(),
                    region_name: region.name.clone(),
                    district_id: Some(district.id.clone()),
                    district_name: Some(district.name.clone()),
                    facility_id: Some(f.id.clone()),
                    facility_name: Some(f.name.clone()),
                    patients: 0,
                    vaccine_stock: 0,
                })
                .collect()
        }
        (None, Some(_)) => return Vec::new(),
    };

    let mut sums: HashMap<&str, Acc> = HashMap::new();
    for r in snapshot.records() {
        // Rows that do not reach a facility cannot appear in the drill-down,
        // so they are left out at every level to keep the totals consistent.
        if r.region_id.is_empty() || r.district_id.is_empty() || r.facility_id.is_empty() {
            continue;
        }
        if region_id.is_some_and(|rid| r.region_id != rid) {
            continue;
        }
        if district_id.is_some_and(|did| r.district_id != did) {
            continue;
        }
        if let Some(m) = month {
            if parse_report_month(r.report_month.as_deref()).as_deref() != Some(m) {
                continue;
            }
        }
        let e = sums.entry(level.key(r)).or_default();
        e.patients = e.patients.saturating_add(r.patients);
        e.vaccine_stock = e.vaccine_stock.saturating_add(r.vaccine_vials);
    }

    members
        .into_iter()
        .map(|mut row| {
            let key = match level {
                Level::Region => Some(row.region_id.as_str()),
                Level::District => row.district_id.as_deref(),
                Level::Facility => row.facility_id.as_deref(),
            };
            if let Some(acc) = key.and_then(|k| sums.get(k)) {
                row.patients = acc.patients;
                row.vaccine_stock = acc.vaccine_stock;
            }
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rec(fac: &str, region: (&str, &str), district: (&str, &str), p: u64, v: u64, month: &str) -> MonthlyRecord {
        MonthlyRecord {
            facility_id: fac.into(),
            facility_name: format!("{} Dispensary", fac),
            region_id: region.0.into(),
            region_name: region.1.into(),
            district_id: district.0.into(),
            district_name: district.1.into(),
            patients: p,
            vaccine_vials: v,
            report_month: Some(month.into()),
            ..Default::default()
        }
    }

    fn snap(records: Vec<MonthlyRecord>) -> Snapshot {
        Snapshot::new(records, Utc::now())
    }

    const ARUSHA: (&str, &str) = ("R1", "Arusha");
    const RURAL: (&str, &str) = ("D1", "Arusha Rural");

    #[test]
    fn single_row_scenario_at_every_level() {
        let s = snap(vec![rec("F1", ARUSHA, RURAL, 5, 10, "Apr (4/2025)")]);

        let regions = aggregate(&s, None, None, None);
        assert_eq!(
            regions,
            vec![AggregateRow {
                region_id: "R1".into(),
                region_name: "Arusha".into(),
                district_id: None,
                district_name: None,
                facility_id: None,
                facility_name: None,
                patients: 5,
                vaccine_stock: 10,
            }]
        );

        let districts = aggregate(&s, Some("R1"), None, Some("2025-04"));
        assert_eq!(districts.len(), 1);
        assert_eq!(districts[0].district_id.as_deref(), Some("D1"));
        assert_eq!(districts[0].district_name.as_deref(), Some("Arusha Rural"));
        assert_eq!((districts[0].patients, districts[0].vaccine_stock), (5, 10));
        assert_eq!(districts[0].facility_id, None);

        let facilities = aggregate(&s, Some("R1"), Some("D1"), Some("2025-05"));
        assert_eq!(facilities.len(), 1);
        assert_eq!(facilities[0].facility_id.as_deref(), Some("F1"));
        assert_eq!(facilities[0].facility_name.as_deref(), Some("F1 Dispensary"));
        assert_eq!((facilities[0].patients, facilities[0].vaccine_stock), (0, 0));
    }

    #[test]
    fn month_filter_keeps_zero_members() {
        let s = snap(vec![
            rec("F1", ARUSHA, RURAL, 5, 10, "Apr (4/2025)"),
            rec("F2", ARUSHA, RURAL, 3, 1, "Mar (3/2025)"),
            rec("F1", ARUSHA, RURAL, 2, 2, "Apr (4/2025)"),
        ]);
        let rows = aggregate(&s, Some("R1"), Some("D1"), Some("2025-04"));
        let sums: Vec<_> = rows
            .iter()
            .map(|r| (r.facility_id.clone().unwrap(), r.patients, r.vaccine_stock))
            .collect();
        assert_eq!(sums, vec![("F1".to_string(), 7, 12), ("F2".to_string(), 0, 0)]);
    }

    #[test]
    fn groups_districts_within_region_only() {
        let s = snap(vec![
            rec("F1", ARUSHA, RURAL, 5, 10, "Apr (4/2025)"),
            rec("F2", ARUSHA, ("D2", "Arusha Urban"), 4, 4, "Apr (4/2025)"),
            rec("F3", ("R2", "Mtwara"), ("D3", "Nanyumbu"), 9, 9, "Apr (4/2025)"),
            rec("F4", ARUSHA, RURAL, 1, 0, "garbled"),
        ]);
        let rows = aggregate(&s, Some("R1"), None, None);
        let sums: Vec<_> = rows.iter().map(|r| (r.district_id.clone().unwrap(), r.patients)).collect();
        assert_eq!(sums, vec![("D1".to_string(), 6), ("D2".to_string(), 4)]);

        // Unparseable months drop out once a month is requested.
        let april = aggregate(&s, Some("R1"), None, Some("2025-04"));
        assert_eq!(april[0].patients, 5);
    }

    #[test]
    fn repeated_calls_agree() {
        let s = snap(vec![
            rec("F1", ARUSHA, RURAL, 5, 10, "Apr (4/2025)"),
            rec("F3", ("R2", "Mtwara"), ("D3", "Nanyumbu"), 9, 9, "May (5/2025)"),
        ]);
        assert_eq!(aggregate(&s, None, None, Some("2025-05")), aggregate(&s, None, None, Some("2025-05")));
    }

    #[test]
    fn unknown_or_unsupported_scope_is_empty() {
        let s = snap(vec![rec("F1", ARUSHA, RURAL, 5, 10, "Apr (4/2025)")]);
        assert!(aggregate(&s, Some("R404"), None, None).is_empty());
        assert!(aggregate(&s, Some("R1"), Some("D404"), None).is_empty());
        assert!(aggregate(&s, None, Some("D1"), None).is_empty());
    }

    #[test]
    fn rows_missing_a_level_are_left_out_everywhere() {
        let s = snap(vec![
            rec("F1", ARUSHA, RURAL, 5, 1, "Apr (4/2025)"),
            rec("F2", ARUSHA, ("", ""), 7, 1, "Apr (4/2025)"),
            rec("", ARUSHA, RURAL, 3, 1, "Apr (4/2025)"),
        ]);
        let region: u64 = aggregate(&s, None, None, None).iter().map(|r| r.patients).sum();
        let districts: u64 = aggregate(&s, Some("R1"), None, None).iter().map(|r| r.patients).sum();
        let facilities: u64 = aggregate(&s, Some("R1"), Some("D1"), None)
            .iter()
            .map(|r| r.patients)
            .sum();
        assert_eq!((region, districts, facilities), (5, 5, 5));
    }

    #[test]
    fn oversized_tallies_saturate() {
        let s = snap(vec![
            rec("F1", ARUSHA, RURAL, u64::MAX, 1, "Apr (4/2025)"),
            rec("F1", ARUSHA, RURAL, 5, u64::MAX, "Apr (4/2025)"),
        ]);
        let rows = aggregate(&s, None, None, None);
        assert_eq!((rows[0].patients, rows[0].vaccine_stock), (u64::MAX, u64::MAX));
    }

    #[test]
    fn empty_snapshot_is_empty() {
        let s = snap(Vec::new());
        assert!(aggregate(&s, None, None, None).is_empty());
        assert!(aggregate(&s, Some("R1"), None, Some("2025-04")).is_empty());
    }
}
