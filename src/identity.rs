//! ID ↔ name index over a snapshot.
//!
//! Every derivation is a single pass that keeps the first-seen order of its
//! key. IDs are authoritative; names are carried along from the first row
//! that introduced the ID.

use crate::types::{DistrictRef, MonthlyRecord, RegionWithDistricts};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionIdentity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistrictIdentity {
    pub region_id: String,
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacilityIdentity {
    pub id: String,
    pub name: String,
    pub region_id: String,
    pub region_name: String,
    pub district_id: String,
    pub district_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionDistrictIdentity {
    #[serde(rename = "regionID")]
    pub region_id: String,
    pub region_name: String,
    #[serde(rename = "districtID")]
    pub district_id: String,
    pub district_name: String,
}

#[derive(Debug, Default)]
pub struct Identities {
    regions: Vec<RegionIdentity>,
    region_index: HashMap<String, usize>,
    districts: Vec<DistrictIdentity>,
    district_index: HashMap<(String, String), usize>,
    districts_by_region_id: HashMap<String, Vec<usize>>,
    districts_by_region_name: HashMap<String, Vec<usize>>,
    pairs: Vec<RegionDistrictIdentity>,
    facilities: Vec<FacilityIdentity>,
    facility_index: HashMap<String, usize>,
    facilities_by_district: HashMap<(String, String), Vec<usize>>,
}

impl Identities {
    pub fn build(records: &[MonthlyRecord]) -> Self {
        let mut ids = Identities::default();
        let mut seen_pairs: HashSet<String> = HashSet::new();
        let mut seen_named_districts: HashSet<(String, String)> = HashSet::new();

        for r in records {
            // Pairs are keyed by name; only blank names keep a row out.
            if !r.region_name.is_empty() && !r.district_name.is_empty() {
                let key = format!("{}|{}", r.region_name, r.district_name);
                if seen_pairs.insert(key) {
                    ids.pairs.push(RegionDistrictIdentity {
                        region_id: r.region_id.clone(),
                        region_name: r.region_name.clone(),
                        district_id: r.district_id.clone(),
                        district_name: r.district_name.clone(),
                    });
                }
            }

            if r.region_id.is_empty() {
                continue;
            }
            if !ids.region_index.contains_key(&r.region_id) {
                ids.region_index.insert(r.region_id.clone(), ids.regions.len());
                ids.regions.push(RegionIdentity {
                    id: r.region_id.clone(),
                    name: r.region_name.clone(),
                });
            }

            if !r.district_id.is_empty() {
                let key = (r.region_id.clone(), r.district_id.clone());
                let idx = match ids.district_index.get(&key) {
                    Some(idx) => *idx,
                    None => {
                        let idx = ids.districts.len();
                        ids.district_index.insert(key, idx);
                        ids.districts.push(DistrictIdentity {
                            region_id: r.region_id.clone(),
                            id: r.district_id.clone(),
                            name: r.district_name.clone(),
                        });
                        ids.districts_by_region_id
                            .entry(r.region_id.clone())
                            .or_default()
                            .push(idx);
                        idx
                    }
                };
                // Districts are also reachable by region name, de-duplicated
                // by district ID within that name.
                if seen_named_districts.insert((r.region_name.clone(), r.district_id.clone())) {
                    ids.districts_by_region_name
                        .entry(r.region_name.clone())
                        .or_default()
                        .push(idx);
                }
            }

            if !r.facility_id.is_empty() && !ids.facility_index.contains_key(&r.facility_id) {
                let idx = ids.facilities.len();
                ids.facility_index.insert(r.facility_id.clone(), idx);
                ids.facilities.push(FacilityIdentity {
                    id: r.facility_id.clone(),
                    name: r.facility_name.clone(),
                    region_id: r.region_id.clone(),
                    region_name: r.region_name.clone(),
                    district_id: r.district_id.clone(),
                    district_name: r.district_name.clone(),
                });
                ids.facilities_by_district
                    .entry((r.region_id.clone(), r.district_id.clone()))
                    .or_default()
                    .push(idx);
            }
        }
        ids
    }

    pub fn regions(&self) -> &[RegionIdentity] {
        &self.regions
    }

    pub fn region_by_id(&self, region_id: &str) -> Option<&RegionIdentity> {
        self.region_index.get(region_id).map(|i| &self.regions[*i])
    }

    pub fn district_by_id(&self, region_id: &str, district_id: &str) -> Option<&DistrictIdentity> {
        self.district_index
            .get(&(region_id.to_string(), district_id.to_string()))
            .map(|i| &self.districts[*i])
    }

    /// Districts of the region with this name, first-seen by district ID.
    pub fn districts_in_region(&self, region_name: &str) -> Vec<&DistrictIdentity> {
        self.districts_by_region_name
            .get(region_name)
            .map(|idxs| idxs.iter().map(|i| &self.districts[*i]).collect())
            .unwrap_or_default()
    }

    pub fn districts_of_region_id(&self, region_id: &str) -> Vec<&DistrictIdentity> {
        self.districts_by_region_id
            .get(region_id)
            .map(|idxs| idxs.iter().map(|i| &self.districts[*i]).collect())
            .unwrap_or_default()
    }

    /// Region/district pairs with displayable names, first-seen by name pair.
    pub fn region_district_pairs(&self) -> &[RegionDistrictIdentity] {
        &self.pairs
    }

    pub fn facilities(&self) -> &[FacilityIdentity] {
        &self.facilities
    }

    pub fn facility_by_id(&self, facility_id: &str) -> Option<&FacilityIdentity> {
        self.facility_index.get(facility_id).map(|i| &self.facilities[*i])
    }

    pub fn facilities_of_district(&self, region_id: &str, district_id: &str) -> Vec<&FacilityIdentity> {
        self.facilities_by_district
            .get(&(region_id.to_string(), district_id.to_string()))
            .map(|idxs| idxs.iter().map(|i| &self.facilities[*i]).collect())
            .unwrap_or_default()
    }

    /// Region/district pairs grouped under their region, in first-seen order.
    pub fn regions_with_districts(&self) -> Vec<RegionWithDistricts> {
        let mut out: Vec<RegionWithDistricts> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for pair in &self.pairs {
            let idx = *index.entry(pair.region_id.as_str()).or_insert_with(|| {
                out.push(RegionWithDistricts {
                    region_id: pair.region_id.clone(),
                    region_name: pair.region_name.clone(),
                    districts: Vec::new(),
                });
                out.len() - 1
            });
            out[idx].districts.push(DistrictRef {
                district_id: pair.district_id.clone(),
                district_name: pair.district_name.clone(),
            });
        }
        out
    }
}
