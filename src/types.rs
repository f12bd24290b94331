use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// One row as it appears in the monthly CSV export. Column names follow the
/// database view; the dashed tally names come from the raw form export.
#[derive(Debug, Deserialize)]
pub struct RawRow {
    #[serde(rename = "tangis_facility_id")]
    pub facility_id: Option<String>,
    #[serde(rename = "facility_name")]
    pub facility_name: Option<String>,
    #[serde(rename = "tangis_region_id")]
    pub region_id: Option<String>,
    #[serde(rename = "region_name")]
    pub region_name: Option<String>,
    #[serde(rename = "tangis_district_council_id")]
    pub district_id: Option<String>,
    #[serde(rename = "district_council_name")]
    pub district_name: Option<String>,
    #[serde(rename = "tally_total_patients", alias = "tally-total_patients")]
    pub total_patients: Option<String>,
    #[serde(rename = "tally_total_vials", alias = "tally-total_vials")]
    pub total_vials: Option<String>,
    #[serde(rename = "submission_date", alias = "SubmissionDate")]
    pub submission_date: Option<String>,
    #[serde(rename = "report_full_date")]
    pub report_full_date: Option<String>,
    #[serde(rename = "tally_report_month", alias = "tally-report_month")]
    pub report_month: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonthlyRecord {
    pub facility_id: String,
    pub facility_name: String,
    pub region_id: String,
    pub region_name: String,
    pub district_id: String,
    pub district_name: String,
    pub patients: u64,
    pub vaccine_vials: u64,
    pub report_month: Option<String>,
    pub submission_date: String,
    pub report_full_date: String,
}

fn display_opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

/// Sums for one group member. Only the levels that were grouped on are
/// populated; the rest stay `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRow {
    #[serde(rename = "regionID")]
    #[tabled(rename = "RegionID")]
    pub region_id: String,
    #[tabled(rename = "Region")]
    pub region_name: String,
    #[serde(rename = "districtID", skip_serializing_if = "Option::is_none")]
    #[tabled(rename = "DistrictID", display_with = "display_opt")]
    pub district_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[tabled(rename = "District", display_with = "display_opt")]
    pub district_name: Option<String>,
    #[serde(rename = "facilityID", skip_serializing_if = "Option::is_none")]
    #[tabled(rename = "FacilityID", display_with = "display_opt")]
    pub facility_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[tabled(rename = "Facility", display_with = "display_opt")]
    pub facility_name: Option<String>,
    #[tabled(rename = "Patients")]
    pub patients: u64,
    #[tabled(rename = "VaccineStock")]
    pub vaccine_stock: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct FacilityInfo {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Facility")]
    pub facility_name: String,
    #[tabled(rename = "Region")]
    pub region_name: String,
    #[tabled(rename = "District")]
    pub district_name: String,
    #[tabled(rename = "UniquePatients")]
    pub unique_patients: u64,
    #[tabled(rename = "VaccineVialStock")]
    pub vaccine_vial_stock: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictRef {
    #[serde(rename = "districtID")]
    pub district_id: String,
    pub district_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionWithDistricts {
    #[serde(rename = "regionID")]
    pub region_id: String,
    pub region_name: String,
    pub districts: Vec<DistrictRef>,
}

/// One exported record. Serializes with camelCase keys for the JSON export;
/// the CSV export uses the display headers instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    #[tabled(rename = "Region Name")]
    pub region_name: String,
    #[tabled(rename = "District Name")]
    pub district_name: String,
    #[tabled(rename = "Facility Name")]
    pub facility_name: String,
    #[tabled(rename = "Unique Patients")]
    pub unique_patients: u64,
    #[tabled(rename = "Vaccine Stock")]
    pub vaccine_stock: u64,
    #[tabled(rename = "Date")]
    pub date: String,
}
