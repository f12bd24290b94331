//! Flat per-record export, filtered by region, district and month range.

use crate::access::{restrict_to_regions, AllowList};
use crate::error::Result;
use crate::month::{month_in_range, parse_report_month};
use crate::output;
use crate::snapshot::Snapshot;
use crate::types::{ExportRow, MonthlyRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    /// Region IDs; empty means every region the caller may see.
    #[serde(default, rename = "selectedRegions")]
    pub regions: Vec<String>,
    /// District IDs; empty means every district of the selected regions.
    #[serde(default, rename = "selectedDistricts")]
    pub districts: Vec<String>,
    #[serde(default)]
    pub start_month: Option<String>,
    #[serde(default)]
    pub end_month: Option<String>,
    #[serde(default)]
    pub format: ExportFormat,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope<'a> {
    pub data: &'a [ExportRow],
    pub timestamp: DateTime<Utc>,
    pub exported_by: &'a str,
}

/// CSV shape of an [`ExportRow`], under the dashboard's column headers.
#[derive(Serialize)]
struct CsvExportRow<'a> {
    #[serde(rename = "Region Name")]
    region_name: &'a str,
    #[serde(rename = "District Name")]
    district_name: &'a str,
    #[serde(rename = "Facility Name")]
    facility_name: &'a str,
    #[serde(rename = "Unique Patients")]
    unique_patients: u64,
    #[serde(rename = "Vaccine Stock")]
    vaccine_stock: u64,
    #[serde(rename = "Date")]
    date: &'a str,
}

impl<'a> From<&'a ExportRow> for CsvExportRow<'a> {
    fn from(r: &'a ExportRow) -> Self {
        Self {
            region_name: &r.region_name,
            district_name: &r.district_name,
            facility_name: &r.facility_name,
            unique_patients: r.unique_patients,
            vaccine_stock: r.vaccine_stock,
            date: &r.date,
        }
    }
}

/// Rows for `request`, in snapshot order.
///
/// Selecting a region outside a restricted allow-list rejects the whole
/// request. With a month range, rows whose month cannot be parsed are left
/// out; without one they are exported with their raw label as the date.
pub fn export_rows(snapshot: &Snapshot, request: &ExportRequest, allow: &AllowList) -> Result<Vec<ExportRow>> {
    allow.authorize(request.regions.iter().map(String::as_str))?;

    let regions: HashSet<&str> = request.regions.iter().map(String::as_str).collect();
    let districts: HashSet<&str> = request.districts.iter().map(String::as_str).collect();
    let ranged = request.start_month.is_some() || request.end_month.is_some();

    let scoped: Vec<&MonthlyRecord> = if regions.is_empty() {
        restrict_to_regions(snapshot.records().iter().collect(), allow)
    } else {
        snapshot
            .records()
            .iter()
            .filter(|r| regions.contains(r.region_id.as_str()))
            .collect()
    };

    let rows = scoped
        .into_iter()
        .filter(|r| districts.is_empty() || districts.contains(r.district_id.as_str()))
        .filter_map(|r| {
            let key = parse_report_month(r.report_month.as_deref());
            if ranged {
                let key = key.as_deref()?;
                if !month_in_range(key, request.start_month.as_deref(), request.end_month.as_deref()) {
                    return None;
                }
            }
            let date = key
                .or_else(|| r.report_month.clone())
                .unwrap_or_default();
            Some(ExportRow {
                region_name: r.region_name.clone(),
                district_name: r.district_name.clone(),
                facility_name: r.facility_name.clone(),
                unique_patients: r.patients,
                vaccine_stock: r.vaccine_vials,
                date,
            })
        })
        .collect();
    Ok(rows)
}

/// Write rows in the requested format. JSON output is wrapped with the
/// export time and the exporting user.
pub fn write_export<W: Write>(
    writer: W,
    rows: &[ExportRow],
    format: ExportFormat,
    exported_by: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    match format {
        ExportFormat::Csv => {
            let rows: Vec<CsvExportRow> = rows.iter().map(CsvExportRow::from).collect();
            output::write_csv_to(writer, &rows)
        }
        ExportFormat::Json => output::write_json_to(
            writer,
            &ExportEnvelope {
                data: rows,
                timestamp: now,
                exported_by,
            },
        ),
    }
}

/// `rabies-data-export-YYYY-MM-DD.csv`
pub fn export_file_name(format: ExportFormat, now: DateTime<Utc>) -> String {
    let ext = match format {
        ExportFormat::Csv => "csv",
        ExportFormat::Json => "json",
    };
    format!("rabies-data-export-{}.{}", now.format("%Y-%m-%d"), ext)
}
