use crate::cache::SnapshotSource;
use crate::error::Result;
use crate::month::parse_report_month;
use crate::types::{MonthlyRecord, RawRow};
use crate::util::{clean_optional, clean_text, parse_count_safe};
use csv::ReaderBuilder;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub unparseable_months: usize,
    pub defaulted_counts: usize,
    pub missing_facility_ids: usize,
    /// Rows with a region but no district; aggregation leaves them out.
    pub missing_district_ids: usize,
}

/// Read and clean the monthly export. A row the CSV parser rejects fails the
/// whole load; partial tables are never returned.
pub fn load_and_clean<R: Read>(reader: R) -> Result<(Vec<MonthlyRecord>, LoadReport)> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut report = LoadReport::default();
    let mut records: Vec<MonthlyRecord> = Vec::new();

    for result in rdr.deserialize::<RawRow>() {
        let row = result?;
        report.total_rows += 1;

        // Absent or non-numeric tallies count as zero.
        let patients = parse_count_safe(row.total_patients.as_deref());
        let vaccine_vials = parse_count_safe(row.total_vials.as_deref());
        if patients.is_none() || vaccine_vials.is_none() {
            report.defaulted_counts += 1;
        }

        let report_month = clean_optional(row.report_month);
        if parse_report_month(report_month.as_deref()).is_none() {
            report.unparseable_months += 1;
            debug!(row = report.total_rows, raw = ?report_month, "report month not parseable");
        }

        let facility_id = clean_text(row.facility_id);
        if facility_id.is_empty() {
            report.missing_facility_ids += 1;
        }
        let region_id = clean_text(row.region_id);
        let district_id = clean_text(row.district_id);
        if !region_id.is_empty() && district_id.is_empty() {
            report.missing_district_ids += 1;
        }

        records.push(MonthlyRecord {
            facility_id,
            facility_name: clean_text(row.facility_name),
            region_id,
            region_name: clean_text(row.region_name),
            district_id,
            district_name: clean_text(row.district_name),
            patients: patients.unwrap_or(0),
            vaccine_vials: vaccine_vials.unwrap_or(0),
            report_month,
            submission_date: clean_text(row.submission_date),
            report_full_date: clean_text(row.report_full_date),
        });
    }

    if report.missing_facility_ids > 0 {
        warn!(rows = report.missing_facility_ids, "rows without a facility id");
    }
    if report.missing_district_ids > 0 {
        warn!(rows = report.missing_district_ids, "rows without a district id");
    }
    Ok((records, report))
}

pub fn load_from_path(path: &Path) -> Result<(Vec<MonthlyRecord>, LoadReport)> {
    let file = std::fs::File::open(path)?;
    load_and_clean(file)
}

/// Snapshot source backed by a CSV export on disk. The file is re-read on
/// every fetch so a replaced export is picked up on the next refresh.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSource for CsvSource {
    fn fetch_records(&self) -> Result<Vec<MonthlyRecord>> {
        let (records, report) = load_from_path(&self.path)?;
        info!(
            path = %self.path.display(),
            rows = report.total_rows,
            unparseable_months = report.unparseable_months,
            defaulted_counts = report.defaulted_counts,
            "loaded monthly export"
        );
        Ok(records)
    }
}
