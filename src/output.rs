use crate::error::Result;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    write_csv_to(File::create(path)?, rows)
}

pub fn write_csv_to<W: Write, T: Serialize>(writer: W, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    write_json_to(File::create(path)?, value)
}

pub fn write_json_to<W: Write, T: Serialize + ?Sized>(writer: W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

/// Render the first `max_rows` rows as a Markdown table.
pub fn render_table_rows<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

/// Render a header plus string rows as a Markdown table, for views whose
/// columns are only known at runtime.
pub fn render_matrix(header: Vec<String>, rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return "(no rows)".to_string();
    }
    let mut builder = Builder::default();
    builder.push_record(header);
    for row in rows {
        builder.push_record(row);
    }
    builder.build().with(Style::markdown()).to_string()
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}\n", render_table_rows(rows, max_rows));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AggregateRow;

    fn row(district: Option<&str>) -> AggregateRow {
        AggregateRow {
            region_id: "R1".into(),
            region_name: "Arusha".into(),
            district_id: district.map(String::from),
            district_name: district.map(|d| format!("{} council", d)),
            facility_id: None,
            facility_name: None,
            patients: 1200,
            vaccine_stock: 40,
        }
    }

    #[test]
    fn markdown_preview_blanks_absent_levels() {
        let table = render_table_rows(&[row(None), row(Some("D1"))], 5);
        assert!(table.starts_with("| RegionID"));
        assert!(table.contains("D1 council"));
        assert_eq!(table.lines().count(), 4);
        assert_eq!(render_table_rows::<AggregateRow>(&[], 5), "(no rows)");
    }

    #[test]
    fn json_omits_absent_levels() {
        let mut buf = Vec::new();
        write_json_to(&mut buf, &[row(None)]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value[0]["regionID"], "R1");
        assert_eq!(value[0]["regionName"], "Arusha");
        assert_eq!(value[0]["vaccineStock"], 40);
        assert!(value[0].get("districtID").is_none());
        assert!(value[0].get("facilityName").is_none());
    }

    #[test]
    fn csv_file_leaves_out_ungrouped_levels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aggregate.csv");
        write_csv(&path, &[row(Some("D1"))]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("regionID,regionName,districtID,districtName,patients,vaccineStock\n"));
        assert!(text.contains("R1,Arusha,D1,D1 council,1200,40"));
    }
}
