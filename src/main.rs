// Console front end for the monthly reporting engine.
//
// The menu loads the monthly export once and then serves every view from the
// cached snapshot until it goes stale:
// - [1] reloads the CSV and prints load diagnostics,
// - [2]..[5] print the region list, facility lookup, aggregates and the
//   completeness matrix,
// - [6] writes an export file for the configured user.
use monthly_report::completeness::flatten;
use monthly_report::config::Config;
use monthly_report::export::{export_file_name, write_export, ExportFormat, ExportRequest};
use monthly_report::output::{preview_table_rows, render_matrix, write_csv, write_json};
use monthly_report::util::format_int;
use monthly_report::MonthlyService;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const PREVIEW_ROWS: usize = 15;

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

/// Read a single line of input after printing `label`.
fn prompt(label: &str) -> String {
    print!("{}", label);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Prompt for an optional value; a blank answer means "not given".
fn prompt_optional(label: &str) -> Option<String> {
    let v = prompt(label);
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

fn prompt_list(label: &str) -> Vec<String> {
    prompt(label)
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Handle option [1]: force a reload of the data source.
fn handle_load(service: &MonthlyService) {
    match service.reload() {
        Ok(snapshot) => {
            let ids = snapshot.identities();
            println!(
                "Processing dataset... ({} rows loaded, {} regions, {} facilities)",
                format_int(snapshot.len()),
                format_int(ids.regions().len()),
                format_int(ids.facilities().len())
            );
            match service.available_months() {
                Ok(months) if !months.is_empty() => {
                    println!("Report months available: {}\n", months.join(", "))
                }
                Ok(_) => println!("No parseable report months.\n"),
                Err(e) => eprintln!("Failed to list months: {}\n", e),
            }
        }
        Err(e) => eprintln!("Failed to load data: {}\n", e),
    }
}

fn handle_regions(service: &MonthlyService, user: Option<&str>) {
    match service.regions_for_user(user) {
        Ok((regions, all)) => {
            if !all {
                println!("(Restricted to regions allowed for {})", user.unwrap_or("-"));
            }
            for region in regions {
                println!("{} [{}]", region.region_name, region.region_id);
                for d in region.districts {
                    println!("    {} [{}]", d.district_name, d.district_id);
                }
            }
            println!();
        }
        Err(e) => eprintln!("Error: {}\n", e),
    }
}

fn handle_facility(service: &MonthlyService) {
    let id = prompt("Facility ID: ");
    match service.facility_by_id(&id) {
        Ok(Some(info)) => preview_table_rows(&[info], 1),
        Ok(None) => println!("No facility with ID {}.\n", id),
        Err(e) => eprintln!("Error: {}\n", e),
    }
}

fn handle_aggregate(service: &MonthlyService, user: Option<&str>) {
    let region = prompt_optional("Region ID (blank for all): ");
    let district = match region {
        Some(_) => prompt_optional("District ID (blank for all): "),
        None => None,
    };
    let month = prompt_optional("Month YYYY-MM (blank for all): ");
    match service.aggregate(user, region.as_deref(), district.as_deref(), month.as_deref()) {
        Ok(rows) => {
            println!("Patients and Vaccine Stock ({} groups)\n", format_int(rows.len()));
            preview_table_rows(&rows, PREVIEW_ROWS);
            if let Some(file) = prompt_optional("Save as CSV file (blank to skip): ") {
                match write_csv(Path::new(&file), &rows) {
                    Ok(()) => println!("Saved {}\n", file),
                    Err(e) => error!(error = %e, path = %file, "failed to write aggregate CSV"),
                }
            }
        }
        Err(e) => eprintln!("Error: {}\n", e),
    }
}

fn handle_completeness(service: &MonthlyService, user: Option<&str>) {
    let region = prompt_optional("Region ID (blank for all): ");
    let district = prompt_optional("District ID (blank for all): ");
    let nodes = match service.completeness(user, region.as_deref(), district.as_deref()) {
        Ok(nodes) => nodes,
        Err(e) => {
            eprintln!("Error: {}\n", e);
            return;
        }
    };
    let flat = flatten(&nodes);
    let Some((_, _, _, first)) = flat.first() else {
        println!("(no rows)\n");
        return;
    };
    let mut header = vec!["Level".to_string(), "ID".to_string(), "Name".to_string()];
    header.extend(first.keys().cloned());
    let rows: Vec<Vec<String>> = flat
        .iter()
        .take(PREVIEW_ROWS * 4)
        .map(|(kind, id, name, months)| {
            let mut row = vec![format!("{:?}", kind), id.clone(), name.clone()];
            row.extend(months.values().map(|p| format!("{}%", p)));
            row
        })
        .collect();
    println!("Reporting Completeness (last 12 months)\n");
    println!("{}\n", render_matrix(header, rows));
    if let Some(file) = prompt_optional("Save as JSON file (blank to skip): ") {
        match write_json(Path::new(&file), &nodes) {
            Ok(()) => println!("Saved {}\n", file),
            Err(e) => error!(error = %e, path = %file, "failed to write completeness JSON"),
        }
    }
}

fn handle_export(service: &MonthlyService, user: Option<&str>) {
    let request = ExportRequest {
        regions: prompt_list("Region IDs, comma separated (blank for all): "),
        districts: prompt_list("District IDs, comma separated (blank for all): "),
        start_month: prompt_optional("Start month YYYY-MM (blank for none): "),
        end_month: prompt_optional("End month YYYY-MM (blank for none): "),
        format: match prompt("Format [csv/json]: ").to_lowercase().as_str() {
            "json" => ExportFormat::Json,
            _ => ExportFormat::Csv,
        },
    };
    let rows = match service.export(user, &request) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("Export refused: {}\n", e);
            return;
        }
    };
    let now = chrono::Utc::now();
    let path = export_file_name(request.format, now);
    let written = File::create(&path)
        .map_err(monthly_report::Error::from)
        .and_then(|f| write_export(BufWriter::new(f), &rows, request.format, user.unwrap_or("local"), now));
    match written {
        Ok(()) => {
            info!(path = %path, rows = rows.len(), "export written");
            println!("Exported {} rows to {}\n", format_int(rows.len()), path);
        }
        Err(e) => error!(error = %e, path = %path, "export failed"),
    }
}

fn main() {
    let config = Config::from_env();
    init_logging(config.log_json);

    let service = match MonthlyService::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to start");
            std::process::exit(1);
        }
    };
    let user = config.user.as_deref();
    info!(path = %config.data_path.display(), user = ?user, "monthly report console ready");

    loop {
        println!("Select View:");
        println!("[1] Load the file");
        println!("[2] Regions and Districts");
        println!("[3] Facility Lookup");
        println!("[4] Patients and Vaccine Stock");
        println!("[5] Reporting Completeness");
        println!("[6] Export Data");
        println!("[0] Exit\n");
        match prompt("Enter choice: ").as_str() {
            "1" => handle_load(&service),
            "2" => handle_regions(&service, user),
            "3" => handle_facility(&service),
            "4" => handle_aggregate(&service, user),
            "5" => handle_completeness(&service, user),
            "6" => handle_export(&service, user),
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 0-6.\n"),
        }
    }
}
