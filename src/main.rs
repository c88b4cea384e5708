// Entry point and menu-driven console flow.
//
// - [1]/[2] load a grader or historical CSV and report rejected rows.
// - [3]/[4] enter a single promotion (optionally with weekly volumes) by hand.
// - [5] runs the calculations and writes every report.
// - [6] writes the upload templates.
use once_cell::sync::Lazy;
use promo_breakeven::config::AppConfig;
use promo_breakeven::error::{AppError, AppResult, RowError};
use promo_breakeven::loader::{self, LoadReport};
use promo_breakeven::output;
use promo_breakeven::reports::{self, HistoricalAnalysis, PromotionAnalysis};
use promo_breakeven::schema::{self, Mode};
use promo_breakeven::types::{HistoricalPromotion, PromotionRecord, RawRow, Table};
use promo_breakeven::util::{self, format_int};
use promo_breakeven::validator::{self, BatchOutcome};
use std::io::{self, Write};
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// Session state: whatever was loaded last, kept until the program exits.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState::default()));

#[derive(Default)]
struct AppState {
    grader: Option<BatchOutcome<PromotionRecord>>,
    historical: Option<BatchOutcome<HistoricalPromotion>>,
}

/// `None` once stdin is closed.
fn try_prompt(label: &str) -> Option<String> {
    print!("{}", label);
    let _ = io::stdout().flush();
    util::read_trimmed_line(&mut io::stdin().lock())
}

fn prompt(label: &str) -> String {
    try_prompt(label).unwrap_or_default()
}

fn read_choice() -> Option<String> {
    try_prompt("Enter choice: ")
}

fn prompt_back_to_menu() -> bool {
    loop {
        let Some(answer) = try_prompt("Back to Main Menu (Y/N): ") else {
            return false;
        };
        match answer.to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn print_load_report(report: &LoadReport, valid: usize, errors: &[RowError], what: &str) {
    println!(
        "Processing file... ({} rows read, {} {} valid)",
        format_int(report.total_rows),
        format_int(valid),
        what
    );
    if !report.missing_columns.is_empty() {
        println!(
            "Warning: required column(s) missing from header: {}",
            report.missing_columns.join(", ")
        );
    }
    if report.lossy_rows > 0 {
        println!(
            "Warning: {} row(s) were not valid UTF-8; unreadable characters were replaced",
            format_int(report.lossy_rows)
        );
    }
    if report.parse_errors > 0 {
        println!("Warning: {} unreadable record(s) skipped", format_int(report.parse_errors));
    }
    if !report.unknown_columns.is_empty() {
        println!("Info: ignored column(s): {}", report.unknown_columns.join(", "));
    }
    if !errors.is_empty() {
        println!("Note: {} row(s) rejected:", format_int(errors.len()));
        for e in errors.iter().take(10) {
            println!("  - {}", e);
        }
        if errors.len() > 10 {
            println!("  ... and {} more", errors.len() - 10);
        }
    }
    println!();
}

fn handle_load(cfg: &AppConfig, mode: Mode) {
    let path = match mode {
        Mode::Grader => &cfg.grader_input,
        Mode::Historical => &cfg.historical_input,
    };
    let (table, report) = match loader::load_table_file(path, mode) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!(path = %path.display(), error = %e, "load failed");
            eprintln!("Failed to load {}: {}\n", path.display(), e);
            return;
        }
    };
    let mut state = APP_STATE.lock().unwrap();
    match mode {
        Mode::Grader => {
            let outcome = validator::validate_grader(&table);
            print_load_report(&report, outcome.records.len(), &outcome.errors, "promotions");
            state.grader = Some(outcome);
        }
        Mode::Historical => {
            let outcome = validator::validate_historical(&table);
            print_load_report(&report, outcome.records.len(), &outcome.errors, "promotions");
            state.historical = Some(outcome);
        }
    }
}

/// Ask for every promotion column; blank answers leave optional columns
/// to their defaults.
fn prompt_promotion_fields() -> RawRow {
    schema::schema_columns(Mode::Grader)
        .iter()
        .map(|c| {
            let hint = match c.default {
                Some(d) => format!(" [default {}]", d),
                None => String::new(),
            };
            let v = prompt(&format!("{}{}: ", c.name, hint));
            (c.name.to_string(), v)
        })
        .collect()
}

fn display_promotion(a: &PromotionAnalysis, preview_rows: usize) {
    println!("\nKey Metrics\n");
    output::preview_table_rows(&[reports::summary_row(a)], 1);
    println!("What-If Scenarios\n");
    output::preview_table_rows(
        &reports::scenario_rows(&a.record.product_name, &a.scenarios),
        preview_rows.max(a.scenarios.len()),
    );
}

fn handle_manual_promotion(cfg: &AppConfig) {
    println!("\nSingle Promotion Entry\n");
    let row = prompt_promotion_fields();
    match validator::validate_grader_row(1, &row) {
        Ok(record) => {
            let analysis = reports::analyze_promotion(&record);
            display_promotion(&analysis, cfg.preview_rows);
            let mut state = APP_STATE.lock().unwrap();
            state.grader = Some(BatchOutcome {
                records: vec![record],
                errors: Vec::new(),
            });
        }
        Err(e) => println!("Invalid entry: {}\n", e.kind),
    }
}

fn handle_manual_historical(cfg: &AppConfig) {
    println!("\nHistorical Promotion Entry\n");
    let base = prompt_promotion_fields();
    let weeks = match util::parse_u64_safe(&prompt("Number of weeks: ")) {
        Some(n) if n > 0 => n,
        _ => {
            println!("Number of weeks must be a positive whole number.\n");
            return;
        }
    };
    let columns = schema::column_names(Mode::Historical)
        .into_iter()
        .map(String::from)
        .collect();
    let mut table = Table::new(columns);
    for week in 1..=weeks {
        let mut row = base.clone();
        row.insert("week".to_string(), week.to_string());
        row.insert(
            "baseline_volume".to_string(),
            prompt(&format!("Week {} baseline volume: ", week)),
        );
        row.insert(
            "promo_volume".to_string(),
            prompt(&format!("Week {} promo volume: ", week)),
        );
        table.push_row(row);
    }
    let outcome = validator::validate_historical(&table);
    for e in &outcome.errors {
        println!("Invalid entry: {}", e);
    }
    if let Some(h) = outcome.records.first() {
        let a = reports::analyze_historical(h);
        println!("\nWeekly Scorecard\n");
        output::preview_table_rows(
            &reports::weekly_rows(&a),
            cfg.preview_rows.max(a.weekly.len()),
        );
        output::preview_table_rows(&[reports::historical_summary_row(&a)], 1);
    }
    let mut state = APP_STATE.lock().unwrap();
    state.historical = Some(outcome);
}

fn write_grader_reports(
    cfg: &AppConfig,
    outcome: &BatchOutcome<PromotionRecord>,
) -> AppResult<Vec<PromotionAnalysis>> {
    let analyses = reports::analyze_batch(&outcome.records);

    let summary = reports::batch_summary(&analyses);
    let file = cfg.output_path("promotion_summary.csv");
    output::write_csv(&file, &summary)?;
    println!("Report 1: Breakeven Lift Required by Product (easiest first)\n");
    output::preview_table_rows(&reports::breakeven_ranking(&analyses), cfg.preview_rows);
    println!("(Full table exported to {})\n", file.display());

    let scenarios: Vec<_> = analyses
        .iter()
        .flat_map(|a| reports::scenario_rows(&a.record.product_name, &a.scenarios))
        .collect();
    let file = cfg.output_path("scenarios.csv");
    output::write_csv(&file, &scenarios)?;
    println!("Report 2: What-If Scenarios\n");
    output::preview_table_rows(&scenarios, cfg.preview_rows);
    println!("(Full table exported to {})\n", file.display());

    let sensitivity: Vec<_> = analyses
        .iter()
        .flat_map(|a| reports::scenario_rows(&a.record.product_name, &a.sensitivity))
        .collect();
    output::write_csv(cfg.output_path("sensitivity.csv"), &sensitivity)?;
    let curve: Vec<_> = analyses.iter().flat_map(reports::curve_rows).collect();
    output::write_csv(cfg.output_path("breakeven_curve.csv"), &curve)?;
    println!("(Chart series exported to sensitivity.csv and breakeven_curve.csv)\n");

    Ok(analyses)
}

fn write_historical_reports(
    cfg: &AppConfig,
    outcome: &BatchOutcome<HistoricalPromotion>,
) -> AppResult<Vec<HistoricalAnalysis>> {
    let analyses: Vec<HistoricalAnalysis> = outcome
        .records
        .iter()
        .map(reports::analyze_historical)
        .collect();

    let summary: Vec<_> = analyses.iter().map(reports::historical_summary_row).collect();
    let file = cfg.output_path("historical_summary.csv");
    output::write_csv(&file, &summary)?;
    println!("Report 3: Historical Promotion Grades\n");
    output::preview_table_rows(&summary, cfg.preview_rows);
    println!("(Full table exported to {})\n", file.display());

    let weekly: Vec<_> = analyses.iter().flat_map(reports::weekly_rows).collect();
    let file = cfg.output_path("weekly_grades.csv");
    output::write_csv(&file, &weekly)?;
    println!("Report 4: Weekly Scorecard\n");
    output::preview_table_rows(&weekly, cfg.preview_rows);
    println!("(Full table exported to {})\n", file.display());

    let waterfall: Vec<_> = analyses.iter().flat_map(reports::waterfall_rows).collect();
    let file = cfg.output_path("waterfall.csv");
    output::write_csv(&file, &waterfall)?;
    println!("Report 5: Incremental Profit Waterfall\n");
    output::preview_table_rows(&waterfall, cfg.preview_rows);
    println!("(Full table exported to {})\n", file.display());

    Ok(analyses)
}

fn handle_generate_reports(cfg: &AppConfig) -> AppResult<()> {
    let (grader, historical) = {
        let state = APP_STATE.lock().unwrap();
        (state.grader.clone(), state.historical.clone())
    };
    if grader.is_none() && historical.is_none() {
        return Err(AppError::NoData(
            "load a file (option 1 or 2) or enter a promotion (option 3 or 4) first".into(),
        ));
    }

    std::fs::create_dir_all(&cfg.output_dir)?;
    println!("Generating reports...\n");

    let mut rejected = Vec::new();
    let promotions = match &grader {
        Some(outcome) => {
            rejected.extend(outcome.errors.iter().map(RowError::to_export_row));
            write_grader_reports(cfg, outcome)?
        }
        None => Vec::new(),
    };
    let graded = match &historical {
        Some(outcome) => {
            rejected.extend(outcome.errors.iter().map(RowError::to_export_row));
            write_historical_reports(cfg, outcome)?
        }
        None => Vec::new(),
    };

    if !rejected.is_empty() {
        let file = cfg.output_path("rejected_rows.csv");
        output::write_csv(&file, &rejected)?;
        println!("{} rejected row(s) exported to {}\n", rejected.len(), file.display());
    }

    let summary = reports::generate_summary(&promotions, &graded, rejected.len());
    output::write_json(cfg.output_path("summary.json"), &summary)?;
    println!("Summary Stats (summary.json):");
    println!("{}\n", serde_json::to_string(&summary)?);
    info!(
        promotions = promotions.len(),
        historical = graded.len(),
        "reports generated"
    );
    Ok(())
}

fn handle_templates(cfg: &AppConfig) -> AppResult<()> {
    std::fs::create_dir_all(&cfg.output_dir)?;
    for (mode, name) in [
        (Mode::Grader, "promotion_template.csv"),
        (Mode::Historical, "historical_template.csv"),
    ] {
        let file = cfg.output_path(name);
        output::write_text(&file, &output::template_csv(mode)?)?;
        println!("Template ({}) written to {}", mode, file.display());
        for line in schema::describe(mode) {
            println!("  - {}", line);
        }
    }
    println!();
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cfg = AppConfig::from_env();
    info!(?cfg, "starting promotion analyzer");

    loop {
        println!("Promotion Effectiveness & Breakeven Analyzer");
        println!("[1] Load promotions file ({})", cfg.grader_input.display());
        println!("[2] Load historical file ({})", cfg.historical_input.display());
        println!("[3] Enter a promotion manually");
        println!("[4] Enter a historical promotion manually");
        println!("[5] Generate reports");
        println!("[6] Write upload templates");
        println!("[0] Exit\n");
        let Some(choice) = read_choice() else {
            println!("\nExiting the program.");
            break;
        };
        match choice.as_str() {
            "1" => handle_load(&cfg, Mode::Grader),
            "2" => handle_load(&cfg, Mode::Historical),
            "3" => handle_manual_promotion(&cfg),
            "4" => handle_manual_historical(&cfg),
            "5" => {
                println!();
                if let Err(e) = handle_generate_reports(&cfg) {
                    eprintln!("Error: {}\n", e);
                    continue;
                }
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "6" => {
                if let Err(e) = handle_templates(&cfg) {
                    eprintln!("Error: {}\n", e);
                }
            }
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 0-6.\n"),
        }
    }
}
