use crate::error::{AppError, AppResult};
use crate::schema::{column_names, sample_historical, sample_records, Mode};
use crate::types::{HistoricalPromotion, PromotionRecord};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

fn serialize_rows<W: Write, T: Serialize>(wtr: &mut csv::Writer<W>, rows: &[T]) -> AppResult<()> {
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_csv<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> AppResult<()> {
    let mut wtr = csv::Writer::from_path(path.as_ref())?;
    serialize_rows(&mut wtr, rows)?;
    info!(path = %path.as_ref().display(), rows = rows.len(), "wrote csv");
    Ok(())
}

fn into_string(wtr: csv::Writer<Vec<u8>>) -> AppResult<String> {
    let bytes = wtr.into_inner().map_err(|e| AppError::Io(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| AppError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Serialize result rows to CSV text; the header follows field order.
pub fn to_csv_string<T: Serialize>(rows: &[T]) -> AppResult<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    serialize_rows(&mut wtr, rows)?;
    into_string(wtr)
}

/// Input records as rows in schema column order.
pub fn records_to_table(records: &[PromotionRecord]) -> Vec<Vec<String>> {
    let columns = column_names(Mode::Grader);
    records
        .iter()
        .map(|r| {
            columns
                .iter()
                .map(|c| r.column_value(c).unwrap_or_default())
                .collect()
        })
        .collect()
}

/// One row per product-week, in historical schema order.
pub fn historical_to_table(promotions: &[HistoricalPromotion]) -> Vec<Vec<String>> {
    let columns = column_names(Mode::Historical);
    promotions
        .iter()
        .flat_map(|h| {
            let columns = &columns;
            h.weeks.iter().map(move |w| {
                columns
                    .iter()
                    .map(|c| {
                        h.record
                            .column_value(c)
                            .or_else(|| w.column_value(c))
                            .unwrap_or_default()
                    })
                    .collect()
            })
        })
        .collect()
}

fn table_to_csv(mode: Mode, rows: &[Vec<String>]) -> AppResult<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(column_names(mode))?;
    for r in rows {
        wtr.write_record(r)?;
    }
    wtr.flush()?;
    into_string(wtr)
}

pub fn serialize_records(records: &[PromotionRecord]) -> AppResult<String> {
    table_to_csv(Mode::Grader, &records_to_table(records))
}

pub fn serialize_historical(promotions: &[HistoricalPromotion]) -> AppResult<String> {
    table_to_csv(Mode::Historical, &historical_to_table(promotions))
}

/// Upload template for `mode`, filled with example rows.
pub fn template_csv(mode: Mode) -> AppResult<String> {
    match mode {
        Mode::Grader => serialize_records(&sample_records()),
        Mode::Historical => serialize_historical(&sample_historical()),
    }
}

pub fn write_text(path: impl AsRef<Path>, text: &str) -> AppResult<()> {
    std::fs::write(path.as_ref(), text)?;
    info!(path = %path.as_ref().display(), "wrote file");
    Ok(())
}

pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> AppResult<()> {
    let s = serde_json::to_string_pretty(value)?;
    write_text(path, &s)
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
    if rows.len() > max_rows {
        println!("... {} more row(s)\n", rows.len() - max_rows);
    }
}
