//! Turns raw uploaded rows into typed promotion records.
//!
//! Column rules come from [`crate::schema`]. Each row is validated on its
//! own; a bad row is reported and skipped, never fatal to the batch. In
//! historical mode the surviving rows are then grouped into promotions.

use crate::error::{RowError, ValidationKind};
use crate::schema::{schema_columns, ColumnDefault, ColumnKind, ColumnSpec, Mode};
use crate::types::{HistoricalPromotion, PromotionRecord, RawRow, Table, WeeklyVolume};
use crate::util::{parse_f64_safe, parse_u64_safe};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Valid records plus the rows that were rejected on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome<T> {
    pub records: Vec<T>,
    pub errors: Vec<RowError>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> BatchOutcome<T> {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Value {
    Decimal(f64),
    Integer(u64),
}

/// Typed view of one row's cells, with defaults already applied.
struct RowValues<'a> {
    row: usize,
    raw: &'a RawRow,
    values: HashMap<&'static str, Value>,
}

impl RowValues<'_> {
    fn decimal(&self, col: &str) -> f64 {
        match self.values.get(col) {
            Some(Value::Decimal(v)) => *v,
            Some(Value::Integer(v)) => *v as f64,
            None => 0.0,
        }
    }

    fn integer(&self, col: &str) -> u64 {
        match self.values.get(col) {
            Some(Value::Integer(v)) => *v,
            Some(Value::Decimal(v)) => *v as u64,
            None => 0,
        }
    }

    fn text(&self, col: &str) -> String {
        self.raw.get(col).map(|s| s.trim().to_string()).unwrap_or_default()
    }

    fn out_of_range(&self, col: &str, detail: impl Into<String>) -> RowError {
        RowError::new(self.row, col, ValidationKind::OutOfRange(detail.into()))
    }
}

fn cell<'a>(raw: &'a RawRow, col: &str) -> Option<&'a str> {
    raw.get(col).map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn coerce(row: usize, spec: &ColumnSpec, text: &str) -> Result<Option<Value>, RowError> {
    let invalid = || RowError::new(row, spec.name, ValidationKind::InvalidNumericValue);
    match spec.kind {
        ColumnKind::Text => Ok(None),
        ColumnKind::Decimal => parse_f64_safe(text)
            .map(|v| Some(Value::Decimal(v)))
            .ok_or_else(invalid),
        ColumnKind::Integer => match parse_f64_safe(text) {
            // A negative count is a range problem, not a formatting one.
            Some(v) if v < 0.0 => Err(RowError::new(
                row,
                spec.name,
                ValidationKind::OutOfRange(format!("{} must not be negative", spec.name)),
            )),
            _ => parse_u64_safe(text)
                .map(|v| Some(Value::Integer(v)))
                .ok_or_else(invalid),
        },
    }
}

/// Presence, default and numeric coercion checks shared by both modes.
fn read_columns<'a>(row: usize, raw: &'a RawRow, mode: Mode) -> Result<RowValues<'a>, RowError> {
    let mut values = HashMap::new();
    for spec in schema_columns(mode) {
        match (cell(raw, spec.name), spec.required) {
            (None, true) => {
                return Err(RowError::new(
                    row,
                    spec.name,
                    ValidationKind::MissingField(spec.name.to_string()),
                ))
            }
            (None, false) => {
                if let Some(d) = spec.default {
                    let v = match d {
                        ColumnDefault::Decimal(v) => Value::Decimal(v),
                        ColumnDefault::Integer(v) => Value::Integer(v),
                    };
                    values.insert(spec.name, v);
                }
            }
            (Some(text), _) => {
                if let Some(v) = coerce(row, spec, text)? {
                    values.insert(spec.name, v);
                }
            }
        }
    }
    Ok(RowValues { row, raw, values })
}

fn build_record(v: &RowValues<'_>) -> Result<PromotionRecord, RowError> {
    let record = PromotionRecord {
        product_name: v.text("product_name"),
        standard_price: v.decimal("standard_price"),
        promo_price: v.decimal("promo_price"),
        cogs: v.decimal("cogs"),
        logistics_cost: v.decimal("logistics_cost"),
        other_variable_costs: v.decimal("other_variable_costs"),
        promo_cost_per_unit: v.decimal("promo_cost_per_unit"),
        baseline_units: v.integer("baseline_units"),
    };

    for (col, price) in [
        ("standard_price", record.standard_price),
        ("promo_price", record.promo_price),
    ] {
        if price <= 0.0 {
            return Err(v.out_of_range(col, format!("{} must be positive", col)));
        }
    }
    for (col, cost) in [
        ("cogs", record.cogs),
        ("logistics_cost", record.logistics_cost),
        ("other_variable_costs", record.other_variable_costs),
        ("promo_cost_per_unit", record.promo_cost_per_unit),
    ] {
        if cost < 0.0 {
            return Err(v.out_of_range(col, format!("{} must not be negative", col)));
        }
    }
    if record.promo_price > record.standard_price {
        return Err(v.out_of_range("promo_price", "promo price exceeds standard price"));
    }
    if record.baseline_units == 0 {
        return Err(v.out_of_range("baseline_units", "baseline_units must be positive"));
    }
    Ok(record)
}

/// Upper bound on a single week's unit volume.
pub const MAX_WEEKLY_VOLUME: u64 = 1_000_000_000_000;

fn build_week(v: &RowValues<'_>) -> Result<WeeklyVolume, RowError> {
    let week = v.integer("week");
    if week == 0 || week > u32::MAX as u64 {
        return Err(v.out_of_range("week", "week must be a positive integer"));
    }
    let baseline_volume = v.integer("baseline_volume");
    let promo_volume = v.integer("promo_volume");
    for (col, vol) in [("baseline_volume", baseline_volume), ("promo_volume", promo_volume)] {
        if vol > MAX_WEEKLY_VOLUME {
            return Err(v.out_of_range(col, "weekly volume is implausibly large"));
        }
    }
    Ok(WeeklyVolume {
        week: week as u32,
        baseline_volume,
        promo_volume,
    })
}

/// Validate one row against the grader schema. `row` is the 1-based data
/// row index used in error messages.
pub fn validate_grader_row(row: usize, raw: &RawRow) -> Result<PromotionRecord, RowError> {
    let values = read_columns(row, raw, Mode::Grader)?;
    build_record(&values)
}

pub fn validate_historical_row(
    row: usize,
    raw: &RawRow,
) -> Result<(PromotionRecord, WeeklyVolume), RowError> {
    let values = read_columns(row, raw, Mode::Historical)?;
    let record = build_record(&values)?;
    let week = build_week(&values)?;
    Ok((record, week))
}

pub fn validate_grader(table: &Table) -> BatchOutcome<PromotionRecord> {
    let mut out = BatchOutcome::default();
    for (idx, raw) in table.rows.iter().enumerate() {
        match validate_grader_row(idx + 1, raw) {
            Ok(r) => out.records.push(r),
            Err(e) => {
                warn!(row = e.row, reason = %e.kind, "rejected grader row");
                out.errors.push(e);
            }
        }
    }
    debug!(
        valid = out.records.len(),
        rejected = out.errors.len(),
        "grader validation finished"
    );
    out
}

/// Identity of a promotion: name plus every pricing and cost input. Floats
/// are keyed by bit pattern so identical cells always group together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    product_name: String,
    inputs: [u64; 6],
    baseline_units: u64,
}

impl GroupKey {
    fn of(r: &PromotionRecord) -> Self {
        Self {
            product_name: r.product_name.clone(),
            inputs: [
                r.standard_price.to_bits(),
                r.promo_price.to_bits(),
                r.cogs.to_bits(),
                r.logistics_cost.to_bits(),
                r.other_variable_costs.to_bits(),
                r.promo_cost_per_unit.to_bits(),
            ],
            baseline_units: r.baseline_units,
        }
    }
}

pub fn validate_historical(table: &Table) -> BatchOutcome<HistoricalPromotion> {
    let mut errors = Vec::new();
    let mut valid: Vec<(usize, PromotionRecord, WeeklyVolume)> = Vec::new();
    for (idx, raw) in table.rows.iter().enumerate() {
        match validate_historical_row(idx + 1, raw) {
            Ok((record, week)) => valid.push((idx + 1, record, week)),
            Err(e) => {
                warn!(row = e.row, reason = %e.kind, "rejected historical row");
                errors.push(e);
            }
        }
    }

    // A product may report each week only once; every row of a clash is dropped.
    let mut seen: HashMap<(String, u32), usize> = HashMap::new();
    for (_, record, week) in &valid {
        *seen
            .entry((record.product_name.clone(), week.week))
            .or_insert(0) += 1;
    }
    let duplicated: HashSet<(String, u32)> = seen
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(k, _)| k)
        .collect();

    let mut order: Vec<GroupKey> = Vec::new();
    let mut groups: HashMap<GroupKey, HistoricalPromotion> = HashMap::new();
    for (row, record, week) in valid {
        if duplicated.contains(&(record.product_name.clone(), week.week)) {
            warn!(row, product = %record.product_name, week = week.week, "duplicate week");
            errors.push(RowError::new(row, "week", ValidationKind::DuplicateWeek));
            continue;
        }
        let key = GroupKey::of(&record);
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                HistoricalPromotion {
                    record,
                    weeks: Vec::new(),
                }
            })
            .weeks
            .push(week);
    }
    errors.sort_by_key(|e| e.row);

    let records = order
        .into_iter()
        .filter_map(|k| groups.remove(&k))
        .map(|mut h| {
            h.weeks.sort_by_key(|w| w.week);
            h
        })
        .collect::<Vec<_>>();
    debug!(
        promotions = records.len(),
        rejected = errors.len(),
        "historical validation finished"
    );
    BatchOutcome { records, errors }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn table(rows: Vec<RawRow>) -> Table {
        Table {
            columns: Vec::new(),
            rows,
        }
    }

    fn grader_row(name: &str, sp: &str, pp: &str, cogs: &str) -> RawRow {
        row(&[
            ("product_name", name),
            ("standard_price", sp),
            ("promo_price", pp),
            ("cogs", cogs),
        ])
    }

    fn hist_row(name: &str, week: &str, base: &str, promo: &str) -> RawRow {
        let mut r = grader_row(name, "10", "8", "4");
        r.insert("week".into(), week.into());
        r.insert("baseline_volume".into(), base.into());
        r.insert("promo_volume".into(), promo.into());
        r
    }

    #[test]
    fn defaults_fill_missing_optionals() {
        let r = validate_grader_row(1, &grader_row("Widget", "10", "8", "4")).unwrap();
        assert_eq!(r.logistics_cost, 0.0);
        assert_eq!(r.other_variable_costs, 0.0);
        assert_eq!(r.promo_cost_per_unit, 0.0);
        assert_eq!(r.baseline_units, 100);
    }

    #[test]
    fn blank_optional_takes_default() {
        let mut raw = grader_row("Widget", "10", "8", "4");
        raw.insert("baseline_units".into(), "  ".into());
        raw.insert("logistics_cost".into(), "0.5".into());
        let r = validate_grader_row(1, &raw).unwrap();
        assert_eq!(r.baseline_units, 100);
        assert_eq!(r.logistics_cost, 0.5);
    }

    #[test]
    fn missing_required_column_rejects() {
        let raw = row(&[("product_name", "Widget"), ("standard_price", "10"), ("promo_price", "8")]);
        let err = validate_grader_row(3, &raw).unwrap_err();
        assert_eq!(err.row, 3);
        assert_eq!(err.kind, ValidationKind::MissingField("cogs".into()));
        assert_eq!(err.to_string(), "row 3: missing required field: cogs");
    }

    #[test]
    fn empty_product_name_is_missing() {
        let err = validate_grader_row(1, &grader_row(" ", "10", "8", "4")).unwrap_err();
        assert_eq!(err.kind, ValidationKind::MissingField("product_name".into()));
    }

    #[test]
    fn non_numeric_value_rejects() {
        let err = validate_grader_row(1, &grader_row("Widget", "ten", "8", "4")).unwrap_err();
        assert_eq!(err.kind, ValidationKind::InvalidNumericValue);
        assert_eq!(err.column.as_deref(), Some("standard_price"));

        let mut raw = grader_row("Widget", "10", "8", "4");
        raw.insert("baseline_units".into(), "12.5".into());
        let err = validate_grader_row(1, &raw).unwrap_err();
        assert_eq!(err.kind, ValidationKind::InvalidNumericValue);
    }

    #[test]
    fn range_checks() {
        let err = validate_grader_row(1, &grader_row("W", "10", "12", "4")).unwrap_err();
        assert!(matches!(err.kind, ValidationKind::OutOfRange(_)));
        let err = validate_grader_row(1, &grader_row("W", "10", "8", "-1")).unwrap_err();
        assert_eq!(err.column.as_deref(), Some("cogs"));
        let err = validate_grader_row(1, &grader_row("W", "0", "0", "1")).unwrap_err();
        assert_eq!(err.column.as_deref(), Some("standard_price"));
    }

    #[test]
    fn negative_promo_margin_is_still_valid_input() {
        let r = validate_grader_row(1, &grader_row("W", "10", "3", "4")).unwrap();
        assert_eq!(r.promo_price, 3.0);
    }

    #[test]
    fn batch_keeps_going_after_bad_rows() {
        let t = table(vec![
            grader_row("A", "10", "8", "4"),
            grader_row("B", "x", "8", "4"),
            row(&[("product_name", "C")]),
            grader_row("D", "20", "15", "5"),
        ]);
        let out = validate_grader(&t);
        assert_eq!(
            out.records.iter().map(|r| r.product_name.as_str()).collect::<Vec<_>>(),
            vec!["A", "D"]
        );
        assert_eq!(out.errors.iter().map(|e| e.row).collect::<Vec<_>>(), vec![2, 3]);
        assert!(!out.is_clean());
    }

    #[test]
    fn historical_rows_group_by_identity() {
        let t = table(vec![
            hist_row("A", "2", "100", "130"),
            hist_row("B", "1", "50", "60"),
            hist_row("A", "1", "100", "150"),
        ]);
        let out = validate_historical(&t);
        assert!(out.is_clean());
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].record.product_name, "A");
        assert_eq!(
            out.records[0].weeks.iter().map(|w| w.week).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(out.records[0].weeks[0].promo_volume, 150);
    }

    #[test]
    fn different_pricing_splits_groups() {
        let mut other = hist_row("A", "2", "100", "130");
        other.insert("promo_price".into(), "7".into());
        let t = table(vec![hist_row("A", "1", "100", "150"), other]);
        let out = validate_historical(&t);
        assert_eq!(out.records.len(), 2);
    }

    #[test]
    fn duplicate_weeks_reject_every_clashing_row() {
        let t = table(vec![
            hist_row("A", "1", "100", "150"),
            hist_row("A", "1", "100", "140"),
            hist_row("A", "2", "100", "120"),
        ]);
        let out = validate_historical(&t);
        assert_eq!(out.errors.len(), 2);
        assert!(out.errors.iter().all(|e| e.kind == ValidationKind::DuplicateWeek));
        assert_eq!(out.errors[0].to_string(), "row 1: duplicate week");
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].weeks.len(), 1);
        assert_eq!(out.records[0].weeks[0].week, 2);
    }

    #[test]
    fn historical_week_must_be_positive() {
        let t = table(vec![hist_row("A", "0", "100", "150"), hist_row("A", "1", "-5", "150")]);
        let out = validate_historical(&t);
        assert!(out.records.is_empty());
        assert!(out
            .errors
            .iter()
            .all(|e| matches!(e.kind, ValidationKind::OutOfRange(_))));
    }

    #[test]
    fn oversized_volume_is_out_of_range() {
        let t = table(vec![
            hist_row("A", "1", "10000000000000000000", "100"),
            hist_row("A", "2", "100", "1000000000001"),
            hist_row("A", "3", "100", "1000000000000"),
        ]);
        let out = validate_historical(&t);
        assert_eq!(out.errors.len(), 2);
        assert_eq!(out.errors[0].column.as_deref(), Some("baseline_volume"));
        assert_eq!(out.errors[1].column.as_deref(), Some("promo_volume"));
        assert!(out
            .errors
            .iter()
            .all(|e| matches!(e.kind, ValidationKind::OutOfRange(_))));
        assert_eq!(out.records[0].weeks[0].promo_volume, MAX_WEEKLY_VOLUME);
    }
}
