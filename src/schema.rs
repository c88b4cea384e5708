// Column schema shared by the validator, the upload templates and export.
//
// Every column list in the crate is read from here so the documented
// template and the enforced rules cannot drift apart.
use crate::types::{HistoricalPromotion, PromotionRecord, WeeklyVolume};
use once_cell::sync::Lazy;
use std::fmt;

pub const DEFAULT_BASELINE_UNITS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// One row per hypothetical promotion.
    Grader,
    /// One row per product-week of a promotion that already ran.
    Historical,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Grader => write!(f, "grader"),
            Mode::Historical => write!(f, "historical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Decimal,
    Integer,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnDefault {
    Decimal(f64),
    Integer(u64),
}

impl fmt::Display for ColumnDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnDefault::Decimal(v) => write!(f, "{}", v),
            ColumnDefault::Integer(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub required: bool,
    pub default: Option<ColumnDefault>,
}

impl ColumnSpec {
    const fn required(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
        }
    }

    const fn optional(name: &'static str, kind: ColumnKind, default: ColumnDefault) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: Some(default),
        }
    }
}

const PROMOTION_COLUMNS: [ColumnSpec; 8] = [
    ColumnSpec::required("product_name", ColumnKind::Text),
    ColumnSpec::required("standard_price", ColumnKind::Decimal),
    ColumnSpec::required("promo_price", ColumnKind::Decimal),
    ColumnSpec::required("cogs", ColumnKind::Decimal),
    ColumnSpec::optional("logistics_cost", ColumnKind::Decimal, ColumnDefault::Decimal(0.0)),
    ColumnSpec::optional("other_variable_costs", ColumnKind::Decimal, ColumnDefault::Decimal(0.0)),
    ColumnSpec::optional("promo_cost_per_unit", ColumnKind::Decimal, ColumnDefault::Decimal(0.0)),
    ColumnSpec::optional(
        "baseline_units",
        ColumnKind::Integer,
        ColumnDefault::Integer(DEFAULT_BASELINE_UNITS),
    ),
];

const WEEK_COLUMNS: [ColumnSpec; 3] = [
    ColumnSpec::required("week", ColumnKind::Integer),
    ColumnSpec::required("baseline_volume", ColumnKind::Integer),
    ColumnSpec::required("promo_volume", ColumnKind::Integer),
];

static GRADER_SCHEMA: Lazy<Vec<ColumnSpec>> = Lazy::new(|| PROMOTION_COLUMNS.to_vec());

static HISTORICAL_SCHEMA: Lazy<Vec<ColumnSpec>> = Lazy::new(|| {
    PROMOTION_COLUMNS
        .iter()
        .chain(WEEK_COLUMNS.iter())
        .cloned()
        .collect()
});

/// Ordered column list for `mode`.
pub fn schema_columns(mode: Mode) -> &'static [ColumnSpec] {
    match mode {
        Mode::Grader => GRADER_SCHEMA.as_slice(),
        Mode::Historical => HISTORICAL_SCHEMA.as_slice(),
    }
}

pub fn column_names(mode: Mode) -> Vec<&'static str> {
    schema_columns(mode).iter().map(|c| c.name).collect()
}

pub fn find_column(mode: Mode, name: &str) -> Option<&'static ColumnSpec> {
    schema_columns(mode).iter().find(|c| c.name == name)
}

pub fn required_columns(mode: Mode) -> Vec<&'static str> {
    schema_columns(mode)
        .iter()
        .filter(|c| c.required)
        .map(|c| c.name)
        .collect()
}

/// One-line-per-column description used by the CLI help screen.
pub fn describe(mode: Mode) -> Vec<String> {
    schema_columns(mode)
        .iter()
        .map(|c| match (c.required, c.default) {
            (true, _) => format!("{} (required)", c.name),
            (false, Some(d)) => format!("{} (optional, default {})", c.name, d),
            (false, None) => format!("{} (optional)", c.name),
        })
        .collect()
}

/// Example promotions for the grader upload template.
pub fn sample_records() -> Vec<PromotionRecord> {
    let rows = [
        ("Widget A", 29.99, 24.99, 12.00, 2.00, 1.00, 0.00, 500),
        ("Widget B", 49.99, 39.99, 20.00, 3.00, 2.00, 5.00, 300),
        ("Premium Product", 99.99, 79.99, 40.00, 5.00, 3.00, 10.00, 100),
    ];
    rows.iter()
        .map(|&(name, sp, pp, cogs, log, other, promo_cost, units)| PromotionRecord {
            product_name: name.to_string(),
            standard_price: sp,
            promo_price: pp,
            cogs,
            logistics_cost: log,
            other_variable_costs: other,
            promo_cost_per_unit: promo_cost,
            baseline_units: units,
        })
        .collect()
}

/// Example product-week data for the historical upload template.
pub fn sample_historical() -> Vec<HistoricalPromotion> {
    let mut records = sample_records();
    records.truncate(2);
    let volumes: [&[(u64, u64)]; 2] = [
        &[(100, 150), (100, 140), (100, 120)],
        &[(75, 90), (75, 85), (75, 80)],
    ];
    records
        .into_iter()
        .zip(volumes)
        .map(|(record, vols)| HistoricalPromotion {
            record,
            weeks: vols
                .iter()
                .enumerate()
                .map(|(i, &(baseline_volume, promo_volume))| WeeklyVolume {
                    week: i as u32 + 1,
                    baseline_volume,
                    promo_volume,
                })
                .collect(),
        })
        .collect()
}
