use serde::Serialize;
use std::collections::HashMap;
use tabled::Tabled;

/// One input row: normalized column name to raw cell text.
pub type RawRow = HashMap<String, String>;

/// Rows in input order plus the header order they were read with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: RawRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromotionRecord {
    pub product_name: String,
    pub standard_price: f64,
    pub promo_price: f64,
    pub cogs: f64,
    pub logistics_cost: f64,
    pub other_variable_costs: f64,
    /// Extra per-unit cost only paid while the promotion runs (e.g. retailer subsidy).
    pub promo_cost_per_unit: f64,
    pub baseline_units: u64,
}

impl PromotionRecord {
    /// Costs shared by standard and promo pricing.
    pub fn total_variable_costs(&self) -> f64 {
        self.cogs + self.logistics_cost + self.other_variable_costs
    }

    /// Raw cell text for a schema column, `None` for columns this record
    /// does not carry.
    pub fn column_value(&self, column: &str) -> Option<String> {
        let v = match column {
            "product_name" => self.product_name.clone(),
            "standard_price" => self.standard_price.to_string(),
            "promo_price" => self.promo_price.to_string(),
            "cogs" => self.cogs.to_string(),
            "logistics_cost" => self.logistics_cost.to_string(),
            "other_variable_costs" => self.other_variable_costs.to_string(),
            "promo_cost_per_unit" => self.promo_cost_per_unit.to_string(),
            "baseline_units" => self.baseline_units.to_string(),
            _ => return None,
        };
        Some(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeeklyVolume {
    pub week: u32,
    pub baseline_volume: u64,
    pub promo_volume: u64,
}

impl WeeklyVolume {
    pub fn column_value(&self, column: &str) -> Option<String> {
        let v = match column {
            "week" => self.week.to_string(),
            "baseline_volume" => self.baseline_volume.to_string(),
            "promo_volume" => self.promo_volume.to_string(),
            _ => return None,
        };
        Some(v)
    }
}

/// A promotion together with its observed weeks, sorted by week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalPromotion {
    pub record: PromotionRecord,
    pub weeks: Vec<WeeklyVolume>,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct PromotionSummaryRow {
    #[serde(rename = "Product")]
    #[tabled(rename = "Product")]
    pub product: String,
    #[serde(rename = "StandardPrice")]
    #[tabled(rename = "StandardPrice")]
    pub standard_price: String,
    #[serde(rename = "PromoPrice")]
    #[tabled(rename = "PromoPrice")]
    pub promo_price: String,
    #[serde(rename = "TotalVariableCosts")]
    #[tabled(rename = "TotalVariableCosts")]
    pub total_variable_costs: String,
    #[serde(rename = "StandardMargin")]
    #[tabled(rename = "StandardMargin")]
    pub standard_margin: String,
    #[serde(rename = "PromoMargin")]
    #[tabled(rename = "PromoMargin")]
    pub promo_margin: String,
    #[serde(rename = "MarginErosion")]
    #[tabled(rename = "MarginErosion")]
    pub margin_erosion: String,
    #[serde(rename = "MarginErosionPct")]
    #[tabled(rename = "MarginErosionPct")]
    pub margin_erosion_pct: String,
    #[serde(rename = "BreakevenLiftPct")]
    #[tabled(rename = "BreakevenLiftPct")]
    pub breakeven_lift_pct: String,
    #[serde(rename = "BaselineUnits")]
    #[tabled(rename = "BaselineUnits")]
    pub baseline_units: String,
    #[serde(rename = "BreakevenUnits")]
    #[tabled(rename = "BreakevenUnits")]
    pub breakeven_units: String,
    #[serde(rename = "BaselineProfit")]
    #[tabled(rename = "BaselineProfit")]
    pub baseline_profit: String,
    #[serde(rename = "LiftBand")]
    #[tabled(rename = "LiftBand")]
    pub lift_band: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ScenarioRow {
    #[serde(rename = "Product")]
    #[tabled(rename = "Product")]
    pub product: String,
    #[serde(rename = "LiftPct")]
    #[tabled(rename = "LiftPct")]
    pub lift_pct: String,
    #[serde(rename = "UnitsSold")]
    #[tabled(rename = "UnitsSold")]
    pub units_sold: String,
    #[serde(rename = "TotalProfit")]
    #[tabled(rename = "TotalProfit")]
    pub total_profit: String,
    #[serde(rename = "VsBaseline")]
    #[tabled(rename = "VsBaseline")]
    pub vs_baseline: String,
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
}

/// Breakeven chart series point; numbers stay unformatted for plotting.
#[derive(Debug, Serialize, Clone)]
pub struct CurveRow {
    #[serde(rename = "Product")]
    pub product: String,
    #[serde(rename = "Units")]
    pub units: f64,
    #[serde(rename = "StandardProfit")]
    pub standard_profit: f64,
    #[serde(rename = "PromoProfit")]
    pub promo_profit: f64,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct WeeklyGradeRow {
    #[serde(rename = "Product")]
    #[tabled(rename = "Product")]
    pub product: String,
    #[serde(rename = "Week")]
    #[tabled(rename = "Week")]
    pub week: u32,
    #[serde(rename = "BaselineVolume")]
    #[tabled(rename = "BaselineVolume")]
    pub baseline_volume: String,
    #[serde(rename = "PromoVolume")]
    #[tabled(rename = "PromoVolume")]
    pub promo_volume: String,
    #[serde(rename = "ActualLiftPct")]
    #[tabled(rename = "ActualLiftPct")]
    pub actual_lift_pct: String,
    #[serde(rename = "BreakevenLiftPct")]
    #[tabled(rename = "BreakevenLiftPct")]
    pub breakeven_lift_pct: String,
    #[serde(rename = "LiftVsBreakeven")]
    #[tabled(rename = "LiftVsBreakeven")]
    pub lift_vs_breakeven: String,
    #[serde(rename = "BaselineProfit")]
    #[tabled(rename = "BaselineProfit")]
    pub baseline_profit: String,
    #[serde(rename = "ActualProfit")]
    #[tabled(rename = "ActualProfit")]
    pub actual_profit: String,
    #[serde(rename = "ProfitVsBaseline")]
    #[tabled(rename = "ProfitVsBaseline")]
    pub profit_vs_baseline: String,
    #[serde(rename = "GradeScore")]
    #[tabled(rename = "GradeScore")]
    pub grade_score: String,
    #[serde(rename = "Band")]
    #[tabled(rename = "Band")]
    pub band: String,
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct WaterfallRow {
    #[serde(rename = "Product")]
    #[tabled(rename = "Product")]
    pub product: String,
    #[serde(rename = "Week")]
    #[tabled(rename = "Week")]
    pub week: u32,
    #[serde(rename = "Delta")]
    #[tabled(rename = "Delta")]
    pub delta: String,
    #[serde(rename = "RunningTotal")]
    #[tabled(rename = "RunningTotal")]
    pub running_total: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct HistoricalSummaryRow {
    #[serde(rename = "Product")]
    #[tabled(rename = "Product")]
    pub product: String,
    #[serde(rename = "Weeks")]
    #[tabled(rename = "Weeks")]
    pub weeks: usize,
    #[serde(rename = "StandardMargin")]
    #[tabled(rename = "StandardMargin")]
    pub standard_margin: String,
    #[serde(rename = "PromoMargin")]
    #[tabled(rename = "PromoMargin")]
    pub promo_margin: String,
    #[serde(rename = "BreakevenLiftPct")]
    #[tabled(rename = "BreakevenLiftPct")]
    pub breakeven_lift_pct: String,
    #[serde(rename = "OverallLiftPct")]
    #[tabled(rename = "OverallLiftPct")]
    pub overall_lift_pct: String,
    #[serde(rename = "TotalBaselineProfit")]
    #[tabled(rename = "TotalBaselineProfit")]
    pub total_baseline_profit: String,
    #[serde(rename = "TotalActualProfit")]
    #[tabled(rename = "TotalActualProfit")]
    pub total_actual_profit: String,
    #[serde(rename = "ProfitVsBaseline")]
    #[tabled(rename = "ProfitVsBaseline")]
    pub profit_vs_baseline: String,
    #[serde(rename = "OverallScore")]
    #[tabled(rename = "OverallScore")]
    pub overall_score: String,
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
}

/// Machine-readable run summary. Undefined metrics serialize as `null`.
#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub generated_at: String,
    pub promotions_analyzed: usize,
    pub rows_rejected: usize,
    pub unreachable_promotions: usize,
    pub avg_breakeven_lift_pct: Option<f64>,
    pub historical_promotions: usize,
    pub historical_passed: usize,
    pub total_incremental_profit: f64,
}
