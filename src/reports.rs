use crate::calc::{
    self, breakeven_curve, breakeven_lift, breakeven_units, cumulative_profit, grade_score,
    lift_band, margin_erosion, margin_erosion_pct, overall_lift, profit_sensitivity,
    promo_margin, score_band, standard_margin, total_volumes, what_if_scenarios, CurvePoint, Grade,
    LiftBand, PriceMode, Scenario, WaterfallStep,
};
use crate::error::{CalcError, Metric};
use crate::types::{
    CurveRow, HistoricalPromotion, HistoricalSummaryRow, PromotionRecord, PromotionSummaryRow,
    ScenarioRow, SummaryStats, WaterfallRow, WeeklyGradeRow, WeeklyVolume,
};
use crate::util::{
    format_currency, format_int, format_metric_number, format_metric_pct, format_number,
    format_pct, format_signed_currency, NOT_AVAILABLE,
};
use tracing::debug;

/// Everything derived from a single promotion record.
#[derive(Debug, Clone)]
pub struct PromotionAnalysis {
    pub record: PromotionRecord,
    pub standard_margin: f64,
    pub promo_margin: f64,
    pub margin_erosion: f64,
    pub margin_erosion_pct: Metric,
    pub breakeven_lift: Metric,
    pub breakeven_units: Metric,
    pub baseline_profit: f64,
    pub lift_band: LiftBand,
    pub scenarios: Vec<Scenario>,
    pub sensitivity: Vec<Scenario>,
    pub curve: Vec<CurvePoint>,
}

pub fn analyze_promotion(record: &PromotionRecord) -> PromotionAnalysis {
    let be = breakeven_lift(record);
    if let Err(e) = be {
        debug!(product = %record.product_name, reason = %e, "breakeven undefined");
    }
    PromotionAnalysis {
        record: record.clone(),
        standard_margin: standard_margin(record),
        promo_margin: promo_margin(record),
        margin_erosion: margin_erosion(record),
        margin_erosion_pct: margin_erosion_pct(record),
        breakeven_lift: be,
        breakeven_units: breakeven_units(record),
        baseline_profit: calc::baseline_profit(record),
        lift_band: lift_band(be),
        scenarios: what_if_scenarios(record),
        sensitivity: profit_sensitivity(record),
        curve: breakeven_curve(record),
    }
}

pub fn analyze_batch(records: &[PromotionRecord]) -> Vec<PromotionAnalysis> {
    records.iter().map(analyze_promotion).collect()
}

#[derive(Debug, Clone)]
pub struct WeeklyGrade {
    pub volume: WeeklyVolume,
    pub actual_lift: Metric,
    pub baseline_profit: f64,
    pub actual_profit: f64,
    pub grade_score: Metric,
    /// `None` when the score itself is undefined.
    pub grade: Option<Grade>,
}

impl WeeklyGrade {
    pub fn profit_vs_baseline(&self) -> f64 {
        self.actual_profit - self.baseline_profit
    }
}

#[derive(Debug, Clone)]
pub struct HistoricalAnalysis {
    pub promotion: HistoricalPromotion,
    pub standard_margin: f64,
    pub promo_margin: f64,
    pub breakeven_lift: Metric,
    pub weekly: Vec<WeeklyGrade>,
    pub waterfall: Vec<WaterfallStep>,
    pub total_baseline_units: u128,
    pub total_actual_units: u128,
    pub total_baseline_profit: f64,
    pub total_actual_profit: f64,
    pub overall_lift: Metric,
    pub overall_grade_score: Metric,
    pub overall_grade: Option<Grade>,
}

impl HistoricalAnalysis {
    pub fn profit_vs_baseline(&self) -> f64 {
        self.total_actual_profit - self.total_baseline_profit
    }

    pub fn passed(&self) -> bool {
        self.overall_grade.is_some_and(Grade::passed)
    }
}

fn score_for(record: &PromotionRecord, lift: Metric) -> (Metric, Option<Grade>) {
    let score = lift.and_then(|l| grade_score(record, l));
    (score, score.ok().map(Grade::from_score))
}

pub fn grade_week(record: &PromotionRecord, w: &WeeklyVolume) -> WeeklyGrade {
    let actual_lift = calc::actual_lift(w.baseline_volume, w.promo_volume);
    let (grade_score, grade) = score_for(record, actual_lift);
    WeeklyGrade {
        volume: *w,
        actual_lift,
        baseline_profit: calc::profit_at_units(
            record,
            w.baseline_volume as f64,
            PriceMode::Standard,
        ),
        actual_profit: calc::profit_at_units(record, w.promo_volume as f64, PriceMode::Promo),
        grade_score,
        grade,
    }
}

pub fn analyze_historical(promotion: &HistoricalPromotion) -> HistoricalAnalysis {
    let record = &promotion.record;
    let weekly: Vec<WeeklyGrade> = promotion
        .weeks
        .iter()
        .map(|w| grade_week(record, w))
        .collect();
    let overall = overall_lift(&promotion.weeks);
    let (total_baseline_units, total_actual_units) = total_volumes(&promotion.weeks);
    let (overall_grade_score, overall_grade) = score_for(record, overall);
    let analysis = HistoricalAnalysis {
        promotion: promotion.clone(),
        standard_margin: standard_margin(record),
        promo_margin: promo_margin(record),
        breakeven_lift: breakeven_lift(record),
        waterfall: cumulative_profit(record, &promotion.weeks),
        total_baseline_units,
        total_actual_units,
        total_baseline_profit: weekly.iter().map(|g| g.baseline_profit).sum(),
        total_actual_profit: weekly.iter().map(|g| g.actual_profit).sum(),
        overall_lift: overall,
        overall_grade_score,
        overall_grade,
        weekly,
    };
    debug!(
        product = %record.product_name,
        weeks = analysis.weekly.len(),
        passed = analysis.passed(),
        "historical promotion graded"
    );
    analysis
}

pub fn summary_row(a: &PromotionAnalysis) -> PromotionSummaryRow {
    PromotionSummaryRow {
        product: a.record.product_name.clone(),
        standard_price: format_currency(a.record.standard_price),
        promo_price: format_currency(a.record.promo_price),
        total_variable_costs: format_currency(a.record.total_variable_costs()),
        standard_margin: format_currency(a.standard_margin),
        promo_margin: format_currency(a.promo_margin),
        margin_erosion: format_currency(a.margin_erosion),
        margin_erosion_pct: format_metric_pct(a.margin_erosion_pct, 1),
        breakeven_lift_pct: format_metric_pct(a.breakeven_lift, 1),
        baseline_units: format_int(a.record.baseline_units),
        breakeven_units: format_metric_number(a.breakeven_units, 0),
        baseline_profit: format_currency(a.baseline_profit),
        lift_band: a.lift_band.to_string(),
    }
}

pub fn batch_summary(analyses: &[PromotionAnalysis]) -> Vec<PromotionSummaryRow> {
    analyses.iter().map(summary_row).collect()
}

/// Batch comparison ordered by required lift, easiest first; products that
/// can't break even go last.
pub fn breakeven_ranking(analyses: &[PromotionAnalysis]) -> Vec<PromotionSummaryRow> {
    let mut ordered: Vec<&PromotionAnalysis> = analyses.iter().collect();
    ordered.sort_by(|a, b| match (a.breakeven_lift, b.breakeven_lift) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => std::cmp::Ordering::Equal,
    });
    ordered.into_iter().map(summary_row).collect()
}

pub fn scenario_rows(product: &str, scenarios: &[Scenario]) -> Vec<ScenarioRow> {
    scenarios
        .iter()
        .map(|s| ScenarioRow {
            product: product.to_string(),
            lift_pct: format_pct(s.lift, 0),
            units_sold: format_number(s.units_sold, 0),
            total_profit: format_currency(s.total_profit),
            vs_baseline: format_signed_currency(s.profit_vs_baseline),
            status: if s.profitable {
                "Profitable".to_string()
            } else {
                "Below Baseline".to_string()
            },
        })
        .collect()
}

pub fn curve_rows(a: &PromotionAnalysis) -> Vec<CurveRow> {
    a.curve
        .iter()
        .map(|p| CurveRow {
            product: a.record.product_name.clone(),
            units: p.units,
            standard_profit: p.standard_profit,
            promo_profit: p.promo_profit,
        })
        .collect()
}

fn status_text(grade: Option<Grade>) -> String {
    grade
        .map(|g| g.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

pub fn weekly_rows(a: &HistoricalAnalysis) -> Vec<WeeklyGradeRow> {
    a.weekly
        .iter()
        .map(|g| {
            let gap: Metric = match (g.actual_lift, a.breakeven_lift) {
                (Ok(l), Ok(b)) => Ok(l - b),
                (Err(e), _) | (_, Err(e)) => Err(e),
            };
            WeeklyGradeRow {
                product: a.promotion.record.product_name.clone(),
                week: g.volume.week,
                baseline_volume: format_int(g.volume.baseline_volume),
                promo_volume: format_int(g.volume.promo_volume),
                actual_lift_pct: format_metric_pct(g.actual_lift, 1),
                breakeven_lift_pct: format_metric_pct(a.breakeven_lift, 1),
                lift_vs_breakeven: format_metric_pct(gap, 1),
                baseline_profit: format_currency(g.baseline_profit),
                actual_profit: format_currency(g.actual_profit),
                profit_vs_baseline: format_signed_currency(g.profit_vs_baseline()),
                grade_score: format_metric_number(g.grade_score, 0),
                band: g
                    .grade_score
                    .map(|s| score_band(s).to_string())
                    .unwrap_or_else(|_| NOT_AVAILABLE.to_string()),
                status: status_text(g.grade),
            }
        })
        .collect()
}

pub fn waterfall_rows(a: &HistoricalAnalysis) -> Vec<WaterfallRow> {
    a.waterfall
        .iter()
        .map(|s| WaterfallRow {
            product: a.promotion.record.product_name.clone(),
            week: s.week,
            delta: format_signed_currency(s.delta),
            running_total: format_currency(s.running_total),
        })
        .collect()
}

pub fn historical_summary_row(a: &HistoricalAnalysis) -> HistoricalSummaryRow {
    HistoricalSummaryRow {
        product: a.promotion.record.product_name.clone(),
        weeks: a.weekly.len(),
        standard_margin: format_currency(a.standard_margin),
        promo_margin: format_currency(a.promo_margin),
        breakeven_lift_pct: format_metric_pct(a.breakeven_lift, 1),
        overall_lift_pct: format_metric_pct(a.overall_lift, 1),
        total_baseline_profit: format_currency(a.total_baseline_profit),
        total_actual_profit: format_currency(a.total_actual_profit),
        profit_vs_baseline: format_signed_currency(a.profit_vs_baseline()),
        overall_score: format_metric_number(a.overall_grade_score, 0),
        status: status_text(a.overall_grade),
    }
}

pub fn generate_summary(
    analyses: &[PromotionAnalysis],
    historical: &[HistoricalAnalysis],
    rows_rejected: usize,
) -> SummaryStats {
    let reachable: Vec<f64> = analyses
        .iter()
        .filter_map(|a| a.breakeven_lift.ok())
        .collect();
    let avg_breakeven_lift_pct = if reachable.is_empty() {
        None
    } else {
        Some(reachable.iter().sum::<f64>() / reachable.len() as f64 * 100.0)
    };
    let unreachable_promotions = analyses
        .iter()
        .filter(|a| a.breakeven_lift == Err(CalcError::BreakevenUnreachable))
        .count();
    SummaryStats {
        generated_at: chrono::Utc::now().to_rfc3339(),
        promotions_analyzed: analyses.len(),
        rows_rejected,
        unreachable_promotions,
        avg_breakeven_lift_pct,
        historical_promotions: historical.len(),
        historical_passed: historical.iter().filter(|h| h.passed()).count(),
        total_incremental_profit: historical.iter().map(|h| h.profit_vs_baseline()).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, promo_price: f64) -> PromotionRecord {
        PromotionRecord {
            product_name: name.into(),
            standard_price: 10.0,
            promo_price,
            cogs: 4.0,
            logistics_cost: 0.0,
            other_variable_costs: 0.0,
            promo_cost_per_unit: 0.0,
            baseline_units: 100,
        }
    }

    fn history(promo_price: f64, weeks: &[(u32, u64, u64)]) -> HistoricalPromotion {
        HistoricalPromotion {
            record: record("Widget", promo_price),
            weeks: weeks
                .iter()
                .map(|&(week, baseline_volume, promo_volume)| WeeklyVolume {
                    week,
                    baseline_volume,
                    promo_volume,
                })
                .collect(),
        }
    }

    #[test]
    fn summary_row_formats_example() {
        let a = analyze_promotion(&record("Widget", 8.0));
        let row = summary_row(&a);
        assert_eq!(row.standard_margin, "$6.00");
        assert_eq!(row.promo_margin, "$4.00");
        assert_eq!(row.breakeven_lift_pct, "50.0%");
        assert_eq!(row.breakeven_units, "150");
        assert_eq!(row.margin_erosion_pct, "33.3%");
        assert_eq!(row.baseline_profit, "$600.00");
        assert_eq!(row.lift_band, "Achievable");
    }

    #[test]
    fn unreachable_renders_as_not_available() {
        let a = analyze_promotion(&record("Loss Leader", 3.0));
        let row = summary_row(&a);
        assert_eq!(row.breakeven_lift_pct, "N/A");
        assert_eq!(row.breakeven_units, "N/A");
        assert_eq!(row.promo_margin, "-$1.00");
        assert_eq!(row.lift_band, "Unreachable");
    }

    #[test]
    fn break_even_pricing_has_no_erosion_pct() {
        let mut r = record("At Cost", 3.0);
        r.standard_price = 4.0;
        let row = summary_row(&analyze_promotion(&r));
        assert_eq!(row.standard_margin, "$0.00");
        assert_eq!(row.margin_erosion, "$1.00");
        assert_eq!(row.margin_erosion_pct, "N/A");
    }

    #[test]
    fn ranking_puts_unreachable_last() {
        let analyses = analyze_batch(&[
            record("Loss", 3.0),
            record("Deep", 6.0),
            record("Light", 9.0),
        ]);
        let names: Vec<String> = breakeven_ranking(&analyses)
            .into_iter()
            .map(|r| r.product)
            .collect();
        assert_eq!(names, vec!["Light", "Deep", "Loss"]);
    }

    #[test]
    fn week_grades_follow_example() {
        let a = analyze_historical(&history(8.0, &[(1, 100, 140), (2, 100, 160)]));
        assert_eq!(a.weekly[0].grade, Some(Grade::Fail));
        assert!((a.weekly[0].grade_score.unwrap() - 80.0).abs() < 1e-9);
        assert_eq!(a.weekly[1].grade, Some(Grade::Pass));
        assert_eq!(a.total_baseline_units, 200);
        assert_eq!(a.total_actual_units, 300);
        // overall lift 0.5 meets breakeven exactly
        assert_eq!(a.overall_grade, Some(Grade::Pass));
        assert!((a.total_baseline_profit - 1200.0).abs() < 1e-9);
        assert!((a.total_actual_profit - 1200.0).abs() < 1e-9);
        assert!((a.waterfall[1].running_total - 0.0).abs() < 1e-9);

        let rows = weekly_rows(&a);
        assert_eq!(rows[0].status, "Fail");
        assert_eq!(rows[0].grade_score, "80");
        assert_eq!(rows[0].band, "Good");
        assert_eq!(rows[1].band, "Exceeded");
        assert_eq!(rows[0].lift_vs_breakeven, "-10.0%");
    }

    #[test]
    fn zero_baseline_week_is_undefined_not_zero() {
        let a = analyze_historical(&history(8.0, &[(1, 0, 50)]));
        assert_eq!(a.weekly[0].actual_lift, Err(CalcError::DivisionUndefined));
        assert_eq!(a.weekly[0].grade, None);
        assert!(!a.passed());
        let rows = weekly_rows(&a);
        assert_eq!(rows[0].actual_lift_pct, "N/A");
        assert_eq!(rows[0].status, "N/A");
        // Profit contribution is still defined.
        assert_eq!(waterfall_rows(&a)[0].delta, "+$200.00");
    }

    #[test]
    fn unreachable_history_never_scores() {
        let a = analyze_historical(&history(3.0, &[(1, 100, 400)]));
        assert_eq!(a.weekly[0].grade_score, Err(CalcError::BreakevenUnreachable));
        assert_eq!(historical_summary_row(&a).overall_score, "N/A");
    }

    #[test]
    fn summary_counts() {
        let analyses = analyze_batch(&[record("A", 8.0), record("B", 3.0)]);
        let hist = vec![analyze_historical(&history(8.0, &[(1, 100, 200)]))];
        let s = generate_summary(&analyses, &hist, 2);
        assert_eq!(s.promotions_analyzed, 2);
        assert_eq!(s.unreachable_promotions, 1);
        assert_eq!(s.avg_breakeven_lift_pct, Some(50.0));
        assert_eq!(s.rows_rejected, 2);
        assert_eq!(s.historical_passed, 1);
        assert!((s.total_incremental_profit - 200.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_rows_mark_profitability() {
        let a = analyze_promotion(&record("Widget", 8.0));
        let rows = scenario_rows("Widget", &a.scenarios);
        assert_eq!(rows[0].lift_pct, "0%");
        assert_eq!(rows[0].status, "Below Baseline");
        assert_eq!(rows[0].vs_baseline, "-$200.00");
        assert_eq!(rows[2].status, "Profitable");
        assert_eq!(rows[2].product, "Widget");
    }

    #[test]
    fn curve_rows_carry_product() {
        let a = analyze_promotion(&record("Widget", 8.0));
        let rows = curve_rows(&a);
        assert_eq!(rows.len(), a.curve.len());
        assert!(rows.iter().all(|r| r.product == "Widget"));
        assert_eq!(rows[10].units, 50.0);
        assert_eq!(rows[10].standard_profit, 300.0);
    }
}
