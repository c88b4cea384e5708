//! Promotion profitability formulas.
//!
//! Everything here is a pure function of a [`PromotionRecord`] and, for
//! historical grading, its [`WeeklyVolume`]s. Metrics that have no finite
//! value come back as `Err(CalcError)` so callers can render them as "N/A".

use crate::error::{CalcError, Metric};
use crate::types::{PromotionRecord, WeeklyVolume};
use serde::Serialize;
use std::fmt;

/// Lift levels for the what-if scenario table.
pub const SCENARIO_LIFTS: [f64; 8] = [0.0, 0.25, 0.50, 0.75, 1.0, 1.25, 1.50, 2.0];

/// Sensitivity series: -20% to +100% lift in 10 point steps.
pub const SENSITIVITY_MIN_LIFT: f64 = -0.20;
pub const SENSITIVITY_MAX_LIFT: f64 = 1.00;
pub const SENSITIVITY_STEP: f64 = 0.10;

/// Breakeven curve spans 0..=2.5x baseline in at most ~50 steps.
pub const CURVE_SPAN: f64 = 2.5;
pub const CURVE_POINTS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PriceMode {
    Standard,
    Promo,
}

pub fn standard_margin(r: &PromotionRecord) -> f64 {
    r.standard_price - r.total_variable_costs()
}

pub fn promo_margin(r: &PromotionRecord) -> f64 {
    r.promo_price - r.total_variable_costs() - r.promo_cost_per_unit
}

pub fn margin(r: &PromotionRecord, mode: PriceMode) -> f64 {
    match mode {
        PriceMode::Standard => standard_margin(r),
        PriceMode::Promo => promo_margin(r),
    }
}

/// Fractional lift needed for promo profit to match baseline profit.
///
/// Zero promo margin is a division by zero; a negative promo margin loses
/// more on every extra unit, so no finite lift recovers it.
pub fn breakeven_lift(r: &PromotionRecord) -> Metric {
    let pm = promo_margin(r);
    if pm == 0.0 {
        return Err(CalcError::DivisionUndefined);
    }
    if pm < 0.0 {
        return Err(CalcError::BreakevenUnreachable);
    }
    Ok(standard_margin(r) / pm - 1.0)
}

pub fn breakeven_units(r: &PromotionRecord) -> Metric {
    let lift = breakeven_lift(r)?;
    Ok(r.baseline_units as f64 * (1.0 + lift))
}

pub fn profit_at_units(r: &PromotionRecord, units: f64, mode: PriceMode) -> f64 {
    margin(r, mode) * units
}

pub fn baseline_profit(r: &PromotionRecord) -> f64 {
    profit_at_units(r, r.baseline_units as f64, PriceMode::Standard)
}

pub fn margin_erosion(r: &PromotionRecord) -> f64 {
    standard_margin(r) - promo_margin(r)
}

/// Erosion as a fraction of the standard margin.
pub fn margin_erosion_pct(r: &PromotionRecord) -> Metric {
    let sm = standard_margin(r);
    if sm == 0.0 {
        return Err(CalcError::DivisionUndefined);
    }
    Ok(margin_erosion(r) / sm)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurvePoint {
    pub units: f64,
    pub standard_profit: f64,
    pub promo_profit: f64,
}

/// Units vs. profit for both price modes, for the breakeven chart.
pub fn breakeven_curve(r: &PromotionRecord) -> Vec<CurvePoint> {
    let max_units = (r.baseline_units as f64 * CURVE_SPAN) as u64;
    let step = (max_units / CURVE_POINTS).max(1);
    (0..=max_units)
        .step_by(step as usize)
        .map(|u| {
            let units = u as f64;
            CurvePoint {
                units,
                standard_profit: profit_at_units(r, units, PriceMode::Standard),
                promo_profit: profit_at_units(r, units, PriceMode::Promo),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scenario {
    pub lift: f64,
    pub units_sold: f64,
    pub total_profit: f64,
    pub profit_vs_baseline: f64,
    pub profitable: bool,
}

pub fn scenario_at_lift(r: &PromotionRecord, lift: f64) -> Scenario {
    let units_sold = r.baseline_units as f64 * (1.0 + lift);
    let total_profit = profit_at_units(r, units_sold, PriceMode::Promo);
    let base = baseline_profit(r);
    Scenario {
        lift,
        units_sold,
        total_profit,
        profit_vs_baseline: total_profit - base,
        profitable: total_profit >= base,
    }
}

pub fn what_if_scenarios(r: &PromotionRecord) -> Vec<Scenario> {
    SCENARIO_LIFTS
        .iter()
        .map(|&lift| scenario_at_lift(r, lift))
        .collect()
}

pub fn profit_sensitivity(r: &PromotionRecord) -> Vec<Scenario> {
    let steps = ((SENSITIVITY_MAX_LIFT - SENSITIVITY_MIN_LIFT) / SENSITIVITY_STEP).round() as usize;
    (0..=steps)
        .map(|i| {
            // Index-based so accumulated float error can't drop the last step.
            let lift = SENSITIVITY_MIN_LIFT + i as f64 * SENSITIVITY_STEP;
            scenario_at_lift(r, lift)
        })
        .collect()
}

/// `promo / baseline - 1`; undefined when there was no baseline volume.
pub fn actual_lift(baseline_volume: u64, promo_volume: u64) -> Metric {
    if baseline_volume == 0 {
        return Err(CalcError::DivisionUndefined);
    }
    Ok(promo_volume as f64 / baseline_volume as f64 - 1.0)
}

/// Lift over the summed volumes of all weeks.
pub fn overall_lift(weeks: &[WeeklyVolume]) -> Metric {
    let (baseline, promo) = total_volumes(weeks);
    if baseline == 0 {
        return Err(CalcError::DivisionUndefined);
    }
    Ok(promo as f64 / baseline as f64 - 1.0)
}

/// Summed (baseline, promo) volumes, widened so long runs cannot overflow.
pub fn total_volumes(weeks: &[WeeklyVolume]) -> (u128, u128) {
    weeks.iter().fold((0, 0), |(b, p), w| {
        (b + w.baseline_volume as u128, p + w.promo_volume as u128)
    })
}

/// Actual lift as a share of breakeven lift, clamped to `[0, 100]`.
pub fn grade_score(r: &PromotionRecord, actual_lift: f64) -> Metric {
    let be = breakeven_lift(r)?;
    if be <= 0.0 {
        // Nothing to recover; any lift at or above breakeven is a full score.
        return Ok(if actual_lift >= be { 100.0 } else { 0.0 });
    }
    Ok(((actual_lift / be) * 100.0).clamp(0.0, 100.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    Pass,
    Fail,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 100.0 {
            Grade::Pass
        } else {
            Grade::Fail
        }
    }

    pub fn passed(self) -> bool {
        self == Grade::Pass
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::Pass => write!(f, "Pass"),
            Grade::Fail => write!(f, "Fail"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScoreBand {
    Exceeded,
    Good,
    Moderate,
    Poor,
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScoreBand::Exceeded => "Exceeded",
            ScoreBand::Good => "Good",
            ScoreBand::Moderate => "Moderate",
            ScoreBand::Poor => "Poor",
        };
        f.write_str(s)
    }
}

pub fn score_band(score: f64) -> ScoreBand {
    if score >= 100.0 {
        ScoreBand::Exceeded
    } else if score >= 75.0 {
        ScoreBand::Good
    } else if score >= 50.0 {
        ScoreBand::Moderate
    } else {
        ScoreBand::Poor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LiftBand {
    Achievable,
    Moderate,
    Challenging,
    Unreachable,
}

impl fmt::Display for LiftBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LiftBand::Achievable => "Achievable",
            LiftBand::Moderate => "Moderate",
            LiftBand::Challenging => "Challenging",
            LiftBand::Unreachable => "Unreachable",
        };
        f.write_str(s)
    }
}

pub fn lift_band(breakeven: Metric) -> LiftBand {
    match breakeven {
        Ok(l) if l <= 0.5 => LiftBand::Achievable,
        Ok(l) if l <= 1.0 => LiftBand::Moderate,
        Ok(_) => LiftBand::Challenging,
        Err(_) => LiftBand::Unreachable,
    }
}

/// Profit contribution of one week relative to what standard pricing
/// would have earned on the baseline volume.
pub fn weekly_delta(r: &PromotionRecord, w: &WeeklyVolume) -> f64 {
    profit_at_units(r, w.promo_volume as f64, PriceMode::Promo)
        - profit_at_units(r, w.baseline_volume as f64, PriceMode::Standard)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WaterfallStep {
    pub week: u32,
    pub delta: f64,
    pub running_total: f64,
}

/// Week-ordered incremental profit with a running total.
pub fn cumulative_profit(r: &PromotionRecord, weeks: &[WeeklyVolume]) -> Vec<WaterfallStep> {
    let mut ordered: Vec<&WeeklyVolume> = weeks.iter().collect();
    ordered.sort_by_key(|w| w.week);
    let mut running_total = 0.0;
    ordered
        .into_iter()
        .map(|w| {
            let delta = weekly_delta(r, w);
            running_total += delta;
            WaterfallStep {
                week: w.week,
                delta,
                running_total,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(promo_price: f64) -> PromotionRecord {
        PromotionRecord {
            product_name: "Widget".into(),
            standard_price: 10.0,
            promo_price,
            cogs: 4.0,
            logistics_cost: 0.0,
            other_variable_costs: 0.0,
            promo_cost_per_unit: 0.0,
            baseline_units: 100,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn worked_example() {
        let r = record(8.0);
        assert!(close(standard_margin(&r), 6.0));
        assert!(close(promo_margin(&r), 4.0));
        assert!(close(breakeven_lift(&r).unwrap(), 0.5));
        assert!(close(breakeven_units(&r).unwrap(), 150.0));
        assert!(close(margin_erosion(&r), 2.0));
        assert!(close(margin_erosion_pct(&r).unwrap(), 1.0 / 3.0));
    }

    #[test]
    fn week_grade_example() {
        let r = record(8.0);
        let lift = actual_lift(100, 140).unwrap();
        assert!(close(lift, 0.4));
        let score = grade_score(&r, lift).unwrap();
        assert!(close(score, 80.0));
        assert_eq!(Grade::from_score(score), Grade::Fail);
        assert_eq!(score_band(score), ScoreBand::Good);
    }

    #[test]
    fn negative_promo_margin_is_unreachable() {
        let r = record(3.0);
        assert!(close(promo_margin(&r), -1.0));
        assert_eq!(breakeven_lift(&r), Err(CalcError::BreakevenUnreachable));
        assert_eq!(breakeven_units(&r), Err(CalcError::BreakevenUnreachable));
        for lift in [-1.0, 0.0, 0.4, 5.0] {
            assert_eq!(grade_score(&r, lift), Err(CalcError::BreakevenUnreachable));
        }
        assert_eq!(lift_band(breakeven_lift(&r)), LiftBand::Unreachable);
    }

    #[test]
    fn zero_promo_margin_is_division_undefined() {
        let r = record(4.0);
        assert_eq!(breakeven_lift(&r), Err(CalcError::DivisionUndefined));
        assert!(grade_score(&r, 0.3).is_err());
    }

    #[test]
    fn curve_crosses_at_breakeven() {
        let mut r = record(8.0);
        r.promo_cost_per_unit = 0.75;
        r.logistics_cost = 0.3;
        let units = breakeven_units(&r).unwrap();
        let promo = profit_at_units(&r, units, PriceMode::Promo);
        let standard = profit_at_units(&r, r.baseline_units as f64, PriceMode::Standard);
        assert!((promo - standard).abs() < 1e-6);
    }

    #[test]
    fn grade_score_is_clamped() {
        let r = record(8.0);
        assert_eq!(grade_score(&r, -2.0), Ok(0.0));
        assert_eq!(grade_score(&r, 3.0), Ok(100.0));
        assert_eq!(grade_score(&r, 0.5), Ok(100.0));
        assert!(Grade::from_score(100.0).passed());
        for lift in [-0.5, 0.0, 0.1, 0.49, 0.5, 0.51, 2.0] {
            let s = grade_score(&r, lift).unwrap();
            assert!((0.0..=100.0).contains(&s));
            assert_eq!(Grade::from_score(s).passed(), s >= 100.0);
        }
    }

    #[test]
    fn zero_breakeven_grades_on_sign() {
        // Promo at full price: margins equal, breakeven lift is 0.
        let r = record(10.0);
        assert!(close(breakeven_lift(&r).unwrap(), 0.0));
        assert_eq!(grade_score(&r, 0.0), Ok(100.0));
        assert_eq!(grade_score(&r, -0.1), Ok(0.0));
    }

    #[test]
    fn actual_lift_needs_baseline() {
        assert_eq!(actual_lift(0, 50), Err(CalcError::DivisionUndefined));
        assert!(close(actual_lift(80, 60).unwrap(), -0.25));
    }

    #[test]
    fn waterfall_runs_in_week_order() {
        let r = record(8.0);
        let weeks = vec![
            WeeklyVolume { week: 2, baseline_volume: 100, promo_volume: 120 },
            WeeklyVolume { week: 1, baseline_volume: 100, promo_volume: 200 },
        ];
        let steps = cumulative_profit(&r, &weeks);
        assert_eq!(steps.iter().map(|s| s.week).collect::<Vec<_>>(), vec![1, 2]);
        // week 1: 200*4 - 100*6 = 200; week 2: 120*4 - 600 = -120
        assert!(close(steps[0].delta, 200.0));
        assert!(close(steps[1].delta, -120.0));
        assert!(close(steps[1].running_total, 80.0));
    }

    #[test]
    fn scenario_tables() {
        let r = record(8.0);
        let scenarios = what_if_scenarios(&r);
        assert_eq!(scenarios.len(), SCENARIO_LIFTS.len());
        let at_half = scenarios.iter().find(|s| s.lift == 0.5).unwrap();
        assert!(close(at_half.units_sold, 150.0));
        assert!(close(at_half.profit_vs_baseline, 0.0));
        assert!(at_half.profitable);
        assert!(!scenarios[0].profitable);

        let sens = profit_sensitivity(&r);
        assert_eq!(sens.len(), 13);
        assert!(close(sens[0].lift, -0.2));
        assert!(close(sens[12].lift, 1.0));
    }

    #[test]
    fn curve_spans_two_and_a_half_baselines() {
        let r = record(8.0);
        let curve = breakeven_curve(&r);
        assert_eq!(curve.first().map(|p| p.units), Some(0.0));
        assert_eq!(curve.last().map(|p| p.units), Some(250.0));
        assert_eq!(curve.len(), 51);
        assert!(close(curve[1].promo_profit, 5.0 * 4.0));
    }

    #[test]
    fn overall_lift_sums_weeks() {
        let weeks = vec![
            WeeklyVolume { week: 1, baseline_volume: 100, promo_volume: 150 },
            WeeklyVolume { week: 2, baseline_volume: 100, promo_volume: 130 },
        ];
        assert!(close(overall_lift(&weeks).unwrap(), 0.4));
        assert_eq!(overall_lift(&[]), Err(CalcError::DivisionUndefined));
    }

    #[test]
    fn volume_totals_do_not_overflow() {
        let big = WeeklyVolume { week: 1, baseline_volume: u64::MAX, promo_volume: u64::MAX };
        let weeks = vec![big, WeeklyVolume { week: 2, ..big }];
        assert_eq!(total_volumes(&weeks), (2 * u64::MAX as u128, 2 * u64::MAX as u128));
        assert!(close(overall_lift(&weeks).unwrap(), 0.0));
    }

    #[test]
    fn zero_standard_margin_erosion_is_undefined() {
        let mut r = record(3.0);
        r.standard_price = 4.0;
        assert!(close(standard_margin(&r), 0.0));
        assert!(close(margin_erosion(&r), 1.0));
        assert_eq!(margin_erosion_pct(&r), Err(CalcError::DivisionUndefined));
    }

    #[test]
    fn lift_bands() {
        assert_eq!(lift_band(Ok(0.5)), LiftBand::Achievable);
        assert_eq!(lift_band(Ok(0.8)), LiftBand::Moderate);
        assert_eq!(lift_band(Ok(1.2)), LiftBand::Challenging);
    }
}
