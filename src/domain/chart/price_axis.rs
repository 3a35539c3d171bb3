//! "Nice" price ticks on a 1-2-5 ladder.

use super::value_objects::{AxisTick, ScaleMode};
use crate::domain::errors::{ChartError, ChartResult};
use serde::{Deserialize, Serialize};

/// Relative range thresholds and the padding applied below each.
const PADDING_TABLE: [(f64, f64); 3] = [(0.01, 0.06), (0.10, 0.05), (0.50, 0.04)];
const PADDING_DEFAULT: f64 = 0.03;

const STEP_MANTISSAS: [f64; 3] = [1.0, 2.0, 5.0];
/// Leading digits of round-number levels.
const PSYCHOLOGICAL_MANTISSAS: [f64; 2] = [1.0, 5.0];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceAxisConfig {
    pub min_ticks: usize,
    pub max_ticks: usize,
    pub min_tick_spacing_px: f64,
    /// Weight of the step-size term in the score.
    pub step_weight: f64,
}

impl Default for PriceAxisConfig {
    fn default() -> Self {
        Self { min_ticks: 5, max_ticks: 12, min_tick_spacing_px: 60.0, step_weight: 0.5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceAxis {
    pub ticks: Vec<AxisTick>,
    pub nice_min: f64,
    pub nice_max: f64,
    /// Linear step; the decade ratio (10) for logarithmic axes.
    pub step: f64,
    pub decimals: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PriceAxisCalculator {
    config: PriceAxisConfig,
}

impl PriceAxisCalculator {
    pub fn new(config: PriceAxisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PriceAxisConfig {
        &self.config
    }

    /// Ticks for `[data_min, data_max]` on a surface `height` pixels tall.
    /// Positions grow downward from the top edge.
    pub fn compute(
        &self,
        data_min: f64,
        data_max: f64,
        height: f64,
        min_tick_spacing_px: f64,
        scale_mode: ScaleMode,
    ) -> ChartResult<PriceAxis> {
        if !(data_min.is_finite() && data_max.is_finite()) {
            return Err(ChartError::InvalidRange(format!("price range [{data_min}, {data_max}]")));
        }
        if !(height.is_finite() && height > 0.0 && min_tick_spacing_px.is_finite() && min_tick_spacing_px > 0.0) {
            return Err(ChartError::InvalidRange(format!("height {height} / spacing {min_tick_spacing_px}")));
        }
        let (lo, hi) = if data_min <= data_max { (data_min, data_max) } else { (data_max, data_min) };
        let target = self.target_ticks(height, min_tick_spacing_px);

        match scale_mode {
            ScaleMode::Linear => Ok(self.linear(lo, hi, height, target, lo >= 0.0, |v, d| format!("{v:.d$}"))),
            ScaleMode::Logarithmic => self.logarithmic(lo, hi, height, target),
            ScaleMode::Percentage { base } => {
                if !base.is_finite() || base == 0.0 {
                    return Err(ChartError::InvalidRange(format!("percentage base {base}")));
                }
                let to_pct = |v: f64| (v - base) / base.abs() * 100.0;
                let (p_lo, p_hi) = (to_pct(lo), to_pct(hi));
                Ok(self.linear(p_lo, p_hi, height, target, false, |v, d| format!("{v:+.d$}%", d = d.max(2))))
            }
        }
    }

    pub fn target_ticks(&self, height: f64, min_spacing: f64) -> usize {
        let raw = (height / min_spacing).round();
        (raw.max(0.0) as usize).clamp(self.config.min_ticks, self.config.max_ticks)
    }

    fn linear(
        &self,
        lo: f64,
        hi: f64,
        height: f64,
        target: usize,
        non_negative: bool,
        fmt: impl Fn(f64, usize) -> String,
    ) -> PriceAxis {
        let (lo, hi) = expand_degenerate(lo, hi);
        let (lo, hi) = pad(lo, hi, non_negative);
        let step = self.choose_step(lo, hi, target);

        let mut first = (lo / step).floor() as i64;
        let mut last = (hi / step).ceil() as i64;
        if is_psychological((first - 1) as f64 * step) && (!non_negative || first > 0) {
            first -= 1;
        }
        if is_psychological((last + 1) as f64 * step) {
            last += 1;
        }

        let decimals = decimals_for(step);
        let nice_min = first as f64 * step;
        let nice_max = last as f64 * step;
        let span = nice_max - nice_min;
        let ticks = (first..=last)
            .map(|i| {
                let value = round_to(i as f64 * step, decimals);
                let is_major = i % 5 == 0 || (is_psychological(value) && value.abs() >= 10.0 * step);
                AxisTick {
                    value,
                    position: height * (1.0 - (value - nice_min) / span),
                    label: fmt(value, decimals),
                    is_major,
                    is_key_boundary: false,
                }
            })
            .collect();

        PriceAxis { ticks, nice_min, nice_max, step, decimals }
    }

    /// Candidate from {1,2,5}·10^k with the lowest score.
    fn choose_step(&self, lo: f64, hi: f64, target: usize) -> f64 {
        let ideal = (hi - lo) / target as f64;
        let exponent = ideal.log10().floor() as i32;
        let target = target as f64;

        let mut best = (f64::INFINITY, ideal);
        for k in exponent - 1..=exponent + 1 {
            for m in STEP_MANTISSAS {
                let step = m * 10f64.powi(k);
                let count = ((hi / step).ceil() - (lo / step).floor()) + 1.0;
                let score = (count - target).abs() / target + self.config.step_weight * (step / ideal).log10().abs();
                if score < best.0 {
                    best = (score, step);
                }
            }
        }
        best.1
    }

    fn logarithmic(&self, lo: f64, hi: f64, height: f64, target: usize) -> ChartResult<PriceAxis> {
        if lo <= 0.0 {
            return Err(ChartError::InvalidRange(format!("logarithmic scale needs positive prices, got {lo}")));
        }
        let (lo, hi) = expand_degenerate(lo, hi);
        let mut levels = Vec::new();
        let min_exp = lo.log10().floor() as i32;
        let max_exp = hi.log10().ceil() as i32;
        for k in min_exp..=max_exp {
            for m in STEP_MANTISSAS {
                levels.push(m * 10f64.powi(k));
            }
        }
        let nice_min = levels.iter().copied().filter(|v| *v <= lo).fold(levels[0], f64::max);
        let nice_max = levels.iter().copied().find(|v| *v >= hi).unwrap_or(10f64.powi(max_exp + 1));
        levels.retain(|v| *v >= nice_min && *v <= nice_max);

        // dense 1-2-5 decades become 1-only decades
        if levels.len() > target + target / 2 {
            levels.retain(|v| is_decade(*v) || *v == nice_min || *v == nice_max);
        }

        let decimals = decimals_for(nice_min);
        let (log_min, log_max) = (nice_min.log10(), nice_max.log10());
        let ticks = levels
            .into_iter()
            .map(|value| AxisTick {
                value,
                position: height * (1.0 - (value.log10() - log_min) / (log_max - log_min)),
                label: format!("{value:.decimals$}"),
                is_major: is_decade(value),
                is_key_boundary: false,
            })
            .collect();

        Ok(PriceAxis { ticks, nice_min, nice_max, step: 10.0, decimals })
    }
}

fn expand_degenerate(lo: f64, hi: f64) -> (f64, f64) {
    if hi > lo {
        return (lo, hi);
    }
    let e = (lo.abs() * 0.01).max(0.01);
    (lo - e, hi + e)
}

fn pad(lo: f64, hi: f64, non_negative: bool) -> (f64, f64) {
    let range = hi - lo;
    let reference = lo.abs().max(hi.abs());
    let relative = if reference > 0.0 { range / reference } else { f64::INFINITY };
    let fraction = PADDING_TABLE
        .iter()
        .find(|(limit, _)| relative < *limit)
        .map(|(_, p)| *p)
        .unwrap_or(PADDING_DEFAULT);
    let padding = range * fraction;
    let lo = if non_negative { (lo - padding).max(0.0) } else { lo - padding };
    (lo, hi + padding)
}

pub fn decimals_for(step: f64) -> usize {
    match step.abs() {
        s if s >= 1.0 => 0,
        s if s >= 0.1 => 1,
        s if s >= 0.01 => 2,
        s if s >= 0.001 => 3,
        _ => 4,
    }
}

fn round_to(value: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals as i32 + 2);
    (value * factor).round() / factor
}

fn mantissa(value: f64) -> Option<f64> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    Some(value / 10f64.powi(value.log10().floor() as i32))
}

/// `{1,5}·10^k`.
pub fn is_psychological(value: f64) -> bool {
    mantissa(value).is_some_and(|m| PSYCHOLOGICAL_MANTISSAS.iter().any(|p| (m - p).abs() < 1e-9))
}

fn is_decade(value: f64) -> bool {
    mantissa(value).is_some_and(|m| (m - 1.0).abs() < 1e-9)
}
