//! Time axis tick selection on a calendar-aligned step ladder.

use super::value_objects::{AxisTick, TimeRange};
use crate::domain::errors::{ChartError, ChartResult};
use crate::domain::logging::LogComponent;
use crate::domain::market_data::{DAY_MS, HOUR_MS, MINUTE_MS, PriceBar, WEEK_MS};
use crate::log_trace;
use crate::time_utils;
use chrono::{Datelike, FixedOffset, Timelike, Weekday};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    #[display(fmt = "minute")]
    Minute,
    #[display(fmt = "hour")]
    Hour,
    #[display(fmt = "day")]
    Day,
    #[display(fmt = "week")]
    Week,
    #[display(fmt = "month")]
    Month,
    #[display(fmt = "year")]
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display(fmt = "{} {}", count, unit)]
pub struct TimeStep {
    pub unit: TimeUnit,
    pub count: u32,
}

impl TimeStep {
    pub const fn new(unit: TimeUnit, count: u32) -> Self {
        Self { unit, count }
    }

    /// Nominal length, used only to estimate tick counts.
    pub fn approx_ms(&self) -> f64 {
        let unit = match self.unit {
            TimeUnit::Minute => MINUTE_MS as f64,
            TimeUnit::Hour => HOUR_MS as f64,
            TimeUnit::Day => DAY_MS as f64,
            TimeUnit::Week => WEEK_MS as f64,
            TimeUnit::Month => 30.44 * DAY_MS as f64,
            TimeUnit::Year => 365.25 * DAY_MS as f64,
        };
        unit * self.count as f64
    }}

/// Ascending step ladder.
pub const TIME_STEPS: [TimeStep; 24] = [
    TimeStep::new(TimeUnit::Minute, 1),
    TimeStep::new(TimeUnit::Minute, 2),
    TimeStep::new(TimeUnit::Minute, 5),
    TimeStep::new(TimeUnit::Minute, 10),
    TimeStep::new(TimeUnit::Minute, 15),
    TimeStep::new(TimeUnit::Minute, 30),
    TimeStep::new(TimeUnit::Hour, 1),
    TimeStep::new(TimeUnit::Hour, 2),
    TimeStep::new(TimeUnit::Hour, 3),
    TimeStep::new(TimeUnit::Hour, 4),
    TimeStep::new(TimeUnit::Hour, 6),
    TimeStep::new(TimeUnit::Hour, 12),
    TimeStep::new(TimeUnit::Day, 1),
    TimeStep::new(TimeUnit::Week, 1),
    TimeStep::new(TimeUnit::Month, 1),
    TimeStep::new(TimeUnit::Month, 3),
    TimeStep::new(TimeUnit::Month, 6),
    TimeStep::new(TimeUnit::Year, 1),
    TimeStep::new(TimeUnit::Year, 2),
    TimeStep::new(TimeUnit::Year, 5),
    TimeStep::new(TimeUnit::Year, 10),
    TimeStep::new(TimeUnit::Year, 25),
    TimeStep::new(TimeUnit::Year, 50),
    TimeStep::new(TimeUnit::Year, 100),
];

/// Acceptable tick counts for a given width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickBand {
    pub min: usize,
    pub max: usize,
    pub target: usize,
}

impl TickBand {
    pub fn contains(&self, count: usize) -> bool {
        (self.min..=self.max).contains(&count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeparatorKind {
    Day,
    Month,
    Quarter,
    Year,
    Decade,
}

/// Period boundary line drawn behind the ticks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Separator {
    pub timestamp: i64,
    pub position: f64,
    pub kind: SeparatorKind,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeAxis {
    pub ticks: Vec<AxisTick>,
    pub separators: Vec<Separator>,
    pub granularity: TimeStep,
    pub band: TickBand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeAxisConfig {
    pub reference_width: f64,
    pub min_ticks: usize,
    pub max_ticks: usize,
    pub utc_offset_minutes: i32,
    pub market_open_hour: u32,
    pub market_open_minute: u32,
    pub market_close_hour: u32,
}

impl Default for TimeAxisConfig {
    fn default() -> Self {
        Self {
            reference_width: 800.0,
            min_ticks: 5,
            max_ticks: 9,
            utc_offset_minutes: 0,
            market_open_hour: 9,
            market_open_minute: 30,
            market_close_hour: 16,
        }
    }
}

/// Safety factor for skipping steps whose estimated count is hopeless.
const ESTIMATE_SLACK: usize = 8;

#[derive(Debug, Clone)]
pub struct TimeAxisCalculator {
    config: TimeAxisConfig,
    offset: FixedOffset,
}

impl Default for TimeAxisCalculator {
    fn default() -> Self {
        Self::new(TimeAxisConfig::default())
    }
}

impl TimeAxisCalculator {
    pub fn new(config: TimeAxisConfig) -> Self {
        let offset = time_utils::offset_from_minutes(config.utc_offset_minutes);
        Self { config, offset }
    }

    pub fn offset(&self) -> &FixedOffset {
        &self.offset
    }

    /// Tick band at `width`, scaled from the reference width.
    pub fn band(&self, width: f64) -> TickBand {
        let factor = (width / self.config.reference_width).clamp(0.5, 2.0);
        let min = ((self.config.min_ticks as f64 * factor).round() as usize).max(3);
        let max = ((self.config.max_ticks as f64 * factor).round() as usize).max(min + 2);
        let target = ((max as f64 / 1.5).floor() as usize).max(min);
        TickBand { min, max, target }
    }

    pub fn compute_for_bars(&self, bars: &[PriceBar], width: f64) -> ChartResult<TimeAxis> {
        match (bars.first(), bars.last()) {
            (Some(first), Some(last)) if last.timestamp > first.timestamp => {
                self.compute(TimeRange::new(first.timestamp.as_f64(), last.timestamp.as_f64()), width)
            }
            _ => Err(ChartError::MissingInput("at least two distinct bar timestamps are required".to_string())),
        }
    }

    pub fn compute(&self, range: TimeRange, width: f64) -> ChartResult<TimeAxis> {
        if !range.is_valid() {
            return Err(ChartError::InvalidRange(format!("time range [{}, {}]", range.start, range.end)));
        }
        if !width.is_finite() || width <= 0.0 {
            return Err(ChartError::InvalidRange(format!("axis width {width}")));
        }

        let band = self.band(width);
        let start = range.start.ceil() as i64;
        let end = range.end.floor() as i64;
        let (step, mut ticks) = self.select_step(start, end, band);

        if ticks.len() > band.max {
            ticks = thin(ticks, band);
        }

        let span = end - start;
        let separators = self.separators(step, start, end);
        let boundaries: HashSet<i64> = separators.iter().map(|s| s.timestamp).collect();
        let scale = width / range.span();
        let ticks = ticks
            .into_iter()
            .map(|(t, is_major)| AxisTick {
                value: t as f64,
                position: (t as f64 - range.start) * scale,
                label: self.label(step, t, span),
                is_major,
                is_key_boundary: boundaries.contains(&t),
            })
            .collect();
        let separators = separators
            .into_iter()
            .map(|mut s| {
                s.position = (s.timestamp as f64 - range.start) * scale;
                s
            })
            .collect();

        log_trace!(LogComponent::Domain("TimeAxis"), "step {} over {} ms", step, span);
        Ok(TimeAxis { ticks, separators, granularity: step, band })
    }

    /// Smallest step whose count lies in the band. A jump from above the band
    /// to below it keeps the denser step for thinning.
    fn select_step(&self, start: i64, end: i64, band: TickBand) -> (TimeStep, Vec<(i64, bool)>) {
        let span = (end - start) as f64;
        let mut denser: Option<(TimeStep, Vec<(i64, bool)>)> = None;

        for step in TIME_STEPS {
            let estimate = span / step.approx_ms();
            if estimate > (ESTIMATE_SLACK * (band.max + 1)) as f64 {
                continue;
            }
            let ticks: Vec<(i64, bool)> =
                self.candidates(step, start, end).into_iter().map(|t| (t, self.is_major(step, t))).collect();
            let count = ticks.len();
            if band.contains(count) {
                return (step, ticks);
            }
            if count < band.min {
                return denser.unwrap_or((step, ticks));
            }
            denser = Some((step, ticks));
        }

        let coarsest = TIME_STEPS[TIME_STEPS.len() - 1];
        denser.unwrap_or((coarsest, Vec::new()))
    }

    /// Calendar-aligned tick instants in `[start, end]`.
    pub fn candidates(&self, step: TimeStep, start: i64, end: i64) -> Vec<i64> {
        let off = time_utils::offset_ms(&self.offset);
        let count = step.count.max(1);
        match step.unit {
            TimeUnit::Minute | TimeUnit::Hour | TimeUnit::Day => {
                let unit = step.approx_ms() as i64;
                let first = ceil_to(start + off, unit) - off;
                (0..).map(|i| first + i * unit).take_while(|t| *t <= end).collect()
            }
            TimeUnit::Week => {
                let mut day = ceil_to(start + off, DAY_MS) / DAY_MS;
                // 1970-01-05 (day 4) was a Monday
                while (day + 3).rem_euclid(7) != 0 {
                    day += 1;
                }
                let first = day * DAY_MS - off;
                let unit = WEEK_MS * count as i64;
                (0..).map(|i| first + i * unit).take_while(|t| *t <= end).collect()
            }
            TimeUnit::Month => {
                let Some(dt) = time_utils::to_datetime(start, &self.offset) else { return Vec::new() };
                let mut index = dt.year() * 12 + dt.month0() as i32;
                let mut out = Vec::new();
                loop {
                    let (year, month0) = (index.div_euclid(12), index.rem_euclid(12));
                    let Some(t) = time_utils::local_date_ms(year, month0 as u32 + 1, 1, &self.offset) else { break };
                    if t > end {
                        break;
                    }
                    if t >= start && month0 as u32 % count == 0 {
                        out.push(t);
                    }
                    index += 1;
                }
                out
            }
            TimeUnit::Year => {
                let Some(dt) = time_utils::to_datetime(start, &self.offset) else { return Vec::new() };
                let count = count as i32;
                let mut year = dt.year().div_euclid(count) * count;
                let mut out = Vec::new();
                while let Some(t) = time_utils::local_date_ms(year, 1, 1, &self.offset) {
                    if t > end {
                        break;
                    }
                    if t >= start {
                        out.push(t);
                    }
                    year += count;
                }
                out
            }
        }
    }

    pub fn is_major(&self, step: TimeStep, t: i64) -> bool {
        let Some(dt) = time_utils::to_datetime(t, &self.offset) else { return false };
        let cfg = &self.config;
        match step.unit {
            TimeUnit::Minute => {
                dt.minute() == 0 || (dt.hour() == cfg.market_open_hour && dt.minute() == cfg.market_open_minute)
            }
            TimeUnit::Hour => {
                dt.hour() == 0 || dt.hour() == cfg.market_open_hour || dt.hour() == cfg.market_close_hour
            }
            TimeUnit::Day => dt.weekday() == Weekday::Mon || dt.day() == 1,
            TimeUnit::Week => dt.day() <= 7,
            TimeUnit::Month => dt.month0() % 3 == 0,
            TimeUnit::Year => {
                let every = if step.count >= 5 { 50 } else { 10 };
                dt.year().rem_euclid(every) == 0
            }
        }
    }

    pub fn label(&self, step: TimeStep, t: i64, span_ms: i64) -> String {
        let pattern = match step.unit {
            TimeUnit::Minute | TimeUnit::Hour => {
                if span_ms <= DAY_MS {
                    "%H:%M"
                } else {
                    "%m-%d %H:%M"
                }
            }
            TimeUnit::Day | TimeUnit::Week => {
                if span_ms <= 180 * DAY_MS {
                    "%m-%d"
                } else {
                    "%Y-%m-%d"
                }
            }
            TimeUnit::Month => match time_utils::to_datetime(t, &self.offset) {
                Some(dt) if dt.month() == 1 => "%Y",
                _ => "%b",
            },
            TimeUnit::Year => "%Y",
        };
        time_utils::format_ms(t, &self.offset, pattern)
    }

    /// Boundary lines one level above the tick granularity.
    pub fn separators(&self, step: TimeStep, start: i64, end: i64) -> Vec<Separator> {
        let source = match step.unit {
            TimeUnit::Minute | TimeUnit::Hour => TimeStep::new(TimeUnit::Day, 1),
            TimeUnit::Day | TimeUnit::Week => TimeStep::new(TimeUnit::Month, 1),
            TimeUnit::Month if step.count == 1 => TimeStep::new(TimeUnit::Month, 3),
            TimeUnit::Month => TimeStep::new(TimeUnit::Year, 1),
            TimeUnit::Year => TimeStep::new(TimeUnit::Year, 10),
        };

        self.candidates(source, start, end)
            .into_iter()
            .filter_map(|t| {
                let dt = time_utils::to_datetime(t, &self.offset)?;
                let kind = match source.unit {
                    TimeUnit::Day => SeparatorKind::Day,
                    TimeUnit::Month if dt.month() == 1 => SeparatorKind::Year,
                    TimeUnit::Month if source.count == 1 => SeparatorKind::Month,
                    TimeUnit::Month => SeparatorKind::Quarter,
                    TimeUnit::Year if source.count == 1 => SeparatorKind::Year,
                    _ => SeparatorKind::Decade,
                };
                let label = match kind {
                    SeparatorKind::Day => dt.format("%b %d").to_string(),
                    SeparatorKind::Month => dt.format("%b").to_string(),
                    SeparatorKind::Quarter => format!("Q{}", dt.month0() / 3 + 1),
                    SeparatorKind::Year | SeparatorKind::Decade => dt.format("%Y").to_string(),
                };
                Some(Separator { timestamp: t, position: 0.0, kind, label })
            })
            .collect()
    }
}

fn ceil_to(value: i64, unit: i64) -> i64 {
    value.div_euclid(unit) * unit + if value.rem_euclid(unit) == 0 { 0 } else { unit }
}

/// Reduce an over-full tick list toward the band target.
fn thin(ticks: Vec<(i64, bool)>, band: TickBand) -> Vec<(i64, bool)> {
    let (majors, minors): (Vec<_>, Vec<_>) = ticks.into_iter().partition(|(_, major)| *major);
    if majors.len() >= band.min {
        if majors.len() > band.max {
            return sample_evenly(majors, band.target);
        }
        return majors;
    }
    let room = band.target.saturating_sub(majors.len());
    let mut kept = majors;
    kept.extend(sample_evenly(minors, room));
    kept.sort_by_key(|(t, _)| *t);
    kept
}

/// `k` items spread evenly across `items`, always including both ends when `k >= 2`.
pub(crate) fn sample_evenly<T>(items: Vec<T>, k: usize) -> Vec<T> {
    let n = items.len();
    if k >= n {
        return items;
    }
    if k == 0 {
        return Vec::new();
    }
    let picks: HashSet<usize> = if k == 1 {
        std::iter::once(n / 2).collect()
    } else {
        (0..k).map(|i| ((i * (n - 1)) as f64 / (k - 1) as f64).round() as usize).collect()
    };
    items.into_iter().enumerate().filter(|(i, _)| picks.contains(i)).map(|(_, item)| item).collect()
}
