//! Bar-aligned indicator kernels.
//!
//! Every kernel returns exactly one slot per input bar. Slots inside the
//! warm-up window are `None`.

use super::indicator_engine::{IndicatorId, IndicatorParams, IndicatorValue, PriceSource};
use super::{DAY_MS, PriceBar};
use crate::domain::errors::{ChartError, ChartResult};
use std::collections::VecDeque;

/// Neutral reading for bounded oscillators when their denominator vanishes.
pub const NEUTRAL_OSCILLATOR: f64 = 50.0;
pub const NEUTRAL_WILLIAMS_R: f64 = -50.0;

type Slots = Vec<Option<IndicatorValue>>;

pub(crate) fn compute(id: IndicatorId, bars: &[PriceBar], params: &IndicatorParams) -> ChartResult<Slots> {
    let slots = match id {
        IndicatorId::Sma => {
            let values = params.source(PriceSource::Close)?.extract(bars);
            single(rolling_mean(&values, params.period("period", 20)?))
        }
        IndicatorId::Ema => {
            let values = params.source(PriceSource::Close)?.extract(bars);
            single(ema(&defined(&values), params.period("period", 20)?))
        }
        IndicatorId::Wma => {
            let values = params.source(PriceSource::Close)?.extract(bars);
            single(wma(&values, params.period("period", 20)?))
        }
        IndicatorId::Rsi => {
            let values = params.source(PriceSource::Close)?.extract(bars);
            single(rsi(&values, params.period("period", 14)?))
        }
        IndicatorId::Macd => macd(
            &params.source(PriceSource::Close)?.extract(bars),
            params.period("fast", 12)?,
            params.period("slow", 26)?,
            params.period("signal", 9)?,
        )?,
        IndicatorId::Bollinger => bollinger(
            &params.source(PriceSource::Close)?.extract(bars),
            params.period("period", 20)?,
            params.positive("std_dev", 2.0)?,
        ),
        IndicatorId::Atr => single(atr(bars, params.period("period", 14)?)),
        IndicatorId::Stochastic => stochastic(bars, params.period("k_period", 14)?, params.period("d_period", 3)?),
        IndicatorId::WilliamsR => single(williams_r(bars, params.period("period", 14)?)),
        IndicatorId::Cci => single(cci(bars, params.period("period", 20)?, params.positive("constant", 0.015)?)),
        IndicatorId::Roc => {
            let values = params.source(PriceSource::Close)?.extract(bars);
            single(roc(&values, params.period("period", 12)?))
        }
        IndicatorId::Momentum => {
            let values = params.source(PriceSource::Close)?.extract(bars);
            single(momentum(&values, params.period("period", 10)?))
        }
        IndicatorId::Obv => single(obv(bars)),
        IndicatorId::Vwap => single(vwap(bars, params.flag("reset_daily", false))),
        IndicatorId::Mfi => single(mfi(bars, params.period("period", 14)?)),
        IndicatorId::Adx => adx(bars, params.period("period", 14)?),
        IndicatorId::Donchian => donchian(bars, params.period("period", 20)?),
        IndicatorId::Keltner => keltner(
            bars,
            params.period("period", 20)?,
            params.period("atr_period", 10)?,
            params.positive("multiplier", 2.0)?,
        ),
        IndicatorId::HistoricalVolatility => single(historical_volatility(
            &params.source(PriceSource::Close)?.extract(bars),
            params.period("period", 20)?,
            params.positive("periods_per_year", 252.0)?,
        )),
        IndicatorId::Cmf => single(cmf(bars, params.period("period", 20)?)),
    };
    debug_assert_eq!(slots.len(), bars.len());
    Ok(slots)
}

fn single(values: Vec<Option<f64>>) -> Slots {
    values.into_iter().map(|v| v.map(|value| IndicatorValue::Single { value })).collect()
}

fn defined(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().copied().map(Some).collect()
}

/// Fixed-size window with a running sum.
struct RollingWindow {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl RollingWindow {
    fn new(period: usize) -> Self {
        Self { period, window: VecDeque::with_capacity(period + 1), sum: 0.0 }
    }

    #[inline]
    fn push(&mut self, value: f64) -> Option<f64> {
        self.sum += value;
        self.window.push_back(value);
        if self.window.len() > self.period
            && let Some(old) = self.window.pop_front()
        {
            self.sum -= old;
        }
        (self.window.len() == self.period).then_some(self.sum)
    }

    fn reset(&mut self) {
        self.window.clear();
        self.sum = 0.0;
    }
}

pub(crate) fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut win = RollingWindow::new(period);
    values.iter().map(|&v| win.push(v).map(|sum| sum / period as f64)).collect()
}

/// Rolling mean over a series that may carry a warm-up prefix.
fn rolling_mean_opt(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut win = RollingWindow::new(period);
    values
        .iter()
        .map(|v| match v {
            Some(v) => win.push(*v).map(|sum| sum / period as f64),
            None => {
                win.reset();
                None
            }
        })
        .collect()
}

/// EMA seeded with the SMA of the first `period` defined values.
pub(crate) fn ema(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = vec![None; values.len()];
    let mut seed = RollingWindow::new(period);
    let mut last: Option<f64> = None;
    for (i, v) in values.iter().enumerate() {
        let Some(v) = *v else { continue };
        last = match last {
            Some(prev) => Some(alpha * v + (1.0 - alpha) * prev),
            None => seed.push(v).map(|sum| sum / period as f64),
        };
        out[i] = last;
    }
    out
}

/// Wilder smoothing seeded with the mean of the first `period` values.
fn wilder(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let p = period as f64;
    let mut out = vec![None; values.len()];
    if values.len() < period {
        return out;
    }
    let mut avg = values[..period].iter().sum::<f64>() / p;
    out[period - 1] = Some(avg);
    for i in period..values.len() {
        avg = (avg * (p - 1.0) + values[i]) / p;
        out[i] = Some(avg);
    }
    out
}

fn wma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let denom = (period * (period + 1)) as f64 / 2.0;
    (0..values.len())
        .map(|i| {
            (i + 1 >= period).then(|| {
                values[i + 1 - period..=i]
                    .iter()
                    .enumerate()
                    .map(|(w, v)| (w + 1) as f64 * v)
                    .sum::<f64>()
                    / denom
            })
        })
        .collect()
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        NEUTRAL_OSCILLATOR
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if values.len() <= period {
        return out;
    }
    let p = period as f64;
    let (mut gain, mut loss) = (0.0, 0.0);
    for i in 1..=period {
        let change = values[i] - values[i - 1];
        if change > 0.0 {
            gain += change;
        } else {
            loss -= change;
        }
    }
    let mut avg_gain = gain / p;
    let mut avg_loss = loss / p;
    out[period] = Some(rsi_from(avg_gain, avg_loss));

    for i in period + 1..values.len() {
        let change = values[i] - values[i - 1];
        avg_gain = (avg_gain * (p - 1.0) + change.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-change).max(0.0)) / p;
        out[i] = Some(rsi_from(avg_gain, avg_loss));
    }
    out
}

fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> ChartResult<Slots> {
    if fast >= slow {
        return Err(ChartError::InvalidParameter {
            name: "fast".to_string(),
            reason: format!("fast period {fast} must be shorter than slow period {slow}"),
        });
    }
    let series = defined(values);
    let fast_line = ema(&series, fast);
    let slow_line = ema(&series, slow);
    let macd_line: Vec<Option<f64>> = fast_line
        .iter()
        .zip(&slow_line)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal_line = ema(&macd_line, signal);

    Ok(macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| {
            let (macd, signal) = ((*m)?, (*s)?);
            Some(IndicatorValue::Macd { macd, signal, histogram: macd - signal })
        })
        .collect())
}

fn mean_and_std(window: &[f64]) -> (f64, f64) {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn bollinger(values: &[f64], period: usize, std_dev: f64) -> Slots {
    (0..values.len())
        .map(|i| {
            (i + 1 >= period).then(|| {
                let (middle, sd) = mean_and_std(&values[i + 1 - period..=i]);
                IndicatorValue::Band { upper: middle + std_dev * sd, middle, lower: middle - std_dev * sd }
            })
        })
        .collect()
}

fn true_range(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let (h, l) = (bar.ohlcv.high.value(), bar.ohlcv.low.value());
            match i.checked_sub(1).map(|j| bars[j].ohlcv.close.value()) {
                Some(pc) => (h - l).max((h - pc).abs()).max((l - pc).abs()),
                None => h - l,
            }
        })
        .collect()
}

fn atr(bars: &[PriceBar], period: usize) -> Vec<Option<f64>> {
    wilder(&true_range(bars), period)
}

/// Highest high and lowest low over the window ending at `i`.
fn channel(bars: &[PriceBar], i: usize, period: usize) -> (f64, f64) {
    bars[i + 1 - period..=i].iter().fold((f64::NEG_INFINITY, f64::INFINITY), |(hh, ll), b| {
        (hh.max(b.ohlcv.high.value()), ll.min(b.ohlcv.low.value()))
    })
}

fn stochastic_k(bars: &[PriceBar], period: usize) -> Vec<Option<f64>> {
    (0..bars.len())
        .map(|i| {
            (i + 1 >= period).then(|| {
                let (hh, ll) = channel(bars, i, period);
                if hh == ll {
                    NEUTRAL_OSCILLATOR
                } else {
                    (bars[i].ohlcv.close.value() - ll) / (hh - ll) * 100.0
                }
            })
        })
        .collect()
}

fn stochastic(bars: &[PriceBar], k_period: usize, d_period: usize) -> Slots {
    let k = stochastic_k(bars, k_period);
    let d = rolling_mean_opt(&k, d_period);
    k.iter()
        .zip(&d)
        .map(|(k, d)| Some(IndicatorValue::Stochastic { k: (*k)?, d: (*d)? }))
        .collect()
}

fn williams_r(bars: &[PriceBar], period: usize) -> Vec<Option<f64>> {
    (0..bars.len())
        .map(|i| {
            (i + 1 >= period).then(|| {
                let (hh, ll) = channel(bars, i, period);
                if hh == ll {
                    NEUTRAL_WILLIAMS_R
                } else {
                    (hh - bars[i].ohlcv.close.value()) / (hh - ll) * -100.0
                }
            })
        })
        .collect()
}

fn cci(bars: &[PriceBar], period: usize, constant: f64) -> Vec<Option<f64>> {
    let tp: Vec<f64> = bars.iter().map(|b| b.ohlcv.typical_price()).collect();
    (0..tp.len())
        .map(|i| {
            (i + 1 >= period).then(|| {
                let window = &tp[i + 1 - period..=i];
                let mean = window.iter().sum::<f64>() / period as f64;
                let mean_dev = window.iter().map(|v| (v - mean).abs()).sum::<f64>() / period as f64;
                if mean_dev == 0.0 { 0.0 } else { (tp[i] - mean) / (constant * mean_dev) }
            })
        })
        .collect()
}

fn roc(values: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            i.checked_sub(period).map(|j| {
                let prev = values[j];
                if prev == 0.0 { 0.0 } else { (values[i] - prev) / prev * 100.0 }
            })
        })
        .collect()
}

fn momentum(values: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..values.len()).map(|i| i.checked_sub(period).map(|j| values[i] - values[j])).collect()
}

fn obv(bars: &[PriceBar]) -> Vec<Option<f64>> {
    let mut total = 0.0;
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i > 0 {
                let (c, pc) = (bar.ohlcv.close.value(), bars[i - 1].ohlcv.close.value());
                if c > pc {
                    total += bar.ohlcv.volume.value();
                } else if c < pc {
                    total -= bar.ohlcv.volume.value();
                }
            }
            Some(total)
        })
        .collect()
}

fn vwap(bars: &[PriceBar], reset_daily: bool) -> Vec<Option<f64>> {
    let mut pv = 0.0;
    let mut vol = 0.0;
    let mut session: Option<i64> = None;
    bars.iter()
        .map(|bar| {
            let day = bar.timestamp.value().div_euclid(DAY_MS);
            if reset_daily && session != Some(day) {
                pv = 0.0;
                vol = 0.0;
            }
            session = Some(day);
            let tp = bar.ohlcv.typical_price();
            pv += tp * bar.ohlcv.volume.value();
            vol += bar.ohlcv.volume.value();
            Some(if vol == 0.0 { tp } else { pv / vol })
        })
        .collect()
}

fn mfi(bars: &[PriceBar], period: usize) -> Vec<Option<f64>> {
    let tp: Vec<f64> = bars.iter().map(|b| b.ohlcv.typical_price()).collect();
    // signed raw money flow; index 0 carries no direction
    let flows: Vec<f64> = (0..bars.len())
        .map(|i| {
            if i == 0 {
                return 0.0;
            }
            let raw = tp[i] * bars[i].ohlcv.volume.value();
            if tp[i] > tp[i - 1] {
                raw
            } else if tp[i] < tp[i - 1] {
                -raw
            } else {
                0.0
            }
        })
        .collect();

    (0..bars.len())
        .map(|i| {
            (i >= period).then(|| {
                let (pos, neg) = flows[i + 1 - period..=i].iter().fold((0.0, 0.0), |(p, n), f| {
                    if *f > 0.0 { (p + f, n) } else { (p, n - f) }
                });
                rsi_from(pos, neg)
            })
        })
        .collect()
}

fn adx(bars: &[PriceBar], period: usize) -> Slots {
    let n = bars.len();
    let mut out = vec![None; n];
    if n < 2 * period {
        return out;
    }
    let tr = true_range(bars);
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    for i in 1..n {
        let up = bars[i].ohlcv.high.value() - bars[i - 1].ohlcv.high.value();
        let down = bars[i - 1].ohlcv.low.value() - bars[i].ohlcv.low.value();
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    let p = period as f64;
    let mut s_tr: f64 = tr[1..=period].iter().sum();
    let mut s_plus: f64 = plus_dm[1..=period].iter().sum();
    let mut s_minus: f64 = minus_dm[1..=period].iter().sum();
    let mut dx = vec![0.0; n];
    let mut di = vec![(0.0, 0.0); n];

    for i in period..n {
        if i > period {
            s_tr = s_tr - s_tr / p + tr[i];
            s_plus = s_plus - s_plus / p + plus_dm[i];
            s_minus = s_minus - s_minus / p + minus_dm[i];
        }
        let (pdi, mdi) = if s_tr == 0.0 { (0.0, 0.0) } else { (100.0 * s_plus / s_tr, 100.0 * s_minus / s_tr) };
        di[i] = (pdi, mdi);
        dx[i] = if pdi + mdi == 0.0 { 0.0 } else { 100.0 * (pdi - mdi).abs() / (pdi + mdi) };
    }

    let first = 2 * period - 1;
    let mut adx = dx[period..=first].iter().sum::<f64>() / p;
    for i in first..n {
        if i > first {
            adx = (adx * (p - 1.0) + dx[i]) / p;
        }
        out[i] = Some(IndicatorValue::Directional { adx, plus_di: di[i].0, minus_di: di[i].1 });
    }
    out
}

fn donchian(bars: &[PriceBar], period: usize) -> Slots {
    (0..bars.len())
        .map(|i| {
            (i + 1 >= period).then(|| {
                let (upper, lower) = channel(bars, i, period);
                IndicatorValue::Band { upper, middle: (upper + lower) / 2.0, lower }
            })
        })
        .collect()
}

fn keltner(bars: &[PriceBar], period: usize, atr_period: usize, multiplier: f64) -> Slots {
    let closes = defined(&PriceSource::Close.extract(bars));
    let middle = ema(&closes, period);
    let range = atr(bars, atr_period);
    middle
        .iter()
        .zip(&range)
        .map(|(m, a)| {
            let (middle, atr) = ((*m)?, (*a)?);
            Some(IndicatorValue::Band { upper: middle + multiplier * atr, middle, lower: middle - multiplier * atr })
        })
        .collect()
}

fn historical_volatility(values: &[f64], period: usize, periods_per_year: f64) -> Vec<Option<f64>> {
    let returns: Vec<f64> = (0..values.len())
        .map(|i| {
            if i == 0 || values[i] <= 0.0 || values[i - 1] <= 0.0 {
                0.0
            } else {
                (values[i] / values[i - 1]).ln()
            }
        })
        .collect();

    (0..values.len())
        .map(|i| {
            (i >= period && period > 1).then(|| {
                let window = &returns[i + 1 - period..=i];
                let mean = window.iter().sum::<f64>() / period as f64;
                let variance = window.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (period - 1) as f64;
                variance.sqrt() * periods_per_year.sqrt() * 100.0
            })
        })
        .collect()
}

fn cmf(bars: &[PriceBar], period: usize) -> Vec<Option<f64>> {
    let mfv: Vec<f64> = bars
        .iter()
        .map(|b| {
            let (h, l, c) = (b.ohlcv.high.value(), b.ohlcv.low.value(), b.ohlcv.close.value());
            let multiplier = if h == l { 0.0 } else { ((c - l) - (h - c)) / (h - l) };
            multiplier * b.ohlcv.volume.value()
        })
        .collect();

    (0..bars.len())
        .map(|i| {
            (i + 1 >= period).then(|| {
                let volume: f64 = bars[i + 1 - period..=i].iter().map(|b| b.ohlcv.volume.value()).sum();
                if volume == 0.0 { 0.0 } else { mfv[i + 1 - period..=i].iter().sum::<f64>() / volume }
            })
        })
        .collect()
}
