use derive_more::{Constructor, Deref, DerefMut, Display, From, Into};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use strum::{AsRefStr, Display as StrumDisplay, EnumIter, EnumString, IntoEnumIterator};

pub const SECOND_MS: i64 = 1_000;
pub const MINUTE_MS: i64 = 60 * SECOND_MS;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;
pub const WEEK_MS: i64 = 7 * DAY_MS;

/// Value Object - Price
#[derive(Debug, Clone, Copy, PartialEq, From, Into, Deref, DerefMut, Constructor, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(f64);

impl Price {
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.0.partial_cmp(&other.0)
    }
}

/// Value Object - Volume
#[derive(Debug, Clone, Copy, PartialEq, From, Into, Deref, DerefMut, Constructor, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Volume(f64);

impl Volume {
    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Value Object - Timestamp in milliseconds since the Unix epoch
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into, Deref, Constructor, Display, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64
    }

    pub fn from_millis(value: i64) -> Self {
        Self(value)
    }
}

/// Value Object - OHLCV
#[derive(Debug, Clone, Copy, PartialEq, Constructor, Serialize, Deserialize)]
pub struct OHLCV {
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Volume,
}

impl OHLCV {
    /// Checks OHLC ordering and non-negative volume
    pub fn is_valid(&self) -> bool {
        self.high >= self.open
            && self.high >= self.close
            && self.high >= self.low
            && self.low <= self.open
            && self.low <= self.close
            && self.volume.value() >= 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high.value() + self.low.value() + self.close.value()) / 3.0
    }
}

/// Bar interval granularity of the loaded series.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumIter, EnumString, AsRefStr, Serialize, Deserialize,
)]
pub enum TimeInterval {
    #[strum(serialize = "1s")]
    #[serde(rename = "1s")]
    OneSecond,

    #[strum(serialize = "1m")]
    #[serde(rename = "1m")]
    OneMinute,

    #[strum(serialize = "5m")]
    #[serde(rename = "5m")]
    FiveMinutes,

    #[strum(serialize = "15m")]
    #[serde(rename = "15m")]
    FifteenMinutes,

    #[strum(serialize = "30m")]
    #[serde(rename = "30m")]
    ThirtyMinutes,

    #[strum(serialize = "1h")]
    #[serde(rename = "1h")]
    OneHour,

    #[strum(serialize = "4h")]
    #[serde(rename = "4h")]
    FourHours,

    #[strum(serialize = "1d")]
    #[serde(rename = "1d")]
    OneDay,

    #[strum(serialize = "1w")]
    #[serde(rename = "1w")]
    OneWeek,

    #[strum(serialize = "1M")]
    #[serde(rename = "1M")]
    OneMonth,
}

impl TimeInterval {
    pub fn duration_ms(&self) -> i64 {
        match self {
            Self::OneSecond => SECOND_MS,
            Self::OneMinute => MINUTE_MS,
            Self::FiveMinutes => 5 * MINUTE_MS,
            Self::FifteenMinutes => 15 * MINUTE_MS,
            Self::ThirtyMinutes => 30 * MINUTE_MS,
            Self::OneHour => HOUR_MS,
            Self::FourHours => 4 * HOUR_MS,
            Self::OneDay => DAY_MS,
            Self::OneWeek => WEEK_MS,
            Self::OneMonth => 30 * DAY_MS, // approximate
        }
    }

    /// Closest interval to an observed bar spacing, compared on a log scale.
    pub fn nearest(spacing_ms: i64) -> Self {
        if spacing_ms <= 0 {
            return Self::OneMinute;
        }
        let target = (spacing_ms as f64).ln();
        Self::iter()
            .min_by(|a, b| {
                let da = ((a.duration_ms() as f64).ln() - target).abs();
                let db = ((b.duration_ms() as f64).ln() - target).abs();
                da.partial_cmp(&db).unwrap_or(Ordering::Equal)
            })
            .unwrap_or(Self::OneMinute)
    }
}
