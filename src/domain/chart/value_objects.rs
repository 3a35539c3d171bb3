use crate::domain::market_data::{DAY_MS, TimeInterval};
use crate::time_utils;
use chrono::FixedOffset;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};

/// Value Object - closed time window `[start, end]` in epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn span(&self) -> f64 {
        self.end - self.start
    }

    pub fn center(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }

    /// Finite with `start < end`.
    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start < self.end
    }

    pub fn shifted(&self, delta: f64) -> Self {
        Self::new(self.start + delta, self.end + delta)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Index range `[start, end)` into the authoritative bar sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexRange {
    pub start: usize,
    pub end: usize,
}

impl IndexRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end: end.max(start) }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }}

/// Value Object - timeframe preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum TimeframePreset {
    #[display(fmt = "1D")]
    #[strum(serialize = "1D")]
    #[serde(rename = "1D")]
    OneDay,
    #[display(fmt = "5D")]
    #[strum(serialize = "5D")]
    #[serde(rename = "5D")]
    FiveDays,
    #[display(fmt = "1M")]
    #[strum(serialize = "1M")]
    #[serde(rename = "1M")]
    OneMonth,
    #[display(fmt = "3M")]
    #[strum(serialize = "3M")]
    #[serde(rename = "3M")]
    ThreeMonths,
    #[display(fmt = "6M")]
    #[strum(serialize = "6M")]
    #[serde(rename = "6M")]
    SixMonths,
    #[display(fmt = "YTD")]
    #[strum(serialize = "YTD")]
    #[serde(rename = "YTD")]
    YearToDate,
    #[display(fmt = "1Y")]
    #[strum(serialize = "1Y")]
    #[serde(rename = "1Y")]
    OneYear,
    #[display(fmt = "5Y")]
    #[strum(serialize = "5Y")]
    #[serde(rename = "5Y")]
    FiveYears,
    #[display(fmt = "ALL")]
    #[strum(serialize = "ALL")]
    #[serde(rename = "ALL")]
    All,
}

impl TimeframePreset {
    /// Window start for a preset ending at `end`. `data_start` is only read by `ALL`.
    pub fn start_for(&self, end: i64, data_start: Option<i64>, offset: &FixedOffset) -> i64 {
        match self {
            Self::OneDay => end - DAY_MS,
            Self::FiveDays => end - 5 * DAY_MS,
            Self::OneMonth => time_utils::shift_months(end, -1, offset),
            Self::ThreeMonths => time_utils::shift_months(end, -3, offset),
            Self::SixMonths => time_utils::shift_months(end, -6, offset),
            Self::YearToDate => time_utils::year_start(end, offset),
            Self::OneYear => time_utils::shift_months(end, -12, offset),
            Self::FiveYears => time_utils::shift_months(end, -60, offset),
            Self::All => data_start.unwrap_or(end - DAY_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeframeSelection {
    Preset(TimeframePreset),
    #[default]
    Custom,
}

/// Level of detail tier: at `bars_per_pixel_threshold` or denser, bars are
/// aggregated by `aggregation_factor`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodLevel {
    pub bars_per_pixel_threshold: f64,
    pub aggregation_factor: usize,
}

pub const LOD_LEVELS: [LodLevel; 6] = [
    LodLevel { bars_per_pixel_threshold: 0.0, aggregation_factor: 1 },
    LodLevel { bars_per_pixel_threshold: 1.0, aggregation_factor: 2 },
    LodLevel { bars_per_pixel_threshold: 2.0, aggregation_factor: 4 },
    LodLevel { bars_per_pixel_threshold: 4.0, aggregation_factor: 8 },
    LodLevel { bars_per_pixel_threshold: 8.0, aggregation_factor: 16 },
    LodLevel { bars_per_pixel_threshold: 16.0, aggregation_factor: 32 },
];

impl LodLevel {
    /// Coarsest tier whose threshold does not exceed `bars_per_pixel`.
    pub fn for_density(bars_per_pixel: f64) -> LodLevel {
        LOD_LEVELS
            .iter()
            .rev()
            .find(|l| l.bars_per_pixel_threshold <= bars_per_pixel)
            .copied()
            .unwrap_or(LOD_LEVELS[0])
    }
}

/// Read-only snapshot of the viewport handed to renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewportState {
    pub visible: TimeRange,
    pub cached_range: IndexRange,
    pub timeframe: TimeframeSelection,
    pub interval: TimeInterval,
    pub width: f64,
    pub height: f64,
    pub price_range: ValueRange,
    pub volume_range: ValueRange,
    /// Full data span over visible span; 1.0 shows everything.
    pub zoom_level: f64,
    pub pixels_per_ms: f64,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            visible: TimeRange::default(),
            cached_range: IndexRange::default(),
            timeframe: TimeframeSelection::Custom,
            interval: TimeInterval::OneDay,
            width: 800.0,
            height: 600.0,
            price_range: ValueRange::new(0.0, 100.0),
            volume_range: ValueRange::new(0.0, 1.0),
            zoom_level: 1.0,
            pixels_per_ms: 0.0,
        }
    }
}

impl ViewportState {
    /// Convert a timestamp to a screen X coordinate
    pub fn time_to_x(&self, timestamp: f64) -> f64 {
        let span = self.visible.span();
        if span <= 0.0 {
            return 0.0;
        }
        (timestamp - self.visible.start) / span * self.width
    }

    /// Convert a screen X coordinate back to time
    pub fn x_to_time(&self, x: f64) -> f64 {
        if self.width <= 0.0 {
            return self.visible.start;
        }
        self.visible.start + self.visible.span() * (x / self.width)
    }

    /// Convert a price to a screen Y coordinate
    pub fn price_to_y(&self, price: f64) -> f64 {
        let span = self.price_range.span();
        if span <= 0.0 {
            return self.height / 2.0;
        }
        let normalized = (price - self.price_range.min) / span;
        self.height * (1.0 - normalized) // Invert Y
    }

    /// Convert a screen Y coordinate back to price
    pub fn y_to_price(&self, y: f64) -> f64 {
        if self.height <= 0.0 {
            return self.price_range.min;
        }
        let normalized = 1.0 - y / self.height;
        self.price_range.min + self.price_range.span() * normalized
    }
}

/// Value Object - one axis tick candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisTick {
    /// Epoch milliseconds on the time axis, the level on the price axis.
    pub value: f64,
    /// Pixel offset along the axis.
    pub position: f64,
    pub label: String,
    pub is_major: bool,
    pub is_key_boundary: bool,
}

/// Screen-space label candidate. `id` is opaque to the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelBox {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub priority: i32,
    pub is_major: bool,
}

impl LabelBox {
    pub fn new(id: usize, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { id, x, y, width, height, priority: 0, is_major: false }
    }

    pub fn with_priority(self, priority: i32) -> Self {
        Self { priority, ..self }
    }

    pub fn major(self) -> Self {
        Self { is_major: true, ..self }
    }

    /// Grown by `margin` on every side.
    pub fn expanded(&self, margin: f64) -> LabelBox {
        LabelBox {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + 2.0 * margin,
            height: self.height + 2.0 * margin,
            ..*self
        }
    }

    /// Strict AABB overlap; touching edges do not collide.
    pub fn overlaps(&self, other: &LabelBox) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum PanDelta {
    /// Drag distance; positive moves content right.
    Pixels(f64),
    /// Shift both edges by this many milliseconds.
    Time(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScaleMode {
    #[default]
    Linear,
    Logarithmic,
    /// Percent change relative to `base`.
    Percentage { base: f64 },
}
