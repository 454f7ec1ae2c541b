//! Feature construction: circular encoding of the cyclic calendar fields and
//! the flat record handed to the predictor.

use std::{collections::HashMap, f64::consts::PI, fmt, str::FromStr};

use crate::calendar::{CalendarFields, DAYS_PER_WEEK, HOURS_PER_DAY};

/// Every feature the pipeline can produce. `as_str` is the column label the
/// trained models were fit on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureName {
    HourSin,
    HourCos,
    DowSin,
    DowCos,
    DayOfMonth,
    Month,
    Weekend,
    TripDistance,
    OriginZone,
    DestinationZone,
}

impl FeatureName {
    pub const ALL: [FeatureName; 10] = [
        FeatureName::HourSin,
        FeatureName::HourCos,
        FeatureName::DowSin,
        FeatureName::DowCos,
        FeatureName::DayOfMonth,
        FeatureName::Month,
        FeatureName::Weekend,
        FeatureName::TripDistance,
        FeatureName::OriginZone,
        FeatureName::DestinationZone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureName::HourSin => "hour_sin",
            FeatureName::HourCos => "hour_cos",
            FeatureName::DowSin => "dow_sin",
            FeatureName::DowCos => "dow_cos",
            FeatureName::DayOfMonth => "day_of_month",
            FeatureName::Month => "month",
            FeatureName::Weekend => "weekend",
            FeatureName::TripDistance => "trip_distance",
            FeatureName::OriginZone => "PULocationID",
            FeatureName::DestinationZone => "DOLocationID",
        }
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown feature '{s}'"))
    }
}

/// A (sin, cos) projection of a value on a cycle of length `period`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularPair {
    pub sin: f64,
    pub cos: f64,
}

impl CircularPair {
    pub fn encode(value: u32, period: u32) -> Self {
        let angle = 2.0 * PI * f64::from(value) / f64::from(period);
        Self {
            sin: angle.sin(),
            cos: angle.cos(),
        }
    }
}

/// The calendar-derived half of a [`FeatureRecord`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalendarFeatures {
    pub hour: CircularPair,
    pub day_of_week: CircularPair,
    pub day_of_month: u32,
    pub month: u32,
    pub weekend: bool,
}

/// Cyclic-encodes hour (period 24) and day of week (period 7). Day of month,
/// month and the weekend flag pass through raw.
pub fn transform(fields: &CalendarFields) -> CalendarFeatures {
    CalendarFeatures {
        hour: CircularPair::encode(fields.hour, HOURS_PER_DAY),
        day_of_week: CircularPair::encode(fields.day_of_week, DAYS_PER_WEEK),
        day_of_month: fields.day,
        month: fields.month,
        weekend: fields.is_weekend,
    }
}

/// Trip inputs that stay fixed for a whole forecast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripContext {
    pub trip_distance: f64,
    pub origin_zone: u32,
    pub destination_zone: u32,
}

/// One fully-formed model input, before schema alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRecord {
    pub calendar: CalendarFeatures,
    pub trip: TripContext,
}

impl FeatureRecord {
    pub fn assemble(calendar: CalendarFeatures, trip: TripContext) -> Self {
        Self { calendar, trip }
    }

    pub fn get(&self, name: FeatureName) -> f64 {
        match name {
            FeatureName::HourSin => self.calendar.hour.sin,
            FeatureName::HourCos => self.calendar.hour.cos,
            FeatureName::DowSin => self.calendar.day_of_week.sin,
            FeatureName::DowCos => self.calendar.day_of_week.cos,
            FeatureName::DayOfMonth => f64::from(self.calendar.day_of_month),
            FeatureName::Month => f64::from(self.calendar.month),
            FeatureName::Weekend => {
                if self.calendar.weekend {
                    1.0
                } else {
                    0.0
                }
            }
            FeatureName::TripDistance => self.trip.trip_distance,
            FeatureName::OriginZone => f64::from(self.trip.origin_zone),
            FeatureName::DestinationZone => f64::from(self.trip.destination_zone),
        }
    }

    /// (name, value) pairs in declaration order; handy for logging.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureName, f64)> + '_ {
        FeatureName::ALL.iter().map(move |n| (*n, self.get(*n)))
    }
}

/// Anything the predictor can pull named feature values from.
pub trait FeatureSource {
    fn value(&self, name: &str) -> Option<f64>;
}

impl FeatureSource for FeatureRecord {
    fn value(&self, name: &str) -> Option<f64> {
        name.parse::<FeatureName>().ok().map(|n| self.get(n))
    }
}

impl FeatureSource for HashMap<String, f64> {
    fn value(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}
