//! Declared feature schema for the solar output model.
//!
//! Every column the model can be fed is listed here with its kind and
//! defaults. Reconciliation looks column types up in this table instead of
//! guessing them from sample values.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

/// How a column is typed when presented to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeatureKind {
    /// Whole-valued numeric column (day of year, month, ...)
    Integer,
    /// Continuous numeric column (temperature, pressure, ...)
    Float,
    /// Numeric codes the model encodes internally (year, first hour of period)
    Categorical,
    /// Indicator flags
    Boolean,
}

impl FeatureKind {
    /// Neutral value used when a column is absent from the input
    pub fn default_value(self) -> FeatureValue {
        match self {
            FeatureKind::Boolean => FeatureValue::Bool(false),
            FeatureKind::Integer | FeatureKind::Categorical => FeatureValue::Int(0),
            FeatureKind::Float => FeatureValue::Float(0.0),
        }
    }
}

/// A single reconciled cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl FeatureValue {
    /// Numeric view handed to the estimator; flags become 1.0 / 0.0
    pub fn as_f64(&self) -> f64 {
        match *self {
            FeatureValue::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            FeatureValue::Int(i) => i as f64,
            FeatureValue::Float(f) => f,
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Bool(true) => write!(f, "True"),
            FeatureValue::Bool(false) => write!(f, "False"),
            FeatureValue::Int(i) => write!(f, "{}", i),
            FeatureValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// One entry of the declared schema
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldSpec {
    /// Column name as recorded at training time
    pub column: &'static str,
    /// Form field name
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FeatureKind,
    /// Value pre-filled in the manual form
    pub form_default: FeatureValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl FieldSpec {
    const fn new(
        column: &'static str,
        key: &'static str,
        label: &'static str,
        kind: FeatureKind,
        form_default: FeatureValue,
    ) -> Self {
        Self {
            column,
            key,
            label,
            kind,
            form_default,
            min: None,
            max: None,
        }
    }

    const fn flag(column: &'static str, key: &'static str, label: &'static str) -> Self {
        Self::new(column, key, label, FeatureKind::Boolean, FeatureValue::Bool(false))
    }

    const fn bounded(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Value used when the column is missing from the input
    pub fn missing_default(&self) -> FeatureValue {
        self.kind.default_value()
    }
}

/// Years offered by the manual form
pub const FORM_YEARS: [i64; 4] = [2020, 2021, 2022, 2023];

/// Column appended to batch results
pub const PREDICTION_COLUMN: &str = "Predicted Solar Power Output";

/// Training-time feature order of the solar output model
pub const SOLAR_FEATURES: [FieldSpec; 26] = [
    FieldSpec::new("day of year", "day_of_year", "Day of Year", FeatureKind::Integer, FeatureValue::Int(120))
        .bounded(1.0, 366.0),
    FieldSpec::new("year", "year", "Year", FeatureKind::Categorical, FeatureValue::Int(2022))
        .bounded(2020.0, 2023.0),
    FieldSpec::new("month", "month", "Month", FeatureKind::Integer, FeatureValue::Int(4))
        .bounded(1.0, 12.0),
    FieldSpec::new("day", "day", "Day", FeatureKind::Integer, FeatureValue::Int(30))
        .bounded(1.0, 31.0),
    FieldSpec::new(
        "first hour of period",
        "first_hour_of_period",
        "First Hour of Period",
        FeatureKind::Categorical,
        FeatureValue::Int(12),
    )
    .bounded(0.0, 23.0),
    FieldSpec::new("is daylight", "is_daylight", "Is Daylight?", FeatureKind::Boolean, FeatureValue::Bool(true)),
    FieldSpec::new(
        "distance to solar noon",
        "distance_to_solar_noon",
        "Distance to Solar Noon",
        FeatureKind::Float,
        FeatureValue::Float(1.5),
    ),
    FieldSpec::new(
        "average temperature (day)",
        "avg_temp_day",
        "Average Temperature (day)",
        FeatureKind::Float,
        FeatureValue::Float(28.0),
    ),
    FieldSpec::new(
        "average wind direction (day)",
        "avg_wind_dir_day",
        "Average Wind Direction (day)",
        FeatureKind::Float,
        FeatureValue::Float(180.0),
    ),
    FieldSpec::new(
        "average wind speed (day)",
        "avg_wind_speed_day",
        "Average Wind Speed (day)",
        FeatureKind::Float,
        FeatureValue::Float(4.2),
    ),
    FieldSpec::new("visibility", "visibility", "Visibility", FeatureKind::Float, FeatureValue::Float(10.0)),
    FieldSpec::new(
        "relative humidity",
        "rel_humidity",
        "Relative Humidity",
        FeatureKind::Float,
        FeatureValue::Float(60.0),
    ),
    FieldSpec::new(
        "average wind speed (period)",
        "avg_wind_speed_period",
        "Average Wind Speed (period)",
        FeatureKind::Float,
        FeatureValue::Float(4.5),
    ),
    FieldSpec::new(
        "average barometric pressure (period)",
        "avg_barometric_pressure_period",
        "Average Barometric Pressure (period)",
        FeatureKind::Float,
        FeatureValue::Float(1013.2),
    ),
    FieldSpec::flag("season_spring", "season_spring", "Season: Spring"),
    FieldSpec::flag("season_summer", "season_summer", "Season: Summer"),
    FieldSpec::flag("season_winter", "season_winter", "Season: Winter"),
    FieldSpec::flag("time of day_evening", "time_of_day_evening", "Time of Day: Evening"),
    FieldSpec::flag("time of day_morning", "time_of_day_morning", "Time of Day: Morning"),
    FieldSpec::flag("time of day_night", "time_of_day_night", "Time of Day: Night"),
    FieldSpec::flag("solar proximity_midday", "solar_proximity_midday", "Solar Proximity: Midday"),
    FieldSpec::flag("solar proximity_near noon", "solar_proximity_near_noon", "Solar Proximity: Near Noon"),
    FieldSpec::flag("sky cover_1", "sky_cover_1", "Sky Cover 1"),
    FieldSpec::flag("sky cover_2", "sky_cover_2", "Sky Cover 2"),
    FieldSpec::flag("sky cover_3", "sky_cover_3", "Sky Cover 3"),
    FieldSpec::flag("sky cover_4", "sky_cover_4", "Sky Cover 4"),
];

/// Lookup view over a declared field table
#[derive(Debug, Clone, Copy)]
pub struct FeatureSchema {
    fields: &'static [FieldSpec],
}

impl FeatureSchema {
    pub const fn new(fields: &'static [FieldSpec]) -> Self {
        Self { fields }
    }

    /// Schema of the bundled solar output model
    pub const fn solar() -> Self {
        Self::new(&SOLAR_FEATURES)
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    pub fn get(&self, column: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.column == column)
    }

    pub fn kind_of(&self, column: &str) -> Option<FeatureKind> {
        self.get(column).map(|f| f.kind)
    }

    /// Default for a missing column; columns outside the schema are treated as floats
    pub fn missing_default(&self, column: &str) -> FeatureValue {
        self.get(column)
            .map(FieldSpec::missing_default)
            .unwrap_or(FeatureValue::Float(0.0))
    }

    /// Declared column order, used when the model carries no feature list
    pub fn columns(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.column.to_string()).collect()
    }
}

/// A reconciled table: exactly the model's columns, in the model's order,
/// with no missing cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<Vec<FeatureValue>>,
}

impl FeatureTable {
    /// Rows must already be `columns.len()` wide
    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Vec<FeatureValue>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<FeatureValue>] {
        &self.rows
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// All values of one column, top to bottom
    pub fn column_values(&self, column: &str) -> Option<Vec<FeatureValue>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::str::FromStr;

    #[test]
    fn test_schema_has_26_unique_columns_and_keys() {
        let columns: HashSet<_> = SOLAR_FEATURES.iter().map(|f| f.column).collect();
        let keys: HashSet<_> = SOLAR_FEATURES.iter().map(|f| f.key).collect();
        assert_eq!(columns.len(), 26);
        assert_eq!(keys.len(), 26);
    }

    #[test]
    fn test_form_defaults_match_kind() {
        for field in SOLAR_FEATURES.iter() {
            let ok = matches!(
                (field.kind, field.form_default),
                (FeatureKind::Boolean, FeatureValue::Bool(_))
                    | (FeatureKind::Integer, FeatureValue::Int(_))
                    | (FeatureKind::Categorical, FeatureValue::Int(_))
                    | (FeatureKind::Float, FeatureValue::Float(_))
            );
            assert!(ok, "default of {:?} does not match its kind", field.column);
        }
    }

    #[test]
    fn test_missing_defaults() {
        let schema = FeatureSchema::solar();
        assert_eq!(schema.missing_default("sky cover_3"), FeatureValue::Bool(false));
        assert_eq!(schema.missing_default("is daylight"), FeatureValue::Bool(false));
        assert_eq!(schema.missing_default("year"), FeatureValue::Int(0));
        assert_eq!(schema.missing_default("visibility"), FeatureValue::Float(0.0));
        assert_eq!(schema.missing_default("not a column"), FeatureValue::Float(0.0));
    }

    #[test]
    fn test_categorical_columns() {
        let schema = FeatureSchema::solar();
        assert_eq!(schema.kind_of("year"), Some(FeatureKind::Categorical));
        assert_eq!(schema.kind_of("first hour of period"), Some(FeatureKind::Categorical));
        assert_eq!(schema.kind_of("is daylight"), Some(FeatureKind::Boolean));
        assert_eq!(schema.kind_of("unknown"), None);
    }

    #[test]
    fn test_feature_value_display_and_numeric_view() {
        assert_eq!(FeatureValue::Bool(true).to_string(), "True");
        assert_eq!(FeatureValue::Bool(false).to_string(), "False");
        assert_eq!(FeatureValue::Int(2022).to_string(), "2022");
        assert_eq!(FeatureValue::Float(1013.2).to_string(), "1013.2");
        assert_eq!(FeatureValue::Bool(true).as_f64(), 1.0);
        assert_eq!(FeatureValue::Int(7).as_f64(), 7.0);
    }

    #[test]
    fn test_feature_kind_strum_round_trip() {
        assert_eq!(FeatureKind::Categorical.to_string(), "categorical");
        assert_eq!(FeatureKind::from_str("boolean").unwrap(), FeatureKind::Boolean);
    }

    #[test]
    fn test_feature_value_json() {
        let v: Vec<FeatureValue> = serde_json::from_str("[true, 3, 3.5]").unwrap();
        assert_eq!(
            v,
            vec![FeatureValue::Bool(true), FeatureValue::Int(3), FeatureValue::Float(3.5)]
        );
    }
}
