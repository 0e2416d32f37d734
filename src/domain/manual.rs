use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use super::features::{FeatureValue, SOLAR_FEATURES};

/// Values submitted through the manual prediction form.
///
/// Checkboxes that are left unticked are not sent by browsers, so every flag
/// defaults to `false` when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ManualInput {
    #[validate(range(min = 1, max = 366))]
    pub day_of_year: i64,
    #[validate(range(min = 2020, max = 2023))]
    pub year: i64,
    #[validate(range(min = 1, max = 12))]
    pub month: i64,
    #[validate(range(min = 1, max = 31))]
    pub day: i64,
    #[validate(range(min = 0, max = 23))]
    pub first_hour_of_period: i64,
    #[serde(default)]
    pub is_daylight: bool,
    pub distance_to_solar_noon: f64,
    pub avg_temp_day: f64,
    pub avg_wind_dir_day: f64,
    pub avg_wind_speed_day: f64,
    pub visibility: f64,
    pub rel_humidity: f64,
    pub avg_wind_speed_period: f64,
    pub avg_barometric_pressure_period: f64,
    #[serde(default)]
    pub season_spring: bool,
    #[serde(default)]
    pub season_summer: bool,
    #[serde(default)]
    pub season_winter: bool,
    #[serde(default)]
    pub time_of_day_evening: bool,
    #[serde(default)]
    pub time_of_day_morning: bool,
    #[serde(default)]
    pub time_of_day_night: bool,
    #[serde(default)]
    pub solar_proximity_midday: bool,
    #[serde(default)]
    pub solar_proximity_near_noon: bool,
    #[serde(default)]
    pub sky_cover_1: bool,
    #[serde(default)]
    pub sky_cover_2: bool,
    #[serde(default)]
    pub sky_cover_3: bool,
    #[serde(default)]
    pub sky_cover_4: bool,
}

impl Default for ManualInput {
    fn default() -> Self {
        Self {
            day_of_year: 120,
            year: 2022,
            month: 4,
            day: 30,
            first_hour_of_period: 12,
            is_daylight: true,
            distance_to_solar_noon: 1.5,
            avg_temp_day: 28.0,
            avg_wind_dir_day: 180.0,
            avg_wind_speed_day: 4.2,
            visibility: 10.0,
            rel_humidity: 60.0,
            avg_wind_speed_period: 4.5,
            avg_barometric_pressure_period: 1013.2,
            season_spring: false,
            season_summer: false,
            season_winter: false,
            time_of_day_evening: false,
            time_of_day_morning: false,
            time_of_day_night: false,
            solar_proximity_midday: false,
            solar_proximity_near_noon: false,
            sky_cover_1: false,
            sky_cover_2: false,
            sky_cover_3: false,
            sky_cover_4: false,
        }
    }
}

impl ManualInput {
    /// Values in `SOLAR_FEATURES` order
    pub fn values(&self) -> [FeatureValue; 26] {
        use FeatureValue::{Bool, Float, Int};
        [
            Int(self.day_of_year),
            Int(self.year),
            Int(self.month),
            Int(self.day),
            Int(self.first_hour_of_period),
            Bool(self.is_daylight),
            Float(self.distance_to_solar_noon),
            Float(self.avg_temp_day),
            Float(self.avg_wind_dir_day),
            Float(self.avg_wind_speed_day),
            Float(self.visibility),
            Float(self.rel_humidity),
            Float(self.avg_wind_speed_period),
            Float(self.avg_barometric_pressure_period),
            Bool(self.season_spring),
            Bool(self.season_summer),
            Bool(self.season_winter),
            Bool(self.time_of_day_evening),
            Bool(self.time_of_day_morning),
            Bool(self.time_of_day_night),
            Bool(self.solar_proximity_midday),
            Bool(self.solar_proximity_near_noon),
            Bool(self.sky_cover_1),
            Bool(self.sky_cover_2),
            Bool(self.sky_cover_3),
            Bool(self.sky_cover_4),
        ]
    }

    /// Column name / value pairs, named the way the model was trained
    pub fn named_values(&self) -> Vec<(&'static str, FeatureValue)> {
        SOLAR_FEATURES
            .iter()
            .zip(self.values())
            .map(|(field, value)| (field.column, value))
            .collect()
    }

    /// Range checks plus a finiteness check on every float field.
    ///
    /// `NaN` and `inf` parse as valid `f64` from a form, and range rules do
    /// not reject them.
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(e) => e,
        };

        for (field, value) in SOLAR_FEATURES.iter().zip(self.values()) {
            if let FeatureValue::Float(v) = value {
                if !v.is_finite() {
                    let mut err = ValidationError::new("finite");
                    err.message = Some(format!("{} must be a finite number", field.label).into());
                    errors.add(field.key, err);
                }
            }
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_schema_form_defaults() {
        let defaults: Vec<FeatureValue> = SOLAR_FEATURES.iter().map(|f| f.form_default).collect();
        assert_eq!(ManualInput::default().values().to_vec(), defaults);
    }

    #[test]
    fn test_default_passes_validation() {
        assert!(ManualInput::default().check().is_ok());
    }

    #[test]
    fn test_out_of_range_day_of_year_rejected() {
        let input = ManualInput {
            day_of_year: 400,
            ..ManualInput::default()
        };
        let err = input.check().unwrap_err();
        assert!(err.field_errors().contains_key("day_of_year"));
    }

    #[test]
    fn test_year_outside_form_options_rejected() {
        let input = ManualInput {
            year: 2019,
            ..ManualInput::default()
        };
        assert!(input.check().is_err());
    }

    #[test]
    fn test_nan_rejected() {
        let input = ManualInput {
            visibility: f64::NAN,
            ..ManualInput::default()
        };
        let err = input.check().unwrap_err();
        assert!(err.field_errors().contains_key("visibility"));
    }

    #[test]
    fn test_named_values_follow_schema_order() {
        let named = ManualInput::default().named_values();
        assert_eq!(named[0].0, "day of year");
        assert_eq!(named[5], ("is daylight", FeatureValue::Bool(true)));
        assert_eq!(named[25].0, "sky cover_4");
    }
}
