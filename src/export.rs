// Prediction result export (CSV download and display strings)

use crate::domain::features::{FeatureTable, PREDICTION_COLUMN};

/// File name offered for the batch download
pub const DOWNLOAD_FILE_NAME: &str = "solar_power_predictions.csv";

/// Reconciled rows plus the appended prediction column, as CSV bytes
pub fn to_csv(table: &FeatureTable, predictions: &[f64]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = table.columns().iter().map(String::as_str).collect();
    header.push(PREDICTION_COLUMN);
    writer.write_record(&header)?;

    for (row, prediction) in table.rows().iter().zip(predictions) {
        let mut record: Vec<String> = row.iter().map(ToString::to_string).collect();
        record.push(prediction.to_string());
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// Message shown for a manual prediction
pub fn manual_message(prediction: f64, unit: &str) -> String {
    format!("{}: {:.2} {}", PREDICTION_COLUMN, prediction, unit)
}
