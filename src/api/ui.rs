//! HTML front end: the manual form and the upload form on one page.
//!
//! Failures are rendered into the page as an error banner; only the CSV
//! download reports errors as JSON.

use askama::Template;
use axum::{
    body::Bytes,
    extract::{rejection::FormRejection, Multipart, State},
    http::header,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use tracing::warn;

use crate::{
    api::error::ApiError,
    controller::{AppState, BatchPrediction, PredictionError},
    domain::features::{FeatureKind, FeatureValue, FieldSpec, FORM_YEARS, PREDICTION_COLUMN, SOLAR_FEATURES},
    domain::manual::ManualInput,
    export::DOWNLOAD_FILE_NAME,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict_manual))
        .route("/predict/batch", post(predict_batch))
        .route("/predict/batch/download", post(download_batch))
}

pub struct SelectOption {
    value: String,
    selected: bool,
}

/// One manual form control
pub struct FormField {
    key: &'static str,
    label: &'static str,
    value: String,
    is_checkbox: bool,
    checked: bool,
    is_select: bool,
    options: Vec<SelectOption>,
    min: String,
    max: String,
    step: &'static str,
}

impl FormField {
    fn new(spec: &FieldSpec, value: FeatureValue) -> Self {
        let options = match spec.kind {
            FeatureKind::Categorical => category_options(spec)
                .into_iter()
                .map(|v| SelectOption {
                    value: v.to_string(),
                    selected: value == FeatureValue::Int(v),
                })
                .collect(),
            _ => Vec::new(),
        };

        Self {
            key: spec.key,
            label: spec.label,
            value: value.to_string(),
            is_checkbox: spec.kind == FeatureKind::Boolean,
            checked: value == FeatureValue::Bool(true),
            is_select: spec.kind == FeatureKind::Categorical,
            options,
            min: spec.min.map(|v| v.to_string()).unwrap_or_default(),
            max: spec.max.map(|v| v.to_string()).unwrap_or_default(),
            step: if spec.kind == FeatureKind::Integer { "1" } else { "any" },
        }
    }
}

fn category_options(spec: &FieldSpec) -> Vec<i64> {
    if spec.key == "year" {
        return FORM_YEARS.to_vec();
    }
    match (spec.min, spec.max) {
        (Some(min), Some(max)) => (min as i64..=max as i64).collect(),
        _ => Vec::new(),
    }
}

/// Batch results as display strings
pub struct BatchView {
    file_name: String,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    filled: Vec<String>,
    dropped: Vec<String>,
}

impl BatchView {
    fn new(file_name: &str, batch: &BatchPrediction) -> Self {
        let table = batch.table();
        let mut columns = table.columns().to_vec();
        columns.push(PREDICTION_COLUMN.to_string());

        let rows = table
            .rows()
            .iter()
            .zip(&batch.predictions)
            .map(|(row, prediction)| {
                row.iter()
                    .map(ToString::to_string)
                    .chain(std::iter::once(format!("{:.2}", prediction)))
                    .collect()
            })
            .collect();

        Self {
            file_name: file_name.to_string(),
            columns,
            rows,
            filled: batch.reconciled.filled.clone(),
            dropped: batch.reconciled.dropped.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    fields: Vec<FormField>,
    model_label: Option<String>,
    model_error: Option<String>,
    max_upload_mb: String,
    message: Option<String>,
    error: Option<String>,
    batch: Option<BatchView>,
}

impl IndexTemplate {
    fn new(state: &AppState, input: &ManualInput) -> Self {
        let fields = SOLAR_FEATURES
            .iter()
            .zip(input.values())
            .map(|(spec, value)| FormField::new(spec, value))
            .collect();

        let model_label = state.controller.engine().ok().map(|engine| {
            let meta = engine.metadata();
            format!("{} v{} ({})", meta.model_id, meta.version, meta.model_type)
        });

        Self {
            fields,
            model_label,
            model_error: state.controller.load_error().map(str::to_string),
            max_upload_mb: format!("{:.0}", state.cfg.upload.max_bytes as f64 / (1024.0 * 1024.0)),
            message: None,
            error: None,
            batch: None,
        }
    }

    fn into_html(self) -> Result<Html<String>, ApiError> {
        self.render()
            .map(Html)
            .map_err(|e| ApiError::InternalError(format!("template render failed: {}", e)))
    }
}

/// GET / - Form page with defaults filled in
pub async fn index(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    IndexTemplate::new(&state, &ManualInput::default()).into_html()
}

/// POST /predict - Manual single-row prediction
pub async fn predict_manual(
    State(state): State<AppState>,
    form: Result<Form<ManualInput>, FormRejection>,
) -> Result<Html<String>, ApiError> {
    let page = match form {
        Ok(Form(input)) => {
            let mut page = IndexTemplate::new(&state, &input);
            match state.controller.predict_manual(&input) {
                Ok(prediction) => page.message = Some(prediction.message),
                Err(e) => page.error = Some(report("manual", &e)),
            }
            page
        }
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "manual form rejected");
            let mut page = IndexTemplate::new(&state, &ManualInput::default());
            page.error = Some(rejection.body_text());
            page
        }
    };
    page.into_html()
}

/// POST /predict/batch - Upload a file and show the results table
pub async fn predict_batch(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Html<String>, ApiError> {
    let mut page = IndexTemplate::new(&state, &ManualInput::default());
    match read_upload(multipart).await {
        Ok((file_name, bytes)) => match state.controller.predict_upload(&file_name, &bytes) {
            Ok(batch) => page.batch = Some(BatchView::new(&file_name, &batch)),
            Err(e) => page.error = Some(report(&file_name, &e)),
        },
        Err(e) => page.error = Some(e.to_string()),
    }
    page.into_html()
}

/// POST /predict/batch/download - Same as the batch route, as a CSV attachment
pub async fn download_batch(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let (file_name, bytes) = read_upload(multipart).await?;
    let batch = state.controller.predict_upload(&file_name, &bytes)?;
    let body = batch
        .to_csv()
        .map_err(|e| ApiError::InternalError(format!("failed to write CSV: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", DOWNLOAD_FILE_NAME),
            ),
        ],
        body,
    )
        .into_response())
}

/// First multipart field named `file`
async fn read_upload(mut multipart: Multipart) -> Result<(String, Bytes), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(ApiError::BadRequest(
                "choose a .csv or .xlsx file to upload".to_string(),
            ));
        }
        let bytes = field.bytes().await?;
        return Ok((file_name, bytes));
    }
    Err(ApiError::BadRequest("no file field in the upload".to_string()))
}

fn report(source: &str, error: &PredictionError) -> String {
    warn!(%source, %error, "prediction failed");
    error.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_is_a_select_with_form_years() {
        let field = FormField::new(&SOLAR_FEATURES[1], FeatureValue::Int(2022));
        assert!(field.is_select);
        let values: Vec<&str> = field.options.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec!["2020", "2021", "2022", "2023"]);
        assert!(field.options[2].selected);
    }

    #[test]
    fn test_first_hour_options_follow_bounds() {
        let field = FormField::new(&SOLAR_FEATURES[4], FeatureValue::Int(12));
        assert_eq!(field.options.len(), 24);
        assert_eq!(field.options.iter().filter(|o| o.selected).count(), 1);
    }

    #[test]
    fn test_flags_render_as_checkboxes() {
        let field = FormField::new(&SOLAR_FEATURES[5], FeatureValue::Bool(true));
        assert!(field.is_checkbox);
        assert!(field.checked);
        assert!(!field.is_select);
    }

    #[test]
    fn test_number_inputs() {
        let day = FormField::new(&SOLAR_FEATURES[0], FeatureValue::Int(120));
        assert_eq!((day.min.as_str(), day.max.as_str(), day.step), ("1", "366", "1"));

        let temp = FormField::new(&SOLAR_FEATURES[7], FeatureValue::Float(28.0));
        assert_eq!(temp.step, "any");
        assert!(temp.min.is_empty());
        assert_eq!(temp.value, "28");
    }
}
