//! End-to-end tests against the router with the bundled model artifact.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use solar_power_predictor::{
    api,
    config::Config,
    controller::{AppState, PredictionController},
    domain::{features::FeatureSchema, manual::ManualInput},
};

const BOUNDARY: &str = "solar-test-boundary";

fn bundled_model() -> String {
    format!("{}/models/solar_model.json", env!("CARGO_MANIFEST_DIR"))
}

fn ready_state() -> AppState {
    let controller = PredictionController::load(bundled_model(), FeatureSchema::solar());
    AppState::with_controller(Config::default(), controller)
}

fn unavailable_state() -> AppState {
    let controller = PredictionController::unavailable("artifact missing", FeatureSchema::solar());
    AppState::with_controller(Config::default(), controller)
}

fn app(state: AppState) -> Router {
    let cfg = state.cfg.clone();
    api::router(state, &cfg)
}

async fn send(state: AppState, req: Request<Body>) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
    let res = app(state).oneshot(req).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec(), headers)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn upload(uri: &str, file_name: &str, content: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn manual_form(overrides: &[(&str, &str)]) -> Request<Body> {
    let mut pairs: Vec<(&str, &str)> = vec![
        ("day_of_year", "120"),
        ("year", "2022"),
        ("month", "4"),
        ("day", "30"),
        ("first_hour_of_period", "12"),
        ("is_daylight", "true"),
        ("distance_to_solar_noon", "1.5"),
        ("avg_temp_day", "28"),
        ("avg_wind_dir_day", "180"),
        ("avg_wind_speed_day", "4.2"),
        ("visibility", "10.0"),
        ("rel_humidity", "60"),
        ("avg_wind_speed_period", "4.5"),
        ("avg_barometric_pressure_period", "1013.2"),
    ];
    for (key, value) in overrides {
        match pairs.iter_mut().find(|(k, _)| k == key) {
            Some(pair) => pair.1 = value,
            None => pairs.push((key, value)),
        }
    }
    let body = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

fn json_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

#[test]
fn bundled_model_predicts_default_row() {
    let controller = PredictionController::load(bundled_model(), FeatureSchema::solar());
    assert!(controller.is_ready(), "{:?}", controller.load_error());

    let prediction = controller.predict_manual(&ManualInput::default()).unwrap();
    assert!(prediction.value.is_finite());
    assert_eq!(prediction.value, 1470.0);
}

#[test]
fn required_model_blocks_startup() {
    let mut cfg = Config::default();
    cfg.model.path = "/nonexistent/solar_model.json".into();

    let state = AppState::new(cfg.clone()).unwrap();
    assert!(!state.controller.is_ready());

    cfg.model.required = true;
    assert!(AppState::new(cfg).is_err());
}

#[tokio::test]
async fn index_renders_form_with_defaults() {
    let (status, body, _) = send(ready_state(), get("/")).await;
    assert_eq!(status, StatusCode::OK);

    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("name=\"day_of_year\" value=\"120\""));
    assert!(html.contains("<option value=\"2022\" selected>"));
    assert!(html.contains("solar-power-demo"));
}

#[tokio::test]
async fn manual_prediction_shows_message() {
    let (status, body, _) = send(ready_state(), manual_form(&[])).await;
    assert_eq!(status, StatusCode::OK);

    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Predicted Solar Power Output: 1470.00"));
}

#[tokio::test]
async fn manual_prediction_out_of_range_is_reported() {
    let (status, body, _) = send(ready_state(), manual_form(&[("month", "13")])).await;
    assert_eq!(status, StatusCode::OK);

    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("An error occurred"));
    assert!(!html.contains("Predicted Solar Power Output: "));
}

#[tokio::test]
async fn manual_prediction_unparseable_form_is_reported() {
    let (status, body, _) = send(ready_state(), manual_form(&[("avg_temp_day", "warm")])).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("An error occurred"));
}

#[tokio::test]
async fn batch_upload_fills_missing_columns() {
    let csv = b"is daylight,distance to solar noon,relative humidity,station\ntrue,0.1,50,north\nfalse,0,0,south\n";
    let (status, body, _) = send(ready_state(), upload("/predict/batch", "readings.csv", csv)).await;
    assert_eq!(status, StatusCode::OK);

    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("2 rows"));
    assert!(html.contains("2920.00"));
    assert!(html.contains("Ignored columns: station"));
    assert!(html.contains("Filled with defaults"));
}

#[tokio::test]
async fn exported_index_column_is_ignored() {
    let csv = b",is daylight,distance to solar noon,relative humidity\n0,true,0.1,50\n1,false,0,0\n";
    let (status, body, _) = send(ready_state(), upload("/predict/batch", "export.csv", csv)).await;
    assert_eq!(status, StatusCode::OK);

    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("2 rows"));
    assert!(html.contains("2920.00"));
    assert!(html.contains("Ignored columns: Unnamed: 0"));
}

#[tokio::test]
async fn unsupported_upload_is_reported_without_prediction() {
    let (status, body, _) =
        send(ready_state(), upload("/predict/batch", "readings.txt", b"a,b\n1,2\n")).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Unsupported file type"));
    assert!(!html.contains("<table>"));

    let (status, body, _) = send(
        ready_state(),
        upload("/predict/batch/download", "readings.txt", b"a,b\n1,2\n"),
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(json_body(&body)["error"], "UnsupportedMediaType");
}

#[tokio::test]
async fn download_returns_csv_attachment() {
    let csv = b"relative humidity,is daylight,distance to solar noon\n50,true,0.1\n0,false,0\n";
    let (status, body, headers) =
        send(ready_state(), upload("/predict/batch/download", "readings.csv", csv)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("solar_power_predictions.csv"));

    let text = String::from_utf8(body).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("day of year,year,month,day,"));
    assert!(lines[0].ends_with(",sky cover_4,Predicted Solar Power Output"));
    assert_eq!(lines[1].split(',').count(), 27);
    assert!(lines[1].ends_with(",2920"));
    assert!(lines[2].ends_with(",0"));
}

#[tokio::test]
async fn bad_cell_in_download_names_the_row() {
    let csv = b"year\n2022\nnext year\n";
    let (status, body, _) =
        send(ready_state(), upload("/predict/batch/download", "r.csv", csv)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let message = json_body(&body)["message"].as_str().unwrap().to_string();
    assert!(message.contains("'year', row 2"), "{message}");
}

#[tokio::test]
async fn json_predict_reorders_and_defaults() {
    let payload = json!({
        "rows": [
            { "sky cover_4": true, "is daylight": 1, "distance to solar noon": 1.5, "extra": "x" },
            { "is daylight": false }
        ]
    });
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let (status, body, _) = send(ready_state(), req).await;
    assert_eq!(status, StatusCode::OK);

    let json = json_body(&body);
    let data = &json["data"];
    assert_eq!(data["columns"].as_array().unwrap().len(), 26);
    assert_eq!(data["columns"][0], "day of year");
    assert_eq!(data["dropped"], json!(["extra"]));
    // daylight, far from noon, overcast: 1200 - 850 + 120
    assert_eq!(data["predictions"], json!([470.0, 0.0]));
    assert_eq!(data["rows"][0][5], json!(true));
    assert_eq!(json["metadata"]["total_count"], 2);
}

#[tokio::test]
async fn model_and_schema_endpoints() {
    let (status, body, _) = send(ready_state(), get("/api/v1/model")).await;
    assert_eq!(status, StatusCode::OK);
    let model = json_body(&body);
    assert_eq!(model["data"]["model_id"], "solar-power-demo");
    assert_eq!(model["data"]["feature_source"], "artifact");
    assert_eq!(model["data"]["expected_columns"].as_array().unwrap().len(), 26);

    let (status, body, _) = send(ready_state(), get("/api/v1/schema")).await;
    assert_eq!(status, StatusCode::OK);
    let schema = json_body(&body);
    assert_eq!(schema["data"]["fields"][1]["column"], "year");
    assert_eq!(schema["data"]["fields"][1]["kind"], "categorical");
    assert_eq!(schema["metadata"]["total_count"], 26);
}

#[tokio::test]
async fn health_follows_model_availability() {
    let (status, _, _) = send(ready_state(), get("/health/ready")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(unavailable_state(), get("/health/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _, _) = send(unavailable_state(), get("/health/live")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body, _) = send(unavailable_state(), get("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(&body)["checks"]["model"]["error"], "artifact missing");
}

#[tokio::test]
async fn unavailable_model_is_reported_not_fatal() {
    let (status, body, _) = send(unavailable_state(), get("/api/v1/model")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(&body)["details"], "artifact missing");

    let (status, body, _) = send(unavailable_state(), manual_form(&[])).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Model unavailable: artifact missing"));
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let (status, body, _) = send(ready_state(), get("/nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["error"], "NotFound");
}
