use axum::{body::Bytes, extract::State, Json};
use std::time::Instant;
use tracing::{debug, info};

use crate::api::{state::AppState, types::PredictResponse};
use crate::error::{Result, ServeError};
use crate::ml::Classifier;
use crate::validation::{parse_body, validate_predict_request, FeatureRecord};

/// POST /predict
///
/// Validates the raw body first; the model is only touched once every record
/// has passed. All records succeed together or the request fails.
pub async fn predict(State(state): State<AppState>, body: Bytes) -> Result<Json<PredictResponse>> {
    let started = Instant::now();
    state.metrics.inc_predict_requests();

    let records = match parse_body(&body)
        .and_then(|value| validate_predict_request(&value, state.max_batch_size))
    {
        Ok(records) => records,
        Err(err) => {
            state.metrics.inc_validation_failures();
            debug!(issues = err.issues().len(), error = %err, "predict request rejected");
            return Err(err.into());
        }
    };

    let response = state
        .holder
        .get()
        .and_then(|model| run_inference(model.as_ref(), &records))
        .inspect_err(|_| state.metrics.inc_inference_failures())?;

    state.metrics.add_records_scored(records.len() as u64);
    info!(
        records = records.len(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "prediction served"
    );
    Ok(Json(response))
}

/// Score a validated batch and shape the response.
pub fn run_inference(model: &dyn Classifier, records: &[FeatureRecord]) -> Result<PredictResponse> {
    let prediction = model.predict(records)?;
    let probability = model.predict_proba(records)?;

    if prediction.len() != records.len() || probability.len() != records.len() {
        return Err(ServeError::Inference(format!(
            "model returned {} predictions and {} probability rows for {} records",
            prediction.len(),
            probability.len(),
            records.len()
        )));
    }

    let n_classes = model.classes().len();
    if let Some((idx, row)) = probability
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != n_classes)
    {
        return Err(ServeError::Inference(format!(
            "probability row {} has {} entries, model has {} classes",
            idx,
            row.len(),
            n_classes
        )));
    }

    Ok(PredictResponse {
        prediction,
        probability,
    })
}
