//! Prediction runner
//!
//! Sends every evaluation item to a chat backend, one at a time and in order,
//! and attaches the answer. A failed call never aborts the run: the item is
//! recorded with the generation-error sentinel and the next item proceeds.

use crate::clients::ChatBackend;
use crate::dataset::EvaluationItem;
use crate::predictions::PredictionRecord;

/// Query the backend for each item
///
/// `on_progress` is called after each item with its index and the finished
/// record. The returned records are in item order, one per item.
pub async fn run_predictions<F>(
    backend: &dyn ChatBackend,
    system_prompt: &str,
    items: Vec<EvaluationItem>,
    mut on_progress: F,
) -> Vec<PredictionRecord>
where
    F: FnMut(usize, &PredictionRecord),
{
    let total = items.len();
    let mut records = Vec::with_capacity(total);
    let mut failures = 0usize;

    tracing::info!(backend = backend.name(), items = total, "Starting predictions");

    for (idx, item) in items.into_iter().enumerate() {
        let record = match backend.complete(system_prompt, &item.prompt).await {
            Ok(text) => PredictionRecord::from_response(item, text),
            Err(e) => {
                failures += 1;
                tracing::warn!(item = idx, error = %format!("{:#}", e), "Generation failed");
                PredictionRecord::generation_failure(item)
            }
        };

        on_progress(idx, &record);
        records.push(record);
    }

    tracing::info!(items = total, failures, "Predictions complete");
    records
}
