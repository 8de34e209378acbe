use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::client::{ApiError, ExamApi};
use crate::core::retry::{retry_if, RetryPolicy};
use crate::services::attempt_state::{AttemptEvent, SubmitTrigger};
use crate::services::results::ResultsView;

#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("a submission for this attempt is already in progress")]
    AlreadyInFlight,
    #[error("failed to submit exam: {0}")]
    Submit(#[source] ApiError),
    #[error("failed to load results: {0}")]
    Results(#[source] ApiError),
}

impl FinalizeError {
    pub fn user_message(&self) -> String {
        match self {
            FinalizeError::AlreadyInFlight => "Submission already in progress".to_string(),
            FinalizeError::Submit(err) => err.user_message("Failed to submit exam"),
            FinalizeError::Results(err) => err.user_message("Failed to load exam results"),
        }
    }
}

/// Where a finalization run begins. A retry after a failed results load skips the submit call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeFrom {
    Submit(SubmitTrigger),
    Results,
}

/// Submits an attempt and waits for its results to become readable.
pub struct SubmissionFinalizer {
    api: Arc<dyn ExamApi>,
    policy: RetryPolicy,
    in_flight: AtomicBool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SubmissionFinalizer {
    pub fn new(api: Arc<dyn ExamApi>, policy: RetryPolicy) -> Self {
        Self { api, policy, in_flight: AtomicBool::new(false) }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn submit(&self, attempt_id: Uuid) -> Result<(), ApiError> {
        self.api.submit_attempt(attempt_id).await
    }

    /// Loads results, retrying while the server still reports the submission as unknown.
    pub async fn fetch_results(&self, attempt_id: Uuid) -> Result<ResultsView, ApiError> {
        let results = retry_if(
            self.policy,
            |attempt| {
                metrics::counter!("result_fetch_attempts_total").increment(1);
                tracing::debug!(attempt_id = %attempt_id, attempt, "Fetching exam results");
                self.api.fetch_results(attempt_id)
            },
            ApiError::is_not_ready,
        )
        .await?;

        Ok(ResultsView::from_results(&results))
    }

    /// Runs submit then results, reporting each outcome to `observer` as an [`AttemptEvent`].
    /// Only one run may be active per finalizer.
    pub async fn finalize<O>(
        &self,
        attempt_id: Uuid,
        from: FinalizeFrom,
        mut observer: O,
    ) -> Result<ResultsView, FinalizeError>
    where
        O: FnMut(AttemptEvent),
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(attempt_id = %attempt_id, "Ignoring duplicate submission request");
            return Err(FinalizeError::AlreadyInFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        if let FinalizeFrom::Submit(trigger) = from {
            match self.submit_once(attempt_id, trigger).await {
                Ok(Some(view)) => {
                    observer(AttemptEvent::SubmitAccepted);
                    observer(AttemptEvent::ResultsLoaded);
                    return Ok(view);
                }
                Ok(None) => observer(AttemptEvent::SubmitAccepted),
                Err(err) => {
                    observer(AttemptEvent::SubmitFailed(err.user_message("Failed to submit exam")));
                    return Err(FinalizeError::Submit(err));
                }
            }
        }

        match self.fetch_results(attempt_id).await {
            Ok(view) => {
                tracing::info!(
                    attempt_id = %attempt_id,
                    correct = view.correct_count,
                    auto_graded = view.auto_graded_count,
                    "Exam results loaded"
                );
                observer(AttemptEvent::ResultsLoaded);
                Ok(view)
            }
            Err(err) => {
                tracing::error!(attempt_id = %attempt_id, error = %err, "Failed to load exam results");
                observer(AttemptEvent::ResultsFailed(
                    err.user_message("Failed to load exam results"),
                ));
                Err(FinalizeError::Results(err))
            }
        }
    }

    /// Returns `Some(results)` when the server rejected the submit because the attempt was
    /// already closed and its results could be read right away.
    async fn submit_once(
        &self,
        attempt_id: Uuid,
        trigger: SubmitTrigger,
    ) -> Result<Option<ResultsView>, ApiError> {
        match self.submit(attempt_id).await {
            Ok(()) => {
                metrics::counter!(
                    "submissions_total",
                    "trigger" => trigger.as_str(),
                    "status" => "accepted"
                )
                .increment(1);
                tracing::info!(attempt_id = %attempt_id, trigger = trigger.as_str(), "Exam submitted");
                Ok(None)
            }
            Err(err) if err.status_code() == Some(400) => {
                tracing::warn!(
                    attempt_id = %attempt_id,
                    error = %err,
                    "Submit rejected; checking whether the attempt is already closed"
                );
                match self.api.fetch_results(attempt_id).await {
                    Ok(results) => {
                        metrics::counter!(
                            "submissions_total",
                            "trigger" => trigger.as_str(),
                            "status" => "already_submitted"
                        )
                        .increment(1);
                        Ok(Some(ResultsView::from_results(&results)))
                    }
                    Err(_) => {
                        metrics::counter!(
                            "submissions_total",
                            "trigger" => trigger.as_str(),
                            "status" => "failed"
                        )
                        .increment(1);
                        Err(err)
                    }
                }
            }
            Err(err) => {
                metrics::counter!(
                    "submissions_total",
                    "trigger" => trigger.as_str(),
                    "status" => "failed"
                )
                .increment(1);
                tracing::error!(
                    attempt_id = %attempt_id,
                    trigger = trigger.as_str(),
                    error = %err,
                    "Failed to submit exam"
                );
                Err(err)
            }
        }
    }
}
