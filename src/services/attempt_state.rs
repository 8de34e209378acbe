use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    Timeout,
}

impl SubmitTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmitTrigger::Manual => "manual",
            SubmitTrigger::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStage {
    Submitting,
    ResultsPending,
}

/// Client-side lifecycle of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    NotStarted,
    InProgress,
    Submitting { trigger: SubmitTrigger },
    ResultsPending,
    ResultsReady,
    Error { stage: FailedStage, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptEvent {
    Started,
    /// The server closed the attempt itself (resume after the exam window ended).
    AlreadySubmitted,
    SubmitRequested(SubmitTrigger),
    SubmitAccepted,
    SubmitFailed(String),
    ResultsLoaded,
    ResultsFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("event {event:?} is not valid in state {state:?}")]
pub struct InvalidTransition {
    pub state: AttemptState,
    pub event: AttemptEvent,
}

impl AttemptState {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, AttemptState::InProgress)
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, AttemptState::Submitting { .. } | AttemptState::ResultsPending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptState::ResultsReady)
    }

    pub fn label(&self) -> &'static str {
        match self {
            AttemptState::NotStarted => "not_started",
            AttemptState::InProgress => "in_progress",
            AttemptState::Submitting { .. } => "submitting",
            AttemptState::ResultsPending => "results_pending",
            AttemptState::ResultsReady => "results_ready",
            AttemptState::Error { .. } => "error",
        }
    }
}

/// Pure transition function. Invalid pairs are rejected and the caller keeps its state.
pub fn transition(
    state: &AttemptState,
    event: AttemptEvent,
) -> Result<AttemptState, InvalidTransition> {
    use AttemptEvent as E;
    use AttemptState as S;

    let next = match (state, &event) {
        (S::NotStarted, E::Started) => S::InProgress,
        (S::NotStarted, E::AlreadySubmitted) => S::ResultsPending,
        (S::InProgress, E::SubmitRequested(trigger)) => S::Submitting { trigger: *trigger },
        // Manual retry after a failure resumes at the step that failed.
        (S::Error { stage: FailedStage::Submitting, .. }, E::SubmitRequested(SubmitTrigger::Manual)) => {
            S::Submitting { trigger: SubmitTrigger::Manual }
        }
        (
            S::Error { stage: FailedStage::ResultsPending, .. },
            E::SubmitRequested(SubmitTrigger::Manual),
        ) => S::ResultsPending,
        (S::Submitting { .. }, E::SubmitAccepted) => S::ResultsPending,
        (S::Submitting { .. }, E::SubmitFailed(message)) => {
            S::Error { stage: FailedStage::Submitting, message: message.clone() }
        }
        (S::ResultsPending, E::ResultsLoaded) => S::ResultsReady,
        (S::ResultsPending, E::ResultsFailed(message)) => {
            S::Error { stage: FailedStage::ResultsPending, message: message.clone() }
        }
        _ => return Err(InvalidTransition { state: state.clone(), event }),
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(events: Vec<AttemptEvent>) -> Result<AttemptState, InvalidTransition> {
        events.into_iter().try_fold(AttemptState::NotStarted, |state, event| transition(&state, event))
    }

    #[test]
    fn happy_path_reaches_results_ready() {
        let state = run(vec![
            AttemptEvent::Started,
            AttemptEvent::SubmitRequested(SubmitTrigger::Manual),
            AttemptEvent::SubmitAccepted,
            AttemptEvent::ResultsLoaded,
        ])
        .unwrap();
        assert_eq!(state, AttemptState::ResultsReady);
        assert!(state.is_terminal());
    }

    #[test]
    fn timeout_and_manual_converge_on_submitting() {
        let manual = transition(&AttemptState::InProgress, AttemptEvent::SubmitRequested(SubmitTrigger::Manual));
        let timeout = transition(&AttemptState::InProgress, AttemptEvent::SubmitRequested(SubmitTrigger::Timeout));
        assert!(manual.unwrap().is_busy());
        assert_eq!(timeout.unwrap(), AttemptState::Submitting { trigger: SubmitTrigger::Timeout });
    }

    #[test]
    fn second_submit_request_is_rejected() {
        let submitting = AttemptState::Submitting { trigger: SubmitTrigger::Timeout };
        let err = transition(&submitting, AttemptEvent::SubmitRequested(SubmitTrigger::Manual)).unwrap_err();
        assert_eq!(err.state, submitting);
    }

    #[test]
    fn failures_land_in_error_with_stage() {
        let state = run(vec![
            AttemptEvent::Started,
            AttemptEvent::SubmitRequested(SubmitTrigger::Timeout),
            AttemptEvent::SubmitFailed("offline".to_string()),
        ])
        .unwrap();
        assert_eq!(state, AttemptState::Error { stage: FailedStage::Submitting, message: "offline".to_string() });

        let state = run(vec![
            AttemptEvent::Started,
            AttemptEvent::SubmitRequested(SubmitTrigger::Manual),
            AttemptEvent::SubmitAccepted,
            AttemptEvent::ResultsFailed("Exam not submitted".to_string()),
        ])
        .unwrap();
        assert!(matches!(state, AttemptState::Error { stage: FailedStage::ResultsPending, .. }));
    }

    #[test]
    fn error_allows_manual_retry_only() {
        let error = AttemptState::Error { stage: FailedStage::Submitting, message: "x".to_string() };
        assert!(transition(&error, AttemptEvent::SubmitRequested(SubmitTrigger::Timeout)).is_err());
        assert_eq!(
            transition(&error, AttemptEvent::SubmitRequested(SubmitTrigger::Manual)).unwrap(),
            AttemptState::Submitting { trigger: SubmitTrigger::Manual }
        );

        let results_error =
            AttemptState::Error { stage: FailedStage::ResultsPending, message: "x".to_string() };
        assert_eq!(
            transition(&results_error, AttemptEvent::SubmitRequested(SubmitTrigger::Manual)).unwrap(),
            AttemptState::ResultsPending
        );
    }

    #[test]
    fn server_closed_attempt_skips_to_results() {
        let state = run(vec![AttemptEvent::AlreadySubmitted, AttemptEvent::ResultsLoaded]).unwrap();
        assert_eq!(state, AttemptState::ResultsReady);
    }

    #[test]
    fn answers_cannot_restart_a_finished_attempt() {
        assert!(transition(&AttemptState::ResultsReady, AttemptEvent::Started).is_err());
        assert!(transition(&AttemptState::InProgress, AttemptEvent::ResultsLoaded).is_err());
    }
}
