use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::client::{ApiError, ExamApi};
use crate::core::config::ExamSettings;
use crate::core::retry::RetryPolicy;
use crate::core::time::Clock;
use crate::schemas::answer::AnswerData;
use crate::schemas::attempt::ExamStartResponse;
use crate::schemas::exam::{ChoiceError, Exam};
use crate::services::attempt_state::{transition, AttemptEvent, AttemptState, SubmitTrigger};
use crate::services::finalizer::{FinalizeError, FinalizeFrom, SubmissionFinalizer};
use crate::services::results::ResultsView;
use crate::services::synchronizer::AnswerSynchronizer;
use crate::services::timer::ExamTimer;

#[derive(Clone)]
pub struct SessionDeps {
    pub api: Arc<dyn ExamApi>,
    pub clock: Arc<dyn Clock>,
    pub tick: Duration,
    pub result_retry: RetryPolicy,
    pub flush_timeout: Duration,
}

impl SessionDeps {
    pub fn from_settings(api: Arc<dyn ExamApi>, clock: Arc<dyn Clock>, exam: &ExamSettings) -> Self {
        Self {
            api,
            clock,
            tick: exam.tick_interval(),
            result_retry: exam.result_retry_policy(),
            flush_timeout: exam.save_flush_timeout(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("answers are not accepted while the attempt is {0}")]
    NotInProgress(&'static str),
    #[error("question {0} is not part of this exam")]
    UnknownQuestion(Uuid),
    #[error("invalid answer: {0}")]
    InvalidAnswer(#[from] ValidationErrors),
    #[error(transparent)]
    InvalidChoice(#[from] ChoiceError),
    #[error("exam has neither a duration nor an end time")]
    NoDeadline,
    #[error("exam duration of {0} minutes is out of range")]
    DurationOutOfRange(i64),
}

#[derive(Debug)]
pub enum SessionCommand {
    Answer { question_id: Uuid, data: AnswerData },
    Submit,
}

#[derive(Debug)]
pub enum SessionOutcome {
    Completed(ResultsView),
    Failed { message: String, state: AttemptState },
    /// The command source went away while the attempt was still open on the server.
    Detached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: AttemptState,
    pub remaining_seconds: i64,
    pub answered: usize,
    pub total: usize,
    pub saving: bool,
}

/// One student's run through one attempt: timer, autosave, and submission.
pub struct ExamSession {
    attempt_id: Uuid,
    exam: Exam,
    timer: Option<ExamTimer>,
    state: AttemptState,
    sync: AnswerSynchronizer,
    finalizer: SubmissionFinalizer,
    clock: Arc<dyn Clock>,
    tick: Duration,
    flush_timeout: Duration,
    forced_submit_fired: bool,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl ExamSession {
    pub async fn start(deps: SessionDeps, exam_id: Uuid) -> Result<Self, SessionError> {
        let response = deps.api.start_exam(exam_id).await?;
        tracing::info!(exam_id = %exam_id, attempt_id = %response.attempt.id, "Exam attempt started");
        Self::open(deps, response).await
    }

    pub async fn resume(deps: SessionDeps, attempt_id: Uuid) -> Result<Self, SessionError> {
        let response = deps.api.resume_attempt(attempt_id).await?;
        tracing::info!(attempt_id = %attempt_id, "Exam attempt resumed");
        Self::open(deps, response).await
    }

    async fn open(deps: SessionDeps, response: ExamStartResponse) -> Result<Self, SessionError> {
        let ExamStartResponse { exam, attempt } = response;
        let sync = AnswerSynchronizer::new(deps.api.clone(), attempt.id);
        let finalizer = SubmissionFinalizer::new(deps.api.clone(), deps.result_retry);

        let closed = exam.auto_submitted || attempt.is_submitted();
        let (timer, event) = if closed {
            tracing::info!(attempt_id = %attempt.id, "Attempt was already closed by the server");
            (None, AttemptEvent::AlreadySubmitted)
        } else {
            let timer = match (exam.duration_minutes, exam.end_time) {
                (Some(minutes), window_end) => ExamTimer::new(attempt.start_time, minutes, window_end)
                    .ok_or(SessionError::DurationOutOfRange(minutes))?,
                (None, Some(end)) => ExamTimer::until(attempt.start_time, end),
                (None, None) => return Err(SessionError::NoDeadline),
            };
            timer.check_hint(deps.clock.now(), exam.time_remaining_seconds);
            sync.hydrate().await;
            (Some(timer), AttemptEvent::Started)
        };

        let state = transition(&AttemptState::NotStarted, event).unwrap_or(AttemptState::NotStarted);
        let initial = SessionSnapshot {
            state: state.clone(),
            remaining_seconds: timer.map_or(0, |timer| timer.remaining_seconds(deps.clock.now())),
            answered: sync.answered_count(),
            total: exam.questions.len(),
            saving: false,
        };
        let (snapshot_tx, _) = watch::channel(initial);

        Ok(Self {
            attempt_id: attempt.id,
            exam,
            timer,
            state,
            sync,
            finalizer,
            clock: deps.clock,
            tick: deps.tick,
            flush_timeout: deps.flush_timeout,
            forced_submit_fired: false,
            snapshot_tx,
        })
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn exam(&self) -> &Exam {
        &self.exam
    }

    pub fn state(&self) -> &AttemptState {
        &self.state
    }

    pub fn timer(&self) -> Option<ExamTimer> {
        self.timer
    }

    pub fn remaining_seconds(&self) -> i64 {
        self.timer.map_or(0, |timer| timer.remaining_seconds(self.clock.now()))
    }

    pub fn answers(&self) -> HashMap<Uuid, AnswerData> {
        self.sync.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state.clone(),
            remaining_seconds: self.remaining_seconds(),
            answered: self.sync.answered_count(),
            total: self.exam.questions.len(),
            saving: self.sync.is_saving(),
        }
    }

    pub fn answer(&mut self, question_id: Uuid, data: AnswerData) -> Result<(), SessionError> {
        if !self.state.is_in_progress() {
            return Err(SessionError::NotInProgress(self.state.label()));
        }
        let Some(question) = self.exam.question(question_id) else {
            return Err(SessionError::UnknownQuestion(question_id));
        };
        data.validate()?;
        question.check_choice(&data)?;

        self.sync.record(question_id, data);
        self.publish();
        Ok(())
    }

    /// Drives the attempt until its results load or the command channel closes. After a failed
    /// submission the loop keeps waiting for a manual `Submit` to retry.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) -> SessionOutcome {
        if self.state == AttemptState::ResultsPending {
            if let Some(outcome) = self.finalize(FinalizeFrom::Results).await {
                return outcome;
            }
        }

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            self.publish();

            if self.deadline_reached() {
                self.forced_submit_fired = true;
                tracing::warn!(attempt_id = %self.attempt_id, "Time is up; submitting automatically");
                if let Some(outcome) = self.submit(SubmitTrigger::Timeout).await {
                    return outcome;
                }
                continue;
            }

            tokio::select! {
                _ = ticker.tick(), if self.state.is_in_progress() => {}
                command = commands.recv() => match command {
                    Some(SessionCommand::Answer { question_id, data }) => {
                        if let Err(err) = self.answer(question_id, data) {
                            tracing::warn!(
                                attempt_id = %self.attempt_id,
                                question_id = %question_id,
                                error = %err,
                                "Answer rejected"
                            );
                        }
                    }
                    Some(SessionCommand::Submit) => {
                        if let Some(outcome) = self.submit(SubmitTrigger::Manual).await {
                            return outcome;
                        }
                    }
                    None => return self.detach(),
                },
            }
        }
    }

    fn deadline_reached(&self) -> bool {
        !self.forced_submit_fired
            && self.state.is_in_progress()
            && self.timer.is_some_and(|timer| timer.is_expired(self.clock.now()))
    }

    async fn submit(&mut self, trigger: SubmitTrigger) -> Option<SessionOutcome> {
        let next = match transition(&self.state, AttemptEvent::SubmitRequested(trigger)) {
            Ok(next) => next,
            Err(err) => {
                tracing::warn!(attempt_id = %self.attempt_id, error = %err, "Submit request ignored");
                return None;
            }
        };

        let from = match next {
            AttemptState::ResultsPending => FinalizeFrom::Results,
            _ => FinalizeFrom::Submit(trigger),
        };
        self.state = next;
        self.publish();

        if from != FinalizeFrom::Results {
            self.sync.flush_within(self.flush_timeout).await;
        }
        self.finalize(from).await
    }

    async fn finalize(&mut self, from: FinalizeFrom) -> Option<SessionOutcome> {
        let attempt_id = self.attempt_id;
        let state = &mut self.state;
        let snapshot_tx = &self.snapshot_tx;

        let result = self
            .finalizer
            .finalize(attempt_id, from, |event| {
                match transition(state, event) {
                    Ok(next) => *state = next,
                    Err(err) => {
                        tracing::warn!(attempt_id = %attempt_id, error = %err, "Unexpected attempt event");
                    }
                }
                snapshot_tx.send_modify(|snapshot| snapshot.state = state.clone());
            })
            .await;

        match result {
            Ok(view) => Some(SessionOutcome::Completed(view)),
            Err(FinalizeError::AlreadyInFlight) => None,
            Err(err) => {
                tracing::error!(attempt_id = %self.attempt_id, error = %err, "Attempt finalization failed");
                None
            }
        }
    }

    fn detach(self) -> SessionOutcome {
        match self.state {
            AttemptState::Error { ref message, .. } => SessionOutcome::Failed {
                message: message.clone(),
                state: self.state.clone(),
            },
            _ => {
                tracing::info!(attempt_id = %self.attempt_id, "Detached; the attempt can be resumed");
                SessionOutcome::Detached
            }
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }
}
