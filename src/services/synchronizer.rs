use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use uuid::Uuid;

use crate::client::ExamApi;
use crate::schemas::answer::AnswerData;

#[derive(Debug, Clone)]
struct Entry {
    value: AnswerData,
    revision: u64,
}

#[derive(Debug, Default)]
struct SyncState {
    answers: HashMap<Uuid, Entry>,
    /// Questions with a save task running.
    saving: HashSet<Uuid>,
    next_revision: u64,
}

struct Inner {
    api: Arc<dyn ExamApi>,
    attempt_id: Uuid,
    state: Mutex<SyncState>,
    idle: Notify,
}

/// In-memory answer set of one attempt, mirrored to the server on every edit.
///
/// Local edits apply immediately. Saves run in the background: one task per question at a
/// time, always sending the newest local value, so a slow save for an older value can never
/// land after a newer one.
#[derive(Clone)]
pub struct AnswerSynchronizer {
    inner: Arc<Inner>,
}

impl AnswerSynchronizer {
    pub fn new(api: Arc<dyn ExamApi>, attempt_id: Uuid) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                attempt_id,
                state: Mutex::new(SyncState::default()),
                idle: Notify::new(),
            }),
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.inner.attempt_id
    }

    /// Seeds the map with answers the server already holds. Returns how many were loaded.
    /// A failed fetch leaves the map untouched; the attempt stays usable.
    pub async fn hydrate(&self) -> usize {
        let saved = match self.inner.api.fetch_answers(self.inner.attempt_id).await {
            Ok(saved) => saved,
            Err(err) => {
                tracing::error!(
                    attempt_id = %self.inner.attempt_id,
                    error = %err,
                    "Failed to fetch existing answers"
                );
                return 0;
            }
        };

        let mut state = self.inner.lock();
        let mut loaded = 0;
        for answer in saved {
            let Some(value) = answer.answer_data else {
                continue;
            };
            // Edits made while the fetch was in flight win.
            if state.answers.contains_key(&answer.question_id) {
                continue;
            }
            state.answers.insert(answer.question_id, Entry { value, revision: 0 });
            loaded += 1;
        }

        tracing::info!(attempt_id = %self.inner.attempt_id, loaded, "Hydrated saved answers");
        loaded
    }

    /// Applies an edit locally and schedules its autosave. Must be called inside a Tokio
    /// runtime.
    pub fn record(&self, question_id: Uuid, value: AnswerData) {
        let spawn_saver = {
            let mut state = self.inner.lock();
            state.next_revision += 1;
            let revision = state.next_revision;
            state.answers.insert(question_id, Entry { value, revision });
            state.saving.insert(question_id)
        };

        if spawn_saver {
            let inner = self.inner.clone();
            tokio::spawn(async move { inner.drain(question_id).await });
        }
    }

    pub fn answer(&self, question_id: Uuid) -> Option<AnswerData> {
        self.inner.lock().answers.get(&question_id).map(|entry| entry.value.clone())
    }

    pub fn snapshot(&self) -> HashMap<Uuid, AnswerData> {
        self.inner
            .lock()
            .answers
            .iter()
            .map(|(question_id, entry)| (*question_id, entry.value.clone()))
            .collect()
    }

    pub fn answered_count(&self) -> usize {
        self.inner.lock().answers.len()
    }

    pub fn is_saving(&self) -> bool {
        !self.inner.lock().saving.is_empty()
    }

    /// Waits until no save is in flight.
    pub async fn flush(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if !self.is_saving() {
                return;
            }
            notified.await;
        }
    }

    /// [`flush`](Self::flush) bounded by `timeout`. Returns `false` if saves were still running.
    pub async fn flush_within(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.flush()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    attempt_id = %self.inner.attempt_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Pending answer saves did not finish in time"
                );
                false
            }
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn drain(&self, question_id: Uuid) {
        loop {
            let current = self.lock().answers.get(&question_id).cloned();
            let Some(Entry { value, revision }) = current else {
                self.finish(question_id);
                return;
            };

            match self.api.save_answer(self.attempt_id, question_id, &value).await {
                Ok(()) => {
                    metrics::counter!("answer_saves_total", "status" => "saved").increment(1);
                    tracing::debug!(
                        attempt_id = %self.attempt_id,
                        question_id = %question_id,
                        revision,
                        "Answer saved"
                    );
                }
                Err(err) => {
                    metrics::counter!("answer_saves_total", "status" => "failed").increment(1);
                    tracing::warn!(
                        attempt_id = %self.attempt_id,
                        question_id = %question_id,
                        error = %err,
                        "Failed to save answer"
                    );
                }
            }

            let mut state = self.lock();
            let latest = state.answers.get(&question_id).map(|entry| entry.revision);
            if latest == Some(revision) {
                state.saving.remove(&question_id);
                let idle = state.saving.is_empty();
                drop(state);
                if idle {
                    self.idle.notify_waiters();
                }
                return;
            }
        }
    }

    fn finish(&self, question_id: Uuid) {
        let idle = {
            let mut state = self.lock();
            state.saving.remove(&question_id);
            state.saving.is_empty()
        };
        if idle {
            self.idle.notify_waiters();
        }
    }
}
