//! Notification collaborator for the submit flow. Forms receive a
//! [`Notifier`] instead of reaching for a global toast system.

use std::collections::{BTreeMap, VecDeque};
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use gpui::SharedString;

use crate::form::{FormEngine, FormResult, SubmitOutcome, Values};
use crate::i18n::I18nManager;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ToastId(pub u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ToastKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ToastPosition {
    TopLeft,
    TopCenter,
    #[default]
    TopRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ToastEntry {
    pub id: Option<ToastId>,
    pub title: SharedString,
    pub message: SharedString,
    pub kind: ToastKind,
    pub position: ToastPosition,
    pub auto_close_ms: Option<u32>,
}

impl ToastEntry {
    pub fn new(title: impl Into<SharedString>, message: impl Into<SharedString>) -> Self {
        Self {
            id: None,
            title: title.into(),
            message: message.into(),
            kind: ToastKind::Info,
            position: ToastPosition::default(),
            auto_close_ms: Some(4_000),
        }
    }

    pub fn kind(mut self, value: ToastKind) -> Self {
        self.kind = value;
        self
    }

    pub fn position(mut self, value: ToastPosition) -> Self {
        self.position = value;
        self
    }

    pub fn auto_close_ms(mut self, value: Option<u32>) -> Self {
        self.auto_close_ms = value;
        self
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, entry: ToastEntry) -> ToastId;
}

#[derive(Default)]
struct ToastQueues {
    queues: BTreeMap<ToastPosition, VecDeque<ToastEntry>>,
    max_visible: BTreeMap<ToastPosition, usize>,
}

/// Bounded toast queues per screen corner.
#[derive(Clone, Default)]
pub struct ToastManager {
    next_id: Arc<AtomicU64>,
    state: Arc<RwLock<ToastQueues>>,
}

impl ToastManager {
    const DEFAULT_MAX_VISIBLE: usize = 5;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_max_visible(&self, position: ToastPosition, max_visible: usize) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .max_visible
            .insert(position, max_visible.max(1));
    }

    pub fn show(&self, mut entry: ToastEntry) -> ToastId {
        let id = ToastId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        entry.id = Some(id);

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let limit = state
            .max_visible
            .get(&entry.position)
            .copied()
            .unwrap_or(Self::DEFAULT_MAX_VISIBLE);
        let queue = state.queues.entry(entry.position).or_default();
        queue.push_back(entry);
        while queue.len() > limit {
            queue.pop_front();
        }
        id
    }

    pub fn dismiss(&self, id: ToastId) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.queues.values_mut().any(|queue| {
            match queue.iter().position(|entry| entry.id == Some(id)) {
                Some(index) => {
                    queue.remove(index);
                    true
                }
                None => false,
            }
        })
    }

    pub fn list(&self, position: ToastPosition) -> Vec<ToastEntry> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .queues
            .get(&position)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Notifier for ToastManager {
    fn notify(&self, entry: ToastEntry) -> ToastId {
        self.show(entry)
    }
}

type InvalidateFn = Arc<dyn Fn() + Send + Sync>;

/// Side effects around a submit: a toast for the outcome and cache
/// invalidation after a successful save.
#[derive(Clone)]
pub struct SubmitFeedback {
    notifier: Arc<dyn Notifier>,
    success: Option<ToastEntry>,
    failure_title: SharedString,
    invalidate: Vec<InvalidateFn>,
}

impl SubmitFeedback {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::localized(notifier, &I18nManager::default())
    }

    pub fn localized(notifier: Arc<dyn Notifier>, i18n: &I18nManager) -> Self {
        Self {
            notifier,
            success: Some(
                ToastEntry::new(i18n.t("submit.succeeded"), "").kind(ToastKind::Success),
            ),
            failure_title: i18n.t("submit.failed"),
            invalidate: Vec::new(),
        }
    }

    /// `None` silences the success toast.
    pub fn success(mut self, entry: Option<ToastEntry>) -> Self {
        self.success = entry;
        self
    }

    pub fn failure_title(mut self, title: impl Into<SharedString>) -> Self {
        self.failure_title = title.into();
        self
    }

    /// Runs after every successful submit, e.g. to refetch a list query.
    pub fn invalidate(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.invalidate.push(Arc::new(callback));
        self
    }

    pub fn report<E>(&self, outcome: &SubmitOutcome<E>)
    where
        E: Display,
    {
        match outcome {
            SubmitOutcome::Invalid => {}
            SubmitOutcome::Submitted => {
                if let Some(entry) = &self.success {
                    self.notifier.notify(entry.clone());
                }
                for callback in &self.invalidate {
                    callback();
                }
            }
            SubmitOutcome::Failed(error) => {
                self.notifier.notify(
                    ToastEntry::new(self.failure_title.clone(), error.to_string())
                        .kind(ToastKind::Error),
                );
            }
        }
    }
}

impl FormEngine {
    /// `handle_submit` with the outcome reported through `feedback`.
    pub async fn submit_with_feedback<F, Fut, R, E>(
        &self,
        feedback: &SubmitFeedback,
        on_submit: F,
    ) -> FormResult<SubmitOutcome<E>>
    where
        F: FnOnce(Values) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: Display,
    {
        let outcome = self.handle_submit(on_submit).await?;
        feedback.report(&outcome);
        Ok(outcome)
    }
}
