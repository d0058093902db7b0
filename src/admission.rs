//! Admission control for the download and upload phases
//!
//! Each phase has a set of admitted job ids (each consuming one slot) and a FIFO
//! waiting-list of job ids paired with a single-fire wake signal. All four
//! structures live behind one lock so a job can never be observed in both the
//! admitted set and the waiting-list of the same phase.
//!
//! Promotion ("start from queued") always runs under that same lock. It moves
//! waiters to the admitted set before firing their signal, so capacity freed by
//! one job can't be claimed twice.

use crate::config::QueueConfig;
use crate::types::{Event, JobId, Phase};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, oneshot};

/// Concurrency ceilings, `0` meaning unlimited
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueLimits {
    /// Combined ceiling across both phases
    pub all: usize,
    /// Download ceiling
    pub download: usize,
    /// Upload ceiling
    pub upload: usize,
}

impl From<&QueueConfig> for QueueLimits {
    fn from(config: &QueueConfig) -> Self {
        Self {
            all: config.queue_all,
            download: config.queue_download,
            upload: config.queue_upload,
        }
    }
}

/// How a wait for admission ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WakeOutcome {
    /// The job now holds a slot
    Admitted,
    /// The job was withdrawn from the queue (cancelled or failed)
    Abandoned,
}

/// Result of [`AdmissionController::try_admit`]
#[derive(Debug)]
#[must_use]
pub enum Admission {
    /// A slot was granted immediately
    Admitted,
    /// The job is queued; await the ticket before starting the phase
    Queued(QueueTicket),
}

/// Receiving half of a queued job's wake signal
#[derive(Debug)]
pub struct QueueTicket {
    id: JobId,
    phase: Phase,
    rx: oneshot::Receiver<WakeOutcome>,
}

impl QueueTicket {
    /// Job this ticket belongs to
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Phase the job is queued for
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Suspend until promoted or withdrawn
    ///
    /// If the controller drops the signal without firing it the wait counts as
    /// abandoned, so a caller can never block forever.
    pub async fn wait(self) -> WakeOutcome {
        self.rx.await.unwrap_or(WakeOutcome::Abandoned)
    }
}

#[derive(Debug)]
struct Waiter {
    id: JobId,
    wake: oneshot::Sender<WakeOutcome>,
}

#[derive(Debug, Default)]
struct QueueState {
    admitted_download: HashSet<JobId>,
    admitted_upload: HashSet<JobId>,
    waiting_download: VecDeque<Waiter>,
    waiting_upload: VecDeque<Waiter>,
}

impl QueueState {
    fn admitted(&mut self, phase: Phase) -> &mut HashSet<JobId> {
        match phase {
            Phase::Download => &mut self.admitted_download,
            Phase::Upload => &mut self.admitted_upload,
        }
    }

    fn waiting(&mut self, phase: Phase) -> &mut VecDeque<Waiter> {
        match phase {
            Phase::Download => &mut self.waiting_download,
            Phase::Upload => &mut self.waiting_upload,
        }
    }

    fn take_waiter(&mut self, id: JobId, phase: Phase) -> Option<Waiter> {
        let waiting = self.waiting(phase);
        let index = waiting.iter().position(|w| w.id == id)?;
        waiting.remove(index)
    }
}

/// Per-phase admission sets and waiting-lists behind a single lock
#[derive(Clone)]
pub struct AdmissionController {
    limits: QueueLimits,
    state: Arc<Mutex<QueueState>>,
    event_tx: broadcast::Sender<Event>,
}

impl AdmissionController {
    /// Create a controller with the given ceilings, emitting promotion events on `event_tx`
    pub fn new(limits: QueueLimits, event_tx: broadcast::Sender<Event>) -> Self {
        Self {
            limits,
            state: Arc::new(Mutex::new(QueueState::default())),
            event_tx,
        }
    }

    /// Configured ceilings
    pub fn limits(&self) -> QueueLimits {
        self.limits
    }

    /// Ask for a slot in `phase`
    ///
    /// Asking for an upload slot first gives up the job's download slot, if it
    /// still holds one. A job that already holds a slot in `phase` is admitted
    /// again without consuming a second one.
    pub async fn try_admit(&self, id: JobId, phase: Phase) -> Admission {
        let mut state = self.state.lock().await;

        if phase == Phase::Upload {
            state.admitted_download.remove(&id);
        }
        if let Some(stale) = state.take_waiter(id, phase) {
            stale.wake.send(WakeOutcome::Abandoned).ok();
        }

        let admission = if state.admitted(phase).contains(&id) || !self.over_limit(&state, phase) {
            state.admitted(phase).insert(id);
            tracing::debug!(job_id = %id, %phase, "admitted");
            Admission::Admitted
        } else {
            let (wake, rx) = oneshot::channel();
            state.waiting(phase).push_back(Waiter { id, wake });
            tracing::debug!(job_id = %id, %phase, "queued for admission");
            self.event_tx.send(Event::Queued { id, phase }).ok();
            Admission::Queued(QueueTicket { id, phase, rx })
        };

        self.promote_locked(&mut state);
        admission
    }

    /// Take a slot in `phase` regardless of the ceiling
    ///
    /// A job waiting in that phase is pulled off the waiting-list and its
    /// signal fired with [`WakeOutcome::Admitted`].
    pub async fn force_admit(&self, id: JobId, phase: Phase) {
        let mut state = self.state.lock().await;

        if phase == Phase::Upload {
            state.admitted_download.remove(&id);
        }
        state.admitted(phase).insert(id);
        if let Some(waiter) = state.take_waiter(id, phase) {
            waiter.wake.send(WakeOutcome::Admitted).ok();
        }
        tracing::debug!(job_id = %id, %phase, "force admitted");

        self.promote_locked(&mut state);
    }

    /// Free the job's slot in `phase`, then promote waiters into the freed capacity
    pub async fn release(&self, id: JobId, phase: Phase) {
        let mut state = self.state.lock().await;
        if state.admitted(phase).remove(&id) {
            tracing::debug!(job_id = %id, %phase, "released slot");
        }
        self.promote_locked(&mut state);
    }

    /// Drop every trace of a job from both phases
    ///
    /// Pending wake signals are fired with [`WakeOutcome::Abandoned`]. Safe to
    /// call any number of times; returns whether anything was removed.
    pub async fn withdraw(&self, id: JobId) -> bool {
        let mut state = self.state.lock().await;
        let mut removed = false;

        for phase in [Phase::Download, Phase::Upload] {
            if let Some(waiter) = state.take_waiter(id, phase) {
                waiter.wake.send(WakeOutcome::Abandoned).ok();
                removed = true;
            }
            removed |= state.admitted(phase).remove(&id);
        }

        if removed {
            tracing::debug!(job_id = %id, "withdrawn from admission");
        }
        self.promote_locked(&mut state);
        removed
    }

    /// Promotion sweep: admit waiters while capacity allows
    ///
    /// Returns the promoted jobs in admission order.
    pub async fn start_from_queued(&self) -> Vec<(JobId, Phase)> {
        let mut state = self.state.lock().await;
        self.promote_locked(&mut state)
    }

    /// Whether the job holds a slot in `phase`
    pub async fn is_admitted(&self, id: JobId, phase: Phase) -> bool {
        self.state.lock().await.admitted(phase).contains(&id)
    }

    /// Whether the job is on the waiting-list of `phase`
    pub async fn is_waiting(&self, id: JobId, phase: Phase) -> bool {
        self.state.lock().await.waiting(phase).iter().any(|w| w.id == id)
    }

    /// Whether the job appears anywhere in the admission structures
    pub async fn is_tracked(&self, id: JobId) -> bool {
        let mut state = self.state.lock().await;
        [Phase::Download, Phase::Upload].into_iter().any(|phase| {
            state.admitted(phase).contains(&id) || state.waiting(phase).iter().any(|w| w.id == id)
        })
    }

    /// Number of slots in use for `phase`
    pub async fn admitted_count(&self, phase: Phase) -> usize {
        self.state.lock().await.admitted(phase).len()
    }

    /// Waiting job ids for `phase`, in FIFO order
    pub async fn waiting_ids(&self, phase: Phase) -> Vec<JobId> {
        self.state.lock().await.waiting(phase).iter().map(|w| w.id).collect()
    }

    fn over_limit(&self, state: &QueueState, phase: Phase) -> bool {
        let downloads = state.admitted_download.len();
        let uploads = state.admitted_upload.len();
        let (count, limit) = match phase {
            Phase::Download => (downloads, self.limits.download),
            Phase::Upload => (uploads, self.limits.upload),
        };
        (self.limits.all > 0 && downloads + uploads >= self.limits.all)
            || (limit > 0 && count >= limit)
    }

    // Uploads are promoted first: under a combined ceiling a finished download
    // should leave the system before a new one starts.
    fn promote_locked(&self, state: &mut QueueState) -> Vec<(JobId, Phase)> {
        let mut promoted = Vec::new();

        for phase in [Phase::Upload, Phase::Download] {
            while !state.waiting(phase).is_empty() && !self.over_limit(state, phase) {
                let Some(waiter) = state.waiting(phase).pop_front() else {
                    break;
                };
                state.admitted(phase).insert(waiter.id);
                if waiter.wake.send(WakeOutcome::Admitted).is_err() {
                    // Nobody is waiting on this ticket any more.
                    state.admitted(phase).remove(&waiter.id);
                    tracing::debug!(job_id = %waiter.id, %phase, "dropped stale waiter");
                    continue;
                }
                tracing::info!(job_id = %waiter.id, %phase, "started from queue");
                self.event_tx
                    .send(Event::StartedFromQueue {
                        id: waiter.id,
                        phase,
                    })
                    .ok();
                promoted.push((waiter.id, phase));
            }
        }

        promoted
    }
}
