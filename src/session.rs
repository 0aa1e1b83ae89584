//! Audit session state.
//!
//! The session is the single authority on whether observations are recorded.
//! It is a cheap cloneable handle: the extractor, the statement hook and the
//! indexer all share the same state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::scheduler::ScheduleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditState {
    Idle,
    Recording,
}

#[derive(Debug, Default)]
struct SessionInner {
    recording: AtomicBool,
    pending_end: Mutex<Option<ScheduleId>>,
}

#[derive(Debug, Clone, Default)]
pub struct AuditSession {
    inner: Arc<SessionInner>,
}

impl AuditSession {
    /// Create an idle session
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AuditState {
        if self.is_recording() {
            AuditState::Recording
        } else {
            AuditState::Idle
        }
    }

    pub fn is_recording(&self) -> bool {
        self.inner.recording.load(Ordering::SeqCst)
    }

    /// Enter `Recording` with `end_trigger` as the pending end trigger.
    ///
    /// Starting while already recording re-arms the trigger; the previously
    /// pending trigger is returned so the caller can cancel it.
    pub fn start(&self, end_trigger: Option<ScheduleId>) -> Option<ScheduleId> {
        let mut pending = self.pending_end();
        self.inner.recording.store(true, Ordering::SeqCst);
        std::mem::replace(&mut *pending, end_trigger)
    }

    /// Return to `Idle`, handing back the pending end trigger if any
    pub fn stop(&self) -> Option<ScheduleId> {
        let mut pending = self.pending_end();
        self.inner.recording.store(false, Ordering::SeqCst);
        pending.take()
    }

    fn pending_end(&self) -> std::sync::MutexGuard<'_, Option<ScheduleId>> {
        self.inner.pending_end.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{Scheduler, TokioScheduler};
    use std::time::Duration;

    #[test]
    fn test_session_starts_idle() {
        let session = AuditSession::new();
        assert_eq!(session.state(), AuditState::Idle);
        assert!(!session.is_recording());
        assert_eq!(session.stop(), None);
    }

    #[test]
    fn test_clones_share_state() {
        let session = AuditSession::new();
        let handle = session.clone();

        session.start(None);
        assert!(handle.is_recording());

        handle.stop();
        assert_eq!(session.state(), AuditState::Idle);
    }

    #[tokio::test]
    async fn test_restart_returns_previous_trigger() {
        let scheduler = TokioScheduler::new();
        let first = scheduler.schedule_once(Duration::from_secs(60), Box::pin(async {})).unwrap();
        let second = scheduler.schedule_once(Duration::from_secs(60), Box::pin(async {})).unwrap();

        let session = AuditSession::new();
        assert_eq!(session.start(Some(first)), None);
        assert_eq!(session.start(Some(second)), Some(first));
        assert_eq!(session.state(), AuditState::Recording);

        assert_eq!(session.stop(), Some(second));
        assert_eq!(session.stop(), None);

        scheduler.cancel(first);
        scheduler.cancel(second);
    }
}
