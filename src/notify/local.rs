/// In-process notification scheduler
///
/// Keeps pending requests in memory and runs fired reminders through the
/// delivery filter. Used by the CLI and tests, and as the reference for what
/// a platform adapter has to provide.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::domain::NotificationId;
use crate::notify::{Delivery, DeliveryFilter, NotificationRequest, NotificationScheduler, ScheduleError};

#[derive(Debug)]
struct LocalState {
    permission_granted: bool,
    pending: BTreeMap<NotificationId, NotificationRequest>,
}

#[derive(Debug)]
pub struct LocalScheduler {
    state: Mutex<LocalState>,
    filter: DeliveryFilter,
}

impl Default for LocalScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalScheduler {
    pub fn new() -> Self {
        Self::with_filter(DeliveryFilter::default())
    }

    pub fn with_filter(filter: DeliveryFilter) -> Self {
        Self {
            state: Mutex::new(LocalState {
                permission_granted: true,
                pending: BTreeMap::new(),
            }),
            filter,
        }
    }

    fn state(&self) -> MutexGuard<'_, LocalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Grant or revoke notification permission
    pub fn set_permission(&self, granted: bool) {
        self.state().permission_granted = granted;
    }

    pub fn pending(&self) -> Vec<(NotificationId, NotificationRequest)> {
        self.state()
            .pending
            .iter()
            .map(|(id, request)| (id.clone(), request.clone()))
            .collect()
    }

    pub fn is_pending(&self, id: &NotificationId) -> bool {
        self.state().pending.contains_key(id)
    }

    pub fn request(&self, id: &NotificationId) -> Option<NotificationRequest> {
        self.state().pending.get(id).cloned()
    }

    /// Handle a reminder firing at `now`
    ///
    /// One-shot reminders are consumed whether or not they are shown.
    /// Returns `None` for ids that are no longer pending.
    pub fn fire(&self, id: &NotificationId, now: DateTime<Local>) -> Option<Delivery> {
        let request = {
            let mut state = self.state();
            let request = state.pending.get(id).cloned()?;
            if !request.trigger.repeats() {
                state.pending.remove(id);
            }
            request
        };

        let delivery = self.filter.decide(&request.metadata, &request.trigger, now);
        match delivery {
            Delivery::Show { .. } => tracing::debug!("Showing reminder {}", id),
            Delivery::Suppress(reason) => tracing::warn!("Suppressed reminder {}: {:?}", id, reason),
        }
        Some(delivery)
    }
}

#[async_trait]
impl NotificationScheduler for LocalScheduler {
    async fn schedule(&self, request: NotificationRequest) -> Result<NotificationId, ScheduleError> {
        let mut state = self.state();
        if !state.permission_granted {
            return Err(ScheduleError::PermissionDenied);
        }
        let id = NotificationId(Uuid::new_v4().to_string());
        state.pending.insert(id.clone(), request);
        Ok(id)
    }

    async fn cancel(&self, id: &NotificationId) -> Result<(), ScheduleError> {
        if self.state().pending.remove(id).is_none() {
            tracing::debug!("Cancel of unknown reminder {} ignored", id);
        }
        Ok(())
    }
}
