use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use logpane_types::Severity;

use crate::ViewError;
use crate::coordinator::Coordinator;
use crate::search::SearchCriteria;

/// Default period between two ticks
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1000);

/// A filter change requested by a front end
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewCommand {
    SetThreshold { application: String, threshold: Severity },
    SetDefaultThreshold(Severity),
    SetActive { application: String, active: bool },
    SetMaxPerLevel(usize),
    SetSearch(SearchCriteria),
    SetNamespaceSelected { application: String, path: String, selected: bool },
    SetReceiving(bool),
    ClearLogs,
    ClearAll,
    UnselectAll,
}

impl ViewCommand {
    fn apply(self, coordinator: &Coordinator) -> Result<(), ViewError> {
        match self {
            Self::SetThreshold { application, threshold } => {
                coordinator.set_threshold(&application, threshold)?
            }
            Self::SetDefaultThreshold(threshold) => coordinator.set_default_threshold(threshold),
            Self::SetActive { application, active } => coordinator.set_active(&application, active)?,
            Self::SetMaxPerLevel(max) => coordinator.set_max_per_level_all(max),
            Self::SetSearch(criteria) => coordinator.set_search(criteria),
            Self::SetNamespaceSelected {
                application,
                path,
                selected,
            } => coordinator.set_namespace_selected(&application, &path, selected)?,
            Self::SetReceiving(receiving) => coordinator.set_receiving(receiving),
            Self::ClearLogs => coordinator.clear_logs(),
            Self::ClearAll => coordinator.clear_all(),
            Self::UnselectAll => coordinator.unselect_all(),
        }
        Ok(())
    }
}

/// Sends commands to a running [`ViewLoop`]
#[derive(Clone, Debug)]
pub struct ViewHandle {
    tx: mpsc::UnboundedSender<ViewCommand>,
}

impl ViewHandle {
    pub fn send(&self, command: ViewCommand) -> Result<(), ViewError> {
        self.tx.send(command).map_err(|_| ViewError::Closed)
    }
}

/// The single task that mutates the view: it ticks the coordinator on a
/// fixed period and applies front-end commands in between.
#[derive(Debug)]
pub struct ViewLoop {
    coordinator: Arc<Coordinator>,
    commands: mpsc::UnboundedReceiver<ViewCommand>,
    interval: Duration,
}

/// Create a view loop and the handle used to drive it
pub fn view_channel(coordinator: Arc<Coordinator>, interval: Duration) -> (ViewHandle, ViewLoop) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ViewHandle { tx },
        ViewLoop {
            coordinator,
            commands: rx,
            interval,
        },
    )
}

impl ViewLoop {
    /// Run until cancelled. The next tick is scheduled only once the
    /// previous one has finished.
    pub async fn run(mut self, cancel: CancellationToken) {
        let timer = sleep(self.interval);
        tokio::pin!(timer);
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                _ = &mut timer => {
                    let processed = self.coordinator.tick();
                    if processed > 0 {
                        debug!(processed, "tick");
                    }
                    timer.as_mut().reset(Instant::now() + self.interval);
                }

                command = self.commands.recv(), if commands_open => {
                    match command {
                        Some(command) => {
                            if let Err(e) = command.clone().apply(&self.coordinator) {
                                warn!(?command, error = %e, "view command rejected");
                            }
                        }
                        None => commands_open = false,
                    }
                }
            }
        }

        debug!("view loop stopped");
    }
}
