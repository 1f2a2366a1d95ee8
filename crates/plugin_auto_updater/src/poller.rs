//! Version Poller: one poll cycle = read the local build, ask the backend,
//! decide whether an update exists.

use crate::client::VersionSource;
use crate::error::UpdateCheckError;
use crate::version::{read_local_version, LocalVersion};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Outcome of one successful poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatus {
    pub up_to_date: bool,
    pub required_version: u32,
    pub local_version: LocalVersion,
    pub version_is_listable: bool,
    pub message: Option<String>,
}

impl UpdateStatus {
    pub fn update_available(&self) -> bool {
        !self.up_to_date
    }
}

/// Polls the local metadata file and the remote version source.
///
/// At most one poll runs at a time: a call made while another is outstanding
/// returns [`UpdateCheckError::AlreadyInFlight`] immediately. The poller never
/// touches sequencer state.
pub struct VersionPoller {
    version_file: PathBuf,
    source: Arc<dyn VersionSource>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the poll finishes or is cancelled.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl VersionPoller {
    pub fn new(version_file: impl Into<PathBuf>, source: Arc<dyn VersionSource>) -> Self {
        Self {
            version_file: version_file.into(),
            source,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn version_file(&self) -> &PathBuf {
        &self.version_file
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Runs one poll cycle.
    pub async fn poll(&self) -> Result<UpdateStatus, UpdateCheckError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(UpdateCheckError::AlreadyInFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let local_version = read_local_version(&self.version_file).await?;
        let check = self.source.check(&local_version).await?;

        if !check.success {
            return Err(UpdateCheckError::MalformedResponse(
                check
                    .message
                    .unwrap_or_else(|| "backend reported success=false".to_string()),
            ));
        }

        Ok(UpdateStatus {
            up_to_date: check.up_to_date,
            required_version: check.required_version,
            local_version,
            version_is_listable: check.version_is_listable,
            message: check.message,
        })
    }
}
