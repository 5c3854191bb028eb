//! Software update state machines
//!
//! A `SoftwareUpdateType` object drives an update through four cooperating
//! machines: PrepareForUpdate, Installation, PowerCycle and Confirmation.
//! Every machine moves `Idle -> InProgress -> (Completed | Failed)` and
//! carries a `PercentComplete` gauge clamped to 0..=100.
//!
//! # Methods
//!
//! - Prepare / Abort on PrepareForUpdate
//! - InstallSoftwarePackage / Resume on Installation
//! - Confirm on Confirmation
//!
//! What a timed-out confirmation means for the device (rollback or not) is
//! left to the caller.

use di_core::{DiError, DiResult, LocalizedText, Variant};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Default time a client has to confirm an installed update
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(300);

/// State of an update machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum UpdateState {
    Idle = 0,
    InProgress = 1,
    Completed = 2,
    Failed = 3,
}

impl UpdateState {
    /// Create from u8
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::InProgress,
            2 => Self::Completed,
            3 => Self::Failed,
            _ => Self::Idle,
        }
    }

    /// Convert to u8
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Completed or Failed
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::InProgress => "InProgress",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    /// Value of the machine's `CurrentState` variable
    pub fn to_localized_text(self) -> LocalizedText {
        LocalizedText::new("en", self.name())
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MachineStatus {
    state: UpdateState,
    percent_complete: u8,
}

/// State and progress shared by all four machines
#[derive(Debug, Clone)]
pub struct UpdateStateMachine {
    name: &'static str,
    status: Arc<RwLock<MachineStatus>>,
}

impl UpdateStateMachine {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            status: Arc::new(RwLock::new(MachineStatus {
                state: UpdateState::Idle,
                percent_complete: 0,
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn state(&self) -> UpdateState {
        self.status.read().await.state
    }

    pub async fn percent_complete(&self) -> u8 {
        self.status.read().await.percent_complete
    }

    /// Report progress of the running step
    ///
    /// Values outside 0..=100 are clamped.
    ///
    /// # Errors
    /// Returns `DiError::InvalidState` unless the machine is InProgress
    pub async fn set_percent_complete(&self, percent: i32) -> DiResult<()> {
        let mut status = self.status.write().await;
        if status.state != UpdateState::InProgress {
            return Err(DiError::InvalidState(format!(
                "{} is {}, progress can only be reported while InProgress",
                self.name, status.state
            )));
        }
        status.percent_complete = percent.clamp(0, 100) as u8;
        Ok(())
    }

    /// Finish the running step successfully
    pub async fn complete(&self) -> DiResult<()> {
        self.transition(&[UpdateState::InProgress], UpdateState::Completed)
            .await
    }

    /// Finish the running step with an error
    pub async fn fail(&self, reason: &str) -> DiResult<()> {
        self.transition(&[UpdateState::InProgress], UpdateState::Failed)
            .await?;
        log::warn!("{} failed: {}", self.name, reason);
        Ok(())
    }

    /// Return a Completed or Failed machine to Idle
    ///
    /// Resetting an Idle machine is a no-op.
    ///
    /// # Errors
    /// Returns `DiError::InvalidState` while the machine is InProgress
    pub async fn reset(&self) -> DiResult<()> {
        if self.state().await == UpdateState::Idle {
            return Ok(());
        }
        self.transition(&[UpdateState::Completed, UpdateState::Failed], UpdateState::Idle)
            .await
    }

    async fn transition(&self, from: &[UpdateState], to: UpdateState) -> DiResult<()> {
        let mut status = self.status.write().await;
        if !from.contains(&status.state) {
            return Err(DiError::InvalidState(format!(
                "{} cannot move from {} to {}",
                self.name, status.state, to
            )));
        }
        log::debug!("{}: {} -> {}", self.name, status.state, to);
        status.state = to;
        status.percent_complete = match to {
            UpdateState::Completed => 100,
            UpdateState::Failed => status.percent_complete,
            UpdateState::Idle | UpdateState::InProgress => 0,
        };
        Ok(())
    }
}

/// PrepareForUpdate machine
#[derive(Debug, Clone)]
pub struct PrepareForUpdateStateMachine {
    machine: UpdateStateMachine,
}

impl PrepareForUpdateStateMachine {
    pub fn new() -> Self {
        Self {
            machine: UpdateStateMachine::new("PrepareForUpdate"),
        }
    }

    pub fn machine(&self) -> &UpdateStateMachine {
        &self.machine
    }

    /// Start preparing the device for an update
    pub async fn prepare(&self) -> DiResult<()> {
        self.machine
            .transition(&[UpdateState::Idle], UpdateState::InProgress)
            .await
    }

    /// Cancel a running or finished preparation
    pub async fn abort(&self) -> DiResult<()> {
        self.machine
            .transition(
                &[UpdateState::InProgress, UpdateState::Completed],
                UpdateState::Idle,
            )
            .await
    }
}

impl Default for PrepareForUpdateStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Package handed to InstallSoftwarePackage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftwarePackage {
    pub manufacturer_uri: String,
    pub software_revision: String,
    pub patch_identifiers: Vec<Vec<u8>>,
    pub hash: Vec<u8>,
}

impl SoftwarePackage {
    /// Build a package from the InstallSoftwarePackage input arguments
    ///
    /// # Errors
    /// Returns `DiError::BadArgument` if the argument list does not match
    pub fn from_arguments(args: &[Variant]) -> DiResult<Self> {
        let [manufacturer_uri, software_revision, patch_identifiers, hash] = args else {
            return Err(DiError::BadArgument(format!(
                "InstallSoftwarePackage expects 4 arguments, got {}",
                args.len()
            )));
        };
        let bad = |e: DiError| DiError::BadArgument(e.to_string());
        let patch_identifiers = match patch_identifiers {
            Variant::Empty => Vec::new(),
            other => other
                .as_array()
                .map_err(bad)?
                .iter()
                .map(|p| p.as_bytes().map(<[u8]>::to_vec))
                .collect::<DiResult<Vec<_>>>()
                .map_err(bad)?,
        };
        Ok(Self {
            manufacturer_uri: manufacturer_uri.as_str().map_err(bad)?.to_string(),
            software_revision: software_revision.as_str().map_err(bad)?.to_string(),
            patch_identifiers,
            hash: hash.as_bytes().map_err(bad)?.to_vec(),
        })
    }
}

/// Installation machine
#[derive(Debug, Clone)]
pub struct InstallationStateMachine {
    machine: UpdateStateMachine,
    package: Arc<RwLock<Option<SoftwarePackage>>>,
}

impl InstallationStateMachine {
    pub fn new() -> Self {
        Self {
            machine: UpdateStateMachine::new("Installation"),
            package: Arc::new(RwLock::new(None)),
        }
    }

    pub fn machine(&self) -> &UpdateStateMachine {
        &self.machine
    }

    /// Package of the current or last installation
    pub async fn package(&self) -> Option<SoftwarePackage> {
        self.package.read().await.clone()
    }

    /// Start installing a package
    ///
    /// # Errors
    /// Returns `DiError::BadArgument` for a package without manufacturer URI
    /// or revision, `DiError::InvalidState` unless the machine is Idle
    pub async fn install(&self, package: SoftwarePackage) -> DiResult<()> {
        if package.manufacturer_uri.is_empty() || package.software_revision.is_empty() {
            return Err(DiError::BadArgument(
                "Software package needs a manufacturer URI and a revision".to_string(),
            ));
        }
        let mut current = self.package.write().await;
        self.machine
            .transition(&[UpdateState::Idle], UpdateState::InProgress)
            .await?;
        log::info!(
            "Installing {} revision {}",
            package.manufacturer_uri,
            package.software_revision
        );
        *current = Some(package);
        Ok(())
    }

    /// Continue a failed installation
    pub async fn resume(&self) -> DiResult<()> {
        let package = self.package.read().await;
        if package.is_none() {
            return Err(DiError::InvalidState("No installation to resume".to_string()));
        }
        self.machine
            .transition(&[UpdateState::Failed], UpdateState::InProgress)
            .await
    }

    /// Cancel the installation and drop the package
    pub async fn abort(&self) -> DiResult<()> {
        let mut package = self.package.write().await;
        self.machine
            .transition(
                &[UpdateState::InProgress, UpdateState::Failed],
                UpdateState::Idle,
            )
            .await?;
        *package = None;
        Ok(())
    }
}

impl Default for InstallationStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// PowerCycle machine
#[derive(Debug, Clone)]
pub struct PowerCycleStateMachine {
    machine: UpdateStateMachine,
}

impl PowerCycleStateMachine {
    pub fn new() -> Self {
        Self {
            machine: UpdateStateMachine::new("PowerCycle"),
        }
    }

    pub fn machine(&self) -> &UpdateStateMachine {
        &self.machine
    }

    /// The device is waiting for a power cycle
    pub async fn begin(&self) -> DiResult<()> {
        self.machine
            .transition(&[UpdateState::Idle], UpdateState::InProgress)
            .await
    }

    /// The power cycle happened
    pub async fn complete(&self) -> DiResult<()> {
        self.machine.complete().await
    }
}

impl Default for PowerCycleStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Confirmation machine
#[derive(Debug, Clone)]
pub struct ConfirmationStateMachine {
    machine: UpdateStateMachine,
    timeout: Duration,
    deadline: Arc<RwLock<Option<Instant>>>,
}

impl ConfirmationStateMachine {
    /// # Arguments
    /// * `timeout` - Time a client has to confirm once confirmation began
    pub fn new(timeout: Duration) -> Self {
        Self {
            machine: UpdateStateMachine::new("Confirmation"),
            timeout,
            deadline: Arc::new(RwLock::new(None)),
        }
    }

    pub fn machine(&self) -> &UpdateStateMachine {
        &self.machine
    }

    pub fn confirmation_timeout(&self) -> Duration {
        self.timeout
    }

    /// Time left to confirm, zero when no confirmation is pending
    pub async fn remaining(&self) -> Duration {
        match *self.deadline.read().await {
            Some(deadline) if self.machine.state().await == UpdateState::InProgress => {
                deadline.saturating_duration_since(Instant::now())
            }
            _ => Duration::ZERO,
        }
    }

    /// Start waiting for a client to confirm
    pub async fn begin(&self) -> DiResult<()> {
        let mut deadline = self.deadline.write().await;
        self.machine
            .transition(&[UpdateState::Idle], UpdateState::InProgress)
            .await?;
        *deadline = Some(Instant::now() + self.timeout);
        Ok(())
    }

    /// Confirm the installed update
    ///
    /// # Errors
    /// Returns `DiError::Timeout` and moves the machine to Failed if the
    /// confirmation timeout has elapsed, `DiError::InvalidState` if no
    /// confirmation is pending
    pub async fn confirm(&self) -> DiResult<()> {
        let mut deadline = self.deadline.write().await;
        if Self::expire(&mut deadline) {
            self.machine.fail("confirmation timed out").await?;
            return Err(DiError::Timeout);
        }
        self.machine.complete().await?;
        *deadline = None;
        log::info!("Update confirmed");
        Ok(())
    }

    /// Fail a pending confirmation whose timeout has elapsed
    ///
    /// Returns true if the machine moved to Failed.
    pub async fn check_timeout(&self) -> bool {
        let mut deadline = self.deadline.write().await;
        if !Self::expire(&mut deadline) {
            return false;
        }
        self.machine.fail("confirmation timed out").await.is_ok()
    }

    fn expire(deadline: &mut Option<Instant>) -> bool {
        let expired = deadline.is_some_and(|d| Instant::now() > d);
        if expired {
            *deadline = None;
        }
        expired
    }
}

/// The four machines of one SoftwareUpdate object
#[derive(Debug, Clone)]
pub struct SoftwareUpdate {
    pub prepare_for_update: PrepareForUpdateStateMachine,
    pub installation: InstallationStateMachine,
    pub power_cycle: PowerCycleStateMachine,
    pub confirmation: ConfirmationStateMachine,
}

impl SoftwareUpdate {
    pub fn new(confirmation_timeout: Duration) -> Self {
        Self {
            prepare_for_update: PrepareForUpdateStateMachine::new(),
            installation: InstallationStateMachine::new(),
            power_cycle: PowerCycleStateMachine::new(),
            confirmation: ConfirmationStateMachine::new(confirmation_timeout),
        }
    }

    /// Machine by its browse name
    pub fn machine(&self, browse_name: &str) -> Option<&UpdateStateMachine> {
        match browse_name {
            "PrepareForUpdate" => Some(self.prepare_for_update.machine()),
            "Installation" => Some(self.installation.machine()),
            "PowerCycle" => Some(self.power_cycle.machine()),
            "Confirmation" => Some(self.confirmation.machine()),
            _ => None,
        }
    }

    /// Reset every terminal machine to Idle
    ///
    /// Either all four machines are reset or none is.
    ///
    /// # Errors
    /// Returns `DiError::InvalidState` if any machine is InProgress
    pub async fn reset(&self) -> DiResult<()> {
        let machines = [
            self.prepare_for_update.machine(),
            self.installation.machine(),
            self.power_cycle.machine(),
            self.confirmation.machine(),
        ];
        let mut statuses = Vec::with_capacity(machines.len());
        for machine in machines {
            statuses.push((machine.name, machine.status.write().await));
        }
        if let Some((name, _)) = statuses
            .iter()
            .find(|(_, status)| status.state == UpdateState::InProgress)
        {
            return Err(DiError::InvalidState(format!(
                "{} is InProgress, SoftwareUpdate cannot be reset",
                name
            )));
        }
        for (name, status) in statuses.iter_mut() {
            if status.state != UpdateState::Idle {
                log::debug!("{}: {} -> {}", name, status.state, UpdateState::Idle);
                status.state = UpdateState::Idle;
                status.percent_complete = 0;
            }
        }
        Ok(())
    }
}

impl Default for SoftwareUpdate {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRMATION_TIMEOUT)
    }
}
