//! Behavior bound to DI objects
//!
//! Method handlers for LockingServices and SoftwareUpdate objects, and the
//! live values their variables read from.

use crate::dispatcher::{CallContext, MethodHandler};
use async_trait::async_trait;
use di_core::{DiResult, Variant};
use di_model::locking::{self, LockingService};
use di_model::well_known::names;
use di_model::{SoftwarePackage, SoftwareUpdate};
use std::sync::Arc;

/// The four LockingServices methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOperation {
    InitLock,
    RenewLock,
    ExitLock,
    BreakLock,
}

impl LockOperation {
    pub const ALL: [LockOperation; 4] = [
        LockOperation::InitLock,
        LockOperation::RenewLock,
        LockOperation::ExitLock,
        LockOperation::BreakLock,
    ];

    pub fn browse_name(self) -> &'static str {
        match self {
            Self::InitLock => names::INIT_LOCK,
            Self::RenewLock => names::RENEW_LOCK,
            Self::ExitLock => names::EXIT_LOCK,
            Self::BreakLock => names::BREAK_LOCK,
        }
    }
}

/// Runs one lock method against the element's lock service
///
/// The caller comes from the session; the method returns the Int32 lock
/// status instead of failing for AlreadyLocked, NotLocked and AccessDenied.
pub struct LockMethodHandler {
    service: Arc<LockingService>,
    operation: LockOperation,
}

impl LockMethodHandler {
    pub fn new(service: Arc<LockingService>, operation: LockOperation) -> Self {
        Self { service, operation }
    }
}

#[async_trait]
impl MethodHandler for LockMethodHandler {
    async fn call(&self, context: &CallContext, inputs: &[Variant]) -> DiResult<Vec<Variant>> {
        let caller = &context.caller;
        let result = match self.operation {
            LockOperation::InitLock => {
                let lock_context = match inputs.first() {
                    Some(value) => value.as_str()?,
                    None => "",
                };
                self.service.init_lock(caller, lock_context).await
            }
            LockOperation::RenewLock => self.service.renew_lock(caller).await,
            LockOperation::ExitLock => self.service.exit_lock(caller).await,
            LockOperation::BreakLock => self.service.break_lock(caller).await,
        };
        Ok(vec![Variant::Int32(locking::status_code(result)?)])
    }
}

/// SoftwareUpdate methods, with the machine each one lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperation {
    Prepare,
    Abort,
    InstallSoftwarePackage,
    Resume,
    Confirm,
}

impl UpdateOperation {
    pub const ALL: [UpdateOperation; 5] = [
        UpdateOperation::Prepare,
        UpdateOperation::Abort,
        UpdateOperation::InstallSoftwarePackage,
        UpdateOperation::Resume,
        UpdateOperation::Confirm,
    ];

    pub fn browse_name(self) -> &'static str {
        match self {
            Self::Prepare => names::PREPARE,
            Self::Abort => names::ABORT,
            Self::InstallSoftwarePackage => names::INSTALL_SOFTWARE_PACKAGE,
            Self::Resume => names::RESUME,
            Self::Confirm => names::CONFIRM,
        }
    }

    /// Browse name of the state machine object holding the method
    pub fn machine(self) -> &'static str {
        match self {
            Self::Prepare | Self::Abort => names::PREPARE_FOR_UPDATE,
            Self::InstallSoftwarePackage | Self::Resume => names::INSTALLATION,
            Self::Confirm => names::CONFIRMATION,
        }
    }
}

pub struct UpdateMethodHandler {
    update: Arc<SoftwareUpdate>,
    operation: UpdateOperation,
}

impl UpdateMethodHandler {
    pub fn new(update: Arc<SoftwareUpdate>, operation: UpdateOperation) -> Self {
        Self { update, operation }
    }
}

#[async_trait]
impl MethodHandler for UpdateMethodHandler {
    async fn call(&self, context: &CallContext, inputs: &[Variant]) -> DiResult<Vec<Variant>> {
        log::info!(
            "{} requested by {} on {}",
            self.operation.browse_name(),
            context.caller.client_id,
            context.object_id
        );
        match self.operation {
            UpdateOperation::Prepare => self.update.prepare_for_update.prepare().await?,
            UpdateOperation::Abort => self.update.prepare_for_update.abort().await?,
            UpdateOperation::InstallSoftwarePackage => {
                let package = SoftwarePackage::from_arguments(inputs)?;
                self.update.installation.install(package).await?
            }
            UpdateOperation::Resume => self.update.installation.resume().await?,
            UpdateOperation::Confirm => self.update.confirmation.confirm().await?,
        }
        Ok(Vec::new())
    }
}

/// Lock variable backed by the lock service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockField {
    Locked,
    LockingClient,
    LockingUser,
    RemainingLockTime,
}

impl LockField {
    pub fn from_browse_name(name: &str) -> Option<Self> {
        match name {
            names::LOCKED => Some(Self::Locked),
            names::LOCKING_CLIENT => Some(Self::LockingClient),
            names::LOCKING_USER => Some(Self::LockingUser),
            names::REMAINING_LOCK_TIME => Some(Self::RemainingLockTime),
            _ => None,
        }
    }
}

/// State machine variable backed by the update machines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineField {
    CurrentState,
    PercentComplete,
}

impl MachineField {
    pub fn from_browse_name(name: &str) -> Option<Self> {
        match name {
            names::CURRENT_STATE => Some(Self::CurrentState),
            names::PERCENT_COMPLETE => Some(Self::PercentComplete),
            _ => None,
        }
    }
}

/// Variable whose value is computed on read
#[derive(Clone)]
pub enum LiveValue {
    Lock {
        service: Arc<LockingService>,
        field: LockField,
    },
    UpdateMachine {
        update: Arc<SoftwareUpdate>,
        machine: &'static str,
        field: MachineField,
    },
}

impl LiveValue {
    pub async fn read(&self) -> Variant {
        match self {
            Self::Lock { service, field } => {
                let state = service.state().await;
                match field {
                    LockField::Locked => Variant::Boolean(state.locked),
                    LockField::LockingClient => Variant::String(state.locking_client),
                    LockField::LockingUser => Variant::String(state.locking_user),
                    LockField::RemainingLockTime => {
                        Variant::Double(state.remaining_lock_time.as_secs_f64() * 1000.0)
                    }
                }
            }
            Self::UpdateMachine {
                update,
                machine,
                field,
            } => {
                let Some(machine) = update.machine(machine) else {
                    return Variant::Empty;
                };
                match field {
                    MachineField::CurrentState => {
                        Variant::LocalizedText(machine.state().await.to_localized_text())
                    }
                    MachineField::PercentComplete => Variant::Byte(machine.percent_complete().await),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use di_core::{DiError, NodeId};
    use di_model::locking::{STATUS_ACCESS_DENIED, STATUS_CONFLICT, STATUS_OK};
    use di_model::{CallerIdentity, UpdateState};
    use std::time::Duration;

    fn context(client: &str) -> CallContext {
        CallContext {
            caller: CallerIdentity::new(client, "operator"),
            object_id: NodeId::numeric(2, 10),
            method_id: NodeId::numeric(2, 11),
        }
    }

    fn status(outputs: Vec<Variant>) -> i32 {
        outputs[0].as_i32().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_handlers_report_status_codes() {
        let service = Arc::new(LockingService::new("Pump01/Lock", Duration::from_secs(30)));
        let handler = |op| LockMethodHandler::new(Arc::clone(&service), op);

        let init = handler(LockOperation::InitLock);
        let outputs = init.call(&context("a"), &[Variant::from("maintenance")]).await.unwrap();
        assert_eq!(status(outputs), STATUS_OK);
        assert_eq!(service.state().await.context, "maintenance");

        let outputs = init.call(&context("b"), &[Variant::from("")]).await.unwrap();
        assert_eq!(status(outputs), STATUS_CONFLICT);

        let renew = handler(LockOperation::RenewLock);
        assert_eq!(status(renew.call(&context("b"), &[]).await.unwrap()), STATUS_ACCESS_DENIED);

        let exit = handler(LockOperation::ExitLock);
        assert_eq!(status(exit.call(&context("a"), &[]).await.unwrap()), STATUS_OK);
        assert_eq!(status(exit.call(&context("a"), &[]).await.unwrap()), STATUS_CONFLICT);

        let breaker = handler(LockOperation::BreakLock);
        assert_eq!(status(breaker.call(&context("b"), &[]).await.unwrap()), STATUS_CONFLICT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_live_values() {
        let service = Arc::new(LockingService::new("Pump01/Lock", Duration::from_secs(30)));
        service
            .init_lock(&CallerIdentity::new("a", "alice"), "")
            .await
            .unwrap();
        let live = |field| LiveValue::Lock {
            service: Arc::clone(&service),
            field,
        };
        assert_eq!(live(LockField::Locked).read().await, Variant::Boolean(true));
        assert_eq!(live(LockField::LockingUser).read().await, Variant::from("alice"));
        assert_eq!(
            live(LockField::RemainingLockTime).read().await,
            Variant::Double(30_000.0)
        );
        assert_eq!(LockField::from_browse_name("LockingClient"), Some(LockField::LockingClient));
        assert_eq!(LockField::from_browse_name("InitLock"), None);
    }

    #[tokio::test]
    async fn test_update_handlers_drive_machines() {
        let update = Arc::new(SoftwareUpdate::default());
        let handler = |op| UpdateMethodHandler::new(Arc::clone(&update), op);

        handler(UpdateOperation::Prepare)
            .call(&context("a"), &[])
            .await
            .unwrap();
        assert_eq!(
            update.prepare_for_update.machine().state().await,
            UpdateState::InProgress
        );

        let args = [
            Variant::from("urn:acme"),
            Variant::from("2.0"),
            Variant::Array(Vec::new()),
            Variant::ByteString(vec![1, 2, 3]),
        ];
        handler(UpdateOperation::InstallSoftwarePackage)
            .call(&context("a"), &args)
            .await
            .unwrap();
        assert_eq!(update.installation.machine().state().await, UpdateState::InProgress);

        let err = handler(UpdateOperation::Confirm).call(&context("a"), &[]).await;
        assert!(matches!(err, Err(DiError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_update_live_values() {
        let update = Arc::new(SoftwareUpdate::default());
        update.power_cycle.begin().await.unwrap();
        let current = LiveValue::UpdateMachine {
            update: Arc::clone(&update),
            machine: names::POWER_CYCLE,
            field: MachineField::CurrentState,
        };
        assert_eq!(
            current.read().await,
            Variant::LocalizedText(UpdateState::InProgress.to_localized_text())
        );
        let percent = LiveValue::UpdateMachine {
            update,
            machine: names::POWER_CYCLE,
            field: MachineField::PercentComplete,
        };
        assert_eq!(percent.read().await, Variant::Byte(0));
    }

    #[test]
    fn test_update_operation_machines() {
        assert_eq!(UpdateOperation::Resume.machine(), names::INSTALLATION);
        assert_eq!(UpdateOperation::Abort.machine(), names::PREPARE_FOR_UPDATE);
        assert_eq!(UpdateOperation::ALL.len(), 5);
    }
}
