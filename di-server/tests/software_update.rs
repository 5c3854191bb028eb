use di_core::{DiError, NodeId, QualifiedName, Variant};
use di_model::well_known::{di, names};
use di_model::{SoftwareUpdate, UpdateState};
use di_server::{DiServer, ServerConfig, SessionId};
use std::sync::Arc;
use std::time::Duration;

struct UpdateFixture {
    server: DiServer,
    update_node: NodeId,
    update: Arc<SoftwareUpdate>,
    session: SessionId,
}

impl UpdateFixture {
    async fn new(confirmation_timeout_ms: u64) -> Self {
        let config = ServerConfig {
            confirmation_timeout_ms,
            ..ServerConfig::default()
        };
        let server = DiServer::new(config).unwrap();
        let device_type = server.di_type(di::DEVICE_TYPE).unwrap();
        let device = server
            .create_object(&device_type, "Drive07", &server.objects_folder())
            .await
            .unwrap();
        let update_node = server
            .find_child(&device.node_id, &server.di_name(names::SOFTWARE_UPDATE), true)
            .await
            .unwrap()
            .unwrap()
            .node_id;
        let update = server.software_update(&update_node).await.unwrap();
        let session = server.open_session("engineering-station", "erin").await;
        Self {
            server,
            update_node,
            update,
            session,
        }
    }

    async fn machine_child(&self, machine: &str, child: QualifiedName) -> NodeId {
        let machine = self
            .server
            .find_child(&self.update_node, &self.server.di_name(machine), false)
            .await
            .unwrap()
            .unwrap();
        self.server
            .find_child(&machine.node_id, &child, false)
            .await
            .unwrap()
            .unwrap()
            .node_id
    }

    async fn call(&self, machine: &str, method: &str, inputs: &[Variant]) -> Result<Vec<Variant>, DiError> {
        let method = self.machine_child(machine, self.server.di_name(method)).await;
        self.server.call(self.session, &method, inputs).await
    }

    async fn current_state(&self, machine: &str) -> Variant {
        let node = self
            .machine_child(machine, QualifiedName::new(0, names::CURRENT_STATE))
            .await;
        self.server.read_value(&node).await.unwrap()
    }
}

fn state_text(state: UpdateState) -> Variant {
    Variant::LocalizedText(state.to_localized_text())
}

fn package_arguments(revision: &str) -> Vec<Variant> {
    vec![
        Variant::from("urn:acme:drives"),
        Variant::from(revision),
        Variant::Array(vec![Variant::ByteString(b"KB-17".to_vec())]),
        Variant::ByteString(vec![0xde, 0xad, 0xbe, 0xef]),
    ]
}

#[tokio::test]
async fn machines_and_methods_are_materialized() {
    let f = UpdateFixture::new(300_000).await;
    let machines: Vec<String> = f
        .server
        .browse(&f.update_node)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.browse_name.name)
        .collect();
    assert_eq!(
        machines,
        vec!["PrepareForUpdate", "Installation", "PowerCycle", "Confirmation"]
    );
    for machine in [names::PREPARE_FOR_UPDATE, names::INSTALLATION, names::POWER_CYCLE, names::CONFIRMATION] {
        assert_eq!(f.current_state(machine).await, state_text(UpdateState::Idle));
    }
}

#[tokio::test]
async fn full_update_flow() {
    let f = UpdateFixture::new(300_000).await;

    f.call(names::PREPARE_FOR_UPDATE, names::PREPARE, &[]).await.unwrap();
    assert_eq!(
        f.current_state(names::PREPARE_FOR_UPDATE).await,
        state_text(UpdateState::InProgress)
    );
    f.update.prepare_for_update.machine().complete().await.unwrap();

    f.call(names::INSTALLATION, names::INSTALL_SOFTWARE_PACKAGE, &package_arguments("4.2.0"))
        .await
        .unwrap();
    let package = f.update.installation.package().await.unwrap();
    assert_eq!(package.software_revision, "4.2.0");
    assert_eq!(package.patch_identifiers, vec![b"KB-17".to_vec()]);

    f.update.installation.machine().set_percent_complete(140).await.unwrap();
    let percent = f
        .machine_child(names::INSTALLATION, f.server.di_name(names::PERCENT_COMPLETE))
        .await;
    assert_eq!(f.server.read_value(&percent).await.unwrap(), Variant::Byte(100));
    f.update.installation.machine().complete().await.unwrap();

    f.update.power_cycle.begin().await.unwrap();
    f.update.power_cycle.complete().await.unwrap();

    f.update.confirmation.begin().await.unwrap();
    f.call(names::CONFIRMATION, names::CONFIRM, &[]).await.unwrap();
    assert_eq!(
        f.current_state(names::CONFIRMATION).await,
        state_text(UpdateState::Completed)
    );

    f.update.reset().await.unwrap();
    assert_eq!(
        f.current_state(names::INSTALLATION).await,
        state_text(UpdateState::Idle)
    );
}

#[tokio::test]
async fn failed_installation_can_be_resumed_or_aborted() {
    let f = UpdateFixture::new(300_000).await;

    let err = f.call(names::INSTALLATION, names::RESUME, &[]).await;
    assert!(matches!(err, Err(DiError::InvalidState(_))));

    f.call(names::INSTALLATION, names::INSTALL_SOFTWARE_PACKAGE, &package_arguments("4.2.1"))
        .await
        .unwrap();
    f.update.installation.machine().fail("flash write error").await.unwrap();
    f.call(names::INSTALLATION, names::RESUME, &[]).await.unwrap();
    assert_eq!(
        f.current_state(names::INSTALLATION).await,
        state_text(UpdateState::InProgress)
    );

    f.update.installation.abort().await.unwrap();
    assert!(f.update.installation.package().await.is_none());
}

#[tokio::test]
async fn malformed_package_is_rejected() {
    let f = UpdateFixture::new(300_000).await;
    let mut arguments = package_arguments("4.2.0");
    arguments[3] = Variant::from("not-a-hash");
    let err = f
        .call(names::INSTALLATION, names::INSTALL_SOFTWARE_PACKAGE, &arguments)
        .await;
    assert!(matches!(err, Err(DiError::BadArgument(_))));

    let err = f
        .call(names::INSTALLATION, names::INSTALL_SOFTWARE_PACKAGE, &package_arguments(""))
        .await;
    assert!(matches!(err, Err(DiError::BadArgument(_))));
    assert_eq!(
        f.current_state(names::INSTALLATION).await,
        state_text(UpdateState::Idle)
    );
}

#[tokio::test(start_paused = true)]
async fn late_confirmation_fails_the_machine() {
    let f = UpdateFixture::new(60_000).await;
    f.update.confirmation.begin().await.unwrap();

    tokio::time::sleep(Duration::from_secs(61)).await;
    let err = f.call(names::CONFIRMATION, names::CONFIRM, &[]).await;
    assert!(matches!(err, Err(DiError::Timeout)));
    assert_eq!(
        f.current_state(names::CONFIRMATION).await,
        state_text(UpdateState::Failed)
    );
}

#[tokio::test]
async fn state_variables_are_read_only() {
    let f = UpdateFixture::new(300_000).await;
    let state = f
        .machine_child(names::PREPARE_FOR_UPDATE, QualifiedName::new(0, names::CURRENT_STATE))
        .await;
    let err = f
        .server
        .write_value(f.session, &state, state_text(UpdateState::Completed))
        .await;
    assert!(matches!(err, Err(DiError::AccessDenied(_))));
}
