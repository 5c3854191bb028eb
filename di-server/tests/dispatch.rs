use async_trait::async_trait;
use di_core::{DataType, DiError, DiResult, NodeId, QualifiedName, Variant};
use di_model::locking::STATUS_OK;
use di_model::well_known::{di, names};
use di_model::{Argument, MethodSignature};
use di_server::{CallContext, DiServer, MethodHandler, Node, ServerConfig};
use mockall::mock;
use std::sync::Arc;

mock! {
    pub Handler {}

    #[async_trait]
    impl MethodHandler for Handler {
        async fn call(&self, context: &CallContext, inputs: &[Variant]) -> DiResult<Vec<Variant>>;
    }
}

struct Fixture {
    server: DiServer,
    device: NodeId,
    calibrate: NodeId,
}

/// Device with a `Calibrate(Offset: Double, Gain: Double) -> Applied: Boolean` method
async fn fixture() -> Fixture {
    let server = DiServer::new(ServerConfig::default()).unwrap();
    let device_type = server.di_type(di::DEVICE_TYPE).unwrap();
    let device = server
        .create_object(&device_type, "Pump01", &server.objects_folder())
        .await
        .unwrap()
        .node_id;
    let signature = MethodSignature {
        input_arguments: vec![
            Argument::new("Offset", DataType::Double),
            Argument::new("Gain", DataType::Double),
        ],
        output_arguments: vec![Argument::new("Applied", DataType::Boolean)],
    };
    let calibrate = server
        .address_space()
        .add_child(
            &device,
            Node::method(QualifiedName::new(server.namespace_index(), "Calibrate"), signature),
        )
        .await
        .unwrap()
        .node_id;
    Fixture {
        server,
        device,
        calibrate,
    }
}

#[tokio::test]
async fn handler_receives_caller_and_inputs() {
    let f = fixture().await;
    let mut handler = MockHandler::new();
    let device = f.device.clone();
    handler
        .expect_call()
        .withf(move |ctx, inputs| {
            ctx.caller.client_id == "client-a"
                && ctx.caller.user_id == "alice"
                && ctx.object_id == device
                && inputs == [Variant::Double(0.5), Variant::Double(1.25)]
        })
        .times(1)
        .returning(|_, _| Ok(vec![Variant::Boolean(true)]));
    f.server
        .dispatcher()
        .register(f.calibrate.clone(), Arc::new(handler))
        .await;

    let session = f.server.open_session("client-a", "alice").await;
    let outputs = f
        .server
        .call(session, &f.calibrate, &[Variant::Double(0.5), Variant::Double(1.25)])
        .await
        .unwrap();
    assert_eq!(outputs, vec![Variant::Boolean(true)]);
}

#[tokio::test]
async fn missing_argument_is_rejected_before_the_handler() {
    let f = fixture().await;
    let mut handler = MockHandler::new();
    handler.expect_call().times(0);
    f.server
        .dispatcher()
        .register(f.calibrate.clone(), Arc::new(handler))
        .await;

    let session = f.server.open_session("client-a", "alice").await;
    let err = f
        .server
        .call(session, &f.calibrate, &[Variant::Double(0.5)])
        .await;
    assert!(matches!(err, Err(DiError::BadArgument(_))));
    assert_eq!(err.unwrap_err().status_code(), di_core::StatusCode::BAD_INVALID_ARGUMENT);
}

#[tokio::test]
async fn handler_errors_are_passed_through() {
    let f = fixture().await;
    let mut handler = MockHandler::new();
    handler
        .expect_call()
        .returning(|_, _| Err(DiError::InvalidState("sensor offline".to_string())));
    f.server
        .dispatcher()
        .register(f.calibrate.clone(), Arc::new(handler))
        .await;

    let session = f.server.open_session("client-a", "alice").await;
    let err = f
        .server
        .call(session, &f.calibrate, &[Variant::Double(0.5), Variant::Double(1.0)])
        .await;
    assert!(matches!(err, Err(DiError::InvalidState(_))));
}

#[tokio::test]
async fn unbound_method_is_not_implemented() {
    let f = fixture().await;
    let session = f.server.open_session("client-a", "alice").await;
    let err = f
        .server
        .call(session, &f.calibrate, &[Variant::Double(0.5), Variant::Double(1.0)])
        .await;
    assert!(matches!(err, Err(DiError::NotImplemented(_))));
}

#[tokio::test]
async fn locked_element_denies_other_callers() {
    let f = fixture().await;
    let mut handler = MockHandler::new();
    handler
        .expect_call()
        .times(1)
        .returning(|_, _| Ok(vec![Variant::Boolean(true)]));
    f.server
        .dispatcher()
        .register(f.calibrate.clone(), Arc::new(handler))
        .await;

    let lock = f
        .server
        .find_child(&f.device, &f.server.di_name(names::LOCK), true)
        .await
        .unwrap()
        .unwrap();
    let init = f
        .server
        .find_child(&lock.node_id, &f.server.di_name(names::INIT_LOCK), false)
        .await
        .unwrap()
        .unwrap();

    let owner = f.server.open_session("client-a", "alice").await;
    let other = f.server.open_session("client-b", "bob").await;
    let outputs = f
        .server
        .call(owner, &init.node_id, &[Variant::from("calibration")])
        .await
        .unwrap();
    assert_eq!(outputs, vec![Variant::Int32(STATUS_OK)]);

    let inputs = [Variant::Double(0.5), Variant::Double(1.0)];
    let err = f.server.call(other, &f.calibrate, &inputs).await;
    assert!(matches!(err, Err(DiError::AccessDenied(_))));
    f.server.call(owner, &f.calibrate, &inputs).await.unwrap();
}

#[tokio::test]
async fn unknown_session_is_rejected() {
    let f = fixture().await;
    let session = f.server.open_session("client-a", "alice").await;
    f.server.close_session(session).await.unwrap();
    let err = f
        .server
        .call(session, &f.calibrate, &[Variant::Double(0.5), Variant::Double(1.0)])
        .await;
    assert!(matches!(err, Err(DiError::NotFound(_))));
}
