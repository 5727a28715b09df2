mod common;

use common::within;
use orbit::testing::{TestContainerHostWithExternalState, TestError, TestOptions};
use orbit::{Container, ContainerHost, ContainerHostWithExternalState, ExternalStateContainer, Settings};

#[derive(Debug, Clone, PartialEq)]
struct Form {
    email: String,
    touched: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct FormView {
    valid: bool,
}

struct FormHost {
    external: ExternalStateContainer<Form, FormView, ()>,
}

impl FormHost {
    fn new() -> Self {
        let container = Container::new(
            Form {
                email: String::new(),
                touched: false,
            },
            Settings::default(),
        )
        .expect("runtime");
        let external = container.with_external_state(|form: &Form| FormView {
            valid: form.email.contains('@'),
        });
        Self { external }
    }

    fn type_email(&self, email: &'static str) -> orbit::IntentJob {
        self.intent(move |ctx| async move {
            ctx.reduce(move |form| Form {
                email: email.to_string(),
                touched: true,
            })
            .await?;
            anyhow::Ok(())
        })
        .expect("dispatch")
    }
}

impl ContainerHost for FormHost {
    type State = Form;
    type SideEffect = ();

    fn container(&self) -> &Container<Form, ()> {
        self.external.container()
    }
}

impl ContainerHostWithExternalState for FormHost {
    type ExternalState = FormView;

    fn external_container(&self) -> &ExternalStateContainer<Form, FormView, ()> {
        &self.external
    }
}

/// The external view follows internal commits and skips repeats.
#[tokio::test]
async fn test_external_state_stream_is_distinct() {
    let host = FormHost::new();
    let mut views = host.external_container().external_state_stream();
    assert_eq!(within(views.next()).await, Some(FormView { valid: false }));

    within(host.type_email("a").join()).await.expect("typed");
    within(host.type_email("a@b").join()).await.expect("typed");
    within(host.type_email("a@bc").join()).await.expect("typed");

    assert_eq!(within(views.next()).await, Some(FormView { valid: true }));
    assert_eq!(host.external_state(), FormView { valid: true });
    assert!(host.container().state().touched);

    host.container().cancel();
    assert_eq!(within(views.next()).await, None);
}

/// Test sessions assert on the projection and skip states that do not change it.
#[tokio::test]
async fn test_external_session_sees_distinct_projections() {
    let host = FormHost::new();
    let mut session = host.test_external(TestOptions::new()).expect("test mode");

    host.type_email("a");
    host.type_email("a@b");
    host.type_email("a@bc");

    session
        .expect_initial_external_state()
        .await
        .expect("initial view");
    session
        .expect_external_state(|view| FormView { valid: !view.valid })
        .await
        .expect("became valid");
    session.finish().await.expect("remaining state has the same view");
}

/// A projection that differs from the expected one is reported as such.
#[tokio::test]
async fn test_external_session_reports_mismatch() {
    let host = FormHost::new();
    let mut session = host
        .test_external(TestOptions::new().initial_state(Form {
            email: "x@y".into(),
            touched: false,
        }))
        .expect("test mode");

    let err = session
        .expect_external_state_eq(FormView { valid: false })
        .await
        .expect_err("initial view is valid");
    assert!(matches!(err, TestError::Mismatch { .. }));
    assert_eq!(
        err.to_string(),
        "Expected ExternalState(FormView { valid: false }) but got ExternalState(FormView { valid: true })"
    );
    session.cancel_and_ignore_remaining_items();
}
