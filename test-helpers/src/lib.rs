pub mod mock;
pub mod server;

use std::borrow::Borrow;
use std::sync::Arc;
use std::time::Duration;

use client::telemetry::{self, LogFormat};
use client::{ClientContext, Config, CredentialStore, MemoryCredentialStore};
use payloads::ClientError;
use payloads::requests::LoginCredentials;
use reqwest::StatusCode;
use serde_json::Value;
use tracing_log::LogTracer;
use tracing_subscriber::util::SubscriberInitExt;

use crate::mock::DevDataset;
pub use crate::server::{FailureRule, MockState, RecordedRequest};

pub struct TestApp {
    #[allow(unused)]
    pub port: u16,
    pub address: String,
    pub state: Arc<MockState>,
    pub config: Config,
    /// Context shared by the test; use [`TestApp::new_context`] for an
    /// isolated one.
    pub ctx: ClientContext,
    pub dataset: DevDataset,
}

/// Request inspection and fault injection
impl TestApp {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests()
    }

    /// Requests with exactly this method and path (trailing slash ignored).
    pub fn requests_to(
        &self,
        method: &str,
        path: &str,
    ) -> Vec<RecordedRequest> {
        let path = path.trim_end_matches('/');
        self.requests()
            .into_iter()
            .filter(|r| {
                r.method.eq_ignore_ascii_case(method) && r.path == path
            })
            .collect()
    }

    pub fn request_count(&self, method: &str, path: &str) -> usize {
        self.requests_to(method, path).len()
    }

    pub fn clear_requests(&self) {
        self.state.clear_requests();
    }

    /// Fail `method` requests to `collection` whose JSON body has
    /// `field == value`.
    pub fn fail_when(
        &self,
        method: &'static str,
        collection: &str,
        field: &str,
        value: impl Into<Value>,
        status: u16,
    ) {
        self.state.fail_when(FailureRule {
            method,
            collection: collection.to_string(),
            field: field.to_string(),
            value: value.into(),
            status,
        });
    }

    pub fn clear_failures(&self) {
        self.state.clear_failures();
    }

    pub fn override_status(&self, method: &str, path: &str, status: u16) {
        self.state.override_status(method, path, status);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.state.set_latency(latency);
    }
}

/// Client contexts and sessions
impl TestApp {
    /// A context with its own cache and an empty in-memory credential.
    pub fn new_context(&self) -> ClientContext {
        self.context_with_store(Arc::new(MemoryCredentialStore::default()))
    }

    pub fn context_with_store(
        &self,
        store: Arc<dyn CredentialStore>,
    ) -> ClientContext {
        ClientContext::with_store(self.config.clone(), store).unwrap()
    }

    pub async fn login_alice(&self) -> anyhow::Result<()> {
        client::login(&self.ctx, &alice_login_credentials()).await?;
        Ok(())
    }

    pub async fn login_bob(&self) -> anyhow::Result<()> {
        client::login(&self.ctx, &bob_login_credentials()).await?;
        Ok(())
    }
}

pub fn alice_login_credentials() -> LoginCredentials {
    LoginCredentials {
        email: mock::ALICE_EMAIL.into(),
        password: mock::ALICE_PASSWORD.into(),
    }
}

pub fn bob_login_credentials() -> LoginCredentials {
    LoginCredentials {
        email: mock::BOB_EMAIL.into(),
        password: mock::BOB_PASSWORD.into(),
    }
}

/// Short timings so background behavior is observable within a test.
pub fn test_config(api_address: String) -> Config {
    Config {
        api_address,
        token_path: None,
        mutation_reset_delay: Duration::from_millis(300),
        poll_interval: Duration::from_millis(50),
        stale_time: Duration::ZERO,
        window_page_size: 10,
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Start a seeded mock server on a free port, adjusting the client config
/// with `configure` before the shared context is built.
pub async fn spawn_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let subscriber = telemetry::get_subscriber("error", LogFormat::Compact);
    let _ = LogTracer::init();
    let _ = subscriber.try_init();

    let state = Arc::new(MockState::default());
    let dataset = DevDataset::create(&state).unwrap();
    let (server, port) = server::build(state.clone(), "127.0.0.1", 0).unwrap();
    tokio::spawn(server);

    let address = format!("http://127.0.0.1:{port}");
    let mut config = test_config(address.clone());
    configure(&mut config);
    let ctx = ClientContext::with_store(
        config.clone(),
        Arc::new(MemoryCredentialStore::default()),
    )
    .unwrap();

    TestApp {
        port,
        address,
        state,
        config,
        ctx,
        dataset,
    }
}

/// Poll `condition` until it holds, failing after a few seconds.
pub async fn wait_until(
    mut condition: impl FnMut() -> bool,
) -> anyhow::Result<()> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    Ok(())
}

pub fn assert_status_code<T, E: Borrow<ClientError>>(
    result: Result<T, E>,
    expected: StatusCode,
) {
    match result {
        Err(e) => match e.borrow() {
            ClientError::APIError(code, _) => assert_eq!(*code, expected),
            other => panic!("Expected APIError, got {other}"),
        },
        Ok(_) => panic!("Expected APIError"),
    };
}
