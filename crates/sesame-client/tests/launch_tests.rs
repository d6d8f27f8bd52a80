use actix::prelude::*;
use serde_json::json;
use sesame_client::{
    Collaborators, Config, LaunchRequest, Namespace, Page, PageError, PageLauncher,
    ScriptInjector, SessionEvent, Subscribe, Value, launch_with_bus, start_event_bus,
};
use sesame_core::bus::GetMetrics;
use sesame_session::scripts;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;

/// A page that is already logged in.
#[derive(Debug)]
struct LoggedInPage {
    values: HashMap<&'static str, Value>,
    closed: AtomicBool,
}

impl LoggedInPage {
    fn new() -> Self {
        let values = HashMap::from([
            (scripts::PAGE_READY, json!(true)),
            (scripts::CLIENT_VERSION, json!("2.3000.1")),
            (scripts::EARLY_INJECTION_CHECK, json!(true)),
            (scripts::MODULES_LOADED, json!(true)),
            (scripts::INSIDE_CHAT, json!(true)),
            (scripts::VALID_SESSION, json!(true)),
            (scripts::LOCAL_STORAGE, json!(r#"{"WAToken1":"t1","WAToken2":"t2"}"#)),
            (scripts::ACCOUNT_ID, json!("15550001111@c.us")),
        ]);
        Self {
            values,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait::async_trait]
impl Page for LoggedInPage {
    fn id(&self) -> String {
        "logged-in".into()
    }

    async fn evaluate_script(&self, script: &str) -> Result<Value, PageError> {
        if self.is_closed() {
            return Err(PageError::TargetClosed);
        }
        Ok(self.values.get(script).cloned().unwrap_or(Value::Null))
    }

    async fn expose_function(&self, name: &str) -> Result<UnboundedReceiver<Value>, PageError> {
        Err(PageError::NotSupported(name.to_string()))
    }

    async fn browser_version(&self) -> Result<String, PageError> {
        Ok("Test/1.0".into())
    }

    async fn close(&self) -> Result<(), PageError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct OnePage;

#[async_trait::async_trait]
impl PageLauncher for OnePage {
    async fn open(&self, _request: &LaunchRequest) -> Result<Arc<dyn Page>, PageError> {
        Ok(Arc::new(LoggedInPage::new()))
    }
}

struct Collector {
    seen: Arc<Mutex<Vec<SessionEvent>>>,
}

impl Actor for Collector {
    type Context = Context<Self>;
}

impl Handler<SessionEvent> for Collector {
    type Result = ();

    fn handle(&mut self, msg: SessionEvent, _ctx: &mut Context<Self>) {
        self.seen.lock().unwrap().push(msg);
    }
}

#[derive(Message)]
#[rtype(result = "usize")]
struct Count;

impl Handler<Count> for Collector {
    type Result = usize;

    fn handle(&mut self, _msg: Count, _ctx: &mut Context<Self>) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[actix_rt::test]
async fn launch_publishes_to_subscribers() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.session.id = "client".into();
    config.session.session_data_path = Some(dir.path().to_path_buf());
    config.session.screenshot_dir = dir.path().join("screenshots");

    let events = start_event_bus().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let collector = Collector { seen: seen.clone() }.start();
    events
        .send(Subscribe {
            namespace: Some(Namespace::Startup),
            subscriber: collector.clone().recipient(),
        })
        .await
        .unwrap()
        .unwrap();

    let collaborators = Collaborators::new(Arc::new(ScriptInjector::default()));
    let client = launch_with_bus(Arc::new(OnePage), collaborators, config, events)
        .await
        .unwrap();

    assert_eq!(client.session.id(), "client");
    assert_eq!(client.session.credentials().token1.as_deref(), Some("t1"));
    assert!(dir.path().join("client.data.json").exists());
    assert!(client.relaunches.is_none());

    // Drain the bus, then the collector, so every delivery has landed
    let metrics = client.events.send(GetMetrics).await.unwrap();
    assert_eq!(metrics.delivery_errors, 0);
    assert!(collector.send(Count).await.unwrap() > 0);
    let statuses: Vec<_> = seen
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| e.data.as_str().map(str::to_string))
        .collect();
    assert_eq!(statuses.first().map(String::as_str), Some("Starting"));
    assert_eq!(statuses.last().map(String::as_str), Some("SUCCESS"));
}
