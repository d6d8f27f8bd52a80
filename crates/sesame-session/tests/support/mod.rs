#![allow(dead_code)]

use serde_json::{Value, json};
use sesame_core::{CoreError, EventBus, Namespace, SessionConfig, SessionEvent};
use sesame_interfaces::{
    ConsoleLogLevel, ConsoleMessage, LaunchRequest, Page, PageError, PageEvent, PageLauncher,
    ScreenshotFormat, ScreenshotOptions,
};
use sesame_session::{
    Collaborators, CollaboratorError, ProcessControl, QrRelay, ScriptInjector, scripts,
};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub const EARLY_BUNDLE: &str = "/* early api bundle */";
pub const LATE_BUNDLE: &str = "/* late api bundle */";

#[derive(Debug, Default)]
struct Scripted {
    values: HashMap<String, Value>,
    hooks: HashMap<String, Vec<(String, Value)>>,
    evaluated: Vec<String>,
}

/// A page whose scripts evaluate to canned values. Unknown scripts yield `null`.
#[derive(Debug)]
pub struct FakePage {
    id: String,
    scripted: Mutex<Scripted>,
    closed: AtomicBool,
    challenge_tx: UnboundedSender<Value>,
    challenge_rx: Mutex<Option<UnboundedReceiver<Value>>>,
    screenshots: AtomicUsize,
    subscribers: Mutex<Vec<UnboundedSender<PageEvent>>>,
    backlog: Mutex<Vec<PageEvent>>,
}

impl FakePage {
    pub fn new(id: &str) -> Arc<Self> {
        let (challenge_tx, challenge_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            id: id.to_string(),
            scripted: Mutex::new(Scripted::default()),
            closed: AtomicBool::new(false),
            challenge_tx,
            challenge_rx: Mutex::new(Some(challenge_rx)),
            screenshots: AtomicUsize::new(0),
            subscribers: Mutex::default(),
            backlog: Mutex::default(),
        })
    }

    /// A page that loads, accepts the early injection and settles its probes.
    pub fn ready(id: &str) -> Arc<Self> {
        let page = Self::new(id);
        page.set(scripts::PAGE_READY, json!(true));
        page.set(scripts::CLIENT_VERSION, json!("2.3000.1"));
        page.set(scripts::USER_AGENT, json!("Mozilla/5.0 FakeBrowser"));
        page.set(scripts::EARLY_INJECTION_CHECK, json!(true));
        page.set(scripts::MODULES_LOADED, json!(true));
        page
    }

    /// A ready page that is already inside the chat UI with a valid store.
    pub fn authenticated(id: &str) -> Arc<Self> {
        let page = Self::ready(id);
        page.set(scripts::INSIDE_CHAT, json!(true));
        page.set(scripts::VALID_SESSION, json!(true));
        page.set(
            scripts::LOCAL_STORAGE,
            json!(r#"{"WABrowserId":"\"browser\"","WASecretBundle":"bundle","WAToken1":"t1","WAToken2":"t2","unrelated":"x"}"#),
        );
        page.set(scripts::ACCOUNT_ID, json!("447700900123@c.us"));
        page.set(scripts::EARLY_ACCOUNT_ID, json!("447700900123@c.us"));
        page
    }

    pub fn set(&self, script: &str, value: Value) {
        self.scripted
            .lock()
            .unwrap()
            .values
            .insert(script.to_string(), value);
    }

    /// Sets `script` to `value` once `trigger` has been evaluated.
    pub fn on_evaluate(&self, trigger: &str, script: &str, value: Value) {
        self.scripted
            .lock()
            .unwrap()
            .hooks
            .entry(trigger.to_string())
            .or_default()
            .push((script.to_string(), value));
    }

    /// Posts a payload to the exposed QR binding.
    pub fn post_challenge(&self, payload: &str) {
        self.challenge_tx.send(json!(payload)).unwrap();
    }

    /// Delivers `event` to every subscriber, present and future, as soon as
    /// it subscribes.
    pub fn queue_event(&self, event: PageEvent) {
        self.backlog.lock().unwrap().push(event.clone());
        self.emit(event);
    }

    /// Delivers `event` to the current subscribers.
    pub fn emit(&self, event: PageEvent) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn evaluations(&self, script: &str) -> usize {
        self.scripted
            .lock()
            .unwrap()
            .evaluated
            .iter()
            .filter(|s| s.as_str() == script)
            .count()
    }

    pub fn screenshots_taken(&self) -> usize {
        self.screenshots.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Page for FakePage {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn evaluate_script(&self, script: &str) -> Result<Value, PageError> {
        if self.is_closed() {
            return Err(PageError::TargetClosed);
        }
        let mut scripted = self.scripted.lock().unwrap();
        scripted.evaluated.push(script.to_string());
        if let Some(hooks) = scripted.hooks.remove(script) {
            for (target, value) in hooks {
                scripted.values.insert(target, value);
            }
        }
        Ok(scripted.values.get(script).cloned().unwrap_or(Value::Null))
    }

    async fn expose_function(&self, _name: &str) -> Result<UnboundedReceiver<Value>, PageError> {
        self.challenge_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| PageError::InternalError("binding already exposed".into()))
    }

    async fn browser_version(&self) -> Result<String, PageError> {
        Ok("FakeBrowser/1.0".into())
    }

    async fn take_screenshot(
        &self,
        _format: ScreenshotFormat,
        _options: ScreenshotOptions,
    ) -> Result<Vec<u8>, PageError> {
        self.screenshots.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0xff, 0xd8, 0xff, 0xd9])
    }

    async fn subscribe_events(&self) -> Result<UnboundedReceiver<PageEvent>, PageError> {
        if self.is_closed() {
            return Err(PageError::TargetClosed);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        for event in self.backlog.lock().unwrap().iter() {
            let _ = tx.send(event.clone());
        }
        self.subscribers.lock().unwrap().push(tx);
        Ok(rx)
    }

    async fn close(&self) -> Result<(), PageError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub fn console_error(text: &str) -> PageEvent {
    PageEvent::Console(ConsoleMessage {
        level: ConsoleLogLevel::Error,
        text: text.to_string(),
    })
}

/// Hands out queued pages in order and records every request.
#[derive(Debug, Default)]
pub struct FakeLauncher {
    pages: Mutex<VecDeque<Arc<FakePage>>>,
    requests: Mutex<Vec<LaunchRequest>>,
}

impl FakeLauncher {
    pub fn with_pages(pages: Vec<Arc<FakePage>>) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(pages.into()),
            requests: Mutex::default(),
        })
    }

    pub fn requests(&self) -> Vec<LaunchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PageLauncher for FakeLauncher {
    async fn open(&self, request: &LaunchRequest) -> Result<Arc<dyn Page>, PageError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.pages.lock().unwrap().pop_front() {
            Some(page) => Ok(page),
            None => Err(PageError::LaunchError("no more pages".into())),
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingBus {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingBus {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn in_namespace(&self, namespace: Namespace) -> Vec<SessionEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.namespace == namespace)
            .collect()
    }

    pub fn tagged(&self, namespace: Namespace, tag: &str) -> Vec<SessionEvent> {
        self.in_namespace(namespace)
            .into_iter()
            .filter(|e| e.tag.as_deref() == Some(tag))
            .collect()
    }

    /// Status texts published on the startup namespace, in order.
    pub fn statuses(&self) -> Vec<String> {
        self.in_namespace(Namespace::Startup)
            .into_iter()
            .filter(|e| e.tag.is_none())
            .filter_map(|e| e.data.as_str().map(str::to_string))
            .collect()
    }
}

impl EventBus for RecordingBus {
    fn publish(&self, event: SessionEvent) -> Result<(), CoreError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingProcess {
    exits: Mutex<Vec<String>>,
}

impl RecordingProcess {
    pub fn exits(&self) -> Vec<String> {
        self.exits.lock().unwrap().clone()
    }
}

impl ProcessControl for RecordingProcess {
    fn exit(&self, reason: &str) {
        self.exits.lock().unwrap().push(reason.to_string());
    }
}

/// Returns `hash-<n>` for the n-th upload.
#[derive(Debug, Default)]
pub struct CountingRelay {
    uploads: Mutex<Vec<(String, String)>>,
}

impl CountingRelay {
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl QrRelay for CountingRelay {
    async fn upload(&self, image: &str, hash: &str) -> Result<String, CollaboratorError> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((image.to_string(), hash.to_string()));
        Ok(format!("hash-{}", uploads.len()))
    }

    fn share_url(&self, hash: &str) -> String {
        format!("https://relay.test/{}", hash)
    }
}

pub fn collaborators(process: Arc<RecordingProcess>) -> Collaborators {
    Collaborators::new(Arc::new(ScriptInjector {
        early: EARLY_BUNDLE.into(),
        late: LATE_BUNDLE.into(),
        event_hooks: None,
    }))
    .with_process(process)
}

/// A session config that keeps every file under `dir`.
pub fn session_config(dir: &Path) -> SessionConfig {
    SessionConfig {
        id: "test".into(),
        session_data_path: Some(dir.join("sessions")),
        screenshot_dir: dir.join("screenshots"),
        ..Default::default()
    }
}
