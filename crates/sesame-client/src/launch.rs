//! Session launching logic.

use crate::error::ClientError;
use sesame_core::config::{self, Config};
use sesame_core::{ActorEventBus, EventBusActor, logging};
use sesame_interfaces::PageLauncher;
use sesame_session::{Collaborators, HttpQrRelay, Relaunches, Session, SessionBootstrapper};

use actix::prelude::*;
use log::{debug, info};
use std::sync::Arc;

/// A ready session together with the bus its events were published on.
#[derive(Debug)]
pub struct Client {
    pub session: Session,
    pub events: Addr<EventBusActor>,
    /// Sessions relaunched after page crashes, when `restart_on_crash` is set.
    pub relaunches: Option<Relaunches>,
}

/// Starts a supervised event bus actor.
///
/// Must be called from inside a running actix system.
pub fn start_event_bus() -> Result<Addr<EventBusActor>, ClientError> {
    if System::try_current().is_none() {
        return Err(ClientError::ActorSystemError(
            "no running actix system; start one with actix_rt::System or #[actix_rt::main]".into(),
        ));
    }
    let addr = Supervisor::start(|_| EventBusActor::new());
    info!("EventBusActor started at Addr: {:?}", addr);
    Ok(addr)
}

/// Bootstraps a session, publishing its events on a freshly started bus.
///
/// Events published before the caller can subscribe are lost; use
/// [`launch_with_bus`] to subscribe first.
///
/// # Arguments
/// * `launcher` - Opens the pages the bootstrapper drives.
/// * `collaborators` - Injector, patch, license, relay and process hooks.
/// * `config` - Optional pre-loaded configuration. If None, calls `load_config()`.
pub async fn launch(
    launcher: Arc<dyn PageLauncher>,
    collaborators: Collaborators,
    config: Option<Config>,
) -> Result<Client, ClientError> {
    let cfg = match config {
        Some(c) => c,
        None => config::load_config().map_err(ClientError::ConfigError)?,
    };
    init_logging(&cfg);
    let events = start_event_bus()?;
    launch_with_bus(launcher, collaborators, cfg, events).await
}

/// Bootstraps a session, publishing its events on `events`.
pub async fn launch_with_bus(
    launcher: Arc<dyn PageLauncher>,
    collaborators: Collaborators,
    config: Config,
    events: Addr<EventBusActor>,
) -> Result<Client, ClientError> {
    info!("Sesame client starting session '{}'...", config.session.id);
    debug!("Launch configuration: {:?}", config.launch);

    let mut collaborators = collaborators;
    if config.session.qr.relay && collaborators.relay.is_none() {
        info!("Using QR relay at {}", config.session.qr.relay_host);
        collaborators = collaborators.with_relay(Arc::new(HttpQrRelay::new(
            config.session.qr.relay_host.clone(),
        )?));
    }

    let bus = Arc::new(ActorEventBus::new(events.clone()));
    let bootstrapper = SessionBootstrapper::new(launcher, bus, collaborators, config.launch);
    let mut session = bootstrapper.launch(config.session).await?;
    let relaunches = bootstrapper.restart_on_crash(&mut session);

    info!("Sesame client launch sequence complete.");
    Ok(Client {
        session,
        events,
        relaunches,
    })
}

fn init_logging(cfg: &Config) {
    if let Err(e) = logging::setup_logging(&cfg.global.log_level) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }
}
