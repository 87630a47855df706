//! Event loop wiring
//!
//! This module owns the single calloop dispatch loop. Collaborator events
//! arrive on one channel and are handed to [`Server::dispatch`] in
//! arrival order; when the backend has no hardware vsync, a re-arming
//! timer stands in for it and raises one frame event per tracked output
//! per tick. SIGINT/SIGTERM stop the loop, after which the server drains
//! every live entity before the display goes away.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use calloop::channel::{self, Channel};
use calloop::timer::{TimeoutAction, Timer};
use calloop::EventLoop;
use log::{info, warn};

use crate::backend::{BackendStartError, Collaborators, Event};
use crate::config::Config;
use crate::server::Server;

/// How long the loop sleeps between client housekeeping passes when no
/// event is pending.
const IDLE_TIMEOUT: Duration = Duration::from_millis(16);

pub struct Compositor {
    event_loop: EventLoop<'static, Server>,
    server: Server,
}

impl Compositor {
    /// Wire the server and its event sources together. Failures here are
    /// fatal setup errors.
    pub fn new(config: Config, collab: Collaborators, events: Channel<Event>) -> Result<Self> {
        let event_loop: EventLoop<Server> =
            EventLoop::try_new().context("failed to create event loop")?;
        let handle = event_loop.handle();

        let mut server = Server::new(config, collab)?;
        server.set_loop_signal(event_loop.get_signal());

        handle
            .insert_source(events, |event, _, server: &mut Server| match event {
                channel::Event::Msg(event) => server.dispatch(event),
                channel::Event::Closed => {
                    info!("event channel closed; stopping");
                    server.request_exit();
                }
            })
            .map_err(|e| anyhow::anyhow!("failed to register event channel: {}", e))?;

        if let Some(interval) = server.collab.backend.vsync_interval() {
            handle
                .insert_source(
                    Timer::from_duration(interval),
                    move |_deadline: Instant, _, server: &mut Server| {
                        for output in server.outputs.ids() {
                            server.dispatch(Event::OutputFrame { output });
                        }
                        TimeoutAction::ToDuration(interval)
                    },
                )
                .map_err(|e| anyhow::anyhow!("failed to register frame timer: {}", e))?;
        }

        Ok(Self { event_loop, server })
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Publish the socket and start the backend — the last two steps of
    /// the startup sequence. A backend start failure is recoverable at
    /// the process level: the caller releases everything by dropping the
    /// compositor and exits non-zero.
    pub fn start(&mut self) -> Result<(), StartError> {
        self.server.publish_socket().map_err(StartError::Setup)?;
        self.server.start_backend().map_err(StartError::Backend)?;
        Ok(())
    }

    /// Run the dispatch loop until a termination signal or channel close,
    /// then drain the server.
    pub fn run(self) -> Result<()> {
        let Self {
            mut event_loop,
            mut server,
        } = self;

        let signal = event_loop.get_signal();
        if let Err(e) = ctrlc::set_handler(move || {
            signal.stop();
            signal.wakeup();
        }) {
            warn!("failed to install signal handler: {}", e);
        }

        info!("🎬 entering dispatch loop");
        event_loop
            .run(Some(IDLE_TIMEOUT), &mut server, |server| {
                server.flush_clients();
            })
            .context("event loop error")?;

        server.shutdown();
        Ok(())
    }
}

/// Startup failures after context creation, split by recovery tier.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error(transparent)]
    Setup(anyhow::Error),
    #[error(transparent)]
    Backend(#[from] BackendStartError),
}
