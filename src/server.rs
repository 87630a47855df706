//! Server context: single owner of all compositor state
//!
//! One `Server` exists per process. It owns the Wayland display and
//! listening socket, the subscription registry, the three managers and
//! the collaborator boxes, and it is the single dispatch point for every
//! event the collaborators raise. All mutation happens on the one thread
//! driving [`Server::dispatch`], so no locking exists anywhere in here.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use calloop::LoopSignal;
use log::{debug, info, warn};
use wayland_server::backend::{ClientId as WlClientId, DisconnectReason};
use wayland_server::{backend::ClientData, Display, ListeningSocket};

use crate::backend::{BackendStartError, Collaborators, Event};
use crate::config::Config;
use crate::input::CursorCoordinator;
use crate::output::OutputManager;
use crate::subscription::{EventKind, Registry, Route, Source};
use crate::view::ViewManager;

/// Dispatch state for the Wayland display. No globals are bound in this
/// core; the windowing protocol lives in a collaborator.
pub struct DisplayState;

struct ClientState;

impl ClientData for ClientState {
    fn initialized(&self, _client: WlClientId) {
        debug!("client initialized");
    }
    fn disconnected(&self, _client: WlClientId, _reason: DisconnectReason) {
        debug!("client disconnected");
    }
}

pub struct Server {
    pub config: Config,
    pub registry: Registry<Route>,
    pub outputs: OutputManager,
    pub views: ViewManager,
    pub cursor: CursorCoordinator,
    pub collab: Collaborators,

    display: Display<DisplayState>,
    display_state: DisplayState,
    socket: Option<ListeningSocket>,
    socket_name: Option<String>,

    started: Instant,
    signal: Option<LoopSignal>,
}

impl Server {
    /// Build the server context. Failures here are the fatal tier: no
    /// display means no compositor.
    pub fn new(config: Config, collab: Collaborators) -> Result<Self> {
        let display = Display::new().context("failed to create Wayland display")?;
        let cursor = CursorCoordinator::new(&config.cursor);
        info!("🏗️ server context created");
        Ok(Self {
            config,
            registry: Registry::new(),
            outputs: OutputManager::new(),
            views: ViewManager::new(),
            cursor,
            collab,
            display,
            display_state: DisplayState,
            socket: None,
            socket_name: None,
            started: Instant::now(),
            signal: None,
        })
    }

    pub fn set_loop_signal(&mut self, signal: LoopSignal) {
        self.signal = Some(signal);
    }

    pub fn socket_name(&self) -> Option<&str> {
        self.socket_name.as_deref()
    }

    /// Bind the listening socket and export its name for child clients.
    pub fn publish_socket(&mut self) -> Result<String> {
        let socket = ListeningSocket::bind_auto(&self.config.general.socket_prefix, 1..32)
            .context("failed to bind Wayland socket")?;
        let name = socket
            .socket_name()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("listening socket has no name"))?;
        std::env::set_var("WAYLAND_DISPLAY", &name);
        info!("✅ Wayland socket created: {}", name);
        self.socket = Some(socket);
        self.socket_name = Some(name.clone());
        Ok(name)
    }

    /// Start the backend. The one recoverable startup error: callers
    /// release resources and exit non-zero instead of aborting.
    pub fn start_backend(&mut self) -> Result<(), BackendStartError> {
        self.collab.backend.start()
    }

    /// Route one collaborator event. Subscription-bound events go through
    /// the registry, so anything raised for an already-retired entity is
    /// dropped here.
    pub fn dispatch(&mut self, event: Event) {
        match event {
            Event::NewOutput { output, modes } => {
                self.outputs
                    .handle_new_output(&mut self.registry, &mut self.collab, output, &modes);
            }
            Event::OutputFrame { output } => {
                for route in self.registry.routes(Source::Output(output), EventKind::Frame) {
                    self.run_route(route);
                }
            }
            Event::OutputDestroyed { output } => {
                for route in self
                    .registry
                    .routes(Source::Output(output), EventKind::Destroy)
                {
                    self.run_route(route);
                }
            }
            Event::NewInput { device } => {
                self.cursor.handle_new_device(&mut self.collab, device);
            }
            Event::CursorMotionAbsolute { time_msec, x, y } => {
                self.cursor
                    .handle_motion_absolute(&mut self.collab, time_msec, x, y);
            }
            Event::CursorMotion { time_msec, dx, dy } => {
                self.cursor.handle_motion(&mut self.collab, time_msec, dx, dy);
            }
            Event::NewSurface { surface } => {
                self.views
                    .handle_new_surface(&mut self.registry, &mut self.collab, surface);
            }
            Event::SurfaceDestroyed { surface } => {
                for route in self
                    .registry
                    .routes(Source::Surface(surface), EventKind::Destroy)
                {
                    self.run_route(route);
                }
            }
            Event::RequestSetCursor {
                client,
                surface,
                hotspot,
            } => {
                self.cursor
                    .handle_request_set_cursor(&mut self.collab, client, surface, hotspot);
            }
            Event::ShutdownRequested => {
                info!("📨 shutdown requested");
                self.request_exit();
            }
        }
    }

    fn run_route(&mut self, route: Route) {
        match route {
            Route::OutputFrame(id) => {
                let now = self.started.elapsed();
                self.outputs.handle_frame(&mut self.collab, id, now);
            }
            Route::OutputDestroy(id) => {
                self.outputs
                    .handle_destroyed(&mut self.registry, &mut self.collab, id);
            }
            Route::ViewDestroy(id) => {
                self.views.handle_destroyed(&mut self.registry, id);
            }
        }
    }

    /// Accept pending clients, dispatch their requests and flush. Called
    /// once per loop iteration.
    pub fn flush_clients(&mut self) {
        if let Some(socket) = self.socket.as_mut() {
            match socket.accept() {
                Ok(Some(stream)) => {
                    match self
                        .display
                        .handle()
                        .insert_client(stream, Arc::new(ClientState))
                    {
                        Ok(_) => info!("🔌 client connected"),
                        Err(e) => warn!("failed to register client: {}", e),
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("socket accept error: {}", e),
            }
        }
        if let Err(e) = self.display.dispatch_clients(&mut self.display_state) {
            warn!("client dispatch error: {}", e);
        }
        if let Err(e) = self.display.flush_clients() {
            debug!("client flush error: {}", e);
        }
    }

    pub fn request_exit(&mut self) {
        if let Some(signal) = &self.signal {
            signal.stop();
            signal.wakeup();
        }
    }

    /// Drain every live entity through its normal destroy path, then stop
    /// accepting clients. Runs before the display drops so no teardown is
    /// skipped on exit.
    pub fn shutdown(&mut self) {
        info!("🔽 shutting down: draining live entities...");
        for id in self.views.ids() {
            self.views.handle_destroyed(&mut self.registry, id);
        }
        for id in self.outputs.ids() {
            self.outputs
                .handle_destroyed(&mut self.registry, &mut self.collab, id);
        }
        debug_assert_eq!(self.registry.subscription_count(), 0);

        self.socket = None;
        let _ = self.display.flush_clients();
        info!("✅ shutdown complete");
    }
}
