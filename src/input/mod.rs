//! Pointer devices, cursor state and focus-routed delivery
//!
//! One cursor entity is shared by every pointer device of the seat. The
//! interaction mode is a small state machine; only `Passthrough` is
//! reachable in this core since the gesture sources that would start a
//! move or resize live outside it. In passthrough, motion resolves the
//! cursor to the configured default glyph and clears pointer focus
//! (surface picking is a collaborator concern).

use log::{debug, info};

use crate::backend::{ClientId, Collaborators, DeviceClass, InputDeviceInfo, SurfaceId, ViewId};
use crate::config::CursorConfig;

/// Which window edges an interactive resize grabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResizeEdges {
    pub top: bool,
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
}

/// Cursor interaction mode. `Moving`/`Resizing` are represented for the
/// gesture layer above this core but never entered here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    Passthrough,
    Moving { view: ViewId },
    Resizing { view: ViewId, edges: ResizeEdges },
}

pub struct CursorCoordinator {
    config: CursorConfig,
    mode: CursorMode,
    position: (f64, f64),
    devices: Vec<InputDeviceInfo>,
}

impl CursorCoordinator {
    pub fn new(config: &CursorConfig) -> Self {
        Self {
            config: config.clone(),
            mode: CursorMode::Passthrough,
            position: (0.0, 0.0),
            devices: Vec::new(),
        }
    }

    pub fn mode(&self) -> CursorMode {
        self.mode
    }

    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Backend reported a new input device. Pointers join the shared
    /// cursor; every other class is ignored (documented gap, like device
    /// removal).
    pub fn handle_new_device(&mut self, collab: &mut Collaborators, device: InputDeviceInfo) {
        match device.class {
            DeviceClass::Pointer => {
                collab.backend.attach_pointer(device.id);
                info!("🖱️ pointer attached: {} ({:?})", device.name, device.id);
                self.devices.push(device);
            }
            other => {
                debug!("ignoring {:?} device {}", other, device.name);
            }
        }
    }

    /// Absolute motion: scale the normalized position into layout space,
    /// warp, then resolve passthrough state.
    pub fn handle_motion_absolute(
        &mut self,
        collab: &mut Collaborators,
        time_msec: u32,
        x: f64,
        y: f64,
    ) {
        let (lx, ly) = collab.layout.absolute_to_layout(x, y);
        collab.backend.warp_cursor(lx, ly);
        self.position = (lx, ly);
        self.process_motion(collab, time_msec);
    }

    /// Relative motion: apply the delta clamped to the layout box.
    pub fn handle_motion(&mut self, collab: &mut Collaborators, time_msec: u32, dx: f64, dy: f64) {
        let (lx, ly) = collab
            .layout
            .clamp(self.position.0 + dx, self.position.1 + dy);
        collab.backend.warp_cursor(lx, ly);
        self.position = (lx, ly);
        self.process_motion(collab, time_msec);
    }

    fn process_motion(&mut self, collab: &mut Collaborators, _time_msec: u32) {
        match self.mode {
            CursorMode::Passthrough => {
                // No surface picking in this core: default glyph, no
                // focused surface to deliver enter/motion to.
                collab
                    .backend
                    .set_cursor_image(&self.config.default_image, self.config.size);
                collab.seat.pointer_clear_focus();
            }
            CursorMode::Moving { .. } | CursorMode::Resizing { .. } => {
                debug!("cursor grab active; passthrough resolution skipped");
            }
        }
    }

    /// A client asked to set the cursor image. Honored only when that
    /// client holds pointer focus; anything else is silently ignored so an
    /// unfocused client cannot change the visible cursor.
    pub fn handle_request_set_cursor(
        &mut self,
        collab: &mut Collaborators,
        client: ClientId,
        surface: Option<SurfaceId>,
        hotspot: (i32, i32),
    ) {
        if collab.seat.focused_pointer_client() == Some(client) {
            collab.backend.set_cursor_surface(surface, hotspot);
        } else {
            debug!("ignoring set_cursor from unfocused client {:?}", client);
        }
    }
}
