//! Collaborator contracts for the compositor core
//!
//! The core never talks to hardware, the scene graph, or the wire protocol
//! directly. Everything it consumes arrives as an [`Event`] on a single
//! ordered channel, and everything it produces goes through the narrow
//! traits below. Real backends (DRM, nested, ...) live behind these traits;
//! the `headless` module provides the reference implementation used by the
//! default binary and by the test suite.

use std::time::Duration;

use thiserror::Error;

pub mod headless;

/// Identity of a backend output (one connected display).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputId(pub u64);

/// Identity of a protocol surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Identity of a node in the scene collaborator's render tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

/// Identity of an input device reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u64);

/// Identity of a connected client, as the seat collaborator sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub u64);

/// Identity of a tracked top-level window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(pub u64);

/// A display mode advertised by an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    pub width: i32,
    pub height: i32,
    /// Refresh rate in mHz.
    pub refresh: i32,
}

/// Device classes the backend can report. Only pointers are attached in
/// this core; the rest are documented gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Pointer,
    Keyboard,
    Touch,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputDeviceInfo {
    pub id: DeviceId,
    pub class: DeviceClass,
    pub name: String,
}

/// The two window roles the windowing protocol exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRole {
    Toplevel,
    Popup { parent: SurfaceId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceInfo {
    pub id: SurfaceId,
    pub role: SurfaceRole,
}

/// Everything the collaborators can tell the core, in arrival order.
///
/// All sources feed one channel so the core never reorders or batches
/// across them.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    NewOutput { output: OutputId, modes: Vec<Mode> },
    OutputFrame { output: OutputId },
    OutputDestroyed { output: OutputId },
    NewInput { device: InputDeviceInfo },
    CursorMotionAbsolute { time_msec: u32, x: f64, y: f64 },
    CursorMotion { time_msec: u32, dx: f64, dy: f64 },
    NewSurface { surface: SurfaceInfo },
    SurfaceDestroyed { surface: SurfaceId },
    RequestSetCursor {
        client: ClientId,
        surface: Option<SurfaceId>,
        hotspot: (i32, i32),
    },
    ShutdownRequested,
}

/// Backend start failure. Recoverable at the process level: release what
/// was acquired and exit non-zero instead of aborting.
#[derive(Debug, Error)]
#[error("backend failed to start: {0}")]
pub struct BackendStartError(pub String);

/// The backend rejected a mode commit. The affected output is skipped,
/// the rest keep running.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("mode commit rejected by the backend")]
    Rejected,
}

/// Command surface of the hardware backend.
pub trait Backend {
    fn start(&mut self) -> Result<(), BackendStartError>;

    /// `Some(interval)` when the core must drive frame events on a timer
    /// (headless backends have no hardware vsync). `None` when the backend
    /// raises `OutputFrame` itself.
    fn vsync_interval(&self) -> Option<Duration>;

    fn enable_output(&mut self, output: OutputId);
    fn commit_mode(&mut self, output: OutputId, mode: Mode) -> Result<(), CommitError>;

    fn attach_pointer(&mut self, device: DeviceId);
    fn warp_cursor(&mut self, x: f64, y: f64);
    fn set_cursor_image(&mut self, name: &str, size: u32);
    fn set_cursor_surface(&mut self, surface: Option<SurfaceId>, hotspot: (i32, i32));
}

/// Command surface of the scene-graph collaborator.
pub trait Scene {
    /// Render-target initialization for a newly committed output.
    fn attach_output(&mut self, output: OutputId) -> anyhow::Result<()>;
    /// Compute and commit the next frame for the output's render target.
    fn render_output(&mut self, output: OutputId) -> anyhow::Result<()>;
    /// Frame-completion signal with a monotonic timestamp.
    fn frame_done(&mut self, output: OutputId, at: Duration);
    fn release_output(&mut self, output: OutputId);

    /// New top-level node as a child of the scene root.
    fn create_toplevel(&mut self, surface: SurfaceId) -> NodeId;
    /// New popup node as a child of an existing toplevel's node.
    fn create_popup(&mut self, surface: SurfaceId, parent: NodeId) -> NodeId;
}

/// Command surface of the output-layout collaborator.
pub trait OutputLayout {
    /// Auto-placement: append to the right of existing outputs.
    fn add_auto(&mut self, output: OutputId, mode: Mode);
    fn remove(&mut self, output: OutputId);
    /// Scale a normalized [0,1]² absolute position into layout space.
    fn absolute_to_layout(&self, x: f64, y: f64) -> (f64, f64);
    /// Clamp a layout-space position to the layout's bounding box.
    fn clamp(&self, x: f64, y: f64) -> (f64, f64);
}

/// Command surface of the seat collaborator. Focus tracking itself is the
/// seat's business; the core only reads it and forwards pointer state.
pub trait Seat {
    fn focused_pointer_client(&self) -> Option<ClientId>;
    fn pointer_clear_focus(&mut self);
    /// Stub in this core: surface picking is a collaborator concern, so
    /// nothing forwards motion yet.
    fn pointer_notify_motion(&mut self, time_msec: u32, sx: f64, sy: f64);
}

/// The collaborator set the server owns. Boxed so backends can be swapped
/// without touching the core.
pub struct Collaborators {
    pub backend: Box<dyn Backend>,
    pub scene: Box<dyn Scene>,
    pub layout: Box<dyn OutputLayout>,
    pub seat: Box<dyn Seat>,
}
