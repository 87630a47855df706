//! Headless reference collaborators
//!
//! A backend, scene, layout and seat that fulfil the collaborator
//! contracts without touching any hardware. Every produced call is
//! recorded into a shared log, which is what the binary runs against when
//! no hardware backend is compiled in and what the tests assert on.
//! Failure knobs (`failing_start`, `reject_commit_for`) stand in for the
//! hardware errors the real collaborators can raise.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use calloop::channel::Sender;
use log::debug;

use super::{
    Backend, BackendStartError, ClientId, Collaborators, CommitError, DeviceClass, DeviceId,
    Event, InputDeviceInfo, Mode, NodeId, OutputId, OutputLayout, Scene, Seat, SurfaceId,
};

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    BackendStarted,
    EnableOutput(OutputId),
    CommitMode(OutputId, Mode),
    AttachPointer(DeviceId),
    WarpCursor(f64, f64),
    SetCursorImage(String),
    SetCursorSurface(Option<SurfaceId>),
    AttachOutput(OutputId),
    RenderOutput(OutputId),
    FrameDone(OutputId),
    ReleaseOutput(OutputId),
    CreateToplevel(SurfaceId, NodeId),
    CreatePopup(SurfaceId, NodeId),
    LayoutAdd(OutputId),
    LayoutRemove(OutputId),
    ClearPointerFocus,
    PointerMotion(u32),
}

/// Shared call log. The core is single-threaded, so `Rc<RefCell>` is all
/// the sharing this needs.
pub type CallLog = Rc<RefCell<Vec<Call>>>;

/// Snapshot helper for assertions.
pub fn calls(log: &CallLog) -> Vec<Call> {
    log.borrow().clone()
}

pub struct HeadlessBackend {
    events: Sender<Event>,
    log: CallLog,
    vsync: Option<Duration>,
    fail_start: bool,
    reject_commit_for: HashSet<OutputId>,
    synthetic_modes: Vec<Mode>,
}

impl HeadlessBackend {
    pub fn new(events: Sender<Event>, log: CallLog) -> Self {
        Self {
            events,
            log,
            vsync: None,
            fail_start: false,
            reject_commit_for: HashSet::new(),
            synthetic_modes: Vec::new(),
        }
    }

    /// Drive frame events from a core-side timer at the given interval.
    pub fn with_vsync(mut self, interval: Duration) -> Self {
        self.vsync = Some(interval);
        self
    }

    /// Announce one synthetic output and pointer on start, so the binary
    /// has something to composite.
    pub fn with_synthetic_output(mut self, modes: Vec<Mode>) -> Self {
        self.synthetic_modes = modes;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn rejecting_commits_for(mut self, output: OutputId) -> Self {
        self.reject_commit_for.insert(output);
        self
    }
}

impl Backend for HeadlessBackend {
    fn start(&mut self) -> Result<(), BackendStartError> {
        if self.fail_start {
            return Err(BackendStartError("headless backend configured to fail".into()));
        }
        self.log.borrow_mut().push(Call::BackendStarted);
        if !self.synthetic_modes.is_empty() {
            let _ = self.events.send(Event::NewOutput {
                output: OutputId(1),
                modes: self.synthetic_modes.clone(),
            });
            let _ = self.events.send(Event::NewInput {
                device: InputDeviceInfo {
                    id: DeviceId(1),
                    class: DeviceClass::Pointer,
                    name: "headless-pointer".into(),
                },
            });
        }
        Ok(())
    }

    fn vsync_interval(&self) -> Option<Duration> {
        self.vsync
    }

    fn enable_output(&mut self, output: OutputId) {
        self.log.borrow_mut().push(Call::EnableOutput(output));
    }

    fn commit_mode(&mut self, output: OutputId, mode: Mode) -> Result<(), CommitError> {
        if self.reject_commit_for.contains(&output) {
            return Err(CommitError::Rejected);
        }
        self.log.borrow_mut().push(Call::CommitMode(output, mode));
        Ok(())
    }

    fn attach_pointer(&mut self, device: DeviceId) {
        self.log.borrow_mut().push(Call::AttachPointer(device));
    }

    fn warp_cursor(&mut self, x: f64, y: f64) {
        self.log.borrow_mut().push(Call::WarpCursor(x, y));
    }

    fn set_cursor_image(&mut self, name: &str, _size: u32) {
        self.log.borrow_mut().push(Call::SetCursorImage(name.to_string()));
    }

    fn set_cursor_surface(&mut self, surface: Option<SurfaceId>, _hotspot: (i32, i32)) {
        self.log.borrow_mut().push(Call::SetCursorSurface(surface));
    }
}

/// Scene stand-in: hands out node ids and records the render cycle.
pub struct HeadlessScene {
    log: CallLog,
    next_node: u64,
}

impl HeadlessScene {
    pub fn new(log: CallLog) -> Self {
        Self { log, next_node: 1 }
    }
}

impl Scene for HeadlessScene {
    fn attach_output(&mut self, output: OutputId) -> anyhow::Result<()> {
        self.log.borrow_mut().push(Call::AttachOutput(output));
        Ok(())
    }

    fn render_output(&mut self, output: OutputId) -> anyhow::Result<()> {
        self.log.borrow_mut().push(Call::RenderOutput(output));
        Ok(())
    }

    fn frame_done(&mut self, output: OutputId, _at: Duration) {
        self.log.borrow_mut().push(Call::FrameDone(output));
    }

    fn release_output(&mut self, output: OutputId) {
        self.log.borrow_mut().push(Call::ReleaseOutput(output));
    }

    fn create_toplevel(&mut self, surface: SurfaceId) -> NodeId {
        let node = NodeId(self.next_node);
        self.next_node += 1;
        self.log.borrow_mut().push(Call::CreateToplevel(surface, node));
        node
    }

    fn create_popup(&mut self, surface: SurfaceId, parent: NodeId) -> NodeId {
        let node = NodeId(self.next_node);
        self.next_node += 1;
        self.log.borrow_mut().push(Call::CreatePopup(surface, parent));
        node
    }
}

/// Layout stand-in with the real auto-placement policy: each new output
/// lands to the right of everything already placed.
pub struct HeadlessLayout {
    log: CallLog,
    entries: Vec<(OutputId, i32, Mode)>,
}

impl HeadlessLayout {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            entries: Vec::new(),
        }
    }

    fn extent(&self) -> (f64, f64) {
        let width: i32 = self.entries.iter().map(|(_, _, m)| m.width).sum();
        let height: i32 = self.entries.iter().map(|(_, _, m)| m.height).max().unwrap_or(0);
        (width as f64, height as f64)
    }
}

impl OutputLayout for HeadlessLayout {
    fn add_auto(&mut self, output: OutputId, mode: Mode) {
        let x: i32 = self.entries.iter().map(|(_, _, m)| m.width).sum();
        debug!("layout: placing output {:?} at x={}", output, x);
        self.entries.push((output, x, mode));
        self.log.borrow_mut().push(Call::LayoutAdd(output));
    }

    fn remove(&mut self, output: OutputId) {
        self.entries.retain(|(id, _, _)| *id != output);
        self.log.borrow_mut().push(Call::LayoutRemove(output));
    }

    fn absolute_to_layout(&self, x: f64, y: f64) -> (f64, f64) {
        let (w, h) = self.extent();
        (x * w, y * h)
    }

    fn clamp(&self, x: f64, y: f64) -> (f64, f64) {
        let (w, h) = self.extent();
        (x.clamp(0.0, w), y.clamp(0.0, h))
    }
}

/// Seat stand-in: the focused client is set directly by whoever builds it.
pub struct HeadlessSeat {
    log: CallLog,
    focused: Option<ClientId>,
}

impl HeadlessSeat {
    pub fn new(log: CallLog) -> Self {
        Self { log, focused: None }
    }

    pub fn with_focus(mut self, client: Option<ClientId>) -> Self {
        self.focused = client;
        self
    }
}

impl Seat for HeadlessSeat {
    fn focused_pointer_client(&self) -> Option<ClientId> {
        self.focused
    }

    fn pointer_clear_focus(&mut self) {
        self.log.borrow_mut().push(Call::ClearPointerFocus);
    }

    fn pointer_notify_motion(&mut self, time_msec: u32, _sx: f64, _sy: f64) {
        self.log.borrow_mut().push(Call::PointerMotion(time_msec));
    }
}

/// Build the full headless collaborator set sharing one call log.
pub fn collaborators(events: Sender<Event>) -> (Collaborators, CallLog) {
    let log = CallLog::default();
    let collab = Collaborators {
        backend: Box::new(HeadlessBackend::new(events, log.clone())),
        scene: Box::new(HeadlessScene::new(log.clone())),
        layout: Box::new(HeadlessLayout::new(log.clone())),
        seat: Box::new(HeadlessSeat::new(log.clone())),
    };
    (collab, log)
}
