//! Output tracking and the per-frame render cycle
//!
//! One entity per connected display, keyed by the backend's own output
//! identity. Creation enables the output with the most recently advertised
//! mode and registers it with the scene and layout collaborators; the
//! frame handler is the sole driver of presentation; destruction
//! deregisters subscriptions before anything else so queued events for
//! the dying output go nowhere.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info, warn};

use crate::backend::{Collaborators, Mode, OutputId};
use crate::subscription::{EventKind, Registry, Route, Source, SubscriptionHandle};

/// A tracked display.
#[derive(Debug)]
pub struct Output {
    pub mode: Mode,
    pub last_presented: Option<Duration>,
    frame_sub: Option<SubscriptionHandle>,
    destroy_sub: Option<SubscriptionHandle>,
}

#[derive(Default)]
pub struct OutputManager {
    outputs: HashMap<OutputId, Output>,
}

impl OutputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> Vec<OutputId> {
        self.outputs.keys().copied().collect()
    }

    pub fn get(&self, id: OutputId) -> Option<&Output> {
        self.outputs.get(&id)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Backend reported a new display. Mode policy: take the last entry of
    /// the advertised sequence. A rejected initial commit skips the output
    /// but keeps the compositor running.
    pub fn handle_new_output(
        &mut self,
        registry: &mut Registry<Route>,
        collab: &mut Collaborators,
        id: OutputId,
        modes: &[Mode],
    ) {
        let Some(mode) = modes.last().copied() else {
            warn!("🖥️ output {:?} advertised no modes; skipping", id);
            return;
        };

        collab.backend.enable_output(id);
        if let Err(e) = collab.backend.commit_mode(id, mode) {
            warn!("⚠️ initial commit for output {:?} failed: {}; skipping", id, e);
            return;
        }
        if let Err(e) = collab.scene.attach_output(id) {
            warn!("⚠️ render-target setup for output {:?} failed: {}; skipping", id, e);
            return;
        }
        collab.layout.add_auto(id, mode);

        registry.announce(Source::Output(id));
        let frame_sub =
            registry.subscribe(Source::Output(id), EventKind::Frame, Route::OutputFrame(id));
        let destroy_sub = registry.subscribe(
            Source::Output(id),
            EventKind::Destroy,
            Route::OutputDestroy(id),
        );

        self.outputs.insert(
            id,
            Output {
                mode,
                last_presented: None,
                frame_sub: Some(frame_sub),
                destroy_sub: Some(destroy_sub),
            },
        );
        info!(
            "🖥️ output {:?} online: {}x{} @ {}mHz",
            id, mode.width, mode.height, mode.refresh
        );
    }

    /// Hardware vsync fired for this output: render, commit, and signal
    /// completion with the current monotonic timestamp.
    pub fn handle_frame(&mut self, collab: &mut Collaborators, id: OutputId, now: Duration) {
        let Some(output) = self.outputs.get_mut(&id) else {
            return;
        };
        if let Err(e) = collab.scene.render_output(id) {
            warn!("🎨 frame for output {:?} failed: {}", id, e);
            return;
        }
        collab.scene.frame_done(id, now);
        output.last_presented = Some(now);
    }

    /// Backend reported the display gone (or the server is draining).
    /// Subscriptions go first, collaborator resources second, the entity
    /// last. Unknown ids are tolerated.
    pub fn handle_destroyed(
        &mut self,
        registry: &mut Registry<Route>,
        collab: &mut Collaborators,
        id: OutputId,
    ) {
        let Some(mut output) = self.outputs.remove(&id) else {
            debug!("destroy for untracked output {:?}; ignoring", id);
            return;
        };
        if let Some(handle) = output.frame_sub.take() {
            registry.unsubscribe(handle);
        }
        if let Some(handle) = output.destroy_sub.take() {
            registry.unsubscribe(handle);
        }
        registry.retire(Source::Output(id));

        collab.scene.release_output(id);
        collab.layout.remove(id);
        info!("🖥️ output {:?} removed", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{self, Call};
    use crate::backend::Event;

    fn fixture() -> (OutputManager, Registry<Route>, Collaborators, headless::CallLog) {
        let (tx, _rx) = calloop::channel::channel::<Event>();
        let (collab, log) = headless::collaborators(tx);
        (OutputManager::new(), Registry::new(), collab, log)
    }

    fn modes() -> Vec<Mode> {
        vec![
            Mode { width: 800, height: 600, refresh: 60_000 },
            Mode { width: 1280, height: 720, refresh: 60_000 },
            Mode { width: 1920, height: 1080, refresh: 75_000 },
        ]
    }

    #[test]
    fn new_output_selects_last_advertised_mode() {
        let (mut outputs, mut registry, mut collab, log) = fixture();
        outputs.handle_new_output(&mut registry, &mut collab, OutputId(1), &modes());

        let committed = Mode { width: 1920, height: 1080, refresh: 75_000 };
        assert!(headless::calls(&log).contains(&Call::CommitMode(OutputId(1), committed)));
        assert_eq!(outputs.get(OutputId(1)).unwrap().mode, committed);
        assert_eq!(registry.subscription_count(), 2);
    }

    #[test]
    fn output_without_modes_is_skipped() {
        let (mut outputs, mut registry, mut collab, log) = fixture();
        outputs.handle_new_output(&mut registry, &mut collab, OutputId(1), &[]);

        assert!(outputs.is_empty());
        assert_eq!(registry.subscription_count(), 0);
        assert!(headless::calls(&log).is_empty());
    }

    #[test]
    fn rejected_commit_skips_output_softly() {
        let (tx, _rx) = calloop::channel::channel::<Event>();
        let log = headless::CallLog::default();
        let mut collab = Collaborators {
            backend: Box::new(
                headless::HeadlessBackend::new(tx, log.clone())
                    .rejecting_commits_for(OutputId(1)),
            ),
            scene: Box::new(headless::HeadlessScene::new(log.clone())),
            layout: Box::new(headless::HeadlessLayout::new(log.clone())),
            seat: Box::new(headless::HeadlessSeat::new(log.clone())),
        };
        let mut registry = Registry::new();
        let mut outputs = OutputManager::new();

        outputs.handle_new_output(&mut registry, &mut collab, OutputId(1), &modes());

        assert!(outputs.is_empty());
        assert_eq!(registry.subscription_count(), 0);
        assert!(!headless::calls(&log).contains(&Call::LayoutAdd(OutputId(1))));
    }

    #[test]
    fn frame_renders_and_signals_completion() {
        let (mut outputs, mut registry, mut collab, log) = fixture();
        outputs.handle_new_output(&mut registry, &mut collab, OutputId(1), &modes());

        outputs.handle_frame(&mut collab, OutputId(1), Duration::from_millis(16));

        let calls = headless::calls(&log);
        assert!(calls.contains(&Call::RenderOutput(OutputId(1))));
        assert!(calls.contains(&Call::FrameDone(OutputId(1))));
        assert_eq!(
            outputs.get(OutputId(1)).unwrap().last_presented,
            Some(Duration::from_millis(16))
        );
    }

    #[test]
    fn destroy_releases_resources_and_tolerates_repeats() {
        let (mut outputs, mut registry, mut collab, log) = fixture();
        outputs.handle_new_output(&mut registry, &mut collab, OutputId(1), &modes());

        outputs.handle_destroyed(&mut registry, &mut collab, OutputId(1));
        assert!(outputs.is_empty());
        assert_eq!(registry.subscription_count(), 0);
        let calls = headless::calls(&log);
        assert!(calls.contains(&Call::ReleaseOutput(OutputId(1))));
        assert!(calls.contains(&Call::LayoutRemove(OutputId(1))));

        // Shutdown draining can race a backend destroy notification; the
        // second invocation must be a quiet no-op.
        outputs.handle_destroyed(&mut registry, &mut collab, OutputId(1));
        assert_eq!(
            headless::calls(&log)
                .iter()
                .filter(|c| **c == Call::ReleaseOutput(OutputId(1)))
                .count(),
            1
        );
    }
}
