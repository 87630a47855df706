//! Entity lifecycle integration tests
//!
//! Drives the server's dispatcher directly with the headless
//! collaborators and asserts on their call log: subscription accounting,
//! destroy-once semantics, popup parenting, the cursor focus gate, mode
//! selection, backend start failure and shutdown draining.

use wayfarer::backend::headless::{
    self, Call, CallLog, HeadlessBackend, HeadlessLayout, HeadlessScene, HeadlessSeat,
};
use wayfarer::backend::{
    ClientId, Collaborators, Event, Mode, OutputId, SurfaceId, SurfaceInfo, SurfaceRole,
};
use wayfarer::config::Config;
use wayfarer::server::Server;

fn modes() -> Vec<Mode> {
    vec![
        Mode { width: 800, height: 600, refresh: 60_000 },
        Mode { width: 1280, height: 720, refresh: 60_000 },
        Mode { width: 1920, height: 1080, refresh: 75_000 },
    ]
}

fn server_with(focus: Option<ClientId>, fail_start: bool) -> (Server, CallLog) {
    let (tx, _rx) = calloop::channel::channel::<Event>();
    let log = CallLog::default();
    let mut backend = HeadlessBackend::new(tx, log.clone());
    if fail_start {
        backend = backend.failing_start();
    }
    let collab = Collaborators {
        backend: Box::new(backend),
        scene: Box::new(HeadlessScene::new(log.clone())),
        layout: Box::new(HeadlessLayout::new(log.clone())),
        seat: Box::new(HeadlessSeat::new(log.clone()).with_focus(focus)),
    };
    let server = Server::new(Config::default(), collab).expect("server context");
    (server, log)
}

fn test_server() -> (Server, CallLog) {
    server_with(None, false)
}

fn toplevel(id: u64) -> Event {
    Event::NewSurface {
        surface: SurfaceInfo {
            id: SurfaceId(id),
            role: SurfaceRole::Toplevel,
        },
    }
}

fn popup(id: u64, parent: u64) -> Event {
    Event::NewSurface {
        surface: SurfaceInfo {
            id: SurfaceId(id),
            role: SurfaceRole::Popup {
                parent: SurfaceId(parent),
            },
        },
    }
}

#[test]
fn output_lifecycle_deregisters_exactly_its_subscriptions() {
    let (mut server, log) = test_server();

    server.dispatch(Event::NewOutput { output: OutputId(1), modes: modes() });
    assert_eq!(server.registry.subscription_count(), 2);
    assert_eq!(server.outputs.len(), 1);

    server.dispatch(Event::OutputDestroyed { output: OutputId(1) });
    assert_eq!(server.registry.subscription_count(), 0);
    assert!(server.outputs.is_empty());

    let calls = headless::calls(&log);
    assert!(calls.contains(&Call::ReleaseOutput(OutputId(1))));
    assert!(calls.contains(&Call::LayoutRemove(OutputId(1))));

    // A duplicate destroy notification finds no routes and is dropped.
    server.dispatch(Event::OutputDestroyed { output: OutputId(1) });
    assert_eq!(
        headless::calls(&log)
            .iter()
            .filter(|c| **c == Call::ReleaseOutput(OutputId(1)))
            .count(),
        1
    );
}

#[test]
fn mode_selection_takes_last_advertised_entry() {
    let (mut server, log) = test_server();
    server.dispatch(Event::NewOutput { output: OutputId(1), modes: modes() });

    let selected = Mode { width: 1920, height: 1080, refresh: 75_000 };
    assert!(headless::calls(&log).contains(&Call::CommitMode(OutputId(1), selected)));
    assert_eq!(server.outputs.get(OutputId(1)).unwrap().mode, selected);
}

#[test]
fn frames_for_destroyed_outputs_are_cancelled() {
    let (mut server, log) = test_server();
    server.dispatch(Event::NewOutput { output: OutputId(1), modes: modes() });

    server.dispatch(Event::OutputFrame { output: OutputId(1) });
    assert!(headless::calls(&log).contains(&Call::RenderOutput(OutputId(1))));

    // Events queued behind the destroy must go nowhere once the destroy
    // handler has retired the source.
    server.dispatch(Event::OutputDestroyed { output: OutputId(1) });
    server.dispatch(Event::OutputFrame { output: OutputId(1) });
    assert_eq!(
        headless::calls(&log)
            .iter()
            .filter(|c| **c == Call::RenderOutput(OutputId(1)))
            .count(),
        1
    );
}

#[test]
fn view_destroy_runs_exactly_once_under_rapid_cycles() {
    let (mut server, _log) = test_server();

    for _ in 0..3 {
        server.dispatch(toplevel(5));
        assert_eq!(server.views.len(), 1);
        assert_eq!(server.registry.subscription_count(), 1);
        server.dispatch(Event::SurfaceDestroyed { surface: SurfaceId(5) });
        assert!(server.views.is_empty());
        assert_eq!(server.registry.subscription_count(), 0);
        // Redundant destroy deliveries are dropped, not double-handled.
        server.dispatch(Event::SurfaceDestroyed { surface: SurfaceId(5) });
    }
}

#[test]
fn popups_parent_under_their_toplevel_and_never_become_views() {
    let (mut server, log) = test_server();

    server.dispatch(toplevel(1));
    let view = server.views.view_for_surface(SurfaceId(1)).unwrap();
    let parent_node = server.views.get(view).unwrap().node;

    server.dispatch(popup(2, 1));
    assert_eq!(server.views.len(), 1);
    assert!(server.views.view_for_surface(SurfaceId(2)).is_none());
    assert!(headless::calls(&log).contains(&Call::CreatePopup(SurfaceId(2), parent_node)));

    // A popup naming an unknown parent is a client protocol violation:
    // dropped, with the compositor still running.
    server.dispatch(popup(3, 42));
    assert_eq!(
        headless::calls(&log)
            .iter()
            .filter(|c| matches!(c, Call::CreatePopup(..)))
            .count(),
        1
    );
    server.dispatch(toplevel(4));
    assert_eq!(server.views.len(), 2);
}

#[test]
fn set_cursor_is_gated_on_pointer_focus() {
    let (mut server, log) = server_with(Some(ClientId(7)), false);

    server.dispatch(Event::RequestSetCursor {
        client: ClientId(7),
        surface: Some(SurfaceId(1)),
        hotspot: (2, 2),
    });
    server.dispatch(Event::RequestSetCursor {
        client: ClientId(8),
        surface: Some(SurfaceId(2)),
        hotspot: (0, 0),
    });

    let set_calls: Vec<_> = headless::calls(&log)
        .into_iter()
        .filter(|c| matches!(c, Call::SetCursorSurface(..)))
        .collect();
    assert_eq!(set_calls, vec![Call::SetCursorSurface(Some(SurfaceId(1)))]);
}

#[test]
fn backend_start_failure_never_reaches_the_dispatch_loop() {
    let (mut server, log) = server_with(None, true);

    let err = server.start_backend().unwrap_err();
    assert!(err.to_string().contains("backend failed to start"));
    // Nothing ran: no started marker, no frames, no outputs.
    assert!(headless::calls(&log).is_empty());
    assert!(server.outputs.is_empty());
}

#[test]
fn shutdown_drains_views_and_outputs_before_display_teardown() {
    let (mut server, log) = test_server();

    server.dispatch(Event::NewOutput { output: OutputId(1), modes: modes() });
    server.dispatch(toplevel(1));
    server.dispatch(toplevel(2));
    assert_eq!(server.views.len(), 2);
    assert_eq!(server.registry.subscription_count(), 4);

    server.shutdown();

    // All three destroy paths ran while the display (still owned by the
    // live server) existed.
    assert!(server.views.is_empty());
    assert!(server.outputs.is_empty());
    assert_eq!(server.registry.subscription_count(), 0);
    assert!(headless::calls(&log).contains(&Call::ReleaseOutput(OutputId(1))));
}
