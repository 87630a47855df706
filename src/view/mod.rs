//! View tracking: client top-level windows and their scene nodes
//!
//! Toplevel surfaces become Views with a presentation node under the scene
//! root. Popups are reparented into their parent view's subtree and never
//! tracked as Views of their own. The surface→view side-table is the typed
//! replacement for recovering an owner from an untyped protocol userdata
//! field: later popups find their parent's node through it.

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::backend::{Collaborators, NodeId, SurfaceId, SurfaceInfo, SurfaceRole, ViewId};
use crate::subscription::{EventKind, Registry, Route, Source, SubscriptionHandle};

/// A tracked top-level window.
#[derive(Debug)]
pub struct View {
    pub surface: SurfaceId,
    pub node: NodeId,
    destroy_sub: Option<SubscriptionHandle>,
}

pub struct ViewManager {
    views: HashMap<ViewId, View>,
    by_surface: HashMap<SurfaceId, ViewId>,
    next_id: u64,
}

impl ViewManager {
    pub fn new() -> Self {
        Self {
            views: HashMap::new(),
            by_surface: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn ids(&self) -> Vec<ViewId> {
        self.views.keys().copied().collect()
    }

    pub fn get(&self, id: ViewId) -> Option<&View> {
        self.views.get(&id)
    }

    pub fn view_for_surface(&self, surface: SurfaceId) -> Option<ViewId> {
        self.by_surface.get(&surface).copied()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Protocol reported a new surface. Branches on role: toplevels become
    /// tracked Views, popups only get a scene node under their parent. A
    /// popup naming an untracked parent is a client protocol violation and
    /// is dropped with a warning.
    pub fn handle_new_surface(
        &mut self,
        registry: &mut Registry<Route>,
        collab: &mut Collaborators,
        surface: SurfaceInfo,
    ) {
        match surface.role {
            SurfaceRole::Popup { parent } => {
                let parent_node = self
                    .by_surface
                    .get(&parent)
                    .and_then(|vid| self.views.get(vid))
                    .map(|view| view.node);
                match parent_node {
                    Some(node) => {
                        let popup_node = collab.scene.create_popup(surface.id, node);
                        debug!(
                            "popup surface {:?} parented under node {:?} as {:?}",
                            surface.id, node, popup_node
                        );
                    }
                    None => {
                        warn!(
                            "🚫 popup surface {:?} references untracked parent {:?}; dropping",
                            surface.id, parent
                        );
                    }
                }
            }
            SurfaceRole::Toplevel => {
                let node = collab.scene.create_toplevel(surface.id);
                let id = ViewId(self.next_id);
                self.next_id += 1;

                registry.announce(Source::Surface(surface.id));
                let destroy_sub = registry.subscribe(
                    Source::Surface(surface.id),
                    EventKind::Destroy,
                    Route::ViewDestroy(id),
                );

                self.by_surface.insert(surface.id, id);
                self.views.insert(
                    id,
                    View {
                        surface: surface.id,
                        node,
                        destroy_sub: Some(destroy_sub),
                    },
                );
                info!("🪟 new view {:?} for surface {:?}", id, surface.id);
            }
        }
    }

    /// The surface behind this view is gone. Deregister first, then stop
    /// holding the entity; scene-node teardown belongs to the scene
    /// collaborator's own surface-destroy handling.
    pub fn handle_destroyed(&mut self, registry: &mut Registry<Route>, id: ViewId) {
        let Some(mut view) = self.views.remove(&id) else {
            debug!("destroy for untracked view {:?}; ignoring", id);
            return;
        };
        if let Some(handle) = view.destroy_sub.take() {
            registry.unsubscribe(handle);
        }
        registry.retire(Source::Surface(view.surface));
        self.by_surface.remove(&view.surface);
        info!("🪟 view {:?} removed", id);
    }
}
