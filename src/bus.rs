//! Event bus and node composition
//!
//! Every component is a `Node` attached to one `Bus`. Nodes form a tree for
//! lifecycle purposes and share a single mutable state through `Context`.
//! Routed events go to every subscribed, active node in the order the nodes
//! were attached, whatever their position in the tree.
//!
//! Dispatch is synchronous. An event emitted from inside a handler is
//! delivered as soon as that handler returns, before the outer event moves
//! on to its next subscriber.

use std::collections::HashMap;

use glam::Vec2;

use crate::EntityKey;

/// Nested emits deeper than this are dropped
pub const MAX_DISPATCH_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
}

/// A pointer event in host coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub phase: PointerPhase,
    pub position: Vec2,
}

impl PointerInput {
    pub fn new(phase: PointerPhase, x: f32, y: f32) -> Self {
        Self {
            phase,
            position: Vec2::new(x, y),
        }
    }
}

/// Everything that travels over the bus
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Delivered down the tree, parents first
    Activate,
    /// Delivered up the tree, children in reverse order first
    Deactivate,
    /// Raw host refresh callback (milliseconds, host clock)
    HostFrame { timestamp_ms: f64 },
    /// Elapsed time since the previous frame
    FrameTick { dt_ms: f64 },
    SessionStart,
    RepositionPendingFruit(Vec2),
    DropPendingFruit(Vec2),
    /// Two touching fruits of the same level
    MergeCollision { a: EntityKey, b: EntityKey },
    /// A fruit touched the bucket rim
    RimCollision { fruit: EntityKey },
    /// Game state changed; listeners re-read the shared state
    StateChanged,
    /// Pointer input in host coordinates
    Pointer(PointerInput),
    /// Host drawing area changed size
    HostResize { width: f32, height: f32 },
}

/// Routing key of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Activate,
    Deactivate,
    HostFrame,
    FrameTick,
    SessionStart,
    RepositionPendingFruit,
    DropPendingFruit,
    MergeCollision,
    RimCollision,
    StateChanged,
    Pointer,
    HostResize,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Activate => "activate",
            EventKind::Deactivate => "deactivate",
            EventKind::HostFrame => "host-frame",
            EventKind::FrameTick => "frame-tick",
            EventKind::SessionStart => "session-start",
            EventKind::RepositionPendingFruit => "reposition-pending-fruit",
            EventKind::DropPendingFruit => "drop-pending-fruit",
            EventKind::MergeCollision => "merge-collision",
            EventKind::RimCollision => "rim-collision",
            EventKind::StateChanged => "state-changed",
            EventKind::Pointer => "pointer",
            EventKind::HostResize => "host-resize",
        }
    }

    fn is_lifecycle(&self) -> bool {
        matches!(self, EventKind::Activate | EventKind::Deactivate)
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Activate => EventKind::Activate,
            Event::Deactivate => EventKind::Deactivate,
            Event::HostFrame { .. } => EventKind::HostFrame,
            Event::FrameTick { .. } => EventKind::FrameTick,
            Event::SessionStart => EventKind::SessionStart,
            Event::RepositionPendingFruit(_) => EventKind::RepositionPendingFruit,
            Event::DropPendingFruit(_) => EventKind::DropPendingFruit,
            Event::MergeCollision { .. } => EventKind::MergeCollision,
            Event::RimCollision { .. } => EventKind::RimCollision,
            Event::StateChanged => EventKind::StateChanged,
            Event::Pointer(_) => EventKind::Pointer,
            Event::HostResize { .. } => EventKind::HostResize,
        }
    }
}

/// Shared state plus the outbox handlers emit into
pub struct Context<S> {
    pub state: S,
    outbox: Vec<Event>,
}

impl<S> Context<S> {
    pub fn new(state: S) -> Self {
        Self {
            state,
            outbox: Vec::new(),
        }
    }

    /// Queue an event for dispatch once the current handler returns
    pub fn emit(&mut self, event: Event) {
        self.outbox.push(event);
    }

    /// Take everything emitted since the last drain
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbox)
    }
}

/// A component attached to the bus
pub trait Node<S> {
    fn name(&self) -> &'static str;

    /// Events this node handles; read once when the node is attached
    fn subscriptions(&self) -> &'static [EventKind];

    fn handle(&mut self, event: &Event, cx: &mut Context<S>);
}

/// Index of a node within its bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

struct Slot<S> {
    /// Taken out while its handler runs
    node: Option<Box<dyn Node<S>>>,
    name: &'static str,
    lifecycle: bool,
    children: Vec<NodeId>,
    active: bool,
}

/// Dispatch table and node tree owning the shared context
pub struct Bus<S> {
    cx: Context<S>,
    slots: Vec<Slot<S>>,
    routes: HashMap<EventKind, Vec<NodeId>>,
    roots: Vec<NodeId>,
    active: bool,
    depth: usize,
}

impl<S> Bus<S> {
    pub fn new(state: S) -> Self {
        Self {
            cx: Context::new(state),
            slots: Vec::new(),
            routes: HashMap::new(),
            roots: Vec::new(),
            active: false,
            depth: 0,
        }
    }

    /// Attach a node under `parent` (or as a root) and register its handlers
    pub fn attach(&mut self, parent: Option<NodeId>, node: impl Node<S> + 'static) -> NodeId {
        let id = NodeId(self.slots.len());
        let name = node.name();
        let mut lifecycle = false;
        for kind in node.subscriptions() {
            if kind.is_lifecycle() {
                lifecycle = true;
            } else {
                self.routes.entry(*kind).or_default().push(id);
            }
        }
        self.slots.push(Slot {
            node: Some(Box::new(node)),
            name,
            lifecycle,
            children: Vec::new(),
            active: false,
        });

        let parent_active = match parent {
            Some(p) => {
                self.slots[p.0].children.push(id);
                self.slots[p.0].active
            }
            None => {
                self.roots.push(id);
                self.active
            }
        };
        log::debug!("Attached node '{}'", name);

        if parent_active {
            self.activate_subtree(id);
        }
        id
    }

    /// Activate every root subtree in attach order
    pub fn activate(&mut self) {
        if self.active {
            return;
        }
        self.active = true;
        for root in self.roots.clone() {
            self.activate_subtree(root);
        }
    }

    /// Deactivate every root subtree in reverse attach order
    pub fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        for root in self.roots.clone().into_iter().rev() {
            self.deactivate_subtree(root);
        }
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Dispatch an event to every subscribed, active node
    pub fn emit(&mut self, event: Event) {
        if self.depth >= MAX_DISPATCH_DEPTH {
            log::error!("Dropping '{}': dispatch depth limit reached", event.kind().name());
            return;
        }
        let kind = event.kind();
        if kind.is_lifecycle() {
            log::warn!("'{}' is delivered by activate/deactivate only", kind.name());
            return;
        }
        let Some(targets) = self.routes.get(&kind).cloned() else {
            return;
        };

        self.depth += 1;
        for id in targets {
            if self.slots[id.0].active {
                self.deliver(id, &event);
            }
        }
        self.depth -= 1;
    }

    pub fn state(&self) -> &S {
        &self.cx.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.cx.state
    }

    fn activate_subtree(&mut self, id: NodeId) {
        if self.slots[id.0].active {
            return;
        }
        self.slots[id.0].active = true;
        if self.slots[id.0].lifecycle {
            self.deliver(id, &Event::Activate);
        }
        for child in self.slots[id.0].children.clone() {
            self.activate_subtree(child);
        }
    }

    fn deactivate_subtree(&mut self, id: NodeId) {
        if !self.slots[id.0].active {
            return;
        }
        for child in self.slots[id.0].children.clone().into_iter().rev() {
            self.deactivate_subtree(child);
        }
        if self.slots[id.0].lifecycle {
            self.deliver(id, &Event::Deactivate);
        }
        self.slots[id.0].active = false;
    }

    /// Run one handler, then flush whatever it emitted
    fn deliver(&mut self, id: NodeId, event: &Event) {
        let Some(mut node) = self.slots[id.0].node.take() else {
            log::error!("Node '{}' re-entered while handling", self.slots[id.0].name);
            return;
        };
        node.handle(event, &mut self.cx);
        self.slots[id.0].node = Some(node);

        for queued in self.cx.drain() {
            self.emit(queued);
        }
    }
}
