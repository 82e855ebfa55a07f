use crossbeam_channel::{Receiver, Sender, unbounded};
use mindmap_core::NodeId;
use serde::{Deserialize, Serialize};

pub mod telemetry;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeOrigin {
    /// Tab on a selected node.
    Child,
    /// Enter on a selected node.
    Sibling,
    /// Double-click on empty canvas.
    Annotation,
    /// Clipboard text split into chunks.
    Paste,
    /// Escape reset the map to a single root.
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    // Structure
    NodeCreated {
        id: NodeId,
        parent: Option<NodeId>,
        origin: NodeOrigin,
    },
    NodesDeleted {
        root: NodeId,
        count: usize,
    },
    EdgeCreated {
        parent: NodeId,
        child: NodeId,
    },
    Reparented {
        node: NodeId,
        previous: Option<NodeId>,
        parent: NodeId,
    },
    FoldToggled {
        id: NodeId,
        folded: bool,
    },
    GraphReset,

    // Interaction
    SelectionChanged {
        selected: Option<NodeId>,
    },
    TextEditStarted {
        id: NodeId,
    },
    TextEditFinished {
        id: NodeId,
    },

    // History
    HistoryChanged {
        can_undo: bool,
        can_redo: bool,
        position: usize,
        len: usize,
    },

    // Images
    ImageApplied {
        id: NodeId,
    },
    /// A decode finished for a node that no longer carries that payload.
    ImageDiscarded {
        id: NodeId,
    },
    ImageFailed {
        id: NodeId,
        error: String,
    },

    // Persistence
    DocumentLoaded {
        nodes: usize,
    },
    DocumentLoadFailed {
        error: String,
    },
    AutoSaveFailed {
        error: String,
    },
}

#[derive(Clone)]
pub struct EventBus {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<Event> {
        self.tx.clone()
    }

    pub fn receiver(&self) -> Receiver<Event> {
        self.rx.clone()
    }

    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    /// Everything published so far and not yet consumed.
    pub fn drain(&self) -> Vec<Event> {
        self.rx.try_iter().collect()
    }

    /// Dispatch all pending events to a listener.
    /// This is useful for processing events in the UI loop.
    pub fn dispatch_to<L: EventListener>(&self, listener: &mut L) {
        while let Ok(event) = self.rx.try_recv() {
            listener.handle_event(&event);
        }
    }
}

/// Trait for components that respond to events.
/// Implement this to receive events from the EventBus.
pub trait EventListener {
    fn handle_event(&mut self, event: &Event);
}
