//! The interactive session: one entity store, its selection/edit state
//! machine and its undo history.

use crate::clipboard::{TextIntake, classify_text};
use crate::decode::{DecodeOutcome, ImageDecoder, encode_image, image_dimensions};
use crate::frame::{RenderFrame, RubberBand};
use crate::history::History;
use crate::input::{ClipboardContent, Key, Modifiers, PointerButton};
use crate::settings::SessionSettings;
use mindmap_core::{Camera, Color, GraphSnapshot, Node, NodeId, NodeImage, NodeKind, Vec2};
use mindmap_events::telemetry::{self, HistoryAction};
use mindmap_events::{Event, EventBus, NodeOrigin};
use mindmap_graph::{
    DragGesture, DropOutcome, EntityStore, HitTester, is_visible, propagate_color,
};
use mindmap_storage::{Document, DocumentError, LocalStore};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// What input means right now.
#[derive(Debug, Clone)]
pub enum Mode {
    Idle,
    /// `armed`: the next typed character replaces the text instead of appending.
    Selected { node: NodeId, armed: bool },
    TextEditing { node: NodeId, armed: bool },
    Dragging { gesture: DragGesture, armed: bool },
    ConnectingEdge { from: NodeId, cursor: Vec2 },
}

impl Mode {
    pub fn selected(&self) -> Option<NodeId> {
        match self {
            Mode::Idle => None,
            Mode::Selected { node, .. } | Mode::TextEditing { node, .. } => Some(*node),
            Mode::Dragging { gesture, .. } => Some(gesture.node()),
            Mode::ConnectingEdge { from, .. } => Some(*from),
        }
    }

    pub fn editing(&self) -> Option<NodeId> {
        match self {
            Mode::TextEditing { node, .. } => Some(*node),
            _ => None,
        }
    }

    fn armed(&self) -> bool {
        match self {
            Mode::Selected { armed, .. }
            | Mode::TextEditing { armed, .. }
            | Mode::Dragging { armed, .. } => *armed,
            _ => false,
        }
    }

    /// The node keyboard commands act on. Nothing while a pointer gesture is live.
    fn target(&self) -> Option<NodeId> {
        match self {
            Mode::Selected { node, .. } | Mode::TextEditing { node, .. } => Some(*node),
            _ => None,
        }
    }
}

pub struct Session {
    id: String,
    settings: SessionSettings,
    store: EntityStore,
    history: History,
    mode: Mode,
    /// Text of the node being edited, as it was when editing started.
    edit_before: Option<String>,
    hit_tester: HitTester,
    decoder: ImageDecoder,
    bus: EventBus,
    local: Option<Box<dyn LocalStore>>,
    document_id: Uuid,
}

impl Session {
    /// A session with no local store and a background decode worker.
    pub fn init(settings: SessionSettings) -> Self {
        Self::with_parts(settings, None, ImageDecoder::threaded(), EventBus::new())
    }

    pub fn with_local_store(settings: SessionSettings, local: Box<dyn LocalStore>) -> Self {
        Self::with_parts(settings, Some(local), ImageDecoder::threaded(), EventBus::new())
    }

    /// Seeds the graph from `local` when it holds a valid map, otherwise
    /// from a single default root.
    pub fn with_parts(
        settings: SessionSettings,
        local: Option<Box<dyn LocalStore>>,
        decoder: ImageDecoder,
        bus: EventBus,
    ) -> Self {
        let mut session = Self {
            id: telemetry::new_session_id(),
            history: History::new(settings.history_limit, GraphSnapshot::default()),
            settings,
            store: EntityStore::new(),
            mode: Mode::Idle,
            edit_before: None,
            hit_tester: HitTester::new(),
            decoder,
            bus,
            local,
            document_id: Uuid::new_v4(),
        };

        let restored = session.restore_from_local();
        if session.store.is_empty() {
            session.seed_default_root();
        }
        session.history.reset(session.store.snapshot());
        session.request_missing_decodes();
        telemetry::session_started(&session.id, session.store.len(), restored);
        session
    }

    fn restore_from_local(&mut self) -> bool {
        let Some(local) = self.local.as_mut() else {
            return false;
        };
        let document = match local.load() {
            Ok(Some(document)) => document,
            Ok(None) => {
                tracing::info!("Local store is empty, starting from a default root");
                return false;
            }
            Err(e) => {
                self.report_load_failure("local_load", e.to_string());
                return false;
            }
        };
        let document_id = document.document_id;
        match self.apply_document(document) {
            Ok(()) => {
                self.document_id = document_id;
                true
            }
            Err(e) => {
                self.report_load_failure("local_load", e.to_string());
                false
            }
        }
    }

    fn report_load_failure(&mut self, operation: &str, error: String) {
        tracing::warn!("Failed to load map: {}", error);
        telemetry::persistence_failure(&self.id, operation, &error);
        self.bus.publish(Event::DocumentLoadFailed { error });
    }

    pub fn session_id(&self) -> &str {
        &self.id
    }

    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.mode.selected()
    }

    pub fn editing(&self) -> Option<NodeId> {
        self.mode.editing()
    }

    pub fn pending_decodes(&self) -> usize {
        self.decoder.pending()
    }

    pub fn frame(&self) -> RenderFrame<'_> {
        let rubber_band = match self.mode {
            Mode::ConnectingEdge { from, cursor } => Some(RubberBand { from, cursor }),
            _ => None,
        };
        RenderFrame::build(&self.store, self.selected(), self.editing(), rubber_band)
    }

    /// Replaces the map with a single default root. Undoable.
    pub fn reset(&mut self) {
        self.finish_edit();
        self.set_mode(Mode::Idle);
        self.seed_default_root();
        self.bus.publish(Event::GraphReset);
        self.commit("reset");
    }

    /// Ends the session, committing any text edit in progress.
    pub fn teardown(mut self) {
        self.finish_edit();
        telemetry::session_ended(&self.id, self.store.len());
    }

    fn seed_default_root(&mut self) -> Option<NodeId> {
        self.store.clear();
        self.store.set_camera(Camera::default());
        self.store.set_background(self.settings.nodes.background);

        let defaults = &self.settings.nodes;
        let kind = NodeKind::container(defaults.base_unit);
        let node = Node::new(self.store.allocate_id(), kind, Vec2::ZERO)
            .with_text(defaults.root_label.clone())
            .with_color(defaults.color_for(&kind));
        let id = self.insert(node)?;
        self.bus.publish(Event::NodeCreated {
            id,
            parent: None,
            origin: NodeOrigin::Reset,
        });
        Some(id)
    }

    fn commit(&mut self, label: &str) {
        let snapshot = self.store.snapshot();
        self.auto_save(&snapshot);
        self.history.commit(label, snapshot);
        telemetry::history_moved(
            &self.id,
            HistoryAction::Commit,
            label,
            self.history.position(),
            self.history.len(),
        );
        self.publish_history();
    }

    pub fn undo(&mut self) -> bool {
        self.step_history(HistoryAction::Undo)
    }

    pub fn redo(&mut self) -> bool {
        self.step_history(HistoryAction::Redo)
    }

    fn step_history(&mut self, action: HistoryAction) -> bool {
        if matches!(self.mode, Mode::Dragging { .. } | Mode::ConnectingEdge { .. }) {
            return false;
        }
        self.finish_edit();

        let entry = match action {
            HistoryAction::Undo => {
                let label = self.history.current().map(|e| e.label.clone());
                self.history.undo().map(|e| (label, e.snapshot.clone()))
            }
            _ => self
                .history
                .redo()
                .map(|e| (Some(e.label.clone()), e.snapshot.clone())),
        };
        let Some((label, snapshot)) = entry else {
            return false;
        };

        if !self.restore(snapshot) {
            match action {
                HistoryAction::Undo => self.history.redo(),
                _ => self.history.undo(),
            };
            return false;
        }
        telemetry::history_moved(
            &self.id,
            action,
            label.as_deref().unwrap_or_default(),
            self.history.position(),
            self.history.len(),
        );
        self.publish_history();
        let snapshot = self.store.snapshot();
        self.auto_save(&snapshot);
        true
    }

    /// Swaps the live graph for `snapshot`, drops the selection and
    /// re-dispatches image decodes. Does not touch history.
    fn restore(&mut self, snapshot: GraphSnapshot) -> bool {
        if let Err(e) = self.store.restore(snapshot) {
            tracing::error!("Refusing to restore inconsistent snapshot: {}", e);
            return false;
        }
        self.edit_before = None;
        self.set_mode(Mode::Idle);
        self.request_missing_decodes();
        true
    }

    fn publish_history(&self) {
        self.bus.publish(Event::HistoryChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            position: self.history.position(),
            len: self.history.len(),
        });
    }

    fn auto_save(&mut self, snapshot: &GraphSnapshot) {
        let Some(local) = self.local.as_mut() else {
            return;
        };
        let document = Document::from_snapshot(snapshot).with_document_id(self.document_id);
        if let Err(e) = local.save(&document) {
            let error = e.to_string();
            tracing::warn!("Auto-save failed: {}", error);
            telemetry::persistence_failure(&self.id, "auto_save", &error);
            self.bus.publish(Event::AutoSaveFailed { error });
        }
    }

    /// Replaces the map with `document` and starts a fresh history.
    ///
    /// A document that fails validation leaves everything untouched.
    pub fn load_document(&mut self, document: Document) -> Result<(), DocumentError> {
        let document_id = document.document_id;
        if let Err(e) = self.apply_document(document) {
            self.report_load_failure("load_document", e.to_string());
            return Err(e);
        }
        self.document_id = document_id;
        if self.store.is_empty() {
            self.seed_default_root();
        }
        self.edit_before = None;
        self.set_mode(Mode::Idle);
        self.request_missing_decodes();

        let snapshot = self.store.snapshot();
        self.auto_save(&snapshot);
        self.history.reset(snapshot);
        self.publish_history();
        self.bus.publish(Event::DocumentLoaded {
            nodes: self.store.len(),
        });
        Ok(())
    }

    pub fn load_json(&mut self, json: &str) -> Result<(), DocumentError> {
        match Document::from_json(json) {
            Ok(document) => self.load_document(document),
            Err(e) => {
                self.report_load_failure("load_document", e.to_string());
                Err(e)
            }
        }
    }

    fn apply_document(&mut self, document: Document) -> Result<(), DocumentError> {
        let snapshot = document.into_snapshot(|| self.store.allocate_id())?;
        self.store.restore(snapshot)?;
        Ok(())
    }

    pub fn export_document(&self) -> Document {
        Document::from_snapshot(&self.store.snapshot()).with_document_id(self.document_id)
    }

    fn set_mode(&mut self, mode: Mode) {
        let before = self.mode.selected();
        self.mode = mode;
        let after = self.mode.selected();
        if before != after {
            self.bus.publish(Event::SelectionChanged { selected: after });
        }
    }

    /// Selects `id`, or clears the selection. Hidden nodes cannot be selected.
    pub fn select(&mut self, id: Option<NodeId>) {
        if matches!(self.mode, Mode::Dragging { .. } | Mode::ConnectingEdge { .. }) {
            return;
        }
        self.finish_edit();
        match id {
            Some(id) if is_visible(&self.store, id) => {
                let armed = self.mode.selected() != Some(id) || self.mode.armed();
                self.set_mode(Mode::Selected { node: id, armed });
            }
            _ => self.set_mode(Mode::Idle),
        }
    }

    fn start_edit(&mut self, node: NodeId, armed: bool) {
        self.edit_before = self.store.node(node).map(|n| n.text.clone());
        self.set_mode(Mode::TextEditing { node, armed });
        self.bus.publish(Event::TextEditStarted { id: node });
    }

    /// Leaves text editing; a changed text is one commit.
    fn finish_edit(&mut self) {
        let Mode::TextEditing { node, .. } = self.mode else {
            return;
        };
        self.mode = Mode::Selected { node, armed: false };
        self.bus.publish(Event::TextEditFinished { id: node });

        let before = self.edit_before.take();
        let after = self.store.node(node).map(|n| n.text.clone());
        if after.is_some() && after != before {
            self.commit("edit text");
        }
    }

    /// Types into the selected node. The first character after a selection
    /// change replaces the text.
    pub fn type_char(&mut self, c: char) {
        if c.is_control() {
            return;
        }
        let mut buf = [0u8; 4];
        self.insert_text(c.encode_utf8(&mut buf));
    }

    fn insert_text(&mut self, text: &str) {
        let (node, armed) = match self.mode {
            Mode::Selected { node, armed } => {
                self.start_edit(node, armed);
                (node, armed)
            }
            Mode::TextEditing { node, armed } => (node, armed),
            _ => return,
        };
        if let Some(n) = self.store.node_mut(node) {
            if armed {
                n.text.clear();
            }
            n.text.push_str(text);
        }
        self.mode = Mode::TextEditing { node, armed: false };
    }

    fn backspace(&mut self) {
        let Mode::TextEditing { node, armed } = self.mode else {
            return;
        };
        if let Some(n) = self.store.node_mut(node) {
            if armed {
                n.text.clear();
            } else {
                n.text.pop();
            }
        }
        self.mode = Mode::TextEditing { node, armed: false };
    }

    pub fn key_down(&mut self, key: Key, modifiers: Modifiers) {
        match key {
            Key::Char(c) if modifiers.command => match c.to_ascii_lowercase() {
                'z' if modifiers.shift => {
                    self.redo();
                }
                'z' => {
                    self.undo();
                }
                'y' => {
                    self.redo();
                }
                _ => {}
            },
            Key::Char(c) => self.type_char(c),
            Key::Escape => self.reset(),
            Key::Delete => self.delete_selected(),
            Key::Backspace => self.backspace(),
            Key::Tab => self.add_child(),
            Key::Enter => self.enter(modifiers.shift),
            Key::Plus => self.adjust(1.0, modifiers.command),
            Key::Minus => self.adjust(-1.0, modifiers.command),
        }
    }

    fn enter(&mut self, line_break: bool) {
        match self.mode {
            Mode::TextEditing { .. } if line_break => self.insert_text("\n"),
            Mode::TextEditing { node, .. } => {
                self.finish_edit();
                if self.store.parent_of(node).is_some() {
                    self.add_sibling(node);
                }
            }
            Mode::Selected { node, .. } => {
                if self.store.parent_of(node).is_some() {
                    self.add_sibling(node);
                } else {
                    self.start_edit(node, false);
                }
            }
            _ => {}
        }
    }

    fn delete_selected(&mut self) {
        let Some(node) = self.mode.target() else {
            return;
        };
        // Deleting discards any text edit in progress rather than committing it first.
        self.edit_before = None;
        match self.store.delete_subtree(node) {
            Ok(removed) => {
                self.set_mode(Mode::Idle);
                self.bus.publish(Event::NodesDeleted {
                    root: node,
                    count: removed.len(),
                });
                self.commit("delete");
            }
            Err(e) => tracing::debug!("delete of {} ignored: {}", node, e),
        }
    }

    /// `+`/`-`: font size on annotations, radius elsewhere, image scale with the command modifier.
    fn adjust(&mut self, direction: f32, image: bool) {
        let Mode::Selected { node, .. } = self.mode else {
            return;
        };
        let adjust = self.settings.adjust.clone();
        let Some(n) = self.store.node_mut(node) else {
            return;
        };

        let label = if image {
            if n.image.is_none() {
                return;
            }
            let old = n.image_scale;
            n.image_scale = (old + direction * adjust.image_scale_step)
                .clamp(adjust.image_scale_min, adjust.image_scale_max);
            (n.image_scale != old).then_some("scale image")
        } else if let Some(old) = n.font_size() {
            let new = (old + direction * adjust.font_step).clamp(adjust.font_min, adjust.font_max);
            (n.set_font_size(new) && new != old).then_some("resize text")
        } else if let Some(old) = n.radius() {
            let new =
                (old + direction * adjust.radius_step).clamp(adjust.radius_min, adjust.radius_max);
            (n.set_radius(new) && new != old).then_some("resize node")
        } else {
            None
        };

        if let Some(label) = label {
            self.commit(label);
        }
    }

    fn insert(&mut self, node: Node) -> Option<NodeId> {
        match self.store.insert_node(node) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!("Failed to insert node: {}", e);
                None
            }
        }
    }

    /// Offset for a new child of `parent`, mirrored when `parent` sits left of its own parent.
    fn child_offset(&self, parent: NodeId) -> Vec2 {
        let mut offset = self.settings.layout.child_offset;
        let left_of_parent = self
            .store
            .parent_of(parent)
            .and_then(|gp| self.store.node(gp))
            .zip(self.store.node(parent))
            .is_some_and(|(gp, p)| p.position.x < gp.position.x);
        if left_of_parent {
            offset.x = -offset.x;
        }
        offset
    }

    /// Colour a new child of `parent` starts with.
    fn child_color(&self, parent: &Node) -> Color {
        match parent.kind {
            NodeKind::Container { .. } => self.settings.nodes.leaf_color,
            _ => parent.color,
        }
    }

    /// Creates a leaf near `start` (placement-probed) and hangs it under `parent`.
    fn spawn_child(
        &mut self,
        parent: NodeId,
        start: Vec2,
        color: Color,
        text: String,
        origin: NodeOrigin,
    ) -> Option<NodeId> {
        let mut node = Node::new(
            self.store.allocate_id(),
            NodeKind::leaf(self.settings.nodes.base_unit),
            start,
        )
        .with_text(text)
        .with_color(color);
        node.position = self.settings.placement.place(&self.store, &node, start).position();

        let id = self.insert(node)?;
        if let Err(e) = self.store.create_edge(parent, id) {
            tracing::error!("Fresh node {} could not be attached to {}: {}", id, parent, e);
            if let Err(e) = self.store.delete_subtree(id) {
                tracing::error!("Failed to roll back unattached node {}: {}", id, e);
            }
            return None;
        }
        if let Some(p) = self.store.node_mut(parent) {
            p.folded = false;
        }
        self.bus.publish(Event::NodeCreated {
            id,
            parent: Some(parent),
            origin,
        });
        Some(id)
    }

    fn add_child(&mut self) {
        self.finish_edit();
        let Some(parent) = self.mode.target() else {
            return;
        };
        let Some(parent_node) = self.store.node(parent) else {
            return;
        };
        if parent_node.is_annotation() {
            tracing::debug!("annotation {} cannot take children", parent);
            return;
        }
        let start = parent_node.position + self.child_offset(parent);
        let color = self.child_color(parent_node);
        let label = self.settings.nodes.child_label.clone();

        if let Some(child) = self.spawn_child(parent, start, color, label, NodeOrigin::Child) {
            self.commit("add child");
            self.start_edit(child, true);
        }
    }

    fn add_sibling(&mut self, of: NodeId) {
        let Some(parent) = self.store.parent_of(of) else {
            return;
        };
        let Some(node) = self.store.node(of) else {
            return;
        };
        let start = node.position + self.settings.layout.sibling_offset;
        let color = if node.is_annotation() {
            self.settings.nodes.leaf_color
        } else {
            node.color
        };
        let label = self.settings.nodes.child_label.clone();

        if let Some(sibling) = self.spawn_child(parent, start, color, label, NodeOrigin::Sibling) {
            self.commit("add sibling");
            self.start_edit(sibling, true);
        }
    }

    fn add_annotation(&mut self, pos: Vec2) {
        let defaults = &self.settings.nodes;
        let kind = NodeKind::annotation(defaults.font_size);
        let node = Node::new(self.store.allocate_id(), kind, pos)
            .with_text(defaults.annotation_label.clone())
            .with_color(defaults.color_for(&kind));
        let Some(id) = self.insert(node) else {
            return;
        };
        self.bus.publish(Event::NodeCreated {
            id,
            parent: None,
            origin: NodeOrigin::Annotation,
        });
        self.commit("add text");
        self.start_edit(id, true);
    }

    /// Primary press selects and starts a drag; secondary press starts a connection.
    pub fn pointer_down(&mut self, pos: Vec2, button: PointerButton) {
        if matches!(self.mode, Mode::Dragging { .. } | Mode::ConnectingEdge { .. }) {
            return;
        }
        self.finish_edit();
        let hit = self.hit_tester.hit_test(&self.store, pos).node();

        match (button, hit) {
            (PointerButton::Primary, Some(id)) => {
                let armed = self.mode.selected() != Some(id) || self.mode.armed();
                match DragGesture::begin(&self.store, id, pos) {
                    Some(gesture) => self.set_mode(Mode::Dragging { gesture, armed }),
                    None => self.set_mode(Mode::Selected { node: id, armed }),
                }
            }
            (PointerButton::Primary, None) => self.set_mode(Mode::Idle),
            (PointerButton::Secondary, Some(from)) => {
                self.set_mode(Mode::ConnectingEdge { from, cursor: pos })
            }
            (PointerButton::Secondary, None) => {}
        }
    }

    pub fn pointer_move(&mut self, pos: Vec2) {
        match &mut self.mode {
            Mode::Dragging { gesture, .. } => gesture.update(&mut self.store, pos),
            Mode::ConnectingEdge { cursor, .. } => *cursor = pos,
            _ => {}
        }
    }

    pub fn pointer_up(&mut self, pos: Vec2) {
        match std::mem::replace(&mut self.mode, Mode::Idle) {
            Mode::Dragging { gesture, armed } => {
                let node = gesture.node();
                let report = gesture.finish(&mut self.store, pos, &self.hit_tester);
                self.mode = Mode::Selected { node, armed };
                match report.outcome {
                    DropOutcome::Unmoved => {}
                    DropOutcome::Moved => self.commit("move"),
                    DropOutcome::Reparented { previous, parent } => {
                        self.bus.publish(Event::Reparented {
                            node,
                            previous,
                            parent,
                        });
                        self.commit("reparent");
                    }
                }
            }
            Mode::ConnectingEdge { from, .. } => {
                self.mode = Mode::Selected {
                    node: from,
                    armed: true,
                };
                self.connect(from, pos);
            }
            other => self.mode = other,
        }
    }

    /// Adds `from -> target` for the node under `pos`. Invalid edges are ignored.
    fn connect(&mut self, from: NodeId, pos: Vec2) {
        let Some(target) = self
            .hit_tester
            .hit_test_excluding(&self.store, pos, from)
            .node()
        else {
            return;
        };
        if self.store.node(from).is_none_or(Node::is_annotation) {
            tracing::debug!("connection from {} ignored: not a parent kind", from);
            return;
        }
        match self.store.create_edge(from, target) {
            Ok(()) => {
                self.bus.publish(Event::EdgeCreated {
                    parent: from,
                    child: target,
                });
                self.commit("connect");
            }
            Err(e) => tracing::debug!("connection {} -> {} ignored: {}", from, target, e),
        }
    }

    /// On a node with children: toggle its fold. On another node: edit its
    /// text. On empty canvas: new annotation.
    pub fn double_click(&mut self, pos: Vec2) {
        if matches!(self.mode, Mode::Dragging { .. } | Mode::ConnectingEdge { .. }) {
            return;
        }
        self.finish_edit();
        match self.hit_tester.hit_test(&self.store, pos).node() {
            Some(id) if self.store.has_children(id) => {
                self.toggle_fold(id);
            }
            Some(id) => {
                self.select(Some(id));
                self.start_edit(id, false);
            }
            None => self.add_annotation(pos),
        }
    }

    /// Flips the fold flag of a node that has children. Returns whether anything changed.
    pub fn toggle_fold(&mut self, id: NodeId) -> bool {
        self.finish_edit();
        if !self.store.has_children(id) {
            return false;
        }
        let Some(node) = self.store.node_mut(id) else {
            return false;
        };
        node.folded = !node.folded;
        let folded = node.folded;
        self.bus.publish(Event::FoldToggled { id, folded });

        if let Some(selected) = self.mode.selected()
            && !is_visible(&self.store, selected)
        {
            self.set_mode(Mode::Idle);
        }
        self.commit(if folded { "fold" } else { "unfold" });
        true
    }

    /// Paints the selected subtree. Annotations below the selection keep their colour.
    pub fn set_color(&mut self, color: Color) {
        self.finish_edit();
        let Some(id) = self.mode.target() else {
            return;
        };
        let Some(annotation) = self.store.node(id).map(Node::is_annotation) else {
            return;
        };
        if annotation {
            if let Some(node) = self.store.node_mut(id) {
                node.color = color;
            }
        } else {
            propagate_color(&mut self.store, id, color);
        }
        self.commit("color");
    }

    pub fn set_background(&mut self, color: Color) {
        self.finish_edit();
        if self.store.background() == color {
            return;
        }
        self.store.set_background(color);
        self.commit("background");
    }

    pub fn set_link(&mut self, link: Option<String>) {
        self.finish_edit();
        let Some(id) = self.mode.target() else {
            return;
        };
        let link = link.filter(|l| !l.trim().is_empty());
        let Some(node) = self.store.node_mut(id) else {
            return;
        };
        if node.link == link {
            return;
        }
        node.link = link;
        self.commit("link");
    }

    /// Pan/zoom. Carried in snapshots but never a commit of its own.
    pub fn set_camera(&mut self, camera: Camera) {
        self.store.set_camera(camera);
    }

    pub fn paste(&mut self, content: ClipboardContent) {
        match content {
            ClipboardContent::Text(text) => self.paste_text(&text),
            ClipboardContent::Image(bytes) => self.paste_image(&bytes),
        }
    }

    fn paste_text(&mut self, text: &str) {
        if matches!(self.mode, Mode::TextEditing { .. }) {
            self.insert_text(text);
            return;
        }
        let Mode::Selected { node: selected, .. } = self.mode else {
            return;
        };
        let Some(intake) = classify_text(text) else {
            return;
        };

        match intake {
            TextIntake::Link(url) => self.set_link(Some(url)),
            TextIntake::Chunks(chunks) => {
                let Some(parent) = self.store.node(selected) else {
                    return;
                };
                if parent.is_annotation() {
                    tracing::debug!("paste into annotation {} skipped", selected);
                    return;
                }
                let mut start = parent.position + self.child_offset(selected);
                let color = self.child_color(parent);

                let mut created = 0;
                for chunk in chunks {
                    let Some(id) = self.spawn_child(selected, start, color, chunk, NodeOrigin::Paste)
                    else {
                        break;
                    };
                    created += 1;
                    if let Some(node) = self.store.node(id) {
                        start = node.position + self.settings.layout.sibling_offset;
                    }
                }
                if created > 0 {
                    self.commit("paste");
                }
            }
        }
    }

    /// Attaches an image to the selected node, scaled to fit it. Decoding
    /// happens in the background; see [`Self::poll_decoded`].
    fn paste_image(&mut self, bytes: &[u8]) {
        self.finish_edit();
        let Some(id) = self.mode.target() else {
            return;
        };
        let (width, height) = match image_dimensions(bytes) {
            Ok(dims) => dims,
            Err(e) => {
                tracing::warn!("Pasted image rejected: {}", e);
                self.bus.publish(Event::ImageFailed {
                    id,
                    error: e.to_string(),
                });
                return;
            }
        };
        let adjust = self.settings.adjust.clone();
        let encoded: Arc<str> = Arc::from(encode_image(bytes));
        let Some(node) = self.store.node_mut(id) else {
            return;
        };
        let bounds = node.footprint().bounds();
        let fit = bounds.width().min(bounds.height()) / width.max(height).max(1) as f32;
        node.image_scale = fit.clamp(adjust.image_scale_min, adjust.image_scale_max);
        node.image = Some(NodeImage::new(encoded.clone()));

        self.commit("attach image");
        self.decoder.request(id, encoded);
    }

    fn request_missing_decodes(&mut self) {
        let missing: Vec<(NodeId, Arc<str>)> = self
            .store
            .nodes()
            .filter_map(|n| {
                n.image
                    .as_ref()
                    .filter(|img| !img.is_decoded())
                    .map(|img| (n.id, img.encoded.clone()))
            })
            .collect();
        for (id, encoded) in missing {
            self.decoder.request(id, encoded);
        }
    }

    /// Applies finished decodes. Returns how many bitmaps were attached.
    pub fn poll_decoded(&mut self) -> usize {
        let outcomes = self.decoder.try_results();
        self.apply_decoded(outcomes)
    }

    /// Blocks until outstanding decodes finish (or `timeout`), then applies them.
    pub fn wait_for_decodes(&mut self, timeout: Duration) -> usize {
        let outcomes = self.decoder.wait(timeout);
        self.apply_decoded(outcomes)
    }

    fn apply_decoded(&mut self, outcomes: Vec<DecodeOutcome>) -> usize {
        let mut applied = 0;
        for outcome in outcomes {
            let id = outcome.node;
            let current = self.store.node_mut(id).filter(|n| {
                n.image
                    .as_ref()
                    .is_some_and(|img| *img.encoded == *outcome.encoded)
            });
            let Some(node) = current else {
                tracing::debug!("discarding stale image decode for {}", id);
                self.bus.publish(Event::ImageDiscarded { id });
                continue;
            };

            match outcome.result {
                Ok(bitmap) => {
                    if let Some(image) = node.image.as_mut() {
                        image.bitmap = Some(bitmap);
                    }
                    applied += 1;
                    self.bus.publish(Event::ImageApplied { id });
                }
                Err(e) => {
                    tracing::warn!("Image on {} could not be decoded, dropping it: {}", id, e);
                    node.image = None;
                    node.image_scale = 1.0;
                    self.bus.publish(Event::ImageFailed {
                        id,
                        error: e.to_string(),
                    });
                }
            }
        }
        applied
    }
}
