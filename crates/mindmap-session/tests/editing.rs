use anyhow::{Context, Result};
use mindmap_core::{Edge, GraphSnapshot, NodeId, Vec2};
use mindmap_events::{Event, EventBus};
use mindmap_session::{
    ImageDecoder, Key, Modifiers, Mode, PointerButton, Session, SessionSettings,
};

fn session() -> Session {
    session_with(SessionSettings::default())
}

fn session_with(settings: SessionSettings) -> Session {
    Session::with_parts(settings, None, ImageDecoder::inline(), EventBus::new())
}

fn root(session: &Session) -> Result<NodeId> {
    session.store().roots().first().copied().context("no root")
}

fn position(session: &Session, id: NodeId) -> Result<Vec2> {
    session
        .store()
        .node(id)
        .map(|n| n.position)
        .with_context(|| format!("{id} missing"))
}

/// Selects `parent` and presses Tab; returns the new child.
fn add_child(session: &mut Session, parent: NodeId) -> Result<NodeId> {
    session.select(Some(parent));
    session.key_down(Key::Tab, Modifiers::NONE);
    session.editing().context("new child is not being edited")
}

fn drag(session: &mut Session, from: Vec2, to: Vec2) {
    session.pointer_down(from, PointerButton::Primary);
    session.pointer_move(to);
    session.pointer_up(to);
}

fn labels(session: &Session) -> Vec<&str> {
    session
        .history()
        .entries()
        .iter()
        .map(|e| e.label.as_str())
        .collect()
}

/// Undo must land exactly on `before` and redo exactly back on the current state.
fn assert_undo_redo_exact(session: &mut Session, before: &GraphSnapshot) -> Result<()> {
    let after = session.store().snapshot();
    anyhow::ensure!(session.undo(), "undo refused");
    assert_eq!(&session.store().snapshot(), before);
    anyhow::ensure!(session.redo(), "redo refused");
    assert_eq!(session.store().snapshot(), after);
    Ok(())
}

#[test]
fn test_fresh_session_has_one_root() -> Result<()> {
    let session = session();
    let root = root(&session)?;
    let node = session.store().node(root).context("root")?;

    assert_eq!(session.store().len(), 1);
    assert_eq!(node.text, "Central idea");
    assert_eq!(node.position, Vec2::ZERO);
    assert!(!session.history().can_undo());
    assert!(matches!(session.mode(), Mode::Idle));
    Ok(())
}

#[test]
fn test_build_drag_delete_undo() -> Result<()> {
    let mut session = session();
    let r = root(&session)?;

    let c1 = add_child(&mut session, r)?;
    let c2 = add_child(&mut session, c1)?;
    assert_eq!(session.store().parent_of(c1), Some(r));
    assert_eq!(session.store().parent_of(c2), Some(c1));
    assert_eq!(position(&session, c1)?, Vec2::new(180.0, 0.0));
    assert_eq!(position(&session, c2)?, Vec2::new(360.0, 0.0));

    drag(&mut session, Vec2::new(180.0, 0.0), Vec2::new(280.0, 50.0));
    assert_eq!(position(&session, c1)?, Vec2::new(280.0, 50.0));
    assert_eq!(position(&session, c2)?, Vec2::new(460.0, 50.0));
    assert_eq!(session.store().parent_of(c1), Some(r));
    assert_eq!(session.history().undo_label(), Some("move"));

    assert_eq!(session.selected(), Some(c1));
    session.key_down(Key::Delete, Modifiers::NONE);
    assert!(!session.store().has_children(r));
    assert!(session.store().edges().is_empty());
    assert_eq!(session.store().len(), 1);
    assert_eq!(session.selected(), None);

    assert!(session.undo());
    assert_eq!(session.store().len(), 3);
    assert_eq!(position(&session, c1)?, Vec2::new(280.0, 50.0));
    assert_eq!(position(&session, c2)?, Vec2::new(460.0, 50.0));
    let edges = session.store().edges();
    assert!(edges.contains(&Edge::new(r, c1)));
    assert!(edges.contains(&Edge::new(c1, c2)));
    assert_eq!(edges.len(), 2);
    Ok(())
}

#[test]
fn test_redo_reapplies_and_commit_drops_redo() -> Result<()> {
    let mut session = session();
    let r = root(&session)?;
    let c1 = add_child(&mut session, r)?;

    assert!(session.undo());
    assert!(!session.store().contains(c1));
    assert!(session.history().can_redo());

    assert!(session.redo());
    assert!(session.store().contains(c1));
    assert!(!session.redo());

    assert!(session.undo());
    add_child(&mut session, r)?;
    assert!(!session.history().can_redo());
    Ok(())
}

#[test]
fn test_ids_are_not_reused_after_undo() -> Result<()> {
    let mut session = session();
    let r = root(&session)?;
    let first = add_child(&mut session, r)?;
    session.undo();
    let second = add_child(&mut session, r)?;
    assert_ne!(first, second);
    Ok(())
}

#[test]
fn test_history_limit_from_settings() -> Result<()> {
    let settings = SessionSettings {
        history_limit: 3,
        ..SessionSettings::default()
    };
    let mut session = session_with(settings);
    let r = root(&session)?;
    for _ in 0..5 {
        add_child(&mut session, r)?;
    }
    assert_eq!(session.history().len(), 3);

    let mut undos = 0;
    while session.undo() {
        undos += 1;
    }
    assert_eq!(undos, 2);
    // Three of the five children survive the oldest entries falling off.
    assert_eq!(session.store().children_of(r).len(), 3);
    Ok(())
}

#[test]
fn test_fold_hides_descendants_and_drops_hidden_selection() -> Result<()> {
    let mut session = session();
    let r = root(&session)?;
    let c1 = add_child(&mut session, r)?;
    let c2 = add_child(&mut session, c1)?;

    session.select(Some(c2));
    assert!(session.toggle_fold(c1));
    assert_eq!(session.selected(), None);

    let frame = session.frame();
    assert!(frame.node(c1).is_some());
    assert!(frame.node(c2).is_none());
    assert_eq!(frame.edges, vec![Edge::new(r, c1)]);
    assert_eq!(frame.fold_badges, vec![(c1, 1)]);

    session.select(Some(c2));
    assert_eq!(session.selected(), None);

    assert!(!session.toggle_fold(c2));
    assert!(session.toggle_fold(c1));
    assert!(session.frame().node(c2).is_some());
    Ok(())
}

#[test]
fn test_double_click_folds_parent_and_adds_annotation() -> Result<()> {
    let mut session = session();
    let r = root(&session)?;
    let c1 = add_child(&mut session, r)?;

    session.double_click(Vec2::ZERO);
    assert!(session.store().node(r).context("root")?.folded);
    assert!(session.frame().node(c1).is_none());

    session.double_click(Vec2::new(-300.0, -300.0));
    let note = session.editing().context("annotation not in edit")?;
    let node = session.store().node(note).context("annotation")?;
    assert!(node.is_annotation());
    assert_eq!(node.position, Vec2::new(-300.0, -300.0));
    assert_eq!(session.store().parent_of(note), None);
    Ok(())
}

#[test]
fn test_drag_onto_node_reparents() -> Result<()> {
    let mut session = session();
    let r = root(&session)?;
    let a = add_child(&mut session, r)?;
    let b = add_child(&mut session, r)?;
    let a_pos = position(&session, a)?;
    let b_pos = position(&session, b)?;
    assert_ne!(a_pos, b_pos);

    drag(&mut session, b_pos, a_pos);
    assert_eq!(session.store().parent_of(b), Some(a));
    assert_eq!(session.history().undo_label(), Some("reparent"));
    assert!(session.events().drain().iter().any(|e| matches!(
        e,
        Event::Reparented { node, previous: Some(p), parent } if *node == b && *p == r && *parent == a
    )));

    // b now sits on top of a; dropping it onto its own parent only moves it.
    let b_pos = position(&session, b)?;
    drag(&mut session, b_pos, b_pos + Vec2::new(0.0, 5.0));
    assert_eq!(session.store().parent_of(b), Some(a));
    assert_eq!(session.history().undo_label(), Some("move"));

    assert!(session.undo());
    assert!(session.undo());
    assert_eq!(session.store().parent_of(b), Some(r));
    session.store().check_invariants()?;
    Ok(())
}

#[test]
fn test_click_without_motion_is_not_a_commit() -> Result<()> {
    let mut session = session();
    let r = root(&session)?;
    let before = session.history().len();

    session.pointer_down(Vec2::ZERO, PointerButton::Primary);
    session.pointer_up(Vec2::ZERO);
    assert_eq!(session.selected(), Some(r));
    assert_eq!(session.history().len(), before);

    session.pointer_down(Vec2::new(500.0, 500.0), PointerButton::Primary);
    session.pointer_up(Vec2::new(500.0, 500.0));
    assert_eq!(session.selected(), None);
    Ok(())
}

#[test]
fn test_right_drag_connects_and_rejects_cycles() -> Result<()> {
    let mut session = session();
    let r = root(&session)?;
    let a = add_child(&mut session, r)?;
    session.double_click(Vec2::new(0.0, 300.0));
    let note = session.editing().context("annotation")?;
    let note_pos = position(&session, note)?;
    let a_pos = position(&session, a)?;

    session.pointer_down(a_pos, PointerButton::Secondary);
    session.pointer_move(note_pos);
    assert!(session.frame().rubber_band.is_some());
    session.pointer_up(note_pos);
    assert_eq!(session.store().parent_of(note), Some(a));
    assert_eq!(session.history().undo_label(), Some("connect"));

    // a -> r would close a loop.
    let before = session.history().len();
    session.pointer_down(a_pos, PointerButton::Secondary);
    session.pointer_up(Vec2::ZERO);
    assert_eq!(session.store().parent_of(r), None);
    assert_eq!(session.history().len(), before);
    session.store().check_invariants()?;
    Ok(())
}

#[test]
fn test_typing_replaces_then_appends() -> Result<()> {
    let mut session = session();
    let r = root(&session)?;
    let child = add_child(&mut session, r)?;

    for c in "Hi".chars() {
        session.key_down(Key::Char(c), Modifiers::NONE);
    }
    assert_eq!(session.store().node(child).context("child")?.text, "Hi");

    session.key_down(Key::Backspace, Modifiers::NONE);
    assert_eq!(session.store().node(child).context("child")?.text, "H");

    // Enter finishes the edit and opens a sibling.
    session.key_down(Key::Enter, Modifiers::NONE);
    let sibling = session.editing().context("sibling")?;
    assert_ne!(sibling, child);
    assert_eq!(session.store().parent_of(sibling), Some(r));
    assert!(
        session
            .history()
            .entries()
            .iter()
            .any(|e| e.label == "edit text")
    );

    // Reselecting the root arms replacement.
    session.select(Some(r));
    session.key_down(Key::Char('X'), Modifiers::NONE);
    assert_eq!(session.store().node(r).context("root")?.text, "X");
    Ok(())
}

#[test]
fn test_enter_on_root_edits_and_shift_enter_breaks_line() -> Result<()> {
    let mut session = session();
    let r = root(&session)?;
    session.select(Some(r));
    session.key_down(Key::Enter, Modifiers::NONE);
    assert_eq!(session.editing(), Some(r));

    session.key_down(Key::Enter, Modifiers::SHIFT);
    session.key_down(Key::Char('!'), Modifiers::NONE);
    assert_eq!(
        session.store().node(r).context("root")?.text,
        "Central idea\n!"
    );
    session.key_down(Key::Enter, Modifiers::NONE);
    assert_eq!(session.editing(), None);
    assert_eq!(session.store().len(), 1);
    Ok(())
}

#[test]
fn test_shortcuts_route_to_history() -> Result<()> {
    let mut session = session();
    let r = root(&session)?;
    let child = add_child(&mut session, r)?;

    session.key_down(Key::Char('z'), Modifiers::COMMAND);
    assert!(!session.store().contains(child));
    session.key_down(Key::Char('y'), Modifiers::COMMAND);
    assert!(session.store().contains(child));
    session.key_down(Key::Char('z'), Modifiers::COMMAND);
    session.key_down(
        Key::Char('Z'),
        Modifiers {
            shift: true,
            command: true,
        },
    );
    assert!(session.store().contains(child));
    Ok(())
}

#[test]
fn test_escape_resets_and_is_undoable() -> Result<()> {
    let mut session = session();
    let r = root(&session)?;
    add_child(&mut session, r)?;
    add_child(&mut session, r)?;

    session.key_down(Key::Escape, Modifiers::NONE);
    assert_eq!(session.store().len(), 1);
    assert!(!session.store().contains(r));
    assert!(session.events().drain().contains(&Event::GraphReset));

    assert!(session.undo());
    assert_eq!(session.store().len(), 3);
    Ok(())
}

#[test]
fn test_plus_minus_resize_selected() -> Result<()> {
    let mut session = session();
    let r = root(&session)?;
    session.select(Some(r));

    session.key_down(Key::Plus, Modifiers::NONE);
    assert_eq!(session.store().node(r).context("root")?.radius(), Some(45.0));
    session.key_down(Key::Minus, Modifiers::NONE);
    session.key_down(Key::Minus, Modifiers::NONE);
    assert_eq!(session.store().node(r).context("root")?.radius(), Some(35.0));
    assert_eq!(session.history().undo_label(), Some("resize node"));

    // No image, nothing to scale.
    let before = session.history().len();
    session.key_down(Key::Plus, Modifiers::COMMAND);
    assert_eq!(session.history().len(), before);
    Ok(())
}

#[test]
fn test_color_propagates_below_selection() -> Result<()> {
    let mut session = session();
    let r = root(&session)?;
    let c1 = add_child(&mut session, r)?;
    let c2 = add_child(&mut session, c1)?;
    let red = mindmap_core::Color::rgb(0xff, 0, 0);

    session.select(Some(c1));
    session.set_color(red);
    assert_eq!(session.store().node(c1).context("c1")?.color, red);
    assert_eq!(session.store().node(c2).context("c2")?.color, red);
    assert_ne!(session.store().node(r).context("root")?.color, red);

    session.set_background(red);
    assert_eq!(session.store().background(), red);
    assert!(session.undo());
    assert_ne!(session.store().background(), red);
    Ok(())
}

#[test]
fn test_fold_while_editing_commits_the_edit_separately() -> Result<()> {
    let mut session = session();
    let r = root(&session)?;
    let c1 = add_child(&mut session, r)?;
    let c2 = add_child(&mut session, c1)?;
    session.key_down(Key::Char('X'), Modifiers::NONE);
    assert_eq!(session.editing(), Some(c2));

    assert!(session.toggle_fold(c1));
    assert_eq!(
        labels(&session),
        ["initial", "add child", "add child", "edit text", "fold"]
    );

    assert!(session.undo());
    assert!(!session.store().node(c1).context("c1")?.folded);
    assert_eq!(session.store().node(c2).context("c2")?.text, "X");
    Ok(())
}

#[test]
fn test_color_while_editing_commits_text_once() -> Result<()> {
    let mut session = session();
    let r = root(&session)?;
    let c1 = add_child(&mut session, r)?;
    session.key_down(Key::Char('X'), Modifiers::NONE);
    let red = mindmap_core::Color::rgb(0xff, 0, 0);

    session.set_color(red);
    session.select(None);
    assert_eq!(labels(&session), ["initial", "add child", "edit text", "color"]);

    let node = session.store().node(c1).context("c1")?;
    assert_eq!(node.text, "X");
    assert_eq!(node.color, red);
    Ok(())
}

#[test]
fn test_undo_redo_restore_exact_snapshots() -> Result<()> {
    let mut session = session();
    let r = root(&session)?;
    let c1 = add_child(&mut session, r)?;
    let a = add_child(&mut session, c1)?;
    let b = add_child(&mut session, r)?;
    session.select(None);

    let before = session.store().snapshot();
    let c1_pos = position(&session, c1)?;
    drag(&mut session, c1_pos, c1_pos + Vec2::new(20.0, -30.0));
    assert_eq!(session.history().undo_label(), Some("move"));
    assert_undo_redo_exact(&mut session, &before)?;

    // Dropping c1 just left of b puts it on the other side of its new
    // parent, so its subtree flips over.
    let before = session.store().snapshot();
    let c1_pos = position(&session, c1)?;
    let target = position(&session, b)? + Vec2::new(-10.0, 0.0);
    drag(&mut session, c1_pos, target);
    assert_eq!(session.store().parent_of(c1), Some(b));
    assert_eq!(session.history().undo_label(), Some("reparent"));
    assert!(position(&session, a)?.x < position(&session, c1)?.x);
    assert_undo_redo_exact(&mut session, &before)?;

    let before = session.store().snapshot();
    assert!(session.toggle_fold(b));
    assert_undo_redo_exact(&mut session, &before)?;
    session.store().check_invariants()?;
    Ok(())
}
