use super::*;
use mindmap_core::{Edge, GraphSnapshot, Node, NodeId, NodeKind, Vec2};

fn sample_snapshot() -> GraphSnapshot {
    let root = Node::new(NodeId(1), NodeKind::container(40.0), Vec2::ZERO).with_text("root");
    let child = Node::new(NodeId(2), NodeKind::leaf(40.0), Vec2::new(120.0, 0.0)).with_text("child");
    GraphSnapshot {
        nodes: vec![root, child],
        edges: vec![Edge::new(NodeId(1), NodeId(2))],
        ..GraphSnapshot::default()
    }
}

#[test]
fn test_kv_table_is_created() -> Result<(), StorageError> {
    let storage = Storage::new_in_memory()?;

    let mut stmt = storage
        .conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    assert!(tables.iter().any(|name| name == "kv"));
    assert_eq!(storage.schema_version()?, SCHEMA_VERSION);

    Ok(())
}

#[test]
fn test_put_get_delete() -> Result<(), StorageError> {
    let storage = Storage::new_in_memory()?;
    assert_eq!(storage.get("a")?, None);

    storage.put("a", "1")?;
    storage.put("b", "2")?;
    storage.put("a", "3")?;
    assert_eq!(storage.get("a")?.as_deref(), Some("3"));
    assert_eq!(storage.keys()?, vec!["a".to_string(), "b".to_string()]);
    assert!(storage.updated_at("a")?.is_some());

    assert!(storage.delete("a")?);
    assert!(!storage.delete("a")?);
    assert_eq!(storage.get("a")?, None);
    assert_eq!(storage.updated_at("a")?, None);

    Ok(())
}

#[test]
fn test_missing_or_empty_document_loads_as_none() -> Result<(), StorageError> {
    let mut storage = Storage::new_in_memory()?;
    assert!(storage.load()?.is_none());

    storage.put(DOCUMENT_KEY, "   ")?;
    assert!(storage.load()?.is_none());

    Ok(())
}

#[test]
fn test_document_survives_reopen() -> Result<(), StorageError> {
    let dir = tempfile::tempdir().map_err(|e| StorageError::Other(e.to_string()))?;
    let path = dir.path().join("mindmap.db");
    let document = Document::from_snapshot(&sample_snapshot());

    {
        let mut storage = Storage::open(&path)?;
        storage.save(&document)?;
    }

    let mut reopened = Storage::open(&path)?;
    let loaded = reopened.load()?.ok_or_else(|| StorageError::Other("nothing saved".into()))?;
    assert_eq!(loaded.document_id, document.document_id);
    assert_eq!(loaded.nodes, document.nodes);
    assert_eq!(loaded.edges, vec![[0, 1]]);

    Ok(())
}

#[test]
fn test_corrupt_document_is_reported() -> Result<(), StorageError> {
    let storage = Storage::new_in_memory()?;
    storage.put(DOCUMENT_KEY, "{not json")?;

    let result = storage.load_document();
    assert!(matches!(result, Err(StorageError::Document(DocumentError::Json(_)))));

    Ok(())
}

#[test]
fn test_newer_schema_is_rejected() -> Result<(), StorageError> {
    let dir = tempfile::tempdir().map_err(|e| StorageError::Other(e.to_string()))?;
    let path = dir.path().join("future.db");
    {
        let storage = Storage::open(&path)?;
        storage.set_schema_version(SCHEMA_VERSION + 1)?;
    }

    assert!(matches!(Storage::open(&path), Err(StorageError::Other(_))));
    Ok(())
}
