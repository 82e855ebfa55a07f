use mindmap_core::{BASE_UNIT, Color, DEFAULT_BACKGROUND, DEFAULT_FONT_SIZE, NodeKind, Vec2};
use mindmap_graph::PlacementProbe;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub history_limit: usize,
    #[serde(default)]
    pub nodes: NodeDefaults,
    #[serde(default)]
    pub layout: LayoutSettings,
    #[serde(default)]
    pub placement: PlacementProbe,
    #[serde(default)]
    pub adjust: AdjustSettings,
    /// SQLite file the map is auto-saved to. `None` means the platform data dir.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            history_limit: 50,
            nodes: NodeDefaults::default(),
            layout: LayoutSettings::default(),
            placement: PlacementProbe::default(),
            adjust: AdjustSettings::default(),
            store_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeDefaults {
    pub base_unit: f32,
    pub font_size: f32,
    pub root_label: String,
    pub child_label: String,
    pub annotation_label: String,
    pub container_color: Color,
    pub leaf_color: Color,
    pub annotation_color: Color,
    pub background: Color,
}

impl Default for NodeDefaults {
    fn default() -> Self {
        Self {
            base_unit: BASE_UNIT,
            font_size: DEFAULT_FONT_SIZE,
            root_label: "Central idea".to_string(),
            child_label: "New idea".to_string(),
            annotation_label: "Text".to_string(),
            container_color: NodeKind::container(BASE_UNIT).default_color(),
            leaf_color: NodeKind::leaf(BASE_UNIT).default_color(),
            annotation_color: NodeKind::annotation(DEFAULT_FONT_SIZE).default_color(),
            background: DEFAULT_BACKGROUND,
        }
    }
}

impl NodeDefaults {
    pub fn color_for(&self, kind: &NodeKind) -> Color {
        match kind {
            NodeKind::Container { .. } => self.container_color,
            NodeKind::Leaf { .. } => self.leaf_color,
            NodeKind::Annotation { .. } => self.annotation_color,
        }
    }
}

/// Where new nodes start their placement search, relative to the node they hang off.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    pub child_offset: Vec2,
    pub sibling_offset: Vec2,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            child_offset: Vec2::new(180.0, 0.0),
            sibling_offset: Vec2::new(0.0, 90.0),
        }
    }
}

/// Steps and clamps for `+`/`-`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustSettings {
    pub radius_step: f32,
    pub radius_min: f32,
    pub radius_max: f32,
    pub font_step: f32,
    pub font_min: f32,
    pub font_max: f32,
    pub image_scale_step: f32,
    pub image_scale_min: f32,
    pub image_scale_max: f32,
}

impl Default for AdjustSettings {
    fn default() -> Self {
        Self {
            radius_step: 5.0,
            radius_min: 10.0,
            radius_max: 400.0,
            font_step: 2.0,
            font_min: 8.0,
            font_max: 128.0,
            image_scale_step: 0.1,
            image_scale_min: 0.05,
            image_scale_max: 20.0,
        }
    }
}

impl SessionSettings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mindmap").join("settings.json"))
    }

    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        tracing::info!("Loading settings from {:?}", path);
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(settings) => {
                        tracing::info!("Settings loaded successfully: {:?}", settings);
                        return settings;
                    }
                    Err(e) => tracing::error!("Failed to parse settings: {}", e),
                },
                Err(e) => tracing::error!("Failed to read settings file: {}", e),
            }
        } else {
            tracing::info!("Settings file not found, using defaults");
        }
        Self::default()
    }

    pub fn save(&self) {
        if let Some(path) = Self::config_path()
            && let Err(e) = self.save_to(&path)
        {
            tracing::error!("Failed to save settings to {:?}: {}", path, e);
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent()
            && !dir.exists()
        {
            std::fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
    }

    /// The configured store path, or `<data_dir>/mindmap/mindmap.db`.
    pub fn resolved_store_path(&self) -> Option<PathBuf> {
        self.store_path
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join("mindmap").join("mindmap.db")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SessionSettings::default();
        assert_eq!(settings.history_limit, 50);
        assert_eq!(settings.nodes.base_unit, BASE_UNIT);
        assert_eq!(settings.placement.attempts, 24);
        assert_eq!(settings.placement.step, 30.0);
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"history_limit": 5, "nodes": {"root_label": "Hub"}}"#).unwrap();

        let settings = SessionSettings::load_from(&path);
        assert_eq!(settings.history_limit, 5);
        assert_eq!(settings.nodes.root_label, "Hub");
        assert_eq!(settings.nodes.child_label, "New idea");
        assert_eq!(settings.adjust.radius_step, 5.0);
    }

    #[test]
    fn test_malformed_or_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        assert_eq!(SessionSettings::load_from(&path).history_limit, 50);

        std::fs::write(&path, "{ nope").unwrap();
        assert_eq!(SessionSettings::load_from(&path).history_limit, 50);
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = SessionSettings::default();
        settings.history_limit = 7;
        settings.store_path = Some(dir.path().join("map.db"));
        settings.save_to(&path).unwrap();

        let loaded = SessionSettings::load_from(&path);
        assert_eq!(loaded.history_limit, 7);
        assert_eq!(loaded.store_path, settings.store_path);
        assert_eq!(loaded.resolved_store_path(), settings.store_path);
    }
}
