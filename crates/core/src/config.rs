//! Scanner configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How `find_class` compares a requested name against declarations
    pub class_match: ClassMatch,
    /// Only treat `class X : Base` lines as declarations
    pub require_base_clause: bool,
    /// Default log filter for the command-line tool
    pub log_level: String,
    /// Default export directory
    pub export_dir: Option<PathBuf>,
    /// Recently opened dump files
    pub recent_dumps: Vec<PathBuf>,
    /// Max recent dumps to remember
    pub max_recent_dumps: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            class_match: ClassMatch::Substring,
            require_base_clause: true,
            log_level: "info".to_string(),
            export_dir: None,
            recent_dumps: Vec::new(),
            max_recent_dumps: 10,
        }
    }
}

/// Class name matching mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassMatch {
    /// Name appears anywhere in the declaration line
    Substring,
    /// Name equals the declared class name
    Exact,
}

impl ClassMatch {
    pub fn matches(&self, requested: &str, name: &str, declaration: &str) -> bool {
        match self {
            ClassMatch::Substring => declaration.contains(requested),
            ClassMatch::Exact => name == requested,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config =
            serde_json::from_str(&content).map_err(|e| crate::Error::config(e.to_string()))?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &std::path::Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| crate::Error::config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Add a recent dump
    pub fn add_recent_dump(&mut self, path: PathBuf) {
        self.recent_dumps.retain(|p| p != &path);
        self.recent_dumps.insert(0, path);
        self.recent_dumps.truncate(self.max_recent_dumps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_match_modes() {
        let decl = "public class EnemySpawner : MonoBehaviour // TypeDefIndex: 12";
        assert!(ClassMatch::Substring.matches("Enemy", "EnemySpawner", decl));
        assert!(!ClassMatch::Exact.matches("Enemy", "EnemySpawner", decl));
        assert!(ClassMatch::Exact.matches("EnemySpawner", "EnemySpawner", decl));
    }

    #[test]
    fn test_recent_dumps_are_deduplicated() {
        let mut config = Config {
            max_recent_dumps: 2,
            ..Config::default()
        };
        config.add_recent_dump("a.cs".into());
        config.add_recent_dump("b.cs".into());
        config.add_recent_dump("a.cs".into());
        config.add_recent_dump("c.cs".into());
        assert_eq!(config.recent_dumps, vec![PathBuf::from("c.cs"), PathBuf::from("a.cs")]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dumpcs.json");

        let config = Config {
            class_match: ClassMatch::Exact,
            log_level: "debug".into(),
            ..Config::default()
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.class_match, ClassMatch::Exact);
        assert_eq!(loaded.log_level, "debug");
        assert!(loaded.require_base_clause);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "require_base_clause": false }"#).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert!(!loaded.require_base_clause);
        assert_eq!(loaded.class_match, ClassMatch::Substring);
        assert_eq!(loaded.max_recent_dumps, 10);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Config::load(&path), Err(crate::Error::Config(_))));
    }
}
