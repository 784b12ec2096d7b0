use std::path::{Path, PathBuf};
use std::{env, fs};

use prism_core::{CorrelationEngine, EngineConfig, SessionDataExport};

use crate::error::{Result, StoreError};
use crate::store::Store;

pub const DATA_DIR_ENV: &str = "PRISM_DATA_DIR";
pub const CONFIG_FILE: &str = "prism.toml";
pub const DEFAULT_WORKSPACE: &str = "default";

/// Base directory for all prism storage: `$PRISM_DATA_DIR`, else `~/.prism`.
pub fn default_base_dir() -> PathBuf {
    match env::var_os(DATA_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs_home().join(".prism"),
    }
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Sanitize a workspace name for use as a filename.
fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        DEFAULT_WORKSPACE.to_string()
    } else {
        cleaned
    }
}

/// Read an [`EngineConfig`] from TOML and validate it.
///
/// `path` wins when given and must exist. Otherwise `<base>/prism.toml` is
/// used if present, and the defaults if not.
pub fn load_config(path: Option<&Path>, base_dir: &Path) -> Result<EngineConfig> {
    let (file, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (base_dir.join(CONFIG_FILE), false),
    };

    let config = match fs::read_to_string(&file) {
        Ok(text) => toml::from_str::<EngineConfig>(&text).map_err(|e| {
            StoreError::InvalidData(format!("invalid config {}: {e}", file.display()))
        })?,
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %file.display(), "no config file, using defaults");
            EngineConfig::default()
        }
        Err(e) => return Err(StoreError::io(&file, e)),
    };

    config
        .validate()
        .map_err(|e| StoreError::InvalidData(format!("{}: {e}", file.display())))?;
    Ok(config)
}

/// A named, isolated store.
///
/// Layout:
/// ```text
/// ~/.prism/
/// ├── prism.toml
/// └── workspaces/
///     ├── default.db
///     └── <name>.db
/// ```
pub struct Workspace {
    store: Store,
    name: String,
}

impl Workspace {
    /// Open (creating as needed) the workspace `name` under `base_dir`.
    pub fn open(name: &str, base_dir: &Path) -> Result<Self> {
        let dir = base_dir.join("workspaces");
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let name = sanitize_name(name);
        let store = Store::open(&dir.join(format!("{name}.db")))?;
        tracing::debug!(workspace = %name, "workspace opened");
        Ok(Self { store, name })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            store: Store::open_in_memory()?,
            name: "test".to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn sessions(&self) -> Result<Vec<SessionDataExport>> {
        self.store.load_sessions()
    }

    /// A fresh engine primed with every stored channel payload.
    pub fn engine(&self, config: &EngineConfig) -> Result<CorrelationEngine> {
        let mut engine = CorrelationEngine::new(config.correlation.clone());
        for payload in self.store.load_channel_data()? {
            engine.update_channel_data(payload);
        }
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::{ChannelData, ChannelPair, ConstraintDataPoint, Wavelength};

    fn export(channel: Wavelength, id: &str) -> SessionDataExport {
        SessionDataExport::new(
            id,
            channel,
            0,
            vec![ConstraintDataPoint::new("c", channel, vec![1.0, 2.0])],
        )
    }

    #[test]
    fn test_workspace_isolation() {
        let dir = tempfile::tempdir().unwrap();
        let a = Workspace::open("alpha", dir.path()).unwrap();
        let b = Workspace::open("beta", dir.path()).unwrap();

        a.store().save_session(&export(Wavelength::Quantum, "a")).unwrap();
        assert_eq!(a.sessions().unwrap().len(), 1);
        assert!(b.sessions().unwrap().is_empty());
    }

    #[test]
    fn test_directory_creation() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("nested").join("base");
        let ws = Workspace::open("main", &base).unwrap();
        assert_eq!(ws.name(), "main");
        assert!(base.join("workspaces").join("main.db").exists());
    }

    #[test]
    fn test_reopen_sees_saved_data() {
        let dir = tempfile::tempdir().unwrap();
        {
            let ws = Workspace::open("keep", dir.path()).unwrap();
            ws.store().save_session(&export(Wavelength::Phase, "p")).unwrap();
        }
        let ws = Workspace::open("keep", dir.path()).unwrap();
        assert_eq!(ws.sessions().unwrap()[0].session_id, "p");
    }

    #[test]
    fn test_name_sanitization() {
        assert_eq!(sanitize_name("my ws/../x"), "my_ws____x");
        assert_eq!(sanitize_name("ok-name_1"), "ok-name_1");
        assert_eq!(sanitize_name("   "), DEFAULT_WORKSPACE);
    }

    #[test]
    fn test_engine_primed_from_payloads() {
        let ws = Workspace::open_in_memory().unwrap();
        let store = ws.store();
        store
            .put_channel_data(&ChannelData::from_values(Wavelength::Temporal, &[1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        store
            .put_channel_data(&ChannelData::from_values(Wavelength::Phase, &[2.0, 4.0, 6.0, 8.0]))
            .unwrap();

        let mut engine = ws.engine(&EngineConfig::default()).unwrap();
        let result = engine
            .get_correlation(ChannelPair::new(Wavelength::Temporal, Wavelength::Phase))
            .unwrap();
        assert!((result.correlation - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_config_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(None, dir.path()).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_config_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[projection]\nmethod = \"umap\"\nseed = 7\n\n[correlation]\nbins = 16\n",
        )
        .unwrap();
        let config = load_config(None, dir.path()).unwrap();
        assert_eq!(config.projection.method, prism_core::ProjectionMethod::Umap);
        assert_eq!(config.projection.seed, 7);
        assert_eq!(config.correlation.bins, 16);
        assert_eq!(config.correlation.transfer_entropy_lag, 1);
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = load_config(Some(&missing), dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Io { ref path, .. } if *path == missing), "{err:?}");
    }

    #[test]
    fn test_unwritable_base_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        fs::write(&file, "x").unwrap();
        let err = Workspace::open("w", &file).err().unwrap();
        assert!(matches!(err, StoreError::Io { .. }), "{err:?}");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[projection.pca]\nn_components = 9\n").unwrap();
        let err = load_config(Some(&path), dir.path()).unwrap_err();
        assert!(err.to_string().contains("pca.n_components"), "{err}");
    }
}
