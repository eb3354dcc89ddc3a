use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Layout and tuning knobs for a compound object database.
///
/// The standard [`FactoryTable`](crate::FactoryTable) is derived from this
/// record; every field has a default so a partial TOML file is enough.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdbConfig {
    /// Archive store directory, relative to the objects root.
    pub pack_dir: String,
    /// Loose store directory, relative to the objects root. Empty means the
    /// root itself.
    pub loose_dir: String,
    /// Alternates file, relative to the objects root.
    pub alternates_file: String,
    /// zstd level for newly written loose objects.
    pub compression_level: i32,
    /// How many alternates-of-alternates are followed before giving up.
    pub max_alternate_depth: usize,
}

impl Default for OdbConfig {
    fn default() -> Self {
        Self {
            pack_dir: "pack".into(),
            loose_dir: String::new(),
            alternates_file: "info/alternates".into(),
            compression_level: odb_store::loose::DEFAULT_COMPRESSION_LEVEL,
            max_alternate_depth: 5,
        }
    }
}

impl OdbConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Sub-store paths must stay inside the objects root.
    pub fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [
            ("pack_dir", &self.pack_dir),
            ("loose_dir", &self.loose_dir),
            ("alternates_file", &self.alternates_file),
        ] {
            let escapes = Path::new(value)
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if escapes {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("{value:?} must be a relative path inside the objects root"),
                });
            }
        }
        if !(1..=22).contains(&self.compression_level) {
            return Err(ConfigError::InvalidValue {
                field: "compression_level",
                reason: format!("{} is outside 1..=22", self.compression_level),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = OdbConfig::default();
        assert_eq!(c.pack_dir, "pack");
        assert_eq!(c.loose_dir, "");
        assert_eq!(c.alternates_file, "info/alternates");
        assert_eq!(c.compression_level, 3);
        assert_eq!(c.max_alternate_depth, 5);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = OdbConfig::from_toml_str("compression_level = 9\n").unwrap();
        assert_eq!(c.compression_level, 9);
        assert_eq!(c.pack_dir, "pack");
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(OdbConfig::from_toml_str("").unwrap(), OdbConfig::default());
    }

    #[test]
    fn rejects_escaping_paths() {
        let err = OdbConfig::from_toml_str("pack_dir = \"../elsewhere\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "pack_dir", .. }));

        let err = OdbConfig::from_toml_str("alternates_file = \"/etc/alternates\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "alternates_file", .. }));
    }

    #[test]
    fn rejects_bad_compression_level() {
        let err = OdbConfig::from_toml_str("compression_level = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "compression_level", .. }));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = OdbConfig::from_toml_str("pack_dir = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odb.toml");
        std::fs::write(&path, "max_alternate_depth = 2\n").unwrap();
        assert_eq!(OdbConfig::load(&path).unwrap().max_alternate_depth, 2);

        let err = OdbConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
