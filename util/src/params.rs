//! Parameter file loading
//!
//! Every module reads its tuning from a TOML file in `$DBW_SW_ROOT/params`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable (DBW_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot read {path:?}: {source}")]
    FileLoadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid parameters: {0}")]
    DeserialiseError(toml::de::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load `$DBW_SW_ROOT/params/{file_name}`.
pub fn load<P: DeserializeOwned>(file_name: &str) -> Result<P, LoadError> {
    let root = crate::host::get_dbw_sw_root().map_err(|_| LoadError::SwRootNotSet)?;

    load_from(&root.join("params"), file_name)
}

/// Load `{dir}/{file_name}`.
pub fn load_from<P: DeserializeOwned>(dir: &Path, file_name: &str) -> Result<P, LoadError> {
    let path = dir.join(file_name);

    let text = std::fs::read_to_string(&path)
        .map_err(|source| LoadError::FileLoadError { path, source })?;

    from_str(&text)
}

/// Parse parameters from a TOML string.
pub fn from_str<P: DeserializeOwned>(text: &str) -> Result<P, LoadError> {
    toml::from_str(text).map_err(LoadError::DeserialiseError)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Gains {
        p: f64,
        i: f64,
    }

    #[test]
    fn test_from_str() {
        let gains: Gains = from_str("p = 25.0\ni = 0.2\n").unwrap();
        assert_eq!(gains.p, 25.0);
        assert_eq!(gains.i, 0.2);

        assert!(matches!(
            from_str::<Gains>("p = \"x\""),
            Err(LoadError::DeserialiseError(_))
        ));
    }

    #[test]
    fn test_load_from() {
        let dir = std::env::temp_dir().join(format!("dbw_params_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("gains.toml"), "p = 1.5\ni = 0.0\n").unwrap();

        let gains: Gains = load_from(&dir, "gains.toml").unwrap();
        assert_eq!(gains.p, 1.5);

        match load_from::<Gains>(&dir, "missing.toml") {
            Err(LoadError::FileLoadError { path, .. }) => assert_eq!(path, dir.join("missing.toml")),
            _ => panic!("expected a file load error"),
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
