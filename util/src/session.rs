//! Session management
//!
//! A session is one run of an executable. It owns a directory under the
//! software root holding the log file and a copy of the parameters the run
//! used, and fixes the epoch all log timestamps are measured from.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use log::debug;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal imports
use crate::time;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// strftime format of the timestamp in session directory names.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Subdirectory receiving the parameter copies.
const PARAMS_DIR: &str = "params";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Paths belonging to the current run.
#[derive(Clone, Debug)]
pub struct Session {
    pub session_root: PathBuf,
    pub log_file_path: PathBuf,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("The software root environment variable (DBW_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot create the session directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error("A session has already been started in this process ({0})")]
    AlreadyStarted(conquer_once::TryInitError),

    #[error("Cannot serialise {name}: {source}")]
    CannotSerialise {
        name: String,
        source: toml::ser::Error,
    },

    #[error("Cannot write {path:?}: {source}")]
    CannotWrite {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start the session of this process in `$DBW_SW_ROOT/{sessions_dir}`.
    ///
    /// Only one session may be started per process, the first call fixes the
    /// log epoch.
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionError> {
        SESSION_EPOCH
            .try_init_once(Utc::now)
            .map_err(SessionError::AlreadyStarted)?;
        let started = get_epoch().copied().unwrap_or_else(Utc::now);

        let mut parent = crate::host::get_dbw_sw_root().map_err(|_| SessionError::SwRootNotSet)?;
        parent.push(sessions_dir);

        Self::create_in(&parent, exec_name, &started)
    }

    /// Create the directory `{exec_name}_{timestamp}` in `parent` without
    /// touching the process epoch.
    pub fn create_in(
        parent: &Path,
        exec_name: &str,
        started: &DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let session_root = parent.join(format!("{}_{}", exec_name, started.format(TIMESTAMP_FORMAT)));

        fs::create_dir_all(session_root.join(PARAMS_DIR)).map_err(SessionError::CannotCreateDir)?;

        Ok(Session {
            log_file_path: session_root.join(format!("{}.log", exec_name)),
            session_root,
        })
    }

    /// Record a parameter set as `params/{name}` inside the session.
    pub fn save_toml<T: Serialize>(&self, name: &str, data: &T) -> Result<PathBuf, SessionError> {
        let text = toml::to_string(data).map_err(|source| SessionError::CannotSerialise {
            name: name.to_string(),
            source,
        })?;

        let path = self.session_root.join(PARAMS_DIR).join(name);
        fs::write(&path, text).map_err(|source| SessionError::CannotWrite {
            path: path.clone(),
            source,
        })?;

        debug!("Saved {:?}", path);

        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Seconds since the session epoch, `NAN` before a session is started.
pub fn get_elapsed_seconds() -> f64 {
    get_epoch()
        .and_then(|e| time::duration_to_seconds(Utc::now() - *e))
        .unwrap_or(std::f64::NAN)
}

pub fn get_epoch() -> Option<&'static DateTime<Utc>> {
    SESSION_EPOCH.get()
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Serialize)]
    struct Gains {
        k_p: f64,
        k_i: f64,
    }

    #[test]
    fn test_create_and_save() {
        let started = Utc::now();
        let parent = std::env::temp_dir().join(format!("dbw_session_test_{}", std::process::id()));

        let session = Session::create_in(&parent, "dbw_test", &started).unwrap();

        let dir_name = session.session_root.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(dir_name, format!("dbw_test_{}", started.format(TIMESTAMP_FORMAT)));
        assert_eq!(session.log_file_path, session.session_root.join("dbw_test.log"));

        let path = session
            .save_toml("steer_ctrl.toml", &Gains { k_p: 25.0, k_i: 0.2 })
            .unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("k_p = 25.0"));

        fs::remove_dir_all(&parent).unwrap();
    }
}
