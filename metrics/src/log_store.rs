use crate::session::{
    CallSession,
    SessionId,
};
use std::{
    fs::{
        self,
        File,
    },
    io::{
        self,
        BufReader,
        Write as _,
    },
    path::{
        Path,
        PathBuf,
    },
};

pub const LOG_EXTENSION: &str = "json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No call log named {0:?}")]
    NotFound(String),
    #[error("Call session start timestamp {0} cannot be turned into a log name")]
    InvalidStartTimestamp(f64),
    #[error("Failed to access call log at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Call log at {path:?} could not be encoded or decoded: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Directory of completed call sessions, one JSON file per session named
/// `<YYYY_MM_DD_HH_MM_SS>.json` after the session start.
#[derive(Debug, Clone)]
pub struct LogStore {
    dir: PathBuf,
}

impl LogStore {
    /// Opens the store, creating `dir` if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| StoreError::io(&dir, err))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{id}.{LOG_EXTENSION}"))
    }

    /// Writes `session` and returns the identifier it is stored under.
    ///
    /// The record is written to a hidden temporary file first and renamed into
    /// place, readers see either the previous file or the complete new one.
    #[instrument(level = "debug", skip_all, fields(dir = ?self.dir))]
    pub fn persist(&self, session: &CallSession) -> Result<SessionId, StoreError> {
        let id = session
            .id()
            .ok_or(StoreError::InvalidStartTimestamp(session.start_timestamp))?;
        let path = self.path_for(&id);
        let tmp_path = self.dir.join(format!(".{id}.{LOG_EXTENSION}.tmp"));

        let encoded = serde_json::to_vec(session).map_err(|source| StoreError::Format {
            path: path.clone(),
            source,
        })?;

        if let Err(err) = write_synced(&tmp_path, &encoded) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::io(&tmp_path, err));
        }

        if path.exists() {
            warn!(?path, "a call log with the same start time exists and will be replaced");
        }
        if let Err(err) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::io(&path, err));
        }

        debug!(?path, bytes = encoded.len(), "call log written");
        Ok(id)
    }

    /// Identifiers of all stored sessions in ascending order.
    pub fn list(&self) -> Result<Vec<SessionId>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|err| StoreError::io(&self.dir, err))?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| StoreError::io(&self.dir, err))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(LOG_EXTENSION) {
                continue;
            }
            if let Some(id) = path.file_stem().and_then(|stem| stem.to_str()).and_then(SessionId::parse) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn contains(&self, id: &str) -> bool {
        SessionId::parse(id).is_some_and(|id| self.path_for(&id).is_file())
    }

    /// Reads the session stored under `id`.
    ///
    /// Unknown identifiers and identifiers that could not name a stored file
    /// yield [`StoreError::NotFound`].
    pub fn load(&self, id: &str) -> Result<CallSession, StoreError> {
        let session_id = SessionId::parse(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let path = self.path_for(&session_id);

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(StoreError::NotFound(id.to_string())),
            Err(err) => return Err(StoreError::io(&path, err)),
        };
        serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Format { path, source })
    }
}

fn write_synced(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content)?;
    file.sync_all()
}
