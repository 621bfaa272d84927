//! Persistence of exercise definitions and patient records.
//!
//! Storage sits behind two repository traits so the session layer never
//! touches files directly. [`JsonFileStore`] keeps everything in a single
//! JSON document; [`MemoryStore`] backs tests and embedded hosts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use rehab_core::{Error, ExerciseDefinition, Result, SessionResult};

use crate::progress::{HistoryEntry, PatientRecord};

/// Stored custom exercises
#[async_trait]
pub trait ExerciseStore: Send + Sync {
    async fn exercise(&self, name: &str) -> Result<Option<ExerciseDefinition>>;

    async fn exercises(&self) -> Result<Vec<ExerciseDefinition>>;

    /// Insert or replace by name
    async fn save_exercise(&self, definition: ExerciseDefinition) -> Result<()>;
}

/// Stored patient records
#[async_trait]
pub trait PatientStore: Send + Sync {
    async fn patient(&self, username: &str) -> Result<Option<PatientRecord>>;

    async fn save_patient(&self, username: &str, record: PatientRecord) -> Result<()>;
}

/// Layout of the persisted document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub exercises: BTreeMap<String, ExerciseDefinition>,
    #[serde(default)]
    pub patients: BTreeMap<String, PatientRecord>,
}

/// Volatile store
#[derive(Default)]
pub struct MemoryStore {
    document: RwLock<StoreDocument>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: StoreDocument) -> Self {
        Self {
            document: RwLock::new(document),
        }
    }

    pub async fn snapshot(&self) -> StoreDocument {
        self.document.read().await.clone()
    }
}

#[async_trait]
impl ExerciseStore for MemoryStore {
    async fn exercise(&self, name: &str) -> Result<Option<ExerciseDefinition>> {
        Ok(self.document.read().await.exercises.get(name).cloned())
    }

    async fn exercises(&self) -> Result<Vec<ExerciseDefinition>> {
        Ok(self.document.read().await.exercises.values().cloned().collect())
    }

    async fn save_exercise(&self, definition: ExerciseDefinition) -> Result<()> {
        let mut document = self.document.write().await;
        document.exercises.insert(definition.name.clone(), definition);
        Ok(())
    }
}

#[async_trait]
impl PatientStore for MemoryStore {
    async fn patient(&self, username: &str) -> Result<Option<PatientRecord>> {
        Ok(self.document.read().await.patients.get(username).cloned())
    }

    async fn save_patient(&self, username: &str, record: PatientRecord) -> Result<()> {
        let mut document = self.document.write().await;
        document.patients.insert(username.to_string(), record);
        Ok(())
    }
}

/// Single-document JSON store.
///
/// Every write rewrites the whole document through a temporary file that
/// is renamed over the original.
pub struct JsonFileStore {
    path: PathBuf,
    document: Mutex<StoreDocument>,
}

impl JsonFileStore {
    /// Load `path`, starting empty if it does not exist yet
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let document = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => StoreDocument::default(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreDocument::default(),
            Err(e) => {
                return Err(Error::Storage(format!("{}: {}", path.display(), e)));
            }
        };

        tracing::debug!(
            path = %path.display(),
            exercises = document.exercises.len(),
            patients = document.patients.len(),
            "store opened"
        );

        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, document: &StoreDocument) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(document)?;
        let tmp = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| Error::Storage(format!("{}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::Storage(format!("{}: {}", self.path.display(), e)))?;
        Ok(())
    }
}

#[async_trait]
impl ExerciseStore for JsonFileStore {
    async fn exercise(&self, name: &str) -> Result<Option<ExerciseDefinition>> {
        Ok(self.document.lock().await.exercises.get(name).cloned())
    }

    async fn exercises(&self) -> Result<Vec<ExerciseDefinition>> {
        Ok(self.document.lock().await.exercises.values().cloned().collect())
    }

    async fn save_exercise(&self, definition: ExerciseDefinition) -> Result<()> {
        let mut document = self.document.lock().await;
        document.exercises.insert(definition.name.clone(), definition);
        self.persist(&document).await
    }
}

#[async_trait]
impl PatientStore for JsonFileStore {
    async fn patient(&self, username: &str) -> Result<Option<PatientRecord>> {
        Ok(self.document.lock().await.patients.get(username).cloned())
    }

    async fn save_patient(&self, username: &str, record: PatientRecord) -> Result<()> {
        let mut document = self.document.lock().await;
        document.patients.insert(username.to_string(), record);
        self.persist(&document).await
    }
}

/// Append a finished session to a patient's history and persist it.
///
/// Unknown patients get a fresh record.
pub async fn record_session<S>(
    store: &S,
    username: &str,
    exercise: &str,
    result: SessionResult,
) -> Result<HistoryEntry>
where
    S: ExerciseStore + PatientStore + ?Sized,
{
    let definition = store.exercise(exercise).await?;
    let mut record = store.patient(username).await?.unwrap_or_default();

    let entry = record
        .record_session(exercise, result, definition.as_ref())
        .clone();
    store.save_patient(username, record).await?;

    tracing::info!(
        patient = username,
        exercise,
        reps = entry.result.reps,
        "session recorded"
    );
    Ok(entry)
}
