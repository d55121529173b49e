//! On-disk dataset backing the CLI.
//!
//! The dataset is a JSON snapshot of users, accounts, groups and tenants. It
//! is loaded into in-memory collections, mutated through the services and
//! written back atomically.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use directories::ProjectDirs;
use mquery::store::{Collection, MemoryCollection};
use serde::{Deserialize, Serialize};
use tenant_api::models::Tenant;
use thiserror::Error;

use crate::models::{from_document, to_document, Account, Group, User};
use crate::services::Collections;
use crate::tenants::CollectionTenants;

/// Application name used for the data directory.
const APP_NAME: &str = "authq";

/// Dataset file name.
const DATASET_FILENAME: &str = "dataset.json";

/// Errors that can occur during dataset storage operations.
#[derive(Debug, Error)]
pub enum DatasetStoreError {
    /// Failed to determine the XDG data directory.
    #[error("could not determine data directory")]
    NoDataDir,

    /// Failed to read the dataset file.
    #[error("failed to read dataset file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write the dataset file.
    #[error("failed to write dataset file {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to create the data directory.
    #[error("failed to create data directory {path}: {source}")]
    CreateDirError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to parse or serialize dataset JSON.
    #[error("dataset JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for dataset storage operations.
pub type Result<T> = std::result::Result<T, DatasetStoreError>;

/// Everything the CLI persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub tenants: Vec<Tenant>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl Dataset {
    /// Loads the entities into in-memory collections keyed on `id`, and
    /// tenants keyed on `code`.
    pub fn into_memory(self) -> Result<MemoryDataset> {
        fn collection<T: Serialize>(
            name: &str,
            key: &str,
            items: &[T],
        ) -> Result<Arc<MemoryCollection>> {
            let documents = items
                .iter()
                .map(to_document)
                .collect::<serde_json::Result<Vec<_>>>()?;
            Ok(MemoryCollection::with_documents(name, documents)
                .unique_on(key)
                .shared())
        }

        Ok(MemoryDataset {
            users: collection("users", "id", &self.users)?,
            accounts: collection("accounts", "id", &self.accounts)?,
            groups: collection("groups", "id", &self.groups)?,
            tenants: collection("tenants", "code", &self.tenants)?,
        })
    }
}

/// A dataset loaded into memory.
#[derive(Debug, Clone)]
pub struct MemoryDataset {
    pub users: Arc<MemoryCollection>,
    pub accounts: Arc<MemoryCollection>,
    pub groups: Arc<MemoryCollection>,
    pub tenants: Arc<MemoryCollection>,
}

impl MemoryDataset {
    /// Returns the collections as trait objects for the services.
    pub fn collections(&self) -> Collections {
        Collections {
            users: self.users.clone() as Arc<dyn Collection>,
            accounts: self.accounts.clone() as Arc<dyn Collection>,
            groups: self.groups.clone() as Arc<dyn Collection>,
        }
    }

    /// Returns a tenant directory over the dataset's tenants.
    pub fn tenant_directory(&self) -> CollectionTenants {
        CollectionTenants::new(self.tenants.clone() as Arc<dyn Collection>)
    }

    /// Reads the current collection contents back into a dataset.
    pub async fn snapshot(&self) -> Result<Dataset> {
        async fn decode<T: serde::de::DeserializeOwned>(
            collection: &MemoryCollection,
        ) -> Result<Vec<T>> {
            collection
                .snapshot()
                .await
                .into_iter()
                .map(|doc| from_document(doc).map_err(DatasetStoreError::from))
                .collect()
        }

        Ok(Dataset {
            tenants: decode(&self.tenants).await?,
            users: decode(&self.users).await?,
            accounts: decode(&self.accounts).await?,
            groups: decode(&self.groups).await?,
        })
    }
}

/// Persistent storage for the dataset.
///
/// The dataset is stored at `~/.local/share/authq/dataset.json` on Linux,
/// `~/Library/Application Support/authq/dataset.json` on macOS, and
/// `C:\Users\<User>\AppData\Roaming\authq\data\dataset.json` on Windows.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    path: PathBuf,
}

impl DatasetStore {
    /// Creates a store at the default XDG data path.
    ///
    /// # Errors
    ///
    /// Returns `DatasetStoreError::NoDataDir` if the home directory cannot be
    /// determined.
    pub fn new() -> Result<Self> {
        Ok(Self {
            path: Self::default_path()?,
        })
    }

    /// Creates a store at a custom path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the default dataset file path.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", APP_NAME).ok_or(DatasetStoreError::NoDataDir)?;
        Ok(dirs.data_dir().join(DATASET_FILENAME))
    }

    /// Returns the dataset file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the dataset file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the dataset from disk.
    pub fn load(&self) -> Result<Dataset> {
        let contents = fs::read_to_string(&self.path).map_err(|e| DatasetStoreError::ReadError {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Loads the dataset, returning an empty one if the file does not exist.
    pub fn load_or_default(&self) -> Result<Dataset> {
        match self.load() {
            Ok(dataset) => Ok(dataset),
            Err(DatasetStoreError::ReadError { ref source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                Ok(Dataset::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Saves the dataset as pretty-printed JSON via a temp file and rename.
    pub fn save(&self, dataset: &Dataset) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| DatasetStoreError::CreateDirError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(dataset)?;

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &json).map_err(|e| DatasetStoreError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| DatasetStoreError::WriteError {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use mquery::caller::{Role, Roles};
    use serde_json::json;
    use tempfile::tempdir;

    fn sample() -> Dataset {
        Dataset {
            tenants: vec![Tenant::new("T1")],
            users: vec![User::new("u1", "T1").with_fullname("An")],
            accounts: vec![Account::new("u1", "an@t1.example", Roles::new([Role::EndUser]))],
            groups: vec![Group {
                id: "g1".into(),
                name: "Sales".into(),
                description: None,
                tenant: "T1".into(),
                leader_id: Some("u1".into()),
                members: vec![],
                is_active: true,
                created_time: DateTime::from_timestamp(0, 0).unwrap(),
                number_of_user: 1,
            }],
        }
    }

    #[test]
    fn test_missing_file_loads_empty_dataset() {
        let dir = tempdir().unwrap();
        let store = DatasetStore::with_path(dir.path().join("dataset.json"));
        assert!(!store.exists());
        assert_eq!(store.load_or_default().unwrap(), Dataset::default());
    }

    #[test]
    fn test_save_creates_parent_dir_and_round_trips() {
        let dir = tempdir().unwrap();
        let store = DatasetStore::with_path(dir.path().join("nested").join("dataset.json"));

        store.save(&sample()).unwrap();

        assert!(store.exists());
        assert!(!store.path().with_extension("tmp").exists());
        assert_eq!(store.load().unwrap(), sample());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        fs::write(&path, "{ not json").unwrap();

        let store = DatasetStore::with_path(path);
        assert!(matches!(
            store.load_or_default(),
            Err(DatasetStoreError::Json(_))
        ));
    }

    #[test]
    fn test_partial_file_defaults_missing_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        fs::write(&path, json!({ "tenants": [ { "code": "T1" } ] }).to_string()).unwrap();

        let dataset = DatasetStore::with_path(path).load().unwrap();
        assert_eq!(dataset.tenants, vec![Tenant::new("T1")]);
        assert!(dataset.users.is_empty());
    }

    #[test]
    fn test_user_without_tenant_loads() {
        let dataset: Dataset =
            serde_json::from_str(r#"{"users":[{"id":"root","is_active":true}]}"#).unwrap();
        assert_eq!(dataset.users, vec![User::without_tenant("root")]);
    }

    #[tokio::test]
    async fn test_tenant_counters_persist_in_snapshot() {
        use crate::tenants::TenantDirectory;
        use tenant_api::models::UserIncrement;

        let memory = sample().into_memory().unwrap();
        memory
            .tenant_directory()
            .increase_users(&[UserIncrement::new("T1", 2)])
            .await
            .unwrap();

        let snapshot = memory.snapshot().await.unwrap();
        assert_eq!(snapshot.tenants[0].number_of_user, 2);
    }

    #[tokio::test]
    async fn test_memory_round_trip() {
        let memory = sample().into_memory().unwrap();
        assert_eq!(memory.users.len().await, 1);
        assert_eq!(memory.snapshot().await.unwrap(), sample());
    }
}
