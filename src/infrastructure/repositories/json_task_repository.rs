//! JSON file backed task store.
//!
//! All tasks live in memory; every write rewrites the whole file through a
//! temporary file and an atomic rename.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

use crate::domain::entities::task::{Task, TaskId};
use crate::domain::repositories::task_repository::{RepositoryError, Result, TaskRepository};

#[derive(Debug, Default, Serialize, Deserialize)]
struct DatabaseFile {
    version: u64,
    tasks: HashMap<TaskId, Task>,
}

pub struct JsonTaskRepository {
    db: Mutex<DatabaseFile>,
    file_path: Option<PathBuf>,
    // serializes snapshot + flush so the file never goes back in time
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonTaskRepository {
    /// Store without a backing file
    pub fn in_memory() -> Self {
        Self {
            db: Mutex::new(DatabaseFile::default()),
            file_path: None,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Loads `file_path`, starting empty when it does not exist yet
    pub async fn open(file_path: impl AsRef<Path>) -> Result<Self> {
        let file_path = file_path.as_ref().to_path_buf();

        let db = match tokio::fs::read(&file_path).await {
            Ok(data) => {
                let db: DatabaseFile = serde_json::from_slice(&data).map_err(|e| {
                    RepositoryError::StorageError(format!("cant unmarshal database: {}", e))
                })?;
                for (id, task) in &db.tasks {
                    task.validate().map_err(|e| {
                        RepositoryError::InvalidData(format!("onload: task {}: {}", task.id, e))
                    })?;
                    if *id != task.id {
                        return Err(RepositoryError::InvalidData(format!(
                            "onload: task uuid and key are not equal: {}",
                            task.id
                        )));
                    }
                }
                db
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DatabaseFile::default(),
            Err(e) => {
                return Err(RepositoryError::StorageError(format!(
                    "cant read {}: {}",
                    file_path.display(),
                    e
                )));
            }
        };

        info!(
            path = %file_path.display(),
            tasks = db.tasks.len(),
            version = db.version,
            "task database loaded"
        );

        Ok(Self {
            db: Mutex::new(db),
            file_path: Some(file_path),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn version(&self) -> u64 {
        self.db.lock().unwrap_or_else(PoisonError::into_inner).version
    }

    async fn flush(&self, data: Vec<u8>) -> Result<()> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };

        let mut tmp_path = path.clone().into_os_string();
        tmp_path.push(".new");
        let tmp_path = PathBuf::from(tmp_path);

        tokio::fs::write(&tmp_path, data)
            .await
            .map_err(|e| RepositoryError::StorageError(format!("cant write to file: {}", e)))?;
        tokio::fs::rename(&tmp_path, path).await.map_err(|e| {
            RepositoryError::StorageError(format!("cant rename tmp file to final: {}", e))
        })?;
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for JsonTaskRepository {
    async fn get_by_id(&self, id: TaskId) -> Result<Option<Task>> {
        let db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(db.tasks.get(&id).cloned())
    }

    async fn insert(&self, mut task: Task) -> Result<()> {
        task.unify();
        task.validate().map_err(RepositoryError::InvalidData)?;

        let _write = self.write_lock.lock().await;
        let data = {
            let mut db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
            db.version += 1;
            debug!(task_id = %task.id, version = db.version, "task stored");
            db.tasks.insert(task.id, task);
            match &self.file_path {
                Some(_) => serde_json::to_vec(&*db).map_err(|e| {
                    RepositoryError::StorageError(format!("cant marshal database: {}", e))
                })?,
                None => Vec::new(),
            }
        };
        self.flush(data).await
    }

    async fn list_all(&self) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = {
            let db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
            db.tasks.values().cloned().collect()
        };
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }
}
