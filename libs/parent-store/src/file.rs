use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use coordination::{Resource, Store};
use tokio::{fs, sync::Mutex};
use tracing::{debug, trace};

use crate::{ParentId, ParentInfo, ParentSeed, StoreError};

type Records = BTreeMap<ParentId, ParentInfo>;

/// Parent records in a single json object on disk, keyed by parent id.
///
/// Every operation re-reads the file. Writes go to a sibling temp file which
/// is then renamed over the original.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Records, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Records::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                trace!(path = %self.path.display(), "store file missing, treating as empty");
                Ok(Records::new())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, records: &Records) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(records)?).await?;
        fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), count = records.len(), "store file written");
        Ok(())
    }
}

#[async_trait]
impl Store for FileStore {
    type Resource = ParentInfo;
    type Seed = ParentSeed;
    type Error = StoreError;

    async fn read(&self, key: &ParentId) -> Result<Option<ParentInfo>, Self::Error> {
        let _lock = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn create(&self, seed: ParentSeed) -> Result<ParentInfo, Self::Error> {
        let _lock = self.lock.lock().await;
        let mut records = self.load().await?;
        if let Some(existing) = records.get(&seed.id) {
            return Ok(existing.clone());
        }
        let info = ParentInfo::from(seed.clone());
        records.insert(seed.id, info.clone());
        self.save(&records).await?;
        Ok(info)
    }

    async fn write(&self, resource: &ParentInfo) -> Result<(), Self::Error> {
        let id = resource.key().ok_or(StoreError::MissingId)?.clone();
        let _lock = self.lock.lock().await;
        let mut records = self.load().await?;
        records.insert(id, resource.clone());
        self.save(&records).await
    }
}
