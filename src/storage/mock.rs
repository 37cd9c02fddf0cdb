use super::{object_url, ObjectStorage};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct StoredFile {
    data: Vec<u8>,
    content_type: String,
}

/// In-memory object storage used by tests and `DRY_RUN` mode.
#[derive(Clone)]
pub struct MockStorage {
    files: Arc<Mutex<HashMap<String, StoredFile>>>,
    base_url: String,
    upload_count: Arc<Mutex<usize>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            base_url: "https://mock-storage.example.com".to_string(),
            upload_count: Arc::new(Mutex::new(0)),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_upload_count(&self) -> usize {
        *self.upload_count.lock().unwrap()
    }

    pub fn get_files(&self) -> HashMap<String, Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .map(|(key, file)| (key.clone(), file.data.clone()))
            .collect()
    }

    pub fn content_type_of(&self, key: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(key)
            .map(|file| file.content_type.clone())
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStorage for MockStorage {
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> Result<String> {
        if *self.should_fail.lock().unwrap() {
            return Err(Error::Storage(format!("Mock upload failure for {}", key)));
        }

        *self.upload_count.lock().unwrap() += 1;
        self.files.lock().unwrap().insert(
            key.to_string(),
            StoredFile {
                data: data.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(object_url(&self.base_url, key))
    }
}
