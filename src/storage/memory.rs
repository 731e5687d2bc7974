// In-process object store

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{BackendError, ObjectStore, StoredObject};

/// Characters escaped when a key is placed in a URL path. `/` is kept so
/// keys keep their prefix structure.
const KEY_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Keeps objects in a map. "Presigned" URLs point at `base_url` and are not
/// actually signed or expired; they exist so the full request flow can run
/// without a real bucket.
pub struct MemoryStore {
    base_url: String,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        "memory"
    }

    async fn put(&self, object: &StoredObject) -> Result<(), BackendError> {
        self.objects
            .write()
            .await
            .insert(object.key.clone(), object.clone());
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<(), BackendError> {
        if self.objects.read().await.contains_key(key) {
            Ok(())
        } else {
            Err(BackendError::NotFound)
        }
    }

    async fn get(&self, key: &str) -> Result<StoredObject, BackendError> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or(BackendError::NotFound)
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn presign_get(&self, key: &str, expiry_secs: u32) -> Result<String, BackendError> {
        Ok(format!(
            "{}/{}?type=object&X-Amz-Expires={}",
            self.base_url,
            utf8_percent_encode(key, KEY_ENCODE_SET),
            expiry_secs
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn object(key: &str) -> StoredObject {
        StoredObject {
            key: key.to_string(),
            body: Bytes::from_static(b"data"),
            content_type: "text/plain".to_string(),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_put_head_delete() {
        let store = MemoryStore::new("http://localhost:3000/");
        assert!(store.is_empty().await);

        store.put(&object("a/b.txt")).await.unwrap();
        assert_eq!(store.len().await, 1);
        store.head("a/b.txt").await.unwrap();

        store.delete("a/b.txt").await.unwrap();
        assert!(matches!(store.head("a/b.txt").await, Err(BackendError::NotFound)));
        assert!(matches!(store.get("a/b.txt").await, Err(BackendError::NotFound)));
    }

    #[tokio::test]
    async fn test_presign_escapes_key() {
        let store = MemoryStore::new("http://localhost:3000/");
        let url = store.presign_get("my photos/cat #1.jpg", 300).await.unwrap();
        assert_eq!(
            url,
            "http://localhost:3000/my%20photos/cat%20%231.jpg?type=object&X-Amz-Expires=300"
        );
    }
}
