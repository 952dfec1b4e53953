use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::error;

use crate::models::*;
use crate::storage::{discard, stored_name, UploadError, UploadStore};
use crate::store::{JsonStore, StoreError};

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")]
    NotFound,
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("upload: {0}")]
    Upload(#[from] UploadError),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait NoticeRepo: Send + Sync {
    async fn list_notices(&self) -> RepoResult<Vec<Notice>>;
    async fn create_notice(&self, new: NewNotice) -> RepoResult<Notice>;
    async fn update_notice(&self, id: Id, upd: UpdateNotice) -> RepoResult<Notice>;
    /// `Ok(None)` when nothing had that id.
    async fn delete_notice(&self, id: Id) -> RepoResult<Option<Notice>>;
}

#[async_trait]
pub trait LinkRepo: Send + Sync {
    async fn list_links(&self) -> RepoResult<Vec<Link>>;
    async fn create_link(&self, new: NewLink, image: Option<Upload>) -> RepoResult<Link>;
    async fn update_link(&self, id: Id, upd: UpdateLink, image: Option<Upload>) -> RepoResult<Link>;
    async fn delete_link(&self, id: Id) -> RepoResult<Option<Link>>;
}

#[async_trait]
pub trait GalleryRepo: Send + Sync {
    async fn list_gallery(&self) -> RepoResult<Vec<GalleryImage>>;
    async fn create_gallery_image(&self, image: Upload) -> RepoResult<GalleryImage>;
    async fn delete_gallery_image(&self, id: Id) -> RepoResult<Option<GalleryImage>>;
}

pub trait Repo: NoticeRepo + LinkRepo + GalleryRepo {}

impl<T> Repo for T where T: NoticeRepo + LinkRepo + GalleryRepo {}

/// Next id for a collection: the current epoch second, or one past the
/// largest id already present when that second is taken.
pub fn next_id<T: Record>(records: &[T]) -> Id {
    let now = Utc::now().timestamp();
    match records.iter().map(Record::id).max() {
        Some(last) if last >= now => last + 1,
        _ => now,
    }
}

/// JSON-file backed repository. Every call re-reads its collection from disk.
#[derive(Clone)]
pub struct JsonRepo {
    store: JsonStore,
    uploads: Arc<dyn UploadStore>,
}

impl JsonRepo {
    pub fn new(store: JsonStore, uploads: Arc<dyn UploadStore>) -> Self {
        Self { store, uploads }
    }

    fn list<T: Record>(&self) -> Vec<T> {
        self.store.load(T::COLLECTION)
    }

    async fn save_upload(&self, id: Id, upload: &Upload) -> RepoResult<String> {
        let name = stored_name(id, &upload.filename);
        self.uploads.save(&name, &upload.bytes).await.map_err(|e| {
            error!("storing upload '{name}' failed: {e}");
            RepoError::from(e)
        })?;
        Ok(name)
    }

    async fn create<T, F>(&self, upload: Option<Upload>, build: F) -> RepoResult<T>
    where
        T: Record,
        F: FnOnce(Id, Option<String>) -> T + Send,
    {
        let _guard = self.store.lock(T::COLLECTION).await;
        let mut records: Vec<T> = self.store.load(T::COLLECTION);
        let id = next_id(&records);
        let stored = match &upload {
            Some(u) => Some(self.save_upload(id, u).await?),
            None => None,
        };
        let record = build(id, stored.clone());
        records.push(record.clone());
        if let Err(e) = self.store.save(T::COLLECTION, &records) {
            error!("saving '{}' failed: {e}", T::COLLECTION);
            if let Some(name) = stored {
                discard(self.uploads.as_ref(), &name).await;
            }
            return Err(e.into());
        }
        Ok(record)
    }

    /// `apply` receives the record and the stored name of a replacement file.
    /// The replacement is written before the collection and the superseded
    /// file is only removed once the collection points away from it.
    async fn update<T, F>(&self, id: Id, upload: Option<Upload>, apply: F) -> RepoResult<T>
    where
        T: Record,
        F: FnOnce(&mut T, Option<String>) + Send,
    {
        let _guard = self.store.lock(T::COLLECTION).await;
        let mut records: Vec<T> = self.store.load(T::COLLECTION);
        let idx = records
            .iter()
            .position(|r| r.id() == id)
            .ok_or(RepoError::NotFound)?;
        let old = records[idx].stored_file().map(str::to_owned);
        let replacement = match &upload {
            Some(u) => Some(self.save_upload(id, u).await?),
            None => None,
        };
        let (fresh, superseded) = match (&replacement, old) {
            // same name: the old file was overwritten in place
            (Some(new), Some(old)) if *new == old => (None, None),
            (Some(new), old) => (Some(new.clone()), old),
            (None, _) => (None, None),
        };
        apply(&mut records[idx], replacement);
        let updated = records[idx].clone();
        if let Err(e) = self.store.save(T::COLLECTION, &records) {
            error!("saving '{}' failed: {e}", T::COLLECTION);
            if let Some(name) = fresh {
                discard(self.uploads.as_ref(), &name).await;
            }
            return Err(e.into());
        }
        if let Some(name) = superseded {
            discard(self.uploads.as_ref(), &name).await;
        }
        Ok(updated)
    }

    async fn delete<T: Record>(&self, id: Id) -> RepoResult<Option<T>> {
        let _guard = self.store.lock(T::COLLECTION).await;
        let mut records: Vec<T> = self.store.load(T::COLLECTION);
        let Some(idx) = records.iter().position(|r| r.id() == id) else {
            return Ok(None);
        };
        let removed = records.remove(idx);
        self.store.save(T::COLLECTION, &records).map_err(|e| {
            error!("saving '{}' failed: {e}", T::COLLECTION);
            e
        })?;
        if let Some(name) = removed.stored_file() {
            discard(self.uploads.as_ref(), name).await;
        }
        Ok(Some(removed))
    }
}

#[async_trait]
impl NoticeRepo for JsonRepo {
    async fn list_notices(&self) -> RepoResult<Vec<Notice>> {
        Ok(self.list())
    }
    async fn create_notice(&self, new: NewNotice) -> RepoResult<Notice> {
        self.create(None, |id, _| Notice { id, text: new.text }).await
    }
    async fn update_notice(&self, id: Id, upd: UpdateNotice) -> RepoResult<Notice> {
        self.update(id, None, |n: &mut Notice, _| {
            if let Some(text) = upd.text { n.text = text; }
        })
        .await
    }
    async fn delete_notice(&self, id: Id) -> RepoResult<Option<Notice>> {
        self.delete(id).await
    }
}

#[async_trait]
impl LinkRepo for JsonRepo {
    async fn list_links(&self) -> RepoResult<Vec<Link>> {
        Ok(self.list())
    }
    async fn create_link(&self, new: NewLink, image: Option<Upload>) -> RepoResult<Link> {
        self.create(image, |id, image| Link { id, title: new.title, url: new.url, image })
            .await
    }
    async fn update_link(&self, id: Id, upd: UpdateLink, image: Option<Upload>) -> RepoResult<Link> {
        self.update(id, image, |l: &mut Link, replacement| {
            if let Some(title) = upd.title { l.title = title; }
            if let Some(url) = upd.url { l.url = url; }
            if replacement.is_some() { l.image = replacement; }
        })
        .await
    }
    async fn delete_link(&self, id: Id) -> RepoResult<Option<Link>> {
        self.delete(id).await
    }
}

#[async_trait]
impl GalleryRepo for JsonRepo {
    async fn list_gallery(&self) -> RepoResult<Vec<GalleryImage>> {
        Ok(self.list())
    }
    async fn create_gallery_image(&self, image: Upload) -> RepoResult<GalleryImage> {
        self.create(Some(image), |id, filename| GalleryImage {
            id,
            filename: filename.unwrap_or_default(),
        })
        .await
    }
    async fn delete_gallery_image(&self, id: Id) -> RepoResult<Option<GalleryImage>> {
        self.delete(id).await
    }
}
