use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Record ids are epoch seconds, bumped past the last id when already taken.
pub type Id = i64;

/// A record kind persisted as one JSON array file.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name; the backing file is `<COLLECTION>.json`.
    const COLLECTION: &'static str;

    fn id(&self) -> Id;

    /// Name of the upload owned by this record, if any.
    fn stored_file(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Notice {
    pub id: Id,
    pub text: String,
}

impl Record for Notice {
    const COLLECTION: &'static str = "notices";
    fn id(&self) -> Id {
        self.id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NewNotice {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateNotice {
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Link {
    pub id: Id,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>, // stored upload name
}

impl Record for Link {
    const COLLECTION: &'static str = "links";
    fn id(&self) -> Id {
        self.id
    }
    fn stored_file(&self) -> Option<&str> {
        self.image.as_deref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewLink {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateLink {
    pub title: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GalleryImage {
    pub id: Id,
    pub filename: String,
}

impl Record for GalleryImage {
    const COLLECTION: &'static str = "gallery";
    fn id(&self) -> Id {
        self.id
    }
    fn stored_file(&self) -> Option<&str> {
        Some(&self.filename)
    }
}

/// A file received in a multipart request, before it is written to disk.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String, // as sent by the client, unsanitized
    pub bytes: Vec<u8>,
}

// Multipart shapes, documentation only
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct LinkUpload {
    pub title: Option<String>,
    pub url: Option<String>,
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct GalleryUpload {
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}
