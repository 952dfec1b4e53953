use std::collections::HashMap;
use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::TryStreamExt as _;

use crate::auth::{Admin, SessionGate};
use crate::credentials::{CredentialProvider, FileCredentials};
use crate::error::ApiError;
use crate::models::*;
use crate::repo::{JsonRepo, Repo, RepoError};
use crate::settings::Settings;
use crate::storage::{FsUploadStore, UploadError, UploadStore};
use crate::store::JsonStore;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                ApiError::BadRequest(format!("Invalid JSON body: {err}")).into()
            }))
            .app_data(web::PathConfig::default().error_handler(|err, _req| {
                log::debug!("unmatched path parameter: {err}");
                ApiError::NotFound("Record not found").into()
            }))
            .service(
                web::resource("/notices")
                    .route(web::get().to(list_notices))
                    .route(web::post().to(create_notice)),
            )
            .service(
                web::resource("/notices/{id}")
                    .route(web::put().to(update_notice))
                    .route(web::delete().to(delete_notice)),
            )
            .service(
                web::resource("/links")
                    .route(web::get().to(list_links))
                    .route(web::post().to(create_link)),
            )
            .service(
                web::resource("/links/{id}")
                    .route(web::put().to(update_link))
                    .route(web::delete().to(delete_link)),
            )
            .service(
                web::resource("/gallery")
                    .route(web::get().to(list_gallery))
                    .route(web::post().to(create_gallery_image)),
            )
            .service(web::resource("/gallery/{id}").route(web::delete().to(delete_gallery_image))),
    );
    // public fetch route so <img src="/uploads/{name}"> works
    cfg.route("/uploads/{filename}", web::get().to(get_upload));
    crate::pages::config(cfg);
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub uploads: Arc<dyn UploadStore>,
    pub sessions: Arc<SessionGate>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Wires the file-backed stores described by `settings`.
    pub fn from_settings(settings: &Settings) -> std::io::Result<Self> {
        let uploads: Arc<dyn UploadStore> = Arc::new(FsUploadStore::new(&settings.upload_dir)?);
        let repo = JsonRepo::new(JsonStore::new(&settings.data_dir), uploads.clone());
        Ok(Self {
            repo: Arc::new(repo),
            uploads,
            sessions: Arc::new(SessionGate::new(settings.session_secret.as_bytes(), settings.session_ttl())),
            credentials: Arc::new(FileCredentials::new(&settings.credentials_file)),
            max_upload_bytes: settings.max_upload_bytes,
        })
    }
}

const IMAGE_FIELD: &str = "image";

#[derive(Default)]
struct FormParts {
    fields: HashMap<String, String>,
    image: Option<Upload>,
}

/// Drains a multipart body into text fields and the optional `image` file.
/// A file part with an empty filename counts as absent. `limit` caps the
/// bytes buffered across all parts together.
async fn read_form(mut payload: Multipart, limit: usize) -> Result<FormParts, ApiError> {
    let mut parts = FormParts::default();
    let mut total = 0usize;
    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        log::warn!("multipart error: {e}");
        ApiError::BadRequest("Malformed multipart body".into())
    })? {
        let disposition = field.content_disposition();
        let Some(name) = disposition.get_name().map(str::to_owned) else { continue };
        let filename = disposition.get_filename().map(str::to_owned);
        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| {
            log::warn!("multipart stream error: {e}");
            ApiError::BadRequest("Malformed multipart body".into())
        })? {
            total += chunk.len();
            if total > limit {
                return Err(ApiError::PayloadTooLarge);
            }
            bytes.extend_from_slice(&chunk);
        }
        match filename {
            Some(f) if name == IMAGE_FIELD && !f.is_empty() => parts.image = Some(Upload { filename: f, bytes }),
            Some(_) => {}
            None => {
                parts.fields.insert(name, String::from_utf8_lossy(&bytes).into_owned());
            }
        }
    }
    Ok(parts)
}

fn checked_image(upload: Option<Upload>) -> Result<Option<Upload>, ApiError> {
    match upload {
        Some(u) if !infer::is_image(&u.bytes) => Err(ApiError::UnsupportedMediaType),
        other => Ok(other),
    }
}

fn no_image() -> ApiError {
    ApiError::BadRequest("No image file provided".into())
}

// ---------------- Notices ----------------

#[utoipa::path(
    get,
    path = "/api/notices",
    tag = "notices",
    responses((status = 200, description = "All notices in stored order", body = [Notice]))
)]
pub async fn list_notices(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.list_notices().await?))
}

#[utoipa::path(
    post,
    path = "/api/notices",
    tag = "notices",
    request_body = NewNotice,
    responses(
        (status = 201, description = "Notice created"),
        (status = 401, description = "No admin session")
    )
)]
pub async fn create_notice(
    _admin: Admin,
    data: web::Data<AppState>,
    payload: web::Json<NewNotice>,
) -> Result<HttpResponse, ApiError> {
    let notice = data.repo.create_notice(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({"status": "success", "notice": notice})))
}

#[utoipa::path(
    put,
    path = "/api/notices/{id}",
    tag = "notices",
    request_body = UpdateNotice,
    params(("id" = Id, Path, description = "Notice id")),
    responses(
        (status = 200, description = "Updated; unknown ids are accepted unchanged"),
        (status = 401, description = "No admin session")
    )
)]
pub async fn update_notice(
    _admin: Admin,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateNotice>,
) -> Result<HttpResponse, ApiError> {
    match data.repo.update_notice(path.into_inner(), payload.into_inner()).await {
        Ok(_) | Err(RepoError::NotFound) => Ok(HttpResponse::Ok().json(serde_json::json!({"status": "updated"}))),
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    delete,
    path = "/api/notices/{id}",
    tag = "notices",
    params(("id" = Id, Path, description = "Notice id")),
    responses(
        (status = 200, description = "Deleted (idempotent)"),
        (status = 401, description = "No admin session")
    )
)]
pub async fn delete_notice(_admin: Admin, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    data.repo.delete_notice(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"status": "deleted"})))
}

// ---------------- Links ----------------

#[utoipa::path(
    get,
    path = "/api/links",
    tag = "links",
    responses((status = 200, description = "All links in stored order", body = [Link]))
)]
pub async fn list_links(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.list_links().await?))
}

#[utoipa::path(
    post,
    path = "/api/links",
    tag = "links",
    request_body(content = LinkUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Link created"),
        (status = 400, description = "No image file provided"),
        (status = 401, description = "No admin session"),
        (status = 413, description = "Payload too large"),
        (status = 415, description = "Not an image")
    )
)]
pub async fn create_link(_admin: Admin, data: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse, ApiError> {
    let mut form = read_form(payload, data.max_upload_bytes).await?;
    let image = checked_image(form.image.take())?.ok_or_else(no_image)?;
    let new = NewLink {
        title: form.fields.remove("title").unwrap_or_default(),
        url: form.fields.remove("url").unwrap_or_default(),
    };
    let link = data.repo.create_link(new, Some(image)).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({"status": "success", "link": link})))
}

#[utoipa::path(
    put,
    path = "/api/links/{id}",
    tag = "links",
    request_body(content = LinkUpload, content_type = "multipart/form-data"),
    params(("id" = Id, Path, description = "Link id")),
    responses(
        (status = 200, description = "Updated"),
        (status = 401, description = "No admin session"),
        (status = 404, description = "Link not found")
    )
)]
pub async fn update_link(
    _admin: Admin,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let mut form = read_form(payload, data.max_upload_bytes).await?;
    let image = checked_image(form.image.take())?;
    let upd = UpdateLink { title: form.fields.remove("title"), url: form.fields.remove("url") };
    match data.repo.update_link(path.into_inner(), upd, image).await {
        Ok(_) => Ok(HttpResponse::Ok().json(serde_json::json!({"status": "updated"}))),
        Err(RepoError::NotFound) => Err(ApiError::NotFound("Link not found")),
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    delete,
    path = "/api/links/{id}",
    tag = "links",
    params(("id" = Id, Path, description = "Link id")),
    responses(
        (status = 200, description = "Deleted (idempotent)"),
        (status = 401, description = "No admin session")
    )
)]
pub async fn delete_link(_admin: Admin, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    data.repo.delete_link(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"status": "deleted"})))
}

// ---------------- Gallery ----------------

#[utoipa::path(
    get,
    path = "/api/gallery",
    tag = "gallery",
    responses((status = 200, description = "All gallery images in stored order", body = [GalleryImage]))
)]
pub async fn list_gallery(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.list_gallery().await?))
}

#[utoipa::path(
    post,
    path = "/api/gallery",
    tag = "gallery",
    request_body(content = GalleryUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Image stored"),
        (status = 400, description = "No image file provided"),
        (status = 401, description = "No admin session"),
        (status = 415, description = "Not an image")
    )
)]
pub async fn create_gallery_image(
    _admin: Admin,
    data: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let mut form = read_form(payload, data.max_upload_bytes).await?;
    let image = checked_image(form.image.take())?.ok_or_else(no_image)?;
    let stored = data.repo.create_gallery_image(image).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({"status": "success", "image": stored})))
}

#[utoipa::path(
    delete,
    path = "/api/gallery/{id}",
    tag = "gallery",
    params(("id" = Id, Path, description = "Gallery image id")),
    responses(
        (status = 200, description = "Deleted (idempotent)"),
        (status = 401, description = "No admin session")
    )
)]
pub async fn delete_gallery_image(
    _admin: Admin,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    data.repo.delete_gallery_image(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"status": "deleted"})))
}

// serve a stored upload by name
pub async fn get_upload(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    match data.uploads.load(&path.into_inner()).await {
        Ok((bytes, mime)) => Ok(HttpResponse::Ok().insert_header(("Content-Type", mime)).body(bytes)),
        Err(UploadError::NotFound) => Err(ApiError::NotFound("File not found")),
        Err(e) => {
            log::error!("upload load error: {e}");
            Err(ApiError::Internal)
        }
    }
}
