use crate::models::{GalleryImage, GalleryUpload, Link, LinkUpload, NewNotice, Notice, UpdateNotice};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::list_notices,
        crate::routes::create_notice,
        crate::routes::update_notice,
        crate::routes::delete_notice,
        crate::routes::list_links,
        crate::routes::create_link,
        crate::routes::update_link,
        crate::routes::delete_link,
        crate::routes::list_gallery,
        crate::routes::create_gallery_image,
        crate::routes::delete_gallery_image,
    ),
    components(schemas(Notice, NewNotice, UpdateNotice, Link, LinkUpload, GalleryImage, GalleryUpload)),
    tags(
        (name = "notices", description = "Notice operations"),
        (name = "links", description = "Link operations"),
        (name = "gallery", description = "Gallery operations"),
    )
)]
pub struct ApiDoc;
