//! Server-rendered pages: the public board, the admin page and the
//! login/logout flow that drives the session gate.

use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpResponse};
use log::{error, info, warn};
use serde::Deserialize;

use crate::auth::{Admin, SessionGate};
use crate::routes::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/admin", web::get().to(admin))
        .service(
            web::resource("/login")
                .route(web::get().to(login_form))
                .route(web::post().to(login)),
        )
        .route("/logout", web::get().to(logout));
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn html(status: StatusCode, title: &str, body: &str) -> HttpResponse {
    HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(format!(
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n{body}\n</body></html>\n"
        ))
}

fn redirect(to: &str) -> HttpResponse {
    HttpResponse::SeeOther().insert_header((header::LOCATION, to)).finish()
}

fn login_page(status: StatusCode, message: Option<&str>) -> HttpResponse {
    let notice = message
        .map(|m| format!("<p class=\"error\">{}</p>\n", escape(m)))
        .unwrap_or_default();
    html(
        status,
        "Login",
        &format!(
            "<h1>Admin login</h1>\n{notice}<form method=\"post\" action=\"/login\">\n\
             <label>Username <input name=\"username\" autocomplete=\"username\"></label>\n\
             <label>Password <input name=\"password\" type=\"password\" autocomplete=\"current-password\"></label>\n\
             <button type=\"submit\">Log in</button>\n</form>"
        ),
    )
}

pub async fn index(data: web::Data<AppState>) -> HttpResponse {
    // a broken store renders as empty sections rather than an error page
    let notices = data.repo.list_notices().await.unwrap_or_default();
    let links = data.repo.list_links().await.unwrap_or_default();
    let gallery = data.repo.list_gallery().await.unwrap_or_default();

    let mut body = String::from("<h1>Notice board</h1>\n<h2>Notices</h2>\n<ul>\n");
    for n in &notices {
        body.push_str(&format!("<li>{}</li>\n", escape(&n.text)));
    }
    body.push_str("</ul>\n<h2>Links</h2>\n<ul>\n");
    for l in &links {
        let img = l
            .image
            .as_deref()
            .map(|i| format!("<img src=\"/uploads/{}\" alt=\"\"> ", escape(i)))
            .unwrap_or_default();
        body.push_str(&format!("<li>{img}<a href=\"{}\">{}</a></li>\n", escape(&l.url), escape(&l.title)));
    }
    body.push_str("</ul>\n<h2>Gallery</h2>\n<div class=\"gallery\">\n");
    for g in &gallery {
        body.push_str(&format!("<img src=\"/uploads/{}\" alt=\"\">\n", escape(&g.filename)));
    }
    body.push_str("</div>");
    html(StatusCode::OK, "Notice board", &body)
}

pub async fn admin(admin: Option<Admin>, data: web::Data<AppState>) -> HttpResponse {
    let Some(Admin(claims)) = admin else { return redirect("/login") };
    let notices = data.repo.list_notices().await.map(|v| v.len()).unwrap_or(0);
    let links = data.repo.list_links().await.map(|v| v.len()).unwrap_or(0);
    let gallery = data.repo.list_gallery().await.map(|v| v.len()).unwrap_or(0);
    html(
        StatusCode::OK,
        "Admin",
        &format!(
            "<h1>Admin</h1>\n<p>Signed in as {}. <a href=\"/logout\">Log out</a></p>\n\
             <ul>\n<li>Notices: {notices}</li>\n<li>Links: {links}</li>\n<li>Gallery images: {gallery}</li>\n</ul>\n\
             <p>Manage records through <code>/api/notices</code>, <code>/api/links</code> and <code>/api/gallery</code>.</p>",
            escape(&claims.sub)
        ),
    )
}

pub async fn login_form() -> HttpResponse {
    login_page(StatusCode::OK, None)
}

pub async fn login(data: web::Data<AppState>, form: web::Form<LoginForm>) -> HttpResponse {
    let form = form.into_inner();
    match data.credentials.verify(&form.username, &form.password) {
        Ok(true) => match data.sessions.issue(&form.username) {
            Ok(token) => {
                info!("admin session started for '{}'", form.username);
                HttpResponse::SeeOther()
                    .insert_header((header::LOCATION, "/admin"))
                    .cookie(data.sessions.cookie(token))
                    .finish()
            }
            Err(e) => {
                error!("issuing session token failed: {e}");
                login_page(StatusCode::INTERNAL_SERVER_ERROR, Some("Login is temporarily unavailable"))
            }
        },
        Ok(false) => {
            warn!("rejected login for '{}'", form.username);
            login_page(StatusCode::UNAUTHORIZED, Some("Invalid username or password"))
        }
        Err(e) => {
            error!("credential check failed: {e}");
            login_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                Some("Login is unavailable: admin credentials are not configured"),
            )
        }
    }
}

pub async fn logout(admin: Option<Admin>, data: web::Data<AppState>) -> HttpResponse {
    if let Some(Admin(claims)) = admin {
        data.sessions.revoke(&claims);
        info!("admin session ended for '{}'", claims.sub);
    }
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, "/login"))
        .cookie(SessionGate::removal_cookie())
        .finish()
}
