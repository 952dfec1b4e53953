use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use anyhow::Context;
use tracing::{error, info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use noticeboard::openapi::ApiDoc;
use noticeboard::{config, AppState, Settings};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds to reduce manual setup overhead.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    // Structured logging initialisation
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            error!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    info!("Bootstrapping noticeboard server");
    info!("Data directory: {}", settings.data_dir.display());
    info!("Upload directory: {}", settings.upload_dir.display());
    if !settings.credentials_file.exists() {
        // not fatal: login reports it until the file appears
        tracing::warn!("credentials file '{}' not found; admin login disabled", settings.credentials_file.display());
    }

    let state = AppState::from_settings(&settings).context("failed to prepare storage directories")?;
    let openapi = ApiDoc::openapi();
    let cors_origins = settings.cors_origins.clone();

    let server = HttpServer::new(move || {
        let cors = {
            let mut c = Cors::default()
                .allow_any_header()
                .allowed_methods(["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                .supports_credentials()
                .max_age(3600);
            if cors_origins.is_empty() {
                c = c.allow_any_origin();
            } else {
                for origin in &cors_origins {
                    c = c.allowed_origin(origin);
                }
            }
            c
        };

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind((settings.bind_addr.as_str(), settings.port))
    .with_context(|| format!("failed to bind {}:{}", settings.bind_addr, settings.port))?;

    info!("Listening on http://{}:{}", settings.bind_addr, settings.port);

    server.run().await.context("server terminated")
}
