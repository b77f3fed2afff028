mod config;
mod cors;
mod database;
mod error;
mod handlers;
mod model;
mod schema;

use actix_web::{
    middleware::{from_fn, Logger},
    web, App, HttpServer,
};
use config::Config;
use cors::OriginPolicy;
use database::MovieStore;
use log::info;

#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("movies_api=debug,actix_web=info"),
    )
    .init();

    let config = Config::from_env().map_err(std::io::Error::other)?;
    let store = web::Data::new(MovieStore::seeded().map_err(std::io::Error::other)?);
    let policy = web::Data::new(OriginPolicy::new(config.allowed_origins.clone()));
    info!(
        "seeded {} movies, serving on http://{}:{}",
        store.len(),
        config.host,
        config.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(from_fn(cors::enforce))
            .wrap(Logger::default())
            .app_data(store.clone())
            .app_data(policy.clone())
            .configure(handlers::configure)
    })
    .bind(config.bind_address())?
    .run()
    .await
}
