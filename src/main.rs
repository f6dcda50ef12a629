mod aggregate;
mod api;
mod config;
mod datastore;
mod graph;
mod media;
mod metrics;
mod policy;
mod twoface;

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate guard;
#[macro_use]
extern crate diesel;

use crate::api::auth::TokenVerifier;
use crate::config::Config;
use crate::datastore::postgres::PostgresStore;
use crate::media::MediaStore;
use actix_service::Service;
use actix_web::{dev::ServiceResponse, middleware, web, App, HttpServer};
use datastore::postgres;
use futures::future::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};

#[allow(clippy::cognitive_complexity)]
fn main() {
    let args: Vec<_> = std::env::args().collect();
    guard!(let [_, config_file_path, ..] = &args[..] else {
        eprintln!("First argument should be path to config file");
        return
    });

    let config = match Config::from_file(config_file_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            return;
        }
    };

    // Set up logger output
    let subscriber_builder = tracing_subscriber::fmt().with_max_level(Level::DEBUG);
    if config.human_logs {
        subscriber_builder.init();
    } else {
        subscriber_builder.json().init();
    }

    info!("starting socialgraph");

    let sys = actix_rt::System::new("socialgraph");

    // Build the postgres client
    let db = match PostgresStore::new(
        postgres::Dsn::new(&config),
        config.db_pool_size,
        Duration::from_secs(config.db_connection_timeout),
    ) {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "couldn't connect to Postgres");
            return;
        }
    };
    if let Err(e) = prometheus::register(Box::new(db.clone())) {
        warn!(error = %e, "couldn't register DB metrics");
    }

    // Build the app state
    if !config.edges.allow_self_follow || !config.edges.allow_self_like {
        info!(
            allow_self_follow = config.edges.allow_self_follow,
            allow_self_like = config.edges.allow_self_like,
            "self-edges restricted"
        );
    }
    let state = api::State {
        ds: Arc::new(db),
        edges: config.edges,
        media: MediaStore::new(&config.media_root),
    };
    let verifier = TokenVerifier::new(config.jwt_secret.clone());

    // Start the API server
    info!(addr = &config.listen_address[..], "starting API server");
    let max_body_size = config.max_body_size;
    let max_image_size = config.max_image_size;
    let server = HttpServer::new(move || {
        App::new()
            // Middleware for Prometheus
            .wrap_fn(|request, srv| srv.call(request).map(increment_response_metrics))
            .data(state.clone())
            .data(verifier.clone())
            // enable logger
            .wrap(middleware::Logger::default())
            // limit size of the payload (global configuration)
            .app_data(web::JsonConfig::default().limit(max_body_size))
            .app_data(web::PayloadConfig::new(max_image_size))
            .configure(api::configure::<PostgresStore>)
    })
    .bind(config.listen_address.clone());
    match server {
        Ok(server) => {
            server.run();
        }
        Err(e) => {
            error!(error = %e, "couldn't start API server");
            return;
        }
    }

    // Start the metrics server
    info!(addr = &config.metrics_address[..], "starting metrics server");
    let metrics_server = HttpServer::new(|| {
        App::new().service(
            web::scope("/metrics")
                .service(web::resource("/").route(web::get().to(metrics::endpoint::gather)))
                .service(web::resource("").route(web::get().to(metrics::endpoint::gather))),
        )
    })
    .bind(config.metrics_address.clone());
    match metrics_server {
        Ok(server) => {
            server.run();
        }
        Err(e) => {
            error!(error = %e, "couldn't start metrics server");
            return;
        }
    }

    if let Err(e) = sys.run() {
        error!(error = %e, "actix runtime terminated");
    }
}

/// If response is OK, increment the metrics for HTTP statuses.
fn increment_response_metrics<E, B>(
    response: Result<ServiceResponse<B>, E>,
) -> Result<ServiceResponse<B>, E> {
    match response {
        Ok(response) => {
            metrics::HTTP_RESPONSES
                .with_label_values(&[response.status().as_str()])
                .inc();
            Ok(response)
        }
        other => other,
    }
}
