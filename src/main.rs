#[macro_use]
extern crate rocket;

mod config;
mod db;
mod error;
mod guards;
mod models;
mod routes;
mod services;
mod store;
mod utils;

#[cfg(test)]
mod test_support;

use std::time::Duration;

use dotenvy::dotenv;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::serde::json::{json, Value};
use rocket::{Build, Request, Response, Rocket};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};

use crate::config::Config;
use crate::utils::ErrorThrottle;

/* ----------------------------- CORS ----------------------------- */

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let Some(origin) = request.headers().get_one("Origin") {
            response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        }

        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PATCH, DELETE, OPTIONS",
        ));

        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        ));

        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/* ----------------------------- OPTIONS ----------------------------- */

#[options("/<_..>")]
fn options_handler() {}

/* ----------------------------- ERRORS ----------------------------- */

fn error_body(message: &str) -> Value {
    json!({
        "success": false,
        "message": message
    })
}

#[catch(400)]
fn bad_request() -> Value {
    error_body("Bad request")
}

#[catch(401)]
fn unauthorized() -> Value {
    error_body("Authentication required")
}

#[catch(403)]
fn forbidden() -> Value {
    error_body("Forbidden")
}

#[catch(404)]
fn not_found() -> Value {
    error_body("Resource not found (check /api/v1 prefix)")
}

#[catch(422)]
fn unprocessable() -> Value {
    error_body("Malformed request body")
}

#[catch(500)]
fn internal_error() -> Value {
    error_body("Internal server error")
}

/* ----------------------------- SWAGGER ----------------------------- */

fn swagger_config() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/api/v1/openapi.json".to_string(),
        ..Default::default()
    }
}

/* ----------------------------- ROUTES ----------------------------- */

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .attach(CORS)
        .mount("/", routes![options_handler])
        .mount(
            "/api/v1",
            openapi_get_routes![
                // Auth
                routes::auth::register,
                routes::auth::login,
                // User
                routes::user::get_profile,
                routes::user::update_profile,
                routes::user::find_providers,
                routes::user::find_workers,
                routes::user::find_farmers,
                routes::user::get_user_reviews,
                // Provider
                routes::provider::prioritized_providers,
                // Task
                routes::task::create_task,
                routes::task::provider_tasks,
                routes::task::client_tasks,
                routes::task::update_task,
                routes::task::accept_task,
                routes::task::reject_task,
                // Review
                routes::review::create_review,
                routes::review::get_provider_reviews,
            ],
        )
        .mount("/api/docs", make_swagger_ui(&swagger_config()))
        .register(
            "/",
            catchers![bad_request, unauthorized, forbidden, not_found, unprocessable, internal_error],
        )
}

/* ----------------------------- LAUNCH ----------------------------- */

#[launch]
fn rocket() -> Rocket<Build> {
    dotenv().ok();
    env_logger::init();

    info!("LocalLink API starting");
    info!("Swagger UI → http://localhost:8000/api/docs");

    let throttle = ErrorThrottle::new(Duration::from_millis(Config::error_repeat_window_ms()));

    mount_api(rocket::build().attach(db::init()).manage(throttle))
}
