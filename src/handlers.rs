use crate::cors::{self, OriginPolicy};
use crate::database::{MovieDb, MovieStore};
use crate::error::ApiError;
use crate::schema;
use actix_web::{
    http::{header, Method},
    web, HttpRequest, HttpResponse,
};
use log::{debug, info};
use serde::Deserialize;
use serde_json::{json, Value};

type Store = web::Data<MovieStore>;
type Policy = web::Data<OriginPolicy>;

#[derive(Deserialize)]
struct SearchParams {
    genre: Option<String>,
}

async fn list_movies(store: Store) -> HttpResponse {
    HttpResponse::Ok().json(store.list_all())
}

async fn search_movies(
    params: web::Query<SearchParams>,
    store: Store,
) -> Result<HttpResponse, ApiError> {
    let movies = store.filter_by_genre(params.genre.as_deref())?;
    Ok(HttpResponse::Ok().json(movies))
}

async fn get_movie(id: web::Path<String>, store: Store) -> Result<HttpResponse, ApiError> {
    let movie = store.find_by_id(&id)?;
    Ok(HttpResponse::Ok().json(movie))
}

async fn create_movie(body: web::Json<Value>, store: Store) -> Result<HttpResponse, ApiError> {
    let new_movie = schema::validate_movie(&body)?;
    let movie = store.create(new_movie);
    info!("created movie {} ({})", movie.id, movie.title);
    Ok(HttpResponse::Created().json(movie))
}

async fn update_movie(
    id: web::Path<String>,
    body: web::Json<Value>,
    store: Store,
) -> Result<HttpResponse, ApiError> {
    let patch = schema::validate_partial_movie(&body)?;
    let movie = store.update_partial(&id, patch)?;
    info!("updated movie {}", movie.id);
    Ok(HttpResponse::Ok().json(movie))
}

async fn delete_movie(id: web::Path<String>, store: Store) -> Result<HttpResponse, ApiError> {
    let movie = store.delete(&id)?;
    info!("deleted movie {} ({})", movie.id, movie.title);
    Ok(HttpResponse::Ok().json(json!({ "message": "Movie deleted" })))
}

async fn preflight(req: HttpRequest, policy: Policy) -> HttpResponse {
    let mut response = HttpResponse::Ok();
    if policy.evaluate_headers(req.headers()).is_allowed() {
        let allow_headers = req
            .headers()
            .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
            .cloned()
            .unwrap_or_else(|| header::HeaderValue::from_static(cors::DEFAULT_ALLOWED_HEADERS));
        response
            .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, cors::ALLOWED_METHODS))
            .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers));
    }
    response.finish()
}

async fn not_found(req: HttpRequest) -> HttpResponse {
    debug!("no route for {} {}", req.method(), req.path());
    HttpResponse::NotFound()
        .content_type("text/plain; charset=utf-8")
        .body("Resource not found")
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| ApiError::from(schema::malformed_body(err.to_string())).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| ApiError::InvalidQuery(err.to_string()).into())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .service(
            web::resource("/movies")
                .route(web::get().to(list_movies))
                .route(web::post().to(create_movie))
                .route(web::method(Method::OPTIONS).to(preflight))
                .default_service(web::to(not_found)),
        )
        .service(
            web::resource("/movies/search")
                .route(web::get().to(search_movies))
                .default_service(web::to(not_found)),
        )
        .service(
            web::resource("/movies/{id}")
                .route(web::get().to(get_movie))
                .route(web::patch().to(update_movie))
                .route(web::delete().to(delete_movie))
                .route(web::method(Method::OPTIONS).to(preflight))
                .default_service(web::to(not_found)),
        )
        .default_service(web::to(not_found));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ALLOWED_ORIGINS;
    use actix_web::{
        http::StatusCode,
        middleware::from_fn,
        test::{self, TestRequest},
        App,
    };

    const SHAWSHANK: &str = "dcdd0fad-a94c-4810-8acc-5f108d3b18c3";

    macro_rules! test_app {
        ($store:expr) => {
            test::init_service(
                App::new()
                    .app_data($store.clone())
                    .app_data(web::Data::new(OriginPolicy::new(
                        DEFAULT_ALLOWED_ORIGINS.iter().copied(),
                    )))
                    .wrap(from_fn(cors::enforce))
                    .configure(configure),
            )
            .await
        };
    }

    fn seeded() -> Store {
        web::Data::new(MovieStore::seeded().unwrap())
    }

    fn gattaca() -> Value {
        json!({
            "title": "Gattaca",
            "year": 1997,
            "director": "Andrew Niccol",
            "duration": 106,
            "poster": "https://example.com/gattaca.jpg",
            "genre": ["Drama", "Sci-Fi"]
        })
    }

    #[actix_rt::test]
    async fn lists_seeded_movies() {
        let store = seeded();
        let app = test_app!(store);
        let req = TestRequest::get().uri("/movies").to_request();
        let body: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.len(), store.list_all().len());
        assert_eq!(body[0]["id"], json!(SHAWSHANK));
    }

    #[actix_rt::test]
    async fn get_by_id_and_missing_id() {
        let app = test_app!(seeded());

        let req = TestRequest::get()
            .uri(&format!("/movies/{}", SHAWSHANK))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let movie: Value = test::read_body_json(resp).await;
        assert_eq!(movie["title"], json!("The Shawshank Redemption"));

        let req = TestRequest::get().uri("/movies/unknown").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "message": "Movie not found" }));
    }

    #[actix_rt::test]
    async fn create_then_fetch_returns_submitted_fields() {
        let store = seeded();
        let seeded_ids: Vec<String> = store.list_all().into_iter().map(|m| m.id).collect();
        let app = test_app!(store);

        let req = TestRequest::post()
            .uri("/movies")
            .set_json(gattaca())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        let id = created["id"].as_str().unwrap().to_owned();
        assert!(!seeded_ids.contains(&id));
        assert_eq!(created["rate"], json!(0));

        let req = TestRequest::get()
            .uri(&format!("/movies/{}", id))
            .to_request();
        let fetched: Value = test::call_and_read_body_json(&app, req).await;
        let mut expected = gattaca();
        expected["id"] = json!(id);
        expected["rate"] = json!(0);
        assert_eq!(fetched, expected);
    }

    #[actix_rt::test]
    async fn submitted_rate_comes_back_unchanged() {
        let app = test_app!(seeded());

        for rate in &[json!(8), json!(7.5), json!(10)] {
            let mut payload = gattaca();
            payload["rate"] = rate.clone();
            let req = TestRequest::post()
                .uri("/movies")
                .set_json(payload.clone())
                .to_request();
            let created: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(&created["rate"], rate);

            let req = TestRequest::get()
                .uri(&format!("/movies/{}", created["id"].as_str().unwrap()))
                .to_request();
            let mut fetched: Value = test::call_and_read_body_json(&app, req).await;
            fetched.as_object_mut().unwrap().remove("id");
            assert_eq!(fetched, payload);
        }
    }

    #[actix_rt::test]
    async fn create_rejects_out_of_range_year_and_bad_poster() {
        let app = test_app!(seeded());

        for year in &[1899, 2026] {
            let mut payload = gattaca();
            payload["year"] = json!(year);
            let req = TestRequest::post()
                .uri("/movies")
                .set_json(payload)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["error"][0]["path"], json!(["year"]));
        }

        let mut payload = gattaca();
        payload["poster"] = json!("not-a-url");
        let req = TestRequest::post()
            .uri("/movies")
            .set_json(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"][0]["path"], json!(["poster"]));
        assert_eq!(body["error"][0]["code"], json!("invalid_string"));
    }

    #[actix_rt::test]
    async fn malformed_json_is_a_structured_bad_request() {
        let app = test_app!(seeded());
        let req = TestRequest::post()
            .uri("/movies")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{\"title\": ")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"][0]["path"], json!([]));
    }

    #[actix_rt::test]
    async fn patch_changes_only_supplied_fields() {
        let store = seeded();
        let before = store.find_by_id(SHAWSHANK).unwrap();
        let app = test_app!(store);

        let req = TestRequest::patch()
            .uri(&format!("/movies/{}", SHAWSHANK))
            .set_json(json!({ "title": "New Title" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let updated: Value = test::read_body_json(resp).await;

        let mut expected = serde_json::to_value(&before).unwrap();
        expected["title"] = json!("New Title");
        assert_eq!(updated, expected);
        assert_eq!(store.list_all()[0].title, "New Title");
    }

    #[actix_rt::test]
    async fn patch_validates_before_looking_up() {
        let app = test_app!(seeded());

        let req = TestRequest::patch()
            .uri("/movies/unknown")
            .set_json(json!({ "rate": 11 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = TestRequest::patch()
            .uri("/movies/unknown")
            .set_json(json!({ "rate": 7 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn delete_then_get_is_not_found() {
        let app = test_app!(seeded());
        let uri = format!("/movies/{}", SHAWSHANK);

        let req = TestRequest::delete().uri(&uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "message": "Movie deleted" }));

        let req = TestRequest::get().uri(&uri).to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND
        );

        let req = TestRequest::delete().uri(&uri).to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[actix_rt::test]
    async fn search_is_case_insensitive_and_requires_genre() {
        let app = test_app!(seeded());

        let req = TestRequest::get()
            .uri("/movies/search?genre=action")
            .to_request();
        let lower: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        let req = TestRequest::get()
            .uri("/movies/search?genre=Action")
            .to_request();
        let upper: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert!(!lower.is_empty());
        assert_eq!(lower, upper);
        assert!(lower
            .iter()
            .all(|m| m["genre"].as_array().unwrap().contains(&json!("Action"))));

        let req = TestRequest::get()
            .uri("/movies/search?genre=western")
            .to_request();
        let none: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert!(none.is_empty());

        let req = TestRequest::get().uri("/movies/search").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["message"].is_string());
    }

    #[actix_rt::test]
    async fn undecodable_query_is_a_json_bad_request() {
        let app = test_app!(seeded());
        let req = TestRequest::get()
            .uri("/movies/search?genre=action&genre=drama")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body: Value = test::read_body_json(resp).await;
        assert!(body["message"].as_str().unwrap().contains("genre"));
    }

    #[actix_rt::test]
    async fn allowed_origin_is_echoed_and_others_are_not() {
        let app = test_app!(seeded());

        let req = TestRequest::get()
            .uri("/movies")
            .insert_header((header::ORIGIN, "https://movies.com"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://movies.com"
        );

        let req = TestRequest::get()
            .uri("/movies")
            .insert_header((header::ORIGIN, "https://evil.example"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());

        let req = TestRequest::get().uri("/movies").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[actix_rt::test]
    async fn denied_origin_cannot_delete() {
        let store = seeded();
        let app = test_app!(store);

        let req = TestRequest::delete()
            .uri(&format!("/movies/{}", SHAWSHANK))
            .insert_header((header::ORIGIN, "https://evil.example"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(store.find_by_id(SHAWSHANK).is_ok());

        let req = TestRequest::delete()
            .uri(&format!("/movies/{}", SHAWSHANK))
            .insert_header((header::ORIGIN, "http://localhost:8080"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:8080"
        );
        assert!(store.find_by_id(SHAWSHANK).is_err());
    }

    #[actix_rt::test]
    async fn preflight_follows_the_origin_policy() {
        let app = test_app!(seeded());
        let uri = format!("/movies/{}", SHAWSHANK);

        let req = TestRequest::default()
            .method(Method::OPTIONS)
            .uri(&uri)
            .insert_header((header::ORIGIN, "https://midudev.com"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://midudev.com"
        );
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            cors::ALLOWED_METHODS
        );

        let req = TestRequest::default()
            .method(Method::OPTIONS)
            .uri(&uri)
            .insert_header((header::ORIGIN, "https://evil.example"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
        assert!(resp
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_METHODS)
            .is_none());
    }

    #[actix_rt::test]
    async fn preflight_allows_json_writes_from_listed_origins() {
        let app = test_app!(seeded());

        let req = TestRequest::default()
            .method(Method::OPTIONS)
            .uri(&format!("/movies/{}", SHAWSHANK))
            .insert_header((header::ORIGIN, "https://movies.com"))
            .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH"))
            .insert_header((header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
            "content-type"
        );

        let req = TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/movies")
            .insert_header((header::ORIGIN, "https://movies.com"))
            .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "POST"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://movies.com"
        );
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            cors::ALLOWED_METHODS
        );
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
            cors::DEFAULT_ALLOWED_HEADERS
        );

        let req = TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/movies")
            .insert_header((header::ORIGIN, "https://evil.example"))
            .insert_header((header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
            .is_none());
    }

    #[actix_rt::test]
    async fn unknown_routes_are_plain_text_not_found() {
        let app = test_app!(seeded());

        let req = TestRequest::get().uri("/series").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = test::read_body(resp).await;
        assert_eq!(body, "Resource not found");

        let req = TestRequest::put()
            .uri(&format!("/movies/{}", SHAWSHANK))
            .set_json(gattaca())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
