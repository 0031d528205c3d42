// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, questions, submissions, tryouts, users},
    state::AppState,
    utils::jwt::{auth_middleware, blacklist_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, users, tryouts, questions, submissions).
/// * Applies global middleware (Trace, CORS).
/// * Everything under /api except /api/auth requires a bearer token
///   that passes both the blacklist check and signature verification.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout));

    let user_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/{id}", get(users::get_user));

    let tryout_routes = Router::new()
        .route("/", get(tryouts::list_tryouts).post(tryouts::create_tryout))
        .route(
            "/{id}",
            get(tryouts::get_tryout)
                .put(tryouts::update_tryout)
                .delete(tryouts::delete_tryout),
        )
        .route("/title/{title}", get(tryouts::find_tryouts_by_title))
        .route(
            "/category/{category}",
            get(tryouts::find_tryouts_by_category),
        );

    let question_routes = Router::new()
        .route("/", post(questions::create_question))
        .route(
            "/{id}",
            get(questions::get_question)
                .put(questions::update_question)
                .delete(questions::delete_question),
        )
        .route(
            "/tryout/{tryout_id}",
            get(questions::list_questions_by_tryout),
        );

    let submission_routes = Router::new()
        .route("/", post(submissions::create_submission))
        .route("/{id}", get(submissions::get_submission))
        .route("/user/{user_id}", get(submissions::list_submissions_by_user))
        .route(
            "/tryout/{tryout_id}",
            get(submissions::list_submissions_by_tryout),
        )
        .route(
            "/tryout/{tryout_id}/user/{user_id}",
            get(submissions::get_submission_by_tryout_and_user),
        )
        .route("/{id}/submit", put(submissions::submit_answers))
        .route("/{id}/finalize", put(submissions::finalize_submission));

    let protected = Router::new()
        .nest("/users", user_routes)
        .nest("/tryouts", tryout_routes)
        .nest("/questions", question_routes)
        .nest("/submissions", submission_routes)
        // Applied from outside in: blacklist check first, then signature.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            blacklist_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", protected)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
