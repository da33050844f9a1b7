//! Application router configuration with protected and unprotected route
//! definitions.

use axum::{
    Router, middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    AppState, Error,
    auth_middleware::auth_guard,
    category::{
        delete_category_endpoint, get_category_detail, get_category_list, post_category,
        put_category,
    },
    endpoints,
    log_in::post_log_in,
    log_out::post_log_out,
    register_user::post_register_user,
    transaction::{
        delete_transaction_endpoint, get_transaction_detail, get_transaction_list,
        post_transaction, put_transaction,
    },
};

/// Return a router with all the app's routes.
///
/// The category and transaction routes require a valid auth cookie, the
/// account routes do not.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::USERS, post(post_register_user))
        .route(endpoints::LOG_IN, post(post_log_in))
        .route(endpoints::LOG_OUT, post(post_log_out));

    let protected_routes = Router::new()
        .route(
            endpoints::CATEGORIES,
            get(get_category_list).post(post_category),
        )
        .route(
            endpoints::CATEGORY,
            get(get_category_detail)
                .put(put_category)
                .delete(delete_category_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS,
            get(get_transaction_list).post(post_transaction),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_detail)
                .put(put_transaction)
                .delete(delete_transaction_endpoint),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

/// The JSON 404 response for paths that do not match any route.
async fn get_404_not_found() -> Response {
    Error::NotFound.into_response()
}
