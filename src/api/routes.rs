use axum::routing::get;
use axum::Router;

use super::handlers::{page_data, page_datum, render_page, AppState};

/// 创建服务端渲染路由
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(render_page))
        .route("/page-data", get(page_data))
        .route("/page-data/{key}", get(page_datum))
        .with_state(state)
}
