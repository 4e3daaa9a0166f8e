use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use serde::Serialize;

use crate::core::{payload, resolver, snapshot};
use crate::error::ConfigError;
use crate::models::{SourceKind, DEFAULT_SERVER_RANK, DEFAULT_TRACKED_KEYS};

/// 服务端渲染上下文：跟踪键集合与来源排序，均为数据
pub struct ServerContext {
    pub keys: Vec<String>,
    pub rank: Vec<SourceKind>,
}

impl ServerContext {
    pub fn with_default_keys() -> Self {
        Self {
            keys: DEFAULT_TRACKED_KEYS.iter().map(|k| k.to_string()).collect(),
            rank: DEFAULT_SERVER_RANK.to_vec(),
        }
    }
}

/// 共享状态类型
pub type AppState = Arc<ServerContext>;

// ---- 响应结构体 ----

#[derive(Debug, Serialize)]
pub struct SingleValueResponse {
    pub key: String,
    pub value: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---- ConfigError -> HTTP Response ----

impl IntoResponse for ConfigError {
    fn into_response(self) -> Response {
        let status = match &self {
            ConfigError::KeyNotFound(_) => StatusCode::NOT_FOUND,
            ConfigError::PayloadDecode(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ---- 处理器 ----

/// GET /
/// 渲染页面：嵌入载荷脚本（保证先于消费者执行）与页面数据侧通道
pub async fn render_page(
    State(ctx): State<AppState>,
) -> Result<Html<String>, ConfigError> {
    let sources = resolver::ranked(&ctx.rank, None);
    let refs = resolver::as_refs(&sources);
    let snapshot = snapshot::build_snapshot(&ctx.keys, &refs);

    let payload = payload::encode(&snapshot)?;
    let side_channel: BTreeMap<&str, &str> = snapshot.iter().collect();
    let page_data = serde_json::to_string(&side_channel)?;

    Ok(Html(format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         <script>{payload}</script>\n\
         <script id=\"__PAGE_DATA__\" type=\"application/json\">{page_data}</script>\n\
         </head>\n\
         <body><div id=\"app\"></div></body>\n\
         </html>\n",
        payload = payload.as_str(),
        page_data = page_data,
    )))
}

/// GET /page-data
/// 侧通道：框架页面数据的独立读取端点
pub async fn page_data(
    State(ctx): State<AppState>,
) -> Json<BTreeMap<String, String>> {
    let sources = resolver::ranked(&ctx.rank, None);
    let refs = resolver::as_refs(&sources);
    let snapshot = snapshot::build_snapshot(&ctx.keys, &refs);
    Json(
        snapshot
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

/// GET /page-data/{key}
pub async fn page_datum(
    State(ctx): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<SingleValueResponse>, ConfigError> {
    let sources = resolver::ranked(&ctx.rank, None);
    let refs = resolver::as_refs(&sources);
    match resolver::resolve(&key, &refs) {
        Some(value) => Ok(Json(SingleValueResponse { key, value })),
        None => Err(ConfigError::KeyNotFound(key)),
    }
}
