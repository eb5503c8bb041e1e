//! Web上传界面
//!
//! 单页表单上传图片, 检测后更新台账并展示结果

pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use once_cell::sync::Lazy;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::annotate::Annotator;
use crate::{Ledger, YOLOv8};

/// 上传体积上限
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// 服务启动时刻 (uptime计算用)
pub static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);

/// 会话状态: 模型、台账、最近一次标注图, 单把锁串行化写入
pub struct SessionState {
    pub model: YOLOv8,
    pub ledger: Ledger,
    pub last_annotated: Option<Vec<u8>>,
}

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<SessionState>>,
    pub annotator: Arc<Annotator>,
    pub conf: f32,
    pub model_path: String,
}

impl AppState {
    pub fn new(model: YOLOv8, ledger: Ledger, annotator: Annotator, conf: f32, model_path: String) -> Self {
        Self {
            session: Arc::new(Mutex::new(SessionState {
                model,
                ledger,
                last_annotated: None,
            })),
            annotator: Arc::new(annotator),
            conf,
            model_path,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/detect", post(handlers::detect))
        .route("/ledger.csv", get(handlers::download_ledger))
        .route("/annotated.png", get(handlers::annotated_png))
        .route("/api/status", get(handlers::status))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
