//! HTTP处理器: 上传检测、台账下载、状态查询

use std::io::Cursor;

use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Json};
use serde_json::{json, Value};

use crate::interpreter::{interpret_paired, DetectionRecord};
use crate::ledger::{Ledger, LEDGER_HEADER};

use super::{AppState, SERVER_START};

/// 首页: 上传表单 + 当前台账
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let session = state.session.lock().await;
    Html(render_index(&session.ledger))
}

/// 上传一张图片, 检测并更新台账
pub async fn detect(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> (StatusCode, Html<String>) {
    // 取表单中的image字段
    let mut image_bytes = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() == Some("image") {
                    match field.bytes().await {
                        Ok(bytes) => {
                            image_bytes = Some(bytes);
                            break;
                        }
                        Err(e) => {
                            tracing::warn!("读取上传内容失败: {e}");
                            return error_page(
                                StatusCode::BAD_REQUEST,
                                "Failed to read the uploaded file. Please try again.",
                            );
                        }
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("解析multipart表单失败: {e}");
                return error_page(
                    StatusCode::BAD_REQUEST,
                    "Invalid upload form. Please try again.",
                );
            }
        }
    }
    let Some(bytes) = image_bytes else {
        return error_page(StatusCode::BAD_REQUEST, "No image uploaded. Choose an image first.");
    };

    // 解码失败是用户可见错误, 不触碰台账
    let img = match image::load_from_memory(&bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!("图片解码失败: {e}");
            return error_page(StatusCode::UNPROCESSABLE_ENTITY, "Error: Image not found.");
        }
    };

    let mut session = state.session.lock().await;

    // 推理是同步重活, 让出当前worker线程
    let detected = tokio::task::block_in_place(|| session.model.run(&img));
    let bboxes = match detected {
        Ok(bboxes) => bboxes,
        Err(e) => {
            tracing::error!("推理失败: {e:#}");
            return error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Detection failed. Check server logs.",
            );
        }
    };

    let pairs = interpret_paired(&bboxes, state.conf);
    if pairs.is_empty() {
        // 无结果不写台账
        return (StatusCode::OK, Html(render_no_detections()));
    }

    // 按检测顺序逐条记账, 一次落盘
    for (_, record) in &pairs {
        session
            .ledger
            .upsert(&record.product, record.freshness.is_fresh());
    }
    if let Err(e) = session.ledger.save() {
        tracing::error!("台账保存失败: {e:#}");
        return error_page(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save the ledger.");
    }

    // 标注图缓存给 /annotated.png
    let canvas = state.annotator.annotate(&img, &pairs);
    let mut png = Vec::new();
    match canvas.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png) {
        Ok(()) => session.last_annotated = Some(png),
        Err(e) => {
            tracing::warn!("标注图编码失败: {e}");
            session.last_annotated = None;
        }
    }

    let records: Vec<&DetectionRecord> = pairs.iter().map(|(_, record)| record).collect();
    (
        StatusCode::OK,
        Html(render_results(&records, &session.ledger, session.last_annotated.is_some())),
    )
}

/// 台账CSV下载
pub async fn download_ledger(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, StatusCode> {
    let session = state.session.lock().await;
    let bytes = session.ledger.to_csv_bytes().map_err(|e| {
        tracing::error!("台账导出失败: {e:#}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"updated_fresh_count.csv\"",
            ),
        ],
        bytes,
    ))
}

/// 最近一次检测的标注图
pub async fn annotated_png(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, StatusCode> {
    let session = state.session.lock().await;
    match &session.last_annotated {
        Some(png) => Ok(([(header::CONTENT_TYPE, "image/png")], png.clone())),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// 服务状态
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    let session = state.session.lock().await;
    Json(json!({
        "status": "ok",
        "data": {
            "version": env!("CARGO_PKG_VERSION"),
            "model": state.model_path,
            "ledger_rows": session.ledger.len(),
            "uptime_seconds": SERVER_START.elapsed().as_secs(),
        }
    }))
}

fn error_page(status: StatusCode, message: &str) -> (StatusCode, Html<String>) {
    (status, Html(render_message_page(message, "error")))
}

const PAGE_STYLE: &str = "\
body{font-family:sans-serif;max-width:760px;margin:2em auto;padding:0 1em;color:#222}\
table{border-collapse:collapse;margin:1em 0;width:100%}\
th,td{border:1px solid #ccc;padding:6px 10px;text-align:left}\
th{background:#f4f4f4}\
.fresh{color:#0a0}.stale{color:#c22}\
.success{color:#0a0}.warning{color:#b80}.error{color:#c22}\
img{max-width:100%;margin:1em 0}\
a{color:#06c}";

fn render_page(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Fresh Product Detection</title>\n<style>{PAGE_STYLE}</style>\n</head>\n\
         <body>\n{body}\n</body>\n</html>"
    )
}

fn render_index(ledger: &Ledger) -> String {
    let mut body = String::from(
        "<h1>Fresh Product Detection with YOLOv8</h1>\n\
         <p>Upload an image, and this app will detect fresh and stale products.</p>\n\
         <form method=\"post\" action=\"/detect\" enctype=\"multipart/form-data\">\n\
         <input type=\"file\" name=\"image\" accept=\"image/jpeg,image/png\" required>\n\
         <button type=\"submit\">Detect</button>\n</form>\n",
    );
    if !ledger.is_empty() {
        body.push_str("<h2>Fresh Count Ledger</h2>\n");
        body.push_str(&render_ledger_table(ledger));
        body.push_str("<p><a href=\"/ledger.csv\">Download Updated Ledger</a></p>\n");
    }
    render_page(&body)
}

fn render_results(records: &[&DetectionRecord], ledger: &Ledger, has_annotated: bool) -> String {
    let mut body = String::from("<h1>Detection Results</h1>\n");

    body.push_str("<table>\n<tr><th>Product</th><th>Freshness</th><th>Confidence</th></tr>\n");
    for record in records {
        let class = if record.freshness.is_fresh() { "fresh" } else { "stale" };
        body.push_str(&format!(
            "<tr><td>{}</td><td class=\"{}\">{}</td><td>{}</td></tr>\n",
            html_escape(&record.product_display()),
            class,
            record.freshness,
            record.confidence_display(),
        ));
    }
    body.push_str("</table>\n");

    body.push_str("<p class=\"success\">Fresh count updated and saved.</p>\n");
    if has_annotated {
        body.push_str("<img src=\"/annotated.png\" alt=\"annotated detection\">\n");
    }

    body.push_str("<h2>Fresh Count Ledger</h2>\n");
    body.push_str(&render_ledger_table(ledger));
    body.push_str(
        "<p><a href=\"/ledger.csv\">Download Updated Ledger</a> | <a href=\"/\">Back</a></p>\n",
    );
    render_page(&body)
}

fn render_no_detections() -> String {
    render_message_page(
        "No objects were detected in the image. Please try again.",
        "warning",
    )
}

fn render_message_page(message: &str, class: &str) -> String {
    let body = format!(
        "<h1>Fresh Product Detection with YOLOv8</h1>\n\
         <p class=\"{}\">{}</p>\n<p><a href=\"/\">Back</a></p>",
        class,
        html_escape(message),
    );
    render_page(&body)
}

fn render_ledger_table(ledger: &Ledger) -> String {
    let mut table = String::from("<table>\n<tr>");
    for column in LEDGER_HEADER {
        table.push_str(&format!("<th>{column}</th>"));
    }
    table.push_str("</tr>\n");
    for row in ledger.rows() {
        table.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            row.seq,
            html_escape(&row.product),
            row.fresh_count,
            html_escape(&row.last_detected),
            html_escape(&row.lifespan),
        ));
    }
    table.push_str("</table>\n");
    table
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
