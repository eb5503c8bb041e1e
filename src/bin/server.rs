use clap::Parser;
use mimalloc::MiMalloc;

use freshscan_rs::annotate::Annotator;
use freshscan_rs::web::{build_router, AppState, SERVER_START};
use freshscan_rs::{Ledger, YOLOv8};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// 生鲜新鲜度检测 Web服务
#[derive(Parser, Debug)]
#[command(author, version, about = "生鲜产品新鲜度检测 Web服务", long_about = None)]
struct Args {
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// 监听端口
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// ONNX模型路径
    #[arg(long, default_value = "freshnew100.onnx")]
    model: String,

    /// 台账CSV路径
    #[arg(long, default_value = "detection_fresh_count.csv")]
    ledger: String,

    /// 置信度阈值
    #[arg(long, default_value_t = 0.5)]
    conf: f32,

    /// 使用CUDA EP
    #[arg(long)]
    cuda: bool,

    /// 使用TensorRT EP
    #[arg(long)]
    trt: bool,

    /// GPU设备号
    #[arg(long, default_value_t = 0)]
    device_id: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .init();

    once_cell::sync::Lazy::force(&SERVER_START);

    let model_config = freshscan_rs::Args {
        model: args.model.clone(),
        ledger: args.ledger.clone(),
        conf: args.conf,
        cuda: args.cuda,
        trt: args.trt,
        device_id: args.device_id,
        ..Default::default()
    };
    let model = YOLOv8::new(model_config)?;
    model.summary();

    let ledger = Ledger::load(&args.ledger)?;
    let annotator = Annotator::with_default_font();

    let state = AppState::new(model, ledger, annotator, args.conf, args.model.clone());
    let router = build_router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    println!("🌐 Web server listening on http://{}", addr);
    println!("📊 上传界面: http://{}/", addr);

    axum::serve(listener, router).await?;
    Ok(())
}
