// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
use clap::Parser;

#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// ONNX model path
    #[arg(long, default_value = "freshnew100.onnx")]
    pub model: String,

    /// input image path
    #[arg(long, default_value = "")]
    pub source: String,

    /// ledger spreadsheet path (CSV)
    #[arg(long, default_value = "detection_fresh_count.csv")]
    pub ledger: String,

    /// device id
    #[arg(long, default_value_t = 0)]
    pub device_id: u32,

    /// using TensorRT EP
    #[arg(long)]
    pub trt: bool,

    /// using CUDA EP
    #[arg(long)]
    pub cuda: bool,

    /// using TensorRT --fp16
    #[arg(long)]
    pub fp16: bool,

    /// num_classes
    #[arg(long)]
    pub nc: Option<u32>,

    /// input image width
    #[arg(long)]
    pub width: Option<u32>,

    /// input image height
    #[arg(long)]
    pub height: Option<u32>,

    /// confidence threshold
    #[arg(long, required = false, default_value_t = 0.5)]
    pub conf: f32,

    /// iou threshold in NMS
    #[arg(long, required = false, default_value_t = 0.45)]
    pub iou: f32,

    /// plot inference result and save
    #[arg(long)]
    pub plot: bool,

    /// check time consumed in each stage
    #[arg(long)]
    pub profile: bool,
}

// server.rs 以结构体更新语法构造Args, 不走命令行解析
impl Default for Args {
    fn default() -> Self {
        Self {
            model: "freshnew100.onnx".to_string(),
            source: String::new(),
            ledger: "detection_fresh_count.csv".to_string(),
            device_id: 0,
            trt: false,
            cuda: false,
            fp16: false,
            nc: None,
            width: None,
            height: None,
            conf: 0.5,
            iou: 0.45,
            plot: false,
            profile: false,
        }
    }
}
