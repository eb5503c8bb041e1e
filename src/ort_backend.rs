// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
use anyhow::{anyhow, bail, Result};
use half::f16;
use ndarray::{Array, IxDyn};
use ort::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProvider, GraphOptimizationLevel,
    Session, TensorElementType, TensorRTExecutionProvider, ValueType,
};
use regex::Regex;

/// ONNX Runtime 执行器选择
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrtEP {
    CPU,
    CUDA(u32),
    Trt(u32),
}

#[derive(Debug, Clone)]
pub struct OrtConfig {
    /// ONNX模型文件路径
    pub f: String,
    pub ep: OrtEP,
    pub trt_fp16: bool,
    /// 动态输入时的 (height, width) 指定值
    pub image_size: (Option<u32>, Option<u32>),
}

/// ONNX Runtime 推理封装: 会话构建、输入形状探测、f32/f16运行
pub struct OrtBackend {
    session: Session,
    ep: OrtEP,
    dtype: TensorElementType,
    height: u32,
    width: u32,
    input_name: String,
    output_name: String,
    names: Option<Vec<String>>,
}

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        let builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;

        // 执行器注册, 不可用时回退CPU
        let mut ep = config.ep;
        let builder = match ep {
            OrtEP::CUDA(device_id) => {
                let cuda = CUDAExecutionProvider::default().with_device_id(device_id as i32);
                if cuda.is_available()? {
                    builder.with_execution_providers([cuda.build()])?
                } else {
                    eprintln!("⚠️ CUDA执行器不可用, 回退CPU");
                    ep = OrtEP::CPU;
                    builder
                }
            }
            OrtEP::Trt(device_id) => {
                let trt = TensorRTExecutionProvider::default()
                    .with_device_id(device_id as i32)
                    .with_fp16(config.trt_fp16);
                if trt.is_available()? {
                    builder.with_execution_providers([trt.build()])?
                } else {
                    eprintln!("⚠️ TensorRT执行器不可用, 回退CPU");
                    ep = OrtEP::CPU;
                    builder
                }
            }
            OrtEP::CPU => {
                builder.with_execution_providers([CPUExecutionProvider::default().build()])?
            }
        };

        let session = builder.commit_from_file(&config.f)?;

        // 输入节点探测: 名称、精度、形状 [batch, ch, height, width]
        let input = session
            .inputs
            .first()
            .ok_or_else(|| anyhow!("模型没有输入节点"))?;
        let input_name = input.name.clone();
        let (dtype, dimensions) = match &input.input_type {
            ValueType::Tensor { ty, dimensions } => (*ty, dimensions.clone()),
            t => bail!("模型输入不是张量: {t:?}"),
        };
        match dtype {
            TensorElementType::Float32 | TensorElementType::Float16 => {}
            t => bail!("不支持的模型输入精度: {t:?}"),
        }
        let height = resolve_dim(dimensions.get(2).copied(), config.image_size.0);
        let width = resolve_dim(dimensions.get(3).copied(), config.image_size.1);

        let output_name = session
            .outputs
            .first()
            .ok_or_else(|| anyhow!("模型没有输出节点"))?
            .name
            .clone();

        let names = fetch_names(&session);

        Ok(Self {
            session,
            ep,
            dtype,
            height,
            width,
            input_name,
            output_name,
            names,
        })
    }

    /// 单次推理, 输入 [1, 3, H, W] 归一化f32, 输出保持f32
    pub fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Array<f32, IxDyn>> {
        let t_run = std::time::Instant::now();
        let ys = match self.dtype {
            TensorElementType::Float16 => {
                let xs = xs.mapv(f16::from_f32);
                let outputs = self
                    .session
                    .run(ort::inputs![self.input_name.as_str() => xs.view()]?)?;
                outputs[self.output_name.as_str()]
                    .try_extract_tensor::<f16>()?
                    .mapv(f16::to_f32)
            }
            _ => {
                let outputs = self
                    .session
                    .run(ort::inputs![self.input_name.as_str() => xs.view()]?)?;
                outputs[self.output_name.as_str()]
                    .try_extract_tensor::<f32>()?
                    .to_owned()
            }
        };
        if profile {
            println!("[ORT Session]: {:?}", t_run.elapsed());
        }
        Ok(ys)
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn ep(&self) -> OrtEP {
        self.ep
    }

    /// 模型导出时附带的类别表 (metadata "names")
    pub fn names(&self) -> Option<&Vec<String>> {
        self.names.as_ref()
    }

    pub fn nc(&self) -> Option<u32> {
        self.names.as_ref().map(|n| n.len() as u32)
    }
}

/// 固定维度直接用, 动态维度(-1)依次取指定值、640
fn resolve_dim(dim: Option<i64>, specified: Option<u32>) -> u32 {
    match dim {
        Some(d) if d > 0 => d as u32,
        _ => match specified {
            Some(v) => v,
            None => {
                eprintln!("⚠️ 模型输入尺寸为动态且未指定, 使用640");
                640
            }
        },
    }
}

fn fetch_from_metadata(session: &Session, key: &str) -> Option<String> {
    session.metadata().ok()?.custom(key).ok().flatten()
}

/// 解析导出metadata里的names表, 形如 {0: 'apple_fresh', 1: 'apple_stale', ...}
fn fetch_names(session: &Session) -> Option<Vec<String>> {
    let raw = fetch_from_metadata(session, "names")?;
    let re = Regex::new(r#"(['"])([-()\w '"]+)(['"])"#).ok()?;
    let mut names = Vec::new();
    for (_, [_, name, _]) in re.captures_iter(&raw).map(|c| c.extract()) {
        names.push(name.to_string());
    }
    Some(names)
}
