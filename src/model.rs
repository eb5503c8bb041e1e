// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 检测模型实现
// 包含: 模型加载、预处理、推理、后处理

use anyhow::{bail, Result};
use image::{DynamicImage, GenericImageView};
use ndarray::{s, Array, Axis, IxDyn};

use crate::{labels, non_max_suppression, Bbox, OrtBackend, OrtConfig, OrtEP};

/// 检测输出解码器: [1, 4+nc, anchors] -> 原图坐标系检测框
pub struct YOLOv8Postprocessor {
    pub nc: usize,
    pub conf: f32,
    pub iou: f32,
    pub width: u32,
    pub height: u32,
}

impl YOLOv8Postprocessor {
    pub fn postprocess(
        &self,
        xs: &Array<f32, IxDyn>,
        width_original: f32,
        height_original: f32,
    ) -> Result<Vec<Bbox>> {
        const CXYWH_OFFSET: usize = 4;

        let anchor = match xs.axis_iter(Axis(0)).next() {
            Some(anchor) => anchor,
            None => bail!("模型输出为空"),
        };
        if anchor.len_of(Axis(0)) < CXYWH_OFFSET + self.nc {
            bail!(
                "模型输出形状不符: 每anchor {} 维, 需要至少 {} 维",
                anchor.len_of(Axis(0)),
                CXYWH_OFFSET + self.nc
            );
        }

        let ratio =
            (self.width as f32 / width_original).min(self.height as f32 / height_original);

        let mut data: Vec<Bbox> = Vec::new();
        for pred in anchor.axis_iter(Axis(1)) {
            let bbox = pred.slice(s![0..CXYWH_OFFSET]);
            let clss = pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + self.nc]);

            let (id, &confidence) = clss
                .into_iter()
                .enumerate()
                .reduce(|max, x| if x.1 > max.1 { x } else { max })
                .unwrap();

            if confidence < self.conf {
                continue;
            }

            // 还原到原图坐标并裁到图内
            let cx = bbox[0] / ratio;
            let cy = bbox[1] / ratio;
            let w = bbox[2] / ratio;
            let h = bbox[3] / ratio;
            let x = cx - w / 2.;
            let y = cy - h / 2.;

            data.push(Bbox::new(
                x.max(0.0f32).min(width_original),
                y.max(0.0f32).min(height_original),
                w,
                h,
                id,
                confidence,
            ));
        }

        non_max_suppression(&mut data, self.iou);
        Ok(data)
    }
}

/// YOLOv8 检测模型
pub struct YOLOv8 {
    engine: OrtBackend,
    postprocessor: YOLOv8Postprocessor,
    height: u32,
    width: u32,
    names: Vec<String>,
    profile: bool,
}

impl YOLOv8 {
    /// 从配置创建模型
    pub fn new(config: crate::Args) -> Result<Self> {
        // execution provider
        let ep = if config.trt {
            OrtEP::Trt(config.device_id)
        } else if config.cuda {
            OrtEP::CUDA(config.device_id)
        } else {
            OrtEP::CPU
        };

        // build ort engine
        let ort_args = OrtConfig {
            ep,
            f: config.model.clone(),
            trt_fp16: config.fp16,
            image_size: (config.height, config.width),
        };
        let engine = OrtBackend::build(ort_args)?;

        let (height, width) = (engine.height(), engine.width());

        // 类别数: 模型metadata优先, 其次 --nc, 最后用内置标签表
        let nc = engine
            .nc()
            .or(config.nc)
            .unwrap_or(labels::CLASS_LABELS.len() as u32);

        // class names
        let names = engine.names().cloned().unwrap_or_else(|| {
            labels::CLASS_LABELS.iter().map(|s| s.to_string()).collect()
        });
        if names
            .iter()
            .map(|s| s.as_str())
            .ne(labels::CLASS_LABELS.iter().copied())
        {
            eprintln!("⚠️ 模型类别表与内置标签表不一致, 结果解释以内置表为准");
        }

        let postprocessor = YOLOv8Postprocessor {
            nc: nc as usize,
            conf: config.conf,
            iou: config.iou,
            width,
            height,
        };

        println!("✅ 检测模型加载成功: {}", config.model);

        Ok(Self {
            engine,
            postprocessor,
            height,
            width,
            names,
            profile: config.profile,
        })
    }

    fn scale_wh(&self, w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
        let r = (w1 / w0).min(h1 / h0);
        (r, (w0 * r).round(), (h0 * r).round())
    }

    /// letterbox缩放 + 归一化, 输出 [1, 3, H, W]
    pub fn preprocess(&self, x: &DynamicImage) -> Result<Array<f32, IxDyn>> {
        let mut ys = Array::ones((1, 3, self.height as usize, self.width as usize)).into_dyn();
        ys.fill(144.0 / 255.0);

        let (w0, h0) = x.dimensions();
        let (_, w_new, h_new) =
            self.scale_wh(w0 as f32, h0 as f32, self.width as f32, self.height as f32);
        let img = x.resize_exact(
            w_new as u32,
            h_new as u32,
            image::imageops::FilterType::Triangle,
        );

        for (x, y, rgb) in img.pixels() {
            let x = x as usize;
            let y = y as usize;
            let [r, g, b, _] = rgb.0;
            ys[[0, 0, y, x]] = (r as f32) / 255.0;
            ys[[0, 1, y, x]] = (g as f32) / 255.0;
            ys[[0, 2, y, x]] = (b as f32) / 255.0;
        }

        Ok(ys)
    }

    /// 完整推理: 预处理 -> 推理 -> 解码
    pub fn run(&mut self, x: &DynamicImage) -> Result<Vec<Bbox>> {
        let t_pre = std::time::Instant::now();
        let xs = self.preprocess(x)?;
        if self.profile {
            println!("[Model Preprocess]: {:?}", t_pre.elapsed());
        }

        let t_run = std::time::Instant::now();
        let ys = self.engine.run(xs, self.profile)?;
        if self.profile {
            println!("[Model Inference]: {:?}", t_run.elapsed());
        }

        let t_post = std::time::Instant::now();
        let (w0, h0) = x.dimensions();
        let bboxes = self
            .postprocessor
            .postprocess(&ys, w0 as f32, h0 as f32)?;
        if self.profile {
            println!("[Model Postprocess]: {:?}", t_post.elapsed());
        }

        Ok(bboxes)
    }

    pub fn summary(&self) {
        println!(
            "\nSummary:\n\
            > EP: {:?} {}\n\
            > Height: {}, Width: {}\n\
            > nc: {}, conf: {}, iou: {}\n\
            > Names: {:?}\n\
            ",
            self.engine.ep(),
            if let OrtEP::CPU = self.engine.ep() {
                ""
            } else {
                "(May still fall back to CPU)"
            },
            self.height,
            self.width,
            self.postprocessor.nc,
            self.postprocessor.conf,
            self.postprocessor.iou,
            self.names,
        );
    }

    pub fn names(&self) -> &Vec<String> {
        &self.names
    }
}
