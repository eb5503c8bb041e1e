use std::io::Read;
use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::Result;
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::interpreter::DetectionRecord;
use crate::Bbox;

const FRESH_COLOR: Rgba<u8> = Rgba([0, 200, 0, 255]);
const STALE_COLOR: Rgba<u8> = Rgba([220, 30, 30, 255]);
const LEGEND_TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

const FONT_NAME: &str = "Arial.ttf";
const FONT_URL: &str = "https://ultralytics.com/assets/Arial.ttf";

/// 检测框标注器: 新鲜画绿框, 过期画红框, 框上方写标签
///
/// 字体不可用时退化为只画边框。
pub struct Annotator {
    font: Option<FontVec>,
    scale: PxScale,
}

impl Annotator {
    pub fn new(font: Option<FontVec>) -> Self {
        Self {
            font,
            scale: PxScale::from(24.0),
        }
    }

    /// 使用缓存目录里的Arial字体, 没有则尝试下载一次
    pub fn with_default_font() -> Self {
        Self::new(load_default_font())
    }

    pub fn annotate(
        &self,
        img: &DynamicImage,
        detections: &[(Bbox, DetectionRecord)],
    ) -> RgbaImage {
        let mut canvas = img.to_rgba8();

        for (bbox, record) in detections {
            let color = if record.freshness.is_fresh() {
                FRESH_COLOR
            } else {
                STALE_COLOR
            };

            // 3px边框, 向外扩张
            for expand in 0..3i32 {
                let x = bbox.xmin() as i32 - expand;
                let y = bbox.ymin() as i32 - expand;
                let w = (bbox.width() as i32 + 2 * expand).max(1) as u32;
                let h = (bbox.height() as i32 + 2 * expand).max(1) as u32;
                draw_hollow_rect_mut(&mut canvas, Rect::at(x, y).of_size(w, h), color);
            }

            if let Some(font) = &self.font {
                // 标签条: "Apple Fresh 0.92"
                let legend = format!(
                    "{} {} {}",
                    record.product_display(),
                    record.freshness,
                    record.confidence_display()
                );
                let (text_w, text_h) = text_size(self.scale, font, &legend);
                let x = (bbox.xmin() as i32).max(0);
                let y = (bbox.ymin() as i32 - text_h as i32 - 4).max(0);
                draw_filled_rect_mut(
                    &mut canvas,
                    Rect::at(x, y).of_size(text_w + 8, text_h + 4),
                    color,
                );
                draw_text_mut(
                    &mut canvas,
                    LEGEND_TEXT_COLOR,
                    x + 4,
                    y + 2,
                    self.scale,
                    font,
                    &legend,
                );
            }
        }

        canvas
    }
}

fn load_default_font() -> Option<FontVec> {
    let config_dir = dirs::config_dir()?.join("Ultralytics");
    let font_path = config_dir.join(FONT_NAME);

    if !font_path.exists() {
        println!("🔍 标注字体不存在, 尝试下载: {}", FONT_URL);
        if let Err(e) = download_font(&config_dir, &font_path) {
            eprintln!("⚠️ 字体下载失败: {}, 标注退化为只画边框", e);
            return None;
        }
    }

    let buffer = match std::fs::read(&font_path) {
        Ok(buffer) => buffer,
        Err(e) => {
            eprintln!("⚠️ 字体读取失败: {}, 标注退化为只画边框", e);
            return None;
        }
    };
    match FontVec::try_from_vec(buffer) {
        Ok(font) => Some(font),
        Err(e) => {
            eprintln!("⚠️ 字体解析失败: {}, 标注退化为只画边框", e);
            None
        }
    }
}

fn download_font(config_dir: &Path, font_path: &Path) -> Result<()> {
    std::fs::create_dir_all(config_dir)?;
    let response = ureq::get(FONT_URL)
        .timeout(std::time::Duration::from_secs(30))
        .call()?;
    let mut buffer = Vec::new();
    response.into_reader().read_to_end(&mut buffer)?;
    std::fs::write(font_path, buffer)?;
    println!("✅ 字体已缓存: {}", font_path.display());
    Ok(())
}
