use clap::Parser;
use mimalloc::MiMalloc;

use freshscan_rs::annotate::Annotator;
use freshscan_rs::{gen_time_string, interpret_paired, Args, Ledger, YOLOv8};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// 单图检测: cargo run --bin scan -- --source fruit.jpg
fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if args.source.is_empty() {
        anyhow::bail!("未指定图片, 用法: scan --source <图片路径>");
    }

    let mut model = YOLOv8::new(args.clone())?;
    model.summary();

    let img = image::open(&args.source)?;
    let bboxes = model.run(&img)?;
    let pairs = interpret_paired(&bboxes, args.conf);

    if pairs.is_empty() {
        println!("⚠️ No objects were detected in the image. Please try again.");
        return Ok(());
    }

    println!("\n🎯 检测结果:");
    for (_, record) in &pairs {
        println!(
            "  - {} ({}) 置信度 {}",
            record.product_display(),
            record.freshness,
            record.confidence_display()
        );
    }

    // 记账并落盘
    let mut ledger = Ledger::load(&args.ledger)?;
    for (_, record) in &pairs {
        ledger.upsert(&record.product, record.freshness.is_fresh());
    }
    ledger.save()?;
    println!("✅ Fresh count updated and saved.");

    // 标注图保存到 runs/
    if args.plot {
        let annotator = Annotator::with_default_font();
        let canvas = annotator.annotate(&img, &pairs);
        let runs_dir = std::path::Path::new("runs");
        std::fs::create_dir_all(runs_dir)?;
        let save_path = runs_dir.join(format!("{}.png", gen_time_string("-")));
        canvas.save(&save_path)?;
        println!("💾 标注图已保存: {}", save_path.display());
    }

    Ok(())
}
