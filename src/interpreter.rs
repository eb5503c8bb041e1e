use crate::labels::{self, Freshness};
use crate::Bbox;

/// 单条检测解释结果: 产品 + 新鲜度 + 置信度
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRecord {
    pub product: String,
    pub freshness: Freshness,
    pub confidence: f32,
}

impl DetectionRecord {
    /// 展示用产品名: "apple" -> "Apple"
    pub fn product_display(&self) -> String {
        labels::capitalize(&self.product)
    }

    /// 展示用置信度: 保留两位小数
    pub fn confidence_display(&self) -> String {
        format!("{:.2}", self.confidence)
    }
}

/// 把模型输出的检测框解释为产品/新鲜度记录
///
/// 低于置信度阈值的框跳过; 类别ID超出标签表、或标签无法拆分的框
/// 打印警告后跳过, 不中断整个解释过程。输出顺序与输入一致。
pub fn interpret_detections(bboxes: &[Bbox], conf_threshold: f32) -> Vec<DetectionRecord> {
    interpret_paired(bboxes, conf_threshold)
        .into_iter()
        .map(|(_, record)| record)
        .collect()
}

/// 同 interpret_detections, 但保留每条记录对应的检测框 (标注用)
pub fn interpret_paired(bboxes: &[Bbox], conf_threshold: f32) -> Vec<(Bbox, DetectionRecord)> {
    let mut pairs = Vec::new();
    for bbox in bboxes {
        let confidence = bbox.confidence();
        if confidence < conf_threshold {
            continue;
        }

        let label = match labels::label_for_class(bbox.id()) {
            Some(label) => label,
            None => {
                eprintln!("⚠️ 未知类别ID {}, 已跳过该检测框", bbox.id());
                continue;
            }
        };

        let (product, freshness) = match labels::split_label(label) {
            Some(parsed) => parsed,
            None => {
                eprintln!("⚠️ 标签格式异常 \"{}\", 已跳过该检测框", label);
                continue;
            }
        };

        pairs.push((
            bbox.clone(),
            DetectionRecord {
                product: product.to_string(),
                freshness,
                confidence,
            },
        ));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpret_basic() {
        let boxes = vec![Bbox::new(10.0, 10.0, 50.0, 50.0, 0, 0.9)];
        let records = interpret_detections(&boxes, 0.5);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].product, "apple");
        assert_eq!(records[0].freshness, Freshness::Fresh);
        assert_eq!(records[0].product_display(), "Apple");
        assert_eq!(records[0].confidence_display(), "0.90");
    }

    #[test]
    fn test_interpret_filters_low_confidence() {
        let boxes = vec![
            Bbox::new(0.0, 0.0, 10.0, 10.0, 0, 0.3),
            Bbox::new(0.0, 0.0, 10.0, 10.0, 3, 0.7),
        ];
        let records = interpret_detections(&boxes, 0.5);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].product, "onion");
        assert_eq!(records[0].freshness, Freshness::Stale);
    }

    #[test]
    fn test_interpret_threshold_inclusive() {
        // 恰好等于阈值的保留, 严格小于的过滤
        let boxes = vec![Bbox::new(0.0, 0.0, 10.0, 10.0, 6, 0.5)];
        let records = interpret_detections(&boxes, 0.5);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].product, "tomato");
    }

    #[test]
    fn test_interpret_skips_unknown_class() {
        let boxes = vec![
            Bbox::new(0.0, 0.0, 10.0, 10.0, 42, 0.9),
            Bbox::new(0.0, 0.0, 10.0, 10.0, 1, 0.8),
        ];
        let records = interpret_detections(&boxes, 0.5);

        // 非法ID跳过, 后续框不受影响
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].product, "apple");
        assert_eq!(records[0].freshness, Freshness::Stale);
    }

    #[test]
    fn test_interpret_preserves_order() {
        let boxes = vec![
            Bbox::new(0.0, 0.0, 10.0, 10.0, 4, 0.9),
            Bbox::new(0.0, 0.0, 10.0, 10.0, 0, 0.6),
            Bbox::new(0.0, 0.0, 10.0, 10.0, 7, 0.8),
        ];
        let records = interpret_detections(&boxes, 0.5);

        let products: Vec<&str> = records.iter().map(|r| r.product.as_str()).collect();
        assert_eq!(products, vec!["carrot", "apple", "tomato"]);
    }

    #[test]
    fn test_interpret_all_classes() {
        let boxes: Vec<Bbox> = (0..8)
            .map(|id| Bbox::new(0.0, 0.0, 10.0, 10.0, id, 0.9))
            .collect();
        let records = interpret_detections(&boxes, 0.5);

        assert_eq!(records.len(), 8);
        let expect = [
            ("apple", Freshness::Fresh),
            ("apple", Freshness::Stale),
            ("onion", Freshness::Fresh),
            ("onion", Freshness::Stale),
            ("carrot", Freshness::Fresh),
            ("carrot", Freshness::Stale),
            ("tomato", Freshness::Fresh),
            ("tomato", Freshness::Stale),
        ];
        for (record, (product, freshness)) in records.iter().zip(expect.iter()) {
            assert_eq!(record.product, *product);
            assert_eq!(record.freshness, *freshness);
        }
    }

    #[test]
    fn test_interpret_empty() {
        assert!(interpret_detections(&[], 0.5).is_empty());
    }

    #[test]
    fn test_interpret_paired_keeps_box() {
        let boxes = vec![
            Bbox::new(5.0, 6.0, 10.0, 10.0, 0, 0.3),
            Bbox::new(50.0, 60.0, 20.0, 20.0, 2, 0.8),
        ];
        let pairs = interpret_paired(&boxes, 0.5);

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.xmin(), 50.0);
        assert_eq!(pairs[0].1.product, "onion");
    }
}
