use phf::phf_map;

/// 训练类别表, 顺序必须与模型导出时一致
pub static CLASS_LABELS: [&str; 8] = [
    "apple_fresh",
    "apple_stale",
    "onion_fresh",
    "onion_stale",
    "carrot_fresh",
    "carrot_stale",
    "tomato_fresh",
    "tomato_stale",
];

/// 各产品新鲜状态下的预期保质期 (天)
pub static EXPECTED_LIFESPAN_DAYS: phf::Map<&'static str, u32> = phf_map! {
    "apple" => 7,
    "onion" => 10,
    "carrot" => 5,
    "tomato" => 3,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Fresh)
    }
}

impl std::fmt::Display for Freshness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Freshness::Fresh => write!(f, "Fresh"),
            Freshness::Stale => write!(f, "Stale"),
        }
    }
}

/// 类别ID转标签, 超出范围返回None
pub fn label_for_class(id: usize) -> Option<&'static str> {
    CLASS_LABELS.get(id).copied()
}

/// 拆分复合标签 "apple_fresh" -> ("apple", Fresh)
/// 格式不是恰好两段、或后缀不是fresh/stale时返回None
pub fn split_label(label: &str) -> Option<(&str, Freshness)> {
    let mut parts = label.split('_');
    let product = parts.next()?;
    let state = parts.next()?;
    if parts.next().is_some() || product.is_empty() {
        return None;
    }
    let freshness = match state {
        "fresh" => Freshness::Fresh,
        "stale" => Freshness::Stale,
        _ => return None,
    };
    Some((product, freshness))
}

pub fn lifespan_days(product: &str) -> Option<u32> {
    EXPECTED_LIFESPAN_DAYS.get(product).copied()
}

/// 首字母大写 (展示用): "apple" -> "Apple"
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_class_labels_split() {
        // 8个训练类别全部可拆分
        for (id, label) in CLASS_LABELS.iter().enumerate() {
            let (product, _) = split_label(label).unwrap();
            assert!(lifespan_days(product).is_some(), "{label} (id={id})");
        }
    }

    #[test]
    fn test_split_label() {
        assert_eq!(split_label("apple_fresh"), Some(("apple", Freshness::Fresh)));
        assert_eq!(split_label("tomato_stale"), Some(("tomato", Freshness::Stale)));
        assert_eq!(split_label("banana"), None);
        assert_eq!(split_label("apple_rotten"), None);
        assert_eq!(split_label("a_b_c"), None);
        assert_eq!(split_label("_fresh"), None);
    }

    #[test]
    fn test_lifespan_table() {
        assert_eq!(lifespan_days("apple"), Some(7));
        assert_eq!(lifespan_days("onion"), Some(10));
        assert_eq!(lifespan_days("carrot"), Some(5));
        assert_eq!(lifespan_days("tomato"), Some(3));
        assert_eq!(lifespan_days("durian"), None);
    }

    #[test]
    fn test_label_for_class_bounds() {
        assert_eq!(label_for_class(0), Some("apple_fresh"));
        assert_eq!(label_for_class(7), Some("tomato_stale"));
        assert_eq!(label_for_class(8), None);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("apple"), "Apple");
        assert_eq!(capitalize(""), "");
    }
}
