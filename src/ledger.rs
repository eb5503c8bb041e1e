use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::labels;

/// 台账表头, 列顺序固定
pub const LEDGER_HEADER: [&str; 5] = [
    "S No",
    "Product",
    "Fresh Count",
    "Last Detected Time",
    "Expected Life Span",
];

/// 台账单行: 一种产品一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    #[serde(rename = "S No")]
    pub seq: u32,
    #[serde(rename = "Product")]
    pub product: String,
    #[serde(rename = "Fresh Count")]
    pub fresh_count: u32,
    #[serde(rename = "Last Detected Time")]
    pub last_detected: String,
    /// 天数字符串, 或 "N/A" (过期) / "Unknown" (表中无此产品)
    #[serde(rename = "Expected Life Span")]
    pub lifespan: String,
}

/// 新鲜度台账: 内存中的行列表 + 产品名索引, CSV落盘
///
/// 行按首次记录顺序排列, 序号一经分配不再变动。
/// 文件不存在时从空台账开始, 首次保存时才创建文件。
pub struct Ledger {
    path: PathBuf,
    rows: Vec<LedgerRow>,
    index: HashMap<String, usize>,
}

impl Ledger {
    /// 从CSV文件加载台账, 文件不存在时返回空台账
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            println!("📋 台账文件不存在, 首次保存时创建: {}", path.display());
            return Ok(Self {
                path,
                rows: Vec::new(),
                index: HashMap::new(),
            });
        }

        let mut reader = csv::Reader::from_path(&path)
            .with_context(|| format!("打开台账失败: {}", path.display()))?;
        let mut rows = Vec::new();
        let mut index = HashMap::new();
        for record in reader.deserialize() {
            let row: LedgerRow =
                record.with_context(|| format!("台账行解析失败: {}", path.display()))?;
            if index.contains_key(&row.product) {
                eprintln!("⚠️ 台账中产品 \"{}\" 重复, 仅更新首行", row.product);
            } else {
                index.insert(row.product.clone(), rows.len());
            }
            rows.push(row);
        }
        println!("✅ 台账已从 {} 加载 ({} 行)", path.display(), rows.len());

        Ok(Self { path, rows, index })
    }

    /// 记录一次检测: 新鲜则计数+1, 无论新鲜与否都刷新时间和保质期
    pub fn upsert(&mut self, product: &str, is_fresh: bool) {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.upsert_at(product, is_fresh, &now);
    }

    /// upsert的定时戳版本, 便于测试
    pub fn upsert_at(&mut self, product: &str, is_fresh: bool, timestamp: &str) {
        let lifespan = if !is_fresh {
            "N/A".to_string()
        } else {
            match labels::lifespan_days(product) {
                Some(days) => days.to_string(),
                None => "Unknown".to_string(),
            }
        };

        match self.index.get(product) {
            Some(&i) => {
                let row = &mut self.rows[i];
                if is_fresh {
                    row.fresh_count += 1;
                }
                row.last_detected = timestamp.to_string();
                row.lifespan = lifespan;
            }
            None => {
                let seq = self.rows.len() as u32 + 1;
                self.index.insert(product.to_string(), self.rows.len());
                self.rows.push(LedgerRow {
                    seq,
                    product: product.to_string(),
                    fresh_count: if is_fresh { 1 } else { 0 },
                    last_detected: timestamp.to_string(),
                    lifespan,
                });
            }
        }
    }

    /// 整表重写落盘, 表头始终写出
    pub fn save(&self) -> Result<()> {
        let mut writer = csv::Writer::from_path(&self.path)
            .with_context(|| format!("创建台账失败: {}", self.path.display()))?;
        if self.rows.is_empty() {
            writer.write_record(LEDGER_HEADER)?;
        } else {
            for row in &self.rows {
                writer.serialize(row)?;
            }
        }
        writer.flush()?;
        println!("💾 台账已保存: {} ({} 行)", self.path.display(), self.rows.len());
        Ok(())
    }

    /// 导出CSV字节 (Web下载用, 不落盘)
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        if self.rows.is_empty() {
            writer.write_record(LEDGER_HEADER)?;
        } else {
            for row in &self.rows {
                writer.serialize(row)?;
            }
        }
        writer
            .into_inner()
            .map_err(|e| anyhow!("导出CSV失败: {e}"))
    }

    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_ledger() -> Ledger {
        Ledger {
            path: PathBuf::from("unused.csv"),
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    #[test]
    fn test_upsert_new_fresh() {
        let mut ledger = empty_ledger();
        ledger.upsert_at("apple", true, "2025-01-01 10:00:00");

        assert_eq!(ledger.len(), 1);
        let row = &ledger.rows()[0];
        assert_eq!(row.seq, 1);
        assert_eq!(row.product, "apple");
        assert_eq!(row.fresh_count, 1);
        assert_eq!(row.last_detected, "2025-01-01 10:00:00");
        assert_eq!(row.lifespan, "7");
    }

    #[test]
    fn test_upsert_new_stale() {
        let mut ledger = empty_ledger();
        ledger.upsert_at("tomato", false, "2025-01-01 10:00:00");

        let row = &ledger.rows()[0];
        assert_eq!(row.fresh_count, 0);
        assert_eq!(row.lifespan, "N/A");
    }

    #[test]
    fn test_upsert_increments_and_refreshes() {
        let mut ledger = empty_ledger();
        ledger.upsert_at("apple", true, "2025-01-01 10:00:00");
        ledger.upsert_at("apple", true, "2025-01-02 11:30:00");

        assert_eq!(ledger.len(), 1);
        let row = &ledger.rows()[0];
        assert_eq!(row.fresh_count, 2);
        // 时间戳总是后者覆盖
        assert_eq!(row.last_detected, "2025-01-02 11:30:00");
    }

    #[test]
    fn test_upsert_stale_keeps_count() {
        let mut ledger = empty_ledger();
        ledger.upsert_at("carrot", true, "2025-01-01 10:00:00");
        ledger.upsert_at("carrot", false, "2025-01-03 09:00:00");

        let row = &ledger.rows()[0];
        assert_eq!(row.fresh_count, 1);
        assert_eq!(row.last_detected, "2025-01-03 09:00:00");
        // 过期检测会把保质期覆盖为N/A
        assert_eq!(row.lifespan, "N/A");
    }

    #[test]
    fn test_upsert_fresh_after_stale() {
        let mut ledger = empty_ledger();
        ledger.upsert_at("onion", false, "2025-01-01 10:00:00");
        ledger.upsert_at("onion", true, "2025-01-02 10:00:00");

        let row = &ledger.rows()[0];
        assert_eq!(row.fresh_count, 1);
        assert_eq!(row.lifespan, "10");
    }

    #[test]
    fn test_upsert_unknown_product_lifespan() {
        let mut ledger = empty_ledger();
        ledger.upsert_at("durian", true, "2025-01-01 10:00:00");

        assert_eq!(ledger.rows()[0].lifespan, "Unknown");
    }

    #[test]
    fn test_seq_assigned_in_first_seen_order() {
        let mut ledger = empty_ledger();
        ledger.upsert_at("apple", true, "2025-01-01 10:00:00");
        ledger.upsert_at("tomato", false, "2025-01-01 10:00:01");
        ledger.upsert_at("apple", true, "2025-01-01 10:00:02");
        ledger.upsert_at("onion", true, "2025-01-01 10:00:03");

        let seqs: Vec<u32> = ledger.rows().iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        let products: Vec<&str> = ledger.rows().iter().map(|r| r.product.as_str()).collect();
        assert_eq!(products, vec!["apple", "tomato", "onion"]);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_such_ledger.csv");
        let ledger = Ledger::load(&path).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");

        let mut ledger = Ledger::load(&path).unwrap();
        ledger.upsert_at("apple", true, "2025-01-01 10:00:00");
        ledger.upsert_at("carrot", false, "2025-01-01 10:00:01");
        ledger.upsert_at("apple", true, "2025-01-01 10:00:02");
        ledger.save().unwrap();

        let reloaded = Ledger::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.rows()[0].product, "apple");
        assert_eq!(reloaded.rows()[0].fresh_count, 2);
        assert_eq!(reloaded.rows()[0].lifespan, "7");
        assert_eq!(reloaded.rows()[1].product, "carrot");
        assert_eq!(reloaded.rows()[1].fresh_count, 0);

        // 重新加载后继续累计
        let mut again = reloaded;
        again.upsert_at("apple", true, "2025-01-02 08:00:00");
        assert_eq!(again.rows()[0].fresh_count, 3);
    }

    #[test]
    fn test_save_empty_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");

        let ledger = Ledger::load(&path).unwrap();
        ledger.save().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content.lines().next().unwrap(),
            "S No,Product,Fresh Count,Last Detected Time,Expected Life Span"
        );
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn test_csv_header_matches_serde_renames() {
        let mut ledger = empty_ledger();
        ledger.upsert_at("apple", true, "2025-01-01 10:00:00");
        let bytes = ledger.to_csv_bytes().unwrap();
        let content = String::from_utf8(bytes).unwrap();

        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "S No,Product,Fresh Count,Last Detected Time,Expected Life Span"
        );
        assert_eq!(lines.next().unwrap(), "1,apple,1,2025-01-01 10:00:00,7");
    }
}
