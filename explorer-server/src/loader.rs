//! 病例 CSV 加载

use explorer_core::{ExplorerError, RawRow, Result};
use std::path::Path;
use tracing::info;

/// 读取带表头的 CSV 文件，每行作为一条原始记录
pub fn load_raw_rows(path: &Path) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| ExplorerError::Io(format!("Failed to open case file {}: {}", path.display(), e)))?;

    let mut rows = Vec::new();
    for (index, record) in reader.deserialize::<RawRow>().enumerate() {
        let row = record.map_err(|e| {
            let message = format!("record {} of {}: {}", index + 1, path.display(), e);
            if e.is_io_error() {
                ExplorerError::Io(message)
            } else {
                ExplorerError::Data(message)
            }
        })?;
        rows.push(row);
    }

    info!("Loaded {} rows from {}", rows.len(), path.display());
    Ok(rows)
}
