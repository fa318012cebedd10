use std::path::Path;

use crate::{Error, Result};

/// ディレクトリの名前部分を取得 (`./docs/` -> `docs`)
///
/// `.` のように名前を持たないパスは正規化してから名前を取る。
pub fn dir_base_name(path: &Path) -> Result<String> {
    if let Some(name) = path.file_name() {
        return Ok(name.to_string_lossy().into_owned());
    }

    let canonical = path.canonicalize()?;
    canonical
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidPath(path.display().to_string()))
}

/// アーカイブのサイズ表示 (`1536` -> `1.50 KB`)
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    let mut unit = None;
    for next in UNITS {
        if size < 1024.0 {
            break;
        }
        size /= 1024.0;
        unit = Some(*next);
    }

    match unit {
        Some(unit) => format!("{:.2} {}", size, unit),
        None => format!("{} B", bytes),
    }
}
