use crate::utils::error::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::path::Path;

/// 讀取本機圖片並轉成 `data:<mime>;base64,...`；已是 data URI 的字串原樣回傳
pub fn load_data_uri<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let raw = path.to_string_lossy();
    if raw.starts_with("data:image/") {
        return Ok(raw.into_owned());
    }

    let bytes = std::fs::read(path)?;
    let mime = mime_for_path(path).unwrap_or("image/png");
    tracing::debug!("Loaded image {} ({} bytes, {})", path.display(), bytes.len(), mime);
    Ok(format!("data:{mime};base64,{}", BASE64.encode(bytes)))
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}
