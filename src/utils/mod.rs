// webpnorm/src/utils/mod.rs
use crate::core::{ConvertOptions, Result, CANONICAL_EXTENSION};
use std::path::{Component, Path, PathBuf};

/// Extensions picked up by directory conversion.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Resolve a caller-supplied source against the process working directory.
/// See [`resolve_source_in`].
pub fn resolve_source(raw: &str, asset_root: &Path) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(resolve_source_in(raw, &cwd, asset_root))
}

/// Resolution rules, first match wins:
/// 1. absolute paths are used as-is;
/// 2. `./` or `../` prefixes are relative to `cwd`;
/// 3. anything else containing a separator is relative to `asset_root`;
/// 4. bare file names are relative to `cwd`.
pub fn resolve_source_in(raw: &str, cwd: &Path, asset_root: &Path) -> PathBuf {
    let path = Path::new(raw);

    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else if is_explicitly_relative(raw) {
        normalize_lexically(&cwd.join(path))
    } else if raw.contains('/') || raw.contains('\\') {
        cwd.join(asset_root).join(path)
    } else {
        cwd.join(path)
    };

    log::debug!("Resolved source {} -> {}", raw, resolved.display());
    resolved
}

fn is_explicitly_relative(raw: &str) -> bool {
    ["./", "../", ".\\", "..\\"]
        .iter()
        .any(|prefix| raw.starts_with(prefix))
}

/// Collapse `.` and `..` components without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Sidecar mode writes `<stem>.webp` beside the source; overwrite mode
/// reuses the source path.
pub fn output_path_for(source: &Path, options: &ConvertOptions) -> PathBuf {
    if options.use_sidecar_extension {
        source.with_extension(CANONICAL_EXTENSION)
    } else {
        source.to_path_buf()
    }
}

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let base = 1024_f64;
    let bytes_f64 = bytes as f64;
    let exponent = ((bytes_f64.log10() / base.log10()).floor() as i32).min(UNITS.len() as i32 - 1);
    let size = bytes_f64 / base.powi(exponent);

    format!("{:.2} {}", size, UNITS[exponent as usize])
}

pub fn calculate_aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        0.0
    } else {
        width as f32 / height as f32
    }
}

pub fn is_supported_format(path: &Path) -> bool {
    get_file_extension(path)
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_heuristic() {
        let cwd = Path::new("/srv/app/backend");
        let assets = Path::new("../assets");

        assert_eq!(
            resolve_source_in("/tmp/a.jpg", cwd, assets),
            PathBuf::from("/tmp/a.jpg")
        );
        assert_eq!(
            resolve_source_in("imgs/13/1.jpg", cwd, assets),
            PathBuf::from("/srv/app/backend/../assets/imgs/13/1.jpg")
        );
        assert_eq!(
            resolve_source_in("diyu.jpg", cwd, assets),
            PathBuf::from("/srv/app/backend/diyu.jpg")
        );
        assert_eq!(
            resolve_source_in("./local/x.png", cwd, assets),
            PathBuf::from("/srv/app/backend/local/x.png")
        );
        assert_eq!(
            resolve_source_in("../up.gif", cwd, assets),
            PathBuf::from("/srv/app/up.gif")
        );
    }

    #[test]
    fn test_absolute_asset_root() {
        let resolved = resolve_source_in("imgs/1.jpg", Path::new("/work"), Path::new("/data/assets"));
        assert_eq!(resolved, PathBuf::from("/data/assets/imgs/1.jpg"));
    }

    #[test]
    fn test_output_paths() {
        let source = Path::new("/a/b/photo.final.JPG");

        let sidecar = ConvertOptions {
            use_sidecar_extension: true,
            ..Default::default()
        };
        assert_eq!(output_path_for(source, &sidecar), PathBuf::from("/a/b/photo.final.webp"));
        assert_eq!(output_path_for(source, &ConvertOptions::default()), source);
    }

    #[test]
    fn test_supported_formats() {
        assert!(is_supported_format(Path::new("a.JPG")));
        assert!(is_supported_format(Path::new("a.webp")));
        assert!(!is_supported_format(Path::new("a.tiff")));
        assert!(!is_supported_format(Path::new("README")));
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512.00 B");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.00 MB");
    }
}
