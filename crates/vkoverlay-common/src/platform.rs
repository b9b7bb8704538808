use std::path::PathBuf;

/// File name of the layer configuration.
pub const CONFIG_FILE_NAME: &str = "vkoverlay.toml";

/// Returns the per-user configuration directory for vkoverlay.
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(unix)]
    {
        if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
            if !dir.is_empty() {
                return Some(PathBuf::from(dir).join("vkoverlay"));
            }
        }
        std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join(".config").join("vkoverlay"))
    }
    #[cfg(windows)]
    {
        std::env::var("APPDATA")
            .ok()
            .map(|appdata| PathBuf::from(appdata).join("vkoverlay"))
    }
    #[cfg(not(any(unix, windows)))]
    {
        None
    }
}

/// Returns the file name the layer shared library is built as.
pub fn layer_library_name() -> &'static str {
    #[cfg(target_os = "windows")]
    { "vkoverlay_layer.dll" }
    #[cfg(target_os = "macos")]
    { "libvkoverlay_layer.dylib" }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    { "libvkoverlay_layer.so" }
}
