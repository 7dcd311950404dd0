use crate::config::Config;
use log::info;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Sanitizes input to prevent directory traversal attacks and ensure paths are relative.
///
/// The path is rebuilt component by component: `..` climbs at most back to the directory the
/// result is joined to, and roots, drive prefixes and `.` are dropped.
pub fn sanitize_input(input: &str) -> PathBuf {
    let mut sanitized = PathBuf::new();
    for component in Path::new(&input.replace('\\', "/")).components() {
        match component {
            Component::Normal(part) => sanitized.push(part),
            Component::ParentDir => {
                sanitized.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    sanitized
}

/// Last path component, as shown to the client in transfer announcements.
pub fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

fn scale(value: f64, units: &[&str]) -> String {
    let mut value = value;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < units.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2}{}", value, units[unit])
}

/// Average speed of `bytes` moved in `duration`. A zero duration counts as one millisecond.
pub fn auto_unit_speed(bytes: u64, duration: Duration) -> String {
    let seconds = duration.max(Duration::from_millis(1)).as_secs_f64();
    scale(bytes as f64 / seconds, &["B/s", "KB/s", "MB/s", "GB/s"])
}

pub fn auto_unit_size(bytes: u64) -> String {
    scale(bytes as f64, &["B", "KB", "MB", "GB", "TB"])
}

// Helper function to log configuration options
pub fn log_config(config: &Config) {
    info!(
        "  Listen Address: {}:{}",
        config.server.listen_address, config.server.listen_port
    );
    info!("  PASV Address: {}", config.server.pasv_address);
    info!("  Site Root: {}", config.server.site_root);
    match config.server.idle_timeout_secs {
        Some(secs) => info!("  Idle Timeout: {}s", secs),
        None => info!("  Idle Timeout: none"),
    }
    info!(
        "  Download Buffer Size: {}",
        auto_unit_size(config.server.chunk_size() as u64)
    );
    info!("  TLS: {}", if config.tls.enabled { "enabled" } else { "disabled" });
    info!("  Users: {}", config.users.len());
}
