//! Color and styling helpers for CLI output.
//!
//! Semantic Color Theme:
//!   - Success:        green   (allowed checks, added edges, acyclic graphs)
//!   - Warning:        yellow  (skipped proposals, system permissions)
//!   - Error:          red     (refusals, cycles)
//!   - Info/Reference: cyan    (permission IDs, root tree node)
//!   - Accent:         magenta (permission types)
//!   - Muted:          dimmed  (field labels, connectors, display names)
//!   - Emphasis:       bold    (section headers)

use crate::domain::PermissionType;
use colored::Colorize;

use super::OutputConfig;

/// Apply semantic "success" color (green) to text.
pub fn success(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.green().to_string()
}

/// Apply semantic "error" color (red) to text.
pub fn error(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.red().to_string()
}

/// Apply semantic "warning" color (yellow) to text.
pub fn warning(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.yellow().to_string()
}

/// Apply semantic "info" color (cyan) to text.
pub fn info(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.cyan().to_string()
}

/// Colorize a permission ID (cyan).
pub(crate) fn colorize_id(id: &str, config: &OutputConfig) -> String {
    info(id, config)
}

/// Colorize a permission type (magenta, `manage` bold).
pub(crate) fn colorize_type(permission_type: PermissionType, config: &OutputConfig) -> String {
    let text = permission_type.to_string();
    if !config.use_colors {
        return text;
    }
    match permission_type {
        PermissionType::Manage => text.magenta().bold().to_string(),
        _ => text.magenta().to_string(),
    }
}

/// Badge shown next to system permissions.
pub(crate) fn system_badge(is_system: bool, config: &OutputConfig) -> String {
    if !is_system {
        return String::new();
    }
    format!(" {}", warning("[system]", config))
}

/// Apply dimmed style to text (for labels/field names).
pub(crate) fn dimmed(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.dimmed().to_string()
}

/// Apply bold style to text (for section headers).
pub(crate) fn bold(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.bold().to_string()
}

/// Arrow between two permissions in a path or edge.
pub(crate) fn arrow(config: &OutputConfig) -> &'static str {
    if config.use_ascii { "->" } else { "→" }
}

/// Check or cross mark for allowed/refused results.
pub(crate) fn verdict_icon(allowed: bool, config: &OutputConfig) -> String {
    let icon = match (allowed, config.use_ascii) {
        (true, true) => "+",
        (true, false) => "✓",
        (false, true) => "x",
        (false, false) => "✗",
    };
    if allowed {
        success(icon, config)
    } else {
        error(icon, config)
    }
}
