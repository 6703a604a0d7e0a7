//! Output formatting for CLI commands.
//!
//! Every printer has a text form for people and a JSON form (`--json`) that
//! serializes the library's result types unchanged.
//!
//! Submodules:
//! - [`color`]: Color and styling helpers
//! - [`tree`]: Dependency tree rendering with ASCII/Unicode connectors

pub mod color;
pub mod tree;

use crate::domain::{
    AutoResolveOutcome, BatchOutcome, CycleReport, DependencyCheck, DependencyEdge,
    DiscoveredPermission, PathStep, Permission, PermissionId, Relation, SkippedProposal,
};
use serde::Serialize;
use std::env;
use std::io::{self, Write};

pub use color::{error, info, success, warning};
pub use tree::print_dep_tree;

use color::{arrow, bold, colorize_id, colorize_type, dimmed, system_badge, verdict_icon};

/// Configuration for output formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Whether to use ASCII-only icons and connectors instead of Unicode.
    pub use_ascii: bool,
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Create a new OutputConfig with explicit values.
    pub fn new(use_ascii: bool, use_colors: bool) -> Self {
        Self {
            use_ascii,
            use_colors,
        }
    }

    /// Create an OutputConfig by reading from environment variables.
    ///
    /// Reads:
    /// - `PERMGRAPH_ASCII`: "1" or "true" for ASCII-only output (default: false)
    /// - `NO_COLOR`: any value disables colors
    pub fn from_env() -> Self {
        let use_ascii = match env::var("PERMGRAPH_ASCII") {
            Ok(v) if v == "1" || v.eq_ignore_ascii_case("true") => true,
            Ok(v) if v == "0" || v.eq_ignore_ascii_case("false") || v.is_empty() => false,
            Ok(v) => {
                tracing::warn!(
                    env_var = "PERMGRAPH_ASCII",
                    value = %v,
                    "Invalid value (expected '1', 'true', '0', or 'false'), using default"
                );
                false
            }
            Err(_) => false,
        };

        // https://no-color.org/
        let use_colors = env::var("NO_COLOR").is_err();

        Self {
            use_ascii,
            use_colors,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            use_ascii: false,
            use_colors: true,
        }
    }
}

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

/// Print any serializable value as pretty JSON to stdout.
///
/// # Errors
///
/// Returns an IO error if serialization or the write fails.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_json(&mut handle, value)
}

pub(crate) fn write_json<W: Write, T: Serialize + ?Sized>(w: &mut W, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    writeln!(w, "{json}")
}

/// Run a text writer against locked stdout, or print `value` as JSON.
fn emit<T, F>(value: &T, mode: OutputMode, text: F) -> io::Result<()>
where
    T: Serialize + ?Sized,
    F: FnOnce(&mut io::StdoutLock<'_>, &OutputConfig) -> io::Result<()>,
{
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match mode {
        OutputMode::Text => text(&mut handle, &OutputConfig::from_env()),
        OutputMode::Json => write_json(&mut handle, value),
    }
}

// ============================================================================
// Public Dispatch Functions
// ============================================================================

/// Print one permission in detail.
pub fn print_permission(permission: &Permission, mode: OutputMode) -> io::Result<()> {
    emit(permission, mode, |w, config| {
        write_permission_details(w, permission, config)
    })
}

/// Print a permission list, one per line.
pub fn print_permissions(permissions: &[Permission], mode: OutputMode) -> io::Result<()> {
    emit(permissions, mode, |w, config| {
        write_permission_list(w, permissions, config)
    })
}

/// Print the result of a bounded traversal.
pub fn print_discovered(
    start: &Permission,
    found: &[DiscoveredPermission],
    mode: OutputMode,
) -> io::Result<()> {
    emit(found, mode, |w, config| {
        write_discovered(w, start, found, config)
    })
}

/// Print an insertion check.
pub fn print_check(
    dependent: &Permission,
    dependency: &Permission,
    check: &DependencyCheck,
    mode: OutputMode,
) -> io::Result<()> {
    emit(check, mode, |w, config| {
        write_check(w, dependent, dependency, check, config)
    })
}

/// Print a whole-graph cycle report, plus every distinct cycle when given.
pub fn print_cycle_report(
    report: &CycleReport,
    all_cycles: Option<&[Vec<PermissionId>]>,
    mode: OutputMode,
) -> io::Result<()> {
    match mode {
        OutputMode::Json => match all_cycles {
            Some(cycles) => print_json(&serde_json::json!({
                "has_cycle": report.has_cycle,
                "cycle_path": report.cycle_path,
                "closing_edge": report.closing_edge,
                "cycles": cycles,
            })),
            None => print_json(report),
        },
        OutputMode::Text => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_cycle_report(&mut handle, report, all_cycles, &OutputConfig::from_env())
        }
    }
}

/// Print an explained path, or a "no path" line.
pub fn print_path(
    from: &Permission,
    to: &Permission,
    path: Option<&[PathStep]>,
    mode: OutputMode,
) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(&serde_json::json!({
            "from": from.id,
            "to": to.id,
            "path": path,
        })),
        OutputMode::Text => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_path(&mut handle, from, to, path, &OutputConfig::from_env())
        }
    }
}

/// Print a single added or removed edge.
pub fn print_edge_change(action: &str, edge: &DependencyEdge, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(&serde_json::json!({
            "action": action,
            "edge": edge,
            "status": "success",
        })),
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            println!(
                "{} dependency: {} {} {}",
                action_label(action),
                colorize_id(edge.dependent.as_str(), &config),
                arrow(&config),
                colorize_id(edge.dependency.as_str(), &config)
            );
            Ok(())
        }
    }
}

/// Print the outcome of a batch add.
pub fn print_batch_outcome(outcome: &BatchOutcome, mode: OutputMode) -> io::Result<()> {
    emit(outcome, mode, |w, config| {
        write_edge_summary(w, "Added", &outcome.added, "Rejected", &outcome.rejected, config)
    })
}

/// Print the outcome of auto-resolution.
pub fn print_auto_outcome(outcome: &AutoResolveOutcome, mode: OutputMode) -> io::Result<()> {
    emit(outcome, mode, |w, config| {
        write_edge_summary(
            w,
            "Inserted",
            &outcome.inserted,
            "Skipped",
            &outcome.skipped,
            config,
        )
    })
}

fn action_label(action: &str) -> &str {
    match action {
        "add" => "Added",
        "remove" => "Removed",
        other => other,
    }
}

// ============================================================================
// Text Writers
// ============================================================================

fn permission_line(permission: &Permission, config: &OutputConfig) -> String {
    format!(
        "{} {} ({}){}",
        colorize_id(permission.id.as_str(), config),
        permission.name,
        colorize_type(permission.permission_type, config),
        system_badge(permission.is_system, config)
    )
}

fn write_permission_details<W: Write>(
    w: &mut W,
    permission: &Permission,
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(w, "{}", permission_line(permission, config))?;
    let field = |label: &str| dimmed(&format!("{label:<13}"), config);
    writeln!(w, "  {}{}", field("Display name:"), permission.display_name)?;
    writeln!(w, "  {}{}", field("Module:"), permission.module)?;
    writeln!(w, "  {}{}", field("Resource:"), permission.resource_key())?;
    writeln!(
        w,
        "  {}{}",
        field("Created:"),
        permission.created_at.format("%Y-%m-%d %H:%M UTC")
    )?;
    writeln!(
        w,
        "  {}{}",
        field("Updated:"),
        permission.updated_at.format("%Y-%m-%d %H:%M UTC")
    )?;
    if !permission.description.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}:", bold("Description", config))?;
        for line in permission.description.lines() {
            writeln!(w, "  {line}")?;
        }
    }
    Ok(())
}

fn write_permission_list<W: Write>(
    w: &mut W,
    permissions: &[Permission],
    config: &OutputConfig,
) -> io::Result<()> {
    if permissions.is_empty() {
        return writeln!(w, "No permissions found.");
    }
    for permission in permissions {
        writeln!(w, "{}", permission_line(permission, config))?;
    }
    writeln!(w)?;
    writeln!(w, "{} permission(s)", permissions.len())
}

fn write_discovered<W: Write>(
    w: &mut W,
    start: &Permission,
    found: &[DiscoveredPermission],
    config: &OutputConfig,
) -> io::Result<()> {
    if found.is_empty() {
        return writeln!(
            w,
            "{} has no related permissions in that direction",
            colorize_id(start.id.as_str(), config)
        );
    }

    writeln!(
        w,
        "{} ({} found):",
        bold(&format!("Related to {}", start.name), config),
        found.len()
    )?;
    for discovered in found {
        let marker = match (discovered.relation, config.use_ascii) {
            (Relation::Dependency, true) => "v",
            (Relation::Dependency, false) => "↓",
            (Relation::Dependent, true) => "^",
            (Relation::Dependent, false) => "↑",
        };
        writeln!(
            w,
            "  {} {} {}",
            dimmed(&format!("[{}]", discovered.depth), config),
            marker,
            permission_line(&discovered.permission, config)
        )?;
    }
    Ok(())
}

fn write_check<W: Write>(
    w: &mut W,
    dependent: &Permission,
    dependency: &Permission,
    check: &DependencyCheck,
    config: &OutputConfig,
) -> io::Result<()> {
    let edge = format!("{} {} {}", dependent.name, arrow(config), dependency.name);
    match &check.reason {
        None => writeln!(
            w,
            "{} {} {}",
            verdict_icon(true, config),
            edge,
            success("can be added", config)
        ),
        Some(reason) => {
            writeln!(
                w,
                "{} {} {}",
                verdict_icon(false, config),
                edge,
                error("would be rejected", config)
            )?;
            writeln!(w, "  {reason}")
        }
    }
}

fn write_cycle_report<W: Write>(
    w: &mut W,
    report: &CycleReport,
    all_cycles: Option<&[Vec<PermissionId>]>,
    config: &OutputConfig,
) -> io::Result<()> {
    if !report.has_cycle {
        return writeln!(
            w,
            "{} {}",
            verdict_icon(true, config),
            success("No dependency cycles found", config)
        );
    }

    writeln!(
        w,
        "{} {}",
        verdict_icon(false, config),
        error("Dependency cycle detected", config)
    )?;
    writeln!(w, "  {}", join_ids(&report.cycle_path, config))?;
    if let Some((from, to)) = &report.closing_edge {
        writeln!(
            w,
            "  {} {} {} {}",
            dimmed("closed by", config),
            colorize_id(from.as_str(), config),
            arrow(config),
            colorize_id(to.as_str(), config)
        )?;
    }

    if let Some(cycles) = all_cycles {
        writeln!(w)?;
        writeln!(w, "{} ({}):", bold("All cycles", config), cycles.len())?;
        for cycle in cycles {
            writeln!(w, "  {}", join_ids(cycle, config))?;
        }
    }
    Ok(())
}

fn write_path<W: Write>(
    w: &mut W,
    from: &Permission,
    to: &Permission,
    path: Option<&[PathStep]>,
    config: &OutputConfig,
) -> io::Result<()> {
    let Some(steps) = path else {
        return writeln!(w, "{} does not depend on {}", from.name, to.name);
    };

    writeln!(
        w,
        "{} requires {} ({} hop(s)):",
        from.name,
        to.name,
        steps.len().saturating_sub(1)
    )?;
    for step in steps {
        writeln!(
            w,
            "  {}. {}",
            step.index,
            permission_line(&step.permission, config)
        )?;
    }
    Ok(())
}

fn write_edge_summary<W: Write>(
    w: &mut W,
    applied_label: &str,
    applied: &[DependencyEdge],
    skipped_label: &str,
    skipped: &[SkippedProposal],
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(w, "{} {} edge(s)", bold(applied_label, config), applied.len())?;
    for edge in applied {
        writeln!(
            w,
            "  {} {} {} {}",
            verdict_icon(true, config),
            colorize_id(edge.dependent.as_str(), config),
            arrow(config),
            colorize_id(edge.dependency.as_str(), config)
        )?;
    }

    if !skipped.is_empty() {
        writeln!(w, "{} {} proposal(s)", bold(skipped_label, config), skipped.len())?;
        for proposal in skipped {
            writeln!(
                w,
                "  {} {} {} {}: {}",
                verdict_icon(false, config),
                colorize_id(proposal.dependent.as_str(), config),
                arrow(config),
                colorize_id(proposal.dependency.as_str(), config),
                warning(&proposal.reason.to_string(), config)
            )?;
        }
    }
    Ok(())
}

fn join_ids(ids: &[PermissionId], config: &OutputConfig) -> String {
    let separator = format!(" {} ", arrow(config));
    ids.iter()
        .map(|id| colorize_id(id.as_str(), config))
        .collect::<Vec<_>>()
        .join(&separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::named_permission;
    use crate::error::ValidationError;

    fn plain() -> OutputConfig {
        OutputConfig::new(true, false)
    }

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_rejected_check_shows_reason() {
        let edit = named_permission("p2", "users.edit");
        let view = named_permission("p1", "users.view");
        let check = DependencyCheck::rejected(ValidationError::CycleWouldBeIntroduced {
            cycle_path: vec!["p1".into(), "p2".into(), "p1".into()],
        });

        let text = render(|w| write_check(w, &view, &edit, &check, &plain()));
        assert_eq!(
            text,
            "x users.view -> users.edit would be rejected\n  \
             Adding this dependency would create a cycle: p1 -> p2 -> p1\n"
        );
    }

    #[test]
    fn test_cycle_report_text() {
        let report = CycleReport {
            has_cycle: true,
            cycle_path: vec!["a".into(), "b".into(), "a".into()],
            closing_edge: Some(("b".into(), "a".into())),
        };
        let text = render(|w| write_cycle_report(w, &report, None, &plain()));
        assert!(text.starts_with("x Dependency cycle detected\n"));
        assert!(text.contains("  a -> b -> a\n"));
        assert!(text.contains("closed by b -> a"));
    }

    #[test]
    fn test_missing_path_is_not_an_error() {
        let a = named_permission("a", "users.view");
        let b = named_permission("b", "roles.view");
        let text = render(|w| write_path(w, &a, &b, None, &plain()));
        assert_eq!(text, "users.view does not depend on roles.view\n");
    }

    #[test]
    fn test_discovered_markers() {
        let start = named_permission("b", "users.edit");
        let found = vec![
            DiscoveredPermission {
                permission: named_permission("c", "users.view"),
                depth: 1,
                relation: Relation::Dependency,
                via: "b".into(),
            },
            DiscoveredPermission {
                permission: named_permission("a", "users.delete"),
                depth: 1,
                relation: Relation::Dependent,
                via: "b".into(),
            },
        ];
        let text = render(|w| write_discovered(w, &start, &found, &plain()));
        assert!(text.contains("[1] v c users.view (view)"));
        assert!(text.contains("[1] ^ a users.delete (delete)"));
    }

    #[test]
    fn test_action_label() {
        assert_eq!(action_label("add"), "Added");
        assert_eq!(action_label("remove"), "Removed");
    }
}
