//! Dependency tree rendering for `permgraph dep tree` output.

use std::io::{self, Write};

use colored::Colorize;

use super::color::{colorize_id, colorize_type, dimmed, error};
use super::{OutputConfig, OutputMode};
use crate::domain::DepTreeNode;

/// Print a dependency tree with ASCII/Unicode connectors.
///
/// Renders a tree like:
/// ```text
/// ◆ perm-k3x9 users.delete (delete)
/// └── perm-a1b2 users.edit (edit)
///     └── perm-z9y8 users.view (view)
/// ```
pub fn print_dep_tree(root: &DepTreeNode, mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let config = OutputConfig::from_env();

    match mode {
        OutputMode::Text => write_dep_tree(&mut handle, root, &config),
        OutputMode::Json => super::write_json(&mut handle, root),
    }
}

/// Render the tree as text.
pub(crate) fn write_dep_tree<W: Write>(
    w: &mut W,
    root: &DepTreeNode,
    config: &OutputConfig,
) -> io::Result<()> {
    let root_icon = if config.use_ascii { "*" } else { "◆" };
    let root_icon = if config.use_colors {
        root_icon.cyan().bold().to_string()
    } else {
        root_icon.to_string()
    };

    writeln!(
        w,
        "{} {} {} ({})",
        root_icon,
        colorize_id(root.id.as_str(), config),
        root.name,
        colorize_type(root.permission_type, config)
    )?;

    write_children(w, &root.children, &[], config)
}

/// `prefix_segments` tracks which ancestor levels still have siblings below,
/// used to draw the vertical continuation lines.
fn write_children<W: Write>(
    w: &mut W,
    children: &[DepTreeNode],
    prefix_segments: &[bool],
    config: &OutputConfig,
) -> io::Result<()> {
    let (branch, corner, pipe, space) = if config.use_ascii {
        ("|-- ", "`-- ", "|   ", "    ")
    } else {
        ("├── ", "└── ", "│   ", "    ")
    };

    for (i, child) in children.iter().enumerate() {
        let is_last = i == children.len() - 1;

        let mut prefix = String::new();
        for &has_more in prefix_segments {
            prefix.push_str(&dimmed(if has_more { pipe } else { space }, config));
        }
        let connector = dimmed(if is_last { corner } else { branch }, config);

        let cycle_marker = if child.cycle {
            format!(" {}", error("(cycle)", config))
        } else {
            String::new()
        };

        writeln!(
            w,
            "{}{}{} {} ({}){}",
            prefix,
            connector,
            colorize_id(child.id.as_str(), config),
            child.name,
            colorize_type(child.permission_type, config),
            cycle_marker
        )?;

        if !child.children.is_empty() {
            let mut next_segments = prefix_segments.to_vec();
            next_segments.push(!is_last);
            write_children(w, &child.children, &next_segments, config)?;
        }
    }

    Ok(())
}
