//! Command execution logic.
//!
//! This module contains the implementation of all CLI commands.

use anyhow::Result;

use super::args::{DepAction, DepArgs, InfoArgs, InitArgs, PermAction, PermArgs};
use super::types::ScopeArg;
use crate::app::App;
use crate::domain::{RequestContext, ResolveScope, TraversalDirection};
use crate::output::OutputMode;

/// Execute the init command
pub async fn execute_init(args: &InitArgs) -> Result<()> {
    use crate::commands::init;

    let current_dir = std::env::current_dir()?;

    if !args.quiet {
        println!(
            "Initializing permgraph repository{}...",
            args.prefix
                .as_ref()
                .map(|p| format!(" with prefix '{p}'"))
                .unwrap_or_default()
        );
    }

    let result = init::init(&current_dir, args.prefix.as_deref()).await?;

    if !args.quiet {
        println!("Initialized permgraph in {}", result.permgraph_dir.display());
        println!("  Config: {}", result.config_file.display());
        println!("  Graph:  {}", result.data_file.display());
        println!("  Permission prefix: {}", result.prefix);
    }

    Ok(())
}

/// Execute the info command
pub async fn execute_info(app: &App, _args: &InfoArgs, output_mode: OutputMode) -> Result<()> {
    use crate::domain::PermissionFilter;
    use crate::output;

    let config = app.config();
    let store = app.store();
    let snapshot = store.snapshot().await?;
    let system = store
        .list_permissions(&PermissionFilter {
            is_system: Some(true),
            ..Default::default()
        })
        .await?
        .len();

    match output_mode {
        OutputMode::Json => {
            output::print_json(&serde_json::json!({
                "permgraph_dir": app.permgraph_dir().display().to_string(),
                "permission_prefix": config.permission_prefix,
                "storage": {
                    "backend": config.storage.backend,
                    "data_file": config.storage.data_file,
                },
                "engine": config.engine,
                "permissions": {
                    "total": snapshot.permissions.len(),
                    "system": system,
                },
                "dependencies": snapshot.edges.len(),
                "revision": snapshot.revision,
            }))?;
        }
        OutputMode::Text => {
            println!("Permgraph Repository Information");
            println!("================================");
            println!();
            println!("Directory:         {}", app.permgraph_dir().display());
            println!("Permission prefix: {}", config.permission_prefix);
            println!(
                "Storage:           {} ({})",
                config.storage.backend, config.storage.data_file
            );
            println!(
                "Limits:            depth {}, visits {}",
                config.engine.max_depth, config.engine.max_visits
            );
            println!();
            println!(
                "Permissions: {} total ({} system)",
                snapshot.permissions.len(),
                system
            );
            println!("Dependencies: {}", snapshot.edges.len());
            println!("Revision: {}", snapshot.revision);
        }
    }

    Ok(())
}

/// Execute the perm command
pub async fn execute_perm(
    app: &App,
    ctx: &RequestContext,
    args: &PermArgs,
    output_mode: OutputMode,
) -> Result<()> {
    use crate::domain::{NewPermission, PermissionFilter, PermissionUpdate};
    use crate::output;

    match &args.action {
        PermAction::Create {
            name,
            display_name,
            description,
            module,
            permission_type,
            system,
        } => {
            let mut new_permission = NewPermission::from_name(name.as_str());
            if let Some(display_name) = display_name {
                new_permission.display_name = display_name.clone();
            }
            if let Some(description) = description {
                new_permission.description = description.clone();
            }
            if let Some(module) = module {
                new_permission.module = module.trim().to_string();
            }
            if let Some(permission_type) = permission_type {
                new_permission.permission_type = (*permission_type).into();
            }
            new_permission.is_system = *system;

            let permission = app.service().create_permission(ctx, new_permission).await?;
            app.save().await?;

            match output_mode {
                OutputMode::Json => output::print_json(&permission)?,
                OutputMode::Text => {
                    println!("Created permission: {} ({})", permission.id, permission.name);
                }
            }
        }
        PermAction::List {
            module,
            permission_type,
            system,
            search,
            limit,
        } => {
            let filter = PermissionFilter {
                module: module.clone(),
                permission_type: permission_type.map(Into::into),
                is_system: system.then_some(true),
                search: search.clone(),
                limit: *limit,
            };
            let permissions = app.store().list_permissions(&filter).await?;
            output::print_permissions(&permissions, output_mode)?;
        }
        PermAction::Show { permission } => {
            let permission = app.resolve(permission).await?;
            output::print_permission(&permission, output_mode)?;
        }
        PermAction::Update {
            permission,
            name,
            display_name,
            description,
            module,
            permission_type,
        } => {
            let update = PermissionUpdate {
                name: name.clone(),
                display_name: display_name.clone(),
                description: description.clone(),
                module: module.as_ref().map(|m| m.trim().to_string()),
                permission_type: permission_type.map(Into::into),
            };
            if update.name.is_none()
                && update.display_name.is_none()
                && update.description.is_none()
                && update.module.is_none()
                && update.permission_type.is_none()
            {
                anyhow::bail!("Nothing to update. Pass at least one field to change.");
            }

            let existing = app.resolve(permission).await?;
            let updated = app
                .service()
                .update_permission(ctx, &existing.id, update)
                .await?;
            app.save().await?;

            match output_mode {
                OutputMode::Json => output::print_json(&updated)?,
                OutputMode::Text => println!("Updated permission: {}", updated.id),
            }
        }
        PermAction::Delete { permission, force } => {
            let existing = app.resolve(permission).await?;

            if !force {
                eprint!(
                    "Delete permission '{}' ({})? [y/N]: ",
                    existing.id, existing.name
                );
                let mut input = String::new();
                std::io::stdin().read_line(&mut input)?;
                let response = input.trim().to_lowercase();
                if response != "y" && response != "yes" {
                    println!("Deletion cancelled.");
                    return Ok(());
                }
            }

            let removed = app.service().delete_permission(ctx, &existing.id).await?;
            app.save().await?;

            match output_mode {
                OutputMode::Json => {
                    output::print_json(&serde_json::json!({
                        "deleted": existing.id,
                        "removed_dependencies": removed,
                        "status": "success"
                    }))?;
                }
                OutputMode::Text => {
                    println!(
                        "Deleted permission: {} ({} dependencies removed)",
                        existing.id,
                        removed.len()
                    );
                }
            }
        }
    }

    Ok(())
}

/// Execute the dep command
pub async fn execute_dep(
    app: &App,
    ctx: &RequestContext,
    args: &DepArgs,
    output_mode: OutputMode,
) -> Result<()> {
    use crate::output;

    let service = app.service();
    let max_depth = app.config().engine.max_depth;

    match &args.action {
        DepAction::Add {
            dependent,
            dependencies,
        } => {
            let dependent = app.resolve(dependent).await?;
            let mut dependency_ids = Vec::with_capacity(dependencies.len());
            for reference in dependencies {
                dependency_ids.push(app.resolve(reference).await?.id);
            }

            if let [dependency] = dependency_ids.as_slice() {
                let edge = service.add_dependency(ctx, &dependent.id, dependency).await?;
                app.save().await?;
                output::print_edge_change("add", &edge, output_mode)?;
            } else {
                let outcome = service
                    .add_dependencies(ctx, &dependent.id, &dependency_ids)
                    .await?;
                if !outcome.added.is_empty() {
                    app.save().await?;
                }
                output::print_batch_outcome(&outcome, output_mode)?;
            }
        }
        DepAction::Remove {
            dependent,
            dependency,
        } => {
            let dependent = app.resolve(dependent).await?;
            let dependency = app.resolve(dependency).await?;

            let edge = service
                .remove_dependency(ctx, &dependent.id, &dependency.id)
                .await?;
            app.save().await?;
            output::print_edge_change("remove", &edge, output_mode)?;
        }
        DepAction::List {
            permission,
            direction,
            depth,
        } => {
            let start = app.resolve(permission).await?;
            let found = service
                .get_dependencies(&start.id, depth.unwrap_or(max_depth), (*direction).into())
                .await?;
            output::print_discovered(&start, &found, output_mode)?;
        }
        DepAction::Tree {
            permission,
            depth,
            reverse,
        } => {
            let root = app.resolve(permission).await?;
            let direction = if *reverse {
                TraversalDirection::Dependents
            } else {
                TraversalDirection::Dependencies
            };
            let tree = service
                .dependency_tree(&root.id, depth.unwrap_or(max_depth), direction)
                .await?;
            output::tree::print_dep_tree(&tree, output_mode)?;
        }
        DepAction::Path { from, to } => {
            let from = app.resolve(from).await?;
            let to = app.resolve(to).await?;
            let path = service.explain_path(&from.id, &to.id).await?;
            output::print_path(&from, &to, path.as_deref(), output_mode)?;
        }
        DepAction::Check { all } => {
            let report = service.detect_cycle().await?;
            let cycles = if *all {
                Some(service.detect_all_cycles().await?)
            } else {
                None
            };
            output::print_cycle_report(&report, cycles.as_deref(), output_mode)?;
        }
        DepAction::CanAdd {
            dependent,
            dependency,
        } => {
            let dependent = app.resolve(dependent).await?;
            let dependency = app.resolve(dependency).await?;
            let check = service
                .can_add_dependency(&dependent.id, &dependency.id)
                .await?;
            output::print_check(&dependent, &dependency, &check, output_mode)?;
        }
        DepAction::Auto {
            permission,
            scope,
            permission_type,
        } => {
            let anchor = app.resolve(permission).await?;
            let scope = match (scope, permission_type) {
                (ScopeArg::Permission, _) => ResolveScope::Permission,
                (ScopeArg::Module, _) => ResolveScope::Module,
                (ScopeArg::Type, Some(permission_type)) => {
                    ResolveScope::Type((*permission_type).into())
                }
                (ScopeArg::Type, None) => anyhow::bail!("--scope type requires --type"),
            };

            let outcome = service
                .auto_resolve_dependencies(ctx, &anchor.id, &scope)
                .await?;
            if !outcome.inserted.is_empty() {
                app.save().await?;
            }
            output::print_auto_outcome(&outcome, output_mode)?;
        }
    }

    Ok(())
}
