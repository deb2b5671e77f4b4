use std::fs;
use std::io::{self, Read};
use std::path::Path;

use crate::manager::{NewOperationOptions, OperationUpdate};

use super::commands::OpCommands;
use super::{Context, confirm_action};

fn read_document(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut content = String::new();
        io::stdin().read_to_string(&mut content)?;
        Ok(content)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

pub fn run_op(ctx: &Context, command: OpCommands) -> anyhow::Result<()> {
    let user = ctx.acting_user()?;
    let manager = &ctx.manager;

    match command {
        OpCommands::Create {
            path,
            description,
            category,
            content_file,
        } => {
            let mut options = NewOperationOptions::default().category(category);
            if let Some(file) = content_file {
                options = options.content(read_document(&file)?);
            }
            let op = manager.create_operation(&path, &description, &user, options)?;
            ctx.emit(&op, |op| {
                println!("Created operation \"{}\" with id {}", op.path, op.id);
            })?;
        }

        OpCommands::List { skip_archived } => {
            let listings = manager.list_operations(&user, skip_archived)?;
            ctx.emit(&listings, |listings| {
                if listings.is_empty() {
                    println!("No operations.");
                }
                for op in listings {
                    let state = if op.active { "" } else { " (archived)" };
                    println!(
                        "{:>5}  {:<24} {:<12} {}{state}",
                        op.op_id, op.path, op.access_level, op.category
                    );
                }
            })?;
        }

        OpCommands::Show { op_id } => {
            let details = manager.get_operation_details(op_id, &user)?;
            ctx.emit(&details, |op| {
                println!("id:          {}", op.id);
                println!("path:        {}", op.path);
                println!("description: {}", op.description);
                println!("category:    {}", op.category);
                println!("active:      {}", op.active);
            })?;
        }

        OpCommands::Rename { op_id, new_path } => {
            manager.update_operation(op_id, OperationUpdate::Path(new_path.clone()), &user)?;
            println!("Renamed operation {op_id} to \"{new_path}\"");
        }

        OpCommands::Update {
            op_id,
            description,
            category,
            active,
        } => {
            let updates: Vec<OperationUpdate> = [
                description.map(OperationUpdate::Description),
                category.map(OperationUpdate::Category),
                active.map(OperationUpdate::Active),
            ]
            .into_iter()
            .flatten()
            .collect();
            if updates.is_empty() {
                anyhow::bail!("Nothing to update. Pass --description, --category or --active.");
            }
            for update in updates {
                manager.update_operation(op_id, update, &user)?;
            }
            println!("Updated operation {op_id}");
        }

        OpCommands::Delete {
            op_id,
            non_interactive,
            yes,
        } => {
            let details = manager.get_operation_details(op_id, &user)?;
            let confirmed = confirm_action(
                &format!(
                    "Delete operation '{}'? Its history and memberships are removed.",
                    details.path
                ),
                yes,
                non_interactive,
            )?;
            if !confirmed {
                println!("Cancelled.");
                return Ok(());
            }
            manager.delete_operation(op_id, &user)?;
            println!("Deleted operation '{}'", details.path);
        }

        OpCommands::Save {
            op_id,
            file,
            comment,
        } => {
            let content = read_document(&file)?;
            if manager.save_file(op_id, &content, &user, comment.as_deref())? {
                println!("Saved operation {op_id}");
            } else {
                println!("No changes to save.");
            }
        }

        OpCommands::Cat { op_id, change } => {
            let content = match change {
                Some(change_id) => {
                    let change = manager.store().get_change(change_id)?;
                    if change.is_some_and(|change| change.op_id != op_id) {
                        anyhow::bail!("Change {change_id} does not belong to operation {op_id}");
                    }
                    manager.get_change_content(change_id, &user)?
                }
                None => manager.get_file(op_id, &user)?,
            };
            print!("{content}");
        }

        OpCommands::History { op_id, named } => {
            let changes = manager.get_all_changes(op_id, &user, named)?;
            ctx.emit(&changes, |changes| {
                if changes.is_empty() {
                    println!("No changes.");
                }
                for change in changes {
                    let short = change.commit_hash.get(..8).unwrap_or(&change.commit_hash);
                    let label = change
                        .version_name
                        .as_deref()
                        .map(|name| format!(" [{name}]"))
                        .unwrap_or_default();
                    println!(
                        "{:>5}  {short}  {}  {}{label}  {}",
                        change.id,
                        change.created_at.format("%Y-%m-%d %H:%M:%S"),
                        change.username,
                        change.comment.as_deref().unwrap_or("")
                    );
                }
            })?;
        }

        OpCommands::Diff { change_id } => {
            print!("{}", manager.get_change_diff(change_id, &user)?);
        }

        OpCommands::Undo { change_id } => {
            let change = manager.undo_changes(change_id, &user)?;
            ctx.emit(&change, |change| {
                println!("Restored change {change_id} as change {}", change.id);
            })?;
        }

        OpCommands::NameVersion {
            op_id,
            change_id,
            name,
        } => {
            manager.set_version_name(change_id, op_id, &user, name.as_deref())?;
            match name {
                Some(name) => println!("Named change {change_id} \"{name}\""),
                None => println!("Cleared name of change {change_id}"),
            }
        }
    }

    Ok(())
}
