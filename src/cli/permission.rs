use crate::permission::ImportOutcome;

use super::Context;
use super::commands::PermCommands;

pub fn run_perm(ctx: &Context, command: PermCommands) -> anyhow::Result<()> {
    let user = ctx.acting_user()?;
    let manager = &ctx.manager;

    match command {
        PermCommands::Add {
            op_id,
            level,
            users,
        } => {
            let ids = ctx.user_ids(&users)?;
            manager.add_bulk_permission(op_id, &user, &ids, level)?;
            println!("Granted {level} on operation {op_id} to {}", users.join(", "));
        }

        PermCommands::Modify {
            op_id,
            level,
            users,
        } => {
            let ids = ctx.user_ids(&users)?;
            manager.modify_bulk_permission(op_id, &user, &ids, level)?;
            println!("Changed access on operation {op_id} to {level} for {}", users.join(", "));
        }

        PermCommands::Remove { op_id, users } => {
            let ids = ctx.user_ids(&users)?;
            manager.delete_bulk_permission(op_id, &user, &ids)?;
            println!("Revoked access to operation {op_id} for {}", users.join(", "));
        }

        PermCommands::Import { source, target } => {
            let outcome = manager.import_permissions(source, target, &user)?;
            if ctx.json {
                let (applied, delta, message) = outcome.into_parts();
                let value = serde_json::json!({
                    "success": applied,
                    "users": delta,
                    "message": message,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                match &outcome {
                    ImportOutcome::Applied(delta) => println!(
                        "Imported members of {source} into {target}: {} added, {} modified, {} removed",
                        delta.add_users.len(),
                        delta.modify_users.len(),
                        delta.delete_users.len()
                    ),
                    ImportOutcome::AlreadyApplied => println!("{}", outcome.message()),
                }
            }
        }

        PermCommands::List { op_id } => {
            let members = manager.get_authorized_users(op_id, &user)?;
            ctx.emit(&members, |members| {
                for member in members {
                    println!("{:<20} {}", member.username, member.access_level);
                }
            })?;
        }
    }

    Ok(())
}
