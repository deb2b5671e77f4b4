use serde::Serialize;

use crate::types::User;

use super::commands::UserCommands;
use super::{Context, confirm_action};

#[derive(Serialize)]
struct UserOutput {
    id: i64,
    email: String,
    username: String,
    created_at: String,
}

impl From<&User> for UserOutput {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

pub fn run_user(ctx: &Context, command: UserCommands) -> anyhow::Result<()> {
    match command {
        UserCommands::Add {
            email,
            username,
            password,
            non_interactive,
        } => run_user_add(ctx, &email, &username, password, non_interactive),
        UserCommands::List => run_user_list(ctx),
        UserCommands::Remove {
            email,
            non_interactive,
            yes,
        } => run_user_remove(ctx, &email, non_interactive, yes),
    }
}

fn run_user_add(
    ctx: &Context,
    email: &str,
    username: &str,
    password: Option<String>,
    non_interactive: bool,
) -> anyhow::Result<()> {
    let password = if let Some(password) = password {
        password
    } else if non_interactive {
        anyhow::bail!("--password is required in non-interactive mode");
    } else {
        inquire::Password::new("Password:")
            .with_validator(|input: &str| {
                if input.is_empty() {
                    Ok(inquire::validator::Validation::Invalid(
                        "Password cannot be empty".into(),
                    ))
                } else {
                    Ok(inquire::validator::Validation::Valid)
                }
            })
            .prompt()?
    };

    let user = ctx.manager.create_user(email, username, &password)?;
    ctx.emit(&UserOutput::from(&user), |user| {
        println!("Created user \"{}\" <{}> with id {}", user.username, user.email, user.id);
    })
}

fn run_user_list(ctx: &Context) -> anyhow::Result<()> {
    let users: Vec<UserOutput> = ctx
        .manager
        .store()
        .list_users()?
        .iter()
        .map(UserOutput::from)
        .collect();

    ctx.emit(&users, |users| {
        if users.is_empty() {
            println!("No users.");
        }
        for user in users {
            println!("{:>5}  {:<20} {}", user.id, user.username, user.email);
        }
    })
}

fn run_user_remove(
    ctx: &Context,
    email: &str,
    non_interactive: bool,
    yes: bool,
) -> anyhow::Result<()> {
    let user = ctx.user_by_email(email)?;

    let confirmed = confirm_action(
        &format!(
            "Delete user '{}'? This also removes their memberships and messages.",
            user.username
        ),
        yes,
        non_interactive,
    )?;
    if !confirmed {
        println!("Cancelled.");
        return Ok(());
    }

    ctx.manager.delete_user(user.id)?;
    println!("Deleted user '{}'", user.username);
    Ok(())
}
