use std::path::PathBuf;

use clap::Subcommand;

use crate::types::AccessLevel;

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a new user account
    Add {
        /// Email address, used to identify the user
        #[arg(long)]
        email: String,

        /// Display name
        #[arg(long)]
        username: String,

        /// Password (prompted for when omitted)
        #[arg(long)]
        password: Option<String>,

        /// Skip interactive prompts (requires --password)
        #[arg(long)]
        non_interactive: bool,
    },

    /// List all user accounts
    List,

    /// Remove a user together with their memberships and changes
    Remove {
        /// Email address of the user to remove
        #[arg(long)]
        email: String,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,

        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum OpCommands {
    /// Create an operation owned by the acting user
    Create {
        /// Unique operation path
        path: String,

        /// Free-form description
        #[arg(long, default_value = "")]
        description: String,

        /// Category; operations named "<category>Group" act as templates
        #[arg(long, default_value = "default")]
        category: String,

        /// Initial document (defaults to the stub flight track)
        #[arg(long)]
        content_file: Option<PathBuf>,
    },

    /// List the acting user's operations
    List {
        /// Hide archived operations
        #[arg(long)]
        skip_archived: bool,
    },

    /// Show operation details
    Show { op_id: i64 },

    /// Move an operation to a new path
    Rename { op_id: i64, new_path: String },

    /// Change description, category or active state
    Update {
        op_id: i64,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        active: Option<bool>,
    },

    /// Delete an operation and its history
    Delete {
        op_id: i64,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,

        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Save a new revision of the document ("-" reads stdin)
    Save {
        op_id: i64,
        file: PathBuf,

        /// Comment recorded with the change
        #[arg(long, short)]
        comment: Option<String>,
    },

    /// Print the current document, or the one recorded by a change
    Cat {
        op_id: i64,

        #[arg(long)]
        change: Option<i64>,
    },

    /// List recorded changes, newest first
    History {
        op_id: i64,

        /// Only changes with a version name
        #[arg(long)]
        named: bool,
    },

    /// Print the diff a change introduced
    Diff { change_id: i64 },

    /// Restore the document recorded by a change as a new revision
    Undo { change_id: i64 },

    /// Label a change; omit the name to clear it
    NameVersion {
        op_id: i64,
        change_id: i64,
        name: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PermCommands {
    /// Grant access to users who are not yet members
    Add {
        op_id: i64,

        #[arg(long, value_parser = parse_level)]
        level: AccessLevel,

        /// Email addresses of the users
        #[arg(required = true)]
        users: Vec<String>,
    },

    /// Change the access level of existing members
    Modify {
        op_id: i64,

        #[arg(long, value_parser = parse_level)]
        level: AccessLevel,

        #[arg(required = true)]
        users: Vec<String>,
    },

    /// Revoke membership
    Remove {
        op_id: i64,

        #[arg(required = true)]
        users: Vec<String>,
    },

    /// Replace the members of TARGET with those of SOURCE
    Import { source: i64, target: i64 },

    /// List members and their access levels
    List { op_id: i64 },
}

fn parse_level(value: &str) -> Result<AccessLevel, String> {
    value.parse().map_err(|e: crate::error::Error| e.to_string())
}
