//! Command definitions and handlers.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use splitledger_core::models::{NewExpense, NewGroup, NewUser, Upload};
use splitledger_core::{ApiClient, Config};
use tracing::warn;

use crate::prompt;
use crate::render;

/// What every handler gets to work with.
pub struct Context {
    pub api: ApiClient,
    pub config: Config,
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and store the session
    Login {
        /// Account email (defaults to the last one used)
        #[arg(long)]
        email: Option<String>,
    },
    /// Log out and forget the stored session
    Logout,
    /// Create a new account
    Signup(SignupArgs),
    /// Show the logged-in user's profile
    Whoami,
    /// List every registered user
    Users,
    /// Personal expenses
    #[command(subcommand)]
    Expenses(ExpenseCommand),
    /// Groups and group expenses
    #[command(subcommand)]
    Groups(GroupCommand),
}

#[derive(Args, Debug)]
pub struct SignupArgs {
    #[arg(long)]
    user_name: String,
    #[arg(long)]
    full_name: String,
    #[arg(long)]
    email: String,
    /// Profile picture to upload
    #[arg(long)]
    avatar: Option<PathBuf>,
    /// Cover image to upload
    #[arg(long)]
    cover_image: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ExpenseArgs {
    #[arg(long)]
    description: String,
    #[arg(long)]
    amount: f64,
    /// User ids sharing the expense (repeatable)
    #[arg(long = "split-between", value_name = "USER_ID")]
    split_between: Vec<String>,
    /// Payer user id (defaults to you for group expenses)
    #[arg(long)]
    paid_by: Option<String>,
}

impl From<ExpenseArgs> for NewExpense {
    fn from(args: ExpenseArgs) -> Self {
        NewExpense {
            description: args.description,
            amount: args.amount,
            paid_by: args.paid_by,
            split_between: args.split_between,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ExpenseCommand {
    /// List your expenses
    List,
    /// Show one expense
    Show { id: String },
    /// Record a new expense
    Add(ExpenseArgs),
    /// Change an existing expense; omitted fields keep their value
    Edit {
        id: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long = "split-between", value_name = "USER_ID")]
        split_between: Vec<String>,
    },
    /// Delete an expense and show the updated list
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    /// List your groups
    List,
    /// Create a group with at least two members
    Create {
        #[arg(long)]
        name: String,
        /// Member user id (repeatable)
        #[arg(long = "member", value_name = "USER_ID", required = true)]
        members: Vec<String>,
    },
    /// List a group's members
    Members { group_id: String },
    /// List a group's expenses
    Expenses { group_id: String },
    /// Add an expense to a group
    AddExpense {
        group_id: String,
        #[command(flatten)]
        expense: ExpenseArgs,
    },
}

pub async fn run(command: Command, ctx: Context) -> Result<()> {
    match command {
        Command::Login { email } => login(ctx, email).await,
        Command::Logout => {
            ctx.api.logout().await?;
            println!("Logged out.");
            Ok(())
        }
        Command::Signup(args) => signup(&ctx, args).await,
        Command::Whoami => {
            let user = ctx.api.current_user().await?;
            render::user(&user, ctx.json)
        }
        Command::Users => {
            let users = ctx.api.list_users().await?;
            render::users(&users, ctx.json)
        }
        Command::Expenses(cmd) => expenses(&ctx, cmd).await,
        Command::Groups(cmd) => groups(&ctx, cmd).await,
    }
}

async fn login(mut ctx: Context, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| ctx.config.last_email.clone()) {
        Some(email) => email,
        None => prompt::line("Email: ")?,
    };
    let password = prompt::password("Password: ")?;

    let session = ctx.api.login(&email, &password).await?;
    println!("Logged in as {}.", session.user_email);

    ctx.config.last_email = Some(session.user_email);
    if let Err(e) = ctx.config.save() {
        warn!(error = %e, "Failed to save config");
    }
    Ok(())
}

async fn signup(ctx: &Context, args: SignupArgs) -> Result<()> {
    let password = prompt::password("Password: ")?;
    let confirm = prompt::password("Repeat password: ")?;
    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }

    let new_user = NewUser {
        user_name: args.user_name,
        full_name: args.full_name,
        email: args.email,
        password,
        avatar: args.avatar.as_deref().map(read_upload).transpose()?,
        cover_image: args.cover_image.as_deref().map(read_upload).transpose()?,
    };
    let user = ctx.api.register(new_user).await?;
    println!(
        "Account created. Run `splitledger login --email {}` to sign in.",
        user.email.as_deref().unwrap_or("")
    );
    Ok(())
}

fn read_upload(path: &Path) -> Result<Upload> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(Upload { file_name, bytes })
}

async fn expenses(ctx: &Context, cmd: ExpenseCommand) -> Result<()> {
    match cmd {
        ExpenseCommand::List => {
            let expenses = ctx.api.list_expenses().await?;
            render::expenses(&expenses, ctx.json)
        }
        ExpenseCommand::Show { id } => {
            let expense = ctx.api.get_expense(&id).await?;
            render::expense(&expense, ctx.json)
        }
        ExpenseCommand::Add(args) => {
            let expense = ctx.api.create_expense(&args.into()).await?;
            println!("Created expense {}.", expense.id);
            Ok(())
        }
        ExpenseCommand::Edit {
            id,
            description,
            amount,
            split_between,
        } => {
            let current = ctx.api.get_expense(&id).await?;
            let mut form = NewExpense::from(&current);
            if let Some(description) = description {
                form.description = description;
            }
            if let Some(amount) = amount {
                form.amount = amount;
            }
            if !split_between.is_empty() {
                form.split_between = split_between;
            }
            if form == NewExpense::from(&current) {
                println!("Nothing to change.");
                return Ok(());
            }
            ctx.api.update_expense(&id, &form).await?;
            println!("Updated expense {}.", id);
            Ok(())
        }
        ExpenseCommand::Delete { id, yes } => {
            if !yes && !prompt::confirm(&format!("Delete expense {}?", id))? {
                println!("Cancelled.");
                return Ok(());
            }
            ctx.api.delete_expense(&id).await?;
            println!("Deleted expense {}.", id);

            let expenses = ctx.api.list_expenses().await?;
            render::expenses(&expenses, ctx.json)
        }
    }
}

async fn groups(ctx: &Context, cmd: GroupCommand) -> Result<()> {
    match cmd {
        GroupCommand::List => {
            let groups = ctx.api.list_groups().await?;
            render::groups(&groups, ctx.json)
        }
        GroupCommand::Create { name, members } => {
            let group = ctx.api.create_group(&NewGroup::new(name, members)).await?;
            println!("Created group {} ({}).", group.name, group.id);
            Ok(())
        }
        GroupCommand::Members { group_id } => {
            let members = ctx.api.group_members(&group_id).await?;
            render::users(&members, ctx.json)
        }
        GroupCommand::Expenses { group_id } => {
            let expenses = ctx.api.group_expenses(&group_id).await?;
            render::expenses(&expenses, ctx.json)
        }
        GroupCommand::AddExpense { group_id, expense } => {
            let expense = ctx.api.add_group_expense(&group_id, &expense.into()).await?;
            println!("Added expense {} to group {}.", expense.id, group_id);
            Ok(())
        }
    }
}
