//! Plain-text and JSON output for command results.

use anyhow::Result;
use serde::Serialize;
use splitledger_core::models::{Expense, Group, User};
use splitledger_core::utils::{format_amount, format_date, truncate_string};

/// Widest description shown in expense tables
const DESCRIPTION_WIDTH: usize = 32;

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn expense_row(expense: &Expense) -> String {
    let share = expense
        .share_per_member()
        .map(format_amount)
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<26} {:<width$} {:>10} {:>10}  {:<14} {}",
        expense.id,
        truncate_string(&expense.description, DESCRIPTION_WIDTH),
        format_amount(expense.amount),
        share,
        truncate_string(expense.paid_by_display(), 14),
        format_date(expense.created_at.as_ref()),
        width = DESCRIPTION_WIDTH,
    )
}

pub fn expenses(expenses: &[Expense], json: bool) -> Result<()> {
    if json {
        return print_json(expenses);
    }
    if expenses.is_empty() {
        println!("No expenses.");
        return Ok(());
    }
    println!(
        "{:<26} {:<width$} {:>10} {:>10}  {:<14} {}",
        "ID",
        "DESCRIPTION",
        "AMOUNT",
        "SHARE",
        "PAID BY",
        "DATE",
        width = DESCRIPTION_WIDTH,
    );
    for expense in expenses {
        println!("{}", expense_row(expense));
    }
    let total: f64 = expenses.iter().map(|e| e.amount).sum();
    println!("{} expenses, total {}", expenses.len(), format_amount(total));
    Ok(())
}

pub fn expense(expense: &Expense, json: bool) -> Result<()> {
    if json {
        return print_json(expense);
    }
    println!("ID:          {}", expense.id);
    println!("Description: {}", expense.description);
    println!("Amount:      {}", format_amount(expense.amount));
    println!("Paid by:     {}", expense.paid_by_display());
    if let Some(group) = &expense.group {
        println!("Group:       {}", group);
    }
    println!("Date:        {}", format_date(expense.created_at.as_ref()));
    if !expense.split_between.is_empty() {
        let share = expense.share_per_member().unwrap_or_default();
        println!("Split between ({} each):", format_amount(share));
        for member in &expense.split_between {
            println!("  - {}", member.display_name());
        }
    }
    Ok(())
}

pub fn groups(groups: &[Group], json: bool) -> Result<()> {
    if json {
        return print_json(groups);
    }
    if groups.is_empty() {
        println!("No groups.");
        return Ok(());
    }
    for group in groups {
        println!("{:<26} {} ({})", group.id, group.name, group.display_member_count());
    }
    Ok(())
}

pub fn users(users: &[User], json: bool) -> Result<()> {
    if json {
        return print_json(users);
    }
    for user in users {
        println!(
            "{:<26} {:<24} {}",
            user.id,
            truncate_string(user.display_name(), 24),
            user.email.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub fn user(user: &User, json: bool) -> Result<()> {
    if json {
        return print_json(user);
    }
    println!("ID:        {}", user.id);
    println!("Name:      {}", user.display_name());
    if let Some(user_name) = &user.user_name {
        println!("Username:  {}", user_name);
    }
    if let Some(email) = &user.email {
        println!("Email:     {}", email);
    }
    if let Some(avatar) = &user.avatar {
        println!("Avatar:    {}", avatar);
    }
    Ok(())
}
