use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserRef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Expense {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(rename = "paidBy", default)]
    pub paid_by: Option<UserRef>,
    #[serde(rename = "splitBetween", alias = "members", default)]
    pub split_between: Vec<UserRef>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(rename = "createdAt", default)]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub created_at: Option<DateTime<Utc>>,
}

impl Expense {
    /// Equal share owed by each member the expense is split between.
    pub fn share_per_member(&self) -> Option<f64> {
        if self.split_between.is_empty() {
            None
        } else {
            Some(self.amount / self.split_between.len() as f64)
        }
    }

    pub fn is_split_with(&self, user_id: &str) -> bool {
        self.split_between.iter().any(|m| m.id() == user_id)
    }

    pub fn paid_by_display(&self) -> &str {
        self.paid_by.as_ref().map(UserRef::display_name).unwrap_or("-")
    }
}

/// Body for creating or editing an expense.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewExpense {
    pub description: String,
    pub amount: f64,
    #[serde(rename = "paidBy", skip_serializing_if = "Option::is_none")]
    pub paid_by: Option<String>,
    #[serde(rename = "splitBetween")]
    pub split_between: Vec<String>,
}

impl NewExpense {
    pub fn new(description: impl Into<String>, amount: f64) -> Self {
        Self {
            description: description.into(),
            amount,
            paid_by: None,
            split_between: Vec::new(),
        }
    }

    /// Reject forms the backend would refuse anyway.
    pub fn validate(&self) -> Result<(), String> {
        if self.description.trim().is_empty() {
            return Err("description must not be empty".to_string());
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(format!("amount must be a positive number, got {}", self.amount));
        }
        Ok(())
    }
}

impl From<&Expense> for NewExpense {
    fn from(expense: &Expense) -> Self {
        Self {
            description: expense.description.clone(),
            amount: expense.amount,
            paid_by: expense.paid_by.as_ref().map(|p| p.id().to_string()),
            split_between: expense.split_between.iter().map(|m| m.id().to_string()).collect(),
        }
    }
}
