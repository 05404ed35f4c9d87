//! Typed wrappers over the backend's REST endpoints.

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::Session;
use crate::models::{Expense, Group, NewExpense, NewGroup, NewUser, Upload, User};

use super::client::ApiClient;
use super::events::{AuthEvent, LogoutReason};
use super::ApiError;

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
    #[serde(default)]
    user: Option<User>,
}

impl ApiClient {
    // ===== Authentication =====

    /// Log in and persist the resulting session.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let response = self
            .http()
            .post(self.url("/users/login"))
            .json(&LoginRequest { email, password })
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::AccessDenied("invalid email or password".to_string()));
        }
        let response = Self::check_response(response).await?;
        let data: LoginData = Self::decode(response).await?;

        let user = data
            .user
            .ok_or_else(|| ApiError::InvalidResponse("login response has no user".to_string()))?;
        let session = Session {
            access_token: data.access_token,
            refresh_token: data.refresh_token,
            user_email: user.email.clone().unwrap_or_else(|| email.to_string()),
            user_id: user.id,
        };
        if !session.is_complete() {
            return Err(ApiError::InvalidResponse(
                "login response is missing tokens or user id".to_string(),
            ));
        }

        self.session().set(&session)?;
        info!(user_id = %session.user_id, "Logged in");
        self.emit(AuthEvent::LoggedIn {
            user_id: session.user_id.clone(),
        });
        Ok(session)
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, new_user: NewUser) -> Result<User, ApiError> {
        let mut form = Form::new()
            .text("userName", new_user.user_name)
            .text("fullName", new_user.full_name)
            .text("email", new_user.email)
            .text("password", new_user.password);
        if let Some(avatar) = new_user.avatar {
            form = form.part("avatar", upload_part(avatar));
        }
        if let Some(cover) = new_user.cover_image {
            form = form.part("coverImage", upload_part(cover));
        }

        let response = self
            .http()
            .post(self.url("/users/register"))
            .multipart(form)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        Self::decode(response).await
    }

    /// Tell the backend (best effort) and drop the stored session.
    pub async fn logout(&self) -> Result<(), ApiError> {
        if let Some(token) = self.session().access_token()? {
            let result = self
                .http()
                .post(self.url("/users/logout"))
                .bearer_auth(token)
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => debug!("Backend logout acknowledged"),
                Ok(response) => debug!(status = %response.status(), "Backend logout refused"),
                Err(e) => warn!(error = %e, "Backend logout failed"),
            }
        }

        self.session().clear()?;
        info!("Logged out");
        self.emit(AuthEvent::LoggedOut(LogoutReason::UserRequested));
        Ok(())
    }

    // ===== Users =====

    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.get("/users/get-all-users").await
    }

    /// Profile of the logged-in user.
    pub async fn current_user(&self) -> Result<User, ApiError> {
        let session = self.session().get()?.ok_or(ApiError::NotLoggedIn)?;
        let url = self.url_with_segment("/users/get-user", &session.user_email)?;
        self.get_url(&url).await
    }

    // ===== Expenses =====

    pub async fn list_expenses(&self) -> Result<Vec<Expense>, ApiError> {
        self.get("/expense").await
    }

    pub async fn get_expense(&self, id: &str) -> Result<Expense, ApiError> {
        self.get(&format!("/expense/get-expense/{}", id)).await
    }

    pub async fn create_expense(&self, expense: &NewExpense) -> Result<Expense, ApiError> {
        expense.validate().map_err(ApiError::InvalidInput)?;
        self.post("/expense", expense).await
    }

    pub async fn update_expense(&self, id: &str, expense: &NewExpense) -> Result<Expense, ApiError> {
        expense.validate().map_err(ApiError::InvalidInput)?;
        self.put(&format!("/expense/edit-expense/{}", id), expense).await
    }

    pub async fn delete_expense(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/expense/{}", id)).await?;
        debug!(expense_id = id, "Expense deleted");
        Ok(())
    }

    // ===== Groups =====

    pub async fn list_groups(&self) -> Result<Vec<Group>, ApiError> {
        self.get("/group").await
    }

    pub async fn create_group(&self, group: &NewGroup) -> Result<Group, ApiError> {
        group.validate().map_err(ApiError::InvalidInput)?;
        self.post("/groups", group).await
    }

    pub async fn group_members(&self, group_id: &str) -> Result<Vec<User>, ApiError> {
        self.get(&format!("/groups/{}/members", group_id)).await
    }

    pub async fn group_expenses(&self, group_id: &str) -> Result<Vec<Expense>, ApiError> {
        self.get(&format!("/groups/{}/expenses", group_id)).await
    }

    /// Add an expense to a group. The payer defaults to the logged-in user.
    pub async fn add_group_expense(
        &self,
        group_id: &str,
        expense: &NewExpense,
    ) -> Result<Expense, ApiError> {
        expense.validate().map_err(ApiError::InvalidInput)?;
        let mut body = expense.clone();
        if body.paid_by.is_none() {
            let session = self.session().get()?.ok_or(ApiError::NotLoggedIn)?;
            body.paid_by = Some(session.user_id);
        }
        self.post(&format!("/groups/{}/expenses", group_id), &body).await
    }
}

fn upload_part(upload: Upload) -> Part {
    Part::bytes(upload.bytes).file_name(upload.file_name)
}
