//! Single-flight access token renewal.
//!
//! The refresher is either `Idle` or `Refreshing`. The first request that
//! hits a 401 moves it to `Refreshing` and spawns the renewal as its own task;
//! every other request that hits a 401 meanwhile awaits a shared handle to
//! that task instead of starting its own. The task runs to completion even if
//! every waiter is dropped, then puts the state back to `Idle`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::auth::SessionStore;
use crate::models::ApiResponse;

use super::error::RefreshError;
use super::events::{AuthEvent, LogoutReason};

type RenewalOutcome = Result<String, RefreshError>;
type SharedRenewal = Shared<BoxFuture<'static, RenewalOutcome>>;

/// Externally visible refresh state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Refreshing,
}

enum RefreshState {
    Idle,
    Refreshing(SharedRenewal),
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshData {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken", default)]
    refresh_token: Option<String>,
}

/// Everything one renewal call needs; cloned into the shared future.
#[derive(Clone)]
pub(crate) struct Renewal {
    pub(crate) client: Client,
    pub(crate) url: String,
    pub(crate) session: SessionStore,
    pub(crate) events: broadcast::Sender<AuthEvent>,
}

impl Renewal {
    async fn run(self) -> RenewalOutcome {
        let outcome = self.renew().await;
        match &outcome {
            Ok(_) => {
                info!("Access token refreshed");
                let _ = self.events.send(AuthEvent::TokenRefreshed);
            }
            Err(e) => {
                // Nothing to expire if a logout already cleared the session
                let had_session = self.session.is_authenticated();
                warn!(error = %e, had_session, "Token refresh failed, clearing session");
                if let Err(clear_err) = self.session.clear() {
                    error!(error = %clear_err, "Failed to clear session after refresh failure");
                }
                if had_session {
                    let _ = self.events.send(AuthEvent::LoggedOut(LogoutReason::SessionExpired));
                }
            }
        }
        outcome
    }

    async fn renew(&self) -> RenewalOutcome {
        let session = self
            .session
            .get()
            .map_err(|e| RefreshError::Storage(e.to_string()))?
            .ok_or(RefreshError::MissingRefreshToken)?;

        debug!(url = %self.url, "Requesting token renewal");
        let response = self
            .client
            .post(&self.url)
            .json(&RefreshRequest {
                refresh_token: &session.refresh_token,
            })
            .send()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Rejected(status.as_u16()));
        }

        let body: ApiResponse<RefreshData> = response
            .json()
            .await
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
        let data = body
            .into_result()
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
        if data.access_token.is_empty() {
            return Err(RefreshError::InvalidResponse("empty access token".to_string()));
        }

        // A logout that landed first wins; the session stays cleared
        self.session
            .update_tokens(&data.access_token, data.refresh_token.as_deref())
            .map_err(|e| RefreshError::Storage(e.to_string()))?
            .ok_or(RefreshError::MissingRefreshToken)?;

        Ok(data.access_token)
    }
}

pub(crate) struct Refresher {
    state: Arc<Mutex<RefreshState>>,
    renewal: Renewal,
}

impl Refresher {
    pub(crate) fn new(renewal: Renewal) -> Self {
        Self {
            state: Arc::new(Mutex::new(RefreshState::Idle)),
            renewal,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn phase(&self) -> RefreshPhase {
        match *self.lock() {
            RefreshState::Idle => RefreshPhase::Idle,
            RefreshState::Refreshing(_) => RefreshPhase::Refreshing,
        }
    }

    /// Obtain a usable access token after `rejected` was answered with 401.
    ///
    /// Joins the in-flight renewal if there is one. If a renewal already
    /// completed after `rejected` was sent, the stored token is returned
    /// without another round trip.
    pub(crate) async fn renewed_token(&self, rejected: Option<&str>) -> RenewalOutcome {
        let pending = {
            let mut state = self.lock();
            let in_flight = match &*state {
                RefreshState::Refreshing(renewal) => Some(renewal.clone()),
                RefreshState::Idle => None,
            };

            match in_flight {
                Some(renewal) => {
                    debug!("Joining in-flight token refresh");
                    renewal
                }
                None => {
                    // Checked under the lock: a finished renewal stores its
                    // token before it flips the state back to Idle.
                    let current = self
                        .renewal
                        .session
                        .access_token()
                        .map_err(|e| RefreshError::Storage(e.to_string()))?;
                    if let Some(token) = current {
                        if Some(token.as_str()) != rejected {
                            debug!("Token already renewed, retrying with stored token");
                            return Ok(token);
                        }
                    }

                    let renewal = self.start();
                    *state = RefreshState::Refreshing(renewal.clone());
                    renewal
                }
            }
        };
        pending.await
    }

    /// Spawn the renewal task and return a handle every waiter can share.
    fn start(&self) -> SharedRenewal {
        let renewal = self.renewal.clone();
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            let outcome = renewal.run().await;
            *state.lock().unwrap_or_else(PoisonError::into_inner) = RefreshState::Idle;
            outcome
        });

        let state = Arc::clone(&self.state);
        async move {
            task.await.unwrap_or_else(|e| {
                // The task never reached its own reset
                error!(error = %e, "Token refresh task failed");
                *state.lock().unwrap_or_else(PoisonError::into_inner) = RefreshState::Idle;
                Err(RefreshError::Network(format!("refresh task failed: {}", e)))
            })
        }
        .boxed()
        .shared()
    }
}
