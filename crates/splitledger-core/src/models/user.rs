use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(rename = "userName", default)]
    pub user_name: Option<String>,
    #[serde(rename = "fullName", default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(rename = "coverImage", default)]
    pub cover_image: Option<String>,
}

impl User {
    /// Best human-readable name available, falling back to the id.
    pub fn display_name(&self) -> &str {
        [&self.full_name, &self.user_name, &self.email]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|s| !s.is_empty())
            .unwrap_or(self.id.as_str())
    }
}

/// A user as it appears inside expenses and groups: either a bare id or the
/// populated user document, depending on the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(untagged)]
pub enum UserRef {
    Id(String),
    User(User),
}

impl UserRef {
    pub fn id(&self) -> &str {
        match self {
            UserRef::Id(id) => id,
            UserRef::User(user) => &user.id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            UserRef::Id(id) => id,
            UserRef::User(user) => user.display_name(),
        }
    }
}

/// A file attached to a signup form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Signup form data, sent as multipart.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_name: String,
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub avatar: Option<Upload>,
    pub cover_image: Option<Upload>,
}
