use serde::{Deserialize, Serialize};

use super::user::UserRef;

/// Smallest group the backend accepts.
pub const MIN_GROUP_MEMBERS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Group {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<UserRef>,
}

impl Group {
    pub fn display_member_count(&self) -> String {
        match self.members.len() {
            1 => "1 member".to_string(),
            n => format!("{} members", n),
        }
    }

    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m.id() == user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewGroup {
    pub name: String,
    #[serde(rename = "memberIds")]
    pub member_ids: Vec<String>,
}

impl NewGroup {
    /// Build a group request; duplicate member ids are dropped.
    pub fn new(name: impl Into<String>, member_ids: impl IntoIterator<Item = String>) -> Self {
        let mut ids: Vec<String> = Vec::new();
        for id in member_ids {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Self {
            name: name.into(),
            member_ids: ids,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("group name must not be empty".to_string());
        }
        if self.member_ids.len() < MIN_GROUP_MEMBERS {
            return Err(format!(
                "a group needs at least {} members, got {}",
                MIN_GROUP_MEMBERS,
                self.member_ids.len()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_group_with_mixed_members() {
        let json = r#"{"_id":"g1","name":"Trip","members":["u1",{"_id":"u2","userName":"bo"}]}"#;
        let group: Group = serde_json::from_str(json).unwrap();
        assert_eq!(group.display_member_count(), "2 members");
        assert!(group.has_member("u2"));
    }

    #[test]
    fn test_new_group_dedups_and_validates() {
        let group = NewGroup::new("Flat", vec!["u1".to_string(), "u1".to_string()]);
        assert_eq!(group.member_ids.len(), 1);
        assert!(group.validate().is_err());

        let group = NewGroup::new("Flat", vec!["u1".to_string(), "u2".to_string()]);
        assert!(group.validate().is_ok());
        assert_eq!(serde_json::to_value(&group).unwrap()["memberIds"][0], "u1");

        assert!(NewGroup::new(" ", vec!["a".to_string(), "b".to_string()]).validate().is_err());
    }
}
