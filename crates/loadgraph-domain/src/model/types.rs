//! Core entity definitions: users and the posts they own.

use serde::{Deserialize, Serialize};

/// Identifier of a user row.
pub type UserId = i64;

/// Identifier of a post row.
pub type PostId = i64;

/// A user as stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub age: i32,
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>, age: i32) -> Self {
        Self {
            id,
            name: name.into(),
            age,
        }
    }
}

/// A post as stored. `user_id` references its author.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub content: String,
    pub user_id: UserId,
}

impl Post {
    pub fn new(id: PostId, content: impl Into<String>, user_id: UserId) -> Self {
        Self {
            id,
            content: content.into(),
            user_id,
        }
    }
}

/// Input for creating a user. The id is generated when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub id: Option<UserId>,
    pub name: String,
    pub age: i32,
}

/// Input for creating a post. The id is always generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub content: String,
    pub user_id: UserId,
}

/// Partial update for a user; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<i32>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none()
    }
}

/// Partial update for a post. Setting `user_id` moves the post to another author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

impl PostPatch {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.user_id.is_none()
    }
}

/// Identifier of a deleted row, returned by delete mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Deleted {
    pub id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_serializes_user_id_as_camel_case() {
        let post = Post::new(3, "Post-3", 2);
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["userId"], 2);
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn test_new_user_id_is_optional() {
        let user: NewUser = serde_json::from_str(r#"{"name":"Ann","age":41}"#).unwrap();
        assert_eq!(user.id, None);
        assert_eq!(user.name, "Ann");
    }

    #[test]
    fn test_patch_emptiness() {
        assert!(UserPatch::default().is_empty());
        assert!(!PostPatch {
            user_id: Some(1),
            ..Default::default()
        }
        .is_empty());
    }
}
