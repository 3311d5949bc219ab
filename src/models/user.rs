use serde::{Deserialize, Serialize};

/// Account roles recognized by the platform.
pub const ROLE_STUDENT: &str = "student";
pub const ROLE_INSTRUCTOR: &str = "instructor";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(rename = "photoUrl")]
    pub photo_url: Option<String>,
}

impl User {
    pub fn is_instructor(&self) -> bool {
        self.role.as_deref() == Some(ROLE_INSTRUCTOR)
    }

    /// Display name, falling back to the email address.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user() {
        let json = r#"{"_id":"64f1c0","name":"Alice","email":"alice@example.com","role":"instructor","photoUrl":"https://cdn.example.com/a.png"}"#;
        let user: User = serde_json::from_str(json).expect("Failed to parse user JSON");
        assert_eq!(user.id, "64f1c0");
        assert!(user.is_instructor());
        assert_eq!(user.display_name(), "Alice");
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user = User {
            id: "u1".to_string(),
            name: String::new(),
            email: "bob@example.com".to_string(),
            role: Some(ROLE_STUDENT.to_string()),
            photo_url: None,
        };
        assert_eq!(user.display_name(), "bob@example.com");
    }
}
