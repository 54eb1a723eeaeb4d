use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Student,
    Faculty,
    Ta,
    Admin,
}

impl Role {
    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "STUDENT" => Some(Self::Student),
            "FACULTY" => Some(Self::Faculty),
            "TA" => Some(Self::Ta),
            "ADMIN" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Faculty take quizzes in preview mode: nothing is recorded server-side.
    pub fn is_faculty(self) -> bool {
        matches!(self, Self::Faculty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }
}
