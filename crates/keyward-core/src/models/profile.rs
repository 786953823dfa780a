use serde::{Deserialize, Serialize};

/// The authenticated user, as returned by `GET /me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    #[serde(alias = "is_active")]
    pub active: bool,
}

impl Profile {
    /// Short status label for display
    pub fn status_display(&self) -> &'static str {
        if self.active {
            "active"
        } else {
            "inactive"
        }
    }
}
