use serde::{Deserialize, Serialize};

/// Device-local UI settings. These never leave the device, so they are
/// writable regardless of connectivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_id: String,
    #[serde(default)]
    pub dark_mode: bool,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default = "default_show_past_events")]
    pub show_past_events: bool,
}

fn default_show_past_events() -> bool {
    true
}

impl UserPreferences {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            dark_mode: false,
            language: None,
            show_past_events: default_show_past_events(),
        }
    }
}
