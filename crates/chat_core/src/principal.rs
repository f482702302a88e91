//! Authenticated principal.
//!
//! Carried for attribution and metrics only; the pipeline performs no
//! authorization decisions with it.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Principal {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub department: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            department: None,
        }
    }
}
