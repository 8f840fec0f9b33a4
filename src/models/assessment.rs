use serde::{Deserialize, Serialize};

/// Clinical narrative returned by the inference service, reasoning markup removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assessment {
    pub text: String,
}

impl Assessment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
