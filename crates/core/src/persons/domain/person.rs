use serde::{Deserialize, Serialize};

/// A named identity known to the recognition service.
///
/// `trained` is server-reported; the client only ever observes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    #[serde(default)]
    pub trained: bool,
}

impl Person {
    pub fn new(name: impl Into<String>, trained: bool) -> Self {
        Self {
            name: name.into(),
            trained,
        }
    }
}
