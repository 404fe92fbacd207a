//! Cold-start detection.
//!
//! The tracker lives as long as the hosting function instance. The first
//! request an instance serves finds it empty and is therefore cold; it assigns
//! the instance identity that every later request reports as warm.

use std::sync::Mutex;

use uuid::Uuid;

/// Result of [`ColdStartTracker::classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceClassification {
    pub cold_execution: bool,
    pub instance_uuid: String,
}

#[derive(Debug, Default)]
pub struct ColdStartTracker {
    identity: Mutex<Option<String>>,
}

impl ColdStartTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify the current request and assign the instance identity if needed.
    pub fn classify(&self) -> InstanceClassification {
        let mut identity = self.identity.lock().unwrap_or_else(|e| e.into_inner());
        match identity.as_ref() {
            Some(uuid) => InstanceClassification {
                cold_execution: false,
                instance_uuid: uuid.clone(),
            },
            None => {
                let uuid = Uuid::new_v4().to_string();
                *identity = Some(uuid.clone());
                InstanceClassification {
                    cold_execution: true,
                    instance_uuid: uuid,
                }
            }
        }
    }

    /// The identity, if one was assigned.
    pub fn identity(&self) -> Option<String> {
        self.identity
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_warm(&self) -> bool {
        self.identity().is_some()
    }
}
