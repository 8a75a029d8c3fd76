//! Configuration providers injected at construction.
//!
//! The display layer shows a "free" label when an order settles to nothing.
//! The label is read through a provider on every call, so deployments that
//! reconfigure it at runtime see the new value without rebuilding services.

use std::sync::{Arc, RwLock};

/// Source of the label rendered when a settlement nets to zero.
pub trait FreeLabelSource: Send + Sync {
    fn free_label(&self) -> String;
}

/// Fixed label decided at construction.
#[derive(Debug, Clone)]
pub struct StaticLabel(pub String);

impl StaticLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }
}

impl FreeLabelSource for StaticLabel {
    fn free_label(&self) -> String {
        self.0.clone()
    }
}

/// Runtime-reconfigurable label shared across services.
#[derive(Debug, Clone, Default)]
pub struct SharedLabel {
    label: Arc<RwLock<String>>,
}

impl SharedLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: Arc::new(RwLock::new(label.into())),
        }
    }

    pub fn set(&self, label: impl Into<String>) {
        if let Ok(mut guard) = self.label.write() {
            *guard = label.into();
        }
    }
}

impl FreeLabelSource for SharedLabel {
    fn free_label(&self) -> String {
        self.label
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_label_reflects_runtime_updates() {
        let label = SharedLabel::new("免费");
        assert_eq!(label.free_label(), "免费");

        label.set("free");
        assert_eq!(label.free_label(), "free");
    }
}
