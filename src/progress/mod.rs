//! Progress tracking for long-running operations.
//!
//! Mirrors the shell's progress bars: operations are registered with a
//! generated id, updated with a clamped percentage, and removed once
//! they reach 100%.

use std::collections::HashMap;

use crate::ipc::ShellEvent;

#[derive(Debug, Clone)]
struct Operation {
    label: String,
    percent: u8,
}

/// Tracks active operations and produces progress events for the shell.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    active: HashMap<String, Operation>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new operation at 0%. Returns its id and the event to
    /// emit.
    pub fn start(&mut self, label: &str) -> (String, ShellEvent) {
        let id = uuid::Uuid::new_v4().to_string();
        self.active.insert(
            id.clone(),
            Operation {
                label: label.to_string(),
                percent: 0,
            },
        );
        let event = ShellEvent::Progress {
            id: id.clone(),
            label: label.to_string(),
            percent: 0,
            done: false,
        };
        (id, event)
    }

    /// Update an operation. The percentage is clamped to 0..=100; at
    /// 100 the operation completes and is removed. Unknown ids are
    /// ignored.
    pub fn update(&mut self, id: &str, percent: i32) -> Option<ShellEvent> {
        let op = self.active.get_mut(id)?;
        op.percent = percent.clamp(0, 100) as u8;
        if op.percent >= 100 {
            return self.complete(id);
        }
        Some(ShellEvent::Progress {
            id: id.to_string(),
            label: op.label.clone(),
            percent: op.percent,
            done: false,
        })
    }

    /// Complete and remove an operation. Unknown ids are ignored.
    pub fn complete(&mut self, id: &str) -> Option<ShellEvent> {
        let op = self.active.remove(id)?;
        Some(ShellEvent::Progress {
            id: id.to_string(),
            label: op.label,
            percent: 100,
            done: true,
        })
    }
}
