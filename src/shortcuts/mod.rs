//! Keyboard chords and quick actions.
//!
//! The shell forwards raw key chords (e.g. "Ctrl+Shift+V"); this module
//! owns the chord table and the quick-action vocabulary shared with the
//! quick-action bar.

use std::collections::HashMap;

use serde::Deserialize;

/// Actions reachable from shortcuts and the quick-action bar.
///
/// The quick-action bar sends these by wire name (`toggleVoice`,
/// `rejectAllChanges`, ...); chords resolve to them locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuickAction {
    ToggleVoice,
    UndoLastChange,
    AcceptAllChanges,
    RejectAllChanges,
    ShowHistory,
}

/// Chord -> action bindings.
#[derive(Debug, Default)]
pub struct ShortcutMap {
    bindings: HashMap<String, QuickAction>,
}

impl ShortcutMap {
    /// The default bindings shipped with the extension.
    pub fn with_defaults() -> Self {
        let mut map = Self::default();
        map.bind("Ctrl+Shift+V", QuickAction::ToggleVoice);
        map.bind("Ctrl+Shift+Z", QuickAction::UndoLastChange);
        map.bind("Ctrl+Shift+A", QuickAction::AcceptAllChanges);
        map
    }

    pub fn bind(&mut self, chord: &str, action: QuickAction) {
        self.bindings.insert(chord.to_string(), action);
    }

    pub fn resolve(&self, chord: &str) -> Option<QuickAction> {
        self.bindings.get(chord).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings() {
        let map = ShortcutMap::with_defaults();
        assert_eq!(map.resolve("Ctrl+Shift+V"), Some(QuickAction::ToggleVoice));
        assert_eq!(map.resolve("Ctrl+Shift+Z"), Some(QuickAction::UndoLastChange));
        assert_eq!(map.resolve("Ctrl+Shift+A"), Some(QuickAction::AcceptAllChanges));
        assert_eq!(map.resolve("Ctrl+Shift+Q"), None);
    }

    #[test]
    fn test_quick_action_wire_names() {
        let action: QuickAction = serde_json::from_str(r#""toggleVoice""#).unwrap();
        assert_eq!(action, QuickAction::ToggleVoice);
        let action: QuickAction = serde_json::from_str(r#""rejectAllChanges""#).unwrap();
        assert_eq!(action, QuickAction::RejectAllChanges);
        let action: QuickAction = serde_json::from_str(r#""showHistory""#).unwrap();
        assert_eq!(action, QuickAction::ShowHistory);
    }

    #[test]
    fn test_rebinding_overrides() {
        let mut map = ShortcutMap::with_defaults();
        map.bind("Ctrl+Shift+V", QuickAction::ShowHistory);
        assert_eq!(map.resolve("Ctrl+Shift+V"), Some(QuickAction::ShowHistory));
    }
}
