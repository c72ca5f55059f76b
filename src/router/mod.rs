//! Voice command routing.
//!
//! One utterance maps to exactly one wire action, or to an
//! "unrecognized" report. Matching is exact string equality after
//! lower-casing; the only patterned command is the
//! `move cursor to the words <X>` prefix.

use crate::session::{ClientAction, CursorDirection};

/// Literal prefix of the single patterned command.
const CURSOR_WORDS_PREFIX: &str = "move cursor to the words";

/// Outcome of routing one utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Forward this action over the active session.
    Action(ClientAction),
    /// No phrase matched. The report carries the original-case text and
    /// must cause no other side effect.
    Unrecognized { report: String },
}

/// Map a recognized utterance to its action.
pub fn route(raw_text: &str) -> Route {
    let normalized = raw_text.to_lowercase();
    let action = match normalized.as_str() {
        "start redlining" => ClientAction::StartRecognition,
        "stop redlining" => ClientAction::StopRecognition,
        "clear markup" => ClientAction::ClearChanges,
        "accept suggested" => ClientAction::AcceptChanges,
        "accept all, move to final" => ClientAction::AcceptAllChanges,
        "make suggestion" => ClientAction::GetSuggestions,
        "move cursor up" => ClientAction::MoveCursor {
            direction: CursorDirection::Up,
            steps: None,
        },
        "move cursor down" => ClientAction::MoveCursor {
            direction: CursorDirection::Down,
            steps: None,
        },
        "go forward" => ClientAction::MoveCursor {
            direction: CursorDirection::Forward,
            steps: None,
        },
        "go forward two" => ClientAction::MoveCursor {
            direction: CursorDirection::Forward,
            steps: Some(2),
        },
        _ => {
            if normalized.starts_with(CURSOR_WORDS_PREFIX) {
                // Slice the original text so the argument keeps its case.
                let words = raw_text
                    .get(CURSOR_WORDS_PREFIX.len()..)
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                return Route::Action(ClientAction::MoveCursorToWords { words });
            }
            return Route::Unrecognized {
                report: format!("Unrecognized voice command: {}", raw_text),
            };
        }
    };
    Route::Action(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phrase_table_is_case_insensitive() {
        let table: &[(&str, ClientAction)] = &[
            ("start redlining", ClientAction::StartRecognition),
            ("stop redlining", ClientAction::StopRecognition),
            ("clear markup", ClientAction::ClearChanges),
            ("accept suggested", ClientAction::AcceptChanges),
            ("accept all, move to final", ClientAction::AcceptAllChanges),
            ("make suggestion", ClientAction::GetSuggestions),
            (
                "move cursor up",
                ClientAction::MoveCursor {
                    direction: CursorDirection::Up,
                    steps: None,
                },
            ),
            (
                "move cursor down",
                ClientAction::MoveCursor {
                    direction: CursorDirection::Down,
                    steps: None,
                },
            ),
            (
                "go forward",
                ClientAction::MoveCursor {
                    direction: CursorDirection::Forward,
                    steps: None,
                },
            ),
            (
                "go forward two",
                ClientAction::MoveCursor {
                    direction: CursorDirection::Forward,
                    steps: Some(2),
                },
            ),
        ];

        for (phrase, expected) in table {
            assert_eq!(route(phrase), Route::Action(expected.clone()), "{}", phrase);
            assert_eq!(
                route(&phrase.to_uppercase()),
                Route::Action(expected.clone()),
                "{} (upper)",
                phrase
            );
        }
    }

    #[test]
    fn test_move_cursor_to_words_extracts_argument() {
        assert_eq!(
            route("MOVE CURSOR TO THE WORDS hello world"),
            Route::Action(ClientAction::MoveCursorToWords {
                words: "hello world".to_string()
            })
        );
        // Argument keeps its original case; surrounding whitespace goes.
        assert_eq!(
            route("move cursor to the words   Section IV  "),
            Route::Action(ClientAction::MoveCursorToWords {
                words: "Section IV".to_string()
            })
        );
    }

    #[test]
    fn test_move_cursor_to_words_empty_argument() {
        assert_eq!(
            route("move cursor to the words"),
            Route::Action(ClientAction::MoveCursorToWords {
                words: String::new()
            })
        );
    }

    #[test]
    fn test_unrecognized_preserves_original_case() {
        assert_eq!(
            route("BaNaNa"),
            Route::Unrecognized {
                report: "Unrecognized voice command: BaNaNa".to_string()
            }
        );
    }

    #[test]
    fn test_near_miss_is_unrecognized() {
        // Exact equality only: no partial or fuzzy matching.
        assert!(matches!(route("start redlining now"), Route::Unrecognized { .. }));
        assert!(matches!(route("accept all"), Route::Unrecognized { .. }));
        assert!(matches!(route(""), Route::Unrecognized { .. }));
    }
}
