//! Registration state machine: which prompt a user is answering.

use serde::{Deserialize, Serialize};

/// The states of one registration conversation.
///
/// Progresses linearly: LanguageSelect → CollectName → CollectAge →
/// CollectPhone → Confirm → Completed. Confirm may loop back to CollectName,
/// and every non-terminal state may move to Cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    LanguageSelect,
    CollectName,
    CollectAge,
    CollectPhone,
    Confirm,
    Completed,
    Cancelled,
}

impl RegistrationState {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: RegistrationState) -> bool {
        use RegistrationState::*;
        if target == Cancelled {
            return !self.is_terminal();
        }
        matches!(
            (self, target),
            (LanguageSelect, CollectName)
                | (CollectName, CollectAge)
                | (CollectAge, CollectPhone)
                | (CollectPhone, Confirm)
                | (Confirm, Completed)
                | (Confirm, CollectName)
        )
    }

    /// Whether the conversation is over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether this state expects free-text input from the user.
    pub fn collects_text(&self) -> bool {
        matches!(
            self,
            Self::CollectName | Self::CollectAge | Self::CollectPhone | Self::Confirm
        )
    }
}

impl Default for RegistrationState {
    fn default() -> Self {
        Self::LanguageSelect
    }
}

impl std::fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::LanguageSelect => "language_select",
            Self::CollectName => "collect_name",
            Self::CollectAge => "collect_age",
            Self::CollectPhone => "collect_phone",
            Self::Confirm => "confirm",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RegistrationState; 7] = [
        RegistrationState::LanguageSelect,
        RegistrationState::CollectName,
        RegistrationState::CollectAge,
        RegistrationState::CollectPhone,
        RegistrationState::Confirm,
        RegistrationState::Completed,
        RegistrationState::Cancelled,
    ];

    #[test]
    fn valid_transitions() {
        use RegistrationState::*;
        let transitions = [
            (LanguageSelect, CollectName),
            (CollectName, CollectAge),
            (CollectAge, CollectPhone),
            (CollectPhone, Confirm),
            (Confirm, Completed),
            (Confirm, CollectName),
        ];
        for (from, to) in transitions {
            assert!(from.can_transition_to(to), "{from} should transition to {to}");
        }
    }

    #[test]
    fn invalid_transitions() {
        use RegistrationState::*;
        // Skip states
        assert!(!LanguageSelect.can_transition_to(CollectAge));
        assert!(!CollectName.can_transition_to(Confirm));
        // Go backward outside the confirm loop
        assert!(!CollectPhone.can_transition_to(CollectAge));
        // Terminal
        assert!(!Completed.can_transition_to(LanguageSelect));
        assert!(!Cancelled.can_transition_to(CollectName));
        // Self-transition
        assert!(!CollectAge.can_transition_to(CollectAge));
    }

    #[test]
    fn cancel_allowed_from_every_non_terminal_state() {
        for state in ALL {
            assert_eq!(
                state.can_transition_to(RegistrationState::Cancelled),
                !state.is_terminal(),
                "cancel from {state}"
            );
        }
    }

    #[test]
    fn is_terminal() {
        use RegistrationState::*;
        assert!(Completed.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!LanguageSelect.is_terminal());
        assert!(!Confirm.is_terminal());
    }

    #[test]
    fn display_matches_serde() {
        for state in ALL {
            let display = format!("{state}");
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(format!("\"{display}\""), json, "Display and serde should match for {state:?}");
        }
    }

    #[test]
    fn default_is_language_select() {
        assert_eq!(RegistrationState::default(), RegistrationState::LanguageSelect);
    }
}
