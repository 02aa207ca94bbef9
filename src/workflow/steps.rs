use std::fmt;

use serde::{Deserialize, Serialize};

use super::WorkflowError;
use crate::models::enums::str_enum;

str_enum!(Step {
    Entry => "entry",
    SymptomInput => "symptom_input",
    Analyzing => "analyzing",
    Results => "results",
    History => "history",
    VitalsMonitor => "vitals_monitor",
    HospitalSearch => "hospital_search",
    FinancialAidQuery => "financial_aid_query",
    FinancialAidResults => "financial_aid_results",
    Chat => "chat",
    Settings => "settings",
    ContributionInfo => "contribution_info",
});

/// Screens reachable by direct navigation once past the entry screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    History,
    VitalsMonitor,
    HospitalSearch,
    FinancialAidQuery,
    Chat,
    Settings,
    ContributionInfo,
}

impl Destination {
    pub fn step(self) -> Step {
        match self {
            Self::History => Step::History,
            Self::VitalsMonitor => Step::VitalsMonitor,
            Self::HospitalSearch => Step::HospitalSearch,
            Self::FinancialAidQuery => Step::FinancialAidQuery,
            Self::Chat => Step::Chat,
            Self::Settings => Step::Settings,
            Self::ContributionInfo => Step::ContributionInfo,
        }
    }
}

/// What moves the workflow. `Complete` and `Fail` are raised by the
/// orchestrator when a pending request resolves; the rest are user actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", content = "to", rename_all = "snake_case")]
pub enum Action {
    Navigate(Destination),
    Submit,
    Back,
    StartOver,
    Complete,
    Fail,
}

impl Step {
    /// Screens that offer the navigation menu.
    pub fn is_hub(self) -> bool {
        matches!(
            self,
            Self::SymptomInput
                | Self::Results
                | Self::History
                | Self::VitalsMonitor
                | Self::HospitalSearch
                | Self::FinancialAidQuery
                | Self::FinancialAidResults
                | Self::Chat
                | Self::Settings
                | Self::ContributionInfo
        )
    }

    /// The single next step for `action`, or `None` when the action is not
    /// available here.
    pub fn next(self, action: Action) -> Option<Step> {
        use Step::*;
        match (self, action) {
            (Entry, Action::Submit) => Some(SymptomInput),

            (SymptomInput, Action::Submit) => Some(Analyzing),
            (SymptomInput, Action::Back) => Some(Entry),

            (Analyzing, Action::Complete) => Some(Results),
            (Analyzing, Action::Fail) | (Analyzing, Action::StartOver) => Some(SymptomInput),

            (FinancialAidQuery, Action::Complete) => Some(FinancialAidResults),
            (FinancialAidResults, Action::Back) => Some(FinancialAidQuery),

            (s, Action::Navigate(dest)) if s.is_hub() => Some(dest.step()),
            (s, Action::Back) | (s, Action::StartOver) if s.is_hub() && s != SymptomInput => {
                Some(SymptomInput)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Navigate(dest) => write!(f, "navigate({})", dest.step()),
            Self::Submit => f.write_str("submit"),
            Self::Back => f.write_str("back"),
            Self::StartOver => f.write_str("start_over"),
            Self::Complete => f.write_str("complete"),
            Self::Fail => f.write_str("fail"),
        }
    }
}

/// Pure transition function over the step table.
pub fn transition(from: Step, action: Action) -> Result<Step, WorkflowError> {
    from.next(action).ok_or_else(|| WorkflowError::InvalidTransition {
        from: from.to_string(),
        action: action.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STEPS: [Step; 12] = [
        Step::Entry,
        Step::SymptomInput,
        Step::Analyzing,
        Step::Results,
        Step::History,
        Step::VitalsMonitor,
        Step::HospitalSearch,
        Step::FinancialAidQuery,
        Step::FinancialAidResults,
        Step::Chat,
        Step::Settings,
        Step::ContributionInfo,
    ];

    #[test]
    fn step_names_match_serde_and_parse_back() {
        for step in ALL_STEPS {
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(json, format!("\"{step}\""));
            assert_eq!(step.as_str().parse::<Step>().unwrap(), step);
        }
        assert!("lobby".parse::<Step>().is_err());
    }

    #[test]
    fn linear_analysis_path() {
        let s = transition(Step::Entry, Action::Submit).unwrap();
        assert_eq!(s, Step::SymptomInput);
        let s = transition(s, Action::Submit).unwrap();
        assert_eq!(s, Step::Analyzing);
        assert_eq!(transition(s, Action::Complete).unwrap(), Step::Results);
        assert_eq!(transition(s, Action::Fail).unwrap(), Step::SymptomInput);
    }

    #[test]
    fn entry_cannot_navigate() {
        let err = transition(Step::Entry, Action::Navigate(Destination::Chat)).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
    }

    #[test]
    fn analyzing_blocks_navigation() {
        assert!(transition(Step::Analyzing, Action::Navigate(Destination::History)).is_err());
        assert!(transition(Step::Analyzing, Action::Back).is_err());
        assert_eq!(
            transition(Step::Analyzing, Action::StartOver).unwrap(),
            Step::SymptomInput
        );
    }

    #[test]
    fn hub_screens_navigate_anywhere() {
        for step in ALL_STEPS.iter().copied().filter(|s| s.is_hub()) {
            assert_eq!(
                transition(step, Action::Navigate(Destination::Settings)).unwrap(),
                Step::Settings
            );
        }
    }

    #[test]
    fn back_returns_to_symptom_input() {
        assert_eq!(transition(Step::Results, Action::Back).unwrap(), Step::SymptomInput);
        assert_eq!(transition(Step::Chat, Action::Back).unwrap(), Step::SymptomInput);
        assert_eq!(
            transition(Step::FinancialAidResults, Action::Back).unwrap(),
            Step::FinancialAidQuery
        );
        assert_eq!(transition(Step::SymptomInput, Action::Back).unwrap(), Step::Entry);
    }

    #[test]
    fn aid_results_only_after_completion() {
        assert_eq!(
            transition(Step::FinancialAidQuery, Action::Complete).unwrap(),
            Step::FinancialAidResults
        );
        assert!(transition(Step::HospitalSearch, Action::Complete).is_err());
    }

    #[test]
    fn every_action_has_at_most_one_target() {
        let actions = [
            Action::Submit,
            Action::Back,
            Action::StartOver,
            Action::Complete,
            Action::Fail,
            Action::Navigate(Destination::Chat),
        ];
        for step in ALL_STEPS {
            for action in actions {
                // Deterministic: same inputs, same output.
                assert_eq!(step.next(action), step.next(action));
            }
        }
    }

    #[test]
    fn error_names_step_and_action() {
        let err = transition(Step::Results, Action::Complete).unwrap_err();
        assert_eq!(err.to_string(), "Invalid transition from results on complete");
    }
}
