use serde::{Deserialize, Serialize};

/// A single multiple-choice comprehension question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensionCheck {
    pub question: String,
    pub options: Vec<String>,
    pub correct_option_index: usize,
    pub explanation: String,
}

impl ComprehensionCheck {
    /// At least two options and a correct index that points into them.
    pub fn is_well_formed(&self) -> bool {
        self.options.len() >= 2 && self.correct_option_index < self.options.len()
    }

    pub fn evaluate(&self, selected: usize) -> Option<AnswerOutcome> {
        if selected >= self.options.len() {
            return None;
        }
        Some(AnswerOutcome {
            selected_option_index: selected,
            correct: selected == self.correct_option_index,
            correct_option_index: self.correct_option_index,
            explanation: self.explanation.clone(),
        })
    }
}

/// Input handed to the check generation service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub unit_id: String,
    pub unit_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub selected_option_index: usize,
    pub correct: bool,
    pub correct_option_index: usize,
    pub explanation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check() -> ComprehensionCheck {
        ComprehensionCheck {
            question: "q".into(),
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_option_index: 2,
            explanation: "because".into(),
        }
    }

    #[test]
    fn evaluates_answers() {
        let check = check();
        assert!(check.evaluate(2).unwrap().correct);
        let wrong = check.evaluate(0).unwrap();
        assert!(!wrong.correct);
        assert_eq!(wrong.correct_option_index, 2);
        assert_eq!(wrong.explanation, "because");
        assert!(check.evaluate(3).is_none());
    }

    #[test]
    fn shape_validation() {
        let mut check = check();
        assert!(check.is_well_formed());
        check.correct_option_index = 3;
        assert!(!check.is_well_formed());
        check.options.truncate(1);
        check.correct_option_index = 0;
        assert!(!check.is_well_formed());
    }

    #[test]
    fn wire_format_is_camel_case() {
        let json = serde_json::to_value(check()).unwrap();
        assert_eq!(json["correctOptionIndex"], 2);
    }
}
