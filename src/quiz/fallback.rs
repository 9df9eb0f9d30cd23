use super::ComprehensionCheck;

/// Local check shown whenever generation fails. Same unit id, same check.
pub fn fallback_check(unit_id: &str) -> ComprehensionCheck {
    match unit_id {
        "section_1" => check(
            "Why is the Socratic method compared to 'midwifery' (maieutics)?",
            &[
                "Because Socrates' mother was a midwife.",
                "Because it helps give birth to ideas implicit in the mind.",
                "Because it is a painful process.",
            ],
            1,
            "Socrates believed he didn't teach new knowledge, but rather helped others bring out (give birth to) the knowledge they already possessed.",
        ),
        "section_2" => check(
            "What is the primary mechanism of the Socratic method described here?",
            &[
                "Hypothesis elimination through identifying contradictions.",
                "Memorization of facts.",
                "Listening to a lecture.",
            ],
            0,
            "The text states it is a method of hypothesis elimination, where better hypotheses are found by eliminating those that lead to contradictions.",
        ),
        _ => check(
            "What is the main idea of this paragraph?",
            &[
                "To explain the history of the concept.",
                "To define the core logic.",
                "To provide examples.",
            ],
            1,
            "The paragraph focuses on defining the underlying logic and methodology.",
        ),
    }
}

fn check(question: &str, options: &[&str], correct: usize, explanation: &str) -> ComprehensionCheck {
    ComprehensionCheck {
        question: question.to_string(),
        options: options.iter().map(|option| option.to_string()).collect(),
        correct_option_index: correct,
        explanation: explanation.to_string(),
    }
}
