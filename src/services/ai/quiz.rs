/// Trivia quiz generation
///
/// The model is asked for a single line `Question|O1|O2|O3|O4|Index`. Anything
/// that does not validate against that shape is replaced by a locally built
/// release-year question, so a quiz is always available.
use super::AiGate;
use crate::models::{Movie, Quiz};

const QUIZ_FIELDS: usize = 6;
const OPTION_COUNT: usize = 4;

pub fn quiz_prompt(subject: &str) -> String {
    format!(
        "Generate a single multiple-choice trivia question about \"{}\".\n\
         Format strictly as: Question|Option1|Option2|Option3|Option4|CorrectOptionIndex(0-3).\n\
         Reply with that single line only.",
        subject
    )
}

pub fn insights_prompt(title: &str) -> String {
    format!(
        "Generate 3 interesting trivia facts about the movie \"{}\". Keep it short and engaging.",
        title
    )
}

/// Parses the strict pipe-delimited format, `None` on any deviation
pub fn parse_quiz(response: &str) -> Option<Quiz> {
    let parts: Vec<&str> = response.trim().split('|').map(str::trim).collect();
    if parts.len() != QUIZ_FIELDS || parts.iter().any(|part| part.is_empty()) {
        return None;
    }

    let correct: usize = parts[5].parse().ok()?;
    if correct >= OPTION_COUNT {
        return None;
    }

    Some(Quiz {
        question: parts[0].to_string(),
        options: parts[1..=OPTION_COUNT].iter().map(|o| o.to_string()).collect(),
        correct,
    })
}

/// Deterministic release-year question; the real year is always option 1
pub fn fallback_quiz(title: &str, year: i32) -> Quiz {
    // Widened so neighbouring years of an extreme value cannot overflow
    let year = i64::from(year);
    Quiz {
        question: format!("In which year was {} released?", title),
        options: vec![
            (year - 1).to_string(),
            year.to_string(),
            (year + 1).to_string(),
            (year + 2).to_string(),
        ],
        correct: 1,
    }
}

/// Asks the gate for a quiz about `topic`, falling back to a question about `movie`
pub async fn generate_quiz(gate: &AiGate, topic: &str, movie: &Movie) -> Quiz {
    let response = gate.request(&quiz_prompt(topic)).await;
    match parse_quiz(&response) {
        Some(quiz) => quiz,
        None => {
            tracing::warn!(topic = %topic, movie = %movie.id, "Quiz reply malformed, using fallback question");
            fallback_quiz(&movie.title, movie.year)
        }
    }
}
