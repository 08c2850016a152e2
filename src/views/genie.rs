use serde::Serialize;

pub const GREETING: &str = "👋 Hi! I'm CineGenie. I can recommend movies, explain endings, or find where to watch your favorite shows. Ask me anything!";

/// Earlier turns carried into each prompt
const CONTEXT_TURNS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub role: Speaker,
    pub text: String,
}

/// Transcript kept locally; the text service holds no conversation state
#[derive(Debug, Clone)]
pub struct GenieState {
    pub transcript: Vec<ChatTurn>,
}

impl GenieState {
    pub fn new() -> Self {
        Self {
            transcript: vec![ChatTurn {
                role: Speaker::Ai,
                text: GREETING.to_string(),
            }],
        }
    }

    pub fn record(&mut self, question: &str, reply: &str) {
        self.transcript.push(ChatTurn {
            role: Speaker::User,
            text: question.to_string(),
        });
        self.transcript.push(ChatTurn {
            role: Speaker::Ai,
            text: reply.to_string(),
        });
    }
}

impl Default for GenieState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeniePage {
    pub transcript: Vec<ChatTurn>,
}

pub fn render(state: &GenieState) -> GeniePage {
    GeniePage {
        transcript: state.transcript.clone(),
    }
}

/// Single-shot prompt simulating a conversation from the latest turns
pub fn build_prompt(history: &[ChatTurn], question: &str) -> String {
    let mut prompt = String::from("You are CineGenie, a passionate and helpful movie expert AI.\n");

    let earlier: Vec<&ChatTurn> = history
        .iter()
        .filter(|turn| turn.text != GREETING)
        .collect();
    let start = earlier.len().saturating_sub(CONTEXT_TURNS);
    if start < earlier.len() {
        prompt.push_str("Conversation so far:\n");
        for turn in &earlier[start..] {
            let speaker = match turn.role {
                Speaker::User => "User",
                Speaker::Ai => "CineGenie",
            };
            prompt.push_str(&format!("{}: {}\n", speaker, turn.text));
        }
    }

    prompt.push_str(&format!(
        "User Query: \"{}\"\nProvide a helpful, concise, and friendly response. \
         If recommending movies, mention the genre and why it fits.",
        question
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_carries_recent_turns_only() {
        let mut state = GenieState::new();
        for i in 0..5 {
            state.record(&format!("question {}", i), &format!("answer {}", i));
        }

        let prompt = build_prompt(&state.transcript, "what next?");
        assert!(!prompt.contains(GREETING));
        assert!(!prompt.contains("question 1"));
        assert!(prompt.contains("User: question 2"));
        assert!(prompt.contains("CineGenie: answer 4"));
        assert!(prompt.ends_with("why it fits."));
        assert!(prompt.contains("\"what next?\""));
    }

    #[test]
    fn test_first_prompt_has_no_history() {
        let prompt = build_prompt(&GenieState::new().transcript, "hi");
        assert!(!prompt.contains("Conversation so far"));
    }
}
