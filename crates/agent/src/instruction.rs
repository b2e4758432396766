//! Generation instruction: persona, rules, request, and output contract.

use postwright_core::message::Message;

use crate::batch::POSTS_PER_BATCH;

const ROLE: &str = "Reddit Content Creator";

const GOAL: &str = "Generate creative and engaging Reddit post ideas";

const BACKSTORY: &str = "You are a specialized AI agent fine-tuned on extensive Reddit post data. \
Through your training on thousands of real Reddit posts, you have developed an intimate \
understanding of what makes content successful across different subreddit communities. You \
understand posting patterns, community norms, engagement triggers, and the subtle nuances that \
make posts go viral or spark meaningful discussions. Your responses are informed by real Reddit \
user behavior and proven content strategies.";

/// Persona and framing used for every request.
#[derive(Debug, Clone)]
pub struct Persona {
    pub role: String,
    pub goal: String,
    pub backstory: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            role: ROLE.into(),
            goal: GOAL.into(),
            backstory: BACKSTORY.into(),
        }
    }
}

/// The instruction handed to the content generator for one mention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Persona and behavioral rules
    pub system: String,
    /// The request plus the output contract
    pub user: String,
}

impl Instruction {
    /// Build the instruction for a request body.
    pub fn build(persona: &Persona, request: &str) -> Self {
        let system = format!(
            "You are a {role}.\nYour goal: {goal}.\n\n{backstory}\n\n\
             Rules:\n\
             - Fulfil exactly what the requesting agent asked for.\n\
             - Write {n} distinct posts covering the requested topic.\n\
             - Make each post complete and ready to publish.\n\
             - Include relevant hashtags for better visibility.\n\
             - Reply with the posts only: no preamble, no closing remarks.",
            role = persona.role,
            goal = persona.goal,
            backstory = persona.backstory,
            n = POSTS_PER_BATCH,
        );

        let user = format!(
            "Request from another agent:\n\"\"\"\n{request}\n\"\"\"\n\n{contract}",
            request = request.trim(),
            contract = output_contract(),
        );

        Self { system, user }
    }

    /// The instruction as chat messages.
    pub fn to_messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }
}

/// The output format spelled out for the generator.
pub fn output_contract() -> String {
    format!(
        "Output format (follow EXACTLY, {n} posts numbered 1 to {n}):\n\n\
         Post [number]:\n\
         Title: [engaging title, one line]\n\
         Content: [detailed content]\n\
         Keywords: [#relevant #hashtags]\n\n\
         Important:\n\
         - Start every post with its own \"Post N:\" line.\n\
         - Separate posts with exactly one empty line.\n\
         - Every keyword must start with '#', separated by spaces.\n\
         - Do not use Markdown formatting around the labels.",
        n = POSTS_PER_BATCH,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use postwright_core::message::Role;

    #[test]
    fn instruction_embeds_request_persona_and_contract() {
        let instruction = Instruction::build(&Persona::default(), "  write about transformers \n");

        assert!(instruction.system.contains("Reddit Content Creator"));
        assert!(instruction.system.contains("fine-tuned on extensive Reddit post data"));
        assert!(instruction.user.contains("\"\"\"\nwrite about transformers\n\"\"\""));
        assert!(instruction.user.contains("Post [number]:"));
        assert!(instruction.user.contains("Keywords: [#relevant #hashtags]"));
        assert!(instruction.user.contains("5 posts numbered 1 to 5"));
    }

    #[test]
    fn messages_are_system_then_user() {
        let instruction = Instruction::build(&Persona::default(), "diffusion models");
        let messages = instruction.to_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, instruction.user);
    }

    #[test]
    fn custom_persona_is_used() {
        let persona = Persona {
            role: "LinkedIn Ghostwriter".into(),
            goal: "Write posts".into(),
            backstory: "You write for executives.".into(),
        };
        let instruction = Instruction::build(&persona, "rust");
        assert!(instruction.system.starts_with("You are a LinkedIn Ghostwriter."));
        assert!(!instruction.system.contains("Reddit"));
    }
}
