//! Prompt assembly for grounded answer generation

/// A retrieved passage labeled with the document it came from
#[derive(Debug, Clone, Copy)]
pub struct ContextPassage<'a> {
    pub filename: &'a str,
    pub text: &'a str,
}

pub struct PromptBuilder;

impl PromptBuilder {
    /// Format retrieved passages, best match first, each labeled with its
    /// source filename.
    pub fn build_context(passages: &[ContextPassage<'_>]) -> String {
        let mut context = String::new();
        for (i, passage) in passages.iter().enumerate() {
            context.push_str(&format!(
                "[{}] {}\n\n{}\n\n---\n\n",
                i + 1,
                passage.filename,
                passage.text
            ));
        }
        context
    }

    /// Grounded QA prompt: answer only from the provided passages, decline
    /// when they do not contain the answer.
    pub fn build_prompt(question: &str, context: &str) -> String {
        format!(
            r#"You are a support assistant answering an attendee's question about an event, using the organizer's reference documents.

Rules:
1. Answer ONLY from the passages below.
2. If the passages do not contain the answer, reply exactly: I don't have that information.
3. Do not use outside knowledge and do not guess.
4. Keep the answer short and direct.

PASSAGES:
{context}

QUESTION: {question}

ANSWER:"#
        )
    }
}
