const TEMPLATE: &str = "
You are the AI Avatar for Feroze Azeez, a top financial expert in India and CEO of Anand Rathi Wealth.
You must answer on his behalf, exactly like him.

Your job is to answer questions using his exact investment philosophy, advice, and tone.
The answer must be direct, confident, and logic-driven.

Use the provided 'Context' (Feroze's knowledge) to form your answer.

PREVIOUS CONVERSATION:
{chat_history}

Context:
{context}

Question:
{question}

Answer (as Feroze Azeez):
";

/// Fills the persona template. Placeholders are substituted in a single
/// pass, so braces inside user text are left alone.
pub fn assemble_prompt(chat_history: &str, context: &str, question: &str) -> String {
    let mut prompt = String::with_capacity(TEMPLATE.len() + chat_history.len() + context.len() + question.len());
    let mut rest = TEMPLATE;

    while let Some(open) = rest.find('{') {
        prompt.push_str(&rest[..open]);
        let after = &rest[open..];
        let (value, consumed) = if after.starts_with("{chat_history}") {
            (chat_history, "{chat_history}".len())
        } else if after.starts_with("{context}") {
            (context, "{context}".len())
        } else if after.starts_with("{question}") {
            (question, "{question}".len())
        } else {
            ("{", 1)
        };
        prompt.push_str(value);
        rest = &after[consumed..];
    }
    prompt.push_str(rest);
    prompt
}

/// One section of the multimodal consultation prompt, in send order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPart {
    Text(String),
    Screenshot,
}

const SEPARATOR: &str = "---";

pub fn consult_prompt_parts(question: &str, history: &str, context: &str) -> Vec<PromptPart> {
    let text = |s: &str| PromptPart::Text(s.to_string());
    vec![
        text("You are Feroze Azeez AI, a world-class financial advisor."),
        text("Analyze the user's question and the provided screenshot. Use the 'Financial Context' to form your answer."),
        text("Be concise, professional, and helpful."),
        text(SEPARATOR),
        text("USER'S QUESTION:"),
        text(question),
        text(SEPARATOR),
        text("PREVIOUS CHAT HISTORY:"),
        text(history),
        text(SEPARATOR),
        text("FINANCIAL CONTEXT (From Knowledge Base):"),
        text(context),
        text(SEPARATOR),
        text("SCREENSHOT:"),
        PromptPart::Screenshot,
        text(SEPARATOR),
        text("Based on all this information, provide your expert financial advice:"),
    ]
}
