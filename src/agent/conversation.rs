use crate::providers::base::Message;

/// Domain framing sent once per turn, ahead of any history. The fixed
/// acknowledgment that follows it keeps providers without a system role
/// (Gemini) anchored to the instructions.
pub const SYSTEM_PROMPT: &str = "\
You are an appliance parts assistant. Your role is to help users find replacement parts \
for dishwashers and refrigerators, and provide installation guidance.

You have access to:
1. A parts catalog with structured queries (part ID, brand, price, availability, model number)
2. Semantic search for symptom-based queries (e.g. 'dishwasher not draining')
3. Repair guides for common problems

When responding about parts:
- Be direct and professional - no conversational fillers
- Use plain text only - NO markdown formatting
- Start with a brief explanation or context before listing parts
- ALWAYS include the product page URL (product_url field) so users can purchase the part
- Provide specific details: name, part_id, price, brand, availability
- Include installation difficulty and estimated time when available
- Only include installation video URLs when the user explicitly asks about installation or repair
- When users ask follow-up questions, remember the previous context and parts discussed
- When the user says 'it', 'this part', or 'that part', resolve it to the most recently \
discussed part; use get_part_by_id first to retrieve its details
- For compatibility questions, look the part up by ID, then search by the model number; if \
the model is not in the catalog, say so and offer to search by part type or symptom instead
- Ask clarifying questions if needed (appliance type, model, symptom)
- Keep responses concise and informative

You ONLY help with dishwasher and refrigerator parts. Politely decline questions outside \
this scope.";

/// Fixed acknowledgment paired with the framing prompt.
pub const ACKNOWLEDGMENT: &str =
    "I understand. I'm an appliance parts assistant helping with dishwasher and refrigerator \
     parts only.";

/// Build the base conversation for one turn: framing pair, prior history,
/// then the current user message. Pure function of its inputs.
pub fn assemble(history: &[Message], user_message: &str) -> Vec<Message> {
    let mut conversation = Vec::with_capacity(history.len() + 3);
    conversation.push(Message::user(SYSTEM_PROMPT));
    conversation.push(Message::assistant(ACKNOWLEDGMENT, None));
    conversation.extend_from_slice(history);
    conversation.push(Message::user(user_message));
    conversation
}

/// Corrective feedback injected before a retry attempt. Appended even when
/// the issue list is empty so the retry is always visible in the record.
pub fn feedback_message(score: u8, issues: &[String]) -> Message {
    Message::user(format!(
        "Previous response had issues (score: {}/100): {}. Please improve the response.",
        score,
        issues.join(", ")
    ))
}
