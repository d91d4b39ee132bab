/// Single-turn instruction sent to the model. Each call is stateless;
/// no conversation history is carried between invocations.
pub fn build(original_message: &str, sender_name: &str) -> String {
    format!(
        r#"You are a compassionate couples therapist helping partners communicate better.

{sender_name} sent this message to their partner:
"{original_message}"

Your task is to:
1. Rewrite the message in a softer, more constructive way that preserves the core meaning but removes any harsh tone, blame, or passive-aggressiveness. Make it feel like the person is expressing their feelings vulnerably rather than attacking.

2. Identify the underlying emotions the sender might be feeling (beyond what's explicitly stated).

3. Provide a brief tip for the receiver on how to respond with empathy.

Respond in this exact JSON format:
{{
  "interpretedMessage": "The softer version of the message",
  "emotionSummary": "2-3 sentences about what emotions are present",
  "communicationTip": "One brief tip for the receiver"
}}

Only respond with the JSON, no other text."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_message_verbatim_and_sender_name() {
        let prompt = build("You never listen to me!", "Alex");
        assert!(prompt.contains("\"You never listen to me!\""));
        assert!(prompt.contains("Alex sent this message"));
    }

    #[test]
    fn demands_bare_json_with_the_three_fields() {
        let prompt = build("hi", "Your partner");
        assert!(prompt.contains("interpretedMessage"));
        assert!(prompt.contains("emotionSummary"));
        assert!(prompt.contains("communicationTip"));
        assert!(prompt.contains("Only respond with the JSON"));
    }
}
