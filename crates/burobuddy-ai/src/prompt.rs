//! Prompt templates for letter analysis, corrective retries and document chat.

use burobuddy_core::ValidationFailure;

use crate::generate::PromptMessage;

// ── Prompt templates ──

pub const ANALYSIS_SYSTEM_PROMPT: &str = "\
You are BüroBuddy, an expert at understanding German bureaucratic letters \
(public authorities, banks, insurance, tax offices and similar).

Analyse the extracted letter text and respond ONLY with a JSON object. \
No markdown fences, no explanation, just raw JSON:
{
  \"language_detected\": \"language code of the letter, usually de\",
  \"summary_en\": \"short English summary\",
  \"overall_risk\": \"low\" | \"medium\" | \"high\",
  \"actions\": [{
    \"title_en\": \"what the recipient must do\",
    \"details_en\": \"how to do it\",
    \"due_date\": \"YYYY-MM-DD\" or null,
    \"confidence\": number between 0 and 1,
    \"category\": \"payment\" | \"appointment\" | \"form\" | \"identity\" | \"insurance\" | \"tax\" | \"other\",
    \"evidence\": { \"quote_de\": \"exact quote from the letter\", \"page\": page number (optional) }
  }],
  \"deadlines\": [{
    \"date\": \"YYYY-MM-DD\",
    \"meaning_en\": \"what happens on this date\",
    \"confidence\": number between 0 and 1,
    \"evidence\": { \"quote_de\": \"exact quote from the letter\", \"page\": page number (optional) }
  }],
  \"entities\": {
    \"sender\": string or null,
    \"amount_eur\": number or null,
    \"iban\": string or null,
    \"reference_number\": string or null,
    \"contact_phone\": string or null,
    \"address\": string or null
  }
}

Write every narrative field in English. Quote evidence in the letter's original language.
Use null for any entity that is not in the letter.
Base overall_risk on urgency and consequences (late fees, legal steps, missed appointments).";

/// Wrap extracted letter text for the analysis request.
pub fn build_analysis_prompt(text: &str) -> String {
    format!("Analyze this German letter text and return the structured JSON:\n\n---\n{text}\n---")
}

/// System + user messages that start an analysis conversation.
pub fn analysis_messages(text: &str) -> Vec<PromptMessage> {
    vec![
        PromptMessage::system(ANALYSIS_SYSTEM_PROMPT),
        PromptMessage::user(build_analysis_prompt(text)),
    ]
}

/// Feedback sent after a rejected reply, listing everything that was wrong
/// so the model can fix it in one go.
pub fn build_correction_prompt(failure: &ValidationFailure) -> String {
    let mut out = String::from("Your previous reply was rejected.\n\n");
    match failure {
        ValidationFailure::MalformedJson { message, .. } => {
            out.push_str(&format!("It is not valid JSON: {message}\n"));
        }
        ValidationFailure::SchemaViolation(violations) => {
            out.push_str(&format!(
                "It does not match the required schema ({} problem(s)):\n",
                violations.len()
            ));
            for v in violations {
                out.push_str(&format!("- {v}\n"));
            }
        }
    }
    out.push_str(
        "\nReturn the complete corrected JSON object only, with no surrounding text or markdown.",
    );
    out
}

/// System prompt grounding Q&A in one document and its analysis summary.
pub fn build_chat_system_prompt(document_text: &str, analysis_summary: &str) -> String {
    format!(
        "You are BüroBuddy. Answer questions about this German letter based ONLY on the following.\n\
         \n\
         Document (extracted text):\n\
         {document_text}\n\
         \n\
         Analysis summary:\n\
         {analysis_summary}\n\
         \n\
         Answer in English. Be concise. If the answer is not in the document, say so."
    )
}
