//! Prompts for LLM field extraction.
//!
//! Centralising the prompt text here keeps the chat client focused on
//! transport and retry concerns, and lets unit tests inspect prompt
//! construction without a live model. Callers can override the system
//! prompt via [`crate::config::ExtractionConfig::system_prompt`]; the
//! constant here is used only when no override is provided.

/// Default system message fixing the model's output contract.
///
/// The hard "JSON only" rule matters: everything downstream assumes the
/// assistant message is JSON or JSON wrapped in recoverable noise. The
/// salvage parser handles models that disobey anyway.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a field extraction assistant. \
You will receive a long document text as input. \
Always respond with valid JSON only, shaped as \
{\"success\": bool, \"fields\": [{\"name\": string, \"value\": string, \"confidence\": number}], \"rawText\": string}. \
Do not write any text outside the JSON.";

/// Build the user message: the caller's instruction plus the OCR text,
/// wrapped in a `<<<…>>>` delimiter so the model can tell instruction from
/// document body even when the document itself contains instructions.
pub fn build_user_message(instruction: &str, ocr_text: &str) -> String {
    format!(
        "Prompt: {instruction}\n\nDocument text:\n<<<{ocr_text}>>>\n\nReturn only valid JSON."
    )
}
