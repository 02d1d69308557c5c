use serde_json::json;

pub static ANNOTATION_SYSTEM_MESSAGE: &str = r#"You are an expert software engineer cataloguing source files for a code knowledge base.

Given a file path and its contents, respond with a JSON object containing:
- "summary": two or three sentences describing what the file does.
- "tags": a short list of lowercase keywords (language, frameworks, domain concepts).
- "use_case": one sentence describing when a developer would reach for this file.

Respond with the JSON object only. Do not wrap it in prose."#;

pub fn annotation_user_message(file_path: &str, content: &str) -> String {
    format!("File path:\n{file_path}\n\nContent:\n{content}")
}

pub fn get_annotation_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "summary": { "type": "string" },
            "tags": {
                "type": "array",
                "items": { "type": "string" }
            },
            "use_case": { "type": "string" }
        },
        "required": ["summary", "tags", "use_case"],
        "additionalProperties": false
    })
}
