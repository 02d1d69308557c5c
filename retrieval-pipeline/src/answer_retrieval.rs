use crate::RetrievedArtifact;

/// Returned verbatim when retrieval yields no usable context.
pub const NO_CONTEXT_ANSWER: &str =
    "I could not find any relevant context to answer this question.";

pub static ANSWER_SYSTEM_MESSAGE: &str = r#"You answer questions about a codebase using only the context provided.

Each context entry describes one source file: its location, what it is used for, a summary and a snippet of its contents.

Rules:
- Answer strictly from the context. Do not rely on outside knowledge of the code.
- Cite the file locations you relied on.
- If the context does not contain enough information to answer, say so plainly instead of guessing."#;

pub fn create_user_message(context: &str, query: &str) -> String {
    format!(
        r"
        Context Information:
        ==================
        {context}

        User Question:
        ==================
        {query}
        "
    )
}

pub fn format_artifact_context(position: usize, retrieved: &RetrievedArtifact) -> String {
    let artifact = &retrieved.artifact;
    format!(
        "[{position}] {}/{} (score {:.3})\nSource: {}\nUse case: {}\nSummary: {}\nSnippet:\n{}\n",
        artifact.repo_full_name,
        artifact.file_path,
        retrieved.score,
        artifact.source_url,
        artifact.ai_use_case,
        artifact.ai_summary,
        artifact.content_snippet,
    )
}

/// Joins context blocks in similarity order until `char_limit` would be exceeded.
///
/// Returns the context text and how many artifacts it covers. The first block is
/// truncated rather than dropped, so a non-empty input never yields empty context.
pub fn assemble_context(retrieved: &[RetrievedArtifact], char_limit: usize) -> (String, usize) {
    let mut context = String::new();
    let mut used_chars = 0usize;
    let mut included = 0usize;

    for (idx, item) in retrieved.iter().enumerate() {
        let block = format_artifact_context(idx.saturating_add(1), item);
        let block_chars = block.chars().count();
        let separator = usize::from(included > 0);

        if used_chars
            .saturating_add(separator)
            .saturating_add(block_chars)
            > char_limit
        {
            if included == 0 {
                context.extend(block.chars().take(char_limit.max(1)));
                included = 1;
            }
            break;
        }

        if separator > 0 {
            context.push('\n');
        }
        context.push_str(&block);
        used_chars = used_chars
            .saturating_add(separator)
            .saturating_add(block_chars);
        included = included.saturating_add(1);
    }

    (context, included)
}
