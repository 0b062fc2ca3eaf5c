//! Prompt rendering for the agent loop.
//!
//! Providers call [`format_user_message`] to combine the task, a bounded
//! history window, and the current page state into one message.

use std::fmt::Write as _;

use crate::browser::PageState;
use crate::history::StepHistory;
use crate::types::Task;

/// System prompt instructing the model how to drive the browser.
pub const SYSTEM_PROMPT: &str = r#"You are a browser automation agent working in an observe-think-act loop.

Each step you receive the current page (URL, title, indexed interactive elements) and the history of previous steps. Decide the next 1-3 actions.

Interactive elements are listed one per line as `[index]<tag>text</tag>`. Only indexed elements can be clicked or typed into, and indices change whenever the page updates.

Available actions:
- {"action": "navigate", "url": "https://..."} - go directly to a URL
- {"action": "click", "element_index": 5}
- {"action": "type_text", "element_index": 3, "text": "...", "submit": true}
- {"action": "select", "element_index": 7, "value": "..."}
- {"action": "scroll", "direction": "down", "amount": 600}
- {"action": "wait", "ms": 1000}
- {"action": "search", "query": "..."} - run a web search
- {"action": "extract_content"} - read the current page's text
- {"action": "done", "success": true, "message": "final answer"} - finish the task; must be the only action in the step

Respond with ONLY a JSON object:
{
  "thinking": "1-3 sentences of reasoning about the current state",
  "evaluation_previous_goal": "did the last step work? (omit on first step)",
  "memory": "facts to carry forward",
  "next_goal": "objective for this step",
  "actions": [ ... ]
}

Rules:
- Use `done` only when the task is complete or impossible; put the answer in `message`.
- Prefer `search` plus `extract_content` for information gathering.
- If an action failed, try a different approach instead of repeating it.
"#;

/// Render the per-step user message.
///
/// The most recent `window` steps are rendered in full; older steps
/// collapse to one summary line each so long runs stay within budget.
pub fn format_user_message(
    task: &Task,
    state: &PageState,
    history: &StepHistory,
    window: usize,
) -> String {
    let mut msg = String::new();

    let _ = writeln!(msg, "## Task\n{}", task.instruction);
    if let Some(info) = &task.supplementary {
        let _ = writeln!(msg, "\nAdditional context: {info}");
    }

    if !history.is_empty() {
        let _ = writeln!(msg, "\n## Previous steps");
        let records = history.records();
        let collapsed = records.len().saturating_sub(window);
        for record in &records[..collapsed] {
            let outcome = if record.error.is_some() { "failed" } else { "ok" };
            let _ = writeln!(
                msg,
                "- step {}: [{}] {} ({outcome})",
                record.step_number,
                record.actions_summary(),
                record.state_summary,
            );
        }
        for record in &records[collapsed..] {
            let _ = writeln!(msg, "\n### Step {}", record.step_number);
            if let Some(eval) = &record.evaluation {
                let _ = writeln!(msg, "Evaluation: {eval}");
            }
            if let Some(memory) = &record.memory {
                let _ = writeln!(msg, "Memory: {memory}");
            }
            let _ = writeln!(msg, "Actions: {}", record.actions_summary());
            for (i, obs) in record.observations.iter().enumerate() {
                match &obs.error {
                    Some(err) => {
                        let _ = writeln!(msg, "Result {i}: FAILED - {err}");
                    }
                    None => {
                        let _ = writeln!(msg, "Result {i}: ok");
                        if let Some(content) = &obs.content {
                            let _ = writeln!(msg, "Content: {}", truncate(content, 2_000));
                        }
                    }
                }
            }
            if let Some(err) = &record.error {
                let _ = writeln!(msg, "Step error: {err}");
            }
        }
    }

    let _ = writeln!(msg, "\n## Current page\nURL: {}", state.url);
    if let Some(title) = &state.title {
        let _ = writeln!(msg, "Title: {title}");
    }
    let _ = writeln!(
        msg,
        "Interactive elements ({}):\n{}",
        state.element_count,
        if state.element_tree.is_empty() {
            "(none)"
        } else {
            &state.element_tree
        }
    );

    let _ = write!(msg, "\nDecide the next action(s). Respond with JSON only.");
    msg
}

/// Appended to the user message when the previous decision failed to parse.
pub fn format_correction(error: &str) -> String {
    format!(
        "\n\nYour previous response was invalid: {error}\n\
         Respond again with ONLY the JSON object described in the system prompt."
    )
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
