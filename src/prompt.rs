//! Prompt assembly.
//!
//! Merges system prompt, conversation history, retrieved passages, and
//! web results into one outbound prompt. Section order is fixed and
//! load-bearing — it determines what the model reads as grounding versus
//! the active ask — and every section except `User:` is omitted when its
//! input is empty.

use crate::models::{ChatTurn, WebResult};

/// Compose the outbound prompt. Sections, in order and blank-line
/// separated:
///
/// 1. `System:` + system prompt (when non-empty)
/// 2. `Conversation so far:` — `<Role>: <content>` per turn, empty turns
///    skipped; omitted when nothing remains
/// 3. `Document context:` — passages joined by a blank line
/// 4. `Web results:` — `N. <title>: <snippet> (<url>)`, 1-based
/// 5. `User:` + user message (always present, always last)
pub fn compose(
    system_prompt: &str,
    user_message: &str,
    passages: &[String],
    web_results: &[WebResult],
    history: &[ChatTurn],
) -> String {
    let mut sections: Vec<String> = Vec::new();

    if !system_prompt.is_empty() {
        sections.push(format!("System:\n{system_prompt}"));
    }

    let lines: Vec<String> = history
        .iter()
        .filter(|turn| !turn.content.is_empty())
        .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
        .collect();
    if !lines.is_empty() {
        sections.push(format!("Conversation so far:\n{}", lines.join("\n")));
    }

    if !passages.is_empty() {
        sections.push(format!("Document context:\n{}", passages.join("\n\n")));
    }

    if !web_results.is_empty() {
        let lines: Vec<String> = web_results
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {}: {} ({})", i + 1, r.title, r.snippet, r.url))
            .collect();
        sections.push(format!("Web results:\n{}", lines.join("\n")));
    }

    sections.push(format!("User:\n{user_message}"));
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::Utc;

    fn turn(role: Role, content: &str) -> ChatTurn {
        ChatTurn {
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn minimal_prompt_is_user_only() {
        let prompt = compose("", "hello", &[], &[], &[]);
        assert_eq!(prompt, "User:\nhello");
    }

    #[test]
    fn empty_history_and_web_omit_sections() {
        let prompt = compose("be brief", "hello", &[], &[], &[]);
        assert_eq!(prompt, "System:\nbe brief\n\nUser:\nhello");
        assert!(!prompt.contains("Conversation so far:"));
        assert!(!prompt.contains("Web results:"));
    }

    #[test]
    fn full_prompt_has_fixed_section_order() {
        let history = vec![
            turn(Role::User, "first question"),
            turn(Role::Assistant, "first answer"),
        ];
        let passages = vec!["passage one".to_string(), "passage two".to_string()];
        let web = vec![WebResult {
            title: "Docs".to_string(),
            url: "https://example.com".to_string(),
            snippet: "a snippet".to_string(),
        }];
        let prompt = compose("sys", "ask", &passages, &web, &history);

        let sys = prompt.find("System:").unwrap();
        let conv = prompt.find("Conversation so far:").unwrap();
        let ctx = prompt.find("Document context:").unwrap();
        let webpos = prompt.find("Web results:").unwrap();
        let user = prompt.find("User:\nask").unwrap();
        assert!(sys < conv && conv < ctx && ctx < webpos && webpos < user);

        assert!(prompt.contains("User: first question"));
        assert!(prompt.contains("Assistant: first answer"));
        assert!(prompt.contains("passage one\n\npassage two"));
        assert!(prompt.contains("1. Docs: a snippet (https://example.com)"));
        assert!(prompt.ends_with("User:\nask"));
    }

    #[test]
    fn empty_content_turns_are_skipped() {
        let history = vec![turn(Role::User, ""), turn(Role::Assistant, "")];
        let prompt = compose("", "q", &[], &[], &history);
        assert!(!prompt.contains("Conversation so far:"));
    }

    #[test]
    fn web_results_are_one_based() {
        let web = vec![
            WebResult {
                title: "A".to_string(),
                url: "u1".to_string(),
                snippet: "s1".to_string(),
            },
            WebResult {
                title: "B".to_string(),
                url: "u2".to_string(),
                snippet: "s2".to_string(),
            },
        ];
        let prompt = compose("", "q", &[], &web, &[]);
        assert!(prompt.contains("1. A: s1 (u1)\n2. B: s2 (u2)"));
    }
}
