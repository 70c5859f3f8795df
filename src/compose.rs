//! Prompt-driven stages: summarizing a post's discussion and pouring the
//! newsletter entries into the email template.

use tracing::{info, instrument, warn};

use crate::api::AskAsync;
use crate::error::Result;
use crate::models::CombinedResult;
use crate::normalize::normalize_markup;
use crate::utils::truncate_for_log;

/// Summary used when there is nothing to summarize or the model answered
/// with nothing.
pub const NO_DISCUSSION: &str = "No discussion yet.";

pub fn summary_prompt(comments: &str, title: &str) -> String {
    format!(
        "Article title:\n{title}\n\nComments:{comments}\n---\n\
         Given the above comments and new article, write a summary of the reddit comments. \
         Do not mention reddit or the specific comments in the summary, \
         just summarize the general reaction in 2 or 3 sentences."
    )
}

pub fn format_prompt(template: &str, results: &[CombinedResult]) -> Result<String> {
    let articles = serde_json::to_string_pretty(results)?;
    Ok(format!(
        "Email template:\n{template}\n\nArticles w/summary:{articles}\n---\n\
         Given the above email template and articles with summary, format the articles into \
         the email template. Replace all brackets with content from articles/comments. \
         Be sure to include the article links in href. Do not respond with anything other \
         than raw HTML, do not enclose HTML in quotes."
    ))
}

/// Summarize the general reaction to a post.
///
/// Posts without comments skip the model call. Model errors propagate.
#[instrument(level = "info", skip(llm, comments), fields(comment_bytes = comments.len()))]
pub async fn summarize<A: AskAsync>(llm: &A, comments: &str, title: &str) -> Result<String> {
    if comments.trim().is_empty() {
        info!("Post has no comments; using placeholder summary");
        return Ok(NO_DISCUSSION.to_string());
    }

    let summary = llm.ask(&summary_prompt(comments, title)).await?;
    let summary = summary.trim();
    if summary.is_empty() {
        warn!("Model returned an empty summary; using placeholder");
        return Ok(NO_DISCUSSION.to_string());
    }
    Ok(summary.to_string())
}

/// Fill the email template with the newsletter entries and return raw HTML.
///
/// # Arguments
///
/// * `llm` - Model that does the formatting
/// * `template` - Email template with bracketed placeholders
/// * `results` - Newsletter entries, embedded as pretty JSON
///
/// # Returns
///
/// The model's answer run through [`normalize_markup`]. Model errors
/// propagate unchanged.
#[instrument(level = "info", skip_all, fields(entries = results.len(), template_bytes = template.len()))]
pub async fn format_email<A: AskAsync>(
    llm: &A,
    template: &str,
    results: &[CombinedResult],
) -> Result<String> {
    let raw = llm.ask(&format_prompt(template, results)?).await?;
    let html = normalize_markup(&raw);
    if html.len() != raw.len() {
        info!(
            raw_bytes = raw.len(),
            bytes = html.len(),
            head = %truncate_for_log(&raw, 40),
            "Stripped wrapper around generated HTML"
        );
    }
    if !html.starts_with('<') {
        warn!(head = %truncate_for_log(&html, 80), "Generated email does not look like HTML");
    }
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NewsletterError;
    use std::sync::Mutex;

    /// Replays canned answers and remembers every prompt.
    struct ScriptedModel {
        answers: Mutex<Vec<Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(answers: Vec<Result<String>>) -> Self {
            Self {
                answers: Mutex::new(answers),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    impl AskAsync for ScriptedModel {
        async fn ask(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answers.lock().unwrap().remove(0)
        }
    }

    fn result() -> CombinedResult {
        CombinedResult {
            title: "Example".to_string(),
            summary: "Readers were thrilled.".to_string(),
            outlets: vec!["http://a".to_string(), "http://b".to_string()],
        }
    }

    #[test]
    fn test_summary_prompt_layout() {
        let prompt = summary_prompt("great news!", "Example");
        assert!(prompt.starts_with("Article title:\nExample\n\nComments:great news!\n---\n"));
        assert!(prompt.contains("2 or 3 sentences"));
    }

    #[test]
    fn test_format_prompt_embeds_template_and_results() {
        let prompt = format_prompt("<h1>[Title]</h1>", &[result()]).unwrap();
        assert!(prompt.starts_with("Email template:\n<h1>[Title]</h1>\n\nArticles w/summary:"));
        assert!(prompt.contains("\"http://b\""));
        assert!(prompt.contains("raw HTML"));
    }

    #[tokio::test]
    async fn test_summarize_returns_model_text() {
        let model = ScriptedModel::new(vec![Ok("  People loved it.\n".to_string())]);
        let summary = summarize(&model, "great news!", "Example").await.unwrap();
        assert_eq!(summary, "People loved it.");
        assert_eq!(model.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_summarize_without_comments_skips_model() {
        let model = ScriptedModel::new(vec![]);
        let summary = summarize(&model, "  \n", "Example").await.unwrap();
        assert_eq!(summary, NO_DISCUSSION);
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_blank_summary_replaced() {
        let model = ScriptedModel::new(vec![Ok("   ".to_string())]);
        assert_eq!(summarize(&model, "meh", "Example").await.unwrap(), NO_DISCUSSION);
    }

    #[tokio::test]
    async fn test_summarize_propagates_model_error() {
        let model = ScriptedModel::new(vec![Err(NewsletterError::Model("down".to_string()))]);
        let err = summarize(&model, "meh", "Example").await.unwrap_err();
        assert!(matches!(err, NewsletterError::Model(_)));
    }

    #[tokio::test]
    async fn test_format_email_normalizes_output() {
        let model = ScriptedModel::new(vec![Ok(
            "```html\n<html><body><a href=\"http://a\">Example</a></body></html>\n```".to_string(),
        )]);
        let html = format_email(&model, "<html>[Articles]</html>", &[result()]).await.unwrap();
        assert_eq!(html, "<html><body><a href=\"http://a\">Example</a></body></html>");
    }
}
