//! Content-management system client
//!
//! Talks to a WordPress-compatible REST API over basic auth. Application
//! passwords are issued with spaces and the API rejects them spaced, so
//! every whitespace character is stripped before building the credential.
//!
//! Only draft creation itself is fatal. Category resolution and the custom
//! metadata field are best-effort: a post without a category or without the
//! field is still a usable draft, the editor fixes it up by hand.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use podpipe_common::events::{DraftPost, ProgressSender};

use crate::error::PipelineError;
use crate::models::ServiceAccount;
use crate::pipeline::naming;
use crate::pipeline::PublishDraft;

/// Category attached to every published recording, when it exists upstream
const CATEGORY_NAME: &str = "Podcasts";

/// Custom field the podcast feed plugin reads the media URL from
const PODCAST_META_FIELD: &str = "Media-Input-Podcast";

pub struct CmsClient {
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct Category {
    id: u64,
}

#[derive(Debug, Serialize)]
struct PostPayload {
    title: String,
    content: String,
    status: &'static str,
    date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    categories: Option<Vec<u64>>,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: u64,
    #[serde(default)]
    link: String,
}

impl CmsClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Fetch the authenticated user; used to test candidate credentials
    pub async fn probe(&self, account: &ServiceAccount) -> Result<(), PipelineError> {
        let url = format!("{}/wp-json/wp/v2/users/me", base_url(account));
        let response = self
            .http
            .get(&url)
            .basic_auth(&account.username, Some(stripped_password(account)))
            .send()
            .await
            .map_err(|e| PipelineError::Publish {
                message: "connection failed".to_string(),
                detail: Some(e.to_string()),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Publish {
                message: format!("authentication rejected ({})", status),
                detail: Some(extract_api_message(&body)),
            });
        }
        Ok(())
    }

    /// Best-effort category lookup; any failure or empty result is `None`
    async fn find_category_id(&self, account: &ServiceAccount) -> Option<u64> {
        let url = format!(
            "{}/wp-json/wp/v2/categories?search={}",
            base_url(account),
            CATEGORY_NAME
        );
        let response = self
            .http
            .get(&url)
            .basic_auth(&account.username, Some(stripped_password(account)))
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                match response.json::<Vec<Category>>().await {
                    Ok(categories) => categories.first().map(|c| c.id),
                    Err(e) => {
                        warn!("Unreadable category search response: {}", e);
                        None
                    }
                }
            }
            Ok(response) => {
                warn!(status = %response.status(), "Category search rejected");
                None
            }
            Err(e) => {
                warn!("Category search failed: {}", e);
                None
            }
        }
    }

    /// Best-effort custom field update on the created post
    async fn attach_media_meta(&self, account: &ServiceAccount, post_id: u64, media_url: &str) {
        let url = format!("{}/wp-json/wp/v2/posts/{}", base_url(account), post_id);
        let payload = serde_json::json!({
            "meta": { PODCAST_META_FIELD: media_url }
        });

        let result = self
            .http
            .post(&url)
            .basic_auth(&account.username, Some(stripped_password(account)))
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!(post_id, "Media URL custom field set");
            }
            Ok(response) => {
                warn!(
                    post_id,
                    status = %response.status(),
                    "Could not set the media URL custom field; it must be added manually"
                );
            }
            Err(e) => {
                warn!(
                    post_id,
                    error = %e,
                    "Could not set the media URL custom field; it must be added manually"
                );
            }
        }
    }
}

impl PublishDraft for CmsClient {
    async fn publish(
        &self,
        title: &str,
        media_url: &str,
        date: NaiveDate,
        account: &ServiceAccount,
        progress: &ProgressSender,
    ) -> Result<DraftPost, PipelineError> {
        progress.status("Creating draft post...");

        let category_id = self.find_category_id(account).await;

        let payload = PostPayload {
            title: naming::display_title(date, title),
            content: build_content(media_url),
            status: "draft",
            date: date.format("%Y-%m-%d").to_string(),
            categories: category_id.map(|id| vec![id]),
        };

        let url = format!("{}/wp-json/wp/v2/posts", base_url(account));
        let response = self
            .http
            .post(&url)
            .basic_auth(&account.username, Some(stripped_password(account)))
            .json(&payload)
            .send()
            .await
            .map_err(|e| PipelineError::Publish {
                message: "post creation request failed".to_string(),
                detail: Some(e.to_string()),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Publish {
                message: format!("post creation rejected ({})", status),
                detail: Some(extract_api_message(&body)),
            });
        }

        let created: CreatedPost = response.json().await.map_err(|e| PipelineError::Publish {
            message: "unreadable post creation response".to_string(),
            detail: Some(e.to_string()),
        })?;

        info!(post_id = created.id, "Draft post created");

        self.attach_media_meta(account, created.id, media_url).await;

        Ok(DraftPost {
            post_id: created.id,
            edit_link: format!(
                "{}/wp-admin/post.php?post={}&action=edit",
                base_url(account),
                created.id
            ),
            preview_link: created.link,
        })
    }
}

/// Account URL without a trailing slash
fn base_url(account: &ServiceAccount) -> &str {
    account.url.trim_end_matches('/')
}

/// Application password with every whitespace character removed
fn stripped_password(account: &ServiceAccount) -> String {
    account
        .password
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Post body: inline audio player, download link, and the manual-step
/// reminder shown until the custom field is filled in
fn build_content(media_url: &str) -> String {
    format!(
        r#"<div class="podcast-audio">
  <audio controls style="width: 100%; max-width: 600px;">
    <source src="{url}" type="audio/mpeg">
    Your browser does not support the audio element.
  </audio>
  <p><a href="{url}" download>Download MP3</a></p>
</div>
<p><strong>Podcast URL:</strong> {url}</p>
<p><em>Note: Add this URL to the "{field}" custom field.</em></p>
"#,
        url = media_url,
        field = PODCAST_META_FIELD,
    )
}

/// Pull the `message` field out of an API error body, falling back to the
/// raw body when it is not the expected JSON shape
fn extract_api_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_password_whitespace_is_stripped() {
        let account = ServiceAccount {
            url: "https://cms.example".to_string(),
            username: "editor".to_string(),
            password: "abcd efgh\tijkl mnop".to_string(),
        };
        assert_eq!(stripped_password(&account), "abcdefghijklmnop");
    }

    #[test]
    fn content_embeds_player_download_and_reminder() {
        let content = build_content("https://cdn.example/2024/x.mp3");
        assert!(content.contains(r#"<source src="https://cdn.example/2024/x.mp3""#));
        assert!(content.contains("download>Download MP3</a>"));
        assert!(content.contains("Media-Input-Podcast"));
    }

    #[test]
    fn api_message_extraction_falls_back_to_raw_body() {
        assert_eq!(
            extract_api_message(r#"{"code":"x","message":"Sorry, not allowed"}"#),
            "Sorry, not allowed"
        );
        assert_eq!(extract_api_message("<html>gateway timeout</html>"), "<html>gateway timeout</html>");
    }
}
