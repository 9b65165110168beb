use reqwest::Client;
use serde::Serialize;

use super::{NotificationError, NotificationMessage};

/// Client for Gotify push notifications
/// https://gotify.net/docs/pushmsg
pub struct GotifyClient {
    client: Client,
    url: String,
    token: String,
}

#[derive(Serialize)]
struct GotifyMessage<'a> {
    title: &'a str,
    message: &'a str,
    priority: u8,
}

impl GotifyClient {
    pub fn new(client: Client, url: &str, token: &str) -> Self {
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub async fn send(&self, message: &NotificationMessage) -> Result<(), NotificationError> {
        let url = format!("{}/message", self.url);

        tracing::debug!(title = %message.title, "Sending gotify notification");

        let gotify_msg = GotifyMessage {
            title: &message.title,
            message: &message.body,
            priority: message.priority.as_gotify_priority(),
        };

        let response = self
            .client
            .post(&url)
            .query(&[("token", self.token.as_str())])
            .json(&gotify_msg)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::from_status("gotify", status, body));
        }

        Ok(())
    }
}
