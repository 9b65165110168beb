use reqwest::Client;

use super::{NotificationError, NotificationMessage};

/// Credentials for a protected ntfy topic
#[derive(Debug, Clone)]
pub enum NtfyAuth {
    Token(String),
    Basic { username: String, password: String },
}

/// Client for ntfy.sh push notifications
/// https://docs.ntfy.sh/publish/
pub struct NtfyClient {
    client: Client,
    url: String,
    topic: String,
    auth: Option<NtfyAuth>,
}

impl NtfyClient {
    pub fn new(client: Client, url: &str, topic: &str, auth: Option<NtfyAuth>) -> Self {
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            topic: topic.to_string(),
            auth,
        }
    }

    pub async fn send(&self, message: &NotificationMessage) -> Result<(), NotificationError> {
        let url = format!("{}/{}", self.url, self.topic);

        tracing::debug!(url = %url, title = %message.title, "Sending ntfy notification");

        let mut request = self
            .client
            .post(&url)
            .header("Title", &message.title)
            .header("Priority", message.priority.as_ntfy_priority().to_string());

        if !message.tags.is_empty() {
            request = request.header("Tags", message.tags.join(","));
        }

        request = match &self.auth {
            Some(NtfyAuth::Token(token)) => request.bearer_auth(token),
            Some(NtfyAuth::Basic { username, password }) => {
                request.basic_auth(username, Some(password))
            }
            None => request,
        };

        let response = request.body(message.body.clone()).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::from_status("ntfy", status, body));
        }

        Ok(())
    }
}
