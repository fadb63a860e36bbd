//! Twilio Messages API.

use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, warn};

use fp_core::config::SmsConfig;
use fp_core::error::{FpError, FpResult};

use crate::client::HttpClient;
use crate::provider::{SentMessage, SmsSender};
use crate::response::TwilioMessage;

/// Client for sending SMS through a Twilio account.
#[derive(Clone)]
pub struct TwilioClient {
    http: HttpClient,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioClient {
    /// Build a client from the `[sms]` config section.
    pub fn new(config: &SmsConfig) -> FpResult<Self> {
        if !config.is_configured() {
            return Err(FpError::MissingConfig(
                "sms.account_sid, sms.auth_token and sms.from_number are required".into(),
            ));
        }
        Ok(Self {
            http: HttpClient::new("twilio", &config.base_url, config.timeout_ms)?,
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_number: config.from_number.clone(),
        })
    }

    fn messages_path(&self) -> String {
        format!("/2010-04-01/Accounts/{}/Messages.json", self.account_sid)
    }

    /// Send one message. A message Twilio accepts but immediately marks
    /// failed is reported as an error.
    pub async fn send_message(&self, to: &str, body: &str) -> FpResult<TwilioMessage> {
        let builder = self
            .http
            .request(Method::POST, &self.messages_path())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)]);

        let message: TwilioMessage = self.http.send_json(builder).await?;
        if message.is_failed() {
            let reason = message
                .error_message
                .clone()
                .unwrap_or_else(|| format!("status {}", message.status));
            warn!("twilio rejected message {} to {to}: {reason}", message.sid);
            return Err(FpError::SendFailed(reason));
        }

        debug!("twilio accepted message {} ({})", message.sid, message.status);
        Ok(message)
    }
}

#[async_trait]
impl SmsSender for TwilioClient {
    async fn send_sms(&self, to: &str, body: &str) -> FpResult<SentMessage> {
        let message = self.send_message(to, body).await?;
        Ok(SentMessage {
            provider_message_id: message.sid,
            status: message.status,
        })
    }

    fn from_number(&self) -> Option<String> {
        Some(self.from_number.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmsConfig {
        SmsConfig {
            account_sid: "AC123".into(),
            auth_token: "secret".into(),
            from_number: "+61800000000".into(),
            ..SmsConfig::default()
        }
    }

    #[test]
    fn test_requires_credentials() {
        assert!(matches!(
            TwilioClient::new(&SmsConfig::default()),
            Err(FpError::MissingConfig(_))
        ));
    }

    #[test]
    fn test_messages_path() {
        let client = TwilioClient::new(&config()).unwrap();
        assert_eq!(client.messages_path(), "/2010-04-01/Accounts/AC123/Messages.json");
        assert_eq!(client.from_number().as_deref(), Some("+61800000000"));
    }
}
