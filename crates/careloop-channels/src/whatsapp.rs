//! Templated WhatsApp messaging via the ADA provider API.
//!
//! One synchronous HTTP POST per message, bearer-token auth. Any non-200
//! response is a delivery failure surfaced as a `SendReceipt`, never an
//! error and never a retry. Parameter order must match the provider
//! template's `{{1}}`, `{{2}}`, … placeholders.

use async_trait::async_trait;
use serde_json::json;

use careloop_core::config::MessagingConfig;
use careloop_core::traits::TemplateSender;
use careloop_core::types::SendReceipt;

/// Client for the provider's template-send endpoint.
pub struct WhatsAppGateway {
    config: MessagingConfig,
    client: reqwest::Client,
}

impl WhatsAppGateway {
    pub fn new(config: MessagingConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn template_payload(
        &self,
        template_name: &str,
        to: &str,
        template_data: &[String],
    ) -> serde_json::Value {
        json!({
            "platform": "WA",
            "from": self.config.sender_id,
            "to": to,
            "type": "template",
            "templateName": template_name,
            "templateLang": self.config.locale,
            "templateData": template_data,
            "templateButton": [],
        })
    }

    /// Send one templated message.
    pub async fn send_template(
        &self,
        template_name: &str,
        to: &str,
        template_data: &[String],
    ) -> SendReceipt {
        let payload = self.template_payload(template_name, to, template_data);

        let response = match self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Template '{template_name}' to {to} not sent: {e}");
                return SendReceipt::failed(format!("request failed: {e}"));
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Failed to send the template '{template_name}'. Status: {status}");
            tracing::warn!("Response text: {body}");
            return SendReceipt::failed(format!("status {status}: {body}"));
        }

        match response.json::<serde_json::Value>().await {
            Ok(body) => {
                tracing::info!("Successfully sent the template '{template_name}' to {to}.");
                SendReceipt::delivered(body)
            }
            Err(e) => SendReceipt::failed(format!("invalid response body: {e}")),
        }
    }

    /// Greeting send: one parameter, the patient's name.
    pub async fn send_greeting(&self, template_name: &str, to: &str, name: &str) -> SendReceipt {
        self.send_template(template_name, to, &[name.to_string()])
            .await
    }

    /// Plan-update send: two parameters, name then plan text.
    pub async fn send_plan_update(
        &self,
        template_name: &str,
        to: &str,
        name: &str,
        plan: &str,
    ) -> SendReceipt {
        self.send_template(template_name, to, &[name.to_string(), plan.to_string()])
            .await
    }
}

#[async_trait]
impl TemplateSender for WhatsAppGateway {
    async fn send_template(&self, template: &str, to: &str, params: &[String]) -> SendReceipt {
        WhatsAppGateway::send_template(self, template, to, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> WhatsAppGateway {
        WhatsAppGateway::new(MessagingConfig {
            api_url: "https://api.example.com/v1/message".into(),
            api_key: "secret".into(),
            sender_id: "15557091773".into(),
            locale: "en".into(),
        })
    }

    #[test]
    fn test_payload_shape() {
        let payload = gateway().template_payload(
            "diet_plan_temp",
            "9990001111",
            &["Asha".into(), "Oats breakfast".into()],
        );
        assert_eq!(payload["platform"], "WA");
        assert_eq!(payload["from"], "15557091773");
        assert_eq!(payload["to"], "9990001111");
        assert_eq!(payload["type"], "template");
        assert_eq!(payload["templateName"], "diet_plan_temp");
        assert_eq!(payload["templateLang"], "en");
        assert_eq!(payload["templateData"][0], "Asha");
        assert_eq!(payload["templateData"][1], "Oats breakfast");
        assert!(payload["templateButton"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_static_template_has_empty_data() {
        let payload = gateway().template_payload("summary", "9990001111", &[]);
        assert!(payload["templateData"].as_array().unwrap().is_empty());
    }
}
