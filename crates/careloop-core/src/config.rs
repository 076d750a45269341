//! Careloop configuration — collaborator credentials from the environment.
//!
//! The service is configured entirely via environment variables (the
//! deployment contract it inherited): store connection string, messaging
//! endpoint and key, SMTP credentials, calendar credential paths. Values
//! are read once at startup; empty values are tolerated and surface as
//! errors when the component is first used.

/// Root configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub messaging: MessagingConfig,
    pub mail: MailConfig,
    pub calendar: CalendarConfig,
}

/// Patient document store (MongoDB).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// `MONGODB_CONNECTION_STRING`
    pub connection_string: String,
    /// `DATABASE_NAME`
    pub database: String,
    /// `COLLECTION_NAME`
    pub collection: String,
}

/// Templated messaging provider (ADA WhatsApp API).
#[derive(Debug, Clone)]
pub struct MessagingConfig {
    /// `ADA_API_URL` — message send endpoint.
    pub api_url: String,
    /// `ADA_API_KEY` — bearer token.
    pub api_key: String,
    /// `ADA_SENDER_ID` — registered sender number.
    pub sender_id: String,
    /// Template locale sent with every message.
    pub locale: String,
}

/// SMTP mail transport.
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// `SMTP_SERVER`
    pub smtp_host: String,
    /// `SMTP_PORT`
    pub smtp_port: u16,
    /// `EMAIL_ADDRESS` — sender and login.
    pub address: String,
    /// `EMAIL_PASSWORD`
    pub password: String,
}

/// Google Calendar credentials and event defaults.
#[derive(Debug, Clone)]
pub struct CalendarConfig {
    /// `GOOGLE_CREDENTIALS_PATH` — OAuth client secrets file.
    pub credentials_path: String,
    /// `GOOGLE_TOKEN_PATH` — cached token file.
    pub token_path: String,
    /// `CALENDAR_TIMEZONE` — timezone attached to event start/end.
    pub timezone: String,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup (test seam).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        Self {
            store: StoreConfig {
                connection_string: var("MONGODB_CONNECTION_STRING", "mongodb://localhost:27017"),
                database: var("DATABASE_NAME", ""),
                collection: var("COLLECTION_NAME", ""),
            },
            messaging: MessagingConfig {
                api_url: var("ADA_API_URL", ""),
                api_key: var("ADA_API_KEY", ""),
                sender_id: var("ADA_SENDER_ID", "15557091773"),
                locale: "en".into(),
            },
            mail: MailConfig {
                smtp_host: var("SMTP_SERVER", "smtp.gmail.com"),
                smtp_port: var("SMTP_PORT", "587").parse().unwrap_or(587),
                address: var("EMAIL_ADDRESS", ""),
                password: var("EMAIL_PASSWORD", ""),
            },
            calendar: CalendarConfig {
                credentials_path: var("GOOGLE_CREDENTIALS_PATH", "credentials.json"),
                token_path: var("GOOGLE_TOKEN_PATH", "token.json"),
                timezone: var("CALENDAR_TIMEZONE", "Asia/Kolkata"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[]));
        assert_eq!(config.store.connection_string, "mongodb://localhost:27017");
        assert_eq!(config.mail.smtp_host, "smtp.gmail.com");
        assert_eq!(config.mail.smtp_port, 587);
        assert_eq!(config.messaging.sender_id, "15557091773");
        assert_eq!(config.messaging.locale, "en");
        assert_eq!(config.calendar.token_path, "token.json");
        assert!(config.messaging.api_url.is_empty());
    }

    #[test]
    fn test_env_values_win() {
        let config = AppConfig::from_lookup(lookup(&[
            ("MONGODB_CONNECTION_STRING", "mongodb://db.internal:27017"),
            ("DATABASE_NAME", "engagement"),
            ("COLLECTION_NAME", "patients"),
            ("ADA_API_URL", "https://api.example.com/v1/message"),
            ("SMTP_PORT", "2525"),
        ]));
        assert_eq!(config.store.database, "engagement");
        assert_eq!(config.store.collection, "patients");
        assert_eq!(config.messaging.api_url, "https://api.example.com/v1/message");
        assert_eq!(config.mail.smtp_port, 2525);
    }

    #[test]
    fn test_bad_port_falls_back() {
        let config = AppConfig::from_lookup(lookup(&[("SMTP_PORT", "not-a-port")]));
        assert_eq!(config.mail.smtp_port, 587);
    }
}
