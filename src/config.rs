use std::env;

/// Webhook secrets shorter than this are rejected outright.
const MIN_SECRET_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Application settings loaded from environment variables (or a .env file).
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: String,
    pub log_level: String,
    pub port: u16,

    // ServiceNow webhook
    pub servicenow_webhook_secret: String,

    // Pub/Sub
    pub gcp_project_id: String,
    pub pubsub_topic_id: String,
    pub max_retries: u32,
    pub publish_timeout_secs: f64,

    // Ops API
    pub jwt_secret: String,

    // Optional external services
    pub embedding_service_url: Option<String>,
    pub skill_extractor_url: Option<String>,
    pub notify_webhook_url: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = optional("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let environment = environment.to_lowercase();
        if !matches!(environment.as_str(), "development" | "staging" | "production") {
            return Err(ConfigError::Invalid {
                name: "ENVIRONMENT",
                reason: format!(
                    "'{}' is not one of development, staging, production",
                    environment
                ),
            });
        }

        let log_level = optional("LOG_LEVEL").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level.to_uppercase();
        if !matches!(
            log_level.as_str(),
            "DEBUG" | "INFO" | "WARNING" | "ERROR" | "CRITICAL"
        ) {
            return Err(ConfigError::Invalid {
                name: "LOG_LEVEL",
                reason: format!(
                    "'{}' is not one of DEBUG, INFO, WARNING, ERROR, CRITICAL",
                    log_level
                ),
            });
        }

        let port = optional("PORT")
            .map(|v| {
                v.parse::<u16>().map_err(|_| ConfigError::Invalid {
                    name: "PORT",
                    reason: format!("'{}' is not a port number", v),
                })
            })
            .transpose()?
            .unwrap_or(8080);

        let servicenow_webhook_secret = required("SERVICENOW_WEBHOOK_SECRET")?;
        if servicenow_webhook_secret.trim().len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "SERVICENOW_WEBHOOK_SECRET",
                reason: format!("must be at least {} characters long", MIN_SECRET_LEN),
            });
        }

        let gcp_project_id = required("GCP_PROJECT_ID")?;
        let pubsub_topic_id = required("PUBSUB_TOPIC_ID")?;

        let max_retries = optional("MAX_RETRIES")
            .map(|v| {
                v.parse::<u32>().map_err(|_| ConfigError::Invalid {
                    name: "MAX_RETRIES",
                    reason: format!("'{}' is not an integer", v),
                })
            })
            .transpose()?
            .unwrap_or(3);
        if max_retries > 10 {
            return Err(ConfigError::Invalid {
                name: "MAX_RETRIES",
                reason: "must be between 0 and 10".to_string(),
            });
        }

        let publish_timeout_secs = optional("PUBLISH_TIMEOUT")
            .map(|v| {
                v.parse::<f64>().map_err(|_| ConfigError::Invalid {
                    name: "PUBLISH_TIMEOUT",
                    reason: format!("'{}' is not a number of seconds", v),
                })
            })
            .transpose()?
            .unwrap_or(10.0);
        if publish_timeout_secs <= 0.0 {
            return Err(ConfigError::Invalid {
                name: "PUBLISH_TIMEOUT",
                reason: "must be greater than zero".to_string(),
            });
        }

        let jwt_secret = optional("JWT_SECRET").unwrap_or_else(|| "dev-only-jwt-secret".to_string());

        Ok(Settings {
            environment,
            log_level,
            port,
            servicenow_webhook_secret: servicenow_webhook_secret.trim().to_string(),
            gcp_project_id,
            pubsub_topic_id,
            max_retries,
            publish_timeout_secs,
            jwt_secret,
            embedding_service_url: optional("EMBEDDING_SERVICE_URL"),
            skill_extractor_url: optional("SKILL_EXTRACTOR_URL"),
            notify_webhook_url: optional("NOTIFY_WEBHOOK_URL"),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match optional(name) {
        Some(value) => Ok(value),
        None => Err(ConfigError::Missing(name)),
    }
}

fn optional(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Process env is shared across test threads, so everything lives in one
    // sequential test.
    #[test]
    fn settings_validate_and_default_from_env() {
        env::set_var("SERVICENOW_WEBHOOK_SECRET", "0123456789abcdef0123");
        env::set_var("GCP_PROJECT_ID", "triagedesk-dev");
        env::set_var("PUBSUB_TOPIC_ID", "ticket-events");
        env::remove_var("MAX_RETRIES");
        env::remove_var("PUBLISH_TIMEOUT");
        env::remove_var("ENVIRONMENT");
        env::remove_var("LOG_LEVEL");

        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.publish_timeout_secs, 10.0);
        assert_eq!(settings.environment, "development");
        assert_eq!(settings.log_level, "INFO");
        assert!(!settings.is_production());

        // Secret length is enforced.
        env::set_var("SERVICENOW_WEBHOOK_SECRET", "too-short");
        assert!(matches!(
            Settings::from_env().unwrap_err(),
            ConfigError::Invalid {
                name: "SERVICENOW_WEBHOOK_SECRET",
                ..
            }
        ));
        env::set_var("SERVICENOW_WEBHOOK_SECRET", "0123456789abcdef0123");

        // Retry bound is enforced.
        env::set_var("MAX_RETRIES", "11");
        assert!(matches!(
            Settings::from_env().unwrap_err(),
            ConfigError::Invalid { name: "MAX_RETRIES", .. }
        ));
        env::remove_var("MAX_RETRIES");

        // Environment vocabulary is enforced.
        env::set_var("ENVIRONMENT", "qa");
        assert!(matches!(
            Settings::from_env().unwrap_err(),
            ConfigError::Invalid { name: "ENVIRONMENT", .. }
        ));
        env::remove_var("ENVIRONMENT");
    }
}
