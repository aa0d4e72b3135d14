use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_role_key: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub email_provider_url: Option<String>,
    pub push_provider_url: Option<String>,
    pub sms_provider_url: Option<String>,
    pub webhook_provider_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            email_provider_url: env::var("EMAIL_PROVIDER_URL").ok(),
            push_provider_url: env::var("PUSH_PROVIDER_URL").ok(),
            sms_provider_url: env::var("SMS_PROVIDER_URL").ok(),
            webhook_provider_url: env::var("WEBHOOK_PROVIDER_URL").ok(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing Supabase environment variables");
        }

        config
    }

    /// Persistence credentials required by every dispatch cycle. Absence is
    /// fatal at startup; callers refuse to serve without them.
    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_service_role_key.is_empty()
    }

    pub fn is_auth_configured(&self) -> bool {
        !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}
