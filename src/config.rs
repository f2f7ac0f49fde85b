use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Only addresses under this domain may sign in through Google.
    pub allowed_email_domain: String,
    pub admin_emails: Vec<String>,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub oauth_redirect_url: String,
    pub frontend_origin: Option<String>,
    pub session_days: i64,
    pub secure_cookies: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: "sqlite://iitconnect.db".to_owned(),
            allowed_email_domain: "iitd.ac.in".to_owned(),
            admin_emails: Vec::new(),
            google_client_id: None,
            google_client_secret: None,
            oauth_redirect_url: "http://localhost:8080/lockin/google".to_owned(),
            frontend_origin: None,
            session_days: 7,
            secure_cookies: false,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        dotenv::dotenv().ok();

        let defaults = Config::default();
        Self {
            port: try_load("PORT", defaults.port),
            database_url: try_load("DATABASE_URL", defaults.database_url),
            allowed_email_domain: try_load::<String>("ALLOWED_EMAIL_DOMAIN", defaults.allowed_email_domain)
                .to_lowercase(),
            admin_emails: var("ADMIN_EMAILS")
                .map(|list| parse_email_list(&list))
                .unwrap_or_default(),
            google_client_id: var("GOOGLE_CLIENT_ID").ok(),
            google_client_secret: var("GOOGLE_CLIENT_SECRET").ok(),
            oauth_redirect_url: try_load("OAUTH_REDIRECT_URL", defaults.oauth_redirect_url),
            frontend_origin: var("FRONTEND_ORIGIN").ok(),
            session_days: try_load("SESSION_DAYS", defaults.session_days),
            secure_cookies: try_load("SECURE_COOKIES", defaults.secure_cookies),
        }
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|admin| admin.eq_ignore_ascii_case(email))
    }

    pub fn is_allowed_email(&self, email: &str) -> bool {
        email
            .rsplit_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.eq_ignore_ascii_case(&self.allowed_email_domain))
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key)
        .map_err(|_| ())
        .and_then(|v| if v.trim().is_empty() { Err(()) } else { Ok(v) })
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value: {e}, using default: {default}");
            default
        }),
        Err(()) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

pub(crate) fn parse_email_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_list_is_trimmed_and_lowercased() {
        assert_eq!(
            parse_email_list(" Dean@IITD.ac.in, ,ops@iitd.ac.in "),
            vec!["dean@iitd.ac.in".to_owned(), "ops@iitd.ac.in".to_owned()]
        );
    }

    #[test]
    fn domain_check_is_exact() {
        let config = Config::default();
        assert!(config.is_allowed_email("cs1200123@iitd.ac.in"));
        assert!(config.is_allowed_email("cs1200123@IITD.AC.IN"));
        assert!(!config.is_allowed_email("someone@gmail.com"));
        assert!(!config.is_allowed_email("x@evil-iitd.ac.in"));
        assert!(!config.is_allowed_email("@iitd.ac.in"));
        assert!(!config.is_allowed_email("iitd.ac.in"));
    }

    #[test]
    fn admin_check_ignores_case() {
        let config = Config {
            admin_emails: vec!["dean@iitd.ac.in".to_owned()],
            ..Config::default()
        };
        assert!(config.is_admin("Dean@iitd.ac.in"));
        assert!(!config.is_admin("student@iitd.ac.in"));
    }
}
