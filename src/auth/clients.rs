use oauth2::{
    basic::BasicClient, AuthUrl, ClientId, ClientSecret, EndpointNotSet, EndpointSet, RedirectUrl, TokenUrl,
};

use crate::{config::Config, AppResult};

type HappyClient = BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

pub(crate) const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[derive(Clone)]
pub struct Clients {
    pub(crate) http: reqwest::Client,
    google_client: Option<HappyClient>,
}

impl Clients {
    pub fn from_config(config: &Config) -> AppResult<Clients> {
        let google_client = match (&config.google_client_id, &config.google_client_secret) {
            (Some(client_id), Some(client_secret)) => {
                let auth_url = AuthUrl::new("https://accounts.google.com/o/oauth2/v2/auth".to_string())?;
                let token_url = TokenUrl::new("https://oauth2.googleapis.com/token".to_string())?;
                let redirect_url = RedirectUrl::new(config.oauth_redirect_url.clone())?;

                Some(
                    BasicClient::new(ClientId::new(client_id.clone()))
                    .set_client_secret(ClientSecret::new(client_secret.clone()))
                    .set_auth_uri(auth_url)
                    .set_token_uri(token_url)
                    .set_redirect_uri(redirect_url)
                )
            }
            _ => {
                tracing::warn!("GOOGLE_CLIENT_ID/GOOGLE_CLIENT_SECRET not set, Google sign-in disabled");
                None
            }
        };

        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(
            Clients {
                http,
                google_client,
            }
        )
    }

    pub fn google(&self) -> AppResult<&HappyClient> {
        self.google_client
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Google OAuth keys not supplied").into())
    }
}
