use reqwest::Url;

use crate::config::OauthSettings;
use crate::error::RepodropError;

pub const TOKEN_PARAM: &str = "token";

/// Builds the hosting service's OAuth authorize URL.
pub fn authorize_url(settings: &OauthSettings) -> Result<String, RepodropError> {
    let mut url = Url::parse(&settings.authorize_url)
        .map_err(|err| RepodropError::ConfigValue(format!("oauth.authorize_url: {err}")))?;
    url.query_pairs_mut()
        .append_pair("client_id", &settings.client_id)
        .append_pair("scope", &settings.scopes.join(","))
        .append_pair("redirect_uri", &settings.redirect_uri);
    Ok(url.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectToken {
    pub token: String,
    /// The redirect URL with the token parameter removed.
    pub cleaned_url: String,
}

/// Extracts the one-shot `token` query parameter delivered by the
/// authentication callback. Returns `None` when the URL carries no token.
pub fn token_from_redirect(redirect: &str) -> Result<Option<RedirectToken>, RepodropError> {
    let mut url = Url::parse(redirect.trim())
        .map_err(|err| RepodropError::ConfigValue(format!("redirect url: {err}")))?;

    let mut token = None;
    let mut kept = Vec::new();
    for (key, value) in url.query_pairs() {
        if key == TOKEN_PARAM {
            if token.is_none() && !value.trim().is_empty() {
                token = Some(value.trim().to_string());
            }
        } else {
            kept.push((key.into_owned(), value.into_owned()));
        }
    }

    let Some(token) = token else {
        return Ok(None);
    };

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    Ok(Some(RedirectToken {
        token,
        cleaned_url: url.to_string(),
    }))
}
