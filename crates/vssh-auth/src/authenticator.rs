// ABOUTME: Session gate: reuse a valid Vault token or run an authentication flow.
// ABOUTME: Dispatches token, userpass, LDAP and OIDC logins and persists the result.

use crate::error::{AuthError, Result};
use crate::prompt::Prompter;
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;
use vssh_config::{AuthMethod, LdapConfig, UserPassConfig, VaultConfig};
use vssh_vault::{SessionToken, TokenStore, VaultSession};

/// Parameters shared by the username/password style logins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordLogin<'c> {
    pub method: AuthMethod,
    pub mount: &'c str,
    pub username: Option<&'c str>,
    /// Prefix for prompt labels, e.g. "LDAP".
    pub label: &'static str,
}

impl<'c> PasswordLogin<'c> {
    pub fn userpass(config: &'c UserPassConfig) -> Self {
        Self {
            method: AuthMethod::UserPass,
            mount: &config.mount,
            username: non_blank(config.username.as_deref()),
            label: "",
        }
    }

    pub fn ldap(config: &'c LdapConfig) -> Self {
        Self {
            method: AuthMethod::Ldap,
            mount: &config.mount,
            username: non_blank(config.username.as_deref()),
            label: "LDAP",
        }
    }

    fn prompt_label(&self, field: &str) -> String {
        if self.label.is_empty() {
            field.to_string()
        } else {
            format!("{} {}", self.label, field)
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Drives the session state from "maybe a token on disk" to "a token the backend accepts".
pub struct Authenticator<'a, S: VaultSession, P: Prompter> {
    session: &'a mut S,
    store: &'a TokenStore,
    config: &'a VaultConfig,
    prompter: &'a P,
    env_token: Option<SessionToken>,
}

impl<'a, S: VaultSession, P: Prompter> Authenticator<'a, S, P> {
    pub fn new(
        session: &'a mut S,
        store: &'a TokenStore,
        config: &'a VaultConfig,
        prompter: &'a P,
    ) -> Self {
        Self {
            session,
            store,
            config,
            prompter,
            env_token: None,
        }
    }

    /// Use this token (from `VAULT_TOKEN`) instead of the token file.
    pub fn with_env_token(mut self, token: Option<SessionToken>) -> Self {
        self.env_token = token.filter(|t| !t.is_empty());
        self
    }

    /// Make sure the session holds a valid token, authenticating if needed.
    pub async fn ensure_authenticated(&mut self) -> Result<()> {
        if let Some(token) = self.env_token.take() {
            debug!("Using token from VAULT_TOKEN");
            self.session.set_token(token);
        } else {
            match self.store.load() {
                Ok(token) => self.session.set_token(token),
                Err(e) => debug!(error = %e, "No stored token"),
            }
        }

        if self.session.is_token_valid().await {
            info!("Using existing Vault token");
            return Ok(());
        }

        let config = self.config;
        let method = match config.auth_method {
            Some(method) => method,
            None => self.choose_method()?,
        };
        info!(%method, "Authenticating to Vault");

        let token = match method {
            AuthMethod::Token => self.token_flow().await?,
            AuthMethod::UserPass => {
                self.password_flow(PasswordLogin::userpass(&config.userpass))
                    .await?
            }
            AuthMethod::Ldap => self.password_flow(PasswordLogin::ldap(&config.ldap)).await?,
            AuthMethod::Oidc => self.oidc_flow().await?,
        };

        if let Err(e) = self.store.save(&token) {
            warn!(error = %e, "Failed to save token");
        }
        info!("Authenticated to Vault");
        Ok(())
    }

    fn choose_method(&self) -> Result<AuthMethod> {
        self.prompter.notify("Select authentication method:");
        for (i, method) in AuthMethod::ALL.iter().enumerate() {
            self.prompter.notify(&format!("  {}) {}", i + 1, method));
        }

        let answer = self.prompter.prompt_visible("Choice [1-4]")?;
        let answer = answer.trim();

        let by_number = answer
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| AuthMethod::ALL.get(i).copied());

        by_number
            .or_else(|| answer.parse().ok())
            .ok_or_else(|| AuthError::InvalidChoice(answer.to_string()))
    }

    async fn token_flow(&mut self) -> Result<SessionToken> {
        let token = SessionToken::new(self.prompter.prompt_hidden("Vault Token")?);
        if token.is_empty() {
            return Err(AuthError::EmptyCredential("token"));
        }

        self.session.set_token(token.clone());
        if !self.session.is_token_valid().await {
            return Err(AuthError::InvalidCredential);
        }
        Ok(token)
    }

    async fn password_flow(&mut self, login: PasswordLogin<'_>) -> Result<SessionToken> {
        let username = match login.username {
            Some(username) => username.to_string(),
            None => self
                .prompter
                .prompt_visible(&login.prompt_label("Username"))?
                .trim()
                .to_string(),
        };
        if username.is_empty() {
            return Err(AuthError::EmptyCredential("username"));
        }

        let password = self
            .prompter
            .prompt_hidden(&login.prompt_label("Password"))?;
        if password.trim().is_empty() {
            return Err(AuthError::EmptyCredential("password"));
        }

        debug!(method = %login.method, mount = login.mount, %username, "Logging in");
        let token = self
            .session
            .login(login.mount, &username, json!({ "password": password }))
            .await
            .map_err(|e| AuthError::Login {
                method: login.method,
                source: e,
            })?;

        self.session.set_token(token.clone());
        Ok(token)
    }

    async fn oidc_flow(&mut self) -> Result<SessionToken> {
        let config = self.config;
        let oidc = &config.oidc;
        let role = non_blank(oidc.role.as_deref()).ok_or(AuthError::MissingRole)?;

        let challenge = self
            .session
            .oidc_auth_url(&oidc.mount, role, &oidc.redirect_uri)
            .await
            .map_err(AuthError::NoAuthUrl)?;

        self.prompter
            .notify("Open the following URL in your browser to sign in:");
        self.prompter.notify(&format!("\n  {}\n", challenge.auth_url));
        self.prompter.notify(
            "After signing in, paste the authorization code (or the full redirect URL) below.",
        );

        let answer = self.prompter.prompt_visible("Authorization code")?;
        let (code, pasted_state) = authorization_code(&answer);
        if code.is_empty() {
            return Err(AuthError::EmptyCredential("authorization code"));
        }
        let state = pasted_state.or(challenge.state);

        let token = self
            .session
            .oidc_callback(&oidc.mount, &code, state.as_deref())
            .await
            .map_err(|e| AuthError::Login {
                method: AuthMethod::Oidc,
                source: e,
            })?;

        self.session.set_token(token.clone());
        Ok(token)
    }
}

/// Accept either a bare code or the redirect URL carrying `code` and `state`.
fn authorization_code(answer: &str) -> (String, Option<String>) {
    let answer = answer.trim();
    if let Ok(url) = Url::parse(answer) {
        let mut code = None;
        let mut state = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                _ => {}
            }
        }
        if let Some(code) = code {
            return (code.trim().to_string(), state);
        }
    }
    (answer.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_labels() {
        let userpass = UserPassConfig::default();
        let ldap = LdapConfig::default();
        assert_eq!(PasswordLogin::userpass(&userpass).prompt_label("Username"), "Username");
        assert_eq!(PasswordLogin::ldap(&ldap).prompt_label("Password"), "LDAP Password");
    }

    #[test]
    fn test_password_login_defaults() {
        let userpass = UserPassConfig::default();
        let ldap = LdapConfig {
            username: Some("  ".to_string()),
            ..LdapConfig::default()
        };
        let login = PasswordLogin::userpass(&userpass);
        assert_eq!(login.mount, "userpass");
        assert_eq!(login.username, None);

        let login = PasswordLogin::ldap(&ldap);
        assert_eq!(login.mount, "ldap");
        assert_eq!(login.username, None, "blank username means prompt");
    }

    #[test]
    fn test_authorization_code_bare() {
        assert_eq!(authorization_code("  abc123 \n"), ("abc123".to_string(), None));
        assert_eq!(authorization_code("   "), (String::new(), None));
    }

    #[test]
    fn test_authorization_code_from_redirect_url() {
        let (code, state) =
            authorization_code("http://localhost:8250/oidc/callback?code=xyz&state=st_9");
        assert_eq!(code, "xyz");
        assert_eq!(state.as_deref(), Some("st_9"));
    }

    #[test]
    fn test_authorization_code_url_without_code_is_taken_verbatim() {
        let (code, state) = authorization_code("http://localhost:8250/oidc/callback");
        assert_eq!(code, "http://localhost:8250/oidc/callback");
        assert_eq!(state, None);
    }
}
