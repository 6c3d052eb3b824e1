use async_trait::async_trait;
use log::{info, warn};
use retreat_shared::models::{obscure_password, AuthMethod};
use retreat_shared::session::Session;
use std::sync::Arc;
use thiserror::Error;

use crate::api::{AccountInfo, NewAccount, ProvisionAccount, RecordStoreApi};
use crate::error::ClientError;
use crate::session::{SessionManager, SessionStorage, StorageError};

pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Please fill in {0}.")]
    MissingField(&'static str),

    #[error("Passwords do not match.")]
    PasswordMismatch,

    #[error("Password must be at least 6 characters.")]
    PasswordTooShort,

    #[error("An account with this email already exists. Please sign in instead.")]
    AccountExists,

    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("Sign-in provider rejected the credential: {0}")]
    Provider(String),

    #[error(transparent)]
    Api(#[from] ClientError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What the user presented at sign-in.
#[derive(Debug, Clone)]
pub enum Credential {
    EmailPassword { email: String, password: String },
    Google { id_token: String },
    Phone { phone: String, code: String },
}

/// A verified person. `user_id` and `token` are only known once an account was
/// matched, which password sign-in does in the same step.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub method: AuthMethod,
    pub token: Option<String>,
    /// Provider ID token the service verifies before provisioning
    pub proof: Option<String>,
}

/// External verifier for federated and SMS sign-in.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_google(&self, id_token: &str) -> Result<Identity, AuthError>;
    async fn verify_phone(&self, phone: &str, code: &str) -> Result<Identity, AuthError>;
}

#[derive(Debug, Clone)]
pub struct SignUp {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: String,
    pub confirm_password: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct Authenticator<A, P, S> {
    api: Arc<A>,
    provider: P,
    sessions: SessionManager<S>,
}

impl<A, P, S> Authenticator<A, P, S>
where
    A: RecordStoreApi,
    P: IdentityProvider,
    S: SessionStorage,
{
    pub fn new(api: Arc<A>, provider: P, sessions: SessionManager<S>) -> Self {
        Self {
            api,
            provider,
            sessions,
        }
    }

    pub async fn authenticate(&self, credential: &Credential) -> Result<Identity, AuthError> {
        match credential {
            Credential::EmailPassword { email, password } => {
                let email = email.trim();
                if email.is_empty() {
                    return Err(AuthError::MissingField("your email"));
                }
                if password.is_empty() {
                    return Err(AuthError::MissingField("your password"));
                }

                let account = self
                    .api
                    .authenticate_user(email, &obscure_password(password))
                    .await
                    .map_err(|e| match e {
                        ClientError::Unauthenticated(_) => AuthError::InvalidCredentials,
                        other => AuthError::Api(other),
                    })?;

                Ok(Identity {
                    user_id: Some(account.user_id),
                    name: account.name,
                    email: account.email,
                    phone: account.phone,
                    method: AuthMethod::Email,
                    token: account.token,
                    proof: None,
                })
            }
            Credential::Google { id_token } => self.provider.verify_google(id_token).await,
            Credential::Phone { phone, code } => {
                if phone.trim().is_empty() {
                    return Err(AuthError::MissingField("your phone number"));
                }
                self.provider.verify_phone(phone.trim(), code.trim()).await
            }
        }
    }

    /// Finds or creates the account behind a verified identity.
    pub async fn provision(&self, identity: &Identity) -> Result<AccountInfo, AuthError> {
        if let (Some(user_id), Some(token)) = (&identity.user_id, &identity.token) {
            return Ok(AccountInfo {
                user_id: user_id.clone(),
                name: identity.name.clone(),
                email: identity.email.clone(),
                phone: identity.phone.clone(),
                token: Some(token.clone()),
                created: Some(false),
            });
        }

        if identity.method == AuthMethod::Email {
            return Err(AuthError::InvalidCredentials);
        }

        let proof = identity
            .proof
            .clone()
            .ok_or_else(|| AuthError::Provider("no sign-in token from the provider".into()))?;

        let account = self
            .api
            .provision_user(&ProvisionAccount {
                name: identity.name.clone(),
                auth_method: identity.method,
                proof,
            })
            .await
            .map_err(|e| match e {
                ClientError::Unauthenticated(message) => AuthError::Provider(message),
                ClientError::Conflict(_) => AuthError::AccountExists,
                other => AuthError::Api(other),
            })?;

        if account.created == Some(true) {
            info!("Created account {} via {}", account.user_id, identity.method);
        }
        Ok(account)
    }

    pub async fn sign_in(&self, credential: &Credential) -> Result<Session, AuthError> {
        let identity = self.authenticate(credential).await?;
        let account = self.provision(&identity).await?;
        self.start_session(account, identity.method).await
    }

    pub async fn sign_up(&self, request: SignUp) -> Result<Session, AuthError> {
        let name = request.name.trim().to_string();
        let email = non_empty(request.email);
        let phone = non_empty(request.phone);

        if name.is_empty() {
            return Err(AuthError::MissingField("your name"));
        }
        if email.is_none() && phone.is_none() {
            return Err(AuthError::MissingField("your email or phone number"));
        }
        if request.password != request.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }
        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::PasswordTooShort);
        }

        if let Some(email) = &email {
            if self.api.check_user(email).await? {
                return Err(AuthError::AccountExists);
            }
        }

        let account = self
            .api
            .create_user(&NewAccount {
                name,
                email,
                phone,
                password: obscure_password(&request.password),
            })
            .await
            .map_err(|e| match e {
                ClientError::Conflict(_) => AuthError::AccountExists,
                other => AuthError::Api(other),
            })?;

        self.start_session(account, AuthMethod::Email).await
    }

    /// Picks up a stored session and hands its token to the API client.
    pub async fn restore(&self) -> Option<Session> {
        let session = self.sessions.load()?;
        self.api.set_session_token(session.token.clone()).await;
        Some(session)
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.api.set_session_token(None).await;
        self.sessions.sign_out()?;
        Ok(())
    }

    async fn start_session(
        &self,
        account: AccountInfo,
        method: AuthMethod,
    ) -> Result<Session, AuthError> {
        if account.token.is_none() {
            warn!("No session token issued for {}", account.user_id);
        }

        let mut session = Session::start(
            account.user_id,
            account.name,
            account.email,
            account.phone,
            method,
        );
        session.token = account.token;

        self.api.set_session_token(session.token.clone()).await;
        self.sessions.save(&session)?;
        info!("User {} signed in with {}", session.user_id, method);
        Ok(session)
    }
}
