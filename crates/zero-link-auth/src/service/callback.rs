//! Provider callback handling and manual-link completion.

use super::OAuthService;
use crate::{
    audit::AuditEvent,
    errors::{OAuthError, Result},
    linker::LinkOutcome,
    traits::{SessionManager, UserStore},
    types::{CallbackOutcome, CallbackRequest, Intent},
};
use tracing::{error, info, warn};
use uuid::Uuid;
use zero_link_policy::OAuthEndpoint;
use zero_link_storage::Storage;

impl<S, U, M> OAuthService<S, U, M>
where
    S: Storage + 'static,
    U: UserStore,
    M: SessionManager,
{
    /// Process a provider callback at `current_time`.
    ///
    /// The pending authorization is consumed before any provider call, so a
    /// state token is never usable twice, whatever happens afterwards.
    pub async fn handle_callback_at(
        &self,
        request: CallbackRequest,
        current_time: u64,
    ) -> Result<CallbackOutcome> {
        self.enforce_rate_limit(OAuthEndpoint::Callback, &request.client_addr, current_time)
            .await?;

        let provider = request.provider.clone();
        let client_addr = request.client_addr.clone();

        match self.process_callback(request, current_time).await {
            Ok(outcome) => {
                self.audit_success(&outcome).await;
                Ok(outcome)
            }
            Err(error) => {
                log_callback_failure(&provider, &error);
                self.audit(AuditEvent::LoginFailed {
                    provider,
                    reason: error.code(),
                    client_addr: Some(client_addr),
                })
                .await;
                Err(error)
            }
        }
    }

    async fn process_callback(
        &self,
        request: CallbackRequest,
        current_time: u64,
    ) -> Result<CallbackOutcome> {
        if let Some(error) = request.error {
            return Err(OAuthError::AuthorizationDenied {
                error,
                description: request.error_description,
            });
        }

        let identity_provider = self.registry.provider(&request.provider)?;

        let state = request
            .state
            .as_deref()
            .filter(|state| !state.is_empty())
            .ok_or(OAuthError::InvalidOrExpiredState)?;
        let pending = self
            .pending
            .consume(state, &request.provider, current_time)
            .await?;

        if let Intent::Link { user_id } = pending.intent {
            if request.session_user != Some(user_id) {
                warn!(
                    provider = %request.provider,
                    %user_id,
                    "Security: link callback delivered outside the initiating session"
                );
                return Err(OAuthError::InvalidOrExpiredState);
            }
        }

        let code = request
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| {
                OAuthError::TokenExchangeFailed("callback carried no authorization code".into())
            })?;

        let issued = identity_provider
            .exchange_code(code, &pending.code_verifier)
            .await?;
        let profile = identity_provider.fetch_profile(&issued.access_token).await?;

        let outcome = self
            .linker
            .resolve(
                &request.provider,
                &profile,
                &issued,
                pending.intent,
                current_time,
            )
            .await?;

        self.finish(outcome, pending.intent).await
    }

    /// Finish a login paused with `ManualLinkRequired` at `current_time`
    pub async fn complete_manual_link_at(
        &self,
        ticket: &str,
        user_id: Uuid,
        current_time: u64,
    ) -> Result<CallbackOutcome> {
        let outcome = self
            .linker
            .complete_manual_link(ticket, user_id, current_time)
            .await?;
        let outcome = self.finish(outcome, Intent::Login).await?;
        self.audit_success(&outcome).await;
        Ok(outcome)
    }

    /// Email of the account an unexpired manual-link ticket waits on.
    ///
    /// The ticket stays valid; callers check it before asking for a password.
    pub async fn manual_link_email_at(&self, ticket: &str, current_time: u64) -> Result<String> {
        let record = self.pending.peek_manual_link(ticket, current_time).await?;
        record
            .profile
            .email
            .ok_or(OAuthError::InvalidManualLinkTicket)
    }

    /// Count one password check from `client_addr`
    pub async fn throttle_credentials_at(
        &self,
        client_addr: &str,
        current_time: u64,
    ) -> Result<()> {
        self.enforce_rate_limit(OAuthEndpoint::Credentials, client_addr, current_time)
            .await
    }

    /// Establish a session for logins.
    ///
    /// A login that cannot get a session does not keep an identity it just
    /// created, so retrying starts from a clean slate.
    async fn finish(&self, outcome: LinkOutcome, intent: Intent) -> Result<CallbackOutcome> {
        let session = match intent {
            Intent::Login => match self.sessions.establish_session(outcome.user_id).await {
                Ok(session) => Some(session),
                Err(error) => {
                    if outcome.new_identity {
                        let discarded = self.linker.discard_new(&outcome.identity).await;
                        if let Err(discard_error) = discarded {
                            error!(
                                identity_id = %outcome.identity.identity_id,
                                error = %discard_error,
                                "Failed to discard identity after session failure"
                            );
                        }
                    }
                    return Err(error);
                }
            },
            Intent::Link { .. } => None,
        };

        Ok(CallbackOutcome {
            user_id: outcome.user_id,
            identity: outcome.identity,
            intent,
            created_user: outcome.created_user,
            auto_linked: outcome.auto_linked,
            new_identity: outcome.new_identity,
            session,
        })
    }

    async fn audit_success(&self, outcome: &CallbackOutcome) {
        let provider = outcome.identity.provider.clone();
        let identity_id = outcome.identity.identity_id;

        if outcome.new_identity {
            self.audit(AuditEvent::IdentityLinked {
                provider: provider.clone(),
                user_id: outcome.user_id,
                identity_id,
            })
            .await;
        }

        if let Intent::Login = outcome.intent {
            info!(%provider, user_id = %outcome.user_id, created_user = outcome.created_user, "Login succeeded");
            self.audit(AuditEvent::LoginSucceeded {
                provider,
                user_id: outcome.user_id,
                identity_id,
                created_user: outcome.created_user,
                auto_linked: outcome.auto_linked,
            })
            .await;
        }
    }
}

fn log_callback_failure(provider: &str, error: &OAuthError) {
    match error {
        OAuthError::InvalidOrExpiredState => {
            warn!(provider, "Security: callback with invalid, expired or replayed state");
        }
        OAuthError::AuthorizationDenied { error, .. } => {
            info!(provider, provider_error = %error, "User denied authorization");
        }
        OAuthError::UnknownProvider(_) | OAuthError::ProviderDisabled(_) => {
            warn!(provider, "Callback for an unknown or disabled provider");
        }
        error if error.is_internal() => {
            error!(provider, error = %error, "Callback failed");
        }
        error => {
            info!(provider, code = error.code(), error = %error, "Callback failed");
        }
    }
}
