//! Authorization initiation.

use super::OAuthService;
use crate::{
    audit::AuditEvent,
    errors::{OAuthError, Result},
    traits::{SessionManager, UserStore},
    types::{AuthorizationRedirect, InitiateRequest, PendingAuthorization},
};
use tracing::{info, warn};
use zero_link_crypto::{generate_pkce_pair, generate_state, hash_for_log};
use zero_link_policy::OAuthEndpoint;
use zero_link_storage::Storage;

impl<S, U, M> OAuthService<S, U, M>
where
    S: Storage + 'static,
    U: UserStore,
    M: SessionManager,
{
    /// Start an authorization flow at `current_time`
    pub async fn initiate_at(
        &self,
        request: InitiateRequest,
        current_time: u64,
    ) -> Result<AuthorizationRedirect> {
        self.enforce_rate_limit(OAuthEndpoint::Initiate, &request.client_addr, current_time)
            .await?;

        let provider = self.registry.provider(&request.provider).map_err(|error| {
            let error = OAuthError::from(error);
            if matches!(error, OAuthError::ProviderDisabled(_)) {
                warn!(provider = %request.provider, "Authorization requested for a disabled provider");
            }
            error
        })?;

        let pkce = generate_pkce_pair()?;
        let state = generate_state()?;
        let authorization_url = provider.build_auth_url(&state, &pkce.challenge)?;

        let record = PendingAuthorization {
            code_verifier: pkce.verifier,
            provider: request.provider.clone(),
            intent: request.intent,
            created_at: current_time,
            expires_at: current_time + self.config.pending_ttl,
        };
        self.pending.insert(&state, &record).await?;

        info!(
            provider = %request.provider,
            intent = request.intent.as_str(),
            state = %hash_for_log(state.as_bytes()),
            "Authorization initiated"
        );
        self.audit(AuditEvent::AuthorizationInitiated {
            provider: request.provider,
            intent: request.intent.as_str(),
            client_addr: request.client_addr,
        })
        .await;

        Ok(AuthorizationRedirect {
            authorization_url,
            expires_at: record.expires_at,
        })
    }

    /// Count one request against `endpoint`; audit and fail when over the limit
    pub(super) async fn enforce_rate_limit(
        &self,
        endpoint: OAuthEndpoint,
        client_addr: &str,
        current_time: u64,
    ) -> Result<()> {
        match self.rate_limits.check(endpoint, client_addr, current_time) {
            Ok(_) => Ok(()),
            Err(error) => {
                let error = OAuthError::from(error);
                if let OAuthError::RateLimited {
                    retry_after_seconds,
                } = error
                {
                    self.audit(AuditEvent::RateLimitExceeded {
                        endpoint: endpoint.as_str(),
                        client_addr: client_addr.to_string(),
                        retry_after_seconds,
                    })
                    .await;
                }
                Err(error)
            }
        }
    }
}
