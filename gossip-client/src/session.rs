//! SessionManager - authentication lifecycle and presence.
//!
//! Lifecycle decisions come from the pure [`gossip_core::SessionState`]
//! machine; this module performs the resulting actions (token storage,
//! channel open/close, notices).
//!
//! Credential flows run over short-lived anonymous channels that are closed
//! whatever the outcome. Only a verified token opens the long-lived channel.

use gossip_core::{Action, Event, Notice, ResendCooldown, Session};
use gossip_types::requests::{
    CheckAuth, ForgotPassword, GetOnlineFriends, Login, Logout, Register, ResendOtp,
    ResetPassword, UpdateProfile, VerifyOtp, VerifyResetOtp,
};
use gossip_types::{Identity, User, UserId, WireError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::channel::ChannelProvider;
use crate::error::ClientError;
use crate::notify::{Notifier, Topic};
use crate::storage::{KeyValueStore, TOKEN_KEY};
use crate::transport::Connector;

/// Session state shared by every store.
pub type SharedSession = Arc<Mutex<Session>>;

/// Own user id, or [`ClientError::NotAuthenticated`].
pub(crate) async fn require_self(session: &Mutex<Session>) -> Result<UserId, ClientError> {
    session
        .lock()
        .await
        .self_id()
        .cloned()
        .ok_or(ClientError::NotAuthenticated)
}

/// Authentication lifecycle, presence roster and forced termination.
pub struct SessionManager<C: Connector> {
    provider: Arc<ChannelProvider<C>>,
    storage: Arc<dyn KeyValueStore>,
    notifier: Notifier,
    session: SharedSession,
    cooldown: Mutex<ResendCooldown>,
}

impl<C: Connector> SessionManager<C> {
    /// Create a manager with no session.
    pub fn new(
        provider: Arc<ChannelProvider<C>>,
        storage: Arc<dyn KeyValueStore>,
        notifier: Notifier,
        resend_cooldown: Duration,
    ) -> Self {
        Self {
            provider,
            storage,
            notifier,
            session: Arc::new(Mutex::new(Session::new())),
            cooldown: Mutex::new(ResendCooldown::new(resend_cooldown)),
        }
    }

    /// Handle to the shared session state.
    pub fn shared(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    /// Snapshot of the session.
    pub async fn snapshot(&self) -> Session {
        self.session.lock().await.clone()
    }

    /// Own identity, when authenticated.
    pub async fn identity(&self) -> Option<Identity> {
        self.session.lock().await.identity().cloned()
    }

    /// Whether a session exists.
    pub async fn is_authenticated(&self) -> bool {
        self.session.lock().await.state().is_authenticated()
    }

    /// Open the authenticated channel with `token`.
    ///
    /// Without a token nothing happens. A failed connect tears the session
    /// down like a forced logout.
    pub async fn connect(&self, token: Option<&str>) -> Result<(), ClientError> {
        let Some(token) = token else {
            debug!("no token, staying unauthenticated");
            return Ok(());
        };
        if let Err(e) = self.provider.open(token).await {
            warn!(error = %e, "failed to open authenticated channel");
            self.terminate(Event::TransportLost {
                error: e.to_string(),
            })
            .await;
            return Err(e);
        }
        Ok(())
    }

    /// Restore the session from the persisted token.
    ///
    /// Returns `None` when there is no token or the server rejected it; in
    /// the latter case the token is cleared and an expiry notice emitted.
    pub async fn restore_session(&self) -> Result<Option<Identity>, ClientError> {
        let Some(token) = self.storage.get(TOKEN_KEY).await? else {
            debug!("no persisted token");
            return Ok(None);
        };

        self.apply(Event::BootstrapStarted).await?;
        self.connect(Some(&token)).await?;

        match self.provider.call(&CheckAuth).await {
            Ok(response) => {
                self.apply(Event::Restored {
                    identity: response.user,
                })
                .await?;
                info!("session restored");
                Ok(self.identity().await)
            }
            Err(e) => {
                warn!(error = %e, "bootstrap check failed");
                self.apply(Event::BootstrapFailed).await?;
                Ok(None)
            }
        }
    }

    /// Log in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, ClientError> {
        self.begin_credentials().await?;
        let request = Login {
            email: email.to_string(),
            password: password.to_string(),
        };
        let identity = match self.provider.one_shot(&request).await {
            Ok(response) => self.complete(response.user).await?,
            Err(e) => return Err(self.reject(e).await),
        };
        self.notifier.notice(Notice::success("Logged in Successfully"));
        Ok(identity)
    }

    /// Create an account; an OTP is emailed for verification.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserId, ClientError> {
        let request = Register {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self.one_shot_reported(&request).await?;
        self.session
            .lock()
            .await
            .set_pending_user(Some(response.user_id.clone()));
        self.cooldown.lock().await.start(Instant::now());
        self.notifier
            .notice(Notice::success("OTP sent to your email. Please verify."));
        Ok(response.user_id)
    }

    /// Verify a registration OTP; on success the session starts.
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<Identity, ClientError> {
        self.begin_credentials().await?;
        let request = VerifyOtp {
            email: email.to_string(),
            otp: otp.to_string(),
        };
        let identity = match self.provider.one_shot(&request).await {
            Ok(response) => self.complete(response.user).await?,
            Err(e) => return Err(self.reject(e).await),
        };
        self.session.lock().await.set_pending_user(None);
        self.cooldown.lock().await.reset();
        self.notifier
            .notice(Notice::success("Account verified successfully!"));
        Ok(identity)
    }

    /// Request a password-reset OTP.
    pub async fn forgot_password(&self, email: &str) -> Result<(), ClientError> {
        let request = ForgotPassword {
            email: email.to_string(),
        };
        self.one_shot_reported(&request).await?;
        self.cooldown.lock().await.start(Instant::now());
        self.notifier
            .notice(Notice::success("OTP sent to your email for password reset."));
        Ok(())
    }

    /// Check a password-reset OTP.
    pub async fn verify_reset_otp(&self, email: &str, otp: &str) -> Result<(), ClientError> {
        let request = VerifyResetOtp {
            email: email.to_string(),
            otp: otp.to_string(),
        };
        self.one_shot_reported(&request).await?;
        self.notifier.notice(Notice::success(
            "OTP verified! You can now reset your password.",
        ));
        Ok(())
    }

    /// Set a new password after a verified reset OTP.
    pub async fn reset_password(&self, email: &str, new_password: &str) -> Result<(), ClientError> {
        let request = ResetPassword {
            email: email.to_string(),
            new_password: new_password.to_string(),
        };
        self.one_shot_reported(&request).await?;
        self.cooldown.lock().await.reset();
        self.notifier.notice(Notice::success(
            "Password reset successfully! Please login again.",
        ));
        Ok(())
    }

    /// Ask for another OTP email, gated by the cooldown.
    pub async fn resend_otp(&self, email: &str) -> Result<(), ClientError> {
        if let Err(e) = self.cooldown.lock().await.check(Instant::now()) {
            let error = ClientError::from(e);
            self.notifier.failure(&error);
            return Err(error);
        }
        let request = ResendOtp {
            email: email.to_string(),
        };
        self.one_shot_reported(&request).await?;
        self.cooldown.lock().await.start(Instant::now());
        self.notifier.notice(Notice::success("OTP resent to your email."));
        Ok(())
    }

    /// Seconds until another OTP may be requested.
    pub async fn resend_remaining(&self) -> Duration {
        self.cooldown.lock().await.remaining(Instant::now())
    }

    /// Log out. The session is torn down whatever the server answers.
    pub async fn logout(&self) -> Result<(), ClientError> {
        if self.provider.current().await.is_some() {
            if let Err(e) = self.provider.call(&Logout {}).await {
                debug!(error = %e, "logout request failed, tearing down anyway");
            }
        }
        self.apply(Event::LogoutRequested).await?;
        self.notifier.notice(Notice::success("Logged Out Successfully"));
        info!("logged out");
        Ok(())
    }

    /// Change own name and/or avatar.
    pub async fn update_profile(
        &self,
        name: Option<String>,
        profile_pic: Option<String>,
    ) -> Result<Identity, ClientError> {
        let user_id = require_self(&self.session).await?;
        let request = UpdateProfile {
            user_id,
            name,
            profile_pic,
        };
        let response = match self.provider.call(&request).await {
            Ok(response) => response,
            Err(e) => {
                self.notifier.failure(&e);
                return Err(e);
            }
        };
        self.apply(Event::ProfileUpdated {
            identity: response.user,
        })
        .await?;
        self.notifier
            .notice(Notice::success("Profile Updated Successfully"));
        self.identity().await.ok_or(ClientError::SessionTerminated)
    }

    /// Refresh the listing of friends that are online.
    pub async fn load_online_friends(&self) -> Result<Vec<User>, ClientError> {
        let response = match self.provider.call(&GetOnlineFriends {}).await {
            Ok(response) => response,
            Err(e) => {
                self.notifier.failure(&e);
                return Err(e);
            }
        };
        self.session
            .lock()
            .await
            .set_online_friends(response.friends.clone());
        self.notifier.changed(Topic::Roster);
        Ok(response.friends)
    }

    /// Replace the presence roster.
    pub async fn set_roster(&self, ids: Vec<UserId>) {
        self.session.lock().await.set_roster(ids);
        self.notifier.changed(Topic::Roster);
    }

    /// End the session because of a server push or a lost transport.
    pub async fn terminate(&self, event: Event) {
        if let Err(e) = self.apply(event).await {
            warn!(error = %e, "error during session teardown");
        }
    }

    /// Leave any previous session before a fresh credential exchange.
    async fn begin_credentials(&self) -> Result<(), ClientError> {
        if self.is_authenticated().await {
            self.apply(Event::LogoutRequested).await?;
        }
        self.apply(Event::CredentialsSubmitted).await
    }

    async fn complete(&self, identity: Identity) -> Result<Identity, ClientError> {
        let Some(token) = identity.token.clone() else {
            let error = ClientError::Wire(WireError::InvalidData(
                "authentication response carried no token".into(),
            ));
            return Err(self.reject(error).await);
        };
        self.apply(Event::Verified { identity, token }).await?;
        info!("session started");
        self.identity().await.ok_or(ClientError::SessionTerminated)
    }

    async fn reject(&self, error: ClientError) -> ClientError {
        if let Err(e) = self
            .apply(Event::Rejected {
                error: error.to_string(),
            })
            .await
        {
            warn!(error = %e, "error while rejecting credentials");
        }
        error
    }

    async fn one_shot_reported<R: gossip_types::Call>(
        &self,
        request: &R,
    ) -> Result<R::Response, ClientError> {
        self.provider.one_shot(request).await.map_err(|e| {
            self.notifier.failure(&e);
            e
        })
    }

    /// Feed the state machine and carry out its actions.
    async fn apply(&self, event: Event) -> Result<(), ClientError> {
        let actions = self.session.lock().await.apply(event);
        if actions.is_empty() {
            return Ok(());
        }
        let result = self.execute(actions).await;
        self.notifier.changed(Topic::Session);
        result
    }

    async fn execute(&self, actions: Vec<Action>) -> Result<(), ClientError> {
        let mut queue = VecDeque::from(actions);
        let mut failure = None;
        while let Some(action) = queue.pop_front() {
            match action {
                Action::PersistToken { token } => {
                    if let Err(e) = self.storage.set(TOKEN_KEY, &token).await {
                        warn!(error = %e, "failed to persist token");
                        failure = Some(self.abandon(&mut queue, e.into()).await);
                    }
                }
                Action::ClearToken => {
                    if let Err(e) = self.storage.remove(TOKEN_KEY).await {
                        warn!(error = %e, "failed to clear persisted token");
                    }
                }
                Action::OpenChannel { token } => {
                    if let Err(e) = self.provider.open(&token).await {
                        warn!(error = %e, "failed to open authenticated channel");
                        failure = Some(self.abandon(&mut queue, e).await);
                    }
                }
                Action::CloseChannel => self.provider.close().await,
                Action::ClearRoster => self.notifier.changed(Topic::Roster),
                Action::Notify(notice) => self.notifier.notice(notice),
            }
        }
        failure.map_or(Ok(()), Err)
    }

    /// Drop the remaining actions and queue a teardown in their place.
    ///
    /// An authenticated state must never outlive a half-finished start.
    async fn abandon(&self, queue: &mut VecDeque<Action>, error: ClientError) -> ClientError {
        queue.clear();
        let teardown = self.session.lock().await.apply(Event::TransportLost {
            error: error.to_string(),
        });
        queue.extend(teardown);
        error
    }
}
