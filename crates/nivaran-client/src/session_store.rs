use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use nivaran_gateway::{AuthGateway, GatewayError, ProfileGateway};
use nivaran_types::api::{AuthUser, SignUpProfile};
use nivaran_types::events::AuthEvent;
use nivaran_types::models::{Role, UserProfile};

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, Default)]
struct Snapshot {
    user: Option<AuthUser>,
    profile: Option<UserProfile>,
}

/// The signed-in identity and its profile, shared read-only by every
/// component. Readers take a fresh snapshot at each point of use.
#[derive(Clone)]
pub struct SessionStore {
    auth: Arc<dyn AuthGateway>,
    profiles: Arc<dyn ProfileGateway>,
    state: Arc<RwLock<Snapshot>>,
}

impl SessionStore {
    pub fn new<G>(gateway: Arc<G>) -> Self
    where
        G: AuthGateway + ProfileGateway + 'static,
    {
        Self {
            auth: gateway.clone(),
            profiles: gateway,
            state: Arc::new(RwLock::new(Snapshot::default())),
        }
    }

    fn snapshot(&self) -> Snapshot {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn apply(&self, user: Option<AuthUser>, profile: Option<UserProfile>) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        *state = Snapshot { user, profile };
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.snapshot().user
    }

    /// `None` while signed out, or when the account has no profile yet.
    pub fn current_profile(&self) -> Option<UserProfile> {
        self.snapshot().profile
    }

    pub fn role(&self) -> Option<Role> {
        self.snapshot().profile.map(|p| p.role)
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot().user.is_some()
    }

    pub fn is_donor(&self) -> bool {
        self.role() == Some(Role::Donor)
    }

    pub fn is_ngo(&self) -> bool {
        self.role() == Some(Role::Ngo)
    }

    /// Whether the signed-in account can skip the profile form.
    pub fn is_profile_complete(&self) -> bool {
        self.snapshot().profile.as_ref().is_some_and(profile_complete)
    }

    pub fn require_user(&self) -> ClientResult<AuthUser> {
        self.current_user()
            .ok_or_else(|| ClientError::Unauthorized("sign in required".into()))
    }

    /// The profile, or an error telling the caller what is missing.
    pub fn require_profile(&self) -> ClientResult<UserProfile> {
        let snapshot = self.snapshot();
        if snapshot.user.is_none() {
            return Err(ClientError::Unauthorized("sign in required".into()));
        }
        snapshot
            .profile
            .ok_or_else(|| ClientError::NotFound("profile not completed".into()))
    }

    /// Re-read the gateway's auth state and load the matching profile.
    pub async fn refresh(&self) -> ClientResult<Option<UserProfile>> {
        let Some(user) = self.auth.current_user() else {
            self.apply(None, None);
            return Ok(None);
        };

        let profile = match self.profiles.get_user(user.id).await {
            Ok(profile) => Some(profile),
            Err(GatewayError::NotFound(_)) => {
                debug!("No profile yet for {}", user.id);
                None
            }
            Err(e) => {
                warn!("Failed to load profile for {}: {}", user.id, e);
                self.apply(Some(user), None);
                return Err(e.into());
            }
        };

        self.apply(Some(user), profile.clone());
        Ok(profile)
    }

    /// Spawn the task that keeps this store in step with auth events.
    pub fn listen(&self) -> JoinHandle<()> {
        let mut events = self.auth.auth_events();
        let store = self.clone();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(AuthEvent::SignedIn(user)) => {
                        debug!("Auth event: signed in as {}", user.email);
                        let _ = store.refresh().await;
                    }
                    Ok(AuthEvent::SignedOut) => {
                        debug!("Auth event: signed out");
                        store.apply(None, None);
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Session store missed {} auth events, refreshing", n);
                        let _ = store.refresh().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub async fn sign_up(&self, email: &str, password: &str, profile: SignUpProfile) -> ClientResult<Option<UserProfile>> {
        let outcome = self.auth.sign_up(email, password, profile).await?;
        if outcome.profile.is_none() {
            warn!("Signed up {} without a profile", outcome.user.email);
        }
        info!("Signed up as {}", outcome.user.email);
        self.refresh().await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> ClientResult<Option<UserProfile>> {
        let user = self.auth.sign_in(email, password).await?;
        info!("Signed in as {}", user.email);
        self.refresh().await
    }

    pub async fn restore(&self, access_token: &str) -> ClientResult<Option<UserProfile>> {
        self.auth.restore_session(access_token).await?;
        self.refresh().await
    }

    pub async fn sign_out(&self) -> ClientResult<()> {
        self.auth.sign_out().await?;
        self.apply(None, None);
        Ok(())
    }

    pub async fn update_password(&self, new_password: &str) -> ClientResult<()> {
        Ok(self.auth.update_password(new_password).await?)
    }
}

/// An explicit `profile_completed` flag wins. Otherwise name and phone must
/// be non-blank and both city and state present.
fn profile_complete(profile: &UserProfile) -> bool {
    if let Some(flag) = profile.profile_completed {
        return flag;
    }
    let filled = |v: Option<&str>| v.is_some_and(|v| !v.trim().is_empty());
    filled(Some(&profile.name)) && filled(profile.phone.as_deref()) && profile.city.is_some() && profile.state.is_some()
}
