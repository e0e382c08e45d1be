//! Server writes followed by the cache refreshes they require.
//!
//! The stores never watch mutations themselves; every write here ends by
//! force-refreshing the collections it can have changed.

use crate::api::types::validate_images;
use crate::api::{Credentials, ImageUpload, PropertyApi, PropertyForm, Registration};
use crate::errors::{ApiError, ApiResult};
use crate::models::{ImageDescriptor, Property};
use crate::sync::{CollectionKey, FetchOutcome, PropertyStore, SessionStore};
use std::sync::Arc;
use tracing::{info, warn};

pub struct PropertyActions {
    api: Arc<dyn PropertyApi>,
    properties: Arc<PropertyStore>,
    session: Arc<SessionStore>,
}

impl PropertyActions {
    pub fn new(
        api: Arc<dyn PropertyApi>,
        properties: Arc<PropertyStore>,
        session: Arc<SessionStore>,
    ) -> Self {
        Self {
            api,
            properties,
            session,
        }
    }

    pub fn properties(&self) -> &Arc<PropertyStore> {
        &self.properties
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Exchange credentials for a token, then refresh everything it unlocks.
    pub async fn login(&self, credentials: &Credentials) -> ApiResult<()> {
        credentials.validate()?;
        let token = self.guard(self.api.login(credentials).await)?;
        self.session.tokens().set(&token)?;
        info!("Logged in as {}", credentials.email);

        let (all, mine, me) = tokio::join!(
            self.properties.ensure_fresh(CollectionKey::All, true),
            self.properties.ensure_fresh(CollectionKey::Mine, true),
            self.session.ensure_user(true),
        );
        self.route_outcomes(&[all, mine, me]);
        Ok(())
    }

    pub async fn register(&self, registration: &Registration) -> ApiResult<()> {
        registration.validate()?;
        self.guard(self.api.register(registration).await)?;
        info!("Registered {}", registration.email);
        Ok(())
    }

    pub async fn create_property(&self, form: &PropertyForm) -> ApiResult<Property> {
        form.validate(true)?;
        let created = self.guard(self.api.create_property(form).await)?;
        self.refresh_listings().await;
        Ok(created)
    }

    pub async fn update_property(&self, id: &str, form: &PropertyForm) -> ApiResult<Property> {
        form.validate(false)?;
        let updated = self.guard(self.api.update_property(id, form).await)?;
        self.refresh_listings().await;
        Ok(updated)
    }

    pub async fn delete_property(&self, id: &str) -> ApiResult<()> {
        self.guard(self.api.delete_property(id).await)?;
        self.refresh_listings().await;
        Ok(())
    }

    pub async fn express_interest(&self, id: &str) -> ApiResult<()> {
        self.guard(self.api.express_interest(id).await)?;
        let outcome = self
            .properties
            .ensure_fresh(CollectionKey::All, true)
            .await;
        self.route_outcomes(&[outcome]);
        Ok(())
    }

    pub async fn upload_images(&self, images: &[ImageUpload]) -> ApiResult<Vec<ImageDescriptor>> {
        if images.is_empty() {
            return Err(ApiError::Validation("Select at least one image".into()));
        }
        validate_images(images)?;
        self.guard(self.api.upload_images(images).await)
    }

    pub async fn delete_image(&self, public_id: &str) -> ApiResult<()> {
        self.guard(self.api.delete_image(public_id).await)
    }

    /// End the session and drop cached listings. No network call.
    pub fn logout(&self) {
        self.session.logout();
        self.properties.invalidate_all();
    }

    async fn refresh_listings(&self) {
        let (all, mine) = tokio::join!(
            self.properties.ensure_fresh(CollectionKey::All, true),
            self.properties.ensure_fresh(CollectionKey::Mine, true),
        );
        self.route_outcomes(&[all, mine]);
    }

    /// A 401 from any call ends the session.
    fn guard<T>(&self, result: ApiResult<T>) -> ApiResult<T> {
        if let Err(e) = &result {
            if e.is_unauthorized() {
                self.session.handle_rejection();
            }
        }
        result
    }

    fn route_outcomes(&self, outcomes: &[FetchOutcome]) {
        if outcomes.iter().any(FetchOutcome::is_unauthorized) {
            warn!("Refresh rejected the stored credential");
            self.session.handle_rejection();
        }
    }
}
