use crate::api::types::{Credentials, ImageUpload, PropertyForm, Registration};
use crate::errors::ApiResult;
use crate::models::{ImageDescriptor, Property, User};
use async_trait::async_trait;

/// Everything the client asks of the backend.
/// Stores and actions only see this trait, so tests can swap in a scripted fake.
#[async_trait]
pub trait PropertyApi: Send + Sync {
    async fn list_properties(&self) -> ApiResult<Vec<Property>>;

    /// Listings owned by the bearer of the current token
    async fn list_my_properties(&self) -> ApiResult<Vec<Property>>;

    async fn create_property(&self, form: &PropertyForm) -> ApiResult<Property>;

    async fn update_property(&self, id: &str, form: &PropertyForm) -> ApiResult<Property>;

    async fn delete_property(&self, id: &str) -> ApiResult<()>;

    async fn express_interest(&self, id: &str) -> ApiResult<()>;

    async fn interested_users(&self, id: &str) -> ApiResult<Vec<User>>;

    async fn register(&self, registration: &Registration) -> ApiResult<()>;

    /// Returns the bearer token; persisting it is the caller's job.
    async fn login(&self, credentials: &Credentials) -> ApiResult<String>;

    async fn current_user(&self) -> ApiResult<User>;

    async fn upload_images(&self, images: &[ImageUpload]) -> ApiResult<Vec<ImageDescriptor>>;

    async fn delete_image(&self, public_id: &str) -> ApiResult<()>;
}
