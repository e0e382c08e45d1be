#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use property_desk::api::{Credentials, ImageUpload, PropertyApi, PropertyForm, Registration};
use property_desk::errors::{ApiError, ApiResult};
use property_desk::models::{Category, ImageDescriptor, Owner, Property, User};
use property_desk::storage::{MemoryPersistence, Persistence, TokenStore};
use property_desk::sync::{Consistency, ManualClock, PropertyStore, SessionStore, StalenessPolicy};
use property_desk::PropertyActions;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

pub const FIVE_MINUTES: Duration = Duration::from_secs(5 * 60);
pub const TEN_MINUTES: Duration = Duration::from_secs(10 * 60);

enum Script<T> {
    Now(ApiResult<T>),
    Gated(oneshot::Receiver<ApiResult<T>>),
}

/// Scripted backend. Unscripted list calls return `[]`, unscripted
/// identity calls are rejected with 401 and writes succeed.
#[derive(Default)]
pub struct FakeApi {
    calls: Mutex<HashMap<&'static str, usize>>,
    all: Mutex<VecDeque<Script<Vec<Property>>>>,
    mine: Mutex<VecDeque<Script<Vec<Property>>>>,
    me: Mutex<VecDeque<ApiResult<User>>>,
    interested: Mutex<HashMap<String, Vec<User>>>,
    write_failure: Mutex<Option<ApiError>>,
    token: Mutex<Option<String>>,
}

impl FakeApi {
    pub fn calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn reply_all(&self, reply: ApiResult<Vec<Property>>) {
        self.all.lock().unwrap().push_back(Script::Now(reply));
    }

    /// The next "all" call waits until the returned sender fires.
    pub fn gate_all(&self) -> oneshot::Sender<ApiResult<Vec<Property>>> {
        let (tx, rx) = oneshot::channel();
        self.all.lock().unwrap().push_back(Script::Gated(rx));
        tx
    }

    pub fn reply_mine(&self, reply: ApiResult<Vec<Property>>) {
        self.mine.lock().unwrap().push_back(Script::Now(reply));
    }

    pub fn reply_me(&self, reply: ApiResult<User>) {
        self.me.lock().unwrap().push_back(reply);
    }

    pub fn set_interested(&self, property_id: &str, users: Vec<User>) {
        self.interested
            .lock()
            .unwrap()
            .insert(property_id.to_string(), users);
    }

    pub fn fail_next_write(&self, error: ApiError) {
        *self.write_failure.lock().unwrap() = Some(error);
    }

    pub fn issue_token(&self, token: &str) {
        *self.token.lock().unwrap() = Some(token.to_string());
    }

    fn record(&self, name: &'static str) {
        *self.calls.lock().unwrap().entry(name).or_default() += 1;
    }

    fn write(&self, name: &'static str) -> ApiResult<()> {
        self.record(name);
        match self.write_failure.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn next_list(
        queue: &Mutex<VecDeque<Script<Vec<Property>>>>,
    ) -> ApiResult<Vec<Property>> {
        let script = queue.lock().unwrap().pop_front();
        match script {
            Some(Script::Now(reply)) => reply,
            Some(Script::Gated(rx)) => rx.await.unwrap_or_else(|_| Ok(Vec::new())),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl PropertyApi for FakeApi {
    async fn list_properties(&self) -> ApiResult<Vec<Property>> {
        self.record("list_properties");
        Self::next_list(&self.all).await
    }

    async fn list_my_properties(&self) -> ApiResult<Vec<Property>> {
        self.record("list_my_properties");
        Self::next_list(&self.mine).await
    }

    async fn create_property(&self, form: &PropertyForm) -> ApiResult<Property> {
        self.write("create_property")?;
        let mut created = property("new-1", &form.title);
        created.category = form.category;
        Ok(created)
    }

    async fn update_property(&self, id: &str, form: &PropertyForm) -> ApiResult<Property> {
        self.write("update_property")?;
        Ok(property(id, &form.title))
    }

    async fn delete_property(&self, _id: &str) -> ApiResult<()> {
        self.write("delete_property")
    }

    async fn express_interest(&self, _id: &str) -> ApiResult<()> {
        self.write("express_interest")
    }

    async fn interested_users(&self, id: &str) -> ApiResult<Vec<User>> {
        self.record("interested_users");
        Ok(self
            .interested
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    async fn register(&self, _registration: &Registration) -> ApiResult<()> {
        self.write("register")
    }

    async fn login(&self, _credentials: &Credentials) -> ApiResult<String> {
        self.write("login")?;
        self.token
            .lock()
            .unwrap()
            .clone()
            .ok_or(ApiError::Unauthorized {
                message: Some("Invalid credentials".into()),
            })
    }

    async fn current_user(&self) -> ApiResult<User> {
        self.record("current_user");
        let reply = self.me.lock().unwrap().pop_front();
        reply.unwrap_or(Err(ApiError::Unauthorized { message: None }))
    }

    async fn upload_images(&self, images: &[ImageUpload]) -> ApiResult<Vec<ImageDescriptor>> {
        self.write("upload_images")?;
        Ok(images
            .iter()
            .enumerate()
            .map(|(i, img)| ImageDescriptor {
                public_id: format!("listings/{i}"),
                url: format!("https://media.test/{}", img.file_name),
            })
            .collect())
    }

    async fn delete_image(&self, _public_id: &str) -> ApiResult<()> {
        self.write("delete_image")
    }
}

pub fn property(id: &str, title: &str) -> Property {
    Property {
        id: id.to_string(),
        title: title.to_string(),
        description: "Bright rooms close to the market".to_string(),
        price: 250_000.0,
        location: "Jaipur".to_string(),
        category: Category::Apartment,
        bedrooms: 2,
        bathrooms: 1,
        area: 900.0,
        images: vec![ImageDescriptor {
            public_id: format!("listings/{id}"),
            url: format!("https://media.test/{id}.jpg"),
        }],
        owner: Owner {
            id: "owner-1".to_string(),
            name: "Ravi".to_string(),
        },
    }
}

pub fn user(id: &str, name: &str) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
    }
}

pub fn form(title: &str) -> PropertyForm {
    PropertyForm {
        title: title.to_string(),
        description: "Corner plot with parking".to_string(),
        price: 95_000.0,
        location: "Kochi".to_string(),
        category: Category::Commercial,
        bedrooms: 1,
        bathrooms: 1,
        area: 600.0,
        images: vec![ImageUpload {
            file_name: "front.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0x89, 0x50],
        }],
    }
}

pub fn server_error(status: u16, message: Option<&str>) -> ApiError {
    ApiError::Server {
        status,
        message: message.map(str::to_string),
    }
}

/// Stores wired to a fake backend, in-memory persistence and a manual clock
pub struct Harness {
    pub api: Arc<FakeApi>,
    pub persistence: Arc<MemoryPersistence>,
    pub clock: Arc<ManualClock>,
    pub tokens: TokenStore,
    pub properties: Arc<PropertyStore>,
    pub session: Arc<SessionStore>,
    pub actions: PropertyActions,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_consistency(Consistency::LastWriteWins)
    }

    pub fn with_consistency(consistency: Consistency) -> Self {
        Self::build(
            Arc::new(FakeApi::default()),
            Arc::new(MemoryPersistence::new()),
            consistency,
        )
    }

    /// Fresh stores over the same persistence, as after a restart
    pub fn restart(&self) -> Self {
        Self::build(
            Arc::new(FakeApi::default()),
            self.persistence.clone(),
            Consistency::LastWriteWins,
        )
    }

    fn build(
        api: Arc<FakeApi>,
        persistence: Arc<MemoryPersistence>,
        consistency: Consistency,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));
        let shared: Arc<dyn Persistence> = persistence.clone();
        let backend: Arc<dyn PropertyApi> = api.clone();
        let tokens = TokenStore::new(shared.clone());

        let properties = Arc::new(
            PropertyStore::new(
                backend.clone(),
                shared.clone(),
                StalenessPolicy::new(FIVE_MINUTES, clock.clone()),
            )
            .with_consistency(consistency),
        );
        let session = Arc::new(SessionStore::new(
            backend.clone(),
            tokens.clone(),
            shared,
            StalenessPolicy::new(TEN_MINUTES, clock.clone()),
        ));
        let actions = PropertyActions::new(backend, properties.clone(), session.clone());

        Self {
            api,
            persistence,
            clock,
            tokens,
            properties,
            session,
            actions,
        }
    }
}
