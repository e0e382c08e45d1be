use crate::api::traits::PropertyApi;
use crate::api::types::{Credentials, ImageUpload, PropertyForm, Registration};
use crate::config::ClientConfig;
use crate::errors::{ApiError, ApiResult};
use crate::models::{Envelope, ErrorBody, ImageDescriptor, LoginData, Property, User};
use crate::storage::TokenStore;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, warn};

/// reqwest-backed adapter for the property backend
pub struct HttpApi {
    client: Client,
    base_url: String,
    tokens: TokenStore,
}

impl HttpApi {
    /// Create an adapter from configuration
    pub fn new(config: &ClientConfig, tokens: TokenStore) -> ApiResult<Self> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self::with_client(client, &config.api_base_url, tokens))
    }

    pub fn with_client(client: Client, base_url: &str, tokens: TokenStore) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Start a request against `path`, with the bearer token attached when one is stored
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.client.request(method, url);
        match self.tokens.get() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and unwrap the `{ success, data, message }` envelope
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<Envelope<T>> {
        let response = builder.send().await?;
        let status = response.status();
        debug!("{} {}", status.as_u16(), response.url().path());

        let body = self.check_status(response).await?;
        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        if !envelope.success {
            return Err(ApiError::Server {
                status: status.as_u16(),
                message: envelope.message,
            });
        }
        Ok(envelope)
    }

    async fn send_data<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        self.send::<T>(builder)
            .await?
            .data
            .ok_or_else(|| ApiError::Server {
                status: StatusCode::OK.as_u16(),
                message: Some("Response carried no data".to_string()),
            })
    }

    async fn send_unit(&self, builder: RequestBuilder) -> ApiResult<()> {
        self.send::<serde_json::Value>(builder).await.map(|_| ())
    }

    /// Map non-success statuses to errors; a 401 also drops the stored token.
    async fn check_status(&self, response: Response) -> ApiResult<String> {
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            return Ok(body);
        }

        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message);

        if status == StatusCode::UNAUTHORIZED {
            warn!("Request rejected with 401, clearing stored credential");
            self.tokens.clear();
            return Err(ApiError::Unauthorized { message });
        }

        warn!("Backend returned status: {}", status);
        Err(ApiError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

fn property_form(form: &PropertyForm) -> ApiResult<Form> {
    let mut multipart = Form::new();
    for (name, value) in form.text_fields() {
        multipart = multipart.text(name, value);
    }
    for image in &form.images {
        multipart = multipart.part("images", image_part(image)?);
    }
    Ok(multipart)
}

fn image_part(image: &ImageUpload) -> ApiResult<Part> {
    Ok(Part::bytes(image.bytes.clone())
        .file_name(image.file_name.clone())
        .mime_str(&image.content_type)?)
}

#[async_trait]
impl PropertyApi for HttpApi {
    async fn list_properties(&self) -> ApiResult<Vec<Property>> {
        self.send_data(self.request(Method::GET, "/properties")).await
    }

    async fn list_my_properties(&self) -> ApiResult<Vec<Property>> {
        self.send_data(self.request(Method::GET, "/properties/my"))
            .await
    }

    async fn create_property(&self, form: &PropertyForm) -> ApiResult<Property> {
        info!("Creating property '{}'", form.title);
        let body = property_form(form)?;
        self.send_data(self.request(Method::POST, "/properties").multipart(body))
            .await
    }

    async fn update_property(&self, id: &str, form: &PropertyForm) -> ApiResult<Property> {
        info!("Updating property {}", id);
        let body = property_form(form)?;
        self.send_data(
            self.request(Method::PUT, &format!("/properties/{id}"))
                .multipart(body),
        )
        .await
    }

    async fn delete_property(&self, id: &str) -> ApiResult<()> {
        info!("Deleting property {}", id);
        self.send_unit(self.request(Method::DELETE, &format!("/properties/{id}")))
            .await
    }

    async fn express_interest(&self, id: &str) -> ApiResult<()> {
        self.send_unit(self.request(Method::POST, &format!("/properties/{id}/interest")))
            .await
    }

    async fn interested_users(&self, id: &str) -> ApiResult<Vec<User>> {
        self.send_data(self.request(
            Method::GET,
            &format!("/properties/{id}/interested-users"),
        ))
        .await
    }

    async fn register(&self, registration: &Registration) -> ApiResult<()> {
        self.send_unit(self.request(Method::POST, "/auth/register").json(registration))
            .await
    }

    async fn login(&self, credentials: &Credentials) -> ApiResult<String> {
        let data: LoginData = self
            .send_data(self.request(Method::POST, "/auth/login").json(credentials))
            .await?;
        Ok(data.token)
    }

    async fn current_user(&self) -> ApiResult<User> {
        self.send_data(self.request(Method::GET, "/auth/me")).await
    }

    async fn upload_images(&self, images: &[ImageUpload]) -> ApiResult<Vec<ImageDescriptor>> {
        let mut body = Form::new();
        for image in images {
            body = body.part("images", image_part(image)?);
        }
        info!("Uploading {} image(s)", images.len());
        self.send_data(self.request(Method::POST, "/media/upload").multipart(body))
            .await
    }

    async fn delete_image(&self, public_id: &str) -> ApiResult<()> {
        self.send_unit(
            self.request(Method::DELETE, "/media/delete")
                .json(&json!({ "publicId": public_id })),
        )
        .await
    }
}
