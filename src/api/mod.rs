pub mod http;
pub mod traits;
pub mod types;

pub use http::HttpApi;
pub use traits::PropertyApi;
pub use types::{Credentials, ImageUpload, PropertyForm, Registration, MAX_IMAGES};
