use crate::errors::{ApiError, ApiResult};
use crate::models::Category;
use serde::Serialize;

/// Upper bound on images attached to one listing
pub const MAX_IMAGES: usize = 6;

/// An image file on its way to the media host
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    /// MIME type, e.g. `image/jpeg`
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// Fields sent when creating or updating a listing
#[derive(Debug, Clone)]
pub struct PropertyForm {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub location: String,
    pub category: Category,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub area: f64,
    pub images: Vec<ImageUpload>,
}

impl PropertyForm {
    /// Checks the listing before it is sent. `require_images` is true when
    /// creating; an update may keep the existing gallery.
    pub fn validate(&self, require_images: bool) -> ApiResult<()> {
        if self.title.trim().is_empty() {
            return Err(ApiError::Validation("Title is required".into()));
        }
        if self.description.trim().chars().count() < 10 {
            return Err(ApiError::Validation(
                "Description must be at least 10 characters".into(),
            ));
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(ApiError::Validation("Price must be positive".into()));
        }
        if self.location.trim().is_empty() {
            return Err(ApiError::Validation("Location is required".into()));
        }
        if self.bedrooms == 0 || self.bathrooms == 0 {
            return Err(ApiError::Validation(
                "Bedrooms and bathrooms must be positive".into(),
            ));
        }
        if !self.area.is_finite() || self.area <= 0.0 {
            return Err(ApiError::Validation("Area must be positive".into()));
        }
        validate_images(&self.images)?;
        if require_images && self.images.is_empty() {
            return Err(ApiError::Validation(
                "Please upload at least one image".into(),
            ));
        }
        Ok(())
    }

    /// Text fields in the order the backend form expects them.
    pub fn text_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("title", self.title.trim().to_string()),
            ("description", self.description.trim().to_string()),
            ("price", self.price.to_string()),
            ("location", self.location.trim().to_string()),
            ("type", self.category.to_string()),
            ("bedrooms", self.bedrooms.to_string()),
            ("bathrooms", self.bathrooms.to_string()),
            ("area", self.area.to_string()),
        ]
    }
}

pub fn validate_images(images: &[ImageUpload]) -> ApiResult<()> {
    if images.len() > MAX_IMAGES {
        return Err(ApiError::Validation(format!(
            "Max {MAX_IMAGES} images allowed"
        )));
    }
    if images.iter().any(|img| !img.is_image()) {
        return Err(ApiError::Validation(
            "Only image files are allowed".into(),
        ));
    }
    Ok(())
}

/// Login request body
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn validate(&self) -> ApiResult<()> {
        if self.email.trim().is_empty() {
            return Err(ApiError::Validation("Email is required".into()));
        }
        if self.password.is_empty() {
            return Err(ApiError::Validation("Password is required".into()));
        }
        Ok(())
    }
}

/// Registration request body
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    pub fn validate(&self) -> ApiResult<()> {
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("Name is required".into()));
        }
        if self.email.trim().is_empty() {
            return Err(ApiError::Validation("Email is required".into()));
        }
        if !looks_like_email(self.email.trim()) {
            return Err(ApiError::Validation("Invalid email format".into()));
        }
        if self.password.is_empty() {
            return Err(ApiError::Validation("Password is required".into()));
        }
        if self.password.chars().count() < 6 {
            return Err(ApiError::Validation(
                "Password must be at least 6 characters".into(),
            ));
        }
        Ok(())
    }
}

fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .map(|(host, tld)| !host.is_empty() && !tld.is_empty())
                    .unwrap_or(false)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> PropertyForm {
        PropertyForm {
            title: "Garden house".into(),
            description: "Quiet street, large garden".into(),
            price: 120000.0,
            location: "Pune".into(),
            category: Category::House,
            bedrooms: 3,
            bathrooms: 2,
            area: 1400.0,
            images: vec![jpeg("front.jpg")],
        }
    }

    fn jpeg(name: &str) -> ImageUpload {
        ImageUpload {
            file_name: name.into(),
            content_type: "image/jpeg".into(),
            bytes: vec![0xFF, 0xD8],
        }
    }

    #[test]
    fn accepts_a_complete_listing() {
        assert!(form().validate(true).is_ok());
    }

    #[test]
    fn creation_needs_an_image_but_update_does_not() {
        let mut f = form();
        f.images.clear();
        assert!(f.validate(true).is_err());
        assert!(f.validate(false).is_ok());
    }

    #[test]
    fn rejects_too_many_or_non_image_files() {
        let mut f = form();
        f.images = (0..7).map(|i| jpeg(&format!("{i}.jpg"))).collect();
        let err = f.validate(true).unwrap_err();
        assert_eq!(err.user_message(""), "Max 6 images allowed");

        let mut f = form();
        f.images[0].content_type = "application/pdf".into();
        assert!(f.validate(true).is_err());
    }

    #[test]
    fn rejects_non_positive_numbers() {
        let mut f = form();
        f.price = 0.0;
        assert!(f.validate(true).is_err());

        let mut f = form();
        f.area = f64::NAN;
        assert!(f.validate(true).is_err());

        let mut f = form();
        f.bathrooms = 0;
        assert!(f.validate(true).is_err());
    }

    #[test]
    fn form_fields_use_wire_names() {
        let fields = form().text_fields();
        assert!(fields.contains(&("type", "House".to_string())));
        assert!(fields.contains(&("bedrooms", "3".to_string())));
    }

    #[test]
    fn registration_checks_email_and_password() {
        let mut reg = Registration {
            name: "Asha".into(),
            email: "asha@example.com".into(),
            password: "secret1".into(),
        };
        assert!(reg.validate().is_ok());

        reg.email = "asha@example".into();
        assert!(reg.validate().is_err());

        reg.email = "asha@example.com".into();
        reg.password = "123".into();
        assert!(reg.validate().is_err());
    }
}
