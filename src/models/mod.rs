use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of property a listing describes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Category {
    #[default]
    Apartment,
    Villa,
    House,
    Commercial,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Apartment => "Apartment",
            Category::Villa => "Villa",
            Category::House => "House",
            Category::Commercial => "Commercial",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "apartment" => Ok(Category::Apartment),
            "villa" => Ok(Category::Villa),
            "house" => Ok(Category::House),
            "commercial" => Ok(Category::Commercial),
            other => Err(format!("unknown property type: {other}")),
        }
    }
}

/// Image stored on the media host. Both fields are assigned by the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageDescriptor {
    pub public_id: String,
    pub url: String,
}

/// Owner reference embedded in every listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Owner {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Core property data model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Property {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub location: String,
    #[serde(rename = "type", default)]
    pub category: Category,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub area: f64,
    /// Ordered; the first image is the cover.
    #[serde(default)]
    pub images: Vec<ImageDescriptor>,
    pub owner: Owner,
}

impl Property {
    pub fn cover_image(&self) -> Option<&ImageDescriptor> {
        self.images.first()
    }
}

/// Authenticated identity, also used for interested-user listings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Fields that may be merged into the current [`User`] without a round trip
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl User {
    /// Shallow merge: only the fields present in `patch` change.
    pub fn apply(&mut self, patch: UserPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
    }
}

/// Response wrapper used by every backend endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

fn default_success() -> bool {
    true
}

/// Error body shape; only the message matters to the client.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
}

/// Payload of a successful login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginData {
    pub token: String,
}
