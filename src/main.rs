use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use property_desk::api::{Credentials, HttpApi, ImageUpload, PropertyApi, PropertyForm, Registration};
use property_desk::models::{Category, Property};
use property_desk::storage::{FilePersistence, Persistence, TokenStore};
use property_desk::sync::{CollectionKey, FetchOutcome, PropertyStore, SessionStore, StalenessPolicy};
use property_desk::{ClientConfig, PropertyActions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "property-desk", version, about = "Browse and manage property listings")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every property
    List {
        #[arg(long)]
        force: bool,
    },
    /// List your own properties
    Mine {
        #[arg(long)]
        force: bool,
    },
    /// Show users interested in one of your properties
    Interested { property_id: String },
    /// Show the logged-in user
    Me {
        #[arg(long)]
        force: bool,
    },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PROPERTY_DESK_PASSWORD")]
        password: String,
    },
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "PROPERTY_DESK_PASSWORD")]
        password: String,
    },
    Logout,
    /// Record interest in a property
    Interest { property_id: String },
    Create(ListingArgs),
    Update {
        property_id: String,
        #[command(flatten)]
        listing: ListingArgs,
    },
    Delete { property_id: String },
    /// Upload images to the media host
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Remove an uploaded image by its public id
    DeleteImage { public_id: String },
}

#[derive(Args)]
struct ListingArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    description: String,
    #[arg(long)]
    price: f64,
    #[arg(long)]
    location: String,
    #[arg(long = "type", default_value = "Apartment")]
    category: Category,
    #[arg(long)]
    bedrooms: u32,
    #[arg(long)]
    bathrooms: u32,
    #[arg(long)]
    area: f64,
    /// Image files, first one becomes the cover
    #[arg(long = "image")]
    images: Vec<PathBuf>,
}

impl ListingArgs {
    async fn into_form(self) -> Result<PropertyForm> {
        Ok(PropertyForm {
            title: self.title,
            description: self.description,
            price: self.price,
            location: self.location,
            category: self.category,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            area: self.area,
            images: read_images(&self.images).await?,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ClientConfig::from_env()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🏠 Property Desk → {}", config.api_base_url);

    let persistence: Arc<dyn Persistence> = Arc::new(FilePersistence::new(&config.state_dir));
    let tokens = TokenStore::new(persistence.clone());
    let api: Arc<dyn PropertyApi> = Arc::new(HttpApi::new(&config, tokens.clone())?);

    let properties = Arc::new(
        PropertyStore::new(
            api.clone(),
            persistence.clone(),
            StalenessPolicy::system(config.property_stale_after),
        )
        .with_consistency(config.consistency),
    );
    let session = Arc::new(SessionStore::new(
        api.clone(),
        tokens,
        persistence,
        StalenessPolicy::system(config.session_stale_after),
    ));
    let actions = PropertyActions::new(api, properties.clone(), session.clone());

    match cli.command {
        Command::List { force } => show_collection(&actions, CollectionKey::All, force).await?,
        Command::Mine { force } => show_collection(&actions, CollectionKey::Mine, force).await?,
        Command::Interested { property_id } => {
            let outcome = properties.fetch_interested_users(&property_id).await;
            check(&actions, outcome, properties.snapshot().error)?;
            let state = properties.snapshot();
            let users = state.interested.get(&property_id).map(Vec::as_slice).unwrap_or(&[]);
            if users.is_empty() {
                println!("No one has shown interest yet.");
            }
            for user in users {
                println!("{} <{}>", user.name, user.email);
            }
        }
        Command::Me { force } => {
            let outcome = session.ensure_user(force).await;
            check(&actions, outcome, session.snapshot().error)?;
            if let Some(user) = session.snapshot().user {
                println!("{} <{}>  ID: {}", user.name, user.email, user.id);
            }
        }
        Command::Login { email, password } => {
            actions.login(&Credentials { email, password }).await?;
            println!("✅ Logged in");
        }
        Command::Register { name, email, password } => {
            actions
                .register(&Registration { name, email, password })
                .await?;
            println!("✅ Account created, you can log in now");
        }
        Command::Logout => {
            actions.logout();
            println!("👋 Logged out");
        }
        Command::Interest { property_id } => {
            actions.express_interest(&property_id).await?;
            println!("✅ Interest recorded");
        }
        Command::Create(listing) => {
            let form = listing.into_form().await?;
            let created = actions.create_property(&form).await?;
            println!("✅ Property added (ID: {})", created.id);
        }
        Command::Update { property_id, listing } => {
            let form = listing.into_form().await?;
            actions.update_property(&property_id, &form).await?;
            println!("✅ Property updated");
        }
        Command::Delete { property_id } => {
            actions.delete_property(&property_id).await?;
            println!("🗑  Property deleted");
        }
        Command::Upload { paths } => {
            let images = read_images(&paths).await?;
            for image in actions.upload_images(&images).await? {
                println!("{}  {}", image.public_id, image.url);
            }
        }
        Command::DeleteImage { public_id } => {
            actions.delete_image(&public_id).await?;
            println!("🗑  Image deleted");
        }
    }

    Ok(())
}

async fn show_collection(actions: &PropertyActions, key: CollectionKey, force: bool) -> Result<()> {
    let store = actions.properties();
    let outcome = store.ensure_fresh(key, force).await;
    check(actions, outcome, store.snapshot().error)?;

    let state = store.snapshot();
    let records = &state.collection(key).records;
    info!("{} {} ({:?})", records.len(), key, outcome);
    for (i, property) in records.iter().enumerate() {
        print_property(i + 1, property);
    }
    Ok(())
}

/// Surface a failed fetch as an error; 401s also end the session.
fn check(actions: &PropertyActions, outcome: FetchOutcome, error: Option<String>) -> Result<()> {
    if let FetchOutcome::Failed(_) = outcome {
        if outcome.is_unauthorized() {
            actions.session().handle_rejection();
        }
        anyhow::bail!(error.unwrap_or_else(|| "Request failed".to_string()));
    }
    Ok(())
}

fn print_property(n: usize, property: &Property) {
    println!("{}. {} ({}, {})", n, property.title, property.category, property.price);
    println!(
        "   {} bed, {} bath, {} sqft",
        property.bedrooms, property.bathrooms, property.area
    );
    println!("   Location: {}", property.location);
    println!("   Owner: {}", property.owner.name);
    if let Some(cover) = property.cover_image() {
        println!("   Cover: {} (+{} more)", cover.url, property.images.len() - 1);
    }
    println!("   ID: {}", property.id);
    println!();
}

async fn read_images(paths: &[PathBuf]) -> Result<Vec<ImageUpload>> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        images.push(ImageUpload {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string()),
            content_type: content_type_for(path).to_string(),
            bytes,
        });
    }
    Ok(images)
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}
