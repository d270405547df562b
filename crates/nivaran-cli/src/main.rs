mod text_map;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use nivaran_client::editor::PostDraft;
use nivaran_client::feed::time_ago;
use nivaran_client::geocode::NominatimGeocoder;
use nivaran_client::map::MapOverlay;
use nivaran_client::{Attachment, ClientContext, ClientError, Config, SessionEvent};
use nivaran_gateway::Backend;
use nivaran_types::api::{NgoSignUp, PostFilter, SignUpProfile};
use nivaran_types::models::{GeoPoint, Role};

use text_map::TextMap;

const DEMO_PASSWORD: &str = "nivaran-demo";

#[derive(Debug, Parser)]
#[command(name = "nivaran")]
#[command(about = "Food donation client running against the embedded backend")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create demo donors, NGOs, posts and a conversation
    Seed,

    /// List a user's conversations, most recent first
    Chats {
        email: String,

        #[arg(long, default_value = DEMO_PASSWORD)]
        password: String,
    },

    /// Open a conversation and send lines from stdin (`/attach <file>`, `/quit`)
    Chat {
        chat_id: Uuid,

        #[arg(long = "as")]
        email: String,

        #[arg(long, default_value = DEMO_PASSWORD)]
        password: String,
    },

    /// Show active posts, newest first
    Feed {
        /// Case-insensitive food type filter
        #[arg(long)]
        food_type: Option<String>,
    },

    /// Show NGOs and posts around a point
    Nearby {
        #[arg(long)]
        lat: f64,

        #[arg(long)]
        lng: f64,

        /// Search radius in km, clamped to the configured maximum
        #[arg(long, default_value_t = 10.0)]
        radius: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nivaran=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let backend = Backend::open(config.backend_options())
        .await
        .with_context(|| format!("open backend at {}", config.db_path.display()))?;

    match cli.cmd {
        Command::Seed => cmd_seed(&backend, &config).await,
        Command::Chats { email, password } => cmd_chats(&backend, &config, &email, &password).await,
        Command::Chat { chat_id, email, password } => cmd_chat(&backend, &config, chat_id, &email, &password).await,
        Command::Feed { food_type } => cmd_feed(&backend, &config, food_type).await,
        Command::Nearby { lat, lng, radius } => cmd_nearby(&backend, &config, GeoPoint::new(lat, lng), radius).await,
    }
}

fn client(backend: &Arc<Backend>, config: &Config) -> anyhow::Result<ClientContext> {
    let geocoder = NominatimGeocoder::new(config.geocoder_url.clone(), &config.geocoder_user_agent)?;
    Ok(ClientContext::new(Arc::new(backend.connect()), config.clone()).with_geocoder(Arc::new(geocoder)))
}

async fn signed_in(backend: &Arc<Backend>, config: &Config, email: &str, password: &str) -> anyhow::Result<ClientContext> {
    let ctx = client(backend, config)?;
    let profile = ctx.store().sign_in(email, password).await?;
    if profile.is_none() {
        warn!("{} has no profile yet", email);
    } else if !ctx.store().is_profile_complete() {
        warn!("{} has an incomplete profile", email);
    }
    Ok(ctx)
}

/// Sign up, or sign in if the account already exists.
async fn demo_account(backend: &Arc<Backend>, config: &Config, email: &str, profile: SignUpProfile) -> anyhow::Result<ClientContext> {
    let ctx = client(backend, config)?;
    match ctx.store().sign_up(email, DEMO_PASSWORD, profile).await {
        Ok(_) => info!("Created {}", email),
        Err(ClientError::ValidationFailed(_)) => {
            ctx.store().sign_in(email, DEMO_PASSWORD).await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(ctx)
}

fn located(name: &str, role: Role, lat: f64, lng: f64, city: &str) -> SignUpProfile {
    let mut profile = SignUpProfile::new(name, role);
    profile.lat = Some(lat);
    profile.lng = Some(lng);
    profile.city = Some(city.into());
    profile.state = Some("Maharashtra".into());
    profile
}

async fn cmd_seed(backend: &Arc<Backend>, config: &Config) -> anyhow::Result<()> {
    let donor = demo_account(backend, config, "asha@example.org", located("Asha Caterers", Role::Donor, 19.0760, 72.8777, "Mumbai")).await?;

    let mut annam = located("Annam Trust", Role::Ngo, 19.2183, 72.9781, "Thane");
    annam.bio = Some("Community kitchen serving 300 meals a day".into());
    annam.ngo = Some(NgoSignUp {
        registration_number: Some("MH/2019/0042".into()),
        website: None,
        representative_name: Some("Meera Iyer".into()),
    });
    let ngo = demo_account(backend, config, "annam@example.org", annam).await?;
    demo_account(backend, config, "roti@example.org", located("Roti Bank Pune", Role::Ngo, 18.5204, 73.8567, "Pune")).await?;

    let mut draft = PostDraft::new("Leftover wedding buffet");
    draft.body = Some("Rice, dal and paneer for about 40 people".into());
    draft.food_type = Some("Cooked Meals".into());
    draft.quantity = Some("40 plates".into());
    draft.location = Some(GeoPoint::new(19.0760, 72.8777));
    let post = donor.post_editor().submit(draft).await?;

    let mut need = PostDraft::new("Need dry rations");
    need.food_type = Some("Groceries".into());
    need.location = Some(GeoPoint::new(19.2183, 72.9781));
    ngo.post_editor().submit(need).await?;

    let chat = ngo.roster().contact_for_post(&post).await?;
    let session = ngo.chat_session();
    session.open(chat.id).await?;
    session.send("Can we pick this up at 5pm?", vec![]).await?;
    session.close();

    println!("Seeded. Password for all demo accounts: {}", DEMO_PASSWORD);
    println!("Chat {} between asha@example.org and annam@example.org", chat.id);
    Ok(())
}

async fn cmd_chats(backend: &Arc<Backend>, config: &Config, email: &str, password: &str) -> anyhow::Result<()> {
    let ctx = signed_in(backend, config, email, password).await?;
    let user = ctx.store().require_user()?;
    let now = chrono::Utc::now();

    let chats = ctx.roster().load_chats(user.id).await;
    if chats.is_empty() {
        println!("No conversations.");
    }
    for chat in chats {
        let about = chat.post_title.map(|t| format!(" about \"{}\"", t)).unwrap_or_default();
        println!(
            "{}  {} ({}){}  {}",
            chat.chat_id,
            chat.counterpart.name,
            chat.counterpart.role.label(),
            about,
            time_ago(chat.updated_at, now)
        );
    }
    Ok(())
}

async fn cmd_chat(
    backend: &Arc<Backend>,
    config: &Config,
    chat_id: Uuid,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    let ctx = signed_in(backend, config, email, password).await?;
    let me = ctx.store().require_user()?.id;
    let session = ctx.chat_session();
    let mut events = session.events();

    session.open(chat_id).await?;
    let counterpart = session.counterpart();
    let their_name = counterpart.as_ref().map(|c| c.name.clone()).unwrap_or_else(|| "them".into());
    println!("Chat with {}", their_name);
    if !session.history_complete() {
        println!("(history unavailable, showing new messages only)");
    }
    for message in session.messages() {
        let who = if message.sender_id == me { "you" } else { their_name.as_str() };
        println!("[{}] {}: {}", message.created_at.format("%H:%M"), who, message.text);
    }

    let printer_name = their_name.clone();
    let printer = tokio::spawn(async move {
        while let Some(event) = next_event(&mut events).await {
            match event {
                SessionEvent::MessageAppended(message) => {
                    let who = if message.sender_id == me { "you" } else { printer_name.as_str() };
                    println!("[{}] {}: {}", message.created_at.format("%H:%M"), who, message.text);
                    for url in &message.attachments {
                        println!("      {}", url);
                    }
                }
                SessionEvent::Closed { .. } => break,
                _ => {}
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "/quit" {
            break;
        }

        let (text, attachments) = match line.strip_prefix("/attach ") {
            Some(path) => match read_attachment(PathBuf::from(path.trim())).await {
                Ok(file) => (String::new(), vec![file]),
                Err(e) => {
                    eprintln!("{:#}", e);
                    continue;
                }
            },
            None => (line.to_string(), Vec::new()),
        };

        if let Err(e) = session.send(&text, attachments).await {
            eprintln!("Not sent: {}", e);
        }
    }

    session.close();
    let _ = printer.await;
    Ok(())
}

/// Next session event. A printer that fell behind skips what it missed
/// and keeps going; only a closed stream ends it.
async fn next_event(events: &mut broadcast::Receiver<SessionEvent>) -> Option<SessionEvent> {
    loop {
        match events.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(n)) => eprintln!("({} updates skipped)", n),
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

async fn read_attachment(path: PathBuf) -> anyhow::Result<Attachment> {
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".into());
    let content_type = match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()) {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "webp" => "image/webp",
        Some(ext) if ext == "pdf" => "application/pdf",
        _ => "application/octet-stream",
    };
    Ok(Attachment::new(name, content_type, Bytes::from(bytes)))
}

async fn cmd_feed(backend: &Arc<Backend>, config: &Config, food_type: Option<String>) -> anyhow::Result<()> {
    let ctx = client(backend, config)?;
    let mut feed = ctx.feed();
    let now = chrono::Utc::now();
    let filter = PostFilter {
        food_type,
        ..PostFilter::default()
    };

    let posts = feed.load(filter).await;
    if posts.is_empty() {
        println!("No active posts.");
    }
    for post in posts {
        let author = post.author.as_ref().map(|a| a.name.as_str()).unwrap_or("unknown");
        println!(
            "{}  [{}] {} by {}  {}",
            post.id,
            post.role.label(),
            post.title,
            author,
            time_ago(post.created_at, now)
        );
    }
    Ok(())
}

async fn cmd_nearby(backend: &Arc<Backend>, config: &Config, center: GeoPoint, radius: f64) -> anyhow::Result<()> {
    let ctx = client(backend, config)?;
    let ngos = ctx.directory().nearby_ngos(center, radius).await;
    let mut feed = ctx.feed();
    let posts = feed.load_nearby(center, radius).await.to_vec();

    let mut overlay = MapOverlay::new(TextMap::default(), config.app.clone());
    overlay.set_user_location(center);
    overlay.center_on(center);
    overlay.draw_radius(radius);

    overlay.render_ngos(&ngos);
    println!("{} NGOs\n{}", overlay.marker_count(), overlay.widget().render());
    overlay.render_posts(&posts);
    println!("{} posts\n{}", overlay.marker_count(), overlay.widget().render());
    Ok(())
}
