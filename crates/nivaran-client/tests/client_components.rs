use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;

use nivaran_client::editor::{ImageFile, PostDraft};
use nivaran_client::feed::FeedQuery;
use nivaran_client::geocode::{GeocodeResult, Geocoder, ReverseGeocode};
use nivaran_client::{ClientContext, ClientError, Config};
use nivaran_gateway::{Backend, BackendOptions};
use nivaran_types::api::{PostFilter, SignUpProfile};
use nivaran_types::models::{DonationStatus, GeoPoint, Role};

const MUMBAI: GeoPoint = GeoPoint { lat: 19.0760, lng: 72.8777 };
const THANE: GeoPoint = GeoPoint { lat: 19.2183, lng: 72.9781 };
const PUNE: GeoPoint = GeoPoint { lat: 18.5204, lng: 73.8567 };

/// Resolves every address to Thane and counts lookups.
#[derive(Default)]
struct FixedGeocoder {
    lookups: AtomicUsize,
}

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn geocode(&self, address: &str) -> Option<GeocodeResult> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Some(GeocodeResult {
            location: THANE,
            display_name: address.to_string(),
        })
    }

    async fn reverse_geocode(&self, _location: GeoPoint) -> Option<ReverseGeocode> {
        None
    }

    async fn suggest(&self, _query: &str) -> Vec<GeocodeResult> {
        Vec::new()
    }
}

struct World {
    _tmp: TempDir,
    backend: Arc<Backend>,
}

impl World {
    async fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Backend::open(BackendOptions::in_memory(tmp.path().to_path_buf()))
            .await
            .unwrap();
        Self { _tmp: tmp, backend }
    }

    async fn client(&self, email: &str, name: &str, role: Role, at: Option<GeoPoint>) -> ClientContext {
        let ctx = ClientContext::new(Arc::new(self.backend.connect()), Config::default());
        let mut profile = SignUpProfile::new(name, role);
        profile.lat = at.map(|p| p.lat);
        profile.lng = at.map(|p| p.lng);
        ctx.store().sign_up(email, "password1", profile).await.unwrap();
        ctx
    }
}

fn me(ctx: &ClientContext) -> uuid::Uuid {
    ctx.store().current_user().unwrap().id
}

fn png(name: &str) -> ImageFile {
    ImageFile::new(name, "image/png", vec![1u8, 2, 3, 4])
}

#[tokio::test]
async fn roster_is_ordered_by_last_activity() {
    let w = World::new().await;
    let donor = w.client("d@example.org", "Dev", Role::Donor, None).await;
    let first = w.client("a@example.org", "Annam", Role::Ngo, None).await;
    let second = w.client("b@example.org", "Bhojan", Role::Ngo, None).await;

    let roster = donor.roster();
    let older = roster.start_chat(me(&first), None).await.unwrap();
    let newer = roster.start_chat(me(&second), None).await.unwrap();

    let order: Vec<_> = roster.load_chats(me(&donor)).await.into_iter().map(|c| c.chat_id).collect();
    assert_eq!(order, vec![newer.id, older.id]);

    // A message in the older chat moves it to the top.
    let session = donor.chat_session();
    session.open(older.id).await.unwrap();
    session.send("still need rice?", vec![]).await.unwrap();

    let order: Vec<_> = roster.load_chats(me(&donor)).await.into_iter().map(|c| c.chat_id).collect();
    assert_eq!(order, vec![older.id, newer.id]);

    // The NGO side starts the same conversation, not a new one.
    let again = first.roster().start_chat(me(&donor), None).await.unwrap();
    assert_eq!(again.id, older.id);
}

#[tokio::test]
async fn roster_of_another_user_is_empty() {
    let w = World::new().await;
    let donor = w.client("d@example.org", "Dev", Role::Donor, None).await;
    let ngo = w.client("n@example.org", "Annam", Role::Ngo, None).await;
    donor.roster().start_chat(me(&ngo), None).await.unwrap();

    // Reading someone else's roster is refused by the backend and degrades.
    assert!(donor.roster().load_chats(me(&ngo)).await.is_empty());
}

#[tokio::test]
async fn contacting_a_post_author() {
    let w = World::new().await;
    let donor = w.client("d@example.org", "Dev", Role::Donor, None).await;
    let other_donor = w.client("e@example.org", "Esha", Role::Donor, None).await;
    let ngo = w.client("n@example.org", "Annam", Role::Ngo, None).await;

    let post = donor.post_editor().submit(PostDraft::new("30 meals")).await.unwrap();

    let chat = ngo.roster().contact_for_post(&post).await.unwrap();
    assert_eq!(chat.donor_id, me(&donor));
    assert_eq!(chat.ngo_id, me(&ngo));
    assert_eq!(chat.post_id, Some(post.id));

    let details = donor.chat_session();
    details.open(chat.id).await.unwrap();
    assert_eq!(details.details().unwrap().post_title.as_deref(), Some("30 meals"));

    assert!(matches!(
        donor.roster().contact_for_post(&post).await,
        Err(ClientError::ValidationFailed(_))
    ));
    assert!(matches!(
        other_donor.roster().contact_for_post(&post).await,
        Err(ClientError::ValidationFailed(_))
    ));
}

#[tokio::test]
async fn feed_loads_filters_and_deletes() {
    let w = World::new().await;
    let donor = w.client("d@example.org", "Dev", Role::Donor, None).await;
    let ngo = w.client("n@example.org", "Annam", Role::Ngo, None).await;

    let mut rice = PostDraft::new("Rice and dal");
    rice.food_type = Some("Cooked Meals".into());
    rice.location = Some(MUMBAI);
    let rice = donor.post_editor().submit(rice).await.unwrap();

    let mut bread = PostDraft::new("Need bread");
    bread.food_type = Some("Bakery".into());
    bread.location = Some(PUNE);
    ngo.post_editor().submit(bread).await.unwrap();

    let mut feed = donor.feed();
    let titles: Vec<_> = feed.load(PostFilter::default()).await.iter().map(|p| p.title.clone()).collect();
    assert_eq!(titles, vec!["Need bread", "Rice and dal"]);

    let donors = feed.filter(&FeedQuery {
        role: Some(Role::Donor),
        ..FeedQuery::default()
    });
    assert_eq!(donors.len(), 1);
    assert_eq!(donors[0].id, rice.id);

    // A later load without a role drops the earlier role filter.
    let ngo_only = PostFilter {
        role: Some(Role::Ngo),
        ..PostFilter::default()
    };
    assert_eq!(feed.load(ngo_only).await.len(), 1);
    assert_eq!(feed.reload().await.len(), 1);
    assert_eq!(feed.load(PostFilter::default()).await.len(), 2);

    let near = feed.load_nearby(THANE, 30.0).await;
    assert_eq!(near.len(), 1);
    assert!(near[0].distance_km.unwrap() < 30.0);

    // Only the owner can delete.
    let mut ngo_feed = ngo.feed();
    assert!(matches!(ngo_feed.delete_post(rice.id).await, Err(ClientError::Unauthorized(_))));
    feed.delete_post(rice.id).await.unwrap();
    assert!(feed.posts().iter().all(|p| p.id != rice.id));
    assert!(matches!(feed.get_post(rice.id).await, Err(ClientError::NotFound(_))));
}

#[tokio::test]
async fn editor_geocodes_the_pickup_address() {
    let w = World::new().await;
    let geocoder = Arc::new(FixedGeocoder::default());
    let donor = w
        .client("d@example.org", "Dev", Role::Donor, None)
        .await
        .with_geocoder(geocoder.clone());

    let mut editor = donor.post_editor();
    let mut draft = PostDraft::new("Fruit crates");
    draft.pickup_address = Some("  Station Road, Thane ".into());
    let post = editor.submit(draft).await.unwrap();

    assert_eq!(post.location(), Some(THANE));
    assert_eq!(post.pickup_address.as_deref(), Some("Station Road, Thane"));
    assert_eq!(geocoder.lookups.load(Ordering::SeqCst), 1);

    // An explicit location wins over the address.
    let mut draft = PostDraft::new("Fruit crates");
    draft.pickup_address = Some("Somewhere".into());
    draft.location = Some(PUNE);
    let post = donor.post_editor().submit(draft).await.unwrap();
    assert_eq!(post.location(), Some(PUNE));
    assert_eq!(geocoder.lookups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn editor_without_profile_is_refused() {
    let w = World::new().await;
    let ctx = ClientContext::new(Arc::new(w.backend.connect()), Config::default());
    let mut editor = ctx.post_editor();
    editor.add_images(vec![png("a.png")]).unwrap();
    assert!(matches!(
        editor.submit(PostDraft::new("Rice")).await,
        Err(ClientError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn directory_counts_views_by_others() {
    let w = World::new().await;
    let donor = w.client("d@example.org", "Dev", Role::Donor, Some(MUMBAI)).await;
    let near = w.client("a@example.org", "Annam", Role::Ngo, Some(THANE)).await;
    let far = w.client("b@example.org", "Bhojan", Role::Ngo, Some(PUNE)).await;

    let names = |ngos: Vec<nivaran_types::models::NearbyNgo>| ngos.into_iter().map(|n| n.name).collect::<Vec<_>>();
    assert_eq!(names(donor.directory().nearby_ngos(MUMBAI, 30.0).await), vec!["Annam"]);

    // Requests beyond the maximum radius are clamped, which still excludes Pune.
    assert_eq!(names(donor.directory().nearby_ngos(MUMBAI, 10_000.0).await), vec!["Annam"]);
    assert_eq!(names(donor.directory().nearby_ngos(THANE, 0.0).await), vec!["Annam"]);
    assert_eq!(names(far.directory().nearby_ngos(PUNE, 40.0).await), vec!["Bhojan"]);

    let page = donor.directory().view_ngo(me(&near)).await.unwrap();
    assert_eq!(page.user.name, "Annam");
    donor.directory().view_ngo(me(&far)).await.unwrap();
    donor.directory().view_ngo(me(&near)).await.unwrap();

    // The NGO opening its own page is not counted.
    near.directory().view_ngo(me(&near)).await.unwrap();
    assert_eq!(near.directory().my_view_stats().await.unwrap(), 2);
    assert_eq!(near.directory().view_ngo(me(&near)).await.unwrap().views, 2);

    let recent: Vec<_> = donor
        .directory()
        .recently_viewed()
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.ngo.name)
        .collect();
    assert_eq!(recent, vec!["Annam", "Bhojan"]);
}

#[tokio::test]
async fn donations_are_seen_from_both_sides() {
    let w = World::new().await;
    let donor = w.client("d@example.org", "Dev", Role::Donor, None).await;
    let ngo = w.client("n@example.org", "Annam", Role::Ngo, None).await;

    let record = donor
        .donations()
        .record(me(&ngo), None, Some("20 plates".into()))
        .await
        .unwrap();
    assert_eq!(record.status, DonationStatus::Pending);
    assert_eq!(record.donor_id, me(&donor));

    let updated = ngo
        .donations()
        .set_status(record.id, DonationStatus::Completed, None)
        .await
        .unwrap();
    assert_eq!(updated.status, DonationStatus::Completed);

    assert_eq!(donor.donations().history().await.len(), 1);
    let ngo_history = ngo.donations().history().await;
    assert_eq!(ngo_history.len(), 1);
    assert_eq!(ngo_history[0].status, DonationStatus::Completed);

    assert!(matches!(
        donor.donations().record(me(&donor), None, None).await,
        Err(ClientError::ValidationFailed(_))
    ));
}
