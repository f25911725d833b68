//! Convene Demo
//!
//! Walks one event through its life against in-process state:
//! - Registration of an organizer and two attendees
//! - Event creation with a single moderated seat, then publication
//! - A request confirmed by the organizer, a second one refused for capacity
//! - A like from the confirmed attendee
//!
//! The analytics service is optional. Without one, view counts fall back to
//! zero and the warnings show up in the log.
//!
//! # Usage
//!
//! ```bash
//! STATS_SERVER_URL=http://localhost:9090 cargo run --bin demo
//! ```

use chrono::{Duration, Utc};
use convene::{
    Actor, ApiError, Config, Location, ModerationDecision, NewEvent, Platform, ReactionKind,
};
use convene_runtime::metrics::MetricsRecorder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},convene=debug", config.app.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut metrics = MetricsRecorder::new();
    metrics.install()?;
    convene::metrics::describe_metrics();

    println!("\n============================================");
    println!("   Convene - Live Demo");
    println!("============================================\n");

    let platform = Platform::new(&config)?;

    // Step 1: people and a category
    println!("1. Registering users...");
    let organizer = platform.register_user("Olga Organizer", "olga@example.com").await?;
    let alice = platform.register_user("Alice", "alice@example.com").await?;
    let bob = platform.register_user("Bob", "bob@example.com").await?;
    let category = platform.add_category("Outdoors").await?;
    println!("   organizer={} alice={} bob={} category={}\n", organizer.id, alice.id, bob.id, category.id);

    // Step 2: one moderated seat
    println!("2. Creating and publishing an event with one seat...");
    let created = platform
        .create_event(
            organizer.id,
            NewEvent {
                title: "Harbour night swim".to_string(),
                annotation: "A night swim across the harbour".to_string(),
                description: "Meet at the pier, bring a towel and a torch".to_string(),
                category: category.id,
                location: Location { lat: 59.9, lon: 10.7 },
                event_date: Utc::now() + Duration::days(3),
                paid: Some(false),
                participant_limit: Some(1),
                request_moderation: Some(true),
            },
        )
        .await?;
    let event_id = created.event.id;
    let published = platform.publish_event(event_id).await?;
    println!("   event={event_id} state={}\n", published.event.state);

    // Step 3: admission
    println!("3. Alice asks to attend...");
    let request = platform.submit_request(event_id, alice.id).await?;
    println!("   request={} status={}", request.id, request.status);

    let moderated = platform
        .moderate_requests(
            event_id,
            Actor::Initiator(organizer.id),
            vec![request.id],
            ModerationDecision::Confirm,
        )
        .await?;
    println!("   confirmed={}\n", moderated.confirmed.len());

    println!("4. Bob asks to attend the full event...");
    match platform.submit_request(event_id, bob.id).await {
        Ok(request) => println!("   unexpected: request {} accepted", request.id),
        Err(error) => {
            let body = ApiError::from(&error);
            println!("   refused: {}\n", serde_json::to_string_pretty(&body)?);
        },
    }

    // Step 5: rating
    println!("5. Alice likes the event...");
    let rated = platform.add_reaction(event_id, alice.id, ReactionKind::Like).await?;
    let organizer = platform.get_user(organizer.id).await?;
    println!("   event rating={} organizer rating={}\n", rated.event.rating, organizer.rating);

    // Step 6: public read
    println!("6. Final public view:");
    let view = platform.get_public_event(event_id, "127.0.0.1").await?;
    println!("{}", serde_json::to_string_pretty(&view)?);

    platform.shutdown(config.command_timeout()).await?;

    if let Some(rendered) = metrics.render() {
        println!("\nMetrics:\n{rendered}");
    }

    println!("\nDemo completed successfully!");
    Ok(())
}
