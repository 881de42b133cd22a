//! Subcommand implementations.
//!
//! Each command opens the collections it needs through a `Context`, works
//! on the cache, and flushes pending changelog writes before returning.

use std::io::{self, Write};
use std::sync::Arc;

use alithia_core::auth::resolve_role;
use alithia_core::cache::{CacheError, ChangeLog};
use alithia_core::models::PRESET_NAMES;
use alithia_core::{
    CollectionCache, CollectionSpec, Config, Fields, Filter, FirestoreClient, RecordId, Session,
    ViewState, Viewer,
};
use anyhow::{anyhow, bail, Context as _, Result};
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::render;

/// Search results shown before the rest are summarised.
const MAX_SEARCH_RESULTS: usize = 15;

type Cache = CollectionCache<FirestoreClient>;

/// Signed-in state shared by every collection command.
struct Context {
    config: Config,
    client: FirestoreClient,
    viewer: Viewer,
    changelog: Arc<ChangeLog<FirestoreClient>>,
}

impl Context {
    /// Load the saved session, refreshing the id token when it is close to
    /// expiry, and resolve the viewer's role.
    async fn connect() -> Result<Self> {
        let config = Config::load()?;
        let (project, key) = config.credentials()?;
        let client = FirestoreClient::new(project, key)?;

        let mut session = Session::new(config.session_dir()?);
        session.load()?;
        let Some(mut data) = session.data.clone() else {
            bail!("Not signed in. Run `alithia login` first.");
        };

        if data.needs_refresh() {
            debug!(minutes_left = data.minutes_until_expiry(), "Refreshing id token");
            data = client
                .refresh_session(&data)
                .await
                .context("Session expired. Run `alithia login` again")?;
            session.update(data.clone());
            session.save()?;
        }

        let client = client.with_token(data.id_token.clone());
        let role = resolve_role(&client, &data.uid).await;
        let viewer = Viewer::from_session(&data, role);
        debug!(uid = %viewer.uid, ?role, "Connected");

        let changelog = Arc::new(ChangeLog::new(client.clone(), &viewer));
        Ok(Self {
            config,
            client,
            viewer,
            changelog,
        })
    }

    /// Open and load a collection. A failed load is not an error here: it is
    /// reported through the cache's view state.
    async fn open(&self, name: &str) -> Result<Cache> {
        let spec = preset(name)?;
        let mut cache = CollectionCache::new(self.client.clone(), spec).with_changelog(self.changelog.clone());
        if let Err(e) = cache.refresh_if_stale(self.config.stale_after()).await {
            debug!(collection = name, error = %e, "Continuing with unloaded cache");
        }
        Ok(cache)
    }

    /// Open a collection that must be loaded before it can be changed.
    async fn open_loaded(&self, name: &str) -> Result<Cache> {
        let cache = self.open(name).await?;
        if !cache.is_loaded() {
            bail!(
                "Could not load {}: {}",
                name,
                cache.last_error().unwrap_or("unknown error")
            );
        }
        Ok(cache)
    }
}

fn preset(name: &str) -> Result<CollectionSpec> {
    CollectionSpec::preset(name)
        .ok_or_else(|| anyhow!("Unknown collection '{}' (expected one of: {})", name, PRESET_NAMES.join(", ")))
}

/// Turn a cache failure into the message shown to the user.
fn user_error(err: CacheError) -> anyhow::Error {
    debug!(error = %err, "Operation failed");
    anyhow!(err.user_message())
}

/// Split `field=value`. The field is trimmed; the value is kept as typed.
fn parse_assignment(arg: &str) -> Result<(String, String)> {
    let (field, value) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected FIELD=VALUE, got '{}'", arg))?;
    let field = field.trim();
    if field.is_empty() {
        bail!("Missing field name in '{}'", arg);
    }
    Ok((field.to_string(), value.to_string()))
}

fn parse_fields(args: &[String]) -> Result<Fields> {
    let mut fields = Fields::new();
    for arg in args {
        let (field, value) = parse_assignment(arg)?;
        fields.insert(field, Value::String(value));
    }
    Ok(fields)
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

// ============================================================================
// Session
// ============================================================================

pub async fn login(email: Option<String>) -> Result<()> {
    let config = Config::load()?;
    let (project, key) = config.credentials()?;
    let client = FirestoreClient::new(project, key)?;

    let email = match email {
        Some(email) => email,
        None => prompt_email(config.last_email.as_deref())?,
    };
    if email.is_empty() {
        bail!("Email is required");
    }
    let password = rpassword::prompt_password("Password: ")?;

    println!("Signing in...");
    let data = client
        .authenticate(&email, &password)
        .await
        .context("Sign-in failed")?;

    let mut session = Session::new(config.session_dir()?);
    session.update(data.clone());
    session.save()?;
    Config::remember_email(&email)?;

    let role = resolve_role(&client.with_token(data.id_token.clone()), &data.uid).await;
    let viewer = Viewer::from_session(&data, role);
    println!("Signed in as {}{}", viewer.name, if viewer.is_keeper() { " (keeper)" } else { "" });
    Ok(())
}

fn prompt_email(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();
    Ok(match (input.is_empty(), last) {
        (true, Some(last)) => last.to_string(),
        _ => input.to_string(),
    })
}

pub fn logout() -> Result<()> {
    let config = Config::load()?;
    let mut session = Session::new(config.session_dir()?);
    session.clear()?;
    println!("Signed out.");
    Ok(())
}

// ============================================================================
// Reading
// ============================================================================

pub async fn list(collection: &str, filters: &[String], mine: bool, query: Option<&str>, json: bool) -> Result<()> {
    let ctx = Context::connect().await?;
    let mut cache = ctx.open(collection).await?;

    for arg in filters {
        let (field, value) = parse_assignment(arg)?;
        let filter = Filter::for_field(cache.spec(), &field, &value);
        cache.set_filter(filter);
    }
    if mine {
        cache.set_filter(Filter::Author(ctx.viewer.uid.clone()));
    }
    if let Some(query) = query {
        cache.set_filter(Filter::Text(query.to_string()));
    }

    match cache.view_state() {
        ViewState::NotLoaded => bail!("{} has not been loaded", collection),
        ViewState::CouldNotLoad(error) => bail!("Could not load {}: {}", collection, error),
        ViewState::Empty => println!("No {} yet.", collection),
        ViewState::NoMatches => println!("No {} match the current filters.", collection),
        ViewState::Ready(records) if json => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        ViewState::Ready(records) => {
            let now = Utc::now();
            for record in &records {
                println!("{}", render::record_line(record, cache.spec(), now));
                if let Some(preview) = render::preview_line(record, cache.spec()) {
                    println!("{}", preview);
                }
            }
            println!(
                "\n{} of {} {} (loaded {})",
                records.len(),
                cache.len(),
                collection,
                cache.age_display()
            );
        }
    }
    Ok(())
}

/// Reject queries too short to filter `spec`'s collection.
fn check_query(spec: &CollectionSpec, query: &str) -> Result<()> {
    let min = spec.min_query_chars.max(1);
    if query.trim().chars().count() < min {
        let unit = if min == 1 { "character" } else { "characters" };
        bail!("Enter at least {} {} to search", min, unit);
    }
    Ok(())
}

pub async fn search(collection: &str, query: &str) -> Result<()> {
    check_query(&preset(collection)?, query)?;

    let ctx = Context::connect().await?;
    let cache = ctx.open_loaded(collection).await?;

    let hits = cache.search(query);
    if hits.is_empty() {
        println!("No results for \"{}\".", query.trim());
        return Ok(());
    }

    for hit in hits.iter().take(MAX_SEARCH_RESULTS) {
        println!("{}", render::search_hit(hit, cache.spec()));
    }
    if hits.len() > MAX_SEARCH_RESULTS {
        println!("\nShowing {} of {} results.", MAX_SEARCH_RESULTS, hits.len());
    }
    Ok(())
}

pub async fn stats(collection: Option<&str>) -> Result<()> {
    let ctx = Context::connect().await?;

    let Some(collection) = collection else {
        let caches = futures::future::join_all(PRESET_NAMES.iter().map(|name| ctx.open(name))).await;
        for (name, cache) in PRESET_NAMES.iter().zip(caches) {
            let cache = cache?;
            match cache.view_state() {
                ViewState::CouldNotLoad(error) => println!("{:<12} could not load ({})", name, error),
                _ => println!(
                    "{:<12} {:>5}   yours: {}",
                    name,
                    cache.len(),
                    cache.count_by_author(&ctx.viewer.uid)
                ),
            }
        }
        return Ok(());
    };

    let cache = ctx.open_loaded(collection).await?;
    println!(
        "{}: {} total, {} yours (loaded {})",
        collection,
        cache.len(),
        cache.count_by_author(&ctx.viewer.uid),
        cache.age_display()
    );
    for facet in &cache.spec().facets {
        if let Some(counts) = cache.counts(&facet.field) {
            print!("\n{}", render::facet_table(&counts));
        }
    }
    Ok(())
}

// ============================================================================
// Writing
// ============================================================================

pub async fn add(collection: &str, args: &[String]) -> Result<()> {
    let ctx = Context::connect().await?;
    let mut cache = ctx.open_loaded(collection).await?;
    if !ctx.viewer.can_create(cache.spec()) {
        bail!("Only keepers can add to {}", collection);
    }

    let mut fields = parse_fields(args)?;
    fields.extend(ctx.viewer.author_fields());
    let title_field = cache.spec().title_field.clone();

    let result = cache.create(fields).await;
    ctx.changelog.flush().await;
    let record = result.map_err(user_error)?;
    println!("Added {}: {}", record.id, record.text_or(&title_field, "Untitled"));
    Ok(())
}

pub async fn edit(collection: &str, id: &str, args: &[String]) -> Result<()> {
    let ctx = Context::connect().await?;
    let mut cache = ctx.open_loaded(collection).await?;
    let id = RecordId::from(id);

    let record = cache
        .get(&id)
        .ok_or_else(|| anyhow!("No record {} in {}", id, collection))?;
    if !ctx.viewer.can_modify(cache.spec(), record) {
        bail!("You do not have permission to edit {}", id);
    }

    let fields = parse_fields(args)?;
    let title_field = cache.spec().title_field.clone();
    let result = cache.update(&id, fields).await;
    ctx.changelog.flush().await;
    let record = result.map_err(user_error)?;
    println!("Updated {}: {}", record.id, record.text_or(&title_field, "Untitled"));
    Ok(())
}

pub async fn remove(collection: &str, id: &str, yes: bool) -> Result<()> {
    let ctx = Context::connect().await?;
    let mut cache = ctx.open_loaded(collection).await?;
    let id = RecordId::from(id);

    let record = cache
        .get(&id)
        .ok_or_else(|| anyhow!("No record {} in {}", id, collection))?;
    if !ctx.viewer.can_modify(cache.spec(), record) {
        bail!("You do not have permission to delete {}", id);
    }

    let title = record.text_or(&cache.spec().title_field, "Untitled").to_string();
    if !yes && !confirm(&format!("Delete \"{}\"?", title))? {
        println!("Cancelled.");
        return Ok(());
    }

    cache.delete(&id).await.map_err(user_error)?;
    println!("Deleted {}: {}", id, title);
    Ok(())
}
