use std::future::Future;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::availability::derive_free_intervals;
use crate::client::BoxApiClient;
use crate::clock;
use crate::config;
use crate::conflicts;
use crate::error::{BookingError, ValidationError};
use crate::interval::{parse_time, TimeRange};
use crate::models::{BookingRecord, Config};
use crate::push::{self, PushEvent};
use crate::settings::{self, FontSize, Theme};
use crate::slots::{self, Granularity};
use crate::stats::Occupancy;
use crate::view::{AvailabilityView, RefreshGate, Selection, Ticket};
use crate::wizard::{BookingWizard, WizardStep};

/// Everything a command needs, built from the config file.
pub struct Env {
    pub config: Config,
    pub client: BoxApiClient,
    pub tz: Tz,
    pub window: TimeRange,
    pub granularity: Granularity,
}

impl Env {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config = config::load_config(config_path)?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let tz = config::timezone(&config)?;
        let window = config.workday.window()?;
        let granularity = config.workday.granularity()?;
        let client = BoxApiClient::new(
            &config.api.base_url,
            Duration::from_secs(config.api.timeout_secs),
        )?;
        Ok(Self {
            config,
            client,
            tz,
            window,
            granularity,
        })
    }

    /// Boxes listed in the config; any id is accepted when none are listed.
    fn ensure_known_box(&self, id: u32) -> Result<(), ValidationError> {
        if self.config.boxes.is_empty() || self.config.boxes.iter().any(|b| b.id == id) {
            Ok(())
        } else {
            Err(ValidationError::UnknownResource(id))
        }
    }
}

/// `YYYY-MM-DD`, or today when omitted.
pub fn resolve_date(raw: Option<&str>, tz: Tz) -> Result<NaiveDate> {
    match raw {
        Some(s) => clock::parse_date(s)
            .with_context(|| format!("Invalid date '{s}', expected YYYY-MM-DD")),
        None => Ok(clock::today(tz)),
    }
}

fn join_times(times: &[NaiveTime]) -> String {
    if times.is_empty() {
        return "none".to_string();
    }
    times
        .iter()
        .map(|t| t.format("%H:%M").to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_ranges(ranges: &[TimeRange]) -> String {
    if ranges.is_empty() {
        return "none".to_string();
    }
    ranges
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub async fn run_free(env: &Env, box_id: u32, date: NaiveDate, from: Option<&str>) -> Result<()> {
    env.ensure_known_box(box_id)?;
    let free = env.client.free_intervals(env.window, box_id, date).await?;

    println!(
        "Box {} on {} ({}-minute slots)",
        box_id,
        date,
        env.granularity.as_minutes()
    );
    println!("  Free:   {}", join_ranges(&free));
    println!(
        "  Starts: {}",
        join_times(&slots::start_times(&free, env.granularity))
    );
    if let Some(raw) = from {
        let start = parse_time(raw)?;
        println!(
            "  Ends from {}: {}",
            start.format("%H:%M"),
            join_times(&slots::end_times(&free, start, env.granularity))
        );
    }
    Ok(())
}

pub struct BookArgs<'a> {
    pub date: NaiveDate,
    pub start: &'a str,
    pub end: &'a str,
    pub box_id: Option<u32>,
    pub responsible: &'a str,
    pub notes: Option<&'a str>,
    pub dry_run: bool,
}

pub async fn run_book(env: &Env, args: BookArgs<'_>) -> Result<()> {
    let mut wizard = BookingWizard::new();
    wizard.choose_time(
        args.date,
        parse_time(args.start)?,
        parse_time(args.end)?,
        clock::today(env.tz),
    )?;

    let candidate_ids: Vec<u32> = match args.box_id {
        Some(id) => {
            env.ensure_known_box(id)?;
            vec![id]
        }
        None => env.config.boxes.iter().map(|b| b.id).collect(),
    };
    if candidate_ids.is_empty() {
        bail!("No boxes configured; pass --box to choose one");
    }

    let mut candidates: Vec<(u32, Vec<TimeRange>)> = Vec::new();
    for id in candidate_ids {
        match env.client.free_intervals(env.window, id, args.date).await {
            Ok(free) => candidates.push((id, free)),
            Err(e) => warn!("Skipping box {}: {}", id, e),
        }
    }

    let recommended = wizard.recommend(&candidates);
    info!("Boxes free for the requested time: {:?}", recommended);
    let chosen = match args.box_id.or_else(|| recommended.first().copied()) {
        Some(id) => id,
        None => bail!(
            "No box is free on {} for {}",
            wizard.date().unwrap_or(args.date),
            wizard.range().map(|r| r.to_string()).unwrap_or_default()
        ),
    };
    let free = candidates
        .iter()
        .find(|(id, _)| *id == chosen)
        .map(|(_, free)| free.as_slice())
        .with_context(|| format!("Could not load availability for box {chosen}"))?;
    wizard.choose_resource(chosen, free)?;

    if let Some(notes) = args.notes {
        wizard.set_notes(notes)?;
    }
    wizard.choose_responsible(args.responsible)?;
    let draft = wizard.draft()?;

    if args.dry_run {
        println!(
            "[DRY RUN] Would book box {} on {} {} for {}",
            draft.resource_id, draft.date, draft.range, draft.responsible
        );
        wizard.cancel()?;
        return Ok(());
    }

    let outcome = env.client.create_booking(&draft).await;
    wizard.complete(outcome)?;

    match (wizard.step(), wizard.record()) {
        (WizardStep::Confirmed, Some(record)) => {
            println!(
                "Booked box {} on {} {} (booking {})",
                record.booking.resource_id, record.booking.date, record.booking.range, record.id
            );
            Ok(())
        }
        (WizardStep::SelectResource, _) => bail!(
            "Box {} was taken in the meantime: {}. Choose another box and resubmit.",
            chosen,
            wizard.error().unwrap_or("conflict")
        ),
        _ => bail!(
            "Booking not submitted: {}",
            wizard.error().unwrap_or("unknown error")
        ),
    }
}

pub async fn run_release(env: &Env, id: u64) -> Result<()> {
    env.client.release_booking(id).await?;
    println!("Released booking {}", id);
    Ok(())
}

fn print_booking(b: &BookingRecord, conflicting: bool) {
    let marker = if conflicting { " [conflict]" } else { "" };
    print!(
        "  #{} box {} {} {} ({} min): {}",
        b.id,
        b.booking.resource_id,
        b.booking.date,
        b.booking.range,
        b.booking.range.minutes(),
        b.booking.responsible
    );
    if !b.booking.notes.is_empty() {
        print!(" ({})", b.booking.notes);
    }
    println!("{}", marker);
}

pub async fn run_bookings(env: &Env, date: NaiveDate, box_id: Option<u32>) -> Result<()> {
    let mut bookings = env.client.get_bookings(date, box_id).await?;
    if bookings.is_empty() {
        println!("No bookings on {}.", date);
        return Ok(());
    }
    bookings.sort_by_key(|b| (b.booking.resource_id, b.booking.range.start()));

    let flagged = conflicts::conflicting_ids(&conflicts::find_conflicts(&bookings));
    println!("Bookings on {}:\n", date);
    for b in &bookings {
        print_booking(b, flagged.contains(&b.id));
    }
    Ok(())
}

pub async fn run_conflicts(env: &Env, date: NaiveDate, box_id: Option<u32>) -> Result<()> {
    let bookings = env.client.get_bookings(date, box_id).await?;
    let marks = conflicts::find_conflicts(&bookings);
    if marks.is_empty() {
        println!("No conflicts on {}.", date);
        return Ok(());
    }

    println!("Conflicts on {}:\n", date);
    for m in &marks {
        let find = |id: u64| bookings.iter().find(|b| b.id == id);
        if let (Some(a), Some(b)) = (find(m.booking_id), find(m.conflicting_booking_id)) {
            println!(
                "  box {}: #{} {} overlaps #{} {}",
                a.booking.resource_id, a.id, a.booking.range, b.id, b.booking.range
            );
        }
    }
    Ok(())
}

pub async fn run_status(env: &Env, date: NaiveDate, at: Option<&str>) -> Result<()> {
    if env.config.boxes.is_empty() {
        bail!("No boxes configured");
    }
    let at = match at {
        Some(raw) => parse_time(raw)?,
        None => clock::time_of_day(env.tz),
    };
    let bookings = env.client.get_bookings(date, None).await?;

    println!("Box status on {} at {}:\n", date, at.format("%H:%M"));
    for entry in &env.config.boxes {
        let status = conflicts::status_at(&bookings, entry.id, date, at);
        let busy: Vec<TimeRange> = bookings
            .iter()
            .filter(|b| b.booking.resource_id == entry.id && b.booking.date == date)
            .map(|b| b.booking.range)
            .collect();
        let free = derive_free_intervals(env.window, &busy);
        println!(
            "  Box {:<4} {:<6} {:<10} free: {}",
            entry.id,
            entry.corridor.as_deref().unwrap_or("-"),
            status,
            join_ranges(&free)
        );
    }
    Ok(())
}

/// Occupancy per configured box (or only `box_id`) summed over `days` days
/// starting at `from`.
pub async fn collect_occupancy(
    env: &Env,
    from: NaiveDate,
    days: u32,
    box_id: Option<u32>,
) -> Result<Vec<(u32, Occupancy)>> {
    if days == 0 {
        bail!("--days must be at least 1");
    }
    let ids: Vec<u32> = match box_id {
        Some(id) => vec![id],
        None => env.config.boxes.iter().map(|b| b.id).collect(),
    };
    if ids.is_empty() {
        bail!("No boxes configured");
    }

    let mut totals: Vec<(u32, Occupancy)> =
        ids.iter().map(|id| (*id, Occupancy::default())).collect();
    for date in from.iter_days().take(days as usize) {
        let bookings = env.client.get_bookings(date, box_id).await?;
        for (id, total) in totals.iter_mut() {
            let busy: Vec<TimeRange> = bookings
                .iter()
                .filter(|b| b.booking.resource_id == *id && b.booking.date == date)
                .map(|b| b.booking.range)
                .collect();
            *total += Occupancy::for_day(env.window, &busy);
        }
    }
    Ok(totals)
}

fn print_occupancy(label: &str, occ: &Occupancy) {
    println!(
        "  {:<10} {:>7.2}% {:>4} bookings  avg {:>6.2} min  occupied {:>5}  free {:>5}  idle {:>5}",
        label,
        occ.occupancy_percent(),
        occ.bookings,
        occ.average_booking_minutes(),
        occ.occupied_minutes,
        occ.free_minutes(),
        occ.idle_minutes
    );
}

pub async fn run_stats(env: &Env, from: NaiveDate, days: u32, box_id: Option<u32>) -> Result<()> {
    let per_box = collect_occupancy(env, from, days, box_id).await?;
    println!("Occupancy from {} over {} day(s):\n", from, days);
    for (id, occ) in &per_box {
        print_occupancy(&format!("Box {}", id), occ);
    }
    if per_box.len() > 1 {
        let total: Occupancy = per_box.iter().map(|(_, occ)| *occ).sum();
        print_occupancy("Total", &total);
    }
    Ok(())
}

type FetchResult = (Ticket, Result<Vec<TimeRange>, BookingError>);

fn spawn_fetch(client: &BoxApiClient, ticket: Ticket, tx: &mpsc::Sender<FetchResult>) {
    let client = client.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let sel = ticket.selection();
        let result = client.get_free_blocks(sel.resource_id, sel.date).await;
        let _ = tx.send((ticket, result)).await;
    });
}

fn print_view(view: &AvailabilityView) {
    if !view.is_loaded() {
        return;
    }
    if let Some(sel) = view.selection() {
        println!(
            "[{}] box {} on {}: free {} | starts {}",
            chrono::Local::now().format("%H:%M:%S"),
            sel.resource_id,
            sel.date,
            join_ranges(view.free()),
            join_times(&view.start_times())
        );
    }
}

/// Follow one box's availability, re-deriving it on every change notification.
pub async fn run_watch(env: &Env, box_id: u32, date: NaiveDate) -> Result<()> {
    env.ensure_known_box(box_id)?;
    let push_url = env
        .config
        .api
        .push_url
        .clone()
        .context("No api.push_url configured")?;

    let events = push::subscribe(
        push_url,
        Duration::from_secs(env.config.api.reconnect_secs),
    );
    info!("Watching box {} on {} (Ctrl-C to stop)", box_id, date);
    let stop = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let selection = Selection {
        resource_id: box_id,
        date,
    };
    watch_loop(env, selection, events, stop).await;
    info!("Stopping watcher");
    Ok(())
}

/// Drive an [`AvailabilityView`] from push events until `stop` resolves.
async fn watch_loop(
    env: &Env,
    selection: Selection,
    mut events: mpsc::Receiver<PushEvent>,
    stop: impl Future<Output = ()>,
) {
    let mut view = AvailabilityView::new(env.window, env.granularity);
    let mut gate = RefreshGate::default();
    let (tx, mut results) = mpsc::channel::<FetchResult>(16);

    gate.request();
    spawn_fetch(&env.client, view.select(selection), &tx);
    tokio::pin!(stop);

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                let relevant = match event {
                    PushEvent::Connected => true,
                    PushEvent::Changed(change) => change.resource_id == selection.resource_id,
                };
                if relevant && gate.request() {
                    if let Some(ticket) = view.refresh() {
                        info!("Schedule changed for box {}, refreshing", selection.resource_id);
                        spawn_fetch(&env.client, ticket, &tx);
                    }
                }
            }
            Some((ticket, result)) = results.recv() => {
                match result {
                    Ok(blocks) => {
                        if view.apply_free_blocks(&ticket, &blocks) {
                            print_view(&view);
                        }
                    }
                    Err(e) => warn!("Failed to refresh box {}: {}", selection.resource_id, e),
                }
                if gate.finish() {
                    if let Some(ticket) = view.refresh() {
                        spawn_fetch(&env.client, ticket, &tx);
                    }
                }
            }
            _ = &mut stop => break,
        }
    }
}

pub fn run_settings(path: &Path, theme: Option<Theme>, font_size: Option<FontSize>) -> Result<()> {
    let mut current = settings::load(path);
    if theme.is_none() && font_size.is_none() {
        println!("{}", current);
        return Ok(());
    }
    if let Some(theme) = theme {
        current.theme = theme;
    }
    if let Some(size) = font_size {
        current.font_size = size;
    }
    settings::save(path, &current)?;
    println!("Saved {}", current);
    Ok(())
}
