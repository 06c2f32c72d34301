//! Availability state for the box and day currently on screen.
//!
//! Every fetch is tagged with a [`Ticket`]. Only the most recently issued
//! ticket for the current selection may update the view, so a slow answer
//! for an older selection or an older refresh is dropped instead of
//! overwriting newer data.

use chrono::{NaiveDate, NaiveTime};
use tracing::debug;

use crate::availability::{derive_free_intervals, normalize_free_blocks};
use crate::interval::TimeRange;
use crate::push::ScheduleChanged;
use crate::slots::{self, Granularity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
    pub resource_id: u32,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    selection: Selection,
    generation: u64,
}

impl Ticket {
    pub fn selection(&self) -> Selection {
        self.selection
    }
}

/// Keeps at most one fetch in flight. Requests arriving while a fetch runs
/// collapse into a single follow-up fetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshGate {
    in_flight: bool,
    pending: bool,
}

impl RefreshGate {
    /// `true` when the caller should start a fetch now.
    pub fn request(&mut self) -> bool {
        if self.in_flight {
            self.pending = true;
            false
        } else {
            self.in_flight = true;
            true
        }
    }

    /// Report that the running fetch finished. `true` when the caller should
    /// start the follow-up fetch; the gate then stays busy until it finishes.
    pub fn finish(&mut self) -> bool {
        if self.pending {
            self.pending = false;
            true
        } else {
            self.in_flight = false;
            false
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }
}

#[derive(Debug, Clone)]
pub struct AvailabilityView {
    window: TimeRange,
    granularity: Granularity,
    selection: Option<Selection>,
    generation: u64,
    free: Vec<TimeRange>,
    loaded: bool,
}

impl AvailabilityView {
    pub fn new(window: TimeRange, granularity: Granularity) -> Self {
        Self {
            window,
            granularity,
            selection: None,
            generation: 0,
            free: Vec::new(),
            loaded: false,
        }
    }

    fn issue(&mut self, selection: Selection) -> Ticket {
        self.generation += 1;
        Ticket {
            selection,
            generation: self.generation,
        }
    }

    /// Switch to another box or day. Data for the previous selection is
    /// cleared and all outstanding tickets become stale.
    pub fn select(&mut self, selection: Selection) -> Ticket {
        self.selection = Some(selection);
        self.free.clear();
        self.loaded = false;
        self.issue(selection)
    }

    /// Ticket for re-fetching the current selection.
    pub fn refresh(&mut self) -> Option<Ticket> {
        let selection = self.selection?;
        Some(self.issue(selection))
    }

    /// A push notification only triggers a refresh for the selected box.
    pub fn on_change(&mut self, change: ScheduleChanged) -> Option<Ticket> {
        match self.selection {
            Some(sel) if sel.resource_id == change.resource_id => self.refresh(),
            _ => None,
        }
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.selection == Some(ticket.selection) && self.generation == ticket.generation
    }

    fn replace(&mut self, ticket: &Ticket, free: Vec<TimeRange>) -> bool {
        if !self.is_current(ticket) {
            debug!(
                "Discarding stale availability for box {} on {}",
                ticket.selection.resource_id, ticket.selection.date
            );
            return false;
        }
        self.free = free;
        self.loaded = true;
        true
    }

    /// Recompute from free blocks reported by the server.
    pub fn apply_free_blocks(&mut self, ticket: &Ticket, blocks: &[TimeRange]) -> bool {
        let free = normalize_free_blocks(self.window, blocks);
        self.replace(ticket, free)
    }

    /// Recompute from the box's busy periods.
    pub fn apply_busy(&mut self, ticket: &Ticket, busy: &[TimeRange]) -> bool {
        let free = derive_free_intervals(self.window, busy);
        self.replace(ticket, free)
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn free(&self) -> &[TimeRange] {
        &self.free
    }

    pub fn start_times(&self) -> Vec<NaiveTime> {
        slots::start_times(&self.free, self.granularity)
    }

    pub fn end_times(&self, start: NaiveTime) -> Vec<NaiveTime> {
        slots::end_times(&self.free, start, self.granularity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::{r, t};

    fn view() -> AvailabilityView {
        AvailabilityView::new(r("08:00", "18:00"), Granularity::default())
    }

    fn sel(resource_id: u32, day: u32) -> Selection {
        Selection {
            resource_id,
            date: NaiveDate::from_ymd_opt(2026, 10, day).unwrap(),
        }
    }

    #[test]
    fn test_gate_coalesces_requests_during_a_fetch() {
        let mut gate = RefreshGate::default();
        assert!(gate.request());
        assert!(!gate.request());
        assert!(!gate.request());
        assert!(!gate.request());
        assert!(gate.is_busy());

        // one follow-up for the three requests above
        assert!(gate.finish());
        assert!(gate.is_busy());
        assert!(!gate.finish());
        assert!(!gate.is_busy());

        assert!(gate.request());
        assert!(!gate.finish());
    }

    #[test]
    fn test_response_for_previous_selection_is_discarded() {
        let mut v = view();
        let first = v.select(sel(1, 20));
        let second = v.select(sel(2, 20));

        assert!(!v.apply_busy(&first, &[r("09:00", "10:00")]));
        assert!(!v.is_loaded());

        assert!(v.apply_busy(&second, &[r("13:00", "14:00")]));
        assert_eq!(v.free(), &[r("08:00", "13:00"), r("14:00", "18:00")]);
    }

    #[test]
    fn test_older_refresh_loses_to_newer() {
        let mut v = view();
        let initial = v.select(sel(1, 20));
        let older = v.refresh().unwrap();
        let newer = v.refresh().unwrap();

        assert!(v.apply_free_blocks(&newer, &[r("10:00", "12:00")]));
        assert!(!v.apply_free_blocks(&older, &[r("08:00", "18:00")]));
        assert!(!v.apply_free_blocks(&initial, &[r("08:00", "18:00")]));
        assert_eq!(v.free(), &[r("10:00", "12:00")]);
        assert_eq!(v.start_times(), vec![t("10:00"), t("10:30"), t("11:00"), t("11:30")]);
        assert_eq!(v.end_times(t("11:00")), vec![t("11:30"), t("12:00")]);
    }

    #[test]
    fn test_notifications_for_other_boxes_are_ignored() {
        let mut v = view();
        assert!(v.on_change(ScheduleChanged { resource_id: 1 }).is_none());

        let ticket = v.select(sel(1, 20));
        assert!(v.on_change(ScheduleChanged { resource_id: 2 }).is_none());
        assert!(v.is_current(&ticket));

        let refresh = v.on_change(ScheduleChanged { resource_id: 1 }).unwrap();
        assert_eq!(refresh.selection(), sel(1, 20));
        assert!(!v.is_current(&ticket));
    }

    #[test]
    fn test_recompute_replaces_previous_result() {
        let mut v = view();
        let ticket = v.select(sel(1, 20));
        v.apply_busy(&ticket, &[r("09:00", "10:00")]);

        let ticket = v.refresh().unwrap();
        v.apply_busy(&ticket, &[]);
        assert_eq!(v.free(), &[r("08:00", "18:00")]);

        v.select(sel(1, 21));
        assert!(v.free().is_empty());
        assert_eq!(v.selection(), Some(sel(1, 21)));
    }
}
