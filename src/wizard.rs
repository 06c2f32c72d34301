//! The multi-step booking flow: time, box, responsible, confirm.
//!
//! The wizard only holds the draft and validates each step locally; the
//! caller performs the submission and reports its outcome with
//! [`BookingWizard::complete`].

use std::fmt;

use chrono::{NaiveDate, NaiveTime};

use crate::availability::ensure_bookable;
use crate::clock::ensure_not_past;
use crate::error::{BookingError, ValidationError};
use crate::interval::{Interval, TimeRange};
use crate::models::{Booking, BookingRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    SelectTime,
    SelectResource,
    SelectResponsible,
    Confirm,
    Confirmed,
    Cancelled,
}

impl WizardStep {
    pub fn is_terminal(self) -> bool {
        matches!(self, WizardStep::Confirmed | WizardStep::Cancelled)
    }

    fn previous(self) -> Option<Self> {
        match self {
            WizardStep::SelectResource => Some(WizardStep::SelectTime),
            WizardStep::SelectResponsible => Some(WizardStep::SelectResource),
            WizardStep::Confirm => Some(WizardStep::SelectResponsible),
            _ => None,
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WizardStep::SelectTime => "select time",
            WizardStep::SelectResource => "select box",
            WizardStep::SelectResponsible => "select responsible",
            WizardStep::Confirm => "confirm",
            WizardStep::Confirmed => "confirmed",
            WizardStep::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct BookingWizard {
    step: WizardStep,
    date: Option<NaiveDate>,
    range: Option<TimeRange>,
    resource_id: Option<u32>,
    responsible: Option<String>,
    notes: String,
    error: Option<String>,
    record: Option<BookingRecord>,
}

impl Default for BookingWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingWizard {
    pub fn new() -> Self {
        Self {
            step: WizardStep::SelectTime,
            date: None,
            range: None,
            resource_id: None,
            responsible: None,
            notes: String::new(),
            error: None,
            record: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    /// Message to show inline for the last failed action.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The server's record once the booking is confirmed.
    pub fn record(&self) -> Option<&BookingRecord> {
        self.record.as_ref()
    }

    pub fn range(&self) -> Option<TimeRange> {
        self.range
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    fn fail<T>(&mut self, err: ValidationError) -> Result<T, ValidationError> {
        self.error = Some(err.to_string());
        Err(err)
    }

    fn expect_step(
        &mut self,
        expected: WizardStep,
        action: &'static str,
    ) -> Result<(), ValidationError> {
        if self.step != expected {
            let step = self.step.to_string();
            return self.fail(ValidationError::WrongStep { action, step });
        }
        Ok(())
    }

    fn advance(&mut self, next: WizardStep) {
        self.error = None;
        self.step = next;
    }

    pub fn choose_time(
        &mut self,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        today: NaiveDate,
    ) -> Result<(), ValidationError> {
        self.expect_step(WizardStep::SelectTime, "choose a time")?;
        let range = match Interval::new(start, end) {
            Ok(range) => range,
            Err(e) => return self.fail(e),
        };
        if let Err(e) = ensure_not_past(date, today) {
            return self.fail(e);
        }

        self.date = Some(date);
        self.range = Some(range);
        self.advance(WizardStep::SelectResource);
        Ok(())
    }

    /// Boxes, in the given order, whose free intervals cover the chosen range.
    pub fn recommend(&self, candidates: &[(u32, Vec<TimeRange>)]) -> Vec<u32> {
        let Some(range) = self.range else {
            return Vec::new();
        };
        candidates
            .iter()
            .filter(|(_, free)| ensure_bookable(&range, free).is_ok())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn choose_resource(
        &mut self,
        resource_id: u32,
        free: &[TimeRange],
    ) -> Result<(), ValidationError> {
        self.expect_step(WizardStep::SelectResource, "choose a box")?;
        let Some(range) = self.range else {
            let step = self.step.to_string();
            return self.fail(ValidationError::WrongStep {
                action: "choose a box",
                step,
            });
        };
        if let Err(e) = ensure_bookable(&range, free) {
            return self.fail(e);
        }

        self.resource_id = Some(resource_id);
        self.advance(WizardStep::SelectResponsible);
        Ok(())
    }

    pub fn choose_responsible(&mut self, name: &str) -> Result<(), ValidationError> {
        self.expect_step(WizardStep::SelectResponsible, "choose a responsible")?;
        let name = name.trim();
        if name.is_empty() {
            return self.fail(ValidationError::MissingResponsible);
        }

        self.responsible = Some(name.to_string());
        self.advance(WizardStep::Confirm);
        Ok(())
    }

    pub fn set_notes(&mut self, notes: &str) -> Result<(), ValidationError> {
        if self.step.is_terminal() {
            let step = self.step.to_string();
            return self.fail(ValidationError::WrongStep {
                action: "edit notes",
                step,
            });
        }
        self.notes = notes.trim().to_string();
        Ok(())
    }

    /// The booking to submit. Only available at the confirm step.
    pub fn draft(&mut self) -> Result<Booking, ValidationError> {
        self.expect_step(WizardStep::Confirm, "submit")?;
        match (self.resource_id, self.date, self.range, self.responsible.clone()) {
            (Some(resource_id), Some(date), Some(range), Some(responsible)) => Ok(Booking {
                resource_id,
                date,
                range,
                responsible,
                notes: self.notes.clone(),
            }),
            _ => {
                let step = self.step.to_string();
                self.fail(ValidationError::WrongStep {
                    action: "submit",
                    step,
                })
            }
        }
    }

    /// Feed the server's answer to the submitted draft.
    ///
    /// A conflict sends the flow back to box selection; any other failure
    /// keeps it at the confirm step so the user can resubmit.
    pub fn complete(
        &mut self,
        outcome: Result<BookingRecord, BookingError>,
    ) -> Result<(), ValidationError> {
        self.expect_step(WizardStep::Confirm, "complete a submission")?;
        match outcome {
            Ok(record) => {
                self.record = Some(record);
                self.advance(WizardStep::Confirmed);
            }
            Err(BookingError::Conflict(msg)) => {
                self.resource_id = None;
                self.step = WizardStep::SelectResource;
                self.error = Some(msg);
            }
            Err(e) => {
                self.error = Some(e.to_string());
            }
        }
        Ok(())
    }

    pub fn back(&mut self) -> Result<(), ValidationError> {
        match self.step.previous() {
            Some(prev) => {
                self.advance(prev);
                Ok(())
            }
            None => {
                let step = self.step.to_string();
                self.fail(ValidationError::WrongStep {
                    action: "go back",
                    step,
                })
            }
        }
    }

    pub fn cancel(&mut self) -> Result<(), ValidationError> {
        if self.step.is_terminal() {
            let step = self.step.to_string();
            return self.fail(ValidationError::WrongStep {
                action: "cancel",
                step,
            });
        }
        self.advance(WizardStep::Cancelled);
        Ok(())
    }
}
