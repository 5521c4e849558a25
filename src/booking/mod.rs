mod conflict;
mod deletion;
mod error;
mod recurrence;

pub use conflict::{check_slot, find_conflicts};
pub use deletion::{DeleteOutcome, active_group_count, resolve_delete};
pub use error::{BookingError, Field};
pub use recurrence::{Frequency, Occurrences, RecurrenceRule, add_month_spilling};

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::repository::BookingRepository;
use crate::validate::{self, ExtensionPolicy};

/// A create request as submitted. Absent fields deserialize empty and fail validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingRequest {
    pub room_id: String,
    pub date: String,
    pub time_slot: String,
    pub booker: String,
    pub extension: String,
    pub title: Option<String>,
    pub recurring: Option<RecurringRequest>,
    /// Book even if the slot is taken.
    #[serde(alias = "forceBook")]
    pub force: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecurringRequest {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub frequency: Option<String>,
    pub end_date: Option<String>,
}

/// Occurrences of one series that made it to storage.
#[derive(Debug, Clone)]
pub struct SeriesReport {
    pub group_id: String,
    pub requested: usize,
    pub bookings: Vec<Booking>,
}

impl SeriesReport {
    pub fn is_complete(&self) -> bool {
        self.bookings.len() == self.requested
    }
}

#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Single(Booking),
    Series(SeriesReport),
}

/// Validation, conflict gating, series expansion and guarded deletion over a repository.
pub struct BookingService {
    repo: Arc<dyn BookingRepository>,
    extensions: ExtensionPolicy,
}

impl BookingService {
    pub fn new(repo: Arc<dyn BookingRepository>, extensions: ExtensionPolicy) -> Self {
        Self { repo, extensions }
    }

    pub fn repository(&self) -> &dyn BookingRepository {
        self.repo.as_ref()
    }

    pub async fn create(&self, req: BookingRequest, today: NaiveDate) -> Result<CreateOutcome, BookingError> {
        let force = req.force;
        let (template, rule) = self.validate(req)?;
        if template.date < today {
            return Err(BookingError::PastDate);
        }

        let dates: Vec<NaiveDate> = match &rule {
            Some(rule) => {
                let dates: Vec<_> = rule
                    .occurrences(template.date)
                    .take(MAX_SERIES_OCCURRENCES + 1)
                    .collect();
                if dates.len() > MAX_SERIES_OCCURRENCES {
                    return Err(BookingError::invalid(
                        Field::Recurring,
                        "recurring series has too many occurrences",
                    ));
                }
                dates
            }
            None => Vec::new(),
        };

        // Only the first date is checked; a confirmed series books every date.
        check_slot(
            self.repository(),
            template.room_id,
            template.date,
            &template.time_slot,
            force,
        )
        .await?;

        if rule.is_none() {
            let booking = self.repo.create(template).await?;
            return Ok(CreateOutcome::Single(booking));
        }
        Ok(CreateOutcome::Series(self.create_series(template, dates).await?))
    }

    /// Insert one occurrence at a time so each sees the order indexes left by
    /// the previous. Stops at the first failure and keeps what was stored.
    async fn create_series(&self, template: NewBooking, dates: Vec<NaiveDate>) -> Result<SeriesReport, BookingError> {
        let group_id = format!("rec-{}", Ulid::new());
        let mut bookings = Vec::with_capacity(dates.len());

        for date in &dates {
            let occurrence = NewBooking {
                date: *date,
                recurring_group_id: Some(group_id.clone()),
                ..template.clone()
            };
            match self.repo.create(occurrence).await {
                Ok(b) => bookings.push(b),
                Err(e) => {
                    tracing::error!(
                        "series {group_id} stopped at {date} after {} of {} occurrences: {e}",
                        bookings.len(),
                        dates.len()
                    );
                    if bookings.is_empty() {
                        return Err(e.into());
                    }
                    break;
                }
            }
        }

        tracing::info!(
            "series {group_id}: {} of {} occurrences booked",
            bookings.len(),
            dates.len()
        );
        Ok(SeriesReport {
            group_id,
            requested: dates.len(),
            bookings,
        })
    }

    pub async fn delete(
        &self,
        booking_id: BookingId,
        extension: &str,
        delete_all: bool,
        today: NaiveDate,
    ) -> Result<DeleteOutcome, BookingError> {
        resolve_delete(self.repository(), booking_id, extension, delete_all, today).await
    }

    pub async fn recurring_count(&self, group_id: &str, today: NaiveDate) -> Result<usize, BookingError> {
        let group_id = group_id.trim();
        if group_id.is_empty() || group_id.len() > MAX_GROUP_ID_LEN {
            return Err(BookingError::invalid(Field::GroupId, "missing or invalid group id"));
        }
        active_group_count(self.repository(), group_id, today).await
    }

    /// `date` is `YYYY-MM-DD`, `YYYY-MM`, or absent for every date.
    pub async fn list(&self, room_id: &str, date: Option<&str>) -> Result<Vec<Booking>, BookingError> {
        let room_id: RoomId = room_id
            .parse()
            .map_err(|()| BookingError::invalid(Field::RoomId, "invalid room id"))?;
        let filter = validate::parse_date_filter(date)
            .ok_or_else(|| BookingError::invalid(Field::Date, "invalid date; expected YYYY-MM-DD or YYYY-MM"))?;
        Ok(self.repo.list(room_id, filter).await?)
    }

    pub async fn clear(&self) -> Result<usize, BookingError> {
        Ok(self.repo.clear().await?)
    }

    /// Field checks in order room, date, slot, booker, extension, title, recurrence.
    fn validate(&self, req: BookingRequest) -> Result<(NewBooking, Option<RecurrenceRule>), BookingError> {
        let room_id: RoomId = req
            .room_id
            .parse()
            .map_err(|()| BookingError::invalid(Field::RoomId, "invalid room id"))?;
        let date = validate::parse_date(&req.date)
            .ok_or_else(|| BookingError::invalid(Field::Date, "invalid date; expected YYYY-MM-DD"))?;
        if !validate::is_valid_time_slot(&req.time_slot) {
            return Err(BookingError::invalid(
                Field::TimeSlot,
                "invalid time slot; expected HH:MM-HH:MM between 08:00 and 18:00",
            ));
        }
        if !validate::is_valid_booker(&req.booker) {
            return Err(BookingError::invalid(Field::Booker, "booker name must be 2-20 characters"));
        }
        if !validate::is_valid_extension(&req.extension) {
            return Err(BookingError::invalid(Field::Extension, "extension must be 3-5 digits"));
        }
        if !self.extensions.permits(&req.extension) {
            return Err(BookingError::invalid(Field::Extension, "extension is not permitted"));
        }
        let title = match req.title.as_deref().map(str::trim) {
            Some(t) if !validate::is_valid_title(t) => {
                return Err(BookingError::invalid(Field::Title, "title must be at most 100 characters"));
            }
            Some("") | None => None,
            Some(t) => Some(t.to_string()),
        };

        let rule = match req.recurring {
            Some(r) if r.enabled => Some(parse_rule(&r, date)?),
            _ => None,
        };

        let booking = NewBooking {
            room_id,
            date,
            time_slot: req.time_slot,
            booker: req.booker.trim().to_string(),
            extension: req.extension,
            title,
            recurring_group_id: None,
        };
        Ok((booking, rule))
    }
}

fn parse_rule(req: &RecurringRequest, start: NaiveDate) -> Result<RecurrenceRule, BookingError> {
    let frequency = req
        .frequency
        .as_deref()
        .and_then(Frequency::parse)
        .ok_or_else(|| BookingError::invalid(
            Field::Recurring,
            "recurrence type must be daily, weekly or monthly",
        ))?;
    let end_date = req
        .end_date
        .as_deref()
        .and_then(validate::parse_date)
        .ok_or_else(|| BookingError::invalid(Field::Recurring, "invalid recurrence end date"))?;
    if end_date < start {
        return Err(BookingError::invalid(
            Field::Recurring,
            "recurrence end date is before the first date",
        ));
    }
    Ok(RecurrenceRule { frequency, end_date })
}
