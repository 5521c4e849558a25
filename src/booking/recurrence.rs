use chrono::{Datelike, Days, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Frequency::Daily),
            "weekly" => Some(Frequency::Weekly),
            "monthly" => Some(Frequency::Monthly),
            _ => None,
        }
    }

    /// The date after `date` in this frequency, `None` past the calendar's end.
    pub fn step(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Frequency::Daily => date.checked_add_days(Days::new(1)),
            Frequency::Weekly => date.checked_add_days(Days::new(7)),
            Frequency::Monthly => add_month_spilling(date),
        }
    }
}

/// Same day-of-month one month later. A day the target month lacks spills
/// into the following month: the result is the target month's 1st plus
/// `day - 1` days, so Jan 31 becomes Mar 3 (Mar 2 in a leap year).
pub fn add_month_spilling(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year().checked_add(1)?, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.checked_add_days(Days::new(u64::from(date.day() - 1)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// Inclusive.
    pub end_date: NaiveDate,
}

impl RecurrenceRule {
    /// Dates from `start` through `end_date`, each stepped from the previous one.
    pub fn occurrences(&self, start: NaiveDate) -> Occurrences {
        Occurrences {
            next: Some(start),
            rule: *self,
        }
    }
}

pub struct Occurrences {
    next: Option<NaiveDate>,
    rule: RecurrenceRule,
}

impl Iterator for Occurrences {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next.filter(|d| *d <= self.rule.end_date)?;
        self.next = self.rule.frequency.step(current);
        Some(current)
    }
}
