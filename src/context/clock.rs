// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Wall clock used by date-derived computed fields

use chrono::{Local, NaiveDate, Utc};
use std::fmt::Debug;

/// Source of "today". Read at resolution time, not at context creation.
pub trait Clock: Send + Sync + Debug {
    /// Current local date
    fn today(&self) -> NaiveDate;

    /// Current UTC date; differs from [`Clock::today`] near midnight
    fn utc_today(&self) -> NaiveDate {
        self.today()
    }
}

/// Local system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn utc_today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Clock frozen on one date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    local: NaiveDate,
    utc: NaiveDate,
}

impl FixedClock {
    /// Freeze both readings on one date
    pub fn new(date: NaiveDate) -> Self {
        Self {
            local: date,
            utc: date,
        }
    }

    /// Freeze on the given calendar date; `None` if the date does not exist
    pub fn ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self::new)
    }

    /// Use a different UTC date, as seen late in the evening west of Greenwich
    pub fn with_utc(mut self, utc: NaiveDate) -> Self {
        self.utc = utc;
        self
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.local
    }

    fn utc_today(&self) -> NaiveDate {
        self.utc
    }
}
