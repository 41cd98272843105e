use std::collections::HashMap;

use time::{OffsetDateTime, UtcOffset};

pub trait Clock
where
	Self: Send + Sync,
{
	fn now_utc(&self) -> OffsetDateTime;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now_utc(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub OffsetDateTime);
impl Clock for FixedClock {
	fn now_utc(&self) -> OffsetDateTime {
		self.0
	}
}

/// Looks up a user's preferred UTC offset from a warm cache. Must not perform I/O.
pub trait TimezoneLookup
where
	Self: Send + Sync,
{
	fn utc_offset(&self, user_id: &str) -> Option<UtcOffset>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoTimezones;
impl TimezoneLookup for NoTimezones {
	fn utc_offset(&self, _user_id: &str) -> Option<UtcOffset> {
		None
	}
}

#[derive(Clone, Debug, Default)]
pub struct StaticTimezones {
	offsets: HashMap<String, UtcOffset>,
}
impl StaticTimezones {
	pub fn new(offsets: HashMap<String, UtcOffset>) -> Self {
		Self { offsets }
	}

	pub fn insert(&mut self, user_id: impl Into<String>, offset: UtcOffset) {
		self.offsets.insert(user_id.into(), offset);
	}
}
impl TimezoneLookup for StaticTimezones {
	fn utc_offset(&self, user_id: &str) -> Option<UtcOffset> {
		self.offsets.get(user_id).copied()
	}
}

/// Who is asking and from where; drives the meaning of "today".
#[derive(Clone, Debug, Default)]
pub struct ParseContext {
	pub user_id: Option<String>,
	pub region: Option<String>,
}
impl ParseContext {
	pub fn for_user(user_id: impl Into<String>) -> Self {
		Self { user_id: Some(user_id.into()), region: None }
	}

	pub fn for_region(region: impl Into<String>) -> Self {
		Self { user_id: None, region: Some(region.into()) }
	}
}
