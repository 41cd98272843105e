pub mod clock;
pub mod date_serde;
pub mod parser;
pub mod query;
pub mod reference;

mod error;

pub use clock::{
	Clock, FixedClock, NoTimezones, ParseContext, StaticTimezones, SystemClock, TimezoneLookup,
};
pub use error::{Error, Result};
pub use parser::{ParserSettings, QueryParser};
pub use query::{
	AudienceHint, ClockTime, DateType, LessonType, LocationType, ParsedQuery, ParsingMode,
	PriceIntent, SkillLevel, Urgency,
};
pub use reference::{CategoryKeyword, LocationEntry, ReferenceData};
