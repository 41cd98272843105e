use serde::{Deserialize as _, Deserializer, Serializer, ser::SerializeSeq};
use time::Date;

pub fn serialize<S>(value: &[Date], serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	let mut seq = serializer.serialize_seq(Some(value.len()))?;

	for date in value {
		let formatted =
			date.format(crate::date_serde::ISO_DATE).map_err(serde::ser::Error::custom)?;

		seq.serialize_element(&formatted)?;
	}

	seq.end()
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Date>, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = Vec::<String>::deserialize(deserializer)?;

	raw.iter()
		.map(|value| Date::parse(value, crate::date_serde::ISO_DATE))
		.collect::<Result<Vec<_>, _>>()
		.map_err(serde::de::Error::custom)
}
