pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Regex(#[from] regex::Error),
	#[error("Invalid UTC offset for region {region}.")]
	InvalidOffset { region: String, source: time::error::ComponentRange },
}
