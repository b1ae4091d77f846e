pub mod dates;
pub mod money;
pub mod persistence;
pub mod version;
