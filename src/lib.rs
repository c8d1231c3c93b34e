pub mod acquisition;
pub mod logger;
