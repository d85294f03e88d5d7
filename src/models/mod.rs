pub mod attempt;
pub mod provider;
pub mod request;
