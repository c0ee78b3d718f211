pub mod mailer;
pub mod routine;
pub mod tabular_store;
