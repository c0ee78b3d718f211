pub mod gmail;
pub mod sheets;
pub mod xml;
