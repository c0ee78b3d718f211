pub mod gmail_client;
