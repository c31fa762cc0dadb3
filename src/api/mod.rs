//! Client for the MailerSend REST API.

mod api_types;
mod client;
mod email;
mod resource;
mod transport;
pub mod types;

pub use client::MailClient;
pub use email::{Attachment, EmailMessage, Recipient};
pub use resource::ResourceClient;
