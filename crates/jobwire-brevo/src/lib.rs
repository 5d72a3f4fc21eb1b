//! # jobwire-brevo
//!
//! Read-only client for the Brevo (formerly Sendinblue) contacts API.
//!
//! Campaign targeting only needs to know who is in a list and whether they
//! may be contacted, so this crate covers:
//!
//! - account verification
//! - list and folder enumeration
//! - paginated list membership with consent attributes and blacklist flags

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
pub mod contact;
mod error;

pub use client::{Client, DEFAULT_API_BASE, Paging};
pub use contact::{Account, Contact, ContactList, Folder};
pub use error::{Error, Result};
