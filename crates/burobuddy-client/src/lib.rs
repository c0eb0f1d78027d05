//! Client for the BüroBuddy document API: documents, extracted text,
//! analyses (checked against the analysis contract on arrival) and chat.

pub mod http;

pub use http::{ApiClient, ClientError};
