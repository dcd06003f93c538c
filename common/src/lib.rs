//! Types shared between the certificate server and its clients.

pub mod jobs;
pub mod model;
pub mod requests;
