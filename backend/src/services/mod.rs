pub mod admin;
pub mod certificates;
pub mod templates;
pub mod verify;
