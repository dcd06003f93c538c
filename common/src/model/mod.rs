pub mod certificate;
pub mod layout;
pub mod template;
