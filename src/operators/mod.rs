pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod lists;
pub mod registry;
pub mod version;
