pub mod lister;
pub mod upstream;

pub use lister::{RegistryLister, TaggedImage, V2RegistryLister};
pub use upstream::RegistryClient;
