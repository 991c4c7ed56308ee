// Adapters layer: concrete sources and writers behind the domain ports.

pub mod github;
pub mod mutation;
pub mod preview;

pub use github::HttpRepoSource;
pub use mutation::MutationStub;
pub use preview::PreviewRepoSource;
