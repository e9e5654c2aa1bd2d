//! SurrealDB repository implementations.

mod certificate;
mod certificate_authority;
mod est_config;
mod subscriber;

pub use certificate::SurrealCertificateRepository;
pub use certificate_authority::SurrealCertificateAuthorityRepository;
pub use est_config::SurrealEstConfigRepository;
pub use subscriber::SurrealSubscriberRepository;
