//! Sigil Core: domain models, error types, and the collaborator traits
//! (persistence, key management, authorization) the issuance engine is
//! generic over.

pub mod authz;
pub mod error;
pub mod kms;
pub mod models;
pub mod repository;
