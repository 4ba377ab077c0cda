//! Service layer: the image gateway, the pieces it is assembled from, and
//! the generic record repository.

pub mod allocator;
pub mod backend;
pub mod repository;
pub mod sanitize;
pub mod sniff;
pub mod storage_service;
