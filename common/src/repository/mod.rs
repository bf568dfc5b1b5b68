pub mod index_trait;
pub mod memory_repository;
pub mod query_builder;
pub mod repository_util;
pub mod tenant_filter;
