pub mod auth;
pub mod blob_store;
pub mod books;
pub mod routes;
