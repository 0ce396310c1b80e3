pub mod db;

pub use db::{create_db, DbPool, SqliteStore};
