pub mod db_pool;
pub mod db_utils;
pub mod destination;
