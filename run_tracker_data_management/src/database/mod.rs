mod constants;
pub mod db;
