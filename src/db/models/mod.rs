pub mod record;

pub use record::StoredRecord;
