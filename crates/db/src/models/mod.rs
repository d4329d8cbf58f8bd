pub mod skip_record;
