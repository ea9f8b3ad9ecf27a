// ============================================================
// CSV INFRASTRUCTURE LAYER
// ============================================================
// File decoding and record reading for the table loader

mod csv_parser;

pub use csv_parser::{drop_key_column, next_record, CsvParser};
