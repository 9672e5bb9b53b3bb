pub mod csv_fields;
