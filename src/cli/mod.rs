pub mod bsmtraced;
