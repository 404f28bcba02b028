pub mod ffplay;
