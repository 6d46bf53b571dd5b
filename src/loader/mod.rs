pub mod sample_bank;
pub mod sample_loader;
