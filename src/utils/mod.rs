pub mod tax_cache;
