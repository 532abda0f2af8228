//! XML layer: a minimal element tree plus the GAR dialect translator.

pub mod translate;
pub mod tree;
