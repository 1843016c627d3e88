pub mod inspect;
pub mod invalidate;
pub mod keys;
