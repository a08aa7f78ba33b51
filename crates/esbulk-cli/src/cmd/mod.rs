pub mod inspect;
pub mod pack;
