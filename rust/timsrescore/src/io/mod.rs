//! Reading PSM tables from disk and writing confidence estimates back.

mod output;
mod pin;

pub use output::{
    level_path,
    write_confidence,
    write_level,
};
pub use pin::{
    read_pin,
    read_pins,
};
