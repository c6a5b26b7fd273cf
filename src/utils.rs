//! Helper functions to deal with serial ports and with showing memory.

mod dump;
mod ports;

pub(crate) use dump::{hex_dump, hex_string};
pub(crate) use ports::{open_and_setup_port, select_port};
