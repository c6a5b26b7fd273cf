//! Rendering of memory read back from the DUT.

use std::{convert::TryFrom, fmt::Write};

use hexplay::HexViewBuilder;

const ROW_WIDTH: usize = 16;

/// Hex and ASCII table of `data`, rows labelled with DUT addresses starting
/// at `address`. Rows are labelled from 0 when the labels would not fit.
pub(crate) fn hex_dump(data: &[u8], address: u64) -> String {
    // hexplay adds row offsets unchecked, keep a row of headroom.
    let offset = usize::try_from(address)
        .ok()
        .filter(|offset| {
            data.len()
                .checked_add(ROW_WIDTH)
                .and_then(|span| offset.checked_add(span))
                .is_some()
        })
        .unwrap_or(0);
    HexViewBuilder::new(data)
        .address_offset(offset)
        .row_width(ROW_WIDTH)
        .finish()
        .to_string()
}

/// `data` as one run of lowercase hex digits, for scripts.
pub(crate) fn hex_string(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for byte in data {
        let _ = write!(s, "{:02x}", byte);
    }
    s
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn plain_hex() {
    assert_eq!(hex_string(&[0x00, 0x1f, 0xab, 0xff]), "001fabff");
    assert_eq!(hex_string(&[]), "");
}

#[test]
fn dump_shows_bytes() {
    let dump = hex_dump(b"GOBEARS!", 0x8000);
    assert!(dump.contains("47 4F 42 45") || dump.contains("47 4f 42 45"));
    assert!(dump.contains("GOBEARS!"));
}

#[test]
fn dump_near_the_top_of_memory() {
    let dump = hex_dump(&[0x5a; 16], u64::MAX - 7);
    assert!(dump.contains("5A 5A") || dump.contains("5a 5a"));
    assert!(dump.contains("ZZZZ"));
}
