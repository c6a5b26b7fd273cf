//! Settings for the serial port and for the operations requested from the
//! bootloader.
//!
//! Use the [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
//! pattern to set the configurable values.

use std::{convert::TryFrom, path::PathBuf, time::Duration};

pub use serialport::{DataBits, FlowControl, Parity, StopBits};

use crate::Error;

// =============================================================================
// Public Interface
// =============================================================================

/// An inline value written with a single frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Immediate {
    pub value: u64,
    /// Number of low-order bytes of `value` to write, 1 to 8.
    pub length: usize,
}

/// The operations to run once the session is established. They always run in
/// the order of the fields below; the ones left unset are skipped.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Operations {
    /// File whose whole content is written at the target address.
    pub write_file: Option<PathBuf>,
    pub write_value: Option<Immediate>,
    /// Number of bytes to read back.
    pub read_length: Option<u32>,
    /// Jump to the target address.
    pub jump: bool,
}
impl Operations {
    pub fn is_empty(&self) -> bool {
        self.write_file.is_none()
            && self.write_value.is_none()
            && self.read_length.is_none()
            && !self.jump
    }
}

/// Groups all settings related to the serial port and the session, and acts
/// as a [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
/// for them.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    /// The port name, usually the device path. When not set, the port is
    /// selected interactively.
    pub path: Option<String>,
    /// The baud rate in symbols-per-second.
    pub baud_rate: u32,
    /// Number of bits used to represent a character sent on the line.
    pub data_bits: DataBits,
    /// The type of signalling to use for controlling data transfer.
    pub flow_control: FlowControl,
    /// The type of parity to use for error checking.
    pub parity: Parity,
    /// Number of bits to use to signal the end of a character.
    pub stop_bits: StopBits,
    /// How long a single read on the port waits before polling again. This is
    /// not a protocol timeout, a silent DUT is waited for forever.
    pub timeout: Duration,

    /// Address in the DUT's memory all operations start at.
    pub address: u64,
    /// The DUT is known to be awake, do not wait for its ready byte.
    pub skip_wait: bool,
    /// Keep the narration out of the terminal.
    pub quiet: bool,
    pub operations: Operations,

    /// Restrict creation of `Settings` instances unless through the
    /// `SettingsBuilder`.
    #[doc(hidden)]
    _private_use_builder: (),
}

/// The builder for the `Settings` values.
///
/// All values are optional and have default values that will be used if not
/// explicitly set.
///
/// **Example**
///
/// ```
/// use bebe::SettingsBuilder;
///
/// let settings = SettingsBuilder::new()
///     .path("/dev/ttyUSB0")
///     .address(0x8000_0000)
///     .read_length(16)
///     .finalize();
/// assert!(!settings.operations.is_empty());
/// ```
pub struct SettingsBuilder {
    settings: Settings,
}
impl SettingsBuilder {
    /// Start building the settings using default values, no path for the
    /// port and no operation.
    pub fn new() -> Self {
        SettingsBuilder {
            settings: Settings {
                path: None,
                baud_rate: 115_200,
                data_bits: DataBits::Eight,
                flow_control: FlowControl::None,
                parity: Parity::None,
                stop_bits: StopBits::One,
                timeout: Duration::from_millis(100),
                address: 0,
                skip_wait: false,
                quiet: false,
                operations: Operations::default(),
                _private_use_builder: (),
            },
        }
    }

    /// Set the path to the serial port
    pub fn path<'a>(mut self, path: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.path = Some(path.into().into_owned());
        self
    }

    /// Set the baud rate in symbols-per-second
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.settings.baud_rate = baud_rate;
        self
    }

    /// Set the number of bits used to represent a character sent on the line
    pub fn data_bits(mut self, data_bits: DataBits) -> Self {
        self.settings.data_bits = data_bits;
        self
    }

    /// Set the type of signalling to use for controlling data transfer
    pub fn flow_control(mut self, flow_control: FlowControl) -> Self {
        self.settings.flow_control = flow_control;
        self
    }

    /// Set the type of parity to use for error checking
    pub fn parity(mut self, parity: Parity) -> Self {
        self.settings.parity = parity;
        self
    }

    /// Set the number of bits to use to signal the end of a character
    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.settings.stop_bits = stop_bits;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    /// Set the target address in the DUT's memory
    pub fn address(mut self, address: u64) -> Self {
        self.settings.address = address;
        self
    }

    pub fn skip_wait(mut self, skip_wait: bool) -> Self {
        self.settings.skip_wait = skip_wait;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.settings.quiet = quiet;
        self
    }

    /// Write the content of a file at the target address
    pub fn write_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.operations.write_file = Some(path.into());
        self
    }

    /// Write the `length` low-order bytes of `value`
    pub fn write_value(mut self, value: u64, length: usize) -> Self {
        self.settings.operations.write_value = Some(Immediate { value, length });
        self
    }

    /// Read `length` bytes
    pub fn read_length(mut self, length: u32) -> Self {
        self.settings.operations.read_length = Some(length);
        self
    }

    /// Jump to the target address once everything else is done
    pub fn jump(mut self, jump: bool) -> Self {
        self.settings.operations.jump = jump;
        self
    }

    pub fn finalize(self) -> Settings {
        self.settings
    }
}
impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a hexadecimal number, with or without a `0x` prefix.
pub fn parse_hex_u64(text: &str) -> Result<u64, Error> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u64::from_str_radix(&digits.replace('_', ""), 16)
        .map_err(|_| Error::InvalidNumber(text.to_owned()))
}

/// Parses a count, decimal unless prefixed with `0x`.
pub fn parse_count(text: &str) -> Result<u64, Error> {
    let trimmed = text.trim();
    if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        return parse_hex_u64(trimmed);
    }
    trimmed
        .replace('_', "")
        .parse()
        .map_err(|_| Error::InvalidNumber(text.to_owned()))
}

/// Parses a read length, which has to fit the 32-bit length field.
pub fn parse_read_length(text: &str) -> Result<u32, Error> {
    u32::try_from(parse_count(text)?).map_err(|_| Error::InvalidNumber(text.to_owned()))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn all_default() {
    let settings = SettingsBuilder::new().finalize();
    assert_eq!(
        settings,
        Settings {
            path: None,
            baud_rate: 115_200,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: Duration::from_millis(100),
            address: 0,
            skip_wait: false,
            quiet: false,
            operations: Operations::default(),
            _private_use_builder: (),
        }
    );
    assert!(settings.operations.is_empty());
}

#[test]
fn path() {
    let settings = SettingsBuilder::new().path("/dev/ttyUSB0").finalize();
    assert_eq!(settings.path.unwrap(), "/dev/ttyUSB0");
}

#[test]
fn serial_line() {
    let settings = SettingsBuilder::new()
        .baud_rate(921_600)
        .data_bits(DataBits::Seven)
        .flow_control(FlowControl::Hardware)
        .parity(Parity::Even)
        .stop_bits(StopBits::Two)
        .timeout(Duration::from_millis(10))
        .finalize();
    assert_eq!(settings.baud_rate, 921_600);
    assert_eq!(settings.data_bits, DataBits::Seven);
    assert_eq!(settings.flow_control, FlowControl::Hardware);
    assert_eq!(settings.parity, Parity::Even);
    assert_eq!(settings.stop_bits, StopBits::Two);
    assert_eq!(settings.timeout, Duration::from_millis(10));
}

#[test]
fn session() {
    let settings = SettingsBuilder::new()
        .address(0x8000_0000)
        .skip_wait(true)
        .quiet(true)
        .finalize();
    assert_eq!(settings.address, 0x8000_0000);
    assert!(settings.skip_wait);
    assert!(settings.quiet);
    assert!(settings.operations.is_empty());
}

#[test]
fn operations() {
    let settings = SettingsBuilder::new()
        .write_file("image.bin")
        .write_value(0xdead_beef, 4)
        .read_length(16)
        .jump(true)
        .finalize();
    assert_eq!(
        settings.operations,
        Operations {
            write_file: Some(PathBuf::from("image.bin")),
            write_value: Some(Immediate {
                value: 0xdead_beef,
                length: 4
            }),
            read_length: Some(16),
            jump: true,
        }
    );
    assert!(!SettingsBuilder::new().jump(true).finalize().operations.is_empty());
}

#[test]
fn hex_numbers() {
    assert_eq!(parse_hex_u64("1000").unwrap(), 0x1000);
    assert_eq!(parse_hex_u64("0x8000_0000").unwrap(), 0x8000_0000);
    assert_eq!(parse_hex_u64("0XfFfF").unwrap(), 0xffff);
    assert_eq!(parse_hex_u64("ffffffffffffffff").unwrap(), u64::MAX);
    assert!(parse_hex_u64("10000000000000000").is_err());
    assert!(parse_hex_u64("0xzz").is_err());
    assert!(parse_hex_u64("").is_err());
}

#[test]
fn counts() {
    assert_eq!(parse_count("16").unwrap(), 16);
    assert_eq!(parse_count("0x10").unwrap(), 16);
    assert!(parse_count("ten").is_err());
    assert_eq!(parse_read_length("4294967295").unwrap(), u32::MAX);
    assert!(parse_read_length("4294967296").is_err());
}
