//! Serial port device manipulation.

use std::{thread, time::Duration};

use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use serialport::{available_ports, SerialPort, SerialPortType};

use crate::{Error, Settings};

//==============================================================================
// Public Interface
//==============================================================================

/// Lists the serial ports on the system until there is at least one, then
/// asks the user to pick one. Returns `None` when the user cancels, in which
/// case the caller is expected to ask again with a refreshed list.
pub(crate) fn select_port() -> Option<String> {
    let mut found_ports;
    let mut attempt: usize = 1;
    let waiting_period: usize = 1;

    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(120);
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"])
            .template("[BB] {spinner:.blue} {msg}"),
    );

    // Avoid cursor flicker during the waiting
    let _ = Term::stdout().hide_cursor();
    loop {
        found_ports = enumerate_serial_ports();
        if !found_ports.is_empty() {
            pb.finish_with_message("Select a port to be used:");
            break;
        }
        let waited = attempt * waiting_period;
        pb.set_message(format!(
            "[{:03}s] ⌛ Waiting for a serial controller to be connected...",
            style(waited).dim(),
        ));
        attempt += 1;

        thread::sleep(Duration::from_secs(waiting_period as u64));
    }
    let _ = Term::stdout().show_cursor();

    let selection = select_port_interactive(&found_ports);
    match &selection {
        Some(path) => {
            pb.finish_with_message(format!("👍 Serial port {} is ready", style(path).green()));
        }
        None => {
            pb.finish_with_message("❌ Selection canceled -> refreshing...");
        }
    }
    selection
}

/// Opens the port named in `settings` and configures the line. Opening is
/// retried a few times, the device node may still be settling.
pub(crate) fn open_and_setup_port(
    settings: &Settings,
    path: &str,
) -> Result<Box<dyn SerialPort>, Error> {
    use retry::{delay, retry_with_index};

    let result = retry_with_index(
        delay::Fixed::from_millis(1000).take(4),
        |index| -> Result<Box<dyn SerialPort>, serialport::Error> {
            debug!("Trying to connect {}", index);
            serialport::new(path, settings.baud_rate)
                .data_bits(settings.data_bits)
                .stop_bits(settings.stop_bits)
                .parity(settings.parity)
                .flow_control(settings.flow_control)
                .timeout(settings.timeout)
                .open()
        },
    );

    match result {
        Ok(port) => {
            info!(
                "Connected to {} at {} baud",
                port.name().unwrap_or_else(|| path.to_owned()),
                settings.baud_rate
            );
            debug!("data_bits    : {:?}", settings.data_bits);
            debug!("stop_bits    : {:?}", settings.stop_bits);
            debug!("parity       : {:?}", settings.parity);
            debug!("flow control : {:?}", settings.flow_control);

            match port.baud_rate() {
                Ok(actual) if actual != settings.baud_rate => warn!(
                    "requested {} baud but the port runs at {}, it is probably not a valid rate",
                    settings.baud_rate, actual
                ),
                _ => {}
            }
            Ok(port)
        }
        Err(retry::Error::Operation {
            error,
            total_delay,
            tries,
        }) => {
            info!(
                "Failed to open the port after {:?} and {} tries: {}",
                total_delay, tries, error,
            );
            Err(error.into())
        }
        Err(retry::Error::Internal(message)) => {
            info!("Internal retry error while opening port: {}", message);
            Err(serialport::Error::new(
                serialport::ErrorKind::Unknown,
                "internal error while retrying to open the port",
            )
            .into())
        }
    }
}

//==============================================================================
// Private stuff
//==============================================================================

/// Enumerates serial devices on the system, USB ones described with their
/// manufacturer and product.
fn enumerate_serial_ports() -> Vec<String> {
    let mut ports = vec![];
    match available_ports() {
        Ok(found) => {
            for p in found {
                match p.port_type {
                    SerialPortType::UsbPort(info) => {
                        let extended_name = format!(
                            "{}: ({} / {})",
                            p.port_name,
                            info.manufacturer.as_ref().map_or("", String::as_str),
                            info.product.as_ref().map_or("", String::as_str)
                        );
                        ports.push(extended_name);
                    }
                    // Virtual and on-board ports are fine too, FPGA boards
                    // often show up that way.
                    _ => ports.push(p.port_name),
                }
            }
        }
        Err(ref e) => {
            info!("error: {}", e);
        }
    }
    ports
}

fn select_port_interactive(ports: &[String]) -> Option<String> {
    use dialoguer::{theme::ColorfulTheme, Select};

    let term = Term::buffered_stderr();
    let theme = ColorfulTheme::default();

    let mut select = Select::with_theme(&theme);
    for item in ports {
        select.item(item);
    }

    match select.default(0).interact_on_opt(&term) {
        Ok(selection) => selection
            .and_then(|x| ports.get(x))
            .and_then(|entry| entry.split(':').next())
            .map(String::from),
        Err(ref e) => {
            info!("error: {}", e);
            None
        }
    }
}
