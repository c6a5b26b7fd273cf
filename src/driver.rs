//! One run of the BEBE host: open the port, nock, run the requested
//! operations, show what came back.
//!
//! **Example**
//! ```no_run
//! use bebe::{self as bb, SettingsBuilder};
//!
//! let settings = SettingsBuilder::new()
//!     .path("/dev/ttyUSB0")
//!     .address(0x8000_0000)
//!     .read_length(64)
//!     .finalize();
//! let status = bb::run(&settings);
//! std::process::exit(status.into());
//! ```

use std::io::{self, Write};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info};
use serialport::SerialPort;

use crate::{
    handshake::Start,
    link::Link,
    session::{Outcome, Report, Session},
    settings::Settings,
    transport::Transport,
    utils, Error,
};

/// Runs the whole sequence and returns the exit status: **`0`** when every
/// operation completed or was skipped, **`1`** otherwise.
///
/// The settings are expected to request at least one operation, there is
/// nothing to check for otherwise.
pub fn run(settings: &Settings) -> i8 {
    let port = match connect(settings) {
        Ok(port) => port,
        Err(e) => {
            error!("{}", e);
            println!("{}", style("[BB] 💥 Could not open the serial port!").red());
            return 1;
        }
    };

    let mut link = Link::new(port);
    let report = match run_on(&mut link, settings) {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e);
            println!("{}", style("[BB] 💥 Could not connect to the DUT!").red());
            return 1;
        }
    };

    if let Err(e) = show(&report, settings.quiet) {
        error!("cannot print the results: {}", e);
        return 1;
    }
    report.exit_code()
}

/// Nocks over `link` then runs the requested operations. Fails only if the
/// session could not be established.
pub fn run_on<T: Transport>(link: &mut Link<T>, settings: &Settings) -> Result<Report, Error> {
    link.establish(Start::skipping_wait(settings.skip_wait))?;
    info!("Connected to DUT!");

    let progress = if settings.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(0);
        pb.set_style(ProgressStyle::default_bar()
            .template("[BB] ⏩ Writing [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .progress_chars("=>-"));
        pb
    };

    let mut session = Session::new(link, settings.address)?.with_progress(progress);
    let report = session.execute(&settings.operations);
    debug!("cursor ended at {:x?}", session.address());
    Ok(report)
}

fn connect(settings: &Settings) -> Result<Box<dyn SerialPort>, Error> {
    let path = match &settings.path {
        Some(path) => path.clone(),
        // Keep asking until a port is picked.
        None => loop {
            if let Some(path) = utils::select_port() {
                break path;
            }
        },
    };
    utils::open_and_setup_port(settings, &path)
}

/// Prints read data, then a one line verdict unless quiet.
fn show(report: &Report, quiet: bool) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for (_, outcome) in &report.entries {
        if let Outcome::Read { address, data } = outcome {
            if quiet {
                writeln!(out, "{}", utils::hex_string(data))?;
            } else {
                info!("read result:");
                writeln!(out, "{}", utils::hex_dump(data, *address))?;
            }
        }
    }

    if !quiet {
        match report.failure() {
            None => writeln!(out, "{}", style("[BB] ✔ Done").green())?,
            Some(e) => writeln!(out, "{}", style(format!("[BB] 💥 {}", e)).red())?,
        }
    }
    out.flush()
}
