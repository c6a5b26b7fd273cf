//! BEBE host command line interface.

use std::process;

use clap::{crate_description, crate_name, crate_version, App, AppSettings::*, Arg, ArgMatches};
use console::style;
use log::{debug, trace, LevelFilter};
use simplelog::*;

use bebe::{self as bb, DataBits, FlowControl, Parity, StopBits};

fn app() -> App<'static, 'static> {
    App::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .long_about(
            "\n\
            Talks to the BEBE bootloader of a board over a serial port. When \
            started, it waits for the board to send 'A' until it is ready, then \
            greets it with the magic `GOBEARS!` and expects 'Y' back. Once \
            connected, it runs the requested operations in this order, all \
            starting at --addr:\n\
               \t* write the content of --wfile, in chunks of up to 1 MiB \n\
               \t* write the --wlen low-order bytes of --wdata \n\
               \t* read --rlen bytes and print them \n\
               \t* jump to the address \n\
            \n\
            Each write and the jump are acknowledged by the board. Without any \
            operation, this help is printed and nothing is sent.\
        ",
        )
        .max_term_width(80)
        .setting(ColoredHelp)
        .setting(NextLineHelp)
        .arg(
            Arg::with_name("ADDRESS")
                .help("address to interact with, in hex")
                .short("a")
                .long("addr")
                .takes_value(true)
                .required(true)
                .validator(|v| check(bb::parse_hex_u64(&v))),
        )
        .arg(
            Arg::with_name("WRITE_FILE")
                .help("file to write to the DUT")
                .long("wfile")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("WRITE_DATA")
                .help("value to write to the DUT, in hex")
                .long("wdata")
                .takes_value(true)
                .requires("WRITE_LEN")
                .validator(|v| check(bb::parse_hex_u64(&v))),
        )
        .arg(
            Arg::with_name("WRITE_LEN")
                .help("number of low-order bytes of --wdata to write (1 to 8)")
                .long("wlen")
                .takes_value(true)
                .requires("WRITE_DATA")
                .validator(|v| check(bb::parse_count(&v))),
        )
        .arg(
            Arg::with_name("READ_LEN")
                .help("number of bytes to read from the DUT")
                .long("rlen")
                .takes_value(true)
                .validator(|v| check(bb::parse_read_length(&v))),
        )
        .arg(
            Arg::with_name("JUMP")
                .help("begin executing at the given address")
                .long_help(
                    "begin executing at the given address; if the DUT does \
                     not acknowledge the jump, the exit status is 1.",
                )
                .long("jump"),
        )
        .arg(
            Arg::with_name("NO_WAIT")
                .help("assume the DUT is already awake and nock right away")
                .long("no-wait")
                .alias("no_wait"),
        )
        .arg(
            Arg::with_name("QUIET")
                .help("only print read data, as plain hex")
                .short("q")
                .long("quiet"),
        )
        .arg(
            Arg::with_name("DEVICE_TTY")
                .help("the tty device to use")
                .long_help(
                    "the tty device to use; when not set, the connected \
                     serial devices are listed for selection.",
                )
                .short("t")
                .long("tty")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("BAUD_RATE")
                .help("serial port baud rate")
                .short("b")
                .long("baud-rate")
                .takes_value(true)
                .default_value("115200")
                .validator(|v| check(v.parse::<u32>())),
        )
        .arg(
            Arg::with_name("DATA_BITS")
                .help("number of bits per character")
                .short("d")
                .long("data-bits")
                .takes_value(true)
                .possible_values(&["5", "6", "7", "8"])
                .default_value("8"),
        )
        .arg(
            Arg::with_name("STOP_BITS")
                .help("number of stop bits per byte")
                .short("s")
                .long("stop-bits")
                .takes_value(true)
                .possible_values(&["1", "2"])
                .default_value("1"),
        )
        .arg(
            Arg::with_name("PARITY")
                .help("parity checking protocol")
                .short("p")
                .long("parity")
                .takes_value(true)
                .possible_values(&["none", "odd", "even"])
                .default_value("none"),
        )
        .arg(
            Arg::with_name("FLOW_CONTROL")
                .help("flow control mode")
                .short("f")
                .long("flow-control")
                .takes_value(true)
                .possible_values(&["none", "soft", "hard"])
                .default_value("none"),
        )
        .arg(Arg::with_name("v").short("v").multiple(true).help(
            "Sets the logging level of verbosity, repeat several times for \
                higher verbosity",
        ))
}

fn check<T, E: ToString>(parsed: Result<T, E>) -> Result<(), String> {
    parsed.map(|_| ()).map_err(|e| e.to_string())
}

fn settings_from(matches: &ArgMatches) -> bb::Settings {
    // Every value below went through its validator or is restricted to
    // possible values, failed parses cannot happen.
    let data_bits = match matches.value_of("DATA_BITS") {
        Some("5") => DataBits::Five,
        Some("6") => DataBits::Six,
        Some("7") => DataBits::Seven,
        _ => DataBits::Eight,
    };

    let stop_bits = match matches.value_of("STOP_BITS") {
        Some("2") => StopBits::Two,
        _ => StopBits::One,
    };

    let parity = match matches.value_of("PARITY") {
        Some("even") => Parity::Even,
        Some("odd") => Parity::Odd,
        _ => Parity::None,
    };

    let flow_control = match matches.value_of("FLOW_CONTROL") {
        Some("soft") => FlowControl::Software,
        Some("hard") => FlowControl::Hardware,
        _ => FlowControl::None,
    };

    let baud_rate = matches
        .value_of("BAUD_RATE")
        .and_then(|v| v.parse().ok())
        .unwrap_or(115_200);

    let address = matches
        .value_of("ADDRESS")
        .and_then(|v| bb::parse_hex_u64(v).ok())
        .unwrap_or_default();

    let mut builder = bb::SettingsBuilder::new()
        .baud_rate(baud_rate)
        .data_bits(data_bits)
        .stop_bits(stop_bits)
        .parity(parity)
        .flow_control(flow_control)
        .address(address)
        .skip_wait(matches.is_present("NO_WAIT"))
        .quiet(matches.is_present("QUIET"))
        .jump(matches.is_present("JUMP"));

    if let Some(path) = matches.value_of("DEVICE_TTY") {
        builder = builder.path(path);
    }

    if let Some(path) = matches.value_of("WRITE_FILE") {
        builder = builder.write_file(path);
    }

    let value = matches
        .value_of("WRITE_DATA")
        .and_then(|v| bb::parse_hex_u64(v).ok());
    let length = matches
        .value_of("WRITE_LEN")
        .and_then(|v| bb::parse_count(v).ok());
    if let (Some(value), Some(length)) = (value, length) {
        // Oversized lengths are rejected later, with the other operations
        // still running.
        builder = builder.write_value(value, length as usize);
    }

    if let Some(length) = matches
        .value_of("READ_LEN")
        .and_then(|v| bb::parse_read_length(v).ok())
    {
        builder = builder.read_length(length);
    }

    builder.finalize()
}

fn main() {
    ctrlc::set_handler(move || {
        println!("🛑 received Ctrl+C!");
        process::exit(130);
    })
    .unwrap_or_else(|e| println!("{}: {}", style("warning").yellow(), e));

    let matches = app().get_matches();

    // `--quiet` keeps only errors, otherwise narration is on and each `-v`
    // adds detail.
    let log_level = if matches.is_present("QUIET") {
        LevelFilter::Error
    } else {
        match matches.occurrences_of("v") {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    if let Err(e) = TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        println!("{}: {}", style("warning").yellow(), e);
    }

    trace!("{:#?}", matches);

    let settings = settings_from(&matches);
    debug!("{:#?}", settings);

    if settings.operations.is_empty() {
        // Nothing to do is not an error.
        let _ = app().print_long_help();
        println!();
        process::exit(0);
    }

    let exit_code = bb::run(&settings);
    debug!("exit code: {}", exit_code);
    process::exit(exit_code.into());
}
