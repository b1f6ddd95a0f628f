// Copyright 2018 Ian Johnson

// This file is part of Chip-8 Harness.

// Chip-8 Harness is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Chip-8 Harness is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Chip-8 Harness.  If not, see <http://www.gnu.org/licenses/>.

//! The `chip8run` binary program.

extern crate chip8_harness;
extern crate clap;
extern crate env_logger;
extern crate failure;
#[macro_use]
extern crate log;

use std::cell::RefCell;
use std::io::{self, Write};
use std::process;
use std::rc::Rc;
use std::str::FromStr;

use clap::{App, Arg, ArgMatches};
use failure::{Error, ResultExt};
use log::LevelFilter;

use chip8_harness::display::{NullSurface, Surface, TextSurface};
use chip8_harness::emulator::{Backend, Emulator, Variant};
use chip8_harness::interpreter::Chip8Backend;
use chip8_harness::multiplexer::{self, Multiplexer};
use chip8_harness::platform::RealtimePlatform;
use chip8_harness::rom::RomDirectory;
use chip8_harness::session::{self, LoopController};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long the platform runs between checks on the session, in milliseconds.
const SLICE: f64 = 100.0;

fn main() {
    let matches = App::new("chip8run")
        .version(VERSION)
        .author("Ian Johnson <ianprime0509@gmail.com>")
        .about("Runs Chip-8 ROMs on the scheduling harness")
        .help_message("show this help message and exit")
        .version_message("show version information and exit")
        .arg(
            Arg::with_name("duration")
                .short("d")
                .long("duration")
                .value_name("SECS")
                .help("set how long to play each ROM (in seconds)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("frame-rate")
                .long("frame-rate")
                .value_name("FPS")
                .help("set the display frame rate")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("granularity")
                .long("granularity")
                .value_name("MS")
                .help("set the native timer granularity (in milliseconds)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("headless")
                .long("headless")
                .help("do not draw the display"),
        )
        .arg(
            Arg::with_name("list")
                .short("l")
                .long("list")
                .help("list the ROMs in the ROM directory and exit"),
        )
        .arg(
            Arg::with_name("period")
                .short("p")
                .long("period")
                .value_name("MS")
                .help("set the cycle period (in milliseconds)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("rom-dir")
                .short("r")
                .long("rom-dir")
                .value_name("DIR")
                .help("set the directory to load ROMs from")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("steps")
                .short("s")
                .long("steps")
                .value_name("N")
                .help("set the number of instructions per cycle")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("variant")
                .long("variant")
                .value_name("CODE")
                .help("set the interpreter variant (0 = original, 1 = modern)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("increase verbosity"),
        )
        .arg(
            Arg::with_name("ROM")
                .help("set the ROMs to play, in order")
                .multiple(true)
                .index(1),
        )
        .get_matches();

    let verbosity = matches.occurrences_of("verbose");
    let filter = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter(None, filter)
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .init();

    if let Err(e) = run(&matches) {
        error!("{}", e);
        for cause in e.causes().skip(1) {
            info!("caused by: {}", cause);
        }
        trace!("backtrace: {}", e.backtrace());
        process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<(), Error> {
    let roms = RomDirectory::new(matches.value_of("rom-dir").unwrap_or("roms"));
    if matches.is_present("list") {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for name in roms.list()? {
            writeln!(out, "{}", name)?;
        }
        return Ok(());
    }

    let mut mux_opts = multiplexer::Options::new();
    let mut session_opts = session::Options::new();
    process_opts(&mut mux_opts, &mut session_opts, matches)?;
    let variant = Variant::from_code(parse_arg(matches, "variant", 0)?)?;
    let frame_rate = parse_arg(matches, "frame-rate", 60.0)?;
    let duration = parse_arg(matches, "duration", 10.0)?;
    if !(frame_rate > 0.0) {
        return Err(failure::err_msg("invalid frame-rate argument"));
    }

    let surface: Box<dyn Surface> = if matches.is_present("headless") {
        Box::new(NullSurface::new())
    } else {
        Box::new(TextSurface::terminal(io::stdout()))
    };
    let mut backend = Chip8Backend::new(Rc::new(RefCell::new(surface)));
    backend.init().context("could not initialize emulator backend")?;

    let platform = Rc::new(RealtimePlatform::new(1000.0 / frame_rate));
    let multiplexer = Multiplexer::with_options(platform.clone(), mux_opts)?;
    let mut controller = LoopController::new(multiplexer, session_opts)?;

    let selections: Vec<&str> = match matches.values_of("ROM") {
        Some(values) => values.collect(),
        None => vec![""],
    };
    for selection in selections {
        let emulator = backend.create(variant)?;
        controller.start_session(emulator, &roms, selection)?;
        play(&platform, &mut controller, duration * 1000.0)
            .with_context(|_| format!("error while playing ROM '{}'", selection))?;
    }
    controller.stop_session();

    Ok(())
}

/// Runs the current session for `ms` milliseconds, stopping early if it
/// fails.
fn play<E>(
    platform: &RealtimePlatform,
    controller: &mut LoopController<RealtimePlatform, E>,
    ms: f64,
) -> Result<(), Error>
where
    E: Emulator + 'static,
{
    let mut left = ms;
    while left > 0.0 {
        let slice = left.min(SLICE);
        platform.run_for(slice);
        controller.poll()?;
        left -= slice;
    }
    Ok(())
}

/// Processes the command-line arguments and changes the necessary fields of
/// the given options.
fn process_opts(
    mux_opts: &mut multiplexer::Options,
    session_opts: &mut session::Options,
    matches: &ArgMatches,
) -> Result<(), Error> {
    if let Some(granularity) = matches.value_of("granularity") {
        mux_opts.granularity = granularity
            .parse::<f64>()
            .context("invalid granularity argument")?;
    }
    if let Some(period) = matches.value_of("period") {
        session_opts.cycle_period = period.parse::<f64>().context("invalid period argument")?;
    }
    if let Some(steps) = matches.value_of("steps") {
        session_opts.steps_per_cycle = steps.parse::<u32>().context("invalid steps argument")?;
    }

    Ok(())
}

/// Parses the value of the named argument, if it was given.
fn parse_arg<T>(matches: &ArgMatches, name: &str, default: T) -> Result<T, Error>
where
    T: FromStr,
    T::Err: ::std::error::Error + Send + Sync + 'static,
{
    match matches.value_of(name) {
        Some(value) => Ok(value
            .parse::<T>()
            .with_context(|_| format!("invalid {} argument", name))?),
        None => Ok(default),
    }
}
