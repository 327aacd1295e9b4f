//! Main drive executable entry point.
//! 
//! # Architecture
//! 
//! The general execution methodology consists of:
//! 
//!     - Initialise all modules
//!     - Main loop:
//!         - System input acquisition (vehicle snapshots from the plant)
//!         - Telecommand processing and handling
//!         - Differential drive control processing
//!         - Archiving
//!         - Cycle management
//! 
//! # Modules
//! 
//! All modules (e.g. `diff_drive`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.
//!     

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use drive_lib::{
    auto::{HeadingGuidance, HeadingGuidanceParams},
    data_store::DataStore,
    diff_drive::{DiffDrive, Params, CYCLE_PERIOD_S},
    sim::{SimParams, VehicleSim},
};

mod tc_processor;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use color_eyre::{Report, eyre::WrapErr};
use structopt::StructOpt;

// Internal
use util::{
    archive::Archived,
    host, 
    module::State,
    logger::{logger_init, LevelFilter},
    session::{self, Session},
    script_interpreter::{ScriptInterpreter, PendingTcs},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of cycles per second
const CYCLE_FREQUENCY_HZ: f64 = 1.0 / CYCLE_PERIOD_S;

/// Time constant of the simulated wheel response.
const SIM_WHEEL_TIME_CONST_S: f64 = 0.05;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(
    name = "drive_exec",
    about = "Run the differential drive controller against a simulated vehicle."
)]
struct Opts {
    /// Path to the telecommand script to execute.
    #[structopt(parse(from_os_str))]
    script: PathBuf,

    /// DiffDrive parameter file, relative to the params directory.
    #[structopt(long, default_value = "diff_drive.toml")]
    params: PathBuf,

    /// Heading guidance parameter file, relative to the params directory.
    #[structopt(long, default_value = "heading_guidance.toml")]
    guidance_params: PathBuf,

    /// Also print debug messages to stdout.
    #[structopt(short, long)]
    verbose: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "drive_exec", 
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    let stdout_level = match opts.verbose {
        true => LevelFilter::Debug,
        false => LevelFilter::Info
    };
    logger_init(stdout_level, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Differential Drive Executable\n");
    info!("Running on: {}", host::get_host_desc());
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI arguments: {:?}", opts);

    // ---- LOAD SCRIPT ----

    info!("Loading script from {:?}", opts.script);

    let mut si = ScriptInterpreter::new(&opts.script)
        .wrap_err("Failed to load script")?;

    info!(
        "Loaded script lasts {:.02} s and contains {} TCs\n",
        si.get_duration(),
        si.get_num_tcs()
    );

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let guidance_params: HeadingGuidanceParams = util::params::load(&opts.guidance_params)
        .wrap_err("Could not load heading guidance params")?;

    let mut drive = DiffDrive::new(
        Params::default(), 
        HeadingGuidance::new(guidance_params)
    );
    drive.init(opts.params.clone(), &session)
        .wrap_err("Failed to initialise DiffDrive")?;
    info!("DiffDrive init complete");

    let sim = VehicleSim::new(SimParams::from_drive_params(
        drive.params(), 
        SIM_WHEEL_TIME_CONST_S
    ));
    info!("Simulation init complete: {:?}", sim.params());

    let mut ds = DataStore::new(drive, &opts.params, sim);

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {

        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle and acquire
        // the vehicle state
        ds.cycle_start(session::get_elapsed_seconds(), CYCLE_FREQUENCY_HZ);

        // ---- TELECOMMAND PROCESSING ----

        match si.get_pending_tcs() {
            PendingTcs::None => (),
            PendingTcs::Some(tc_vec) => {
                for tc in tc_vec.iter() {
                    tc_processor::exec(&mut ds, tc);
                }
            }
            // Exit if end of script reached
            PendingTcs::EndOfScript => {
                info!("End of TC script reached, stopping");
                break
            }
        }

        // ---- CONTROL ALGORITHM PROCESSING ----

        match ds.drive.proc(&ds.drive_input) {
            Ok((o, r)) => {
                ds.drive_output = o;
                ds.drive_status_rpt = r;
            },
            Err(e) => warn!("Error during DiffDrive processing: {}", e)
        };

        if ds.is_1_hz_cycle {
            info!(
                "{:?}: cmd [{:.3}, {:.3}], speed {:.3} m/s, heading {:.3} rad{}",
                ds.drive_status_rpt.mode,
                ds.drive_output.left(),
                ds.drive_output.right(),
                ds.sim.speed_ms(),
                ds.sim.heading_rad,
                match ds.drive_status_rpt.stop_causes() {
                    s if s.any() => format!(", stopped ({:?})", s),
                    _ => String::new()
                }
            );

            match serde_json::to_string(&ds.drive_status_rpt) {
                Ok(s) => debug!("DiffDrive status: {}", s),
                Err(e) => warn!("Could not serialise the DiffDrive status report: {}", e)
            }
        }

        // ---- WRITE ARCHIVES ----

        if let Err(e) = ds.drive.write() {
            warn!("Could not write DiffDrive archives: {}", e);
        }

        // ---- CYCLE MANAGEMENT ----

        ds.cycle_end();

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(CYCLE_PERIOD_S)
            .checked_sub(cycle_dur)
        {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            },
            None => {
                warn!(
                    "Cycle overran by {:.06} s", 
                    cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
                );
                ds.num_consec_cycle_overruns += 1;
            }
        }
    }

    // ---- SHUTDOWN ----

    info!(
        "Drove {:.2} m north, {:.2} m east in {} cycles",
        ds.sim.pos_m_lm[0],
        ds.sim.pos_m_lm[1],
        ds.num_cycles
    );

    session.save("diff_drive_params.json", ds.drive.params().clone());
    session.exit();

    info!("End of execution");

    Ok(())
}
