//! Main speed planner executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Input acquisition (snapshot of the InputClient's cache)
//!         - Speed planning
//!         - Output publication and archiving
//!
//! # Modules
//!
//! All modules (e.g. `speed_ctrl`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::{eyre, WrapErr}, Report};
use log::{debug, info, warn};
use std::env;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use comms_if::net::NetParams;
use plan_lib::{
    input_client::InputClient,
    lane_server::LaneServer,
    speed_ctrl::{InitData, SpeedPlanner, TickOutcome},
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    raise_error,
    session::Session,
    time::age_seconds,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.10;

/// Number of consecutive cycle overruns after which the executable gives up.
const MAX_CONSEC_CYCLE_OVERRUNS: u64 = 500;

/// Inputs older than this are reported as stale.
const STALE_INPUT_AGE_S: f64 = 1.0;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("plan_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Speed Planner Executable\n");
    info!("Running on: {}", host::get_hostname());
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    // An optional single argument overrides the planner parameter file
    let args: Vec<String> = env::args().collect();
    debug!("CLI arguments: {:?}", args);

    let params_file = match args.len() {
        1 => String::from("speed_planner.toml"),
        2 => args[1].clone(),
        n => return Err(eyre!("Expected zero or one argument, found {}", n - 1)),
    };

    let net_params: NetParams = util::params::load("net.toml")
        .wrap_err("Could not load net params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut planner = SpeedPlanner::init(
        InitData {
            params_file,
            frames_file: String::from("frames.toml"),
        },
        &session,
    )
    .wrap_err("Failed to initialise SpeedPlanner")?;
    info!("SpeedPlanner init complete");

    let archive_outputs = planner.params().archive_outputs;
    if archive_outputs {
        info!("Published outputs will be archived in the session");
    }

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let input_client = {
        let c = InputClient::new(&zmq_ctx, &net_params)
            .wrap_err("Failed to initialise InputClient")?;
        info!("InputClient initialised");
        c
    };

    let mut lane_server = {
        let s = LaneServer::new(&zmq_ctx, &net_params)
            .wrap_err("Failed to initialise LaneServer")?;
        info!("LaneServer initialised");
        s
    };

    info!("Network initialisation complete");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let mut num_cycles: u64 = 0;
    let mut num_consec_cycle_overruns: u64 = 0;

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- DATA INPUT ----

        let snapshot = input_client.cache().snapshot();

        if let Some(ref pose) = snapshot.pose {
            let age_s = age_seconds(&pose.header.stamp);
            if age_s > STALE_INPUT_AGE_S {
                debug!("Pose is {:.02} s old", age_s);
            }
        }

        // ---- SPEED PLANNING ----

        let outcome = match planner.proc(&snapshot) {
            Ok((o, r)) => {
                debug!("SpeedPlanner status: {:?}", r);
                o
            }
            Err(e) => {
                warn!("Error during SpeedPlanner processing: {}", e);
                TickOutcome::Skipped
            }
        };

        // ---- OUTPUT ----

        if let TickOutcome::Publish(output) = outcome {
            if let Err(e) = lane_server.send(&output) {
                warn!("LaneServer error: {}", e);
            }

            if archive_outputs {
                session.save(format!("outputs/tick_{}.json", output.tick), output);
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(d) => {
                num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
                );
                num_consec_cycle_overruns += 1;

                if num_consec_cycle_overruns > MAX_CONSEC_CYCLE_OVERRUNS {
                    raise_error!(format!(
                        "More than {} consecutive cycle overruns",
                        MAX_CONSEC_CYCLE_OVERRUNS
                    ));
                }
            }
        }

        num_cycles += 1;
        if num_cycles % 100 == 0 {
            debug!("{} cycles complete", num_cycles);
        }
    }
}
