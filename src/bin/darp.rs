use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use rayon::ThreadPoolBuilder;
use structopt::StructOpt;
use tracing::*;

use darp_mip::init_logging;
use darp_mip::data::{examples, LaebInstance, LbInstance};
use darp_mip::model::Formulation;
use darp_mip::solve::{HighsSolver, SolveStatus};

#[derive(Debug, Copy, Clone)]
enum Instance {
    SingleRequest,
    ThreeRequest,
    Demanding,
}

impl FromStr for Instance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        return match s {
            "single" => Ok(Self::SingleRequest),
            "three" => Ok(Self::ThreeRequest),
            "demanding" => Ok(Self::Demanding),
            _ => Err(format!("invalid instance: {}", s)),
        };
    }
}

impl Instance {
    fn data(self) -> LbInstance {
        return match self {
            Instance::SingleRequest => examples::single_request(30.0),
            Instance::ThreeRequest => examples::three_request(1),
            Instance::Demanding => examples::demanding(),
        };
    }
}

#[derive(Debug, Copy, Clone)]
enum Encoding {
    Lb,
    Laeb,
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        return match s {
            "lb" => Ok(Self::Lb),
            "laeb" => Ok(Self::Laeb),
            _ => Err(format!("invalid formulation: {}", s)),
        };
    }
}

#[derive(Debug, StructOpt)]
struct ClArgs {
    #[structopt(parse(try_from_str), possible_values = &["single", "three", "demanding"])]
    instance: Instance,
    #[structopt(long, short = "f", default_value = "lb", possible_values = &["lb", "laeb"])]
    formulation: Encoding,
    #[structopt(long, short = "c", default_value = "1")]
    cpus: usize,
    /// Wall-clock budget for the solver, in seconds.
    #[structopt(long)]
    time_limit: Option<f64>,
    #[structopt(long)]
    verbose: bool,
    #[structopt(long, parse(from_os_str))]
    logfile: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = ClArgs::from_args();
    let _flush_guard = init_logging(args.logfile.as_ref());
    ThreadPoolBuilder::new().num_threads(args.cpus).build_global()?;

    let data = args.instance.data();
    info!(id = %data.id, n = data.n, k = data.K, "instance loaded");

    let model = match args.formulation {
        Encoding::Lb => Formulation::build_lb(data)?,
        Encoding::Laeb => Formulation::build_laeb(LaebInstance::from_lb(&data))?,
    };

    let solver = HighsSolver { time_limit: args.time_limit, verbose: args.verbose };
    let outcome = model.solve(&solver)?;

    match &outcome.status {
        SolveStatus::Optimal | SolveStatus::Feasible | SolveStatus::TimeLimit
            if outcome.assignment.is_some() =>
        {
            if outcome.status == SolveStatus::TimeLimit {
                println!("Time limit reached; best incumbent (optimality unverified):");
            }
            for (k, route) in model.routes(&outcome)?.iter().enumerate() {
                println!("Vehicle {}:", k + 1);
                for m in 0..route.path.len() - 1 {
                    println!(
                        "  From {} to {} | Depart: {:.2}, Arrive: {:.2}, Load after: {}",
                        route.path[m],
                        route.path[m + 1],
                        route.service_start[m],
                        route.arrival[m + 1],
                        route.load[m + 1],
                    );
                }
                println!();
            }
            println!("Total cost: {:.2}", outcome.objective.unwrap_or(f64::NAN));
            return Ok(());
        }
        status => {
            eprintln!("No solution: {:?}", status);
            std::process::exit(1);
        }
    }
}
