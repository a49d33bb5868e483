//! Manual exercise CLI for the driver: wires command-line flags onto
//! `Driver::set_option` and drives one of Submit/Status/Kill against a real
//! `qsub`/`qstat`/`qdel` installation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use torque_driver::{Driver, JobHandle};

#[derive(Parser)]
#[command(name = "torque-driver-cli", about = "Exercise the Torque batch-queue driver")]
struct Cli {
    /// QSUB_CMD override
    #[arg(long, default_value = "qsub")]
    qsub_cmd: String,

    /// QSTAT_CMD override
    #[arg(long)]
    qstat_cmd: Option<String>,

    /// QDEL_CMD override
    #[arg(long, default_value = "qdel")]
    qdel_cmd: String,

    /// NUM_NODES
    #[arg(long, default_value_t = 1)]
    num_nodes: u32,

    /// NUM_CPUS_PER_NODE
    #[arg(long, default_value_t = 1)]
    num_cpus_per_node: u32,

    /// QUEUE
    #[arg(long)]
    queue: Option<String>,

    /// QUEUE_QUERY_TIMEOUT, in seconds
    #[arg(long, default_value_t = 0)]
    timeout_secs: i64,

    /// DEBUG_OUTPUT path
    #[arg(long)]
    debug_output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a job: runs `submit_cmd job_args...` under the script.
    Submit {
        #[arg(long)]
        run_path: PathBuf,
        #[arg(long)]
        job_name: String,
        submit_cmd: String,
        job_args: Vec<String>,
    },
    /// Poll an already-submitted job's status.
    Status { job_id: i64 },
    /// Cancel an already-submitted job.
    Kill { job_id: i64 },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut driver = match &cli.qstat_cmd {
        Some(cmd) => Driver::with_qstat_proxy(cmd),
        None => Driver::new(),
    };

    for (key, value) in [
        ("QSUB_CMD", cli.qsub_cmd.as_str()),
        ("QDEL_CMD", cli.qdel_cmd.as_str()),
        ("NUM_NODES", &cli.num_nodes.to_string()),
        ("NUM_CPUS_PER_NODE", &cli.num_cpus_per_node.to_string()),
        ("QUEUE_QUERY_TIMEOUT", &cli.timeout_secs.to_string()),
    ] {
        if !driver.set_option(key, value) {
            bail!("rejected option {key}={value}");
        }
    }
    if let Some(queue) = &cli.queue {
        driver.set_option("QUEUE", queue);
    }
    if let Some(debug_output) = &cli.debug_output {
        let path = debug_output.to_str().context("DEBUG_OUTPUT must be UTF-8")?;
        driver.set_option("DEBUG_OUTPUT", path);
    }

    match cli.command {
        Command::Submit {
            run_path,
            job_name,
            submit_cmd,
            job_args,
        } => {
            std::fs::create_dir_all(&run_path).context("creating run path")?;
            match driver.submit(&submit_cmd, cli.num_cpus_per_node, &run_path, &job_name, &job_args)
            {
                Some(handle) => println!("submitted job id {}", handle.job_id()),
                None => bail!("submission failed"),
            }
        }
        Command::Status { job_id } => {
            let handle = JobHandle::from_raw(job_id).context("job id must be positive")?;
            println!("{:?}", driver.status(&handle));
        }
        Command::Kill { job_id } => {
            let handle = JobHandle::from_raw(job_id).context("job id must be positive")?;
            driver.kill(&handle);
        }
    }

    Ok(())
}
