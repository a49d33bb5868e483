//! Pure functions that synthesize the `qsub` resource string, argv, and the
//! submit script written to disk before invoking it. No I/O except the one
//! script-writing function, and no retry/spawn concerns live here.

use std::io::Write;
use std::path::Path;

/// Builds the `-l` resource-request string: `nodes=<N>[:<cluster_label>]:ppn=<C>[:mem=<M>]`.
///
/// The bracketed fragments are included iff the corresponding input is
/// non-empty; fields are emitted in this fixed order regardless.
pub fn build_resource_string(
    num_nodes: u32,
    cluster_label: Option<&str>,
    num_cpus_per_node: u32,
    memory_per_job: Option<&str>,
) -> String {
    let mut s = format!("nodes={num_nodes}");
    if let Some(label) = cluster_label.filter(|l| !l.is_empty()) {
        s.push(':');
        s.push_str(label);
    }
    s.push_str(&format!(":ppn={num_cpus_per_node}"));
    if let Some(mem) = memory_per_job.filter(|m| !m.is_empty()) {
        s.push_str(":mem=");
        s.push_str(mem);
    }
    s
}

/// Inputs needed to build the `qsub` argument vector, decoupled from
/// `Driver` so the function stays pure and independently testable.
#[derive(Debug, Clone)]
pub struct QsubArgs<'a> {
    pub qsub_cmd: &'a str,
    pub keep_output: bool,
    pub num_nodes: u32,
    pub cluster_label: Option<&'a str>,
    pub num_cpus_per_node: u32,
    pub memory_per_job: Option<&'a str>,
    pub queue: Option<&'a str>,
    pub job_name: Option<&'a str>,
    pub submit_script_path: &'a Path,
}

/// Builds the ordered `qsub` argument vector (program name included as the
/// first element). Order is fixed: cmd, `-k oe` (unless output is kept),
/// `-l <resources>`, `-q <queue>` (if set), `-N <job_name>` (if set),
/// `-r n`, then the script path. `-r n` marks the job non-rerunnable.
pub fn build_qsub_argv(args: &QsubArgs<'_>) -> Vec<String> {
    let mut argv = Vec::with_capacity(12);
    argv.push(args.qsub_cmd.to_string());

    if !args.keep_output {
        argv.push("-k".to_string());
        argv.push("oe".to_string());
    }

    argv.push("-l".to_string());
    argv.push(build_resource_string(
        args.num_nodes,
        args.cluster_label,
        args.num_cpus_per_node,
        args.memory_per_job,
    ));

    if let Some(queue) = args.queue {
        argv.push("-q".to_string());
        argv.push(queue.to_string());
    }

    if let Some(job_name) = args.job_name {
        argv.push("-N".to_string());
        argv.push(job_name.to_string());
    }

    argv.push("-r".to_string());
    argv.push("n".to_string());

    argv.push(args.submit_script_path.display().to_string());

    argv
}

/// Writes the submit script: `#!/bin/sh\n` followed by one line joining
/// `submit_cmd` and each `job_args` entry with spaces.
///
/// No quoting is applied to `job_args`, a documented limitation inherited
/// from the original driver. Arguments containing whitespace will be split
/// by the shell when the script runs; callers must pre-quote if that
/// matters.
pub fn write_submit_script(
    path: &Path,
    submit_cmd: &str,
    job_args: &[String],
) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write!(file, "#!/bin/sh\n{submit_cmd}")?;
    for arg in job_args {
        write!(file, " {arg}")?;
    }
    writeln!(file)?;
    Ok(())
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
