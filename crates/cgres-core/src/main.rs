//! cgres - container-aware resource detection CLI
//!
//! Reports the memory and CPU limits actually imposed on this process by
//! its cgroup, falling back to host-wide values where no cgroup narrows
//! them. Intended both as a standalone diagnostic and as a reference for
//! embedding [`cgres_core::collect`] in a managed runtime.

use cgres_core::collect::{self, MetricResult, ResourceLimits};
use cgres_core::config::DetectorConfig;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

#[derive(Parser)]
#[command(name = "cgres")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Output format.
    #[arg(long, short = 'f', global = true, default_value = "human", env = "CGRES_FORMAT")]
    format: Format,
}

#[derive(Subcommand)]
enum Command {
    /// Detect cgroup limits and print them (the default command).
    Probe,
    /// Print the environment-derived configuration this run would use.
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Human,
    Json,
}

fn main() {
    cgres_core::logging::init_logging();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Probe) {
        Command::Probe => run_probe(cli.format),
        Command::Config => run_config(cli.format),
    }
}

fn run_config(format: Format) {
    let config = DetectorConfig::from_env();
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&config).unwrap()),
        Format::Human => {
            println!("proc_root:    {}", config.proc_root.as_deref().unwrap_or("/proc (default)"));
            println!("cache_ttl_ms: {}", config.cache_ttl_ms);
            println!(
                "cgroup_root:  {} (diagnostic only; not consumed by detection)",
                config.cgroup_root.as_deref().unwrap_or("(unset)")
            );
        }
    }
}

fn run_probe(format: Format) {
    match collect::detect() {
        Some(limits) => print_probe(&limits, format),
        None => {
            info!("no usable cgroup support detected; host is unconstrained");
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&ProbeReport::unconstrained()).unwrap()),
                Format::Human => println!("no cgroup support detected (host-unconstrained)"),
            }
        }
    }
}

#[derive(Serialize)]
struct ProbeReport {
    container_type: Option<&'static str>,
    is_containerized: bool,
    host_online_cpus: u32,
    active_processor_count: Option<u32>,
    memory_limit_in_bytes: MetricResult,
    memory_usage_in_bytes: MetricResult,
    memory_and_swap_limit_in_bytes: MetricResult,
    available_memory_in_bytes: MetricResult,
    pids_max: MetricResult,
    pids_current: MetricResult,
    cpuset_cpus: Option<String>,
}

impl ProbeReport {
    fn unconstrained() -> Self {
        ProbeReport {
            container_type: None,
            is_containerized: false,
            host_online_cpus: collect::host_online_cpus(),
            active_processor_count: None,
            memory_limit_in_bytes: MetricResult::Unavailable,
            memory_usage_in_bytes: MetricResult::Unavailable,
            memory_and_swap_limit_in_bytes: MetricResult::Unavailable,
            available_memory_in_bytes: MetricResult::Unavailable,
            pids_max: MetricResult::Unavailable,
            pids_current: MetricResult::Unavailable,
            cpuset_cpus: None,
        }
    }

    fn from_limits(limits: &ResourceLimits) -> Self {
        ProbeReport {
            container_type: Some(limits.container_type()),
            is_containerized: limits.is_containerized(),
            host_online_cpus: limits.host_online_cpus(),
            active_processor_count: Some(limits.active_processor_count()),
            memory_limit_in_bytes: limits.memory_limit_in_bytes(),
            memory_usage_in_bytes: limits.memory_usage_in_bytes(),
            memory_and_swap_limit_in_bytes: limits.memory_and_swap_limit_in_bytes(),
            available_memory_in_bytes: limits.available_memory_in_bytes(),
            pids_max: limits.pids_max(),
            pids_current: limits.pids_current(),
            cpuset_cpus: limits.cpuset_cpus(),
        }
    }
}

fn print_probe(limits: &ResourceLimits, format: Format) {
    let report = ProbeReport::from_limits(limits);
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report).unwrap()),
        Format::Human => {
            println!("container type:     {}", limits.container_type());
            println!("containerized:       {}", limits.is_containerized());
            println!("host online CPUs:    {}", limits.host_online_cpus());
            println!("active processors:   {}", limits.active_processor_count());
            println!("memory limit:        {:?}", limits.memory_limit_in_bytes());
            println!("memory usage:        {:?}", limits.memory_usage_in_bytes());
            println!("memory+swap limit:   {:?}", limits.memory_and_swap_limit_in_bytes());
            println!("available memory:    {:?}", limits.available_memory_in_bytes());
            println!("pids max:            {:?}", limits.pids_max());
            println!("pids current:        {:?}", limits.pids_current());
            println!("cpuset.cpus:         {}", limits.cpuset_cpus().as_deref().unwrap_or("(unavailable)"));
        }
    }
}
