use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vtc_app::{
    AppResult, ConfigOverrides, ControllerConfig, MemoryDevice, PlantType, ScheduledChange,
    SimulateOptions, run_controller, seconds_to_duration, simulate, write_csv, write_jsonl,
};
use vtc_controls::ParameterChange;

#[derive(Parser)]
#[command(name = "vtc")]
#[command(about = "Virtual temperature controller - simulated plant under PID control", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller live against an in-memory field device.
    ///
    /// Parameter changes are read from stdin as `name=value` lines.
    Run {
        /// Stop after this many seconds (default: until Ctrl-C)
        #[arg(long)]
        duration: Option<f64>,
    },
    /// Run the loop offline on simulated time and print the samples
    Simulate {
        /// Simulated duration in seconds
        #[arg(long, default_value_t = 600.0)]
        duration: f64,
        /// Scheduled parameter change, `T:name=value` (repeatable)
        #[arg(long = "change")]
        changes: Vec<ScheduledChange>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the tuned gains for the configured plant
    Tune,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Jsonl,
}

#[derive(Clone, Copy, ValueEnum)]
enum PlantArg {
    #[value(name = "pt1")]
    Pt1,
    #[value(name = "two_pt1")]
    TwoPt1,
}

impl From<PlantArg> for PlantType {
    fn from(arg: PlantArg) -> Self {
        match arg {
            PlantArg::Pt1 => PlantType::Pt1,
            PlantArg::TwoPt1 => PlantType::TwoPt1,
        }
    }
}

/// Configuration sources above the YAML file: flags, then environment.
#[derive(Args)]
struct ConfigArgs {
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, env = "PLANT_TYPE", value_enum, ignore_case = true, global = true)]
    plant_type: Option<PlantArg>,
    #[arg(long, env = "PLANT_INITIAL_TEMPERATURE", global = true)]
    initial_temperature: Option<f64>,
    #[arg(long, env = "AMBIENT_TEMPERATURE", global = true)]
    ambient_temperature: Option<f64>,
    /// Single-lag time constant (s)
    #[arg(long, env = "PLANT_TAU", global = true)]
    tau: Option<f64>,
    /// Single-lag gain (°C per unit output)
    #[arg(long, env = "PLANT_K", global = true)]
    k: Option<f64>,
    #[arg(long, env = "PLANT_TAU_P", global = true)]
    tau_p: Option<f64>,
    #[arg(long, env = "PLANT_K_P", global = true)]
    k_p: Option<f64>,
    #[arg(long, env = "PLANT_TAU_H", global = true)]
    tau_h: Option<f64>,
    #[arg(long, env = "PLANT_K_H", global = true)]
    k_h: Option<f64>,
    /// Fast-tick period (s)
    #[arg(long, env = "DT_SIM", global = true)]
    dt_sim: Option<f64>,
    /// Publish period (s)
    #[arg(long, env = "UPDATE_INTERVAL", global = true)]
    update_interval: Option<f64>,
    #[arg(long, env = "TUNING_AGGRESSIVENESS", global = true)]
    aggressiveness: Option<f64>,
}

impl ConfigArgs {
    fn load(&self) -> AppResult<ControllerConfig> {
        let mut config = match &self.config {
            Some(path) => ControllerConfig::load(path)?,
            None => ControllerConfig::default(),
        };
        let overrides = ConfigOverrides {
            plant_type: self.plant_type.map(PlantType::from),
            initial_temperature: self.initial_temperature,
            ambient_temperature: self.ambient_temperature,
            tau: self.tau,
            k: self.k,
            tau_p: self.tau_p,
            k_p: self.k_p,
            tau_h: self.tau_h,
            k_h: self.k_h,
            dt_sim: self.dt_sim,
            update_interval: self.update_interval,
            aggressiveness: self.aggressiveness,
        };
        overrides.apply(&mut config);
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.load()?;

    match cli.command {
        Commands::Run { duration } => cmd_run(&config, duration).await,
        Commands::Simulate {
            duration,
            changes,
            format,
            output,
        } => cmd_simulate(&config, duration, changes, format, output.as_deref()),
        Commands::Tune => cmd_tune(&config),
    }
}

async fn cmd_run(config: &ControllerConfig, duration: Option<f64>) -> AppResult<()> {
    let duration = duration
        .map(|secs| seconds_to_duration("duration", secs))
        .transpose()?;
    let device = Arc::new(MemoryDevice::new(&config.defaults));
    let stdin_device = Arc::clone(&device);
    std::thread::spawn(move || read_changes(stdin_device));

    let shutdown = async move {
        let limit = async {
            match duration {
                Some(period) => tokio::time::sleep(period).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    tracing::warn!(error = %err, "could not listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            }
            () = limit => {}
        }
    };

    let summary = run_controller(config, device, shutdown).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Feed `name=value` lines from stdin to the device as external writes.
///
/// Runs on a plain thread so a pending read never holds up shutdown.
fn read_changes(device: Arc<MemoryDevice>) {
    for line in io::stdin().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(error = %err, "stopped reading stdin");
                return;
            }
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<ParameterChange>() {
            Ok(change) => {
                device.inject(change);
            }
            Err(err) => eprintln!("ignored {line:?}: {err}"),
        }
    }
}

fn cmd_simulate(
    config: &ControllerConfig,
    duration: f64,
    changes: Vec<ScheduledChange>,
    format: OutputFormat,
    output: Option<&Path>,
) -> AppResult<()> {
    let samples = simulate(config, &SimulateOptions { duration, changes })?;

    let mut out: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    match format {
        OutputFormat::Csv => write_csv(&samples, &mut out)?,
        OutputFormat::Jsonl => write_jsonl(&samples, &mut out)?,
    }
    out.flush()?;
    if let Some(path) = output {
        println!("Wrote {} samples to {}", samples.len(), path.display());
    }
    Ok(())
}

fn cmd_tune(config: &ControllerConfig) -> AppResult<()> {
    let tuning = vtc_app::tune(config)?;
    println!("Plant: {:?}", config.plant);
    println!("Aggressiveness: {}", config.aggressiveness);
    println!("  lambda = {:.4} s", tuning.lambda);
    println!("  kp     = {:.6}", tuning.kp);
    println!("  ki     = {:.6}", tuning.ki);
    println!("  kd     = {:.6}", tuning.kd);
    Ok(())
}
