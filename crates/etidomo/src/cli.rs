//! Clap derive structures for the `etidomo` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// etidomo -- control a CAME ETI/Domo home-automation controller
#[derive(Debug, Parser)]
#[command(
    name = "etidomo",
    version,
    about = "Control CAME ETI/Domo home automation from the command line",
    long_about = "Discovers the lights, covers, relays, thermostats, sensors, energy meters\n\
        and scenarios of an ETI/Domo controller and drives them over its local\n\
        JSON protocol.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Controller profile to use
    #[arg(long, short = 'p', env = "ETIDOMO_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Controller address (overrides profile)
    #[arg(long, short = 'H', env = "ETIDOMO_HOST", global = true)]
    pub host: Option<String>,

    /// Controller username (overrides profile)
    #[arg(long, short = 'u', env = "ETIDOMO_USERNAME", global = true)]
    pub username: Option<String>,

    /// Controller password
    #[arg(long, env = "ETIDOMO_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ETIDOMO_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "ETIDOMO_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect every discovered device
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// List floors
    Floors,

    /// List rooms
    Rooms,

    /// Control lights
    #[command(alias = "l")]
    Lights(LightsArgs),

    /// Control shutters, gates and other openings
    Covers(CoversArgs),

    /// Control generic relays
    Switches(SwitchesArgs),

    /// Control thermoregulation zones
    #[command(alias = "thermo")]
    Climate(ClimateArgs),

    /// Show analog sensors, digital inputs and energy meters
    Sensors,

    /// Show energy meters and their cumulative counters
    Energy,

    /// Manage scenarios
    #[command(alias = "scenes")]
    Scenarios(ScenariosArgs),

    /// Run integration services
    Services(ServicesArgs),

    /// Stream live events until interrupted
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Target entity: a full id (`light.cucina_59`), an id without the
/// platform prefix (`cucina_59`), or the device name.
#[derive(Debug, Args)]
pub struct Target {
    #[arg(value_name = "ENTITY")]
    pub entity: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DEVICES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List discovered devices
    #[command(alias = "ls")]
    List {
        /// Only devices of this platform
        #[arg(long, short = 'k')]
        platform: Option<PlatformArg>,
    },

    /// Show a device with its raw controller record
    Show(Target),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PlatformArg {
    Light,
    Cover,
    Climate,
    Switch,
    Sensor,
    BinarySensor,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  LIGHTS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct LightsArgs {
    #[command(subcommand)]
    pub command: LightsCommand,
}

#[derive(Debug, Subcommand)]
pub enum LightsCommand {
    /// List lights
    #[command(alias = "ls")]
    List,

    /// Switch a light on
    On(Target),

    /// Switch a light off
    Off(Target),

    /// Hand a light back to the controller's automation
    Auto(Target),

    /// Set brightness (dimmers and RGB lights)
    Brightness {
        #[command(flatten)]
        target: Target,

        /// Brightness in percent
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },

    /// Set the colour of an RGB light
    #[command(alias = "colour")]
    Color {
        #[command(flatten)]
        target: Target,

        /// Colour as R,G,B (0-255 each)
        #[arg(long, value_name = "R,G,B", conflicts_with_all = ["hue", "saturation"])]
        rgb: Option<String>,

        /// Hue in degrees (0-360)
        #[arg(long, requires = "saturation")]
        hue: Option<f64>,

        /// Saturation in percent (0-100)
        #[arg(long, requires = "hue")]
        saturation: Option<f64>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COVERS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CoversArgs {
    #[command(subcommand)]
    pub command: CoversCommand,
}

#[derive(Debug, Subcommand)]
pub enum CoversCommand {
    /// List openings
    #[command(alias = "ls")]
    List,

    /// Open
    Open(Target),

    /// Close
    Close(Target),

    /// Stop moving
    Stop(Target),

    /// Tilt slats open
    SlatOpen(Target),

    /// Tilt slats closed
    SlatClose(Target),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SWITCHES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SwitchesArgs {
    #[command(subcommand)]
    pub command: SwitchesCommand,
}

#[derive(Debug, Subcommand)]
pub enum SwitchesCommand {
    /// List relays
    #[command(alias = "ls")]
    List,

    /// Switch a relay on
    On(Target),

    /// Switch a relay off
    Off(Target),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CLIMATE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ClimateArgs {
    #[command(subcommand)]
    pub command: ClimateCommand,
}

#[derive(Debug, Subcommand)]
pub enum ClimateCommand {
    /// List thermoregulation zones
    #[command(alias = "ls")]
    List,

    /// Set the target temperature
    SetTemp {
        #[command(flatten)]
        target: Target,

        /// Temperature in °C
        celsius: f64,
    },

    /// Set the HVAC mode
    SetMode {
        #[command(flatten)]
        target: Target,

        mode: HvacModeArg,
    },

    /// Set the fan-coil speed
    SetFan {
        #[command(flatten)]
        target: Target,

        mode: FanModeArg,
    },

    /// Set the plant season
    SetSeason {
        #[command(flatten)]
        target: Target,

        season: SeasonArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HvacModeArg {
    Off,
    Auto,
    Heat,
    Cool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FanModeArg {
    Auto,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SeasonArg {
    PlantOff,
    Winter,
    Summer,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SCENARIOS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ScenariosArgs {
    #[command(subcommand)]
    pub command: ScenariosCommand,
}

#[derive(Debug, Subcommand)]
pub enum ScenariosCommand {
    /// List scenarios
    #[command(alias = "ls")]
    List,

    /// Activate a scenario
    Activate(Target),

    /// Start recording a new user scenario on the controller
    Create {
        /// Scenario name
        name: String,
    },

    /// Delete a user-defined scenario
    Delete(Target),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SERVICES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ServicesArgs {
    #[command(subcommand)]
    pub command: ServicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum ServicesCommand {
    /// Re-read the state of every device
    ForceUpdate,

    /// Re-discover devices, adding new ones and removing vanished ones
    PullDevices,

    /// Re-read the scenario list
    RefreshScenarios,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long, value_name = "SECS")]
    pub duration: Option<u64>,

    /// Do not poll energy meters
    #[arg(long)]
    pub no_energy: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Add a controller profile with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Set a value on the active profile
    Set {
        /// Profile key (host, username, password_env, timeout, poll_timeout,
        /// energy_interval, state_dir)
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a password in the system keyring
    SetPassword {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },

    /// Print the config file path
    Path {
        /// Print the state directory instead
        #[arg(long)]
        state: bool,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,

    /// Write into this directory instead of stdout
    #[arg(long)]
    pub dir: Option<PathBuf>,
}
