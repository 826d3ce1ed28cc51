use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use robolink::config::{self, LinkSettings, merge_settings};
use robolink::key::{Axis, Button, PortSensor, Side, Tilt};
use robolink::{
    DeviceId, DeviceProfile, Finch, Hummingbird, HummingbirdBit, LinkError, LinkResult, QueryKey,
    Sensor, SensorValue,
};

/// Drive a Finch or Hummingbird through its local control server
#[derive(Parser)]
#[command(name = "robolink")]
#[command(version)]
#[command(about = "Drive a Finch or Hummingbird through its local control server")]
struct Cli {
    /// Settings file layered over the user and project configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Robot family: finch, hummingbird or hummingbird-bit
    #[arg(long, global = true)]
    device: Option<DeviceProfile>,

    /// Control server address (default depends on the robot family)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read one sensor through the cache and print its JSON value
    Read(SensorArgs),
    /// Poll one sensor at a fixed rate, printing each value
    Watch {
        #[command(flatten)]
        sensor: SensorArgs,

        /// Polls per second
        #[arg(long, default_value_t = 10.0)]
        hz: f64,

        /// Stop after this many polls
        #[arg(long)]
        count: Option<u64>,
    },
    /// Set Finch wheel speeds in percent
    Motors {
        #[arg(allow_hyphen_values = true)]
        left: f64,
        #[arg(allow_hyphen_values = true)]
        right: f64,
    },
    /// Set the Finch beak color in percent
    Beak { red: f64, green: f64, blue: f64 },
    /// Set a classic Hummingbird motor speed in percent
    Motor {
        port: u8,
        #[arg(allow_hyphen_values = true)]
        speed: f64,
    },
    /// Set a Hummingbird LED intensity in percent
    Led {
        port: u8,
        intensity: f64,
        /// Hummingbird Bit controller (default from configuration)
        #[arg(long)]
        device_id: Option<String>,
    },
    /// Put the robot's actuators in a safe state
    Halt {
        /// Hummingbird Bit controller (default from configuration)
        #[arg(long)]
        device_id: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SensorName {
    Temperature,
    Obstacle,
    Light,
    Acceleration,
    Dial,
    Distance,
    Sound,
    Voltage,
    Accelerometer,
    Magnetometer,
    Button,
    Tilt,
    Compass,
}

#[derive(Clone, Copy, ValueEnum)]
enum AxisArg {
    X,
    Y,
    Z,
}

#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    Left,
    Right,
}

#[derive(Clone, Copy, ValueEnum)]
enum ButtonArg {
    A,
    B,
}

#[derive(Clone, Copy, ValueEnum)]
enum TiltArg {
    ScreenUp,
    ScreenDown,
    TiltLeft,
    TiltRight,
    LogoUp,
    LogoDown,
    Shake,
}

#[derive(Args)]
struct SensorArgs {
    #[arg(value_enum)]
    sensor: SensorName,

    /// Sensor port (Hummingbird Bit port sensors)
    #[arg(long)]
    port: Option<u8>,

    #[arg(long, value_enum)]
    axis: Option<AxisArg>,

    #[arg(long, value_enum)]
    side: Option<SideArg>,

    #[arg(long, value_enum)]
    button: Option<ButtonArg>,

    #[arg(long, value_enum)]
    tilt: Option<TiltArg>,

    /// Hummingbird Bit controller (default from configuration)
    #[arg(long)]
    device_id: Option<String>,
}

fn missing(flag: &str, sensor: &str) -> LinkError {
    LinkError::config(format!("{} needs --{}", sensor, flag))
}

impl SensorArgs {
    fn query(&self, default_device: &DeviceId) -> LinkResult<QueryKey> {
        let axis = || {
            self.axis
                .map(|axis| match axis {
                    AxisArg::X => Axis::X,
                    AxisArg::Y => Axis::Y,
                    AxisArg::Z => Axis::Z,
                })
                .ok_or_else(|| missing("axis", "this sensor"))
        };
        let side = || {
            self.side
                .map(|side| match side {
                    SideArg::Left => Side::Left,
                    SideArg::Right => Side::Right,
                })
                .ok_or_else(|| missing("side", "this sensor"))
        };
        let port = |kind| {
            self.port
                .map(|port| Sensor::Port { kind, port })
                .ok_or_else(|| missing("port", "a port sensor"))
        };

        let sensor = match self.sensor {
            SensorName::Temperature => match self.port {
                Some(_) => port(PortSensor::Temperature)?,
                None => Sensor::Temperature,
            },
            SensorName::Obstacle => Sensor::Obstacle(side()?),
            SensorName::Light => match self.port {
                Some(_) => port(PortSensor::Light)?,
                None => Sensor::Light(side()?),
            },
            SensorName::Acceleration => Sensor::Acceleration(axis()?),
            SensorName::Dial => port(PortSensor::Dial)?,
            SensorName::Distance => port(PortSensor::Distance)?,
            SensorName::Sound => port(PortSensor::Sound)?,
            SensorName::Voltage => port(PortSensor::Voltage)?,
            SensorName::Accelerometer => Sensor::Accelerometer(axis()?),
            SensorName::Magnetometer => Sensor::Magnetometer(axis()?),
            SensorName::Button => Sensor::Button(match self.button {
                Some(ButtonArg::A) => Button::A,
                Some(ButtonArg::B) => Button::B,
                None => return Err(missing("button", "button")),
            }),
            SensorName::Tilt => Sensor::Tilt(match self.tilt {
                Some(TiltArg::ScreenUp) => Tilt::ScreenUp,
                Some(TiltArg::ScreenDown) => Tilt::ScreenDown,
                Some(TiltArg::TiltLeft) => Tilt::TiltLeft,
                Some(TiltArg::TiltRight) => Tilt::TiltRight,
                Some(TiltArg::LogoUp) => Tilt::LogoUp,
                Some(TiltArg::LogoDown) => Tilt::LogoDown,
                Some(TiltArg::Shake) => Tilt::Shake,
                None => return Err(missing("tilt", "tilt")),
            }),
            SensorName::Compass => Sensor::Compass,
        };
        Ok(QueryKey::new(device_or(self.device_id.as_deref(), default_device), sensor))
    }
}

fn device_or(flag: Option<&str>, default_device: &DeviceId) -> DeviceId {
    flag.map(DeviceId::new)
        .unwrap_or_else(|| default_device.clone())
}

enum Robot {
    Finch(Finch),
    Hummingbird(Hummingbird),
    Bit(HummingbirdBit),
}

impl Robot {
    fn connect(settings: &LinkSettings) -> LinkResult<Self> {
        let resolved = settings.resolve()?;
        match resolved.profile {
            DeviceProfile::Finch => Finch::connect(&resolved).map(Robot::Finch),
            DeviceProfile::Hummingbird => Hummingbird::connect(&resolved).map(Robot::Hummingbird),
            DeviceProfile::HummingbirdBit => HummingbirdBit::connect(&resolved).map(Robot::Bit),
        }
    }

    fn default_device(&self) -> &DeviceId {
        match self {
            Robot::Finch(finch) => finch.link().default_device(),
            Robot::Hummingbird(duo) => duo.link().default_device(),
            Robot::Bit(bit) => bit.link().default_device(),
        }
    }

    async fn read(&self, key: &QueryKey) -> LinkResult<SensorValue> {
        match self {
            Robot::Finch(finch) => finch.link().read(key).await,
            Robot::Hummingbird(duo) => duo.link().read(key).await,
            Robot::Bit(bit) => bit.link().read(key).await,
        }
    }

    async fn idle(&self) {
        match self {
            Robot::Finch(finch) => finch.link().idle().await,
            Robot::Hummingbird(duo) => duo.link().idle().await,
            Robot::Bit(bit) => bit.link().idle().await,
        }
    }

    /// Host stop signal: halt whatever this process has driven.
    fn halt_known(&self) -> LinkResult<()> {
        let halted = match self {
            Robot::Finch(finch) => finch.stop()?,
            Robot::Hummingbird(duo) => duo.stop()?,
            Robot::Bit(bit) => bit.stop(),
        };
        log::info!(target: "robolink::cli", "Halt sent to {} actuators", halted);
        Ok(())
    }

    fn finch(&self, command: &str) -> LinkResult<&Finch> {
        match self {
            Robot::Finch(finch) => Ok(finch),
            _ => Err(LinkError::unsupported(format!("{} needs a Finch", command))),
        }
    }

    fn hummingbird(&self, command: &str) -> LinkResult<&Hummingbird> {
        match self {
            Robot::Hummingbird(duo) => Ok(duo),
            _ => Err(LinkError::unsupported(format!(
                "{} needs a classic Hummingbird",
                command
            ))),
        }
    }
}

fn print_value(value: &SensorValue) {
    println!("{}", value);
}

async fn watch(robot: &Robot, key: &QueryKey, hz: f64, count: Option<u64>) -> LinkResult<()> {
    if !(hz.is_finite() && hz > 0.0) {
        return Err(LinkError::config(format!("--hz must be positive, got {}", hz)));
    }
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / hz));
    let mut polls = 0u64;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        if count.is_some_and(|limit| polls >= limit) {
            return Ok(());
        }
        tokio::select! {
            _ = &mut ctrl_c => {
                robot.halt_known()?;
                return Ok(());
            }
            _ = ticker.tick() => {
                polls += 1;
                match robot.read(key).await {
                    Ok(value) => print_value(&value),
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
        }
    }
}

async fn run(cli: Cli) -> LinkResult<()> {
    let project_dir = std::env::current_dir().ok();
    let layered = config::load_layered(cli.config.as_deref(), project_dir.as_deref())?;
    let overrides = LinkSettings {
        device: cli.device,
        base_url: cli.base_url,
        ..LinkSettings::default()
    };
    let settings = merge_settings(Some(layered), Some(overrides)).unwrap_or_default();
    let robot = Robot::connect(&settings)?;

    match cli.command {
        Command::Read(sensor) => {
            let value = robot.read(&sensor.query(robot.default_device())?).await?;
            print_value(&value);
        }
        Command::Watch { sensor, hz, count } => {
            watch(&robot, &sensor.query(robot.default_device())?, hz, count).await?;
        }
        Command::Motors { left, right } => {
            robot.finch("motors")?.set_motors(left, right)?;
        }
        Command::Beak { red, green, blue } => {
            robot.finch("beak")?.set_beak(red, green, blue)?;
        }
        Command::Motor { port, speed } => {
            robot.hummingbird("motor")?.set_motor(port, speed)?;
        }
        Command::Led {
            port,
            intensity,
            device_id,
        } => match &robot {
            Robot::Hummingbird(duo) => {
                duo.set_led(port, intensity)?;
            }
            Robot::Bit(bit) => {
                let device = device_or(device_id.as_deref(), robot.default_device());
                bit.set_led(&device, port, intensity)?;
            }
            Robot::Finch(_) => {
                return Err(LinkError::unsupported("led needs a Hummingbird"));
            }
        },
        Command::Halt { device_id } => {
            let halted = match &robot {
                Robot::Finch(finch) => finch.stop()?,
                Robot::Hummingbird(duo) => duo.stop()?,
                Robot::Bit(bit) => {
                    bit.stop_device(&device_or(device_id.as_deref(), robot.default_device()))?
                }
            };
            log::info!(target: "robolink::cli", "Halt sent to {} actuators", halted);
        }
    }

    robot.idle().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
