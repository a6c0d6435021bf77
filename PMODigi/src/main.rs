use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pmoconfig::{Config, encryption};
use pmodigi::{Channel, DEFAULT_QUALITY, DeviceConfig, DigiClient, DigiConfigExt};
use tracing::info;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "pmodigi")]
#[command(about = "DigiOnline live TV stream resolver")]
struct Args {
    /// Configuration directory (defaults to $PMODIGI_CONFIG, ./.pmodigi, ~/.pmodigi)
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a channel and print the stream URL and payload
    Play {
        /// Channel id, as used in player URLs
        channel_id: String,

        /// Channel display name (defaults to the id)
        #[arg(long)]
        name: Option<String>,

        /// Stream quality
        #[arg(short, long, default_value = DEFAULT_QUALITY)]
        quality: String,

        /// Device id (index in the devices list)
        #[arg(short, long, default_value = "0")]
        device: usize,
    },

    /// List configured devices
    Devices,

    /// Add a device; the password is stored encrypted
    AddDevice {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,
    },

    /// Print the encrypted form of a password for config.yaml
    EncryptPassword { password: String },
}

fn load_config(dir: Option<&str>) -> Result<Arc<Config>> {
    match dir {
        Some(dir) => Ok(Arc::new(Config::load_config(dir)?)),
        None => Ok(pmoconfig::get_config()),
    }
}

/// Initialise le logging depuis `host.logger`; `RUST_LOG` a priorité
fn init_logging(config: &Config) {
    let level = config
        .get_log_min_level()
        .unwrap_or_else(|_| "INFO".to_string())
        .to_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let enable_console = config.get_log_enable_console().unwrap_or(true);

    let subscriber = Registry::default().with(filter);
    if enable_console {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let setup = || -> Result<Arc<Config>> {
        let config = load_config(args.config_dir.as_deref())?;
        init_logging(&config);
        Ok(config)
    };

    match args.command {
        // Pas besoin de la configuration pour chiffrer
        Command::EncryptPassword { password } => {
            println!("{}", encryption::encrypt_password(&password)?);
        }
        Command::Play {
            channel_id,
            name,
            quality,
            device,
        } => {
            let client = DigiClient::from_config(setup()?)?;
            let channel = Channel::new(&channel_id, name.as_deref().unwrap_or(&channel_id));

            info!(channel = %channel.name, %quality, device, "Resolving stream");
            let stream = client.get_playlist(&channel, Some(&quality), device).await?;

            println!("{}", stream.url);
            println!("{}", stream.content);
        }
        Command::Devices => {
            let devices = setup()?.get_digi_devices()?;
            if devices.is_empty() {
                println!("No device configured");
            }
            for (id, device) in devices.iter().enumerate() {
                println!("{id}\t{}\t{}", device.device_name, device.email);
            }
        }
        Command::AddDevice {
            name,
            email,
            password,
        } => {
            let device = DeviceConfig {
                device_name: name,
                email,
                password: encryption::encrypt_password(&password)?,
            };
            let id = setup()?.add_digi_device(&device)?;
            println!("Device {} added with id {id}", device.device_name);
        }
    }

    Ok(())
}
