use std::time::Duration;

use anyhow::{Context, anyhow};
use dialoguer::Select;
use rtcld_core::SerialLink;
use serialport::{SerialPort, SerialPortInfo, available_ports};
use structopt::StructOpt;
use tracing::info;

pub type Link = SerialLink<Box<dyn SerialPort>>;

#[derive(Debug, PartialEq, StructOpt)]
pub struct PortConfig {
    /// Serial port of the programmer; picked from the USB serial ports if omitted
    #[structopt(short, long)]
    pub port: Option<String>,

    #[structopt(long, default_value = "115200")]
    pub baud: u32,

    /// How long to wait for each answer from the programmer
    #[structopt(long, default_value = "20000")]
    pub timeout_ms: u64,
}

impl PortConfig {
    pub fn open(&self) -> anyhow::Result<Link> {
        let port_name = match &self.port {
            Some(name) => name.clone(),
            None => select_port()?,
        };

        let port = serialport::new(&port_name, self.baud)
            .timeout(Duration::from_millis(self.timeout_ms))
            .open()
            .with_context(|| format!("failed to open {}", port_name))?;
        info!("opened {} at {} baud", port_name, self.baud);

        Ok(SerialLink::new(port))
    }
}

fn select_port() -> anyhow::Result<String> {
    let ports = available_ports().context("failed to list serial ports")?;

    // filter ports for USB serial on linux/windows/macos
    let ports = ports
        .iter()
        .filter(|port| {
            port.port_name.contains("USB")
                || port.port_name.contains("COM")
                || port.port_name.contains("usb")
                || port.port_name.contains("ACM")
        })
        .collect::<Vec<&SerialPortInfo>>();

    match ports.as_slice() {
        [] => Err(anyhow!("No USB serial ports found! Are you in the dialout group?")),
        [p] => {
            println!("Using {}", p.port_name);
            Ok(p.port_name.clone())
        }
        ports => {
            println!("Multiple USB serial ports found");

            let port_names: Vec<String> = ports.iter().map(|port| port.port_name.clone()).collect();

            let selected = Select::new()
                .with_prompt("Select the programmer's serial port")
                .default(0)
                .items(&port_names)
                .interact()?;

            Ok(port_names[selected].clone())
        }
    }
}
