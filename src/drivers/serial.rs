use std::io::{self, ErrorKind};
use std::thread;
use std::time::Duration;

use log::{debug, info};
use serialport::{ClearBuffer, SerialPort, SerialPortType};

use crate::config::AcquisitionConfig;
use crate::drivers::link::{DeviceLink, LineReader};
use crate::error::{AcquisitionError, AcquisitionResult};

/// The two port operations the reset handshake needs.
pub trait ControlLines {
    fn set_dtr(&mut self, level: bool) -> serialport::Result<()>;
    fn discard_input(&mut self) -> serialport::Result<()>;
}

impl ControlLines for dyn SerialPort {
    fn set_dtr(&mut self, level: bool) -> serialport::Result<()> {
        self.write_data_terminal_ready(level)
    }

    fn discard_input(&mut self) -> serialport::Result<()> {
        self.clear(ClearBuffer::Input)
    }
}

/// Resets a board that reboots on a DTR transition.
///
/// Order matters: deassert DTR, let the bootloader settle, throw away whatever
/// it printed meanwhile, then assert DTR again.
pub fn reset_device<C: ControlLines + ?Sized>(
    port: &mut C,
    settle: Duration,
) -> serialport::Result<()> {
    port.set_dtr(false)?;
    thread::sleep(settle);
    port.discard_input()?;
    port.set_dtr(true)?;
    Ok(())
}

/// Hardware serial connection.
pub struct SerialLink {
    address: String,
    reader: Option<LineReader<Box<dyn SerialPort>>>,
}

impl SerialLink {
    /// Opens the port and runs the reset handshake before returning.
    pub fn open(config: &AcquisitionConfig) -> AcquisitionResult<Self> {
        info!(
            "Opening serial port {} at {} baud",
            config.address, config.baud_rate
        );
        let mut port = serialport::new(&config.address, config.baud_rate)
            .timeout(config.read_timeout())
            .open()
            .map_err(|source| AcquisitionError::Connection {
                address: config.address.clone(),
                source,
            })?;
        debug!(
            "Resetting device on {} (settle {:?})",
            config.address,
            config.settle_interval()
        );
        reset_device(port.as_mut(), config.settle_interval())
            .map_err(|source| AcquisitionError::Connection {
                address: config.address.clone(),
                source,
            })?;
        info!("Serial port {} ready", config.address);
        Ok(Self {
            address: config.address.clone(),
            reader: Some(LineReader::new(port)),
        })
    }
}

impl DeviceLink for SerialLink {
    fn read_line(&mut self) -> AcquisitionResult<Option<Vec<u8>>> {
        let reader = self.reader.as_mut().ok_or_else(|| {
            AcquisitionError::Read(io::Error::new(ErrorKind::NotConnected, "port is closed"))
        })?;
        reader.poll_line().map_err(AcquisitionError::Read)
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            info!("Closed serial port {}", self.address);
        }
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    fn name(&self) -> &str {
        &self.address
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Human-readable list of the serial ports present on this machine.
pub fn describe_ports() -> serialport::Result<Vec<String>> {
    let mut out: Vec<String> = serialport::available_ports()?
        .into_iter()
        .map(|p| match p.port_type {
            SerialPortType::UsbPort(info) => {
                let product = info.product.unwrap_or_default();
                format!(
                    "{} (USB {:04x}:{:04x} {})",
                    p.port_name, info.vid, info.pid, product
                )
                .trim_end()
                .to_owned()
            }
            SerialPortType::BluetoothPort => format!("{} (Bluetooth)", p.port_name),
            SerialPortType::PciPort => format!("{} (PCI)", p.port_name),
            SerialPortType::Unknown => p.port_name,
        })
        .collect();
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[derive(Debug, PartialEq)]
    enum Op {
        Dtr(bool),
        Discard,
    }

    #[derive(Default)]
    struct Recorder {
        ops: Vec<(Op, Instant)>,
        fail_discard: bool,
    }

    impl ControlLines for Recorder {
        fn set_dtr(&mut self, level: bool) -> serialport::Result<()> {
            self.ops.push((Op::Dtr(level), Instant::now()));
            Ok(())
        }

        fn discard_input(&mut self) -> serialport::Result<()> {
            if self.fail_discard {
                return Err(serialport::Error::new(
                    serialport::ErrorKind::NoDevice,
                    "unplugged",
                ));
            }
            self.ops.push((Op::Discard, Instant::now()));
            Ok(())
        }
    }

    #[test]
    fn reset_runs_in_order_with_settle() {
        let mut port = Recorder::default();
        reset_device(&mut port, Duration::from_millis(30)).unwrap();
        let ops: Vec<&Op> = port.ops.iter().map(|(op, _)| op).collect();
        assert_eq!(ops, vec![&Op::Dtr(false), &Op::Discard, &Op::Dtr(true)]);
        let settled = port.ops[1].1.duration_since(port.ops[0].1);
        assert!(settled >= Duration::from_millis(30));
    }

    #[test]
    fn reset_stops_at_first_failure() {
        let mut port = Recorder {
            fail_discard: true,
            ..Recorder::default()
        };
        assert!(reset_device(&mut port, Duration::ZERO).is_err());
        assert_eq!(port.ops.len(), 1);
    }

    #[test]
    fn open_missing_port_is_connection_error() {
        let config = AcquisitionConfig::new("/dev/serialscope-does-not-exist", 9600);
        match SerialLink::open(&config) {
            Err(AcquisitionError::Connection { address, .. }) => {
                assert_eq!(address, config.address)
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("opened a port that does not exist"),
        }
    }
}
