use std::fs::read_dir;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::prelude::{AsRawFd, RawFd};
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Result};
use evdev::uinput::VirtualDevice;
use evdev::{AttributeSet, Device, FetchEventsSynced, KeyCode};
use log::warn;

// The virtual device has to be able to emit any key a combo can produce.
pub fn output_device() -> Result<VirtualDevice> {
    let mut keys: AttributeSet<KeyCode> = AttributeSet::new();
    for code in KeyCode::KEY_RESERVED.code()..KeyCode::BTN_TRIGGER_HAPPY40.code() {
        let key = KeyCode::new(code);
        let name = format!("{key:?}");
        if name.starts_with("KEY_") {
            keys.insert(key);
        }
    }

    let device = VirtualDevice::builder()?
        .name(&current_name())
        .with_keys(&keys)?
        .build()?;
    Ok(device)
}

fn current_name() -> String {
    format!("chordmap pid={}", process::id())
}

/// Pick and grab the devices to listen on. With no `--device` filters,
/// anything that looks like a keyboard is taken.
pub fn get_input_devices(device_opts: &[String], ignore_opts: &[String]) -> Result<Vec<InputDevice>> {
    let mut devices: Vec<_> = InputDevice::devices()?.collect();
    devices.sort_by(|a, b| a.path.cmp(&b.path));

    let devices: Vec<_> = devices
        .into_iter()
        .filter_map(|mut device| (device.is_wanted(device_opts, ignore_opts) && device.grab()).then_some(device))
        .collect();

    if devices.is_empty() {
        bail!("no keyboard device was selected");
    }
    println!("Listening on:");
    for device in &devices {
        println!("{:18}: {}", device.path.display(), device.device_name());
    }
    Ok(devices)
}

pub struct InputDevice {
    path: PathBuf,
    device: Device,
}

impl TryFrom<PathBuf> for InputDevice {
    type Error = io::Error;

    fn try_from(path: PathBuf) -> Result<Self, Self::Error> {
        let fname = path
            .file_name()
            .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))?;
        if !fname.as_bytes().starts_with(b"event") {
            return Err(io::ErrorKind::InvalidInput.into());
        }
        Ok(Self {
            device: Device::open(&path)?,
            path,
        })
    }
}

impl AsRawFd for InputDevice {
    fn as_raw_fd(&self) -> RawFd {
        self.device.as_raw_fd()
    }
}

impl InputDevice {
    // We can't know the device path from evdev::enumerate(), so walk
    // /dev/input ourselves.
    fn devices() -> io::Result<impl Iterator<Item = InputDevice>> {
        Ok(read_dir("/dev/input")?.filter_map(|entry| InputDevice::try_from(entry.ok()?.path()).ok()))
    }

    pub fn grab(&mut self) -> bool {
        if let Err(error) = self.device.grab() {
            warn!(
                "failed to grab device '{}' at '{}': {error}",
                self.device_name(),
                self.path.display()
            );
            false
        } else {
            true
        }
    }

    pub fn fetch_events(&mut self) -> io::Result<FetchEventsSynced> {
        self.device.fetch_events()
    }

    fn device_name(&self) -> &str {
        self.device.name().unwrap_or("<unnamed device>")
    }

    fn is_wanted(&self, device_filter: &[String], ignore_filter: &[String]) -> bool {
        // never listen to our own output device
        if self.device_name() == current_name() {
            return false;
        }
        (if device_filter.is_empty() {
            self.is_keyboard()
        } else {
            self.matches(device_filter)
        }) && (ignore_filter.is_empty() || !self.matches(ignore_filter))
    }

    fn matches(&self, filter: &[String]) -> bool {
        for device_opt in filter {
            let device_opt = device_opt.as_str();

            // exact path or name
            if self.path.as_os_str() == device_opt || self.device_name() == device_opt {
                return true;
            }
            // eventXX shorthand for /dev/input/eventXX
            if device_opt.starts_with("event") && self.path.file_name().is_some_and(|name| name == device_opt) {
                return true;
            }
            // partial name match
            if self.device_name().contains(device_opt) {
                return true;
            }
        }
        false
    }

    fn is_keyboard(&self) -> bool {
        match self.device.supported_keys() {
            Some(keys) => {
                keys.contains(KeyCode::KEY_SPACE)
                    && keys.contains(KeyCode::KEY_A)
                    && keys.contains(KeyCode::KEY_Z)
                    && !keys.contains(KeyCode::BTN_LEFT)
            }
            None => false,
        }
    }
}
