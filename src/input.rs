use std::collections::VecDeque;
use std::io::BufRead;
use std::os::unix::io::AsRawFd;

use anyhow::Result;
use nix::sys::select::{select, FdSet};

use crate::device::InputDevice;
use crate::engine::EventReader;
use crate::event::Event;

/// Event log lines produced (and replayed) by chordmap start with this.
pub const LOG_PREFIX: &str = "|>>";

/// In-memory reader for tests and canned streams.
pub struct SliceReader {
    events: VecDeque<Event>,
}

impl SliceReader {
    pub fn new(events: Vec<Event>) -> SliceReader {
        SliceReader {
            events: events.into(),
        }
    }
}

impl EventReader for SliceReader {
    fn read_one(&mut self) -> Result<Option<Event>> {
        Ok(self.events.pop_front())
    }
}

/// Scans `|>>`-prefixed CSV event lines out of a captured log; all other
/// lines are ignored.
pub struct LogReader<R: BufRead> {
    input: R,
}

impl<R: BufRead> LogReader<R> {
    pub fn new(input: R) -> LogReader<R> {
        LogReader { input }
    }
}

impl<R: BufRead> EventReader for LogReader<R> {
    fn read_one(&mut self) -> Result<Option<Event>> {
        loop {
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            if let Some(record) = line.trim_end().strip_prefix(LOG_PREFIX) {
                return Event::parse_csv(record).map(Some);
            }
        }
    }
}

/// Multiplexes one or more grabbed evdev devices into a single stream.
pub struct DeviceReader {
    devices: Vec<InputDevice>,
    queue: VecDeque<Event>,
}

impl DeviceReader {
    pub fn new(devices: Vec<InputDevice>) -> DeviceReader {
        DeviceReader {
            devices,
            queue: VecDeque::new(),
        }
    }
}

impl EventReader for DeviceReader {
    fn read_one(&mut self) -> Result<Option<Event>> {
        while self.queue.is_empty() {
            let readable_fds = select_readable(&self.devices)?;
            for device in &mut self.devices {
                if readable_fds.contains(device.as_raw_fd()) {
                    for raw in device.fetch_events()? {
                        self.queue.push_back(Event::from_input_event(&raw));
                    }
                }
            }
        }
        Ok(self.queue.pop_front())
    }
}

fn select_readable(devices: &[InputDevice]) -> Result<FdSet> {
    let mut read_fds = FdSet::new();
    for device in devices {
        read_fds.insert(device.as_raw_fd());
    }
    select(None, &mut read_fds, None, None, None)?;
    Ok(read_fds)
}
