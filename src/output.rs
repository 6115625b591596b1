use std::io::Write;

use anyhow::Result;
use evdev::uinput::VirtualDevice;

use crate::engine::EventWriter;
use crate::event::Event;

/// In-memory writer for tests.
#[derive(Default)]
pub struct SliceWriter {
    pub events: Vec<Event>,
}

impl EventWriter for SliceWriter {
    fn write_one(&mut self, event: &Event) -> Result<()> {
        self.events.push(*event);
        Ok(())
    }
}

/// Renders each event back to its CSV line; used by `--replay`.
pub struct CsvWriter<W: Write> {
    output: W,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(output: W) -> CsvWriter<W> {
        CsvWriter { output }
    }
}

impl<W: Write> EventWriter for CsvWriter<W> {
    fn write_one(&mut self, event: &Event) -> Result<()> {
        writeln!(self.output, "{}", event.to_csv())?;
        Ok(())
    }
}

/// Emits events on the virtual uinput device.
pub struct UinputWriter {
    device: VirtualDevice,
}

impl UinputWriter {
    pub fn new(device: VirtualDevice) -> UinputWriter {
        UinputWriter { device }
    }
}

impl EventWriter for UinputWriter {
    fn write_one(&mut self, event: &Event) -> Result<()> {
        self.device.emit(&[event.to_input_event()])?;
        Ok(())
    }
}
