use anyhow::Result;

use crate::combo::ComboTable;
use crate::event::Event;
use crate::event_handler::EventHandler;
use crate::timing::TimingPolicy;

/// A source of events in stream order. `Ok(None)` means end of stream.
pub trait EventReader {
    fn read_one(&mut self) -> Result<Option<Event>>;
}

/// A sink for events. Synchronous: when `write_one` returns, the event is
/// committed.
pub trait EventWriter {
    fn write_one(&mut self, event: &Event) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// Forward non-key events (EV_SYN, EV_MSC, ...) instead of dropping them.
    pub forward_other_events: bool,
}

impl Default for EngineOptions {
    fn default() -> EngineOptions {
        EngineOptions {
            forward_other_events: true,
        }
    }
}

/// Drive the reader through the combo resolver into the writer until the
/// reader signals end of stream, then flush whatever is still buffered.
///
/// A reader error tears the stream: it is returned as-is, nothing is flushed.
/// A writer error is returned with the resolver's buffer intact.
pub fn man_in_the_middle(
    reader: &mut dyn EventReader,
    writer: &mut dyn EventWriter,
    combos: &ComboTable,
    timing: TimingPolicy,
    options: EngineOptions,
) -> Result<()> {
    let mut handler = EventHandler::new(timing);
    loop {
        let Some(event) = reader.read_one()? else {
            for event in handler.flush() {
                writer.write_one(&event)?;
            }
            return Ok(());
        };
        if !options.forward_other_events && matches!(event, Event::Other(_)) {
            continue;
        }
        for event in handler.on_event(&event, combos) {
            writer.write_one(&event)?;
        }
    }
}
