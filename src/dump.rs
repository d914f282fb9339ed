use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;

use logpane_types::{ArcRecord, Record};
use logpane_view::{Coordinator, WindowChange};

/// Prints every record the first time it becomes visible.
///
/// Single changes are applied directly. A reset re-reads the window and
/// prints whatever was not visible before, oldest first. A record that is
/// hidden and shown again is printed again.
pub struct Dump<W: Write> {
    out: W,
    text: bool,

    /// Records currently on screen, by pointer identity. Holding the `Arc`
    /// keeps the address from being reused while the entry exists.
    shown: HashMap<usize, ArcRecord>,
}

fn identity(record: &ArcRecord) -> usize {
    Arc::as_ptr(record) as usize
}

impl<W: Write> Dump<W> {
    pub fn new(out: W, text: bool) -> Self {
        Self {
            out,
            text,
            shown: HashMap::new(),
        }
    }

    /// Apply one window change. Returns how many records were printed.
    pub fn apply(&mut self, change: WindowChange, coordinator: &Coordinator) -> io::Result<usize> {
        match change {
            WindowChange::Added { record, .. } => {
                if self.shown.contains_key(&identity(&record)) {
                    return Ok(0);
                }
                self.print(&record)?;
                self.shown.insert(identity(&record), record);
                Ok(1)
            }
            WindowChange::Removed { record, .. } => {
                self.shown.remove(&identity(&record));
                Ok(0)
            }
            WindowChange::Reset => {
                let visible = coordinator.visible();
                let mut printed = 0;
                for record in visible.iter().rev() {
                    if !self.shown.contains_key(&identity(record)) {
                        self.print(record)?;
                        printed += 1;
                    }
                }
                self.shown = visible.into_iter().map(|r| (identity(&r), r)).collect();
                Ok(printed)
            }
        }
    }

    fn print(&mut self, record: &Record) -> io::Result<()> {
        if self.text {
            writeln!(self.out, "{record}")?;
        } else {
            serde_json::to_writer(&mut self.out, record)?;
            writeln!(self.out)?;
        }
        self.out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}
