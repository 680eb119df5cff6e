// display.rs

use std::net::Ipv4Addr;

use crate::*;

pub const DISPLAY_ROWS: usize = 2;
pub const DISPLAY_COLS: usize = 16;
/// Each channel owns half of the top row.
pub const FIELD_WIDTH: usize = DISPLAY_COLS / CHANNELS;
pub const STATUS_ROW: u8 = 1;

/// Character display addressed by row and column.
pub trait StatusDisplay {
    fn write_at(&mut self, row: u8, col: u8, text: &str) -> anyhow::Result<()>;
}

// a missing display swallows everything
impl<T: StatusDisplay> StatusDisplay for Option<T> {
    fn write_at(&mut self, row: u8, col: u8, text: &str) -> anyhow::Result<()> {
        match self {
            Some(d) => d.write_at(row, col, text),
            None => Ok(()),
        }
    }
}

/// Temperature field for one channel, padded to `FIELD_WIDTH`.
pub fn channel_text(reading: Reading) -> String {
    let text = match reading {
        Reading::Celsius(t) => format!("{t:.2}°C"),
        Reading::Disconnected => "XX.XX°C".to_string(),
        Reading::Initializing => "--.--°C".to_string(),
    };
    format!("{text:<FIELD_WIDTH$}")
}

pub fn channel_position(channel: usize) -> (u8, u8) {
    (0, (channel * FIELD_WIDTH) as u8)
}

pub fn address_text(address: Ipv4Addr) -> String {
    status_line(&address.to_string())
}

pub fn access_point_text(address: Ipv4Addr) -> String {
    status_line(&format!("AP! {address}"))
}

pub fn disconnected_text() -> String {
    status_line("Disconnected")
}

pub fn status_line(text: &str) -> String {
    let text: String = text.chars().take(DISPLAY_COLS).collect();
    format!("{text:<DISPLAY_COLS$}")
}

/// In-memory character cells, for the host and for tests.
#[derive(Clone, Debug)]
pub struct CharGrid {
    cells: [[char; DISPLAY_COLS]; DISPLAY_ROWS],
}

impl CharGrid {
    pub fn new() -> Self {
        CharGrid {
            cells: [[' '; DISPLAY_COLS]; DISPLAY_ROWS],
        }
    }

    pub fn row(&self, row: usize) -> String {
        self.cells[row].iter().collect()
    }
}

impl Default for CharGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusDisplay for CharGrid {
    fn write_at(&mut self, row: u8, col: u8, text: &str) -> anyhow::Result<()> {
        let row = row as usize;
        if row >= DISPLAY_ROWS {
            bail!("row {row} out of range");
        }
        // like the real panel, text past the edge is lost
        for (i, ch) in text.chars().enumerate() {
            let col = col as usize + i;
            if col >= DISPLAY_COLS {
                break;
            }
            self.cells[row][col] = ch;
        }
        Ok(())
    }
}


// EOF
