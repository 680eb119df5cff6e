// lcd.rs

use esp_idf_hal::{
    delay::{BLOCK, Ets, FreeRtos},
    i2c::I2cDriver,
};

use crate::*;

/// Common address of the PCF8574A backpack.
pub const LCD_ADDR: u8 = 0x3F;

// PCF8574 bit layout: P0=RS P1=RW P2=EN P3=backlight P4..P7=D4..D7
const RS: u8 = 0x01;
const EN: u8 = 0x04;
const BACKLIGHT: u8 = 0x08;

const CMD_CLEAR: u8 = 0x01;
const CMD_ENTRY_INCREMENT: u8 = 0x06;
const CMD_DISPLAY_ON: u8 = 0x0C;
const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
const CMD_SET_DDRAM: u8 = 0x80;

/// HD44780 ROM code for the degree sign.
const DEGREE: u8 = 0xDF;

/// 16x2 HD44780 character LCD behind an I2C port expander.
pub struct I2cLcd {
    i2c: I2cDriver<'static>,
    addr: u8,
}

impl I2cLcd {
    pub fn new(i2c: I2cDriver<'static>, addr: u8) -> anyhow::Result<Self> {
        let mut lcd = I2cLcd { i2c, addr };
        lcd.init()?;
        Ok(lcd)
    }

    fn init(&mut self) -> anyhow::Result<()> {
        FreeRtos::delay_ms(50);
        // force 8-bit mode three times, then drop to 4-bit
        for _ in 0..3 {
            self.write_nibble(0x30, false)?;
            FreeRtos::delay_ms(5);
        }
        self.write_nibble(0x20, false)?;

        self.command(CMD_FUNCTION_4BIT_2LINE)?;
        self.command(CMD_DISPLAY_ON)?;
        self.command(CMD_ENTRY_INCREMENT)?;
        self.clear()
    }

    pub fn clear(&mut self) -> anyhow::Result<()> {
        self.command(CMD_CLEAR)?;
        FreeRtos::delay_ms(2);
        Ok(())
    }

    fn set_cursor(&mut self, row: u8, col: u8) -> anyhow::Result<()> {
        let base = if row == 0 { 0x00 } else { 0x40 };
        self.command(CMD_SET_DDRAM | (base + col))
    }

    fn command(&mut self, cmd: u8) -> anyhow::Result<()> {
        self.write_byte(cmd, false)
    }

    fn write_byte(&mut self, b: u8, data: bool) -> anyhow::Result<()> {
        self.write_nibble(b & 0xF0, data)?;
        self.write_nibble((b << 4) & 0xF0, data)
    }

    fn write_nibble(&mut self, nibble: u8, data: bool) -> anyhow::Result<()> {
        let v = nibble | BACKLIGHT | if data { RS } else { 0 };
        self.i2c.write(self.addr, &[v | EN], BLOCK)?;
        Ets::delay_us(1);
        self.i2c.write(self.addr, &[v], BLOCK)?;
        Ets::delay_us(50);
        Ok(())
    }
}

impl StatusDisplay for I2cLcd {
    fn write_at(&mut self, row: u8, col: u8, text: &str) -> anyhow::Result<()> {
        if row as usize >= DISPLAY_ROWS || col as usize >= DISPLAY_COLS {
            bail!("cursor ({row}, {col}) out of range");
        }
        self.set_cursor(row, col)?;
        for ch in text.chars().take(DISPLAY_COLS - col as usize) {
            let b = match ch {
                '°' => DEGREE,
                c if c.is_ascii() => c as u8,
                _ => b'?',
            };
            self.write_byte(b, true)?;
        }
        Ok(())
    }
}

// EOF
